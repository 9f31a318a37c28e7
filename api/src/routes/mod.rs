pub mod analytics;
pub mod auth;
pub mod feedback;
pub mod health;
pub mod plans;
pub mod profile;
pub mod screening;
pub mod users;
