use std::sync::Arc;

use sqlx::PgPool;

use crate::agent::AgentRunner;
use crate::auth::IdentityVerifier;
use crate::bridge::RetryPolicy;
use crate::idp::IdentityProvider;
use crate::seed::GuestSeeder;

/// Process-wide collaborators, constructed once in `main` and injected.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub verifier: IdentityVerifier,
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub agent: Arc<dyn AgentRunner>,
    pub seeder: Arc<GuestSeeder>,
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(
        db: PgPool,
        identity_provider: Arc<dyn IdentityProvider>,
        agent: Arc<dyn AgentRunner>,
        seeder: Arc<GuestSeeder>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            verifier: IdentityVerifier::new(identity_provider.clone()),
            identity_provider,
            agent,
            seeder,
            retry,
        }
    }
}
