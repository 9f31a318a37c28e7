use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::runtime::Handle;
use uuid::Uuid;

use super::dataset::{answer_label, demo_dataset};
use super::{AccountStore, DemoAccount, DemoSeeder, SeedOpError, StoreError};

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn account_exists(&self, user_id: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn upsert_demo_account(&self, account: &DemoAccount) -> Result<(), StoreError> {
        // An auth trigger may have created the row already; keep its email.
        sqlx::query(
            "INSERT INTO users (id, email, name, is_guest, cognitive_profile_summary) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
               email = COALESCE(users.email, EXCLUDED.email), \
               name = EXCLUDED.name, \
               is_guest = EXCLUDED.is_guest, \
               cognitive_profile_summary = EXCLUDED.cognitive_profile_summary",
        )
        .bind(&account.user_id)
        .bind(&account.email)
        .bind(&account.name)
        .bind(account.is_guest)
        .bind(&account.cognitive_profile_summary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn refresh_demo_attributes(&self, account: &DemoAccount) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET name = $2, is_guest = $3, cognitive_profile_summary = $4 \
             WHERE id = $1",
        )
        .bind(&account.user_id)
        .bind(&account.name)
        .bind(account.is_guest)
        .bind(&account.cognitive_profile_summary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_checkins(&self, user_id: &str) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM checkins WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn has_profile(&self, user_id: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM cognitive_profiles WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

/// Blocking seeder backed by Postgres.
///
/// `seed` is called from the blocking pool and drives the async writes
/// through the runtime handle captured at construction.
pub struct PgDemoSeeder {
    pool: PgPool,
    runtime: Handle,
}

impl PgDemoSeeder {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self { pool, runtime }
    }
}

impl DemoSeeder for PgDemoSeeder {
    fn seed(&self, user_id: &str) -> Result<(), SeedOpError> {
        self.runtime.block_on(seed_demo_data(&self.pool, user_id))
    }
}

/// Write the demo dataset for `user_id`.
///
/// Every insert is keyed by a natural key and does nothing on conflict, so
/// repeated or concurrent runs never duplicate rows.
pub async fn seed_demo_data(pool: &PgPool, user_id: &str) -> Result<(), SeedOpError> {
    let data = demo_dataset(chrono::Utc::now().date_naive());
    let mut tx = pool.begin().await?;

    for answer in &data.answers {
        sqlx::query(
            "INSERT INTO asrs_responses \
             (id, user_id, question_index, question_text, answer_label, score) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, question_index) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(answer.question_index)
        .bind(&answer.question_text)
        .bind(answer_label(answer.score))
        .bind(answer.score)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "INSERT INTO cognitive_profiles \
         (id, user_id, dimensions, profile_tags, summary, asrs_total_score, is_positive_screen, is_seed) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE) \
         ON CONFLICT (user_id) WHERE is_seed DO NOTHING",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(Json(&data.profile.dimensions))
    .bind(&data.profile.profile_tags)
    .bind(&data.profile.summary)
    .bind(data.profile.asrs_total_score)
    .bind(data.profile.is_positive_screen)
    .execute(&mut *tx)
    .await?;

    for checkin in &data.checkins {
        sqlx::query(
            "INSERT INTO checkins \
             (id, user_id, day_number, checkin_date, mood_score, brain_state, tasks_completed, tasks_total, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (user_id, day_number) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(checkin.day_number)
        .bind(checkin.date)
        .bind(checkin.mood_score)
        .bind(&checkin.brain_state)
        .bind(checkin.tasks_completed)
        .bind(checkin.tasks_total)
        .bind(&checkin.note)
        .execute(&mut *tx)
        .await?;
    }

    for plan in &data.plans {
        sqlx::query(
            "INSERT INTO daily_plans \
             (id, user_id, day_number, plan_date, brain_state, tasks, overall_rationale) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, day_number) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(plan.day_number)
        .bind(plan.date)
        .bind(&plan.brain_state)
        .bind(Json(&plan.tasks))
        .bind(&plan.overall_rationale)
        .execute(&mut *tx)
        .await?;
    }

    for intervention in &data.interventions {
        sqlx::query(
            "INSERT INTO interventions \
             (id, user_id, plan_id, day_number, stuck_task_index, user_message, acknowledgment, \
              restructured_tasks, agent_reasoning, followup_hint, user_rating, feedback_at) \
             VALUES ($1, $2, \
              (SELECT id FROM daily_plans WHERE user_id = $2 AND day_number = $3), \
              $3, $4, $5, $6, $7, $8, $9, $10, \
              CASE WHEN $10::INT IS NULL THEN NULL ELSE NOW() END) \
             ON CONFLICT (user_id, day_number) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(intervention.day_number)
        .bind(intervention.stuck_task_index)
        .bind(&intervention.user_message)
        .bind(&intervention.acknowledgment)
        .bind(Json(&intervention.restructured_tasks))
        .bind(&intervention.agent_reasoning)
        .bind(&intervention.followup_hint)
        .bind(intervention.user_rating)
        .execute(&mut *tx)
        .await?;
    }

    for card in &data.hypotheses {
        sqlx::query(
            "INSERT INTO hypothesis_cards \
             (id, user_id, slug, pattern_detected, prediction, confidence, status, supporting_evidence) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (user_id, slug) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&card.slug)
        .bind(&card.pattern_detected)
        .bind(&card.prediction)
        .bind(&card.confidence)
        .bind(&card.status)
        .bind(&card.supporting_evidence)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::RetryPolicy;
    use crate::seed::{DEFAULT_SEED_THRESHOLD, GuestSeeder, SeedScope, SeedState};
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::time::Duration;

    async fn db_pool_if_available() -> Option<PgPool> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .ok()?;
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");
        Some(pool)
    }

    async fn count(pool: &PgPool, table: &str, user_id: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .fetch_one(pool)
            .await
            .expect("count query")
    }

    #[tokio::test]
    async fn seeding_twice_writes_each_natural_key_once() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        let user_id = format!("seed-test-{}", Uuid::now_v7());

        seed_demo_data(&pool, &user_id).await.expect("first seed");
        seed_demo_data(&pool, &user_id).await.expect("second seed");

        assert_eq!(count(&pool, "checkins", &user_id).await, 14);
        assert_eq!(count(&pool, "daily_plans", &user_id).await, 14);
        assert_eq!(count(&pool, "cognitive_profiles", &user_id).await, 1);
        assert_eq!(count(&pool, "asrs_responses", &user_id).await, 6);
        assert_eq!(count(&pool, "interventions", &user_id).await, 4);
        assert_eq!(count(&pool, "hypothesis_cards", &user_id).await, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_guest_logins_converge_in_postgres() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        let seeder = Arc::new(GuestSeeder::new(
            Arc::new(PgAccountStore::new(pool.clone())),
            Arc::new(PgDemoSeeder::new(pool.clone(), Handle::current())),
            RetryPolicy::new(3, Duration::from_millis(10)),
            DEFAULT_SEED_THRESHOLD,
        ));
        let identity = crate::auth::Identity::for_tests(&format!("race-{}", Uuid::now_v7()));
        let scope = SeedScope::for_identity(&identity);

        let (a, b) = tokio::join!(seeder.ensure_seeded(&scope), seeder.ensure_seeded(&scope));
        a.expect("first login");
        b.expect("second login");

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = $1")
            .bind(scope.user_id())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 1);
        assert_eq!(count(&pool, "checkins", scope.user_id()).await, 14);
        assert_eq!(
            seeder.inspect(scope.user_id()).await.unwrap(),
            SeedState::FullySeeded
        );
    }
}
