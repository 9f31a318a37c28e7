//! Guest demo account seeding.
//!
//! `ensure_seeded` reads the account's state, drives it to `FullySeeded`, and
//! can be called any number of times, concurrently, for the same user. There
//! are no locks: convergence relies on the account upsert and on the seeding
//! operation writing every record under a natural key.

mod dataset;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use attune_core::auth::DEMO_FALLBACK_USER_ID;

use crate::auth::Identity;
use crate::bridge::{RetriesExhausted, RetryPolicy};

pub use dataset::answer_label;
pub use postgres::{PgAccountStore, PgDemoSeeder};
#[cfg(test)]
pub(crate) use postgres::seed_demo_data;

/// Check-ins a demo account needs before it counts as fully seeded.
pub const DEFAULT_SEED_THRESHOLD: i64 = 14;

pub const DEMO_NAME: &str = "Alex";
pub const DEMO_EMAIL: &str = "alex@attune-demo.com";
pub const DEMO_PROFILE_SUMMARY: &str =
    "Deep-Diver with strong hyperfocus and variable task initiation";

/// Permission to seed exactly one demo account, and nothing else.
///
/// Built either from a verified identity or as the reserved fallback used when
/// the guest endpoint is called without a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedScope {
    user_id: String,
    fallback: bool,
}

impl SeedScope {
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            user_id: identity.as_str().to_string(),
            fallback: false,
        }
    }

    pub fn demo_fallback() -> Self {
        Self {
            user_id: DEMO_FALLBACK_USER_ID.to_string(),
            fallback: true,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Audit label distinguishing real identities from the fallback.
    pub fn principal(&self) -> &'static str {
        if self.fallback {
            "demo_fallback"
        } else {
            "verified"
        }
    }
}

/// Canonical display attributes of a demo account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoAccount {
    pub user_id: String,
    pub email: Option<String>,
    pub name: String,
    pub is_guest: bool,
    pub cognitive_profile_summary: String,
}

impl DemoAccount {
    pub fn canonical(scope: &SeedScope) -> Self {
        Self {
            user_id: scope.user_id().to_string(),
            email: scope.is_fallback().then(|| DEMO_EMAIL.to_string()),
            name: DEMO_NAME.to_string(),
            is_guest: true,
            cognitive_profile_summary: DEMO_PROFILE_SUMMARY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedState {
    /// No account row.
    Absent,
    /// Account row exists but has fewer check-ins than the threshold.
    PartiallySeeded { checkins: i64 },
    FullySeeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedOutcome {
    pub user_id: String,
    /// State observed before this call did anything.
    pub previous: SeedState,
    /// Whether the seeding operation ran.
    pub seeded: bool,
    pub has_profile: bool,
    pub fallback: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failure of one run of the seeding operation.
#[derive(Debug, thiserror::Error)]
pub enum SeedOpError {
    #[error("seed write failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("account store error: {0}")]
    Store(#[from] StoreError),
    #[error("demo seeding failed: {0}")]
    SeedingFailed(#[source] RetriesExhausted<SeedOpError>),
}

/// Account rows and the completeness count, as seen by the seeder.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn account_exists(&self, user_id: &str) -> Result<bool, StoreError>;

    /// Insert the account or update its display attributes. Must not clear
    /// fields (such as email) written by someone else.
    async fn upsert_demo_account(&self, account: &DemoAccount) -> Result<(), StoreError>;

    async fn refresh_demo_attributes(&self, account: &DemoAccount) -> Result<(), StoreError>;

    async fn count_checkins(&self, user_id: &str) -> Result<i64, StoreError>;

    async fn has_profile(&self, user_id: &str) -> Result<bool, StoreError>;
}

/// Blocking, idempotent demo data writer.
pub trait DemoSeeder: Send + Sync {
    fn seed(&self, user_id: &str) -> Result<(), SeedOpError>;
}

pub struct GuestSeeder {
    store: Arc<dyn AccountStore>,
    seeder: Arc<dyn DemoSeeder>,
    retry: RetryPolicy,
    threshold: i64,
}

impl GuestSeeder {
    pub fn new(
        store: Arc<dyn AccountStore>,
        seeder: Arc<dyn DemoSeeder>,
        retry: RetryPolicy,
        threshold: i64,
    ) -> Self {
        Self {
            store,
            seeder,
            retry,
            threshold,
        }
    }

    pub async fn inspect(&self, user_id: &str) -> Result<SeedState, SeedError> {
        if !self.store.account_exists(user_id).await? {
            return Ok(SeedState::Absent);
        }
        let checkins = self.store.count_checkins(user_id).await?;
        if checkins < self.threshold {
            Ok(SeedState::PartiallySeeded { checkins })
        } else {
            Ok(SeedState::FullySeeded)
        }
    }

    pub async fn ensure_seeded(&self, scope: &SeedScope) -> Result<SeedOutcome, SeedError> {
        let user_id = scope.user_id();
        let account = DemoAccount::canonical(scope);
        let previous = self.inspect(user_id).await?;

        tracing::info!(
            user_id = user_id,
            principal = scope.principal(),
            state = ?previous,
            "guest seed state"
        );

        let seeded = match previous {
            SeedState::Absent => {
                self.store.upsert_demo_account(&account).await?;
                self.run_seed(scope).await?;
                true
            }
            SeedState::PartiallySeeded { .. } => {
                self.run_seed(scope).await?;
                self.store.refresh_demo_attributes(&account).await?;
                true
            }
            SeedState::FullySeeded => {
                self.store.refresh_demo_attributes(&account).await?;
                false
            }
        };

        let has_profile = self.store.has_profile(user_id).await?;

        Ok(SeedOutcome {
            user_id: user_id.to_string(),
            previous,
            seeded,
            has_profile,
            fallback: scope.is_fallback(),
        })
    }

    async fn run_seed(&self, scope: &SeedScope) -> Result<(), SeedError> {
        let seeder = Arc::clone(&self.seeder);
        let user_id = scope.user_id().to_string();

        self.retry
            .run(move || seeder.seed(&user_id))
            .await
            .map_err(|err| {
                tracing::error!(
                    user_id = scope.user_id(),
                    principal = scope.principal(),
                    attempts = err.attempts,
                    error = %err.last,
                    "demo seeding exhausted retries"
                );
                SeedError::SeedingFailed(err)
            })?;

        tracing::info!(
            user_id = scope.user_id(),
            principal = scope.principal(),
            "demo data seeded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::AttemptFailure;
    use crate::test_support::MemoryBackend;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    fn guest_seeder(backend: &Arc<MemoryBackend>) -> GuestSeeder {
        GuestSeeder::new(
            backend.clone(),
            backend.clone(),
            fast_retry(),
            DEFAULT_SEED_THRESHOLD,
        )
    }

    fn verified(id: &str) -> SeedScope {
        SeedScope::for_identity(&Identity::for_tests(id))
    }

    #[tokio::test]
    async fn absent_account_is_created_and_seeded_once() {
        let backend = Arc::new(MemoryBackend::default());
        let seeder = guest_seeder(&backend);

        let outcome = seeder.ensure_seeded(&verified("user-42")).await.unwrap();

        assert_eq!(outcome.previous, SeedState::Absent);
        assert!(outcome.seeded);
        assert!(outcome.has_profile);
        assert!(!outcome.fallback);
        assert_eq!(backend.seed_calls(), 1);
        assert_eq!(backend.checkin_count("user-42"), 14);
        assert_eq!(
            seeder.inspect("user-42").await.unwrap(),
            SeedState::FullySeeded
        );

        let account = backend.account("user-42").expect("account row");
        assert_eq!(account.name, DEMO_NAME);
        assert!(account.is_guest);
        assert_eq!(account.email, None);
    }

    #[tokio::test]
    async fn fully_seeded_account_is_only_refreshed() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert_account(DemoAccount {
            user_id: "user-7".into(),
            email: Some("seven@example.com".into()),
            name: "Half-renamed".into(),
            is_guest: false,
            cognitive_profile_summary: "stale".into(),
        });
        backend.insert_checkins("user-7", 1..=14);

        let outcome = guest_seeder(&backend)
            .ensure_seeded(&verified("user-7"))
            .await
            .unwrap();

        assert_eq!(outcome.previous, SeedState::FullySeeded);
        assert!(!outcome.seeded);
        assert_eq!(backend.seed_calls(), 0);

        let account = backend.account("user-7").unwrap();
        assert_eq!(account.name, DEMO_NAME);
        assert!(account.is_guest);
        assert_eq!(account.cognitive_profile_summary, DEMO_PROFILE_SUMMARY);
        assert_eq!(account.email.as_deref(), Some("seven@example.com"));
    }

    #[tokio::test]
    async fn partially_seeded_account_is_completed_without_duplicates() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert_account(DemoAccount::canonical(&verified("user-5")));
        backend.insert_checkins("user-5", 1..=5);

        let outcome = guest_seeder(&backend)
            .ensure_seeded(&verified("user-5"))
            .await
            .unwrap();

        assert_eq!(outcome.previous, SeedState::PartiallySeeded { checkins: 5 });
        assert!(outcome.seeded);
        assert_eq!(backend.checkin_count("user-5"), 14);
    }

    #[tokio::test]
    async fn transient_seed_failures_are_retried() {
        let backend = Arc::new(MemoryBackend::default());
        backend.fail_next_seeds(2);

        let outcome = guest_seeder(&backend)
            .ensure_seeded(&verified("user-9"))
            .await
            .unwrap();

        assert!(outcome.seeded);
        assert_eq!(backend.seed_calls(), 3);
        assert_eq!(backend.checkin_count("user-9"), 14);
    }

    #[tokio::test]
    async fn exhausted_seeding_keeps_account_row_and_resumes_later() {
        let backend = Arc::new(MemoryBackend::default());
        let seeder = guest_seeder(&backend);
        backend.fail_next_seeds(3);

        let err = seeder
            .ensure_seeded(&verified("user-13"))
            .await
            .expect_err("all three attempts fail");
        match err {
            SeedError::SeedingFailed(exhausted) => {
                assert_eq!(exhausted.attempts, 3);
                assert!(matches!(exhausted.last, AttemptFailure::Operation(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(backend.account("user-13").is_some());
        assert_eq!(
            seeder.inspect("user-13").await.unwrap(),
            SeedState::PartiallySeeded { checkins: 0 }
        );

        let outcome = seeder.ensure_seeded(&verified("user-13")).await.unwrap();
        assert_eq!(outcome.previous, SeedState::PartiallySeeded { checkins: 0 });
        assert_eq!(backend.checkin_count("user-13"), 14);
    }

    #[tokio::test]
    async fn fallback_scope_seeds_reserved_account_with_demo_email() {
        let backend = Arc::new(MemoryBackend::default());

        let outcome = guest_seeder(&backend)
            .ensure_seeded(&SeedScope::demo_fallback())
            .await
            .unwrap();

        assert!(outcome.fallback);
        assert_eq!(outcome.user_id, DEMO_FALLBACK_USER_ID);
        let account = backend.account(DEMO_FALLBACK_USER_ID).unwrap();
        assert_eq!(account.email.as_deref(), Some(DEMO_EMAIL));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_calls_converge_to_one_fully_seeded_account() {
        let backend = Arc::new(MemoryBackend::default().with_seed_delay(Duration::from_millis(20)));
        let seeder = Arc::new(guest_seeder(&backend));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let seeder = Arc::clone(&seeder);
                tokio::spawn(async move { seeder.ensure_seeded(&verified("user-race")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(backend.account_count(), 1);
        assert_eq!(backend.checkin_count("user-race"), DEFAULT_SEED_THRESHOLD as usize);
        assert!(backend.seed_calls() >= 1);
        assert_eq!(
            seeder.inspect("user-race").await.unwrap(),
            SeedState::FullySeeded
        );
    }

    #[test]
    fn scope_principal_labels() {
        assert_eq!(SeedScope::demo_fallback().principal(), "demo_fallback");
        assert_eq!(verified("u").principal(), "verified");
    }
}
