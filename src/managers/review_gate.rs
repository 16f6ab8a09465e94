use dashmap::DashMap;
use poise::serenity_prelude::{RoleId, UserId};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{BotError, Result};
use crate::managers::config_manager::SharedConfigManager;
use crate::state::{ApplicationRecord, ApplicationStatus, SharedApplicationStore};

/// Staff decision on a pending application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn status(&self) -> ApplicationStatus {
        match self {
            Decision::Approve => ApplicationStatus::Approved,
            Decision::Reject => ApplicationStatus::Rejected,
        }
    }
}

/// Gates the two staff decision actions on a pending application.
///
/// A decision is claimed before any side effects run: the claim map makes
/// check-and-claim atomic, so a double-click resolves to exactly one
/// applied decision and one `AlreadyDecided` rejection. The claim is
/// released once the decision has been recorded; from then on the record's
/// terminal status keeps repeat invocations out.
pub struct ReviewGate {
    store: SharedApplicationStore,
    config: SharedConfigManager,
    deciding: DashMap<UserId, ()>,
}

impl ReviewGate {
    pub fn new(store: SharedApplicationStore, config: SharedConfigManager) -> Self {
        Self {
            store,
            config,
            deciding: DashMap::new(),
        }
    }

    /// Validate and claim a decision. Returns the pending record; the
    /// caller applies side effects, records the status, then calls
    /// [`finish`](Self::finish).
    pub async fn decide(
        &self,
        user_id: UserId,
        decision: Decision,
        actor_roles: &[RoleId],
        actor_label: &str,
    ) -> Result<ApplicationRecord> {
        let staff_role_id = {
            let config = self.config.read().await;
            config.guild().staff_role_id
        };

        if !actor_roles.iter().any(|r| r.get() == staff_role_id) {
            warn!(
                "Non-staff '{}' tried to {:?} application of user {}",
                actor_label, decision, user_id
            );
            return Err(BotError::Unauthorized);
        }

        // Claim before touching the record; a concurrent click loses here
        if self.deciding.insert(user_id, ()).is_some() {
            return Err(BotError::AlreadyDecided);
        }

        let record = {
            let store = self.store.read().await;
            store.get(&user_id.to_string()).cloned()
        };

        match record {
            Some(record) if record.status == ApplicationStatus::Pending => {
                info!(
                    "Staff '{}' claimed {:?} for application of user {}",
                    actor_label, decision, user_id
                );
                Ok(record)
            }
            Some(_) => {
                self.deciding.remove(&user_id);
                Err(BotError::AlreadyDecided)
            }
            None => {
                self.deciding.remove(&user_id);
                Err(BotError::Internal {
                    message: format!("no application record for user {}", user_id),
                })
            }
        }
    }

    /// Release the claim after the decision has been recorded
    pub fn finish(&self, user_id: UserId) {
        self.deciding.remove(&user_id);
    }
}

/// Shared review gate type
pub type SharedReviewGate = Arc<ReviewGate>;

pub fn create_shared_review_gate(
    store: SharedApplicationStore,
    config: SharedConfigManager,
) -> SharedReviewGate {
    Arc::new(ReviewGate::new(store, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuildConfig;
    use crate::managers::config_manager::create_shared_config_manager;
    use crate::managers::profile_client::RobloxProfile;
    use crate::state::{create_shared_application_store, ApplicationStore};
    use chrono::Utc;

    const STAFF_ROLE: u64 = 5000;

    async fn fixtures() -> (SharedApplicationStore, SharedConfigManager) {
        let mut store = ApplicationStore::new();
        store.upsert(ApplicationRecord::new(
            "123".to_string(),
            "harbor_tester | tester".to_string(),
            vec!["18".to_string()],
            "900".to_string(),
            RobloxProfile {
                id: 42,
                username: "harbor_tester".to_string(),
                display_name: "Harbor Tester".to_string(),
                profile_url: "https://www.roblox.com/users/42/profile".to_string(),
                avatar_url: None,
                created_at: Utc::now(),
                description: "HarborRP".to_string(),
            },
        ));

        let config = create_shared_config_manager("testdata");
        config.write().await.set_guild_config(GuildConfig {
            staff_role_id: STAFF_ROLE,
            ..GuildConfig::default()
        });

        (create_shared_application_store(store), config)
    }

    fn staff_roles() -> Vec<RoleId> {
        vec![RoleId::new(STAFF_ROLE)]
    }

    #[tokio::test]
    async fn test_non_staff_is_rejected_without_state_change() {
        let (store, config) = fixtures().await;
        let gate = ReviewGate::new(store.clone(), config);

        let result = gate
            .decide(
                UserId::new(123),
                Decision::Approve,
                &[RoleId::new(77)],
                "Imposter",
            )
            .await;
        assert!(matches!(result, Err(BotError::Unauthorized)));

        let store = store.read().await;
        assert_eq!(store.get("123").unwrap().status, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn test_second_decision_fails_after_record_is_terminal() {
        let (store, config) = fixtures().await;
        let gate = ReviewGate::new(store.clone(), config);
        let user = UserId::new(123);

        let record = gate
            .decide(user, Decision::Reject, &staff_roles(), "StaffMember")
            .await
            .expect("first decision should be claimable");
        assert_eq!(record.status, ApplicationStatus::Pending);

        // The caller records the decision and releases the claim
        store
            .write()
            .await
            .set_decision("123", ApplicationStatus::Rejected, "StaffMember", false);
        gate.finish(user);

        let second = gate
            .decide(user, Decision::Reject, &staff_roles(), "StaffMember")
            .await;
        assert!(matches!(second, Err(BotError::AlreadyDecided)));
    }

    #[tokio::test]
    async fn test_concurrent_claim_loses_before_status_is_written() {
        let (store, config) = fixtures().await;
        let gate = ReviewGate::new(store, config);
        let user = UserId::new(123);

        gate.decide(user, Decision::Approve, &staff_roles(), "First")
            .await
            .expect("first claim succeeds");

        // Second click lands while side effects are still running
        let second = gate
            .decide(user, Decision::Approve, &staff_roles(), "Second")
            .await;
        assert!(matches!(second, Err(BotError::AlreadyDecided)));
    }

    #[tokio::test]
    async fn test_decision_without_record_is_an_error() {
        let (store, config) = fixtures().await;
        let gate = ReviewGate::new(store, config);

        let result = gate
            .decide(UserId::new(999), Decision::Approve, &staff_roles(), "Staff")
            .await;
        assert!(matches!(result, Err(BotError::Internal { .. })));
    }
}
