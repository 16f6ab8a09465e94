use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::managers::profile_client::RobloxProfile;

/// Durable store of whitelist applications, one record per user id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationStore {
    /// Schema version for migrations
    pub version: u32,

    /// Last update timestamp
    pub last_updated: u64,

    /// Map of Discord ID (as string) to application record
    pub applications: HashMap<String, ApplicationRecord>,
}

impl Default for ApplicationStore {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: current_timestamp(),
            applications: HashMap::new(),
        }
    }
}

impl ApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file, or create new if not exists
    pub async fn load(path: &str) -> crate::error::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| crate::error::BotError::ConfigParse {
                    path: path.to_string(),
                    source: e,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(crate::error::BotError::StateLoad {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    /// Save to a JSON file atomically
    pub async fn save(&self, path: &str) -> crate::error::Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = format!("{}.tmp", path);
        tokio::fs::write(&temp_path, &content).await.map_err(|e| {
            crate::error::BotError::StateSave {
                path: path.to_string(),
                source: e,
            }
        })?;

        tokio::fs::rename(&temp_path, path).await.map_err(|e| {
            crate::error::BotError::StateSave {
                path: path.to_string(),
                source: e,
            }
        })?;

        Ok(())
    }

    /// Find a record by Discord ID
    pub fn get(&self, user_id: &str) -> Option<&ApplicationRecord> {
        self.applications.get(user_id)
    }

    /// True when the user has already been approved or rejected
    pub fn has_terminal_record(&self, user_id: &str) -> bool {
        self.applications
            .get(user_id)
            .map(|r| r.status.is_terminal())
            .unwrap_or(false)
    }

    /// Insert or replace a record
    pub fn upsert(&mut self, record: ApplicationRecord) {
        self.applications.insert(record.user_id.clone(), record);
        self.last_updated = current_timestamp();
    }

    /// Record a decision. Returns false when no record exists for the user.
    pub fn set_decision(
        &mut self,
        user_id: &str,
        status: ApplicationStatus,
        decided_by: &str,
        auto: bool,
    ) -> bool {
        let Some(record) = self.applications.get_mut(user_id) else {
            return false;
        };

        record.status = status;
        record.decided_at = Some(current_timestamp());
        record.decided_by = Some(decided_by.to_string());
        record.auto_approved = auto;
        self.last_updated = current_timestamp();
        true
    }

    /// Remove a record entirely (staff reset)
    pub fn remove(&mut self, user_id: &str) -> Option<ApplicationRecord> {
        let removed = self.applications.remove(user_id);
        if removed.is_some() {
            self.last_updated = current_timestamp();
        }
        removed
    }

    pub fn record_count(&self) -> usize {
        self.applications.len()
    }
}

/// One whitelist application, created when the questionnaire completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Discord user ID (snowflake as string)
    pub user_id: String,

    /// Display label: `<roblox username> | <discord name>`
    pub user_display: String,

    /// Answers in question order (primary, then secondary when asked)
    pub answers: Vec<String>,

    /// Intake channel at submission time (snowflake as string)
    pub channel_id: String,

    /// Lifecycle status
    pub status: ApplicationStatus,

    /// When the questionnaire completed (Unix timestamp)
    pub submitted_at: u64,

    /// When a decision was recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<u64>,

    /// Who decided (staff display name, or the automatic evaluator)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,

    /// Whether the decision came from the automatic evaluation
    #[serde(default)]
    pub auto_approved: bool,

    /// Roblox profile snapshot captured during verification
    pub roblox: RobloxProfile,
}

impl ApplicationRecord {
    pub fn new(
        user_id: String,
        user_display: String,
        answers: Vec<String>,
        channel_id: String,
        roblox: RobloxProfile,
    ) -> Self {
        Self {
            user_id,
            user_display,
            answers,
            channel_id,
            status: ApplicationStatus::Pending,
            submitted_at: current_timestamp(),
            decided_at: None,
            decided_by: None,
            auto_approved: false,
            roblox,
        }
    }
}

/// Lifecycle status of a persisted application
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }
}

/// Shared application store type
pub type SharedApplicationStore = Arc<tokio::sync::RwLock<ApplicationStore>>;

pub fn create_shared_application_store(store: ApplicationStore) -> SharedApplicationStore {
    Arc::new(tokio::sync::RwLock::new(store))
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_profile() -> RobloxProfile {
        RobloxProfile {
            id: 42,
            username: "harbor_tester".to_string(),
            display_name: "Harbor Tester".to_string(),
            profile_url: "https://www.roblox.com/users/42/profile".to_string(),
            avatar_url: None,
            created_at: Utc::now(),
            description: "HarborRP".to_string(),
        }
    }

    fn sample_record(user_id: &str) -> ApplicationRecord {
        ApplicationRecord::new(
            user_id.to_string(),
            "harbor_tester | tester".to_string(),
            vec!["18".to_string()],
            "900".to_string(),
            sample_profile(),
        )
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = sample_record("123");
        assert_eq!(record.status, ApplicationStatus::Pending);
        assert!(!record.status.is_terminal());
        assert!(record.decided_at.is_none());
    }

    #[test]
    fn test_decision_makes_record_terminal() {
        let mut store = ApplicationStore::new();
        store.upsert(sample_record("123"));

        assert!(!store.has_terminal_record("123"));
        assert!(store.set_decision("123", ApplicationStatus::Approved, "StaffMember", false));
        assert!(store.has_terminal_record("123"));

        let record = store.get("123").unwrap();
        assert_eq!(record.status, ApplicationStatus::Approved);
        assert_eq!(record.decided_by.as_deref(), Some("StaffMember"));
        assert!(record.decided_at.is_some());
    }

    #[test]
    fn test_decision_on_missing_record_is_rejected() {
        let mut store = ApplicationStore::new();
        assert!(!store.set_decision("999", ApplicationStatus::Rejected, "StaffMember", false));
    }

    #[test]
    fn test_reset_removes_record_and_reenables() {
        let mut store = ApplicationStore::new();
        store.upsert(sample_record("123"));
        store.set_decision("123", ApplicationStatus::Rejected, "StaffMember", false);
        assert!(store.has_terminal_record("123"));

        let removed = store.remove("123");
        assert!(removed.is_some());
        assert!(!store.has_terminal_record("123"));
        assert!(store.get("123").is_none());
    }
}
