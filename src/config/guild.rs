use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};

/// Guild wiring for the whitelist pipeline, loaded from `whitelist.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Community name used in embed footers
    pub community_name: String,

    /// Category the private intake channels are created under
    pub whitelist_category_id: u64,

    /// Role that may review applications and reset users
    pub staff_role_id: u64,

    /// Channel where decision results are posted
    pub results_channel_id: u64,

    /// Channel where audit log entries are posted
    pub log_channel_id: u64,

    /// Roles granted when an application is approved
    pub approved_role_ids: Vec<u64>,

    /// Roles revoked when an application is approved (e.g. the pending role)
    pub pending_role_ids: Vec<u64>,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            community_name: "Harbor City RP".to_string(),
            whitelist_category_id: 0,
            staff_role_id: 0,
            results_channel_id: 0,
            log_channel_id: 0,
            approved_role_ids: Vec::new(),
            pending_role_ids: Vec::new(),
        }
    }
}

impl GuildConfig {
    /// Load from a JSON file
    pub async fn load(path: &str) -> Result<Self> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| BotError::ConfigLoad {
                    path: path.to_string(),
                    source: e,
                })?;

        serde_json::from_str(&content).map_err(|e| BotError::ConfigParse {
            path: path.to_string(),
            source: e,
        })
    }

    pub fn footer(&self) -> String {
        format!("{} - Whitelist System", self.community_name)
    }
}
