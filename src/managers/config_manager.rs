use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{GuildConfig, QuestionConfig};
use crate::error::Result;

/// Loads and serves the guild wiring and question sets
///
/// Structure:
/// data/
/// ├── whitelist.json   # Guild wiring (category, roles, channels)
/// └── questions.json   # Question sets + rubrics (optional override)
pub struct ConfigManager {
    /// Base path for data files
    data_path: String,

    /// Guild wiring
    guild: GuildConfig,

    /// Question sets; compiled-in defaults unless overridden
    questions: QuestionConfig,
}

impl ConfigManager {
    pub fn new(data_path: &str) -> Self {
        Self {
            data_path: data_path.to_string(),
            guild: GuildConfig::default(),
            questions: QuestionConfig::default(),
        }
    }

    /// Load all configurations from the data directory
    pub async fn load_all(&mut self) -> Result<()> {
        let guild_path = format!("{}/whitelist.json", self.data_path);
        if std::path::Path::new(&guild_path).exists() {
            match GuildConfig::load(&guild_path).await {
                Ok(config) => {
                    info!("Loaded guild wiring from whitelist.json");
                    self.guild = config;
                }
                Err(e) => warn!("Failed to load whitelist.json: {}", e),
            }
        } else {
            warn!(
                "No whitelist.json found at {}, using defaults (intake will be unusable until configured)",
                guild_path
            );
        }

        let questions_path = format!("{}/questions.json", self.data_path);
        if std::path::Path::new(&questions_path).exists() {
            match QuestionConfig::load(&questions_path).await {
                Ok(config) => {
                    info!(
                        "Loaded question override: {} primary, {} secondary",
                        config.primary.len(),
                        config.secondary.len()
                    );
                    self.questions = config;
                }
                Err(e) => warn!("Failed to load questions.json: {}", e),
            }
        }

        Ok(())
    }

    pub fn guild(&self) -> &GuildConfig {
        &self.guild
    }

    pub fn questions(&self) -> &QuestionConfig {
        &self.questions
    }

    /// Replace the guild wiring at runtime
    pub fn set_guild_config(&mut self, guild: GuildConfig) {
        self.guild = guild;
    }
}

/// Shared config manager type
pub type SharedConfigManager = Arc<tokio::sync::RwLock<ConfigManager>>;

pub fn create_shared_config_manager(data_path: &str) -> SharedConfigManager {
    Arc::new(tokio::sync::RwLock::new(ConfigManager::new(data_path)))
}
