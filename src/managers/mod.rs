pub mod config_manager;
pub mod evaluation;
pub mod profile_client;
pub mod questionnaire;
pub mod review_gate;
pub mod verification_manager;
pub mod whitelist_manager;

pub use config_manager::{create_shared_config_manager, ConfigManager, SharedConfigManager};
pub use profile_client::ProfileClient;
pub use review_gate::{create_shared_review_gate, Decision, ReviewGate, SharedReviewGate};
pub use verification_manager::VerificationManager;
pub use whitelist_manager::{
    create_shared_whitelist_manager, SharedWhitelistManager, WhitelistManager,
};
