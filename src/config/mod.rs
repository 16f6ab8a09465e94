pub mod guild;
pub mod questions;

pub use guild::GuildConfig;
pub use questions::{QuestionConfig, QuestionSpec};
