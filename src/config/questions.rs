use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};

/// One scripted question together with its scoring rubric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// The prompt shown to the applicant
    pub prompt: String,

    /// Keywords counted (case-insensitively) in the answer
    pub keywords: Vec<String>,

    /// Weight of this question in the overall percentage
    pub weight: u32,
}

impl QuestionSpec {
    fn new(prompt: &str, keywords: &[&str], weight: u32) -> Self {
        Self {
            prompt: prompt.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            weight,
        }
    }
}

/// The two fixed question sets, loaded from `questions.json` or compiled-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionConfig {
    /// Primary set, asked to every applicant
    pub primary: Vec<QuestionSpec>,

    /// Supplementary set, asked when the primary score falls short
    pub secondary: Vec<QuestionSpec>,
}

impl Default for QuestionConfig {
    fn default() -> Self {
        Self {
            primary: vec![
                QuestionSpec::new(
                    "How old are you?",
                    &[
                        "15", "16", "17", "18", "19", "20", "21", "22", "23", "24", "25",
                    ],
                    5,
                ),
                QuestionSpec::new(
                    "What does metagaming (MG) mean to you?",
                    &[
                        "metagaming",
                        "meta gaming",
                        "information",
                        "ic",
                        "ooc",
                        "out of character",
                        "advantage",
                        "outside",
                        "knows",
                        "character",
                        "uses",
                        "decisions",
                    ],
                    15,
                ),
                QuestionSpec::new(
                    "What is the difference between RK and CK?",
                    &[
                        "revenge kill",
                        "revenge",
                        "character kill",
                        "permanent",
                        "death",
                        "character",
                        "returns",
                        "comes back",
                        "fail rp",
                        "ck",
                        "rk",
                    ],
                    15,
                ),
                QuestionSpec::new(
                    "Do you have previous roleplay experience? Describe it briefly.",
                    &[
                        "yes",
                        "experience",
                        "roleplay",
                        "servers",
                        "games",
                        "roblox",
                        "fivem",
                    ],
                    10,
                ),
                QuestionSpec::new(
                    "Why do you want to join our server?",
                    &[
                        "roleplay",
                        "fun",
                        "friends",
                        "community",
                        "experience",
                        "entertainment",
                    ],
                    10,
                ),
                QuestionSpec::new(
                    "What would you do if two police officers aim their weapons at you?",
                    &[
                        "hands",
                        "surrender",
                        "obey",
                        "comply",
                        "cooperate",
                        "raise",
                        "freeze",
                        "not resist",
                        "stop",
                    ],
                    15,
                ),
                QuestionSpec::new(
                    "What roles would you play on our server?",
                    &[
                        "civilian", "citizen", "police", "medic", "mechanic", "job", "work",
                    ],
                    10,
                ),
                QuestionSpec::new(
                    "What is roleplay?",
                    &[
                        "portray",
                        "act",
                        "character",
                        "simulation",
                        "real",
                        "life",
                        "role",
                        "playing a role",
                    ],
                    20,
                ),
            ],
            secondary: vec![
                QuestionSpec::new(
                    "What is PK (player kill) and what does it mean for your character?",
                    &[
                        "player kill",
                        "pk",
                        "death",
                        "character",
                        "memory",
                        "loss",
                        "faction",
                        "organization",
                        "previous life",
                    ],
                    10,
                ),
                QuestionSpec::new(
                    "What do IC and OOC mean? Explain the difference.",
                    &[
                        "in character",
                        "out of character",
                        "ic",
                        "ooc",
                        "character",
                        "outside",
                        "inside",
                        "role",
                        "game",
                    ],
                    10,
                ),
                QuestionSpec::new(
                    "What is car kill and when can it be applied?",
                    &[
                        "car kill",
                        "ck",
                        "vehicle",
                        "run over",
                        "kill",
                        "car",
                        "low health",
                    ],
                    10,
                ),
                QuestionSpec::new(
                    "What is VDM (vehicle deathmatch)?",
                    &[
                        "vehicle deathmatch",
                        "vdm",
                        "vehicle",
                        "weapon",
                        "intentional",
                        "no reason",
                        "unjustified",
                        "damage",
                    ],
                    10,
                ),
                QuestionSpec::new(
                    "What is bad driving (BD) and why should it be avoided?",
                    &[
                        "bad driving",
                        "bd",
                        "traffic",
                        "laws",
                        "realistic",
                        "crash",
                        "reckless",
                        "high speed",
                    ],
                    10,
                ),
            ],
        }
    }
}

impl QuestionConfig {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_primary_weights_sum_to_hundred() {
        let config = QuestionConfig::default();
        let total: u32 = config.primary.iter().map(|q| q.weight).sum();
        assert_eq!(total, 100);
        assert_eq!(config.primary.len(), 8);
    }

    #[test]
    fn test_default_secondary_set() {
        let config = QuestionConfig::default();
        assert_eq!(config.secondary.len(), 5);
        assert!(config.secondary.iter().all(|q| q.weight == 10));
    }
}
