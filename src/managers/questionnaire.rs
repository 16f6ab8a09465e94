use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{ChannelId, MessageId, UserId};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::QuestionSpec;
use crate::error::{BotError, Result};

/// Seconds the applicant has to answer each question
pub const QUESTION_TIMEOUT_SECS: u64 = 300;

/// Which of the two fixed sets is being asked; picks the embed dressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionnaireKind {
    Primary,
    Supplementary,
}

impl QuestionnaireKind {
    fn title(&self, index: usize, total: usize) -> String {
        match self {
            QuestionnaireKind::Primary => format!("📋 Question {} of {}", index, total),
            QuestionnaireKind::Supplementary => {
                format!("📚 Supplementary Question {} of {}", index, total)
            }
        }
    }

    fn color(&self) -> u32 {
        match self {
            QuestionnaireKind::Primary => 0x3498db,
            QuestionnaireKind::Supplementary => 0xe67e22,
        }
    }
}

/// Ask every question in order, waiting for the applicant's next message in
/// the intake channel after each one. A single unanswered question aborts
/// the whole run; there is no partial submission.
///
/// Prompts and answers are scaffolding and are deleted once the full set
/// has been collected; deletion failures are logged and ignored.
pub async fn run(
    ctx: &serenity::Context,
    applicant: UserId,
    channel_id: ChannelId,
    questions: &[QuestionSpec],
    kind: QuestionnaireKind,
    footer: &str,
) -> Result<Vec<String>> {
    let mut answers = Vec::with_capacity(questions.len());
    let mut scaffolding: Vec<MessageId> = Vec::new();

    for (i, question) in questions.iter().enumerate() {
        let embed = serenity::CreateEmbed::new()
            .title(kind.title(i + 1, questions.len()))
            .description(&question.prompt)
            .color(kind.color())
            .footer(serenity::CreateEmbedFooter::new(footer))
            .timestamp(serenity::Timestamp::now());

        let prompt = channel_id
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
            .await?;
        scaffolding.push(prompt.id);

        let reply = serenity::MessageCollector::new(ctx.shard.clone())
            .channel_id(channel_id)
            .author_id(applicant)
            .timeout(Duration::from_secs(QUESTION_TIMEOUT_SECS))
            .await;

        match reply {
            Some(message) => {
                answers.push(message.content.clone());
                scaffolding.push(message.id);
            }
            None => {
                debug!(
                    "User {} left question {} unanswered, aborting questionnaire",
                    applicant,
                    i + 1
                );

                let notice = channel_id
                    .send_message(
                        &ctx.http,
                        serenity::CreateMessage::new().content("⏰ Time's up. Whitelist cancelled."),
                    )
                    .await;

                tokio::time::sleep(Duration::from_secs(5)).await;
                if let Ok(notice) = notice {
                    if let Err(e) = notice.delete(&ctx.http).await {
                        debug!("Could not delete timeout notice: {}", e);
                    }
                }

                return Err(BotError::QuestionnaireTimeout);
            }
        }
    }

    // Keep the transcript clean for the staff embed that follows
    for message_id in scaffolding {
        if let Err(e) = channel_id.delete_message(&ctx.http, message_id).await {
            warn!(
                "Could not delete questionnaire message {} in {}: {}",
                message_id, channel_id, e
            );
        }
    }

    Ok(answers)
}
