use poise::serenity_prelude as serenity;
use tracing::{debug, error, info};

use crate::error::BotError;
use crate::managers::Decision;
use crate::{Data, Error};

/// Decode a review action from a button's custom id
///
/// The action identifier carries the applicant's user id; the decision is
/// resolved against the stored application state, never against the
/// message the button happens to sit on.
fn parse_review_action(custom_id: &str) -> Option<(Decision, serenity::UserId)> {
    let (action, raw_id) = custom_id.split_once(':')?;
    let decision = match action {
        "wl_approve" => Decision::Approve,
        "wl_reject" => Decision::Reject,
        _ => return None,
    };
    let id = raw_id.parse::<u64>().ok().filter(|id| *id != 0)?;
    Some((decision, serenity::UserId::new(id)))
}

/// Handle component interactions (the staff approve/reject buttons)
pub async fn handle_interaction(
    ctx: &serenity::Context,
    interaction: &serenity::Interaction,
    data: &Data,
) -> Result<(), Error> {
    let serenity::Interaction::Component(component) = interaction else {
        return Ok(());
    };

    let Some((decision, applicant_id)) = parse_review_action(&component.data.custom_id) else {
        return Ok(());
    };

    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    let actor_roles: Vec<serenity::RoleId> = component
        .member
        .as_ref()
        .map(|m| m.roles.clone())
        .unwrap_or_default();
    let actor_label = component.user.name.clone();

    debug!(
        "Review button {:?} for applicant {} pressed by {}",
        decision, applicant_id, actor_label
    );

    match data
        .review_gate
        .decide(applicant_id, decision, &actor_roles, &actor_label)
        .await
    {
        Ok(_record) => {
            let verb = match decision {
                Decision::Approve => "approved",
                Decision::Reject => "rejected",
            };
            respond(ctx, component, &format!(
                "✅ Whitelist {} successfully. The channel will be removed in a few seconds.",
                verb
            ))
            .await;

            // The buttons have served their purpose
            let mut message = (*component.message).clone();
            if let Err(e) = message
                .edit(&ctx.http, serenity::EditMessage::new().components(vec![]))
                .await
            {
                debug!("Could not disable review buttons: {}", e);
            }

            match data
                .whitelist_manager
                .finalize_decision(
                    ctx,
                    guild_id,
                    applicant_id,
                    decision.status(),
                    &actor_label,
                    false,
                )
                .await
            {
                Ok(0) => {}
                Ok(failures) => {
                    info!(
                        "Decision for {} recorded with {} side-effect failures",
                        applicant_id, failures
                    );
                    followup(ctx, component, &format!(
                        "⚠️ The decision was recorded, but {} role/nickname change(s) failed. \
                         Check the bot's permissions and apply them manually.",
                        failures
                    ))
                    .await;
                }
                Err(e) => {
                    error!(
                        "Failed to finalize decision for applicant {}: {}",
                        applicant_id, e
                    );
                    followup(ctx, component, &format!("❌ Failed to apply the decision: {}", e))
                        .await;
                }
            }

            data.review_gate.finish(applicant_id);
        }
        Err(BotError::Unauthorized) => {
            respond(ctx, component, "❌ Only staff can use this button.").await;
        }
        Err(BotError::AlreadyDecided) => {
            respond(ctx, component, "❌ This application has already been decided.").await;
        }
        Err(e) => {
            error!(
                "Review decision for applicant {} failed: {}",
                applicant_id, e
            );
            respond(ctx, component, &format!("❌ Error processing the decision: {}", e)).await;
        }
    }

    Ok(())
}

async fn respond(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    content: &str,
) {
    if let Err(e) = component
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await
    {
        debug!("Could not respond to component interaction: {}", e);
    }
}

async fn followup(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    content: &str,
) {
    if let Err(e) = component
        .create_followup(
            &ctx.http,
            serenity::CreateInteractionResponseFollowup::new()
                .content(content)
                .ephemeral(true),
        )
        .await
    {
        debug!("Could not send component followup: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_review_action() {
        let (decision, user) = parse_review_action("wl_approve:123").unwrap();
        assert_eq!(decision, Decision::Approve);
        assert_eq!(user, serenity::UserId::new(123));

        let (decision, _) = parse_review_action("wl_reject:456").unwrap();
        assert_eq!(decision, Decision::Reject);
    }

    #[test]
    fn test_parse_review_action_rejects_foreign_ids() {
        assert!(parse_review_action("config_global").is_none());
        assert!(parse_review_action("wl_approve:").is_none());
        assert!(parse_review_action("wl_approve:zero").is_none());
        assert!(parse_review_action("wl_approve:0").is_none());
        assert!(parse_review_action("wl_ban:123").is_none());
    }
}
