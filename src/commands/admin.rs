use poise::serenity_prelude as serenity;
use tracing::{error, info};

use crate::{Context, Error};

/// Completely reset a user's whitelist (Staff)
///
/// Erases the stored application, cancels any in-flight attempt and
/// deletes the intake channel, re-enabling `/whitelist` for the user.
#[poise::command(prefix_command, slash_command, guild_only, rename = "whitelist-reset")]
pub async fn whitelist_reset(
    ctx: Context<'_>,
    #[description = "User whose whitelist will be erased"] user: serenity::User,
) -> Result<(), Error> {
    let staff_role_id = {
        let config = ctx.data().config_manager.read().await;
        config.guild().staff_role_id
    };

    let is_staff = ctx
        .author_member()
        .await
        .map(|member| member.roles.iter().any(|r| r.get() == staff_role_id))
        .unwrap_or(false);

    if !is_staff {
        ctx.send(
            poise::CreateReply::default()
                .content("❌ You don't have permission to use this command.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let staff_label = ctx.author().name.clone();
    info!(
        "Staff '{}' requested whitelist reset for user {}",
        staff_label, user.id
    );

    match ctx
        .data()
        .whitelist_manager
        .reset(ctx.serenity_context(), &user, &staff_label)
        .await
    {
        Ok(outcome) => {
            let embed = serenity::CreateEmbed::new()
                .title("🔄 Whitelist Reset")
                .description(format!(
                    "The whitelist of <@{}> has been completely reset.",
                    user.id
                ))
                .field(
                    "📋 Details",
                    format!(
                        "Stored application erased: {}\nActive channel deleted: {}",
                        if outcome.removed_record.is_some() { "yes" } else { "no" },
                        if outcome.channel_deleted { "yes" } else { "no" }
                    ),
                    false,
                )
                .field(
                    "📧 Notification",
                    "The user has been sent a DM with their previous whitelist information",
                    false,
                )
                .color(0x3498db)
                .timestamp(serenity::Timestamp::now());

            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(e) => {
            error!("Whitelist reset for {} failed: {}", user.id, e);
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("❌ Error resetting the whitelist: {}", e))
                    .ephemeral(true),
            )
            .await?;
        }
    }

    Ok(())
}
