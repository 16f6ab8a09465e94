use poise::serenity_prelude as serenity;
use tracing::{error, info};

use crate::error::BotError;
use crate::{Context, Error};

/// Start your whitelist process
///
/// Opens a private channel and walks you through Roblox account linking
/// and the whitelist questionnaire.
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn whitelist(ctx: Context<'_>) -> Result<(), Error> {
    start_intake(ctx, false).await
}

/// Restart your whitelist process after a timeout
#[poise::command(prefix_command, slash_command, guild_only, rename = "whitelist-restart")]
pub async fn whitelist_restart(ctx: Context<'_>) -> Result<(), Error> {
    start_intake(ctx, true).await
}

async fn start_intake(ctx: Context<'_>, restart: bool) -> Result<(), Error> {
    let user = ctx.author().clone();
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let manager = &ctx.data().whitelist_manager;

    match manager.begin_attempt(user.id).await {
        Ok(()) => {}
        Err(BotError::DuplicateAttempt) => {
            ctx.send(
                poise::CreateReply::default()
                    .content("❌ You already have an active whitelist channel.")
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
        Err(BotError::AlreadyDecided) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(
                        "❌ You have already completed your whitelist. Only one whitelist \
                         per user is allowed; ask staff for a reset if this is a mistake.",
                    )
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    match manager
        .open_intake_channel(ctx.serenity_context(), guild_id, &user)
        .await
    {
        Ok(channel_id) => {
            info!(
                "Whitelist intake started for {} (restart: {})",
                user.id, restart
            );

            if restart {
                let embed = serenity::CreateEmbed::new()
                    .title("🔄 Whitelist Restarted")
                    .description(format!(
                        "**Welcome back!** A new channel was created to complete your \
                         whitelist: <#{}>",
                        channel_id
                    ))
                    .field(
                        "⏰ Reminder",
                        "You have **5 minutes** to complete the Roblox verification once \
                         the process starts.",
                        false,
                    )
                    .color(0x3498db)
                    .timestamp(serenity::Timestamp::now());
                ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                    .await?;
            } else {
                ctx.send(
                    poise::CreateReply::default()
                        .content(format!("✅ Whitelist channel created: <#{}>", channel_id))
                        .ephemeral(true),
                )
                .await?;
            }

            manager.spawn_flow(
                ctx.serenity_context().clone(),
                guild_id,
                user,
                channel_id,
                restart,
            );
        }
        Err(e) => {
            error!("Could not open intake channel for {}: {}", user.id, e);
            manager.release_attempt(user.id);
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("❌ Could not create the whitelist channel: {}", e))
                    .ephemeral(true),
            )
            .await?;
        }
    }

    Ok(())
}
