use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{ChannelId, GuildId, Http, RoleId, UserId};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

use crate::config::{GuildConfig, QuestionSpec};
use crate::error::{BotError, Result};
use crate::managers::config_manager::SharedConfigManager;
use crate::managers::evaluation::{self, CombinedEvaluation, Evaluation, Recommendation};
use crate::managers::profile_client::{ProfileClient, RobloxProfile};
use crate::managers::questionnaire::{self, QuestionnaireKind};
use crate::managers::verification_manager::{VerificationManager, VERIFICATION_WINDOW_SECS};
use crate::state::{ApplicationRecord, ApplicationStatus, SharedApplicationStore};

/// Grace delay before a channel is deleted after a timeout notice
const TIMEOUT_TEARDOWN_DELAY: Duration = Duration::from_secs(10);

/// Grace delay before a channel is deleted after a decision notice
const DECISION_TEARDOWN_DELAY: Duration = Duration::from_secs(5);

/// Pacing between stage announcements
const STAGE_PACING: Duration = Duration::from_secs(3);

/// Discord's nickname length budget
const NICKNAME_MAX: usize = 32;

/// One in-flight whitelist attempt. The channel id is filled in once the
/// private channel exists; the entry itself is claimed first so a doubled
/// intake command cannot open two channels.
#[derive(Debug, Clone)]
pub struct ActiveAttempt {
    pub channel_id: Option<ChannelId>,
    pub started_at: u64,
}

/// Outcome of a staff reset, for the confirmation embed
#[derive(Debug)]
pub struct ResetOutcome {
    pub channel_deleted: bool,
    pub removed_record: Option<ApplicationRecord>,
}

/// Drives each applicant through verification, questionnaire, evaluation
/// and decision. One independent task per applicant; the active-attempts
/// map is the registry and doubles as the cancellation token (a cleared
/// entry aborts the owning task at its next stage boundary).
pub struct WhitelistManager {
    config: SharedConfigManager,
    store: SharedApplicationStore,
    verification: VerificationManager,
    profiles: ProfileClient,
    active: DashMap<UserId, ActiveAttempt>,
    store_path: String,
}

impl WhitelistManager {
    pub fn new(
        config: SharedConfigManager,
        store: SharedApplicationStore,
        store_path: &str,
    ) -> Self {
        Self {
            config,
            store,
            verification: VerificationManager::new(),
            profiles: ProfileClient::new(),
            active: DashMap::new(),
            store_path: store_path.to_string(),
        }
    }

    /// Claim an attempt slot for the user, enforcing the one-shot policy.
    ///
    /// `DuplicateAttempt` when an attempt is already in flight;
    /// `AlreadyDecided` when a terminal record exists (only a staff reset
    /// clears it).
    pub async fn begin_attempt(&self, user_id: UserId) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.active.entry(user_id) {
            Entry::Occupied(_) => return Err(BotError::DuplicateAttempt),
            Entry::Vacant(slot) => {
                slot.insert(ActiveAttempt {
                    channel_id: None,
                    started_at: current_timestamp(),
                });
            }
        }

        let terminal = {
            let store = self.store.read().await;
            store.has_terminal_record(&user_id.to_string())
        };

        if terminal {
            self.active.remove(&user_id);
            return Err(BotError::AlreadyDecided);
        }

        Ok(())
    }

    /// Drop a claimed attempt (channel creation failed, staff reset, ...)
    pub fn release_attempt(&self, user_id: UserId) {
        self.active.remove(&user_id);
    }

    pub fn is_active(&self, user_id: UserId) -> bool {
        self.active.contains_key(&user_id)
    }

    fn still_active(&self, user_id: UserId) -> bool {
        self.is_active(user_id)
    }

    /// Create the private intake channel under the whitelist category
    pub async fn open_intake_channel(
        &self,
        ctx: &serenity::Context,
        guild_id: GuildId,
        user: &serenity::User,
    ) -> Result<ChannelId> {
        let guild_cfg = {
            let config = self.config.read().await;
            config.guild().clone()
        };

        if guild_cfg.whitelist_category_id == 0 || guild_cfg.staff_role_id == 0 {
            return Err(BotError::ChannelNotFound {
                name: "whitelist category".to_string(),
            });
        }

        let everyone = RoleId::new(guild_id.get());
        let overwrites = vec![
            serenity::PermissionOverwrite {
                allow: serenity::Permissions::empty(),
                deny: serenity::Permissions::VIEW_CHANNEL,
                kind: serenity::PermissionOverwriteType::Role(everyone),
            },
            serenity::PermissionOverwrite {
                allow: serenity::Permissions::VIEW_CHANNEL | serenity::Permissions::SEND_MESSAGES,
                deny: serenity::Permissions::empty(),
                kind: serenity::PermissionOverwriteType::Member(user.id),
            },
            serenity::PermissionOverwrite {
                allow: serenity::Permissions::VIEW_CHANNEL | serenity::Permissions::SEND_MESSAGES,
                deny: serenity::Permissions::empty(),
                kind: serenity::PermissionOverwriteType::Role(RoleId::new(guild_cfg.staff_role_id)),
            },
        ];

        let channel = guild_id
            .create_channel(
                &ctx.http,
                serenity::CreateChannel::new(format!("whitelist-{}", user.name.to_lowercase()))
                    .category(ChannelId::new(guild_cfg.whitelist_category_id))
                    .permissions(overwrites),
            )
            .await?;

        if let Some(mut attempt) = self.active.get_mut(&user.id) {
            attempt.channel_id = Some(channel.id);
        }

        info!(
            "Opened intake channel {} for user {}",
            channel.id, user.id
        );
        Ok(channel.id)
    }

    /// Run the applicant's whole flow as an independent task
    pub fn spawn_flow(
        self: &Arc<Self>,
        ctx: serenity::Context,
        guild_id: GuildId,
        user: serenity::User,
        channel_id: ChannelId,
        restart: bool,
    ) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = manager
                .run_flow(&ctx, guild_id, &user, channel_id, restart)
                .await
            {
                error!("Whitelist flow for user {} failed: {}", user.id, e);
                let _ = channel_id
                    .send_message(
                        &ctx.http,
                        serenity::CreateMessage::new()
                            .content(format!("❌ The whitelist process hit an error: {}", e)),
                    )
                    .await;
            }
        });
    }

    async fn run_flow(
        &self,
        ctx: &serenity::Context,
        guild_id: GuildId,
        user: &serenity::User,
        channel_id: ChannelId,
        restart: bool,
    ) -> Result<()> {
        let (guild_cfg, questions) = {
            let config = self.config.read().await;
            (config.guild().clone(), config.questions().clone())
        };
        let footer = guild_cfg.footer();

        if restart {
            let welcome = serenity::CreateEmbed::new()
                .title("🎉 Whitelist Process Restarted")
                .description(format!(
                    "Welcome back <@{}>! This is your new whitelist channel.\n\n\
                     Verification starts in a moment; have your Roblox profile ready.",
                    user.id
                ))
                .color(0x2ecc71)
                .footer(serenity::CreateEmbedFooter::new(footer.clone()))
                .timestamp(serenity::Timestamp::now());
            channel_id
                .send_message(&ctx.http, serenity::CreateMessage::new().embed(welcome))
                .await?;
            tokio::time::sleep(STAGE_PACING).await;
        }

        // Stage 1: account linking
        let Some(profile) = self
            .run_verification(ctx, user, channel_id, &guild_cfg)
            .await?
        else {
            // Timed out; teardown already happened
            return Ok(());
        };

        if !self.still_active(user.id) {
            debug!("Attempt of user {} was reset mid-verification", user.id);
            return Ok(());
        }

        self.announce_profile(ctx, channel_id, &profile, &footer)
            .await?;
        tokio::time::sleep(STAGE_PACING).await;

        // Stage 2: primary questionnaire
        let answers = match questionnaire::run(
            ctx,
            user.id,
            channel_id,
            &questions.primary,
            QuestionnaireKind::Primary,
            &footer,
        )
        .await
        {
            Ok(answers) => answers,
            Err(BotError::QuestionnaireTimeout) => {
                self.teardown_after_timeout(ctx, user, channel_id, &guild_cfg)
                    .await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if !self.still_active(user.id) {
            debug!("Attempt of user {} was reset mid-questionnaire", user.id);
            return Ok(());
        }

        // Stage 3: evaluation and branching
        let primary_eval = evaluation::score_primary(&answers, &questions.primary);
        info!(
            "User {} scored {:.1}% on the primary questionnaire ({:?})",
            user.id, primary_eval.percentage, primary_eval.recommendation
        );

        if primary_eval.recommendation == Recommendation::NeedsSupplementary {
            return self
                .run_supplementary_round(
                    ctx, guild_id, user, channel_id, &guild_cfg, &questions.secondary, profile,
                    answers, primary_eval,
                )
                .await;
        }

        let user_display = format!("{} | {}", profile.username, user.name);
        let record = ApplicationRecord::new(
            user.id.to_string(),
            user_display,
            answers.clone(),
            channel_id.to_string(),
            profile.clone(),
        );
        self.store.write().await.upsert(record);
        self.persist_store().await;

        if primary_eval.auto_approve {
            self.finalize_decision(
                ctx,
                guild_id,
                user.id,
                ApplicationStatus::Approved,
                "AutoMod",
                true,
            )
            .await?;
        } else {
            self.post_for_review(
                ctx,
                user,
                channel_id,
                &guild_cfg,
                &profile,
                &answers,
                &questions.primary,
                &primary_evaluation_field(&primary_eval),
                Some(&primary_eval.answer_scores),
            )
            .await?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_supplementary_round(
        &self,
        ctx: &serenity::Context,
        guild_id: GuildId,
        user: &serenity::User,
        channel_id: ChannelId,
        guild_cfg: &GuildConfig,
        secondary_questions: &[QuestionSpec],
        profile: RobloxProfile,
        primary_answers: Vec<String>,
        primary_eval: Evaluation,
    ) -> Result<()> {
        let footer = guild_cfg.footer();

        let notice = serenity::CreateEmbed::new()
            .title("📚 Supplementary Roleplay Questions")
            .description(format!(
                "<@{}>, a few more questions about roleplay basics are needed.",
                user.id
            ))
            .field(
                "📊 Initial Score",
                format!(
                    "**{:.1}%** — these questions are your chance to show your \
                     roleplay knowledge",
                    primary_eval.percentage
                ),
                false,
            )
            .color(0xe67e22)
            .footer(serenity::CreateEmbedFooter::new(footer.clone()))
            .timestamp(serenity::Timestamp::now());
        channel_id
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(notice))
            .await?;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let secondary_answers = match questionnaire::run(
            ctx,
            user.id,
            channel_id,
            secondary_questions,
            QuestionnaireKind::Supplementary,
            &footer,
        )
        .await
        {
            Ok(answers) => answers,
            Err(BotError::QuestionnaireTimeout) => {
                self.teardown_after_timeout(ctx, user, channel_id, guild_cfg)
                    .await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if !self.still_active(user.id) {
            return Ok(());
        }

        let secondary_pct = evaluation::score_secondary(&secondary_answers, secondary_questions);
        let combined = evaluation::score_combined(primary_eval.percentage, secondary_pct);
        info!(
            "User {} combined score {:.1}% ({:?})",
            user.id, combined.combined_percentage, combined.recommendation
        );

        let mut all_answers = primary_answers;
        all_answers.extend(secondary_answers);

        let user_display = format!("{} | {}", profile.username, user.name);
        let record = ApplicationRecord::new(
            user.id.to_string(),
            user_display,
            all_answers.clone(),
            channel_id.to_string(),
            profile.clone(),
        );
        self.store.write().await.upsert(record);
        self.persist_store().await;

        if combined.auto_approve {
            self.finalize_decision(
                ctx,
                guild_id,
                user.id,
                ApplicationStatus::Approved,
                "AutoMod",
                true,
            )
            .await?;
        } else {
            let questions_for_display = {
                let config = self.config.read().await;
                config.questions().primary.clone()
            };
            self.post_for_review(
                ctx,
                user,
                channel_id,
                guild_cfg,
                &profile,
                &all_answers,
                &questions_for_display,
                &combined_evaluation_field(&combined),
                None,
            )
            .await?;
        }

        Ok(())
    }

    /// Account-linking stage. `Ok(None)` means the window expired and the
    /// attempt has been torn down.
    async fn run_verification(
        &self,
        ctx: &serenity::Context,
        user: &serenity::User,
        channel_id: ChannelId,
        guild_cfg: &GuildConfig,
    ) -> Result<Option<RobloxProfile>> {
        let challenge = self.verification.begin(user.id, channel_id);

        let instructions = serenity::CreateEmbed::new()
            .title("🎮 Link Your Roblox Account")
            .description("To continue with your whitelist, link your Roblox account.")
            .field(
                "📋 Instructions",
                "1. Open your Roblox profile\n\
                 2. Edit your description and add the verification code\n\
                 3. Send your exact Roblox username in this channel",
                false,
            )
            .field("🔑 Verification Code", format!("```{}```", challenge.code), false)
            .field(
                "⏰ Time Limit",
                "**You have 5 minutes to complete the verification.**\n\
                 The whitelist is cancelled automatically when time runs out.",
                false,
            )
            .color(0x3498db)
            .footer(serenity::CreateEmbedFooter::new(guild_cfg.footer()))
            .timestamp(serenity::Timestamp::now());

        channel_id
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(instructions))
            .await?;

        // A fixed deadline covers the whole window; lookup failures and
        // code mismatches are retryable until it passes.
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(VERIFICATION_WINDOW_SECS);

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            let reply = serenity::MessageCollector::new(ctx.shard.clone())
                .channel_id(channel_id)
                .author_id(user.id)
                .timeout(remaining)
                .await;

            let Some(message) = reply else {
                break;
            };

            let username = message.content.trim();
            match self
                .verification
                .attempt(user.id, username, &self.profiles)
                .await
            {
                Ok(profile) => return Ok(Some(profile)),
                Err(BotError::ProfileNotFound { username }) => {
                    let _ = channel_id
                        .send_message(
                            &ctx.http,
                            serenity::CreateMessage::new().content(format!(
                                "❌ Roblox user `{}` was not found. Check the spelling and try again.",
                                username
                            )),
                        )
                        .await;
                }
                Err(BotError::CodeMismatch {
                    expected,
                    description,
                }) => {
                    let excerpt: String = description.chars().take(200).collect();
                    let failed = serenity::CreateEmbed::new()
                        .title("❌ Verification Failed")
                        .description("The verification code was not found in your profile description.")
                        .field("🔑 Expected Code", format!("```{}```", expected), false)
                        .field("📝 Current Description", format!("```{}```", excerpt), false)
                        .color(0xe74c3c);
                    let _ = channel_id
                        .send_message(&ctx.http, serenity::CreateMessage::new().embed(failed))
                        .await;
                }
                Err(BotError::VerificationTimeout) => {
                    // The timeout claimed the challenge between the code
                    // match and our completion; the teardown is theirs.
                    return Ok(None);
                }
                Err(e) => {
                    warn!("Profile lookup for user {} failed: {}", user.id, e);
                    let _ = channel_id
                        .send_message(
                            &ctx.http,
                            serenity::CreateMessage::new().content(
                                "⚠️ The profile service did not answer. Try again in a moment.",
                            ),
                        )
                        .await;
                }
            }
        }

        // Window expired. Only the path that still finds the challenge
        // performs the teardown; a racing success has already removed it.
        if self.verification.expire(user.id) {
            self.teardown_after_timeout(ctx, user, channel_id, guild_cfg)
                .await;
        }
        Ok(None)
    }

    /// Show the captured profile before the questionnaire starts
    async fn announce_profile(
        &self,
        ctx: &serenity::Context,
        channel_id: ChannelId,
        profile: &RobloxProfile,
        footer: &str,
    ) -> Result<()> {
        let mut embed = serenity::CreateEmbed::new()
            .title("✅ Roblox Account Verified")
            .description("Your Roblox account has been linked. A few questions follow.")
            .field("👤 Roblox Name", &profile.username, true)
            .field("🏷️ Display Name", &profile.display_name, true)
            .field(
                "🔗 Profile",
                format!("[View Profile]({})", profile.profile_url),
                true,
            )
            .field("📅 Account Age", profile.account_age(), true)
            .field("📆 Created", profile.created_date(), true)
            .color(0x2ecc71)
            .footer(serenity::CreateEmbedFooter::new(footer))
            .timestamp(serenity::Timestamp::now());
        if let Some(url) = &profile.avatar_url {
            embed = embed.thumbnail(url);
        }

        channel_id
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
            .await?;
        Ok(())
    }

    /// Persist the pending record's staff embed with approve/reject buttons
    #[allow(clippy::too_many_arguments)]
    async fn post_for_review(
        &self,
        ctx: &serenity::Context,
        user: &serenity::User,
        channel_id: ChannelId,
        guild_cfg: &GuildConfig,
        profile: &RobloxProfile,
        answers: &[String],
        questions: &[QuestionSpec],
        evaluation_field: &str,
        answer_scores: Option<&[u8]>,
    ) -> Result<()> {
        let mut embed = serenity::CreateEmbed::new()
            .title("📋 Whitelist Application")
            .description(format!(
                "**User:** {} | {}\n**Discord:** <@{}>\n**ID:** {}",
                profile.username, user.name, user.id, user.id
            ))
            .field("🤖 Automatic Evaluation", evaluation_field, false)
            .field(
                "🎮 Roblox Information",
                format!(
                    "**Name:** {}\n**Display:** {}\n**Profile:** [View Profile]({})\n**Account Age:** {}",
                    profile.username,
                    profile.display_name,
                    profile.profile_url,
                    profile.account_age()
                ),
                false,
            )
            .color(0xf1c40f)
            .footer(serenity::CreateEmbedFooter::new(guild_cfg.footer()))
            .timestamp(serenity::Timestamp::now());

        for (i, (question, answer)) in questions.iter().zip(answers).enumerate() {
            let marker = answer_scores
                .and_then(|scores| scores.get(i))
                .map(|s| format!(" {}", evaluation::score_emoji(*s)))
                .unwrap_or_default();
            embed = embed.field(
                format!("**{}. {}**{}", i + 1, question.prompt, marker),
                truncate_display(answer, 150),
                false,
            );
        }

        if let Some(url) = &profile.avatar_url {
            embed = embed.thumbnail(url);
        }

        let buttons = vec![
            serenity::CreateButton::new(format!("wl_approve:{}", user.id))
                .label("✅ Approve Whitelist")
                .style(serenity::ButtonStyle::Success),
            serenity::CreateButton::new(format!("wl_reject:{}", user.id))
                .label("❌ Reject Whitelist")
                .style(serenity::ButtonStyle::Danger),
        ];

        channel_id
            .send_message(
                &ctx.http,
                serenity::CreateMessage::new()
                    .content(format!(
                        "<@&{}> New whitelist application:",
                        guild_cfg.staff_role_id
                    ))
                    .embed(embed)
                    .components(vec![serenity::CreateActionRow::Buttons(buttons)]),
            )
            .await?;

        info!("Application of user {} handed to staff review", user.id);
        Ok(())
    }

    /// Apply a decision end to end: side effects, notifications, audit log,
    /// and only then the recorded status. Partial side-effect failures are
    /// logged and counted but never block the decision from being recorded.
    pub async fn finalize_decision(
        &self,
        ctx: &serenity::Context,
        guild_id: GuildId,
        user_id: UserId,
        status: ApplicationStatus,
        actor_label: &str,
        auto: bool,
    ) -> Result<usize> {
        let guild_cfg = {
            let config = self.config.read().await;
            config.guild().clone()
        };

        let record = {
            let store = self.store.read().await;
            store.get(&user_id.to_string()).cloned()
        }
        .ok_or_else(|| BotError::Internal {
            message: format!("no application record for user {}", user_id),
        })?;

        let failures = if status == ApplicationStatus::Approved {
            self.apply_approval_effects(ctx, guild_id, user_id, &record.roblox, &guild_cfg)
                .await
        } else {
            0
        };

        self.post_decision_result(ctx, &guild_cfg, &record, status, actor_label, auto)
            .await;
        self.post_decision_audit(ctx, &guild_cfg, &record, status, actor_label, auto)
            .await;

        {
            let mut store = self.store.write().await;
            store.set_decision(&user_id.to_string(), status, actor_label, auto);
        }
        self.persist_store().await;

        // Closing notice in the intake channel, then teardown
        if let Some(channel_id) = parse_channel(&record.channel_id) {
            let (title, description, color) = match (status, auto) {
                (ApplicationStatus::Approved, true) => (
                    "🎉 Whitelist Auto-Approved!",
                    format!(
                        "Congratulations <@{}>! Your answers earned a perfect score and \
                         the whitelist was approved automatically.",
                        user_id
                    ),
                    0x2ecc71,
                ),
                (ApplicationStatus::Approved, false) => (
                    "✅ Whitelist Approved",
                    format!(
                        "Congratulations <@{}>! Staff approved your whitelist. Enjoy the roleplay!",
                        user_id
                    ),
                    0x2ecc71,
                ),
                _ => (
                    "❌ Whitelist Rejected",
                    format!(
                        "<@{}>, your whitelist was not approved this time.",
                        user_id
                    ),
                    0xe74c3c,
                ),
            };

            let embed = serenity::CreateEmbed::new()
                .title(title)
                .description(description)
                .color(color)
                .footer(serenity::CreateEmbedFooter::new(guild_cfg.footer()))
                .timestamp(serenity::Timestamp::now());
            if let Err(e) = channel_id
                .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
                .await
            {
                warn!("Could not post decision notice for user {}: {}", user_id, e);
            }

            self.schedule_channel_deletion(
                ctx.http.clone(),
                channel_id,
                if auto {
                    TIMEOUT_TEARDOWN_DELAY
                } else {
                    DECISION_TEARDOWN_DELAY
                },
            );
        }

        self.active.remove(&user_id);
        info!(
            "Application of user {} decided: {:?} by '{}' ({} side-effect failures)",
            user_id, status, actor_label, failures
        );
        Ok(failures)
    }

    /// Grant/revoke the configured roles and rewrite the nickname.
    /// Best-effort throughout; returns the number of failed mutations.
    async fn apply_approval_effects(
        &self,
        ctx: &serenity::Context,
        guild_id: GuildId,
        user_id: UserId,
        profile: &RobloxProfile,
        guild_cfg: &GuildConfig,
    ) -> usize {
        let mut member = match guild_id.member(&ctx.http, user_id).await {
            Ok(member) => member,
            Err(e) => {
                warn!(
                    "Could not fetch member {} for approval effects: {}",
                    user_id, e
                );
                return guild_cfg.approved_role_ids.len() + guild_cfg.pending_role_ids.len() + 1;
            }
        };

        let mut failures = 0;

        for role_id in &guild_cfg.approved_role_ids {
            if let Err(e) = member.add_role(&ctx.http, RoleId::new(*role_id)).await {
                warn!(
                    "Failed to grant role {} to user {}: {}",
                    role_id, user_id, e
                );
                failures += 1;
            }
        }

        for role_id in &guild_cfg.pending_role_ids {
            if let Err(e) = member.remove_role(&ctx.http, RoleId::new(*role_id)).await {
                warn!(
                    "Failed to revoke role {} from user {}: {}",
                    role_id, user_id, e
                );
                failures += 1;
            }
        }

        let nickname = compose_nickname(&member.user.name, &profile.username);
        if let Err(e) = member
            .edit(&ctx.http, serenity::EditMember::new().nickname(&nickname))
            .await
        {
            warn!("Failed to set nickname for user {}: {}", user_id, e);
            failures += 1;
        } else {
            info!("Nickname of user {} set to '{}'", user_id, nickname);
        }

        failures
    }

    /// Post the decision embed to the results channel (best-effort)
    async fn post_decision_result(
        &self,
        ctx: &serenity::Context,
        guild_cfg: &GuildConfig,
        record: &ApplicationRecord,
        status: ApplicationStatus,
        actor_label: &str,
        auto: bool,
    ) {
        if guild_cfg.results_channel_id == 0 {
            return;
        }

        let (title, color) = match (status, auto) {
            (ApplicationStatus::Approved, true) => ("🤖 Whitelist Auto-Approved", 0x2ecc71),
            (ApplicationStatus::Approved, false) => ("✅ Whitelist Approved", 0x2ecc71),
            _ => ("❌ Whitelist Rejected", 0xe74c3c),
        };

        let mut embed = serenity::CreateEmbed::new()
            .title(title)
            .description(format!(
                "**User:** {}\n**Discord:** <@{}>\n**ID:** `{}`",
                record.user_display, record.user_id, record.user_id
            ))
            .field(
                "🎮 Roblox Information",
                format!(
                    "**Name:** {}\n**Display:** {}\n**Profile:** [View Profile]({})\n**Account Age:** {}",
                    record.roblox.username,
                    record.roblox.display_name,
                    record.roblox.profile_url,
                    record.roblox.account_age()
                ),
                false,
            )
            .field("👮 Decided By", actor_label.to_string(), true)
            .color(color)
            .footer(serenity::CreateEmbedFooter::new(guild_cfg.footer()))
            .timestamp(serenity::Timestamp::now());
        if let Some(url) = &record.roblox.avatar_url {
            embed = embed.thumbnail(url);
        }

        let channel = ChannelId::new(guild_cfg.results_channel_id);
        if let Err(e) = channel
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
            .await
        {
            warn!("Could not post to results channel: {}", e);
        }
    }

    /// Post the audit log entry for a decision (best-effort)
    async fn post_decision_audit(
        &self,
        ctx: &serenity::Context,
        guild_cfg: &GuildConfig,
        record: &ApplicationRecord,
        status: ApplicationStatus,
        actor_label: &str,
        auto: bool,
    ) {
        if guild_cfg.log_channel_id == 0 {
            return;
        }

        let title = match (status, auto) {
            (ApplicationStatus::Approved, true) => "🤖 Whitelist Approved by AutoMod",
            (ApplicationStatus::Approved, false) => "✅ Whitelist Approved by Staff",
            _ => "❌ Whitelist Rejected by Staff",
        };

        let answer_preview: String = record
            .answers
            .iter()
            .take(4)
            .enumerate()
            .map(|(i, a)| format!("**{}.** {}", i + 1, truncate_display(a, 80)))
            .collect::<Vec<_>>()
            .join("\n");

        let embed = serenity::CreateEmbed::new()
            .title(title)
            .field(
                "👤 User",
                format!("{} (<@{}>)", record.user_display, record.user_id),
                true,
            )
            .field("👮 Decided By", actor_label.to_string(), true)
            .field(
                "🎮 Roblox Account",
                format!(
                    "{} ({})",
                    record.roblox.username,
                    record.roblox.account_age()
                ),
                true,
            )
            .field("📝 Answer Preview", answer_preview, false)
            .color(if status == ApplicationStatus::Approved {
                0x2ecc71
            } else {
                0xe74c3c
            })
            .footer(serenity::CreateEmbedFooter::new(guild_cfg.footer()))
            .timestamp(serenity::Timestamp::now());

        let channel = ChannelId::new(guild_cfg.log_channel_id);
        if let Err(e) = channel
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
            .await
        {
            warn!("Could not post to log channel: {}", e);
        }
    }

    /// Timeout teardown: notice in the channel, DM to the applicant, clear
    /// the attempt, delayed channel deletion.
    async fn teardown_after_timeout(
        &self,
        ctx: &serenity::Context,
        user: &serenity::User,
        channel_id: ChannelId,
        guild_cfg: &GuildConfig,
    ) {
        self.active.remove(&user.id);

        let notice = serenity::CreateEmbed::new()
            .title("⏰ Time Limit Reached")
            .description("The whitelist attempt expired.")
            .field(
                "🔄 Want to try again?",
                "Use `/whitelist-restart` to begin a new attempt.",
                false,
            )
            .color(0xe74c3c)
            .footer(serenity::CreateEmbedFooter::new(guild_cfg.footer()))
            .timestamp(serenity::Timestamp::now());
        if let Err(e) = channel_id
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(notice))
            .await
        {
            debug!("Could not post timeout notice: {}", e);
        }

        // The DM is purely informational
        match user.create_dm_channel(&ctx.http).await {
            Ok(dm) => {
                let embed = serenity::CreateEmbed::new()
                    .title("⏰ Your Whitelist Attempt Expired")
                    .description(format!(
                        "You ran out of time during the whitelist process for **{}**.\n\n\
                         Use `/whitelist-restart` on the server to try again. Have your \
                         Roblox profile ready before you start.",
                        guild_cfg.community_name
                    ))
                    .color(0xe67e22)
                    .footer(serenity::CreateEmbedFooter::new(guild_cfg.footer()));
                if let Err(e) = dm
                    .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
                    .await
                {
                    debug!("Could not DM user {} about the timeout: {}", user.id, e);
                }
            }
            Err(e) => debug!("Could not open DM channel for user {}: {}", user.id, e),
        }

        self.schedule_channel_deletion(ctx.http.clone(), channel_id, TIMEOUT_TEARDOWN_DELAY);
        info!("Attempt of user {} timed out and was torn down", user.id);
    }

    /// Staff reset: erase the record, cancel any in-flight attempt, delete
    /// the intake channel, notify the target. The only path that unlocks
    /// re-application after a terminal decision.
    pub async fn reset(
        &self,
        ctx: &serenity::Context,
        target: &serenity::User,
        staff_label: &str,
    ) -> Result<ResetOutcome> {
        if self.verification.is_pending(target.id) {
            self.verification.cancel(target.id);
        }

        // Clearing the entry also cancels the applicant task at its next
        // stage boundary.
        let attempt = self.active.remove(&target.id).map(|(_, a)| a);
        if let Some(ref attempt) = attempt {
            debug!(
                "Cancelled in-flight attempt of user {} started {}s ago",
                target.id,
                current_timestamp().saturating_sub(attempt.started_at)
            );
        }

        let mut channel_deleted = false;
        if let Some(channel_id) = attempt.and_then(|a| a.channel_id) {
            match channel_id.delete(&ctx.http).await {
                Ok(_) => channel_deleted = true,
                Err(e) => debug!("Reset could not delete channel {}: {}", channel_id, e),
            }
        }

        let removed_record = {
            let mut store = self.store.write().await;
            store.remove(&target.id.to_string())
        };
        self.persist_store().await;

        let guild_cfg = {
            let config = self.config.read().await;
            config.guild().clone()
        };

        self.send_reset_dm(ctx, target, removed_record.as_ref(), staff_label, &guild_cfg)
            .await;
        self.post_reset_audit(
            ctx,
            target,
            removed_record.as_ref(),
            staff_label,
            channel_deleted,
            &guild_cfg,
        )
        .await;

        info!(
            "Whitelist of user {} reset by '{}' (record removed: {}, channel deleted: {})",
            target.id,
            staff_label,
            removed_record.is_some(),
            channel_deleted
        );

        Ok(ResetOutcome {
            channel_deleted,
            removed_record,
        })
    }

    /// DM the target their erased application summary (best-effort)
    async fn send_reset_dm(
        &self,
        ctx: &serenity::Context,
        target: &serenity::User,
        record: Option<&ApplicationRecord>,
        staff_label: &str,
        guild_cfg: &GuildConfig,
    ) {
        let mut embed = serenity::CreateEmbed::new()
            .title("🔄 Your Whitelist Has Been Reset")
            .description(
                "A staff member reset your whitelist process. All previous data was \
                 erased and you may apply again with `/whitelist`.",
            )
            .field("👮 Staff", staff_label.to_string(), true)
            .color(0xe67e22)
            .footer(serenity::CreateEmbedFooter::new(guild_cfg.footer()))
            .timestamp(serenity::Timestamp::now());

        if let Some(record) = record {
            embed = embed.field(
                "🎮 Your Roblox Information",
                format!(
                    "**Name:** {}\n**Profile:** [View Profile]({})",
                    record.roblox.username, record.roblox.profile_url
                ),
                false,
            );

            let status = match record.status {
                ApplicationStatus::Pending => "Pending",
                ApplicationStatus::Approved => "Approved",
                ApplicationStatus::Rejected => "Rejected",
            };
            embed = embed.field("📊 Previous Status", status.to_string(), true);

            if !record.answers.is_empty() {
                let preview: String = record
                    .answers
                    .iter()
                    .take(3)
                    .map(|a| truncate_display(a, 50))
                    .collect::<Vec<_>>()
                    .join("\n");
                embed = embed.field("📝 Some of Your Previous Answers", preview, false);
            }
        }

        match target.create_dm_channel(&ctx.http).await {
            Ok(dm) => {
                if let Err(e) = dm
                    .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
                    .await
                {
                    debug!("Could not DM user {} about the reset: {}", target.id, e);
                }
            }
            Err(e) => debug!("Could not open DM channel for user {}: {}", target.id, e),
        }
    }

    /// Audit log entry for a reset (best-effort)
    async fn post_reset_audit(
        &self,
        ctx: &serenity::Context,
        target: &serenity::User,
        record: Option<&ApplicationRecord>,
        staff_label: &str,
        channel_deleted: bool,
        guild_cfg: &GuildConfig,
    ) {
        if guild_cfg.log_channel_id == 0 {
            return;
        }

        let previous = match record {
            Some(record) => format!(
                "**Status:** {:?}\n**Roblox:** {}",
                record.status, record.roblox.username
            ),
            None => "No previous application data".to_string(),
        };

        let embed = serenity::CreateEmbed::new()
            .title("🔄 Whitelist Reset by Staff")
            .field(
                "👤 Affected User",
                format!("<@{}> (`{}`)", target.id, target.id),
                true,
            )
            .field("👮 Staff", staff_label.to_string(), true)
            .field(
                "🔧 Actions",
                format!(
                    "Channel deleted: {}\nData erased: {}",
                    if channel_deleted { "yes" } else { "no" },
                    if record.is_some() { "yes" } else { "no" }
                ),
                true,
            )
            .field("📊 Previous Application", previous, false)
            .color(0xe74c3c)
            .footer(serenity::CreateEmbedFooter::new(guild_cfg.footer()))
            .timestamp(serenity::Timestamp::now());

        let channel = ChannelId::new(guild_cfg.log_channel_id);
        if let Err(e) = channel
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
            .await
        {
            warn!("Could not post reset audit entry: {}", e);
        }
    }

    /// Delete a channel after a grace delay. The deletion is best-effort:
    /// if another path (reset, earlier teardown) removed the channel first,
    /// the job quietly skips.
    fn schedule_channel_deletion(&self, http: Arc<Http>, channel_id: ChannelId, delay: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = channel_id.delete(&http).await {
                debug!(
                    "Scheduled deletion of channel {} skipped: {}",
                    channel_id, e
                );
            }
        });
    }

    async fn persist_store(&self) {
        let store = self.store.read().await;
        if let Err(e) = store.save(&self.store_path).await {
            error!("Failed to save application store: {}", e);
        }
    }
}

fn primary_evaluation_field(eval: &Evaluation) -> String {
    let band = if eval.percentage >= 80.0 {
        "🟢"
    } else if eval.percentage >= 60.0 {
        "🟡"
    } else {
        "🔴"
    };
    format!(
        "{} **Score:** {:.1}%\n📝 **Status:** {}",
        band,
        eval.percentage,
        eval.recommendation.label()
    )
}

fn combined_evaluation_field(combined: &CombinedEvaluation) -> String {
    let band = if combined.combined_percentage >= 80.0 {
        "🟢"
    } else if combined.combined_percentage >= 65.0 {
        "🟡"
    } else {
        "🔴"
    };
    format!(
        "{} **Final Score:** {:.1}%\n\
         📊 **Primary Questions:** {:.1}%\n\
         📚 **Supplementary Questions:** {:.1}%\n\
         📝 **Recommendation:** {}",
        band,
        combined.combined_percentage,
        combined.primary_percentage,
        combined.secondary_percentage,
        combined.recommendation.label()
    )
}

/// Compose the post-approval nickname `<discord> | <roblox>`, fitted to
/// Discord's 32-character budget. The separator always survives and both
/// segments stay non-empty; when both names are long each side gets an
/// even share of the remaining budget.
pub fn compose_nickname(discord_name: &str, roblox_name: &str) -> String {
    const SEPARATOR: &str = " | ";

    let full = format!("{}{}{}", discord_name, SEPARATOR, roblox_name);
    if full.chars().count() <= NICKNAME_MAX {
        return full;
    }

    let budget = NICKNAME_MAX - SEPARATOR.len();
    let discord_len = discord_name.chars().count();
    let roblox_len = roblox_name.chars().count();
    let half = budget / 2;

    let (discord_take, roblox_take) = if discord_len <= half {
        (discord_len, (budget - discord_len).min(roblox_len))
    } else if roblox_len <= half {
        ((budget - roblox_len).min(discord_len), roblox_len)
    } else {
        (half, budget - half)
    };

    let discord_part: String = discord_name.chars().take(discord_take.max(1)).collect();
    let roblox_part: String = roblox_name.chars().take(roblox_take.max(1)).collect();
    format!("{}{}{}", discord_part, SEPARATOR, roblox_part)
}

fn truncate_display(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        if text.is_empty() {
            "*no answer*".to_string()
        } else {
            text.to_string()
        }
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn parse_channel(raw: &str) -> Option<ChannelId> {
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(ChannelId::new)
}

/// Shared whitelist manager type
pub type SharedWhitelistManager = Arc<WhitelistManager>;

pub fn create_shared_whitelist_manager(
    config: SharedConfigManager,
    store: SharedApplicationStore,
    store_path: &str,
) -> SharedWhitelistManager {
    Arc::new(WhitelistManager::new(config, store, store_path))
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
    use crate::managers::config_manager::create_shared_config_manager;
    use crate::state::{create_shared_application_store, ApplicationStore};
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

    fn manager_with_store(store: ApplicationStore) -> WhitelistManager {
        WhitelistManager::new(
            create_shared_config_manager("testdata"),
            create_shared_application_store(store),
            "testdata/applications.json",
        )
    }

    #[tokio::test]
    async fn test_begin_attempt_rejects_duplicates() {
        let manager = manager_with_store(ApplicationStore::new());
        let user = UserId::new(123);

        manager.begin_attempt(user).await.expect("first claim");
        let second = manager.begin_attempt(user).await;
        assert!(matches!(second, Err(BotError::DuplicateAttempt)));

        manager.release_attempt(user);
        manager
            .begin_attempt(user)
            .await
            .expect("claim after release");
    }

    #[tokio::test]
    async fn test_one_shot_policy_until_staff_reset() {
        let mut store = ApplicationStore::new();
        store.upsert(ApplicationRecord::new(
            "123".to_string(),
            "harbor_tester | tester".to_string(),
            vec![],
            "900".to_string(),
            sample_profile(),
        ));
        store.set_decision("123", ApplicationStatus::Approved, "StaffMember", false);

        let manager = manager_with_store(store);
        let user = UserId::new(123);

        let blocked = manager.begin_attempt(user).await;
        assert!(matches!(blocked, Err(BotError::AlreadyDecided)));
        // The failed claim must not leave a stale active entry behind
        assert!(!manager.is_active(user));

        // Erasing the record (what a staff reset does) unlocks intake
        manager.store.write().await.remove("123");
        manager
            .begin_attempt(user)
            .await
            .expect("intake allowed immediately after reset");
    }

    #[tokio::test]
    async fn test_pending_record_without_attempt_allows_restart() {
        let mut store = ApplicationStore::new();
        store.upsert(ApplicationRecord::new(
            "123".to_string(),
            "harbor_tester | tester".to_string(),
            vec![],
            "900".to_string(),
            sample_profile(),
        ));

        // Pending is non-terminal; a restart after a crash is allowed
        let manager = manager_with_store(store);
        manager
            .begin_attempt(UserId::new(123))
            .await
            .expect("pending record does not block intake");
    }

    #[test]
    fn test_nickname_short_names_pass_through() {
        assert_eq!(compose_nickname("anna", "bob"), "anna | bob");
    }

    #[test]
    fn test_nickname_truncates_long_pair() {
        let nick = compose_nickname("Alexandra_The_Long_One", "Xx_SuperLongRobloxName_xX");
        assert!(nick.chars().count() <= 32);
        assert!(nick.contains(" | "));

        let (discord_part, roblox_part) = nick.split_once(" | ").unwrap();
        assert!(!discord_part.is_empty());
        assert!(!roblox_part.is_empty());
        assert!("Alexandra_The_Long_One".starts_with(discord_part));
        assert!("Xx_SuperLongRobloxName_xX".starts_with(roblox_part));
    }

    #[test]
    fn test_nickname_short_side_gives_budget_to_the_other() {
        let nick = compose_nickname("bo", "An_Extremely_Long_Roblox_Username_Here");
        assert!(nick.chars().count() <= 32);
        assert!(nick.starts_with("bo | "));
        // The long side uses the slack the short side left behind
        assert!(nick.chars().count() > 20);
    }

    #[test]
    fn test_truncate_display_marks_empty_and_long_answers() {
        assert_eq!(truncate_display("", 10), "*no answer*");
        assert_eq!(truncate_display("short", 10), "short");
        assert_eq!(truncate_display("0123456789abc", 10), "0123456789...");
    }

    #[test]
    fn test_parse_channel_rejects_garbage() {
        assert_eq!(parse_channel("900"), Some(ChannelId::new(900)));
        assert_eq!(parse_channel("0"), None);
        assert_eq!(parse_channel("not-a-number"), None);
    }
}
