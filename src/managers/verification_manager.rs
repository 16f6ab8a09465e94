use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, UserId};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::error::{BotError, Result};
use crate::managers::profile_client::{ProfileClient, RobloxProfile};

/// Seconds an applicant has to place the code in their profile description
pub const VERIFICATION_WINDOW_SECS: u64 = 300;

/// Fixed code set; the code for a given applicant is picked by user id, so
/// a restarted attempt reissues the same code without storing anything.
pub const CODE_SET: [&str; 4] = ["HarborRP", "HarborCity", "HarborCityRP", "HCRP"];

/// Ephemeral account-linking challenge, one per applicant in verification
#[derive(Debug, Clone)]
pub struct VerificationChallenge {
    pub code: &'static str,
    pub channel_id: ChannelId,
    pub started_at: u64,
}

/// Derive the challenge code for an applicant
pub fn challenge_code(user_id: UserId) -> &'static str {
    CODE_SET[(user_id.get() % CODE_SET.len() as u64) as usize]
}

/// Manages account-linking challenges. The challenge's presence in the map
/// is the single source of truth for the success/timeout race: whichever
/// path removes it first wins, the other becomes a no-op.
pub struct VerificationManager {
    pending: DashMap<UserId, VerificationChallenge>,
}

impl VerificationManager {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Issue a challenge for an applicant
    pub fn begin(&self, user_id: UserId, channel_id: ChannelId) -> VerificationChallenge {
        let challenge = VerificationChallenge {
            code: challenge_code(user_id),
            channel_id,
            started_at: current_timestamp(),
        };
        self.pending.insert(user_id, challenge.clone());
        debug!("Issued verification challenge for user {}", user_id);
        challenge
    }

    pub fn is_pending(&self, user_id: UserId) -> bool {
        self.pending.contains_key(&user_id)
    }

    /// Check a submitted username against the applicant's challenge.
    ///
    /// `ProfileNotFound` and `CodeMismatch` leave the challenge in place so
    /// the applicant can retry within the same window. On a code match the
    /// challenge is claimed atomically; losing that claim means the timeout
    /// fired first and the attempt is already being torn down.
    pub async fn attempt(
        &self,
        user_id: UserId,
        username: &str,
        profiles: &ProfileClient,
    ) -> Result<RobloxProfile> {
        let expected = match self.pending.get(&user_id) {
            Some(challenge) => challenge.code,
            None => return Err(BotError::VerificationTimeout),
        };

        let profile = profiles
            .lookup(username)
            .await?
            .ok_or_else(|| BotError::ProfileNotFound {
                username: username.to_string(),
            })?;

        // Exact, case-sensitive substring match against the description
        if !profile.description.contains(expected) {
            return Err(BotError::CodeMismatch {
                expected,
                description: profile.description.clone(),
            });
        }

        if self.pending.remove(&user_id).is_none() {
            return Err(BotError::VerificationTimeout);
        }

        info!(
            "User {} linked Roblox account '{}'",
            user_id, profile.username
        );
        Ok(profile)
    }

    /// Timeout path: claim the challenge if it still exists. Returns false
    /// when a success already removed it, in which case the caller no-ops.
    pub fn expire(&self, user_id: UserId) -> bool {
        match self.pending.remove(&user_id) {
            Some((_, challenge)) => {
                debug!(
                    "Verification challenge of user {} in channel {} expired after {}s",
                    user_id,
                    challenge.channel_id,
                    current_timestamp().saturating_sub(challenge.started_at)
                );
                true
            }
            None => false,
        }
    }

    /// Drop a challenge without deciding the race (staff reset)
    pub fn cancel(&self, user_id: UserId) {
        self.pending.remove(&user_id);
        debug!("Cancelled verification challenge for user {}", user_id);
    }
}

impl Default for VerificationManager {
    fn default() -> Self {
        Self::new()
    }
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

    #[test]
    fn test_challenge_code_is_deterministic() {
        let user = UserId::new(987654321);
        let first = challenge_code(user);
        for _ in 0..5 {
            assert_eq!(challenge_code(user), first);
        }
    }

    #[test]
    fn test_begin_reissues_the_same_code() {
        let manager = VerificationManager::new();
        let user = UserId::new(42);
        let channel = ChannelId::new(900);

        let first = manager.begin(user, channel);
        let second = manager.begin(user, channel);
        assert_eq!(first.code, second.code);
        assert_eq!(first.code, CODE_SET[42 % CODE_SET.len()]);
    }

    #[test]
    fn test_expire_claims_the_challenge_exactly_once() {
        let manager = VerificationManager::new();
        let user = UserId::new(7);
        manager.begin(user, ChannelId::new(900));

        // First claimant wins, second one no-ops
        assert!(manager.expire(user));
        assert!(!manager.expire(user));
        assert!(!manager.is_pending(user));
    }

    #[test]
    fn test_cancel_removes_pending_challenge() {
        let manager = VerificationManager::new();
        let user = UserId::new(7);
        manager.begin(user, ChannelId::new(900));
        assert!(manager.is_pending(user));

        manager.cancel(user);
        assert!(!manager.is_pending(user));
    }
}
