use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

const USER_SEARCH_URL: &str = "https://users.roblox.com/v1/usernames/users";
const USER_DETAILS_URL: &str = "https://users.roblox.com/v1/users";
const AVATAR_URL: &str = "https://thumbnails.roblox.com/v1/users/avatar-headshot";

/// Snapshot of a Roblox profile captured at verification time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobloxProfile {
    /// Roblox user id
    pub id: u64,

    /// Canonical username
    pub username: String,

    /// Display name shown on the profile
    pub display_name: String,

    /// Link to the profile page
    pub profile_url: String,

    /// Avatar headshot, when the thumbnail service answered
    pub avatar_url: Option<String>,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,

    /// Free-text profile description at capture time
    pub description: String,
}

impl RobloxProfile {
    /// Age of the account as "N years, M months"
    pub fn account_age(&self) -> String {
        let days = (Utc::now() - self.created_at).num_days().max(0);
        let years = days / 365;
        let months = (days % 365) / 30;
        format!("{} years, {} months", years, months)
    }

    pub fn created_date(&self) -> String {
        self.created_at.format("%d/%m/%Y").to_string()
    }
}

/// Client for the Roblox users API
pub struct ProfileClient {
    http: reqwest::Client,
}

#[derive(Serialize)]
struct UserSearchRequest<'a> {
    usernames: [&'a str; 1],
    #[serde(rename = "excludeBannedUsers")]
    exclude_banned_users: bool,
}

#[derive(Deserialize)]
struct UserSearchResponse {
    data: Vec<UserSearchHit>,
}

#[derive(Deserialize)]
struct UserSearchHit {
    id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDetails {
    id: u64,
    name: String,
    display_name: String,
    description: Option<String>,
    created: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ThumbnailResponse {
    data: Vec<ThumbnailHit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailHit {
    image_url: String,
}

impl ProfileClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Look up a profile by username. `Ok(None)` means the user does not exist.
    pub async fn lookup(&self, username: &str) -> Result<Option<RobloxProfile>> {
        debug!("Looking up Roblox profile for '{}'", username);

        let search: UserSearchResponse = self
            .http
            .post(USER_SEARCH_URL)
            .json(&UserSearchRequest {
                usernames: [username],
                exclude_banned_users: true,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(hit) = search.data.first() else {
            return Ok(None);
        };

        let details: UserDetails = self
            .http
            .get(format!("{}/{}", USER_DETAILS_URL, hit.id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // The thumbnail is cosmetic; a failed fetch must not fail the lookup
        let avatar_url = match self.fetch_avatar(details.id).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Avatar fetch failed for Roblox user {}: {}", details.id, e);
                None
            }
        };

        Ok(Some(RobloxProfile {
            id: details.id,
            profile_url: format!("https://www.roblox.com/users/{}/profile", details.id),
            username: details.name,
            display_name: details.display_name,
            avatar_url,
            created_at: details.created,
            description: details.description.unwrap_or_default(),
        }))
    }

    async fn fetch_avatar(&self, user_id: u64) -> Result<Option<String>> {
        let response: ThumbnailResponse = self
            .http
            .get(AVATAR_URL)
            .query(&[
                ("userIds", user_id.to_string()),
                ("size", "720x720".to_string()),
                ("format", "Png".to_string()),
                ("isCircular", "false".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.data.into_iter().next().map(|h| h.image_url))
    }
}

impl Default for ProfileClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_age_formatting() {
        let profile = RobloxProfile {
            id: 1,
            username: "builderman".to_string(),
            display_name: "builderman".to_string(),
            profile_url: "https://www.roblox.com/users/1/profile".to_string(),
            avatar_url: None,
            created_at: Utc::now() - chrono::Duration::days(400),
            description: String::new(),
        };

        assert_eq!(profile.account_age(), "1 years, 1 months");
    }
}
