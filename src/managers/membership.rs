use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, GuildId, UserId};
use tracing::{debug, warn};

use crate::error::{BotError, Result};

/// Discord JSON error codes for "Unknown Member" and "Unknown User"
const UNKNOWN_MEMBER: isize = 10007;
const UNKNOWN_USER: isize = 10013;

fn is_missing_member(status: u16, code: isize) -> bool {
    status == 404 || code == UNKNOWN_MEMBER || code == UNKNOWN_USER
}

/// Whether a failed member lookup means the account is not in the guild
fn is_not_a_member(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(::serenity::http::HttpError::UnsuccessfulRequest(response)) => {
            is_missing_member(response.status_code.as_u16(), response.error.code)
        }
        _ => false,
    }
}

/// Answers whether an account belongs to the community
#[async_trait]
pub trait MembershipGate: Send + Sync {
    /// `Ok(false)` for a definite "no", `Err` when the lookup itself failed
    async fn check(&self, account_id: u64) -> Result<bool>;
}

/// Membership with lookup failures treated as "not a member"
pub async fn is_subscribed(gate: &dyn MembershipGate, account_id: u64) -> bool {
    match gate.check(account_id).await {
        Ok(member) => member,
        Err(e) => {
            warn!("Membership check for {} failed: {}", account_id, e);
            false
        }
    }
}

/// Looks the account up in the community guild
pub struct GuildMembership<'a> {
    pub http: &'a serenity::Http,
    pub guild_id: GuildId,
}

#[async_trait]
impl MembershipGate for GuildMembership<'_> {
    async fn check(&self, account_id: u64) -> Result<bool> {
        match self.guild_id.member(self.http, UserId::new(account_id)).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_a_member(&e) => {
                debug!("User {} is not in guild {}", account_id, self.guild_id);
                Ok(false)
            }
            Err(e) => Err(BotError::Discord {
                message: format!("member lookup failed: {}", e),
            }),
        }
    }
}
