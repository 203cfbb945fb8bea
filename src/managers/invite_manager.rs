use async_trait::async_trait;
use dashmap::DashMap;
use poise::serenity_prelude::{self as serenity, ChannelId, CreateInvite, GuildId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{BotError, Result};
use crate::models::InviteLink;
use crate::store::Store;

/// Creates a fresh invite code in the community
#[async_trait]
pub trait InviteIssuer: Send + Sync {
    async fn issue(&self) -> Result<String>;
}

/// Issues invites for a guild channel through the Discord API
pub struct DiscordInviteIssuer<'a> {
    pub http: &'a serenity::Http,
    pub channel_id: ChannelId,
    pub max_uses: u8,
}

#[async_trait]
impl InviteIssuer for DiscordInviteIssuer<'_> {
    async fn issue(&self) -> Result<String> {
        let builder = CreateInvite::new()
            .max_age(0)
            .max_uses(self.max_uses)
            .unique(true);
        let invite = self.channel_id.create_invite(self.http, builder).await?;
        Ok(invite.code)
    }
}

/// Full link for an invite code
pub fn invite_url(token: &str) -> String {
    format!("https://discord.gg/{}", token)
}

/// Hands out one invite per user and remembers who joined through which code
pub struct InviteManager {
    store: Store,
    issue_lock: Mutex<()>,
    tracker: JoinTracker,
}

impl InviteManager {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            issue_lock: Mutex::new(()),
            tracker: JoinTracker::default(),
        }
    }

    pub fn tracker(&self) -> &JoinTracker {
        &self.tracker
    }

    /// The invite of `account_id`, creating it on first use.
    ///
    /// Issuing is serialized so concurrent requests for the same account
    /// never create two codes.
    pub async fn get_or_create_invite(
        &self,
        account_id: u64,
        issuer: &dyn InviteIssuer,
    ) -> Result<InviteLink> {
        if let Some(existing) = self.store.find_invite(account_id).await? {
            return Ok(existing);
        }

        let _guard = self.issue_lock.lock().await;
        if let Some(existing) = self.store.find_invite(account_id).await? {
            return Ok(existing);
        }

        let token = issuer.issue().await?;
        let link = self.store.insert_invite(account_id, &token).await?;
        info!("Created invite {} for user {}", link.token, account_id);
        Ok(link)
    }

    pub async fn referral_count(&self, account_id: u64) -> Result<i64> {
        self.store.referral_count(account_id).await
    }

    /// Owner of the invite `account_id` joined through, if known.
    ///
    /// Lookup failures and self-referrals resolve to no referrer.
    pub async fn referrer_for(&self, account_id: u64) -> Option<u64> {
        let code = self.tracker.joined_via(account_id)?;

        match self.store.invite_owner(&code).await {
            Ok(Some(owner)) if owner != account_id => Some(owner),
            Ok(Some(_)) => {
                debug!("Ignoring self-referral of {}", account_id);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to resolve invite {} for {}: {}", code, account_id, e);
                None
            }
        }
    }
}

pub type SharedInviteManager = Arc<InviteManager>;

pub fn create_shared_invite_manager(store: Store) -> SharedInviteManager {
    Arc::new(InviteManager::new(store))
}

/// Attributes guild joins to invite codes by diffing use counts
#[derive(Default)]
pub struct JoinTracker {
    uses: DashMap<String, u64>,
    joined: DashMap<u64, String>,
}

impl JoinTracker {
    /// Replace the known use counts
    pub fn snapshot(&self, invites: impl IntoIterator<Item = (String, u64)>) {
        self.uses.clear();
        for (code, uses) in invites {
            self.uses.insert(code, uses);
        }
        debug!("Invite snapshot holds {} codes", self.uses.len());
    }

    pub fn track_new(&self, code: &str) {
        self.uses.insert(code.to_string(), 0);
    }

    /// Compare fresh counts with the snapshot, record the join and roll the snapshot forward
    pub fn record_join(&self, account_id: u64, current: Vec<(String, u64)>) -> Option<String> {
        let before: HashMap<String, u64> = self
            .uses
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();

        let used = detect_used_invite(&before, &current);
        self.snapshot(current);

        match &used {
            Some(code) => {
                info!("User {} joined via invite {}", account_id, code);
                self.joined.insert(account_id, code.clone());
            }
            None => debug!("Could not attribute join of {}", account_id),
        }
        used
    }

    pub fn joined_via(&self, account_id: u64) -> Option<String> {
        self.joined.get(&account_id).map(|c| c.clone())
    }

    /// Drop the recorded join once it can no longer become a referral
    pub fn forget(&self, account_id: u64) {
        if self.joined.remove(&account_id).is_some() {
            debug!("Forgot invite join of {}", account_id);
        }
    }
}

/// The single code whose use count went up, or that vanished after hitting its limit
pub fn detect_used_invite(before: &HashMap<String, u64>, after: &[(String, u64)]) -> Option<String> {
    let increased: Vec<&String> = after
        .iter()
        .filter(|(code, uses)| *uses > before.get(code).copied().unwrap_or(0))
        .map(|(code, _)| code)
        .collect();

    match increased.as_slice() {
        [code] => return Some((*code).clone()),
        [] => {}
        _ => return None,
    }

    let vanished: Vec<&String> = before
        .keys()
        .filter(|code| !after.iter().any(|(c, _)| c == *code))
        .collect();

    match vanished.as_slice() {
        [code] => Some((*code).clone()),
        _ => None,
    }
}

/// Current invite codes of the guild with their use counts
pub async fn fetch_invite_uses(
    http: &serenity::Http,
    guild_id: GuildId,
) -> Result<Vec<(String, u64)>> {
    let invites = guild_id.invites(http).await.map_err(|e| BotError::Discord {
        message: format!("Failed to list invites of guild {}: {}", guild_id, e),
    })?;
    Ok(invites.into_iter().map(|i| (i.code, i.uses)).collect())
}
