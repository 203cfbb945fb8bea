//! Runtime configuration read from the environment (and `.env`).

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::error::{BotError, Result};

/// Static allowlist of admin account ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminList(HashSet<u64>);

impl AdminList {
    /// Parse a comma separated list of ids, skipping blanks and garbage
    pub fn parse(raw: &str) -> Self {
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("Ignoring invalid admin id '{}'", s);
                    None
                }
            })
            .collect();
        Self(ids)
    }

    pub fn contains(&self, account_id: u64) -> bool {
        self.0.contains(&account_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub admins: AdminList,
    pub db_path: PathBuf,
    /// Guild a user must belong to before registering or viewing ratings
    pub community_guild_id: u64,
    /// Channel new invite links point at
    pub invite_channel_id: Option<u64>,
    /// Link shown next to the "join first" notice
    pub subscribe_url: Option<String>,
    pub photo_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_interval: Duration,
    pub backup_keep: usize,
    pub invite_max_uses: u8,
    pub connect_retries: u32,
    pub connect_retry_delay: Duration,
}

impl BotConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = required(&lookup, "DISCORD_TOKEN")?;

        let guild_raw = required(&lookup, "COMMUNITY_GUILD_ID")?;
        let community_guild_id =
            guild_raw
                .trim()
                .parse::<u64>()
                .map_err(|_| BotError::ConfigInvalid {
                    name: "COMMUNITY_GUILD_ID".to_string(),
                    value: guild_raw.clone(),
                })?;

        let invite_channel_id = match lookup("INVITE_CHANNEL_ID") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| BotError::ConfigInvalid {
                name: "INVITE_CHANNEL_ID".to_string(),
                value: raw.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            token,
            admins: AdminList::parse(&lookup("ADMIN_IDS").unwrap_or_default()),
            db_path: PathBuf::from(
                lookup("DB_PATH").unwrap_or_else(|| "database.sqlite".to_string()),
            ),
            community_guild_id,
            invite_channel_id,
            subscribe_url: lookup("SUBSCRIBE_URL").filter(|s| !s.trim().is_empty()),
            photo_dir: PathBuf::from(lookup("PHOTO_DIR").unwrap_or_else(|| "photos".to_string())),
            backup_dir: PathBuf::from(
                lookup("BACKUP_DIR").unwrap_or_else(|| "backups".to_string()),
            ),
            backup_interval: backup_interval(parse_or(&lookup, "BACKUP_INTERVAL_HOURS", 24u64)),
            backup_keep: parse_or(&lookup, "BACKUP_KEEP", 7usize).max(1),
            invite_max_uses: parse_or(&lookup, "INVITE_MAX_USES", 100u8),
            connect_retries: parse_or(&lookup, "CONNECT_RETRIES", 5u32).max(1),
            connect_retry_delay: Duration::from_secs(parse_or(
                &lookup,
                "CONNECT_RETRY_DELAY_SECS",
                5u64,
            )),
        })
    }

    pub fn is_admin(&self, account_id: u64) -> bool {
        self.admins.contains(account_id)
    }
}

const MAX_BACKUP_INTERVAL_HOURS: u64 = 24 * 365;

/// Between one hour and one year
fn backup_interval(hours: u64) -> Duration {
    let hours = hours.clamp(1, MAX_BACKUP_INTERVAL_HOURS);
    Duration::from_secs(hours.checked_mul(60 * 60).unwrap_or(u64::MAX))
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BotError::ConfigMissing {
            name: name.to_string(),
        })
}

fn parse_or<T: std::str::FromStr + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {} '{}', using default {}", name, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("COMMUNITY_GUILD_ID", "42"),
        ]))
        .unwrap();

        assert_eq!(config.community_guild_id, 42);
        assert_eq!(config.db_path, PathBuf::from("database.sqlite"));
        assert_eq!(config.backup_interval, Duration::from_secs(24 * 3600));
        assert_eq!(config.backup_keep, 7);
        assert_eq!(config.invite_max_uses, 100);
        assert_eq!(config.connect_retries, 5);
        assert!(config.admins.is_empty());
        assert!(config.invite_channel_id.is_none());
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = BotConfig::from_lookup(lookup_from(&[("COMMUNITY_GUILD_ID", "42")])).unwrap_err();
        assert!(matches!(err, BotError::ConfigMissing { name } if name == "DISCORD_TOKEN"));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = BotConfig::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("COMMUNITY_GUILD_ID", "not-a-number"),
        ]))
        .unwrap_err();
        assert!(matches!(err, BotError::ConfigInvalid { .. }));

        let config = BotConfig::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("COMMUNITY_GUILD_ID", "1"),
            ("BACKUP_KEEP", "lots"),
        ]))
        .unwrap();
        assert_eq!(config.backup_keep, 7);
    }

    #[test]
    fn test_backup_interval_is_never_zero() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("COMMUNITY_GUILD_ID", "1"),
            ("BACKUP_INTERVAL_HOURS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.backup_interval, Duration::from_secs(3600));

        let config = BotConfig::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("COMMUNITY_GUILD_ID", "1"),
            ("BACKUP_INTERVAL_HOURS", &u64::MAX.to_string()),
        ]))
        .unwrap();
        assert_eq!(
            config.backup_interval,
            Duration::from_secs(MAX_BACKUP_INTERVAL_HOURS * 3600)
        );
    }

    #[test]
    fn test_admin_list() {
        let admins = AdminList::parse(" 1, 2,,x, 3 ");
        assert_eq!(admins.len(), 3);
        assert!(admins.contains(2));
        assert!(!admins.contains(4));

        let config = BotConfig::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("COMMUNITY_GUILD_ID", "1"),
            ("ADMIN_IDS", "10,20"),
        ]))
        .unwrap();
        assert!(config.is_admin(10));
        assert!(!config.is_admin(30));
    }
}
