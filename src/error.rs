use poise::serenity_prelude as serenity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Missing required environment variable: {name}")]
    ConfigMissing { name: String },

    #[error("Invalid value for {name}: '{value}'")]
    ConfigInvalid { name: String, value: String },

    // Storage errors
    #[error("Database error: {source}")]
    Database {
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to open database '{path}': {source}")]
    DatabaseOpen {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    // Conflict errors
    #[error("Nickname already taken: {nickname}")]
    NicknameTaken { nickname: String },

    #[error("Account already registered: {account_id}")]
    AccountTaken { account_id: u64 },

    #[error("Event already exists: {name}")]
    EventExists { name: String },

    // Not-found errors
    #[error("User not found: {identifier}")]
    UserNotFound { identifier: String },

    #[error("Event not found: {name}")]
    EventNotFound { name: String },

    #[error("No registration draft for account {account_id}")]
    DraftMissing { account_id: u64 },

    // Validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    // Asset errors
    #[error("Failed to write '{path}': {source}")]
    AssetWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup failed: {message}")]
    Backup { message: String },

    // Discord errors
    #[error("Discord API error: {message}")]
    Discord { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BotError {
    /// True for errors the user caused and can fix by retrying with other input
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            BotError::NicknameTaken { .. }
                | BotError::AccountTaken { .. }
                | BotError::EventExists { .. }
                | BotError::UserNotFound { .. }
                | BotError::EventNotFound { .. }
                | BotError::DraftMissing { .. }
                | BotError::Validation { .. }
        )
    }
}

impl From<sqlx::Error> for BotError {
    fn from(err: sqlx::Error) -> Self {
        BotError::Database { source: err }
    }
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(BotError::NicknameTaken {
            nickname: "nik1".to_string()
        }
        .is_user_facing());
        assert!(BotError::UserNotFound {
            identifier: "ghost".to_string()
        }
        .is_user_facing());
        assert!(!BotError::Backup {
            message: "disk full".to_string()
        }
        .is_user_facing());
    }

    #[test]
    fn test_error_display() {
        let err = BotError::AccountTaken { account_id: 42 };
        assert_eq!(err.to_string(), "Account already registered: 42");
    }
}
