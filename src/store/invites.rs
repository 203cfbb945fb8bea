use chrono::{DateTime, Utc};

use super::{from_db_id, to_db_id, Store};
use crate::error::{BotError, Result};
use crate::models::InviteLink;

#[derive(sqlx::FromRow)]
struct InviteRow {
    user_id: i64,
    token: String,
    created_at: DateTime<Utc>,
}

impl From<InviteRow> for InviteLink {
    fn from(row: InviteRow) -> Self {
        InviteLink {
            owner_id: from_db_id(row.user_id),
            token: row.token,
            created_at: row.created_at,
        }
    }
}

impl Store {
    pub async fn find_invite(&self, owner_id: u64) -> Result<Option<InviteLink>> {
        let row: Option<InviteRow> =
            sqlx::query_as("SELECT user_id, token, created_at FROM user_invites WHERE user_id = ?")
                .bind(to_db_id(owner_id))
                .fetch_optional(self.pool())
                .await?;

        Ok(row.map(InviteLink::from))
    }

    /// Record `token` for `owner_id` unless one is already stored.
    ///
    /// Returns whichever invite is stored afterwards, so two racing callers
    /// both end up with the first token written.
    pub async fn insert_invite(&self, owner_id: u64, token: &str) -> Result<InviteLink> {
        sqlx::query("INSERT OR IGNORE INTO user_invites (user_id, token, created_at) VALUES (?, ?, ?)")
            .bind(to_db_id(owner_id))
            .bind(token)
            .bind(Utc::now())
            .execute(self.pool())
            .await?;

        self.find_invite(owner_id)
            .await?
            .ok_or_else(|| BotError::Internal {
                message: format!("invite for {} vanished after insert", owner_id),
            })
    }

    /// Account that owns the invite `token`
    pub async fn invite_owner(&self, token: &str) -> Result<Option<u64>> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM user_invites WHERE token = ?")
            .bind(token)
            .fetch_optional(self.pool())
            .await?;

        Ok(owner.map(from_db_id))
    }

    /// Number of users whose referrer is `account_id`
    pub async fn referral_count(&self, account_id: u64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE referrer = ?")
            .bind(to_db_id(account_id))
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, NewUser};

    #[tokio::test]
    async fn test_insert_invite_keeps_first_token() {
        let store = Store::open_in_memory().await.unwrap();

        let first = store.insert_invite(1, "abc").await.unwrap();
        let second = store.insert_invite(1, "xyz").await.unwrap();
        assert_eq!(first.token, "abc");
        assert_eq!(second.token, "abc");
        assert_eq!(store.invite_owner("abc").await.unwrap(), Some(1));
        assert_eq!(store.invite_owner("xyz").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_referral_count_is_derived() {
        let store = Store::open_in_memory().await.unwrap();
        for (id, nickname, referrer) in [(1, "host", None), (2, "g1", Some(1)), (3, "g2", Some(1))] {
            store
                .create_user(&NewUser {
                    account_id: id,
                    nickname: nickname.to_string(),
                    real_name: "Name".to_string(),
                    phone: None,
                    category: Category::Adult,
                    referrer,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.referral_count(1).await.unwrap(), 2);
        assert_eq!(store.referral_count(2).await.unwrap(), 0);

        store.delete_user("g1").await.unwrap();
        assert_eq!(store.referral_count(1).await.unwrap(), 1);
    }
}
