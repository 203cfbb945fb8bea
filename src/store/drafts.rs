use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use super::{from_db_id, to_db_id, Store};
use crate::error::Result;
use crate::models::RegistrationDraft;

#[derive(sqlx::FromRow)]
struct DraftRow {
    user_id: i64,
    nickname: String,
    real_name: String,
    phone: Option<String>,
    referrer: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<DraftRow> for RegistrationDraft {
    fn from(row: DraftRow) -> Self {
        RegistrationDraft {
            account_id: from_db_id(row.user_id),
            nickname: row.nickname,
            real_name: row.real_name,
            phone: row.phone,
            referrer: row.referrer.map(from_db_id),
            created_at: row.created_at,
        }
    }
}

impl Store {
    /// Store the draft, replacing any earlier one for the same account
    pub async fn save_draft(&self, draft: &RegistrationDraft) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO registration_drafts \
             (user_id, nickname, real_name, phone, referrer, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(to_db_id(draft.account_id))
        .bind(&draft.nickname)
        .bind(&draft.real_name)
        .bind(&draft.phone)
        .bind(draft.referrer.map(to_db_id))
        .bind(draft.created_at)
        .execute(self.pool())
        .await?;

        debug!("Saved registration draft for {}", draft.account_id);
        Ok(())
    }

    pub async fn get_draft(&self, account_id: u64) -> Result<Option<RegistrationDraft>> {
        let row: Option<DraftRow> = sqlx::query_as(
            "SELECT user_id, nickname, real_name, phone, referrer, created_at \
             FROM registration_drafts WHERE user_id = ?",
        )
        .bind(to_db_id(account_id))
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(RegistrationDraft::from))
    }

    /// Returns true if a draft existed
    pub async fn delete_draft(&self, account_id: u64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM registration_drafts WHERE user_id = ?")
            .bind(to_db_id(account_id))
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub(super) async fn fetch_draft(
    tx: &mut Transaction<'_, Sqlite>,
    account_id: u64,
) -> Result<Option<RegistrationDraft>> {
    let row: Option<DraftRow> = sqlx::query_as(
        "SELECT user_id, nickname, real_name, phone, referrer, created_at \
         FROM registration_drafts WHERE user_id = ?",
    )
    .bind(to_db_id(account_id))
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(RegistrationDraft::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(account_id: u64, nickname: &str) -> RegistrationDraft {
        RegistrationDraft {
            account_id,
            nickname: nickname.to_string(),
            real_name: "Draft D".to_string(),
            phone: None,
            referrer: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_draft_superseded() {
        let store = Store::open_in_memory().await.unwrap();
        store.save_draft(&draft(1, "first")).await.unwrap();
        store.save_draft(&draft(1, "second")).await.unwrap();

        let stored = store.get_draft(1).await.unwrap().unwrap();
        assert_eq!(stored.nickname, "second");
    }

    #[tokio::test]
    async fn test_delete_draft() {
        let store = Store::open_in_memory().await.unwrap();
        store.save_draft(&draft(1, "first")).await.unwrap();

        assert!(store.delete_draft(1).await.unwrap());
        assert!(!store.delete_draft(1).await.unwrap());
        assert!(store.get_draft(1).await.unwrap().is_none());
    }
}
