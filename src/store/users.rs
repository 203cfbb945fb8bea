use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

use super::{from_db_id, is_unique_violation, to_db_id, Store};
use crate::error::{BotError, Result};
use crate::models::{Category, Effect, NewUser, PointGrant, ProfileUpdate, User};

const USER_COLUMNS: &str = "user_id, nickname, real_name, phone, category, active, points, \
     participations, photo_path, referrer, registered_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    nickname: String,
    real_name: String,
    phone: Option<String>,
    category: String,
    active: bool,
    points: i64,
    participations: i64,
    photo_path: Option<String>,
    referrer: Option<i64>,
    registered_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = BotError;

    fn try_from(row: UserRow) -> Result<Self> {
        let category = Category::parse(&row.category).ok_or_else(|| BotError::Internal {
            message: format!(
                "user {} has unknown category '{}'",
                row.nickname, row.category
            ),
        })?;

        Ok(User {
            account_id: from_db_id(row.user_id),
            nickname: row.nickname,
            real_name: row.real_name,
            phone: row.phone,
            category,
            active: row.active,
            points: row.points,
            participations: row.participations,
            photo_path: row.photo_path,
            referrer: row.referrer.map(from_db_id),
            registered_at: row.registered_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GrantRow {
    id: i64,
    nickname: String,
    points: i64,
    note: String,
    granted_at: DateTime<Utc>,
}

impl From<GrantRow> for PointGrant {
    fn from(row: GrantRow) -> Self {
        PointGrant {
            id: row.id,
            nickname: row.nickname,
            delta: row.points,
            note: row.note,
            granted_at: row.granted_at,
        }
    }
}

/// Result of a committed grant, plus the effects still to run
#[derive(Debug, Clone)]
pub struct GrantReceipt {
    pub user: User,
    pub grant: PointGrant,
    pub effects: Vec<Effect>,
}

/// What remains of a user after a delete
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedUser {
    pub account_id: u64,
    pub nickname: String,
    pub photo_path: Option<String>,
}

impl Store {
    /// Create a user row. Fails with a conflict instead of overwriting.
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let mut tx = self.pool().begin().await?;
        let user = insert_user(&mut tx, new_user).await?;
        tx.commit().await?;

        info!(
            "Registered user {} ({})",
            user.nickname, user.account_id
        );
        Ok(user)
    }

    /// Turn the stored draft of `account_id` into a user, atomically
    pub async fn finalize_registration(&self, account_id: u64, category: Category) -> Result<User> {
        let mut tx = self.pool().begin().await?;

        let draft = super::drafts::fetch_draft(&mut tx, account_id)
            .await?
            .ok_or(BotError::DraftMissing { account_id })?;

        let user = insert_user(&mut tx, &draft.into_new_user(category)).await?;

        sqlx::query("DELETE FROM registration_drafts WHERE user_id = ?")
            .bind(to_db_id(account_id))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Registration finalized for {} ({}), referrer: {:?}",
            user.nickname, user.account_id, user.referrer
        );
        Ok(user)
    }

    pub async fn get_user(&self, account_id: u64) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE user_id = ?",
            USER_COLUMNS
        ))
        .bind(to_db_id(account_id))
        .fetch_optional(self.pool())
        .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn get_user_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE nickname = ?",
            USER_COLUMNS
        ))
        .bind(nickname)
        .fetch_optional(self.pool())
        .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn nickname_taken(&self, nickname: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE nickname = ?")
            .bind(nickname)
            .fetch_one(self.pool())
            .await?;
        Ok(count > 0)
    }

    /// Apply a finished profile-update flow in one statement
    pub async fn update_profile(&self, account_id: u64, update: &ProfileUpdate) -> Result<User> {
        let result = sqlx::query(
            "UPDATE users SET phone = ?, real_name = ?, category = ? WHERE user_id = ?",
        )
        .bind(&update.phone)
        .bind(&update.real_name)
        .bind(update.category.as_str())
        .bind(to_db_id(account_id))
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::UserNotFound {
                identifier: account_id.to_string(),
            });
        }

        self.get_user(account_id)
            .await?
            .ok_or(BotError::UserNotFound {
                identifier: account_id.to_string(),
            })
    }

    pub async fn set_photo(&self, nickname: &str, photo_path: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET photo_path = ? WHERE nickname = ?")
            .bind(photo_path)
            .bind(nickname)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::UserNotFound {
                identifier: nickname.to_string(),
            });
        }
        Ok(())
    }

    /// Credit `delta` points to `nickname` and append the audit row.
    ///
    /// Both writes share one transaction. The returned receipt lists the
    /// notification to deliver; delivery is the caller's concern and never
    /// affects the committed grant.
    pub async fn grant_points(&self, nickname: &str, delta: i64, note: &str) -> Result<GrantReceipt> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            "UPDATE users SET points = points + ?, participations = participations + 1 \
             WHERE nickname = ?",
        )
        .bind(delta)
        .bind(nickname)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::UserNotFound {
                identifier: nickname.to_string(),
            });
        }

        let grant: GrantRow = sqlx::query_as(
            "INSERT INTO points_history (nickname, points, note, granted_at) VALUES (?, ?, ?, ?) \
             RETURNING id, nickname, points, note, granted_at",
        )
        .bind(nickname)
        .bind(delta)
        .bind(note)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let row: UserRow = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE nickname = ?",
            USER_COLUMNS
        ))
        .bind(nickname)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let user = User::try_from(row)?;
        let grant = PointGrant::from(grant);
        info!("Granted {} points to {}: {}", delta, nickname, note);

        let effects = vec![Effect::NotifyGrant {
            account_id: user.account_id,
            delta,
            note: note.to_string(),
        }];

        Ok(GrantReceipt {
            user,
            grant,
            effects,
        })
    }

    /// Mark a user inactive. They stay ranked but are shown struck through.
    pub async fn disable_user(&self, nickname: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET active = 0 WHERE nickname = ?")
            .bind(nickname)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::UserNotFound {
                identifier: nickname.to_string(),
            });
        }

        info!("Disabled user {}", nickname);
        Ok(())
    }

    /// Zero points and participations and purge the audit trail
    pub async fn reset_user(&self, nickname: &str) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let result =
            sqlx::query("UPDATE users SET points = 0, participations = 0 WHERE nickname = ?")
                .bind(nickname)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::UserNotFound {
                identifier: nickname.to_string(),
            });
        }

        let purged = sqlx::query("DELETE FROM points_history WHERE nickname = ?")
            .bind(nickname)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Reset rating of {} ({} history rows removed)",
            nickname,
            purged.rows_affected()
        );
        Ok(())
    }

    /// Remove a user by account id or nickname together with their history.
    ///
    /// A numeric identifier is tried as an account id first, then as a
    /// nickname. The photo file is left for the caller to remove.
    pub async fn delete_user(&self, identifier: &str) -> Result<DeletedUser> {
        let mut tx = self.pool().begin().await?;

        let mut found: Option<(i64, String, Option<String>)> = None;
        if let Ok(account_id) = identifier.parse::<u64>() {
            found = sqlx::query_as(
                "SELECT user_id, nickname, photo_path FROM users WHERE user_id = ?",
            )
            .bind(to_db_id(account_id))
            .fetch_optional(&mut *tx)
            .await?;
        }
        if found.is_none() {
            found = sqlx::query_as(
                "SELECT user_id, nickname, photo_path FROM users WHERE nickname = ?",
            )
            .bind(identifier)
            .fetch_optional(&mut *tx)
            .await?;
        }

        let (user_id, nickname, photo_path) = found.ok_or_else(|| BotError::UserNotFound {
            identifier: identifier.to_string(),
        })?;

        sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM points_history WHERE nickname = ?")
            .bind(&nickname)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM registration_drafts WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Deleted user {} ({})", nickname, user_id);
        Ok(DeletedUser {
            account_id: from_db_id(user_id),
            nickname,
            photo_path,
        })
    }

    /// Audit trail of `nickname`, most recent first
    pub async fn history(&self, nickname: &str) -> Result<Vec<PointGrant>> {
        let rows: Vec<GrantRow> = sqlx::query_as(
            "SELECT id, nickname, points, note, granted_at FROM points_history \
             WHERE nickname = ? ORDER BY granted_at DESC, id DESC",
        )
        .bind(nickname)
        .fetch_all(self.pool())
        .await?;

        debug!("Found {} history records for {}", rows.len(), nickname);
        Ok(rows.into_iter().map(PointGrant::from).collect())
    }

    /// All users in leaderboard order
    pub async fn ranked_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users ORDER BY points DESC, registered_at ASC, user_id ASC",
            USER_COLUMNS
        ))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// One slice of the leaderboard
    pub async fn ranked_users_page(&self, offset: usize, limit: usize) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users ORDER BY points DESC, registered_at ASC, user_id ASC \
             LIMIT ? OFFSET ?",
            USER_COLUMNS
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn count_users(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;
        Ok(count as usize)
    }

    /// Number of users with strictly more points, plus one
    pub async fn rank_of(&self, account_id: u64) -> Result<Option<usize>> {
        let rank: Option<i64> = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM users WHERE points > me.points) + 1 \
             FROM users AS me WHERE me.user_id = ?",
        )
        .bind(to_db_id(account_id))
        .fetch_optional(self.pool())
        .await?;

        Ok(rank.map(|r| r as usize))
    }
}

/// Insert inside an open transaction, mapping key collisions to conflicts
pub(super) async fn insert_user(
    tx: &mut Transaction<'_, Sqlite>,
    new_user: &NewUser,
) -> Result<User> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE user_id = ?")
        .bind(to_db_id(new_user.account_id))
        .fetch_one(&mut **tx)
        .await?;
    if existing > 0 {
        return Err(BotError::AccountTaken {
            account_id: new_user.account_id,
        });
    }

    let row: UserRow = sqlx::query_as(&format!(
        "INSERT INTO users (user_id, nickname, real_name, phone, category, referrer, registered_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(to_db_id(new_user.account_id))
    .bind(&new_user.nickname)
    .bind(&new_user.real_name)
    .bind(&new_user.phone)
    .bind(new_user.category.as_str())
    .bind(new_user.referrer.map(to_db_id))
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            BotError::NicknameTaken {
                nickname: new_user.nickname.clone(),
            }
        } else {
            BotError::from(e)
        }
    })?;

    User::try_from(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistrationDraft;

    fn new_user(account_id: u64, nickname: &str) -> NewUser {
        NewUser {
            account_id,
            nickname: nickname.to_string(),
            real_name: "Ivan I".to_string(),
            phone: None,
            category: Category::Junior,
            referrer: None,
        }
    }

    async fn store_with(users: &[(u64, &str)]) -> Store {
        let store = Store::open_in_memory().await.unwrap();
        for (id, nickname) in users {
            store.create_user(&new_user(*id, nickname)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let store = store_with(&[(1, "nik1")]).await;

        let user = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.nickname, "nik1");
        assert_eq!(user.category, Category::Junior);
        assert!(user.active);
        assert_eq!(user.points, 0);

        let by_nick = store.get_user_by_nickname("nik1").await.unwrap().unwrap();
        assert_eq!(by_nick.account_id, 1);
    }

    #[tokio::test]
    async fn test_duplicate_nickname_is_conflict() {
        let store = store_with(&[(1, "nik1")]).await;

        let err = store.create_user(&new_user(2, "nik1")).await.unwrap_err();
        assert!(matches!(err, BotError::NicknameTaken { .. }));
        assert!(store.get_user(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_account_is_conflict() {
        let store = store_with(&[(1, "nik1")]).await;

        let err = store.create_user(&new_user(1, "other")).await.unwrap_err();
        assert!(matches!(err, BotError::AccountTaken { account_id: 1 }));
        let user = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.nickname, "nik1");
    }

    #[tokio::test]
    async fn test_grant_is_atomic_with_history() {
        let store = store_with(&[(1, "nik1")]).await;

        let receipt = store.grant_points("nik1", 50, "x").await.unwrap();
        assert_eq!(receipt.user.points, 50);
        assert_eq!(receipt.user.participations, 1);
        assert_eq!(receipt.grant.delta, 50);
        assert_eq!(
            receipt.effects,
            vec![Effect::NotifyGrant {
                account_id: 1,
                delta: 50,
                note: "x".to_string()
            }]
        );

        let history = store.history("nik1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].delta, 50);
        assert_eq!(history[0].note, "x");
    }

    #[tokio::test]
    async fn test_grant_unknown_nickname() {
        let store = store_with(&[]).await;

        let err = store.grant_points("ghost", 10, "n").await.unwrap_err();
        assert!(matches!(err, BotError::UserNotFound { .. }));
        assert!(store.history("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_most_recent_first() {
        let store = store_with(&[(1, "nik1")]).await;
        store.grant_points("nik1", 10, "first").await.unwrap();
        store.grant_points("nik1", 20, "second").await.unwrap();

        let history = store.history("nik1").await.unwrap();
        let notes: Vec<&str> = history.iter().map(|g| g.note.as_str()).collect();
        assert_eq!(notes, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_reset_clears_history_and_counters() {
        let store = store_with(&[(1, "nik1")]).await;
        for i in 0..5 {
            store.grant_points("nik1", 10, &format!("g{}", i)).await.unwrap();
        }

        store.reset_user("nik1").await.unwrap();

        let user = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.points, 0);
        assert_eq!(user.participations, 0);
        assert!(store.history("nik1").await.unwrap().is_empty());

        // Second reset on an empty history is fine
        store.reset_user("nik1").await.unwrap();
    }

    #[tokio::test]
    async fn test_disable_keeps_user_ranked() {
        let store = store_with(&[(1, "nik1"), (2, "nik2")]).await;
        store.disable_user("nik1").await.unwrap();

        let user = store.get_user(1).await.unwrap().unwrap();
        assert!(!user.active);
        assert_eq!(store.ranked_users().await.unwrap().len(), 2);
        assert!(matches!(
            store.disable_user("ghost").await,
            Err(BotError::UserNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_grant_history_scenario() {
        let store = Store::open_in_memory().await.unwrap();
        store.create_user(&new_user(7, "nik1")).await.unwrap();
        store.grant_points("nik1", 10, "welcome").await.unwrap();

        let history = store.history("nik1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!((history[0].delta, history[0].note.as_str()), (10, "welcome"));

        let user = store.get_user_by_nickname("nik1").await.unwrap().unwrap();
        assert_eq!(user.points, 10);
        assert_eq!(user.participations, 1);
    }

    #[tokio::test]
    async fn test_delete_scenario() {
        let store = store_with(&[(7, "nik1")]).await;
        store.grant_points("nik1", 10, "welcome").await.unwrap();

        let deleted = store.delete_user("nik1").await.unwrap();
        assert_eq!(deleted.nickname, "nik1");

        assert!(store.get_user_by_nickname("nik1").await.unwrap().is_none());
        assert!(store.history("nik1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_account_id() {
        let store = store_with(&[(7, "nik1")]).await;

        let deleted = store.delete_user("7").await.unwrap();
        assert_eq!(deleted.account_id, 7);
        assert!(store.get_user(7).await.unwrap().is_none());
        assert!(matches!(
            store.delete_user("7").await,
            Err(BotError::UserNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_numeric_nickname() {
        let store = store_with(&[(7, "2024")]).await;

        let deleted = store.delete_user("2024").await.unwrap();
        assert_eq!(deleted.account_id, 7);
    }

    #[tokio::test]
    async fn test_rank_counts_strictly_greater() {
        let store = store_with(&[(1, "a"), (2, "b"), (3, "c"), (4, "d")]).await;
        store.grant_points("a", 30, "n").await.unwrap();
        store.grant_points("b", 20, "n").await.unwrap();
        store.grant_points("c", 20, "n").await.unwrap();

        assert_eq!(store.rank_of(1).await.unwrap(), Some(1));
        assert_eq!(store.rank_of(2).await.unwrap(), Some(2));
        assert_eq!(store.rank_of(3).await.unwrap(), Some(2));
        assert_eq!(store.rank_of(4).await.unwrap(), Some(4));
        assert_eq!(store.rank_of(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ranked_order_breaks_ties_by_registration() {
        let store = store_with(&[(5, "early"), (3, "late")]).await;
        store.grant_points("early", 10, "n").await.unwrap();
        store.grant_points("late", 10, "n").await.unwrap();

        let ranked = store.ranked_users().await.unwrap();
        let names: Vec<&str> = ranked.iter().map(|u| u.nickname.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = store_with(&[(1, "nik1")]).await;
        let update = ProfileUpdate {
            phone: Some("+7 900".to_string()),
            real_name: "Ivan Ivanov".to_string(),
            category: Category::Adult,
        };

        let user = store.update_profile(1, &update).await.unwrap();
        assert_eq!(user.phone.as_deref(), Some("+7 900"));
        assert_eq!(user.real_name, "Ivan Ivanov");
        assert_eq!(user.category, Category::Adult);
        assert_eq!(user.nickname, "nik1");
    }

    #[tokio::test]
    async fn test_finalize_registration_consumes_draft() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .save_draft(&RegistrationDraft {
                account_id: 9,
                nickname: "fresh".to_string(),
                real_name: "Fresh F".to_string(),
                phone: Some("123".to_string()),
                referrer: Some(1),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let user = store.finalize_registration(9, Category::Teen).await.unwrap();
        assert_eq!(user.nickname, "fresh");
        assert_eq!(user.category, Category::Teen);
        assert_eq!(user.referrer, Some(1));
        assert!(store.get_draft(9).await.unwrap().is_none());

        let err = store.finalize_registration(9, Category::Teen).await.unwrap_err();
        assert!(matches!(err, BotError::DraftMissing { account_id: 9 }));
    }

    #[tokio::test]
    async fn test_finalize_conflict_keeps_draft() {
        let store = store_with(&[(1, "taken")]).await;
        store
            .save_draft(&RegistrationDraft {
                account_id: 2,
                nickname: "taken".to_string(),
                real_name: "Late L".to_string(),
                phone: None,
                referrer: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let err = store.finalize_registration(2, Category::Adult).await.unwrap_err();
        assert!(matches!(err, BotError::NicknameTaken { .. }));
        assert!(store.get_draft(2).await.unwrap().is_some());
        assert!(store.get_user(2).await.unwrap().is_none());
    }
}
