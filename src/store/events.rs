use chrono::{DateTime, Utc};
use tracing::info;

use super::{is_unique_violation, Store};
use crate::error::{BotError, Result};
use crate::models::Event;

#[derive(sqlx::FromRow)]
struct EventRow {
    name: String,
    content: String,
    created_at: DateTime<Utc>,
    completed: bool,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            name: row.name,
            content: row.content,
            created_at: row.created_at,
            completed: row.completed,
        }
    }
}

impl Store {
    /// All events, oldest first
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT name, content, created_at, completed FROM events ORDER BY created_at ASC, name ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Event::from).collect())
    }

    pub async fn get_event(&self, name: &str) -> Result<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(
            "SELECT name, content, created_at, completed FROM events WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Event::from))
    }

    pub async fn insert_event(&self, name: &str, content: &str) -> Result<Event> {
        let row: EventRow = sqlx::query_as(
            "INSERT INTO events (name, content, created_at, completed) VALUES (?, ?, ?, 0) \
             RETURNING name, content, created_at, completed",
        )
        .bind(name)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                BotError::EventExists {
                    name: name.to_string(),
                }
            } else {
                BotError::from(e)
            }
        })?;

        info!("Created event '{}'", name);
        Ok(Event::from(row))
    }

    /// Mark an event completed. There is no way back.
    pub async fn complete_event(&self, name: &str) -> Result<()> {
        let result = sqlx::query("UPDATE events SET completed = 1 WHERE name = ?")
            .bind(name)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::EventNotFound {
                name: name.to_string(),
            });
        }

        info!("Completed event '{}'", name);
        Ok(())
    }

    pub async fn delete_event(&self, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM events WHERE name = ?")
            .bind(name)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::EventNotFound {
                name: name.to_string(),
            });
        }

        info!("Deleted event '{}'", name);
        Ok(())
    }
}
