//! Admin-only prefix commands.
//!
//! Every command is gated by [`admin_check`]; for anyone else the check
//! fails without a reply, so the commands look like they do not exist.

use std::path::Path;
use tracing::{info, warn};

use crate::commands::general::{reply, reply_result};
use crate::error::BotError;
use crate::managers::photo_manager::remove_photo;
use crate::messages;
use crate::views::{View, ViewAttachment};
use crate::{Context, Error};

/// Default number of lines shown by `logs`
const DEFAULT_LOG_LINES: usize = 20;

/// Discord message limit minus room for the code fence
const LOG_REPLY_MAX_CHARS: usize = 1900;

pub async fn admin_check(ctx: Context<'_>) -> Result<bool, Error> {
    Ok(ctx.data().is_admin(ctx.author().id.get()))
}

/// Award points to a participant
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn grant(
    ctx: Context<'_>,
    nickname: String,
    points: i64,
    #[rest] note: String,
) -> Result<(), Error> {
    let data = ctx.data();
    let note = note.trim();
    if note.is_empty() {
        return reply(ctx, View::text("Usage: `!grant <nickname> <points> <note>`")).await;
    }

    match data.store.grant_points(&nickname, points, note).await {
        Ok(receipt) => {
            data.notifications.dispatch(receipt.effects);
            info!(
                "Admin {} granted {} points to {}",
                ctx.author().id,
                points,
                nickname
            );
            reply(ctx, View::text(messages::granted_message(&receipt.user, points))).await
        }
        Err(e) => reply_result(ctx, Err(e)).await,
    }
}

/// Mark a participant inactive
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn disable(ctx: Context<'_>, nickname: String) -> Result<(), Error> {
    let result = ctx
        .data()
        .store
        .disable_user(&nickname)
        .await
        .map(|()| View::text(format!("User **{}** disabled.", nickname)));
    reply_result(ctx, result).await
}

/// Zero a participant's points and clear their history
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn reset(ctx: Context<'_>, nickname: String) -> Result<(), Error> {
    let result = ctx
        .data()
        .store
        .reset_user(&nickname)
        .await
        .map(|()| View::text(format!("Rating of **{}** reset.", nickname)));
    reply_result(ctx, result).await
}

/// Delete a participant by account id or nickname
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn delete(ctx: Context<'_>, identifier: String) -> Result<(), Error> {
    let data = ctx.data();
    let deleted = match data.store.delete_user(&identifier).await {
        Ok(deleted) => deleted,
        Err(e) => return reply_result(ctx, Err(e)).await,
    };

    if let Some(path) = &deleted.photo_path {
        remove_photo(Path::new(path)).await;
    }
    if let Err(e) = data.conversations.cancel(deleted.account_id).await {
        warn!("Failed to clear state of deleted user {}: {}", deleted.account_id, e);
    }

    reply(
        ctx,
        View::text(format!("🗑️ User **{}** deleted.", deleted.nickname)),
    )
    .await
}

/// Back the database up now
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn backup(ctx: Context<'_>) -> Result<(), Error> {
    let view = match ctx.data().backups.run_backup().await {
        Ok(path) => View::text(format!("💾 Backup created: `{}`", path.display())),
        Err(e) => {
            warn!("Manual backup failed: {}", e);
            View::text(format!("❌ {}", e))
        }
    };
    reply(ctx, view).await
}

/// Replace a participant's photo with the next image you send
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn update_photo(ctx: Context<'_>, nickname: String) -> Result<(), Error> {
    let result = ctx
        .data()
        .photos
        .request(ctx.author().id.get(), &nickname)
        .await
        .map(|()| View::text(messages::photo_prompt_message(&nickname)));
    reply_result(ctx, result).await
}

/// Show recent log lines
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn logs(ctx: Context<'_>, count: Option<usize>) -> Result<(), Error> {
    let entries = ctx
        .data()
        .log_buffer
        .get_recent(count.unwrap_or(DEFAULT_LOG_LINES));

    if entries.is_empty() {
        return reply(ctx, View::text("No log entries yet.")).await;
    }

    let lines: Vec<String> = entries.iter().map(|e| e.format()).collect();
    let text = lines.join("\n");
    let body = tail_chars(&text, LOG_REPLY_MAX_CHARS);
    reply(ctx, View::text(format!("```\n{}\n```", body))).await
}

/// Download all participants as JSON
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn export(ctx: Context<'_>) -> Result<(), Error> {
    let users = ctx.data().store.ranked_users().await?;
    let json = serde_json::to_vec_pretty(&users).map_err(BotError::from)?;

    info!("Admin {} exported {} users", ctx.author().id, users.len());
    let view = View::text(format!("📦 {} users", users.len())).attachment(ViewAttachment::Bytes {
        data: json,
        filename: "users.json".to_string(),
    });
    reply(ctx, view).await
}

/// The last `max` characters of `text`, cut at a line start when possible
fn tail_chars(text: &str, max: usize) -> &str {
    let total = text.chars().count();
    if total <= max {
        return text;
    }
    let start = text
        .char_indices()
        .nth(total - max)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail = &text[start..];
    match tail.find('\n') {
        Some(newline) => &tail[newline + 1..],
        None => tail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("short", 10), "short");
        assert_eq!(tail_chars("line one\nline two\nline three", 14), "line three");
        assert_eq!(tail_chars("абвгд", 2), "гд");
    }
}
