use tracing::info;

use crate::commands::admin::admin_check;
use crate::commands::general::{prompt_view, reply, reply_result};
use crate::components::ComponentAction;
use crate::conversation::ConversationState;
use crate::error::{BotError, Result};
use crate::messages;
use crate::views::{Button, View};
use crate::{Context, Data, Error};

/// Longest event name that still fits into a button payload
pub const EVENT_NAME_MAX_CHARS: usize = 80;

/// Most events offered as buttons
const EVENT_BUTTONS_MAX: usize = 25;

pub fn validate_event_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BotError::Validation {
            message: "Event name cannot be empty".to_string(),
        });
    }
    if name.chars().count() > EVENT_NAME_MAX_CHARS
        || !ComponentAction::CompleteEvent(name.to_string()).fits()
    {
        return Err(BotError::Validation {
            message: format!(
                "Event name must be at most {} characters long",
                EVENT_NAME_MAX_CHARS
            ),
        });
    }
    Ok(name)
}

pub async fn events_view(data: &Data) -> Result<View> {
    let events = data.events.list().await?;

    let buttons: Vec<Button> = events
        .iter()
        .rev()
        .take(EVENT_BUTTONS_MAX)
        .map(|e| {
            Button::action(
                format!("{} {}", messages::event_status(e), e.name),
                ComponentAction::Event(e.name.clone()),
            )
        })
        .collect();

    Ok(View::text(messages::events_text(&events)).buttons(buttons))
}

/// Event details; admins get a completion button for open events
pub async fn event_view(data: &Data, viewer_id: u64, name: &str) -> Result<View> {
    let event = data.events.get(name).await?;

    let mut buttons = Vec::new();
    if data.is_admin(viewer_id) && !event.completed {
        buttons.push(Button::primary(
            "Mark completed",
            ComponentAction::CompleteEvent(event.name.clone()),
        ));
    }
    buttons.push(Button::action("Back", ComponentAction::BackToEvents));

    Ok(View::text(messages::event_text(&event)).row(buttons))
}

/// Mark an event completed. Non-admins just see the event again.
pub async fn complete_event_view(data: &Data, viewer_id: u64, name: &str) -> Result<View> {
    if data.is_admin(viewer_id) {
        data.events.complete(name).await?;
        info!("Admin {} completed event '{}'", viewer_id, name);
    }
    event_view(data, viewer_id, name).await
}

/// List community events
#[poise::command(prefix_command, slash_command)]
pub async fn events(ctx: Context<'_>) -> std::result::Result<(), Error> {
    let view = events_view(ctx.data()).await;
    reply_result(ctx, view).await
}

/// Create an event; the description is asked for next
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn event(
    ctx: Context<'_>,
    #[rest] name: String,
) -> std::result::Result<(), Error> {
    let data = ctx.data();
    let name = match validate_event_name(&name) {
        Ok(name) => name.to_string(),
        Err(e) => return reply_result(ctx, Err(e)).await,
    };

    if data.events.exists(&name).await? {
        return reply(ctx, View::text(messages::event_exists_message(&name))).await;
    }

    let prompt = data
        .conversations
        .begin(ctx.author().id.get(), ConversationState::start_event(&name))
        .await?;
    reply(ctx, prompt_view(prompt, None)).await
}

/// Delete an event
#[poise::command(prefix_command, hide_in_help, check = "admin_check")]
pub async fn delete_event(
    ctx: Context<'_>,
    #[rest] name: String,
) -> std::result::Result<(), Error> {
    let name = name.trim();
    let result = ctx
        .data()
        .events
        .delete(name)
        .await
        .map(|()| View::text(format!("🗑️ Event **{}** deleted.", name)));
    reply_result(ctx, result).await
}
