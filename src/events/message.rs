use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

use crate::commands::events::events_view;
use crate::commands::general::{
    cancel_view, error_view, info_view, outcome_view, register_view, start_view,
};
use crate::commands::profile::{invite_view, profile_view};
use crate::commands::rating::rating_view;
use crate::conversation::Input;
use crate::error::{BotError, Result};
use crate::messages;
use crate::views::View;
use crate::{Data, Error};

/// Words accepted in place of the menu buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Start,
    Info,
    Cancel,
    Register,
    Profile,
    Rating,
    Events,
    Invite,
}

impl Keyword {
    fn parse(text: &str) -> Option<Self> {
        let keyword = match text.trim().to_lowercase().as_str() {
            "start" | "menu" => Keyword::Start,
            "info" => Keyword::Info,
            "cancel" => Keyword::Cancel,
            "register" => Keyword::Register,
            "profile" => Keyword::Profile,
            "rating" => Keyword::Rating,
            "events" => Keyword::Events,
            "invite" => Keyword::Invite,
            _ => return None,
        };
        Some(keyword)
    }

    /// Keywords that take effect even in the middle of a flow
    fn interrupts(&self) -> bool {
        matches!(self, Keyword::Info | Keyword::Cancel)
    }
}

/// Handle incoming messages
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> std::result::Result<(), Error> {
    // Ignore bot messages
    if msg.author.bot {
        return Ok(());
    }

    // Conversations happen in DMs only
    if msg.guild_id.is_some() {
        return Ok(());
    }

    // Commands are handled by the framework
    if msg.content.starts_with(crate::PREFIX) {
        return Ok(());
    }

    let view = match route_dm(ctx, msg, data).await {
        Ok(Some(view)) => view,
        Ok(None) => return Ok(()),
        Err(e) => error_view(&e),
    };

    msg.channel_id
        .send_message(&ctx.http, view.into_message().await)
        .await?;
    Ok(())
}

async fn route_dm(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<Option<View>> {
    let account_id = msg.author.id.get();
    debug!("Processing DM from: {}", msg.author.name);

    if data.photos.is_pending(account_id) && !msg.attachments.is_empty() {
        return handle_photo_upload(data, msg).await.map(Some);
    }

    let text = msg.content.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let keyword = Keyword::parse(text);

    if let Some(keyword) = keyword.filter(Keyword::interrupts) {
        return dispatch_keyword(ctx, msg, data, keyword).await.map(Some);
    }

    if data.conversations.is_active(account_id) {
        let outcome = data
            .conversations
            .handle_input(account_id, Input::Text(text))
            .await?;
        return outcome_view(data, account_id, outcome).await.map(Some);
    }

    match keyword {
        Some(keyword) => dispatch_keyword(ctx, msg, data, keyword).await.map(Some),
        None => Ok(Some(View::text(messages::unknown_input_message()))),
    }
}

async fn dispatch_keyword(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
    keyword: Keyword,
) -> Result<View> {
    let account_id = msg.author.id.get();
    let http = ctx.http.as_ref();

    match keyword {
        Keyword::Start => start_view(data, account_id, &msg.author.name).await,
        Keyword::Info => Ok(info_view(data, account_id)),
        Keyword::Cancel => cancel_view(data, account_id, &msg.author.name).await,
        Keyword::Register => register_view(http, data, account_id).await,
        Keyword::Profile => profile_view(http, data, account_id, None).await,
        Keyword::Rating => rating_view(http, data, account_id).await,
        Keyword::Events => events_view(data).await,
        Keyword::Invite => invite_view(http, data, account_id).await,
    }
}

/// Image sent by an admin after `update_photo`
async fn handle_photo_upload(data: &Data, msg: &serenity::Message) -> Result<View> {
    let admin_id = msg.author.id.get();
    let nickname = match data.photos.take(admin_id) {
        Some(nickname) => nickname,
        None => return Ok(View::text(messages::unknown_input_message())),
    };

    let attachment = &msg.attachments[0];
    let dimensions = attachment.width.zip(attachment.height);

    // Reject before downloading
    crate::managers::photo_manager::check_upload(&attachment.filename, dimensions)?;

    let bytes = attachment.download().await.map_err(|e| {
        warn!("Failed to download {}: {}", attachment.filename, e);
        BotError::Discord {
            message: format!("download failed: {}", e),
        }
    })?;

    data.photos
        .save(&nickname, &attachment.filename, dimensions, &bytes)
        .await?;
    info!("Admin {} updated the photo of {}", admin_id, nickname);
    Ok(View::text(messages::photo_updated_message(&nickname)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(Keyword::parse(" Menu "), Some(Keyword::Start));
        assert_eq!(Keyword::parse("INFO"), Some(Keyword::Info));
        assert_eq!(Keyword::parse("nik1"), None);
        assert!(Keyword::Info.interrupts());
        assert!(Keyword::Cancel.interrupts());
        assert!(!Keyword::Profile.interrupts());
    }
}
