use poise::serenity_prelude as serenity;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::commands::general::{prompt_view, reply_result, subscription_gate};
use crate::components::ComponentAction;
use crate::conversation::ConversationState;
use crate::error::{BotError, Result};
use crate::managers::{invite_url, DiscordInviteIssuer};
use crate::messages;
use crate::models::User;
use crate::views::{Button, View, ViewAttachment};
use crate::{Context, Data, Error};

fn with_photo(view: View, user: &User) -> View {
    match &user.photo_path {
        Some(path) => view.attachment(ViewAttachment::Path(PathBuf::from(path))),
        None => view,
    }
}

/// The caller's own profile, with phone, referral count and the update button
pub async fn own_profile_view(data: &Data, account_id: u64) -> Result<View> {
    let user = match data.store.get_user(account_id).await? {
        Some(user) => user,
        None => return Ok(View::text(messages::not_registered_message())),
    };
    let referrals = data.invites.referral_count(account_id).await?;

    let view = View::text(messages::own_profile_text(&user, referrals)).row(vec![
        Button::action(
            "Point history",
            ComponentAction::History(user.nickname.clone()),
        ),
        Button::primary("Update profile", ComponentAction::UpdateProfile),
    ]);
    Ok(with_photo(view, &user))
}

/// Someone else's profile. Admins also see the account id, handle and registration date.
pub async fn other_profile_view(
    http: &serenity::Http,
    data: &Data,
    viewer_id: u64,
    nickname: &str,
) -> Result<View> {
    let user = data
        .store
        .get_user_by_nickname(nickname)
        .await?
        .ok_or_else(|| BotError::UserNotFound {
            identifier: nickname.to_string(),
        })?;

    let handle = if data.is_admin(viewer_id) {
        let handle = match serenity::UserId::new(user.account_id).to_user(http).await {
            Ok(account) => account.tag(),
            Err(e) => {
                warn!("Failed to look up account {}: {}", user.account_id, e);
                "unknown".to_string()
            }
        };
        Some(handle)
    } else {
        None
    };

    let view = View::text(messages::other_profile_text(&user, handle.as_deref())).row(vec![
        Button::action(
            "Point history",
            ComponentAction::History(user.nickname.clone()),
        ),
    ]);
    Ok(with_photo(view, &user))
}

/// Profile screen behind the subscription gate
pub async fn profile_view(
    http: &serenity::Http,
    data: &Data,
    viewer_id: u64,
    nickname: Option<&str>,
) -> Result<View> {
    if let Some(gate) = subscription_gate(http, data, viewer_id).await {
        return Ok(gate);
    }
    match nickname {
        Some(nickname) => back_to_profile_view(http, data, viewer_id, nickname).await,
        None => own_profile_view(data, viewer_id).await,
    }
}

/// Own profile when `nickname` is the viewer's, otherwise the public one
pub async fn back_to_profile_view(
    http: &serenity::Http,
    data: &Data,
    viewer_id: u64,
    nickname: &str,
) -> Result<View> {
    let own = data
        .store
        .get_user(viewer_id)
        .await?
        .is_some_and(|u| u.nickname == nickname);
    if own {
        own_profile_view(data, viewer_id).await
    } else {
        other_profile_view(http, data, viewer_id, nickname).await
    }
}

pub async fn history_view(data: &Data, nickname: &str) -> Result<View> {
    if data.store.get_user_by_nickname(nickname).await?.is_none() {
        return Err(BotError::UserNotFound {
            identifier: nickname.to_string(),
        });
    }
    let grants = data.store.history(nickname).await?;

    Ok(View::text(messages::history_text(nickname, &grants)).row(vec![Button::action(
        "Back to profile",
        ComponentAction::BackToProfile(nickname.to_string()),
    )]))
}

/// Start the profile update flow
pub async fn update_profile_view(data: &Data, account_id: u64) -> Result<View> {
    if data.store.get_user(account_id).await?.is_none() {
        return Ok(View::text(messages::not_registered_message()));
    }
    let prompt = data
        .conversations
        .begin(account_id, ConversationState::start_profile_update())
        .await?;
    info!("User {} started a profile update", account_id);
    Ok(prompt_view(prompt, None))
}

pub async fn invite_view(http: &serenity::Http, data: &Data, account_id: u64) -> Result<View> {
    if data.store.get_user(account_id).await?.is_none() {
        return Ok(View::text(messages::not_registered_message()));
    }
    let channel_id = match data.config.invite_channel_id {
        Some(id) => serenity::ChannelId::new(id),
        None => return Ok(View::text(messages::invite_unavailable_message())),
    };

    let issuer = DiscordInviteIssuer {
        http,
        channel_id,
        max_uses: data.config.invite_max_uses,
    };
    let link = match data.invites.get_or_create_invite(account_id, &issuer).await {
        Ok(link) => link,
        Err(e) => {
            warn!("Failed to create invite for {}: {}", account_id, e);
            return Ok(View::text(messages::invite_unavailable_message()));
        }
    };
    let referrals = data.invites.referral_count(account_id).await?;
    let url = invite_url(&link.token);

    Ok(View::text(messages::invite_text(&url, referrals)))
}

/// Show your profile or another participant's
#[poise::command(prefix_command, slash_command)]
pub async fn profile(
    ctx: Context<'_>,
    #[description = "Nickname of another participant"] nickname: Option<String>,
) -> std::result::Result<(), Error> {
    let view = profile_view(
        ctx.http(),
        ctx.data(),
        ctx.author().id.get(),
        nickname.as_deref(),
    )
    .await;
    reply_result(ctx, view).await
}

/// Show the point history of a participant
#[poise::command(prefix_command, slash_command)]
pub async fn history(
    ctx: Context<'_>,
    #[description = "Nickname"] nickname: String,
) -> std::result::Result<(), Error> {
    let view = history_view(ctx.data(), &nickname).await;
    reply_result(ctx, view).await
}

/// Get your personal invite link
#[poise::command(prefix_command, slash_command)]
pub async fn invite(ctx: Context<'_>) -> std::result::Result<(), Error> {
    let view = invite_view(ctx.http(), ctx.data(), ctx.author().id.get()).await;
    reply_result(ctx, view).await
}
