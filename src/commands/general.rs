use poise::serenity_prelude as serenity;
use tracing::{error, info};

use crate::commands::profile::own_profile_view;
use crate::components::{ComponentAction, MenuItem};
use crate::conversation::{ConversationState, Prompt, Rejection};
use crate::error::{BotError, Result};
use crate::managers::{is_subscribed, GuildMembership, Outcome};
use crate::messages;
use crate::models::Category;
use crate::views::{Button, View};
use crate::{Context, Data, Error};

/// Main menu: differs for registered and unregistered accounts
pub async fn start_view(data: &Data, account_id: u64, display_name: &str) -> Result<View> {
    data.conversations.interrupt(account_id);

    match data.store.get_user(account_id).await? {
        Some(user) => Ok(View::text(messages::menu_message(&user.nickname)).buttons(vec![
            Button::primary("Profile", ComponentAction::Menu(MenuItem::Profile)),
            Button::action("Rating", ComponentAction::Menu(MenuItem::Rating)),
            Button::action("Events", ComponentAction::Menu(MenuItem::Events)),
            Button::action("My invite", ComponentAction::Menu(MenuItem::Invite)),
            Button::action("Info", ComponentAction::Menu(MenuItem::Info)),
        ])),
        None => Ok(View::text(messages::welcome_message(display_name)).buttons(vec![
            Button::primary("Register", ComponentAction::Menu(MenuItem::Register)),
            Button::action("Events", ComponentAction::Menu(MenuItem::Events)),
            Button::action("Info", ComponentAction::Menu(MenuItem::Info)),
        ])),
    }
}

/// Info text. Interrupts whatever flow the account was in.
pub fn info_view(data: &Data, account_id: u64) -> View {
    if data.conversations.interrupt(account_id) {
        info!("Info interrupted the conversation of {}", account_id);
    }
    View::text(messages::info_message())
}

/// `Some(view)` telling the user to join first, `None` when they may continue
pub async fn subscription_gate(
    http: &serenity::Http,
    data: &Data,
    account_id: u64,
) -> Option<View> {
    let gate = GuildMembership {
        http,
        guild_id: serenity::GuildId::new(data.config.community_guild_id),
    };
    if is_subscribed(&gate, account_id).await {
        return None;
    }
    Some(not_subscribed_view(data, messages::not_subscribed_message(
        data.config.subscribe_url.as_deref(),
    )))
}

pub fn not_subscribed_view(data: &Data, text: String) -> View {
    let mut buttons = Vec::new();
    if let Some(url) = &data.config.subscribe_url {
        buttons.push(Button::link("Join the community", url));
    }
    buttons.push(Button::primary("I joined", ComponentAction::CheckSubscription));
    View::text(text).row(buttons)
}

pub async fn register_view(http: &serenity::Http, data: &Data, account_id: u64) -> Result<View> {
    if let Some(user) = data.store.get_user(account_id).await? {
        return Ok(View::text(messages::already_registered_message(&user.nickname)));
    }
    if let Some(gate) = subscription_gate(http, data, account_id).await {
        return Ok(gate);
    }

    let prompt = data
        .conversations
        .begin(account_id, ConversationState::start_registration())
        .await?;
    info!("User {} started registration", account_id);
    Ok(prompt_view(prompt, None))
}

/// Discard the active flow and show the neutral view
pub async fn cancel_view(data: &Data, account_id: u64, display_name: &str) -> Result<View> {
    if data.conversations.cancel(account_id).await? {
        info!("User {} cancelled their conversation", account_id);
    }

    let neutral = match data.store.get_user(account_id).await? {
        Some(_) => own_profile_view(data, account_id).await?,
        None => start_view(data, account_id, display_name).await?,
    };
    Ok(View {
        content: format!("{}\n\n{}", messages::cancelled_message(), neutral.content),
        ..neutral
    })
}

/// Question for `prompt`, optionally preceded by a rejection notice
pub fn prompt_view(prompt: Prompt, rejection: Option<&Rejection>) -> View {
    let mut text = messages::prompt_text(prompt);
    if let Some(reason) = rejection {
        text = format!("{}\n\n{}", messages::rejection_text(reason), text);
    }

    let view = View::text(text);
    let view = if prompt == Prompt::ProfileCategory {
        view.row(
            Category::ALL
                .into_iter()
                .map(|c| Button::action(c.as_str(), ComponentAction::ProfileCategory(c)))
                .collect(),
        )
    } else {
        view
    };
    view.row(vec![Button::danger("Cancel", ComponentAction::Cancel)])
}

pub fn category_choice_view(nickname: &str) -> View {
    View::text(messages::choose_category_message(nickname))
        .row(
            Category::ALL
                .into_iter()
                .map(|c| Button::primary(c.as_str(), ComponentAction::RegisterCategory(c)))
                .collect(),
        )
        .row(vec![Button::danger("Cancel", ComponentAction::Cancel)])
}

/// What to show after the conversation manager handled an input
pub async fn outcome_view(data: &Data, account_id: u64, outcome: Outcome) -> Result<View> {
    let view = match outcome {
        Outcome::Idle => View::text(messages::unknown_input_message()),
        Outcome::Prompt(prompt) => prompt_view(prompt, None),
        Outcome::Rejected { reason, prompt } => prompt_view(prompt, Some(&reason)),
        Outcome::AwaitingCategory { nickname } => category_choice_view(&nickname),
        Outcome::ProfileUpdated(_) => {
            let profile = own_profile_view(data, account_id).await?;
            View {
                content: format!("{}\n\n{}", messages::profile_updated_message(), profile.content),
                ..profile
            }
        }
        Outcome::EventCreated(event) => View::text(messages::event_created_message(&event.name)),
    };
    Ok(view)
}

/// Finish registration with the picked category
pub async fn finalize_view(data: &Data, account_id: u64, category: Category) -> Result<View> {
    match data
        .conversations
        .finalize_registration(account_id, category)
        .await
    {
        Ok(user) => Ok(View::text(messages::registration_complete_message(&user.nickname))
            .buttons(vec![
                Button::primary("Profile", ComponentAction::Menu(MenuItem::Profile)),
                Button::action("Rating", ComponentAction::Menu(MenuItem::Rating)),
                Button::action("Events", ComponentAction::Menu(MenuItem::Events)),
                Button::action("My invite", ComponentAction::Menu(MenuItem::Invite)),
            ])),
        Err(BotError::AccountTaken { .. }) => match data.store.get_user(account_id).await? {
            Some(user) => Ok(View::text(messages::already_registered_message(&user.nickname))),
            None => Ok(View::text(messages::error_message())),
        },
        Err(BotError::NicknameTaken { nickname }) => {
            Ok(View::text(messages::nickname_conflict_message(&nickname)))
        }
        Err(BotError::DraftMissing { .. }) => Ok(View::text(messages::draft_missing_message())),
        Err(e) => Err(e),
    }
}

/// Turn a failed operation into a reply, logging anything unexpected
pub fn error_view(e: &BotError) -> View {
    if !e.is_user_facing() {
        error!("Request failed: {}", e);
        return View::text(messages::error_message());
    }
    let text = match e {
        BotError::NicknameTaken { nickname } => messages::nickname_conflict_message(nickname),
        BotError::EventExists { name } => messages::event_exists_message(name),
        BotError::UserNotFound { .. } => messages::user_not_found_message(),
        BotError::EventNotFound { .. } => messages::event_not_found_message(),
        BotError::DraftMissing { .. } => messages::draft_missing_message(),
        BotError::Validation { message } => format!("❌ {}", message),
        _ => messages::error_message(),
    };
    View::text(text)
}

/// Send a view as the reply to a command
pub async fn reply(ctx: Context<'_>, view: View) -> std::result::Result<(), Error> {
    ctx.send(view.into_reply().await).await?;
    Ok(())
}

/// Reply with the view or the error's user-facing rendering
pub async fn reply_result(ctx: Context<'_>, result: Result<View>) -> std::result::Result<(), Error> {
    let view = match result {
        Ok(view) => view,
        Err(e) => error_view(&e),
    };
    reply(ctx, view).await
}

/// Open the main menu
#[poise::command(prefix_command, slash_command, aliases("menu"))]
pub async fn start(ctx: Context<'_>) -> std::result::Result<(), Error> {
    let author = ctx.author();
    let view = start_view(ctx.data(), author.id.get(), &author.name).await;
    reply_result(ctx, view).await
}

/// How the rating works
#[poise::command(prefix_command, slash_command)]
pub async fn info(ctx: Context<'_>) -> std::result::Result<(), Error> {
    let view = info_view(ctx.data(), ctx.author().id.get());
    reply(ctx, view).await
}

/// Register for the rating
#[poise::command(prefix_command, slash_command, dm_only)]
pub async fn register(ctx: Context<'_>) -> std::result::Result<(), Error> {
    let view = register_view(ctx.http(), ctx.data(), ctx.author().id.get()).await;
    reply_result(ctx, view).await
}

/// Stop the current registration or profile update
#[poise::command(prefix_command, slash_command)]
pub async fn cancel(ctx: Context<'_>) -> std::result::Result<(), Error> {
    let author = ctx.author();
    let view = cancel_view(ctx.data(), author.id.get(), &author.name).await;
    reply_result(ctx, view).await
}

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> std::result::Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(
        poise::CreateReply::default()
            .content("Pong! Bot is working!")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> std::result::Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Bot Commands")
        .description("Available commands:")
        .field("!start", "Open the main menu", false)
        .field("!register", "Register for the rating (in DMs)", false)
        .field("!profile [nickname]", "Show your profile or someone else's", false)
        .field("!rating", "Show the top of the rating", false)
        .field("!my_rank", "Show your place in the rating", false)
        .field("!history <nickname>", "Show point history", false)
        .field("!events", "List community events", false)
        .field("!invite", "Get your invite link", false)
        .field("!cancel", "Stop the current dialog", false)
        .color(0x3498db);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
