use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use crate::commands::events::{complete_event_view, event_view, events_view};
use crate::commands::general::{
    cancel_view, error_view, finalize_view, info_view, not_subscribed_view, outcome_view,
    register_view, start_view, subscription_gate,
};
use crate::commands::profile::{
    back_to_profile_view, history_view, invite_view, profile_view, update_profile_view,
};
use crate::commands::rating::{rating_page_view, rating_view};
use crate::components::{ComponentAction, MenuItem};
use crate::conversation::Input;
use crate::error::Result;
use crate::messages;
use crate::views::View;
use crate::{Data, Error};

/// Handle a button click
pub async fn handle_component(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> std::result::Result<(), Error> {
    let action = match ComponentAction::parse(&interaction.data.custom_id) {
        Some(action) => action,
        None => {
            warn!("Unknown button interaction: {}", interaction.data.custom_id);
            return Ok(());
        }
    };
    debug!("User {} clicked {}", interaction.user.id, action);

    let view = match dispatch(ctx, interaction, data, action).await {
        Ok(view) => view,
        Err(e) => error_view(&e),
    };

    interaction
        .create_response(&ctx.http, view.into_response().await)
        .await?;
    Ok(())
}

async fn dispatch(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
    action: ComponentAction,
) -> Result<View> {
    let http = ctx.http.as_ref();
    let account_id = interaction.user.id.get();
    let name = interaction.user.name.as_str();

    match action {
        ComponentAction::Menu(item) => match item {
            MenuItem::Register => register_view(http, data, account_id).await,
            MenuItem::Profile => profile_view(http, data, account_id, None).await,
            MenuItem::Rating => rating_view(http, data, account_id).await,
            MenuItem::Events => events_view(data).await,
            MenuItem::Invite => invite_view(http, data, account_id).await,
            MenuItem::Info => Ok(info_view(data, account_id)),
        },
        ComponentAction::CheckSubscription => {
            match subscription_gate(http, data, account_id).await {
                Some(_) => Ok(not_subscribed_view(
                    data,
                    messages::still_not_subscribed_message(),
                )),
                None => start_view(data, account_id, name).await,
            }
        }
        ComponentAction::RegisterCategory(category) => {
            finalize_view(data, account_id, category).await
        }
        ComponentAction::RatingPage(requested) => rating_page_view(data, requested).await,
        ComponentAction::History(nickname) => history_view(data, &nickname).await,
        ComponentAction::BackToProfile(nickname) => {
            back_to_profile_view(http, data, account_id, &nickname).await
        }
        ComponentAction::UpdateProfile => update_profile_view(data, account_id).await,
        ComponentAction::ProfileCategory(category) => {
            let outcome = data
                .conversations
                .handle_input(account_id, Input::Category(category))
                .await?;
            outcome_view(data, account_id, outcome).await
        }
        ComponentAction::Cancel => cancel_view(data, account_id, name).await,
        ComponentAction::Event(event) => event_view(data, account_id, &event).await,
        ComponentAction::CompleteEvent(event) => {
            complete_event_view(data, account_id, &event).await
        }
        ComponentAction::BackToEvents => events_view(data).await,
    }
}
