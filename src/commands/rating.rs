use poise::serenity_prelude as serenity;

use crate::commands::general::{reply_result, subscription_gate};
use crate::components::ComponentAction;
use crate::error::Result;
use crate::managers::leaderboard::{clamp_requested, navigate, page_count, LeaderboardPage};
use crate::managers::PageNav;
use crate::messages;
use crate::views::{Button, View};
use crate::{Context, Data, Error};

/// Top of the rating, for registered members of the community
pub async fn rating_view(http: &serenity::Http, data: &Data, account_id: u64) -> Result<View> {
    if let Some(gate) = subscription_gate(http, data, account_id).await {
        return Ok(gate);
    }
    if data.store.get_user(account_id).await?.is_none() {
        return Ok(View::text(messages::not_registered_message()));
    }

    let top = data.leaderboard.top().await?;
    Ok(View::text(messages::top_text(&top)).row(vec![Button::primary(
        "Full rating",
        ComponentAction::RatingPage(0),
    )]))
}

/// Page of the full listing; out-of-range requests land on the nearest page
pub async fn rating_page_view(data: &Data, requested: i64) -> Result<View> {
    let pages = page_count(data.store.count_users().await?);
    let page = data.leaderboard.page(clamp_requested(requested, pages)).await?;
    Ok(page_view(&page))
}

fn page_view(page: &LeaderboardPage) -> View {
    let mut buttons = Vec::new();
    if page.has_prev() {
        let target = navigate(page.index, PageNav::Prev, page.page_count);
        buttons.push(Button::action(
            "◀ Previous",
            ComponentAction::RatingPage(target as i64),
        ));
    }
    if page.has_next() {
        let target = navigate(page.index, PageNav::Next, page.page_count);
        buttons.push(Button::action(
            "Next ▶",
            ComponentAction::RatingPage(target as i64),
        ));
    }
    View::text(messages::rating_page_text(page)).row(buttons)
}

pub async fn rank_view(data: &Data, account_id: u64) -> Result<View> {
    let user = match data.store.get_user(account_id).await? {
        Some(user) => user,
        None => return Ok(View::text(messages::not_registered_message())),
    };
    match data.leaderboard.rank(account_id).await? {
        Some(rank) => Ok(View::text(messages::rank_text(&user, rank))),
        None => Ok(View::text(messages::not_registered_message())),
    }
}

/// Show the top of the rating
#[poise::command(prefix_command, slash_command)]
pub async fn rating(ctx: Context<'_>) -> std::result::Result<(), Error> {
    let view = rating_view(ctx.http(), ctx.data(), ctx.author().id.get()).await;
    reply_result(ctx, view).await
}

/// Show your place in the rating
#[poise::command(prefix_command, slash_command)]
pub async fn my_rank(ctx: Context<'_>) -> std::result::Result<(), Error> {
    let view = rank_view(ctx.data(), ctx.author().id.get()).await;
    reply_result(ctx, view).await
}
