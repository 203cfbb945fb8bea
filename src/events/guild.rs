use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

use crate::managers::invite_manager::fetch_invite_uses;
use crate::{Data, Error};

fn is_community(data: &Data, guild_id: serenity::GuildId) -> bool {
    guild_id.get() == data.config.community_guild_id
}

/// Take the invite snapshot when the community guild becomes available
pub async fn handle_guild_create(
    ctx: &serenity::Context,
    guild: &serenity::Guild,
    data: &Data,
) -> Result<(), Error> {
    if !is_community(data, guild.id) {
        debug!("Ignoring guild {} ({})", guild.name, guild.id);
        return Ok(());
    }
    info!("Processing community guild: {} ({})", guild.name, guild.id);

    match fetch_invite_uses(&ctx.http, guild.id).await {
        Ok(uses) => {
            info!("Tracking {} invites in {}", uses.len(), guild.name);
            data.invites.tracker().snapshot(uses);
        }
        Err(e) => {
            // Without Manage Server the bot cannot list invites; referrals stay unattributed
            warn!("Failed to snapshot invites of {}: {}", guild.id, e);
        }
    }
    Ok(())
}

/// Work out which invite a new member used
pub async fn handle_member_add(
    ctx: &serenity::Context,
    new_member: &serenity::Member,
    data: &Data,
) -> Result<(), Error> {
    let guild_id = new_member.guild_id;
    if !is_community(data, guild_id) {
        return Ok(());
    }

    info!(
        "New member joined: {} in guild {}",
        new_member.user.name, guild_id
    );

    let account_id = new_member.user.id.get();
    let uses = fetch_invite_uses(&ctx.http, guild_id).await?;
    data.invites.tracker().record_join(account_id, uses);

    // Referrers are never changed once registered
    if data.store.get_user(account_id).await?.is_some() {
        data.invites.tracker().forget(account_id);
    }
    Ok(())
}

pub async fn handle_member_remove(
    data: &Data,
    guild_id: serenity::GuildId,
    user: &serenity::User,
) -> Result<(), Error> {
    if is_community(data, guild_id) {
        data.invites.tracker().forget(user.id.get());
    }
    Ok(())
}

pub async fn handle_invite_create(
    data: &Data,
    invite: &serenity::InviteCreateEvent,
) -> Result<(), Error> {
    if invite.guild_id.is_some_and(|g| is_community(data, g)) {
        debug!("Tracking new invite {}", invite.code);
        data.invites.tracker().track_new(&invite.code);
    }
    Ok(())
}
