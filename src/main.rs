use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord bot for the community points rating
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands to all guilds (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Specific guild ID to sync commands to (for testing)
    #[arg(long)]
    guild_id: Option<u64>,
}

mod commands;
mod components;
mod config;
mod conversation;
mod error;
mod events;
mod logging;
mod managers;
mod messages;
mod models;
mod retry;
mod store;
mod views;

use commands::{
    backup, cancel, delete, delete_event, disable, event, events as events_command, export, grant,
    help, history, info, invite, logs, my_rank, ping, profile, rating, register, reset, start,
    update_photo,
};
use config::BotConfig;
use events::{
    handle_component, handle_guild_create, handle_invite_create, handle_member_add,
    handle_member_remove, handle_message,
};
use logging::SharedLogBuffer;
use managers::{
    create_shared_backup_manager, create_shared_conversation_manager, create_shared_event_catalog,
    create_shared_invite_manager, create_shared_leaderboard, create_shared_photo_manager,
    DiscordNotifier, NotificationDispatcher, SharedBackupManager, SharedConversationManager,
    SharedEventCatalog, SharedInviteManager, SharedLeaderboard, SharedNotificationDispatcher,
    SharedPhotoManager,
};
use store::Store;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Prefix for text commands
pub const PREFIX: &str = "!";

/// Shared application state
pub struct Data {
    pub config: Arc<BotConfig>,
    pub store: Store,
    pub conversations: SharedConversationManager,
    pub leaderboard: SharedLeaderboard,
    pub invites: SharedInviteManager,
    pub events: SharedEventCatalog,
    pub notifications: SharedNotificationDispatcher,
    pub backups: SharedBackupManager,
    pub photos: SharedPhotoManager,
    pub log_buffer: SharedLogBuffer,
}

impl Data {
    pub fn is_admin(&self, account_id: u64) -> bool {
        self.config.is_admin(account_id)
    }
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = handle_message(ctx, new_message, data).await {
                error!("Failed to handle message: {}", e);
            }
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            if let Err(e) = handle_component(ctx, component, data).await {
                error!("Failed to handle button: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = handle_member_add(ctx, new_member, data).await {
                error!("Failed to handle new member: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            if let Err(e) = handle_member_remove(data, *guild_id, user).await {
                error!("Failed to handle member removal: {}", e);
            }
        }
        serenity::FullEvent::InviteCreate { data: invite } => {
            if let Err(e) = handle_invite_create(data, invite).await {
                error!("Failed to handle invite create: {}", e);
            }
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            if let Err(e) = handle_guild_create(ctx, guild, data).await {
                error!("Failed to handle guild create: {}", e);
            }
        }
        _ => {}
    }
    Ok(())
}

fn log_bot_id(token: &str) {
    // Discord tokens start with the base64 encoded application id
    let Some(bot_id_b64) = token.split('.').next() else {
        return;
    };

    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(bot_id_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(bot_id_b64));

    if let Some(id_str) = decoded.ok().and_then(|bytes| String::from_utf8(bytes).ok()) {
        info!(
            "Bot ID: {} (configure intents at https://discord.com/developers/applications/{}/bot)",
            id_str, id_str
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Create log buffer for the admin `logs` command
    let log_buffer = logging::create_log_buffer(1000);

    // Initialize tracing with our custom layer
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(logging::LogCaptureLayer::new(log_buffer.clone()))
        .init();

    let config = Arc::new(BotConfig::from_env()?);
    log_bot_id(&config.token);
    info!(
        "Loaded config: {} admins, community guild {}",
        config.admins.len(),
        config.community_guild_id
    );

    info!("Opening database {}...", config.db_path.display());
    let store = Store::open(&config.db_path).await?;

    // Create managers
    let leaderboard = create_shared_leaderboard(store.clone());
    let invites = create_shared_invite_manager(store.clone());
    let event_catalog = create_shared_event_catalog(store.clone());
    let conversations =
        create_shared_conversation_manager(store.clone(), invites.clone(), event_catalog.clone());
    let photos = create_shared_photo_manager(store.clone(), config.photo_dir.clone());
    let backups =
        create_shared_backup_manager(store.clone(), config.backup_dir.clone(), config.backup_keep);

    let notifier_http = Arc::new(serenity::Http::new(&config.token));
    let (dispatcher, _dispatcher_handle) =
        NotificationDispatcher::spawn(Arc::new(DiscordNotifier::new(notifier_http)));
    let notifications = Arc::new(dispatcher);

    let _backup_handle = backups.clone().spawn_schedule(config.backup_interval);

    // Extract CLI flags for use in setup
    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;
    let target_guild_id = args.guild_id;

    if sync_commands {
        info!("--sync-commands: Will force re-register slash commands");
    }
    if guild_commands {
        info!("--guild-commands: Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }
    if let Some(gid) = target_guild_id {
        info!("--guild-id: Targeting specific guild {}", gid);
    }

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    // Log which privileged intents we're requesting
    let privileged_intents: Vec<&str> = [
        (serenity::GatewayIntents::MESSAGE_CONTENT, "MESSAGE_CONTENT"),
        (serenity::GatewayIntents::GUILD_MEMBERS, "GUILD_MEMBERS"),
        (serenity::GatewayIntents::GUILD_PRESENCES, "GUILD_PRESENCES"),
    ]
    .into_iter()
    .filter(|(intent, _)| intents.contains(*intent))
    .map(|(_, name)| name)
    .collect();

    info!("Requesting privileged intents: {:?}", privileged_intents);

    let result = retry::retry_bounded(
        config.connect_retries,
        config.connect_retry_delay,
        |attempt| {
            let data = Data {
                config: config.clone(),
                store: store.clone(),
                conversations: conversations.clone(),
                leaderboard: leaderboard.clone(),
                invites: invites.clone(),
                events: event_catalog.clone(),
                notifications: notifications.clone(),
                backups: backups.clone(),
                photos: photos.clone(),
                log_buffer: log_buffer.clone(),
            };
            let token = config.token.clone();

            async move {
                info!("Starting bot (attempt {})...", attempt);
                let framework = build_framework(data, sync_commands, guild_commands, target_guild_id);
                let mut client = serenity::ClientBuilder::new(token, intents)
                    .framework(framework)
                    .await?;
                client.start().await
            }
        },
    )
    .await;

    store.close().await;

    if let Err(e) = result {
        // Check if it's a disallowed intents error
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("The following privileged intents need to be enabled in the Discord Developer Portal:");
            for intent in &privileged_intents {
                error!("  - {}", intent);
            }
            error!("Go to https://discord.com/developers/applications -> Your App -> Bot -> Privileged Gateway Intents");
            return Err(anyhow::anyhow!(
                "Disallowed gateway intents. Enable these in Discord Developer Portal: {:?}",
                privileged_intents
            ));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}

fn build_framework(
    data: Data,
    sync_commands: bool,
    guild_commands: bool,
    target_guild_id: Option<u64>,
) -> poise::Framework<Data, Error> {
    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                start(),
                info(),
                help(),
                ping(),
                register(),
                cancel(),
                profile(),
                history(),
                invite(),
                rating(),
                my_rank(),
                events_command(),
                event(),
                delete_event(),
                grant(),
                disable(),
                reset(),
                delete(),
                backup(),
                update_photo(),
                logs(),
                export(),
            ],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(PREFIX.to_string()),
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' completed for {}",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx.say(messages::error_message()).await;
                        }
                        poise::FrameworkError::CommandCheckFailed { ctx, .. } => {
                            // Admin commands stay silent for everyone else
                            info!(
                                "User {} failed the check for '{}'",
                                ctx.author().id,
                                ctx.command().qualified_name
                            );
                        }
                        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
                            error!("Argument parse error in '{}': {} (input: {:?})", ctx.command().qualified_name, error, input);
                            if ctx.data().is_admin(ctx.author().id.get()) || !ctx.command().hide_in_help {
                                let _ = ctx
                                    .say(format!("Usage: `{}{} ...` ({})", PREFIX, ctx.command().name, error))
                                    .await;
                            }
                        }
                        poise::FrameworkError::DmOnly { ctx, .. } => {
                            let _ = ctx.say("Please use this command in a direct message to the bot.").await;
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                // Determine which guilds to register commands for
                let guilds_to_register: Vec<serenity::GuildId> = if let Some(gid) = target_guild_id {
                    vec![serenity::GuildId::new(gid)]
                } else {
                    ready.guilds.iter().map(|g| g.id).collect()
                };

                if guild_commands || sync_commands {
                    for guild_id in &guilds_to_register {
                        info!("Registering commands to guild: {}", guild_id);
                        if let Err(e) = poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            *guild_id,
                        ).await {
                            error!("Failed to register commands for guild {}: {}", guild_id, e);
                        } else {
                            info!("Successfully registered {} commands for guild {}",
                                  framework.options().commands.len(), guild_id);
                        }
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) = poise::builtins::register_globally(
                        ctx,
                        &framework.options().commands,
                    ).await {
                        error!("Failed to register commands globally: {}", e);
                    } else {
                        info!("Successfully registered {} commands globally (may take up to 1 hour to propagate)",
                              framework.options().commands.len());
                    }
                }

                Ok(data)
            })
        })
        .build()
}
