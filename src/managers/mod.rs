pub mod backup_manager;
pub mod conversation_manager;
pub mod event_catalog;
pub mod invite_manager;
pub mod leaderboard;
pub mod membership;
pub mod notifier;
pub mod photo_manager;

pub use backup_manager::{create_shared_backup_manager, SharedBackupManager};
pub use conversation_manager::{
    create_shared_conversation_manager, Outcome, SharedConversationManager,
};
pub use event_catalog::{create_shared_event_catalog, SharedEventCatalog};
pub use invite_manager::{
    create_shared_invite_manager, invite_url, DiscordInviteIssuer, SharedInviteManager,
};
pub use leaderboard::{create_shared_leaderboard, PageNav, SharedLeaderboard};
pub use membership::{is_subscribed, GuildMembership};
pub use notifier::{DiscordNotifier, NotificationDispatcher, SharedNotificationDispatcher};
pub use photo_manager::{create_shared_photo_manager, SharedPhotoManager};
