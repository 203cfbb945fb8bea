use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, CreateMessage, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::messages;
use crate::models::Effect;

/// Delivers a text to one account
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, account_id: u64, text: &str) -> Result<()>;
}

/// Sends notifications as direct messages
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, account_id: u64, text: &str) -> Result<()> {
        UserId::new(account_id)
            .direct_message(&self.http, CreateMessage::new().content(text))
            .await?;
        Ok(())
    }
}

/// Runs post-commit effects on a background task.
///
/// Ledger writes are already committed when effects arrive here; a failed
/// delivery is logged and dropped.
pub struct NotificationDispatcher {
    sender: mpsc::UnboundedSender<Effect>,
}

impl NotificationDispatcher {
    /// Start the worker task
    pub fn spawn(notifier: Arc<dyn Notifier>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Effect>();

        let handle = tokio::spawn(async move {
            while let Some(effect) = receiver.recv().await {
                run_effect(notifier.as_ref(), effect).await;
            }
            debug!("Notification dispatcher stopped");
        });

        (Self { sender }, handle)
    }

    pub fn dispatch(&self, effects: Vec<Effect>) {
        for effect in effects {
            if self.sender.send(effect).is_err() {
                warn!("Notification dispatcher is gone, dropping effect");
            }
        }
    }
}

async fn run_effect(notifier: &dyn Notifier, effect: Effect) {
    match effect {
        Effect::NotifyGrant {
            account_id,
            delta,
            note,
        } => {
            let text = messages::grant_notification(delta, &note);
            match notifier.notify(account_id, &text).await {
                Ok(()) => info!("Notified {} about {} points", account_id, delta),
                Err(e) => warn!("Failed to notify {} about points: {}", account_id, e),
            }
        }
    }
}

pub type SharedNotificationDispatcher = Arc<NotificationDispatcher>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::models::{Category, NewUser};
    use crate::store::Store;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(u64, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, account_id: u64, text: &str) -> Result<()> {
            self.sent.lock().push((account_id, text.to_string()));
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _account_id: u64, _text: &str) -> Result<()> {
            Err(BotError::Discord {
                message: "Cannot send messages to this user".to_string(),
            })
        }
    }

    async fn store_with_user() -> Store {
        let store = Store::open_in_memory().await.unwrap();
        store
            .create_user(&NewUser {
                account_id: 7,
                nickname: "nik1".to_string(),
                real_name: "Ivan".to_string(),
                phone: None,
                category: Category::Adult,
                referrer: None,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_grant_is_delivered() {
        let store = store_with_user().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let (dispatcher, handle) = NotificationDispatcher::spawn(notifier.clone());

        let receipt = store.grant_points("nik1", 50, "tournament").await.unwrap();
        dispatcher.dispatch(receipt.effects);
        drop(dispatcher);
        handle.await.unwrap();

        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 7);
        assert!(sent[0].1.contains("50"));
        assert!(sent[0].1.contains("tournament"));
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_grant() {
        let store = store_with_user().await;
        let (dispatcher, handle) = NotificationDispatcher::spawn(Arc::new(FailingNotifier));

        let receipt = store.grant_points("nik1", 50, "tournament").await.unwrap();
        dispatcher.dispatch(receipt.effects);
        drop(dispatcher);
        handle.await.unwrap();

        let user = store.get_user(7).await.unwrap().unwrap();
        assert_eq!(user.points, 50);
        assert_eq!(user.participations, 1);
        assert_eq!(store.history("nik1").await.unwrap().len(), 1);
    }
}
