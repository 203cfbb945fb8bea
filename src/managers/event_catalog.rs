use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{BotError, Result};
use crate::models::Event;
use crate::store::Store;

/// Read-through cache of the events table.
///
/// The store is authoritative. Every write goes to the store while the
/// cache lock is held and then drops the cached list, so a reader never
/// repopulates from a state older than the last write.
pub struct EventCatalog {
    store: Store,
    cache: RwLock<Option<Arc<Vec<Event>>>>,
}

impl EventCatalog {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            cache: RwLock::new(None),
        }
    }

    /// All events, oldest first
    pub async fn list(&self) -> Result<Arc<Vec<Event>>> {
        if let Some(events) = self.cache.read().await.as_ref() {
            return Ok(events.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(events) = cache.as_ref() {
            return Ok(events.clone());
        }

        let events = Arc::new(self.store.list_events().await?);
        debug!("Loaded {} events into the catalog", events.len());
        *cache = Some(events.clone());
        Ok(events)
    }

    pub async fn get(&self, name: &str) -> Result<Event> {
        self.list()
            .await?
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| BotError::EventNotFound {
                name: name.to_string(),
            })
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list().await?.iter().any(|e| e.name == name))
    }

    pub async fn create(&self, name: &str, content: &str) -> Result<Event> {
        let mut cache = self.cache.write().await;
        let event = self.store.insert_event(name, content).await?;
        *cache = None;
        Ok(event)
    }

    /// Mark `name` completed and return it as stored
    pub async fn complete(&self, name: &str) -> Result<Event> {
        let mut cache = self.cache.write().await;
        self.store.complete_event(name).await?;
        *cache = None;
        self.store
            .get_event(name)
            .await?
            .ok_or_else(|| BotError::EventNotFound {
                name: name.to_string(),
            })
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        self.store.delete_event(name).await?;
        *cache = None;
        Ok(())
    }
}

pub type SharedEventCatalog = Arc<EventCatalog>;

pub fn create_shared_event_catalog(store: Store) -> SharedEventCatalog {
    Arc::new(EventCatalog::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_invalidate_cache() {
        let store = Store::open_in_memory().await.unwrap();
        let catalog = EventCatalog::new(store);

        assert!(catalog.list().await.unwrap().is_empty());

        catalog.create("Cup", "Summer cup").await.unwrap();
        let events = catalog.list().await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].completed);

        assert!(catalog.complete("Cup").await.unwrap().completed);
        assert!(catalog.get("Cup").await.unwrap().completed);

        catalog.delete("Cup").await.unwrap();
        assert!(!catalog.exists("Cup").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_events() {
        let store = Store::open_in_memory().await.unwrap();
        let catalog = EventCatalog::new(store);

        catalog.create("Cup", "one").await.unwrap();
        assert!(matches!(
            catalog.create("Cup", "two").await,
            Err(BotError::EventExists { .. })
        ));
        assert_eq!(catalog.get("Cup").await.unwrap().content, "one");

        assert!(matches!(
            catalog.get("Nope").await,
            Err(BotError::EventNotFound { .. })
        ));
        assert!(matches!(
            catalog.delete("Nope").await,
            Err(BotError::EventNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cache_sees_writes_from_same_store() {
        let store = Store::open_in_memory().await.unwrap();
        let catalog = EventCatalog::new(store.clone());
        catalog.list().await.unwrap();

        catalog.create("A", "a").await.unwrap();
        catalog.create("B", "b").await.unwrap();

        let names: Vec<String> = catalog
            .list()
            .await
            .unwrap()
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(store.list_events().await.unwrap().len(), 2);
    }
}
