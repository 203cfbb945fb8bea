use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::conversation::{
    validate_nickname, Completed, ConversationState, Input, Prompt, Rejection, Transition,
};
use crate::error::{BotError, Result};
use crate::managers::{SharedEventCatalog, SharedInviteManager};
use crate::models::{Category, Event, RegistrationDraft, User};
use crate::store::Store;

/// What the caller should show after an input was handled
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No flow was active; the input is not part of a conversation
    Idle,
    Prompt(Prompt),
    Rejected { reason: Rejection, prompt: Prompt },
    /// Free-text registration finished; the draft waits for a category button
    AwaitingCategory { nickname: String },
    ProfileUpdated(User),
    EventCreated(Event),
}

/// Owns the per-account conversation state and applies finished flows
pub struct ConversationManager {
    store: Store,
    invites: SharedInviteManager,
    events: SharedEventCatalog,
    states: DashMap<u64, ConversationState>,
}

impl ConversationManager {
    pub fn new(store: Store, invites: SharedInviteManager, events: SharedEventCatalog) -> Self {
        Self {
            store,
            invites,
            events,
            states: DashMap::new(),
        }
    }

    /// Start `state` for `account_id`, discarding any other flow and draft
    pub async fn begin(&self, account_id: u64, state: ConversationState) -> Result<Prompt> {
        let prompt = state.prompt();
        self.states.insert(account_id, state);
        if self.store.delete_draft(account_id).await? {
            debug!("Discarded registration draft of {}", account_id);
        }
        Ok(prompt)
    }

    pub fn current(&self, account_id: u64) -> Option<ConversationState> {
        self.states.get(&account_id).map(|s| s.clone())
    }

    pub fn is_active(&self, account_id: u64) -> bool {
        self.states.contains_key(&account_id)
    }

    /// Drop the in-memory flow only
    pub fn interrupt(&self, account_id: u64) -> bool {
        let had_state = self.states.remove(&account_id).is_some();
        if had_state {
            debug!("Interrupted conversation of {}", account_id);
        }
        had_state
    }

    /// Drop the flow and any stored draft. Returns whether anything was discarded.
    pub async fn cancel(&self, account_id: u64) -> Result<bool> {
        let had_state = self.interrupt(account_id);
        let had_draft = self.store.delete_draft(account_id).await?;
        Ok(had_state || had_draft)
    }

    /// Feed one input to the active flow of `account_id`
    pub async fn handle_input(&self, account_id: u64, input: Input<'_>) -> Result<Outcome> {
        let state = match self.current(account_id) {
            Some(state) => state,
            None => return Ok(Outcome::Idle),
        };

        if let Input::Text(text) = input {
            if state.awaits_nickname()
                && validate_nickname(text).is_ok()
                && self.store.nickname_taken(text).await?
            {
                return Ok(Outcome::Rejected {
                    reason: Rejection::NicknameTaken,
                    prompt: Prompt::Nickname,
                });
            }
        }

        match state.advance(input) {
            Transition::Next { state, prompt } => {
                self.states.insert(account_id, state);
                Ok(Outcome::Prompt(prompt))
            }
            Transition::Reject { reason, prompt } => {
                debug!("Rejected input from {}: {:?}", account_id, reason);
                Ok(Outcome::Rejected { reason, prompt })
            }
            Transition::Complete(completed) => {
                self.states.remove(&account_id);
                self.apply(account_id, completed).await
            }
        }
    }

    async fn apply(&self, account_id: u64, completed: Completed) -> Result<Outcome> {
        match completed {
            Completed::Registration {
                nickname,
                real_name,
                phone,
            } => {
                let referrer = self.invites.referrer_for(account_id).await;
                self.store
                    .save_draft(&RegistrationDraft {
                        account_id,
                        nickname: nickname.clone(),
                        real_name,
                        phone,
                        referrer,
                        created_at: Utc::now(),
                    })
                    .await?;
                Ok(Outcome::AwaitingCategory { nickname })
            }
            Completed::Profile(update) => {
                let user = self.store.update_profile(account_id, &update).await?;
                Ok(Outcome::ProfileUpdated(user))
            }
            Completed::Event { name, content } => {
                let event = self.events.create(&name, &content).await?;
                Ok(Outcome::EventCreated(event))
            }
        }
    }

    /// Create the user from their draft once a category was picked.
    ///
    /// A conflict discards the draft: a taken nickname means starting over,
    /// an existing account means there is nothing left to register.
    pub async fn finalize_registration(&self, account_id: u64, category: Category) -> Result<User> {
        match self.store.finalize_registration(account_id, category).await {
            Ok(user) => {
                info!("{} finished registration as {}", account_id, user.nickname);
                self.invites.tracker().forget(account_id);
                Ok(user)
            }
            Err(e @ BotError::AccountTaken { .. }) => {
                self.store.delete_draft(account_id).await?;
                self.invites.tracker().forget(account_id);
                Err(e)
            }
            Err(e @ BotError::NicknameTaken { .. }) => {
                self.store.delete_draft(account_id).await?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

pub type SharedConversationManager = Arc<ConversationManager>;

pub fn create_shared_conversation_manager(
    store: Store,
    invites: SharedInviteManager,
    events: SharedEventCatalog,
) -> SharedConversationManager {
    Arc::new(ConversationManager::new(store, invites, events))
}
