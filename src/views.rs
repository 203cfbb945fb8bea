//! Transport-neutral description of a bot reply.
//!
//! Handlers build a [`View`]; the same view can be sent as a DM, as a
//! command reply or as an interaction response.

use poise::serenity_prelude as serenity;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::components::ComponentAction;

const BUTTONS_PER_ROW: usize = 5;
const MAX_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum ButtonTarget {
    Action(ComponentAction),
    Link(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
    pub target: ButtonTarget,
    pub style: serenity::ButtonStyle,
}

impl Button {
    pub fn action(label: impl Into<String>, action: ComponentAction) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Action(action),
            style: serenity::ButtonStyle::Secondary,
        }
    }

    pub fn primary(label: impl Into<String>, action: ComponentAction) -> Self {
        Self {
            style: serenity::ButtonStyle::Primary,
            ..Self::action(label, action)
        }
    }

    pub fn danger(label: impl Into<String>, action: ComponentAction) -> Self {
        Self {
            style: serenity::ButtonStyle::Danger,
            ..Self::action(label, action)
        }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Link(url.into()),
            style: serenity::ButtonStyle::Secondary,
        }
    }

    fn build(&self) -> serenity::CreateButton {
        match &self.target {
            ButtonTarget::Action(action) => serenity::CreateButton::new(action.custom_id())
                .label(&self.label)
                .style(self.style),
            ButtonTarget::Link(url) => serenity::CreateButton::new_link(url).label(&self.label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewAttachment {
    /// File on disk; skipped when it no longer exists
    Path(PathBuf),
    Bytes { data: Vec<u8>, filename: String },
}

/// A reply: text, buttons and at most one file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct View {
    pub content: String,
    pub rows: Vec<Vec<Button>>,
    pub attachment: Option<ViewAttachment>,
}

impl View {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    /// Lay `buttons` out in as many rows as needed
    pub fn buttons(mut self, buttons: Vec<Button>) -> Self {
        let mut buttons = buttons.into_iter().peekable();
        while buttons.peek().is_some() {
            let row: Vec<Button> = buttons.by_ref().take(BUTTONS_PER_ROW).collect();
            self.rows.push(row);
        }
        self
    }

    pub fn attachment(mut self, attachment: ViewAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn actions(&self) -> impl Iterator<Item = &ComponentAction> {
        self.rows.iter().flatten().filter_map(|b| match &b.target {
            ButtonTarget::Action(action) => Some(action),
            ButtonTarget::Link(_) => None,
        })
    }

    /// Ids Discord would refuse: too long, or repeated within the message
    fn invalid_actions(&self) -> Vec<&ComponentAction> {
        let mut seen = HashSet::new();
        self.actions()
            .filter(|action| !action.fits() || !seen.insert(action.custom_id()))
            .collect()
    }

    fn components(&self) -> Vec<serenity::CreateActionRow> {
        if self.rows.len() > MAX_ROWS {
            warn!("View has {} button rows, dropping the extra ones", self.rows.len());
        }
        for action in self.invalid_actions() {
            warn!("Button id '{}' will be rejected by Discord", action);
        }
        self.rows
            .iter()
            .take(MAX_ROWS)
            .map(|row| serenity::CreateActionRow::Buttons(row.iter().map(Button::build).collect()))
            .collect()
    }

    async fn load_attachment(&self) -> Option<serenity::CreateAttachment> {
        match self.attachment.as_ref()? {
            ViewAttachment::Path(path) => match serenity::CreateAttachment::path(path).await {
                Ok(file) => Some(file),
                Err(e) => {
                    debug!("Skipping attachment {}: {}", path.display(), e);
                    None
                }
            },
            ViewAttachment::Bytes { data, filename } => Some(serenity::CreateAttachment::bytes(
                data.clone(),
                filename.clone(),
            )),
        }
    }

    pub async fn into_message(self) -> serenity::CreateMessage {
        let mut message = serenity::CreateMessage::new()
            .content(&self.content)
            .components(self.components());
        if let Some(file) = self.load_attachment().await {
            message = message.add_file(file);
        }
        message
    }

    pub async fn into_reply(self) -> poise::CreateReply {
        let mut reply = poise::CreateReply::default()
            .content(&self.content)
            .components(self.components());
        if let Some(file) = self.load_attachment().await {
            reply = reply.attachment(file);
        }
        reply
    }

    /// Response to a button click. Views without files replace the clicked message.
    pub async fn into_response(self) -> serenity::CreateInteractionResponse {
        let mut message = serenity::CreateInteractionResponseMessage::new()
            .content(&self.content)
            .components(self.components());

        match self.load_attachment().await {
            Some(file) => {
                message = message.add_file(file);
                serenity::CreateInteractionResponse::Message(message)
            }
            None => serenity::CreateInteractionResponse::UpdateMessage(message),
        }
    }
}
