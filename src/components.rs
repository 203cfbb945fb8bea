//! Button payloads. Every clickable component carries one of these as its
//! `custom_id`, so a click can be routed without any server-side lookup.

use std::fmt;

use crate::models::Category;

/// Discord's limit on `custom_id` length
pub const CUSTOM_ID_MAX: usize = 100;

/// Entries of the main menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Register,
    Profile,
    Rating,
    Events,
    Invite,
    Info,
}

impl MenuItem {
    fn as_str(&self) -> &'static str {
        match self {
            MenuItem::Register => "register",
            MenuItem::Profile => "profile",
            MenuItem::Rating => "rating",
            MenuItem::Events => "events",
            MenuItem::Invite => "invite",
            MenuItem::Info => "info",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        [
            MenuItem::Register,
            MenuItem::Profile,
            MenuItem::Rating,
            MenuItem::Events,
            MenuItem::Invite,
            MenuItem::Info,
        ]
        .into_iter()
        .find(|item| item.as_str() == value)
    }
}

/// Decoded button click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    Menu(MenuItem),
    /// "I joined" re-check of the subscription gate
    CheckSubscription,
    RegisterCategory(Category),
    /// Requested leaderboard page; may be out of range
    RatingPage(i64),
    History(String),
    BackToProfile(String),
    UpdateProfile,
    ProfileCategory(Category),
    Cancel,
    Event(String),
    CompleteEvent(String),
    BackToEvents,
}

impl ComponentAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        let (kind, arg) = match custom_id.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (custom_id, None),
        };

        let action = match (kind, arg) {
            ("menu", Some(item)) => ComponentAction::Menu(MenuItem::parse(item)?),
            ("sub", Some("check")) => ComponentAction::CheckSubscription,
            ("reg_cat", Some(code)) => ComponentAction::RegisterCategory(Category::from_code(code)?),
            ("rating_page", Some(page)) => ComponentAction::RatingPage(page.parse().ok()?),
            ("history", Some(nickname)) if !nickname.is_empty() => {
                ComponentAction::History(nickname.to_string())
            }
            ("back_to_profile", Some(nickname)) if !nickname.is_empty() => {
                ComponentAction::BackToProfile(nickname.to_string())
            }
            ("update_profile", None) => ComponentAction::UpdateProfile,
            ("update_category", Some(category)) => {
                ComponentAction::ProfileCategory(Category::parse(category)?)
            }
            ("cancel", None) => ComponentAction::Cancel,
            ("event", Some(name)) if !name.is_empty() => ComponentAction::Event(name.to_string()),
            ("complete_event", Some(name)) if !name.is_empty() => {
                ComponentAction::CompleteEvent(name.to_string())
            }
            ("back_to_events", None) => ComponentAction::BackToEvents,
            _ => return None,
        };
        Some(action)
    }

    pub fn custom_id(&self) -> String {
        self.to_string()
    }

    /// Whether the id is short enough for Discord to accept
    pub fn fits(&self) -> bool {
        self.custom_id().chars().count() <= CUSTOM_ID_MAX
    }
}

impl fmt::Display for ComponentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentAction::Menu(item) => write!(f, "menu:{}", item.as_str()),
            ComponentAction::CheckSubscription => write!(f, "sub:check"),
            ComponentAction::RegisterCategory(category) => write!(f, "reg_cat:{}", category.code()),
            ComponentAction::RatingPage(page) => write!(f, "rating_page:{}", page),
            ComponentAction::History(nickname) => write!(f, "history:{}", nickname),
            ComponentAction::BackToProfile(nickname) => write!(f, "back_to_profile:{}", nickname),
            ComponentAction::UpdateProfile => write!(f, "update_profile"),
            ComponentAction::ProfileCategory(category) => {
                write!(f, "update_category:{}", category.as_str())
            }
            ComponentAction::Cancel => write!(f, "cancel"),
            ComponentAction::Event(name) => write!(f, "event:{}", name),
            ComponentAction::CompleteEvent(name) => write!(f, "complete_event:{}", name),
            ComponentAction::BackToEvents => write!(f, "back_to_events"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_ids() {
        assert_eq!(
            ComponentAction::parse("menu:rating"),
            Some(ComponentAction::Menu(MenuItem::Rating))
        );
        assert_eq!(
            ComponentAction::parse("reg_cat:2"),
            Some(ComponentAction::RegisterCategory(Category::Teen))
        );
        assert_eq!(
            ComponentAction::parse("rating_page:-1"),
            Some(ComponentAction::RatingPage(-1))
        );
        assert_eq!(
            ComponentAction::parse("update_category:Adult"),
            Some(ComponentAction::ProfileCategory(Category::Adult))
        );
        assert_eq!(ComponentAction::parse("cancel"), Some(ComponentAction::Cancel));
    }

    #[test]
    fn test_names_may_contain_separator() {
        let action = ComponentAction::Event("Cup: finals".to_string());
        assert_eq!(action.custom_id(), "event:Cup: finals");
        assert_eq!(ComponentAction::parse(&action.custom_id()), Some(action));
    }

    #[test]
    fn test_custom_id_length_limit() {
        assert!(ComponentAction::CompleteEvent("x".repeat(85)).fits());
        assert!(!ComponentAction::CompleteEvent("x".repeat(86)).fits());
        assert!(ComponentAction::CompleteEvent("я".repeat(85)).fits());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for id in [
            "",
            "menu",
            "menu:shop",
            "reg_cat:9",
            "rating_page:x",
            "history:",
            "cancel:now",
            "config_global",
        ] {
            assert_eq!(ComponentAction::parse(id), None, "{}", id);
        }
    }
}
