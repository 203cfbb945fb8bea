// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Age bracket a participant competes in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Junior,
    Teen,
    Adult,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Junior, Category::Teen, Category::Adult];

    /// Stored form (also used in button payloads)
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Junior => "Junior",
            Category::Teen => "Teen",
            Category::Adult => "Adult",
        }
    }

    /// Short numeric code used by the registration buttons
    pub fn code(&self) -> &'static str {
        match self {
            Category::Junior => "1",
            Category::Teen => "2",
            Category::Adult => "3",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(value) || c.code() == value)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered participant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub account_id: u64,
    pub nickname: String,
    pub real_name: String,
    pub phone: Option<String>,
    pub category: Category,
    pub active: bool,
    pub points: i64,
    pub participations: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<u64>,
    pub registered_at: DateTime<Utc>,
}

/// Fields needed to create a user row
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub account_id: u64,
    pub nickname: String,
    pub real_name: String,
    pub phone: Option<String>,
    pub category: Category,
    pub referrer: Option<u64>,
}

/// Profile fields a user may change after registration
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub real_name: String,
    pub category: Category,
}

/// One entry of the point audit trail
#[derive(Debug, Clone, PartialEq)]
pub struct PointGrant {
    pub id: i64,
    pub nickname: String,
    pub delta: i64,
    pub note: String,
    pub granted_at: DateTime<Utc>,
}

/// A community event announced by admins
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
}

/// The single invite handle owned by a user
#[derive(Debug, Clone, PartialEq)]
pub struct InviteLink {
    pub owner_id: u64,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// Durable staging row between the free-text registration steps and the category button
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationDraft {
    pub account_id: u64,
    pub nickname: String,
    pub real_name: String,
    pub phone: Option<String>,
    pub referrer: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl RegistrationDraft {
    pub fn into_new_user(self, category: Category) -> NewUser {
        NewUser {
            account_id: self.account_id,
            nickname: self.nickname,
            real_name: self.real_name,
            phone: self.phone,
            category,
            referrer: self.referrer,
        }
    }
}

/// Side effect to run after a ledger mutation has committed
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    NotifyGrant {
        account_id: u64,
        delta: i64,
        note: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_codes() {
        for category in Category::ALL {
            assert_eq!(Category::from_code(category.code()), Some(category));
        }
        assert_eq!(Category::from_code("4"), None);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("teen"), Some(Category::Teen));
        assert_eq!(Category::parse(" Adult "), Some(Category::Adult));
        assert_eq!(Category::parse("1"), Some(Category::Junior));
        assert_eq!(Category::parse("senior"), None);
    }
}
