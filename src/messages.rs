// src/messages.rs

use crate::conversation::{Prompt, Rejection};
use crate::managers::leaderboard::{LeaderboardPage, RankedEntry};
use crate::models::{Event, PointGrant, User};

/// Room left under Discord's 2000 character limit for anything appended later
pub const MESSAGE_MAX_CHARS: usize = 1900;

/// `header` followed by as many of `lines` as fit, then a count of the rest
fn fit_lines(header: &str, lines: &[String], max: usize) -> String {
    let line_chars = |line: &String| 1 + line.chars().count();
    let more = |n: usize| format!("\n…and {} more", n);

    let total = header.chars().count() + lines.iter().map(line_chars).sum::<usize>();
    if total <= max {
        return std::iter::once(header.to_string())
            .chain(lines.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n");
    }

    let mut text = header.to_string();
    let mut used = text.chars().count();
    let mut shown = 0;
    for line in lines {
        let rest = more(lines.len() - shown - 1).chars().count();
        if used + line_chars(line) + rest > max {
            break;
        }
        text.push('\n');
        text.push_str(line);
        used += line_chars(line);
        shown += 1;
    }
    text.push_str(&more(lines.len() - shown));
    text
}

/// At most `max` characters of `text`
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

pub fn welcome_message(name: &str) -> String {
    format!(
        "👋 **Welcome, {}!**\n\n\
        This bot keeps the community rating: register once, collect points \
        for taking part in events and see where you stand.\n\n\
        Press **Register** to get started.",
        name
    )
}

pub fn menu_message(nickname: &str) -> String {
    format!(
        "🏠 **Main menu**\n\nYou are registered as **{}**. Pick a section below.",
        nickname
    )
}

pub fn info_message() -> String {
    "ℹ️ **About the rating**\n\n\
    • Admins award points for every event you take part in.\n\
    • Each award is recorded with a note; open your profile to see the history.\n\
    • The rating lists everyone by points. Disabled participants are shown ~~struck through~~.\n\
    • Share your invite link: everyone who joins through it and registers counts as your referral.\n\n\
    Commands: `!start`, `!profile [nickname]`, `!rating`, `!my_rank`, `!history <nickname>`, \
    `!events`, `!invite`, `!cancel`."
        .to_string()
}

pub fn not_subscribed_message(subscribe_url: Option<&str>) -> String {
    match subscribe_url {
        Some(url) => format!(
            "🔒 You need to join our community first: {}\n\nPress **I joined** once you are in.",
            url
        ),
        None => "🔒 You need to join our community server first.\n\nPress **I joined** once you are in."
            .to_string(),
    }
}

pub fn still_not_subscribed_message() -> String {
    "You have not joined the community yet.".to_string()
}

pub fn prompt_text(prompt: Prompt) -> String {
    match prompt {
        Prompt::Nickname => "✏️ Choose a nickname. Letters, digits and `_-@.#$%&*+=` are allowed, no spaces.",
        Prompt::RealName => "✏️ What is your real name?",
        Prompt::Phone => "📞 Your phone number (send `-` to skip):",
        Prompt::ProfilePhone => "📞 New phone number (send `-` to clear it):",
        Prompt::ProfileRealName => "✏️ New real name:",
        Prompt::ProfileCategory => "Choose your category:",
        Prompt::EventContent => "📝 Send the event description:",
    }
    .to_string()
}

pub fn rejection_text(reason: &Rejection) -> String {
    match reason {
        Rejection::InvalidNickname(e) => format!("❌ {}.", e),
        Rejection::NicknameTaken => "❌ This nickname is already taken, try another one.".to_string(),
        Rejection::EmptyAnswer => "❌ The answer cannot be empty.".to_string(),
        Rejection::ExpectedCategory => "Please pick the category with one of the buttons.".to_string(),
        Rejection::UnexpectedCategory => "Please answer with text.".to_string(),
    }
}

pub fn choose_category_message(nickname: &str) -> String {
    format!(
        "Almost done, **{}**! Choose your category to finish the registration:",
        nickname
    )
}

pub fn registration_complete_message(nickname: &str) -> String {
    format!(
        "✅ **Registration complete!**\n\nWelcome, **{}**. Open your profile from the menu.",
        nickname
    )
}

pub fn already_registered_message(nickname: &str) -> String {
    format!("You are already registered as **{}**.", nickname)
}

pub fn not_registered_message() -> String {
    "You are not registered yet. Use `!start` to register.".to_string()
}

pub fn draft_missing_message() -> String {
    "This registration has expired. Use `!register` to start again.".to_string()
}

pub fn nickname_conflict_message(nickname: &str) -> String {
    format!(
        "❌ Someone registered **{}** a moment ago. Use `!register` to pick another nickname.",
        nickname
    )
}

pub fn cancelled_message() -> String {
    "Cancelled.".to_string()
}

pub fn profile_updated_message() -> String {
    "✅ Profile updated.".to_string()
}

pub fn unknown_input_message() -> String {
    "I did not understand that. Use `!start` to open the menu.".to_string()
}

pub fn user_not_found_message() -> String {
    "User not found.".to_string()
}

pub fn event_not_found_message() -> String {
    "Event not found.".to_string()
}

pub fn error_message() -> String {
    "⚠️ Something went wrong. Please try again later.".to_string()
}

/// Nickname as shown in listings; disabled users are struck through
pub fn display_nickname(user: &User) -> String {
    if user.active {
        user.nickname.clone()
    } else {
        format!("~~{}~~", user.nickname)
    }
}

pub fn own_profile_text(user: &User, referrals: i64) -> String {
    format!(
        "👤 **Your profile**\n\
        Nickname: {}\n\
        Name: {}\n\
        Phone: {}\n\
        Category: {}\n\
        Points: {}\n\
        Participations: {}\n\
        Invited: {}",
        display_nickname(user),
        user.real_name,
        user.phone.as_deref().unwrap_or("not set"),
        user.category,
        user.points,
        user.participations,
        referrals
    )
}

/// Someone else's profile; `admin_extra` carries the account handle for admins
pub fn other_profile_text(user: &User, admin_extra: Option<&str>) -> String {
    let mut text = format!(
        "👤 **Profile of {}**\n\
        Name: {}\n\
        Category: {}\n\
        Points: {}\n\
        Participations: {}",
        display_nickname(user),
        user.real_name,
        user.category,
        user.points,
        user.participations
    );

    if let Some(username) = admin_extra {
        text.push_str(&format!(
            "\n\nDiscord: {}\nID: {}\nRegistered: {}",
            username,
            user.account_id,
            user.registered_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    text
}

pub fn history_text(nickname: &str, grants: &[PointGrant]) -> String {
    if grants.is_empty() {
        return format!("📜 **{}** has no point history yet.", nickname);
    }

    let lines: Vec<String> = grants
        .iter()
        .map(|g| {
            format!(
                "{} • {:+} • {}",
                g.granted_at.format("%Y-%m-%d"),
                g.delta,
                g.note
            )
        })
        .collect();

    fit_lines(
        &format!("📜 **History of {}**", nickname),
        &lines,
        MESSAGE_MAX_CHARS,
    )
}

fn ranking_lines(entries: &[RankedEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            format!(
                "{}. {} · {} pts",
                e.position,
                display_nickname(&e.user),
                e.user.points
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn top_text(entries: &[RankedEntry]) -> String {
    if entries.is_empty() {
        return "🏆 The rating is empty so far.".to_string();
    }
    format!("🏆 **Top {}**\n{}", entries.len(), ranking_lines(entries))
}

pub fn rating_page_text(page: &LeaderboardPage) -> String {
    if page.entries.is_empty() {
        return "🏆 The rating is empty so far.".to_string();
    }
    format!(
        "🏆 **Rating** (page {}/{})\n{}",
        page.index + 1,
        page.page_count,
        ranking_lines(&page.entries)
    )
}

pub fn rank_text(user: &User, rank: usize) -> String {
    format!(
        "📊 **{}**, you are **#{}** with {} points.",
        user.nickname, rank, user.points
    )
}

pub fn events_text(events: &[Event]) -> String {
    if events.is_empty() {
        return "📅 No events announced yet.".to_string();
    }
    // Newest first, like the buttons
    let lines: Vec<String> = events
        .iter()
        .rev()
        .map(|e| format!("{} {}", event_status(e), e.name))
        .collect();
    fit_lines("📅 **Events**", &lines, MESSAGE_MAX_CHARS)
}

pub fn event_status(event: &Event) -> &'static str {
    if event.completed {
        "✅"
    } else {
        "🔜"
    }
}

pub fn event_text(event: &Event) -> String {
    let header = format!(
        "{} **{}**\n{}\n\n",
        event_status(event),
        event.name,
        event.created_at.format("%Y-%m-%d"),
    );
    let room = MESSAGE_MAX_CHARS.saturating_sub(header.chars().count());
    format!("{}{}", header, clip(&event.content, room))
}

pub fn event_created_message(name: &str) -> String {
    format!("✅ Event **{}** created.", name)
}

pub fn event_exists_message(name: &str) -> String {
    format!("❌ An event named **{}** already exists.", name)
}

pub fn invite_text(url: &str, referrals: i64) -> String {
    format!(
        "🔗 **Your invite link**\n{}\n\nPeople who registered through it: **{}**",
        url, referrals
    )
}

pub fn invite_unavailable_message() -> String {
    "Invite links are not available right now.".to_string()
}

pub fn grant_notification(delta: i64, note: &str) -> String {
    format!("🎉 You received **{:+}** points: {}", delta, note)
}

pub fn granted_message(user: &User, delta: i64) -> String {
    format!(
        "✅ {:+} points to **{}** (now {}).",
        delta, user.nickname, user.points
    )
}

pub fn photo_prompt_message(nickname: &str) -> String {
    format!(
        "📷 Send a vertical .png, .jpg or .jpeg image for **{}**.",
        nickname
    )
}

pub fn photo_updated_message(nickname: &str) -> String {
    format!("✅ Photo of **{}** updated.", nickname)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::Utc;

    fn user(active: bool) -> User {
        User {
            account_id: 42,
            nickname: "nik1".to_string(),
            real_name: "Ivan I".to_string(),
            phone: None,
            category: Category::Junior,
            active,
            points: 10,
            participations: 1,
            photo_path: None,
            referrer: None,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_disabled_users_are_struck_through() {
        assert_eq!(display_nickname(&user(true)), "nik1");
        assert_eq!(display_nickname(&user(false)), "~~nik1~~");

        let page = LeaderboardPage {
            index: 0,
            page_count: 1,
            entries: vec![RankedEntry {
                position: 1,
                user: user(false),
            }],
        };
        assert!(rating_page_text(&page).contains("1. ~~nik1~~ · 10 pts"));
    }

    #[test]
    fn test_profile_texts() {
        let own = own_profile_text(&user(true), 3);
        assert!(own.contains("Phone: not set"));
        assert!(own.contains("Invited: 3"));

        let public = other_profile_text(&user(true), None);
        assert!(!public.contains("ID: 42"));
        let admin = other_profile_text(&user(true), Some("ivan#0"));
        assert!(admin.contains("ID: 42"));
        assert!(admin.contains("Discord: ivan#0"));
    }

    #[test]
    fn test_long_history_fits_one_message() {
        let grants: Vec<PointGrant> = (0..200)
            .map(|i| PointGrant {
                id: i,
                nickname: "nik1".to_string(),
                delta: 10,
                note: format!("weekly tournament #{}", 200 - i),
                granted_at: Utc::now(),
            })
            .collect();

        let text = history_text("nik1", &grants);
        assert!(text.chars().count() <= MESSAGE_MAX_CHARS);
        assert!(text.contains("weekly tournament #200"));
        assert!(!text.contains("weekly tournament #1\n"));
        assert!(text.ends_with("more"));

        let short = history_text("nik1", &grants[..3]);
        assert!(!short.contains("more"));
        assert_eq!(short.lines().count(), 4);
    }

    #[test]
    fn test_long_event_texts_fit_one_message() {
        let events: Vec<Event> = (0..100)
            .map(|i| Event {
                name: format!("Community tournament number {}", i),
                content: "x".repeat(5000),
                created_at: Utc::now(),
                completed: false,
            })
            .collect();

        let list = events_text(&events);
        assert!(list.chars().count() <= MESSAGE_MAX_CHARS);
        assert!(list.contains("Community tournament number 99"));
        assert!(list.contains("more"));

        let detail = event_text(&events[0]);
        assert!(detail.chars().count() <= MESSAGE_MAX_CHARS);
        assert!(detail.ends_with('…'));
    }

    #[test]
    fn test_fit_lines_exact_boundary() {
        let lines = vec!["aa".to_string(), "bb".to_string()];
        assert_eq!(fit_lines("h", &lines, 7), "h\naa\nbb");
        assert_eq!(fit_lines("h", &lines, 6), "h\n…and 2 more");
    }

    #[test]
    fn test_grant_notification_sign() {
        assert!(grant_notification(10, "welcome").contains("+10"));
        assert!(grant_notification(-5, "penalty").contains("-5"));
    }
}
