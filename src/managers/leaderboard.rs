use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::User;
use crate::store::Store;

/// Entries shown by the top list
pub const TOP_SIZE: usize = 10;

/// Entries per page of the full listing
pub const PAGE_SIZE: usize = 20;

/// A user with their 1-based position in the ordering
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub position: usize,
    pub user: User,
}

/// One page of the full listing
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardPage {
    /// Zero-based, already clamped
    pub index: usize,
    pub page_count: usize,
    pub entries: Vec<RankedEntry>,
}

impl LeaderboardPage {
    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.page_count
    }
}

/// Direction of a page button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    Prev,
    Next,
}

/// Number of pages for `total` users; an empty board still has one page
pub fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE).max(1)
}

pub fn clamp_page(index: usize, pages: usize) -> usize {
    index.min(pages.saturating_sub(1))
}

/// Clamp a signed page request (button payloads may carry -1)
pub fn clamp_requested(requested: i64, pages: usize) -> usize {
    clamp_page(usize::try_from(requested).unwrap_or(0), pages)
}

/// Page reached from `current`; stepping past either end stays put
pub fn navigate(current: usize, nav: PageNav, pages: usize) -> usize {
    let current = clamp_page(current, pages);
    match nav {
        PageNav::Prev => current.saturating_sub(1),
        PageNav::Next => clamp_page(current + 1, pages),
    }
}

/// Read-only views over the ledger ordering
pub struct Leaderboard {
    store: Store,
}

impl Leaderboard {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The first [`TOP_SIZE`] users
    pub async fn top(&self) -> Result<Vec<RankedEntry>> {
        let users = self.store.ranked_users_page(0, TOP_SIZE).await?;
        Ok(number_from(1, users))
    }

    /// Page `index` of the full listing, clamped to the existing pages
    pub async fn page(&self, index: usize) -> Result<LeaderboardPage> {
        let total = self.store.count_users().await?;
        let pages = page_count(total);
        let index = clamp_page(index, pages);
        let offset = index * PAGE_SIZE;

        let users = self.store.ranked_users_page(offset, PAGE_SIZE).await?;
        debug!(
            "Leaderboard page {}/{} with {} entries",
            index + 1,
            pages,
            users.len()
        );

        Ok(LeaderboardPage {
            index,
            page_count: pages,
            entries: number_from(offset + 1, users),
        })
    }

    /// Personal rank, `None` for unregistered accounts
    pub async fn rank(&self, account_id: u64) -> Result<Option<usize>> {
        self.store.rank_of(account_id).await
    }
}

fn number_from(first: usize, users: Vec<User>) -> Vec<RankedEntry> {
    users
        .into_iter()
        .enumerate()
        .map(|(i, user)| RankedEntry {
            position: first + i,
            user,
        })
        .collect()
}

pub type SharedLeaderboard = Arc<Leaderboard>;

pub fn create_shared_leaderboard(store: Store) -> SharedLeaderboard {
    Arc::new(Leaderboard::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, NewUser};

    async fn seeded(points: &[i64]) -> Store {
        let store = Store::open_in_memory().await.unwrap();
        for (i, p) in points.iter().enumerate() {
            let nickname = format!("user{}", i);
            store
                .create_user(&NewUser {
                    account_id: i as u64 + 1,
                    nickname: nickname.clone(),
                    real_name: "Name".to_string(),
                    phone: None,
                    category: Category::Teen,
                    referrer: None,
                })
                .await
                .unwrap();
            if *p != 0 {
                store.grant_points(&nickname, *p, "seed").await.unwrap();
            }
        }
        store
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0), 1);
        assert_eq!(page_count(1), 1);
        assert_eq!(page_count(20), 1);
        assert_eq!(page_count(21), 2);
        assert_eq!(page_count(45), 3);
    }

    #[test]
    fn test_navigation_is_clamped() {
        assert_eq!(navigate(0, PageNav::Prev, 3), 0);
        assert_eq!(navigate(0, PageNav::Next, 3), 1);
        assert_eq!(navigate(2, PageNav::Next, 3), 2);
        assert_eq!(navigate(9, PageNav::Prev, 3), 1);
        assert_eq!(navigate(0, PageNav::Next, 1), 0);
        assert_eq!(clamp_page(5, 2), 1);
        assert_eq!(clamp_requested(-1, 3), 0);
        assert_eq!(clamp_requested(7, 3), 2);
    }

    #[tokio::test]
    async fn test_top_and_pages() {
        let points: Vec<i64> = (0..45).map(|i| i * 2).collect();
        let store = seeded(&points).await;
        let board = Leaderboard::new(store);

        let top = board.top().await.unwrap();
        assert_eq!(top.len(), TOP_SIZE);
        assert_eq!(top[0].position, 1);
        assert_eq!(top[0].user.points, 88);

        let last = board.page(2).await.unwrap();
        assert_eq!(last.index, 2);
        assert_eq!(last.page_count, 3);
        assert_eq!(last.entries.len(), 5);
        assert_eq!(last.entries[0].position, 41);
        assert!(last.has_prev());
        assert!(!last.has_next());

        let beyond = board.page(99).await.unwrap();
        assert_eq!(beyond.index, 2);
    }

    #[tokio::test]
    async fn test_empty_board_has_one_page() {
        let store = Store::open_in_memory().await.unwrap();
        let board = Leaderboard::new(store);

        let page = board.page(0).await.unwrap();
        assert_eq!(page.page_count, 1);
        assert!(page.entries.is_empty());
        assert!(!page.has_prev() && !page.has_next());
        assert_eq!(board.rank(7).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rank_is_monotonic_in_points() {
        let store = seeded(&[30, 10, 20, 10, 0]).await;
        let board = Leaderboard::new(store.clone());

        let mut by_points: Vec<(i64, usize)> = Vec::new();
        for user in store.ranked_users().await.unwrap() {
            let rank = board.rank(user.account_id).await.unwrap().unwrap();
            by_points.push((user.points, rank));
        }

        for (p1, r1) in &by_points {
            for (p2, r2) in &by_points {
                if p1 > p2 {
                    assert!(r1 < r2, "{} pts rank {} vs {} pts rank {}", p1, r1, p2, r2);
                }
                if p1 == p2 {
                    assert_eq!(r1, r2);
                }
            }
        }
        // Tied users share a rank
        assert_eq!(board.rank(2).await.unwrap(), Some(3));
        assert_eq!(board.rank(4).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_disabled_users_stay_ranked() {
        let store = seeded(&[5, 3]).await;
        store.disable_user("user0").await.unwrap();
        let board = Leaderboard::new(store);

        let top = board.top().await.unwrap();
        assert_eq!(top.len(), 2);
        assert!(!top[0].user.active);
        assert_eq!(board.rank(1).await.unwrap(), Some(1));
    }
}
