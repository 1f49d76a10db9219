//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::RequestStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub id: i32,
    pub name: String,
}

/// Public identity shown next to startups and requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartupRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub creator_id: String,
    pub creator: Option<UserSummary>,
    pub tags: Vec<TagRecord>,
    pub images: Vec<String>,
    pub participants: Vec<UserSummary>,
    pub created_at: OffsetDateTime,
}

impl StartupRecord {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|user| user.id == user_id)
    }
}

/// Listing row; the full record minus creator details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartupSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<TagRecord>,
    pub participant_count: usize,
    pub created_at: OffsetDateTime,
}

impl From<&StartupRecord> for StartupSummary {
    fn from(record: &StartupRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            tags: record.tags.clone(),
            participant_count: record.participants.len(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total_items: u64,
    pub total_pages: u64,
    pub current_page: u32,
    pub page_size: u32,
}

impl Pagination {
    /// `current_page` is 1-based; page 0 is reported as page 1.
    pub fn new(total_items: u64, current_page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_items.div_ceil(u64::from(page_size))
        };
        Self {
            total_items,
            total_pages,
            current_page: current_page.max(1),
            page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartupPage {
    pub startups: Vec<StartupSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfileRecord {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<TagRecord>,
    /// Startups this user created, newest first.
    pub created_startups: Vec<StartupSummary>,
    /// Startups this user joined but did not create, newest first.
    pub participating_startups: Vec<StartupSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinRequestRecord {
    pub id: i64,
    pub startup_id: String,
    pub requester_ids: Vec<String>,
    pub message: String,
    pub status: RequestStatus,
    pub created_at: OffsetDateTime,
}
