//! In-process persistence adapter.
//!
//! Implements every repository trait over a single mutex-guarded state. Used
//! for local runs without a database and as the backing store in tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{
    CreateJoinRequestParams, CreateStartupParams, JoinRequestsRepo, RepoError, StartupsRepo,
    TagsRepo, UsersRepo,
};
use crate::domain::entities::{
    JoinRequestRecord, Pagination, StartupPage, StartupRecord, StartupSummary, TagRecord,
    UserProfileRecord, UserSummary,
};
use crate::domain::startups::StartupListQuery;
use crate::domain::types::RequestStatus;

#[derive(Debug)]
struct UserRow {
    summary: UserSummary,
    description: Option<String>,
    tag_ids: Vec<i32>,
}

#[derive(Debug)]
struct StartupRow {
    id: String,
    name: String,
    description: String,
    creator_id: String,
    tag_ids: Vec<i32>,
    images: Vec<String>,
    participant_ids: Vec<String>,
    created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<String, UserRow>,
    tags: Vec<TagRecord>,
    /// Insertion order, oldest first.
    startups: Vec<StartupRow>,
    requests: Vec<JoinRequestRecord>,
    next_startup: u64,
    next_request: i64,
}

impl State {
    fn user_summary(&self, user_id: &str) -> Option<UserSummary> {
        self.users.get(user_id).map(|row| row.summary.clone())
    }

    fn tags_for(&self, ids: &[i32]) -> Vec<TagRecord> {
        ids.iter()
            .filter_map(|id| self.tags.iter().find(|tag| tag.id == *id).cloned())
            .collect()
    }

    /// Tag id for `name`, creating the tag when unknown.
    fn resolve_tag(&mut self, name: &str) -> i32 {
        if let Some(tag) = self.tags.iter().find(|tag| tag.name == name) {
            return tag.id;
        }
        let id = self.tags.iter().map(|tag| tag.id).max().unwrap_or(0) + 1;
        self.tags.push(TagRecord {
            id,
            name: name.to_string(),
        });
        id
    }

    fn resolve_tags(&mut self, names: &[String]) -> Vec<i32> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let id = self.resolve_tag(name);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    fn startup_record(&self, row: &StartupRow) -> StartupRecord {
        StartupRecord {
            id: row.id.clone(),
            name: row.name.clone(),
            description: row.description.clone(),
            creator_id: row.creator_id.clone(),
            creator: self.user_summary(&row.creator_id),
            tags: self.tags_for(&row.tag_ids),
            images: row.images.clone(),
            participants: row
                .participant_ids
                .iter()
                .filter_map(|id| self.user_summary(id))
                .collect(),
            created_at: row.created_at,
        }
    }

    fn profile(&self, user_id: &str) -> Option<UserProfileRecord> {
        self.users.get(user_id).map(|row| UserProfileRecord {
            id: row.summary.id.clone(),
            name: row.summary.name.clone(),
            username: row.summary.username.clone(),
            image: row.summary.image.clone(),
            description: row.description.clone(),
            tags: self.tags_for(&row.tag_ids),
            created_startups: self.summaries(|startup| startup.creator_id == user_id),
            participating_startups: self.summaries(|startup| {
                startup.creator_id != user_id
                    && startup.participant_ids.iter().any(|id| id == user_id)
            }),
        })
    }

    fn summaries(&self, keep: impl Fn(&StartupRow) -> bool) -> Vec<StartupSummary> {
        self.startups
            .iter()
            .rev()
            .filter(|row| keep(*row))
            .map(|row| StartupSummary::from(&self.startup_record(row)))
            .collect()
    }

    fn pending_request(&self, startup_id: &str, user_id: &str) -> bool {
        self.requests.iter().any(|request| {
            request.status.is_open()
                && request.startup_id == startup_id
                && request.requester_ids.iter().any(|id| id == user_id)
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user so startups and profiles can reference them.
    pub fn add_user(&self, user_id: &str, name: &str) {
        self.lock().users.insert(
            user_id.to_string(),
            UserRow {
                summary: UserSummary {
                    id: user_id.to_string(),
                    name: Some(name.to_string()),
                    username: None,
                    image: None,
                },
                description: None,
                tag_ids: Vec::new(),
            },
        );
    }

    pub fn add_tag(&self, name: &str) -> TagRecord {
        let id = self.lock().resolve_tag(name);
        TagRecord {
            id,
            name: name.to_string(),
        }
    }

    pub fn startup_count(&self) -> usize {
        self.lock().startups.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StartupsRepo for MemoryStore {
    async fn list_startups(
        &self,
        query: &StartupListQuery,
        page_size: u32,
    ) -> Result<StartupPage, RepoError> {
        let state = self.lock();
        let search = query.search_term();

        let matching: Vec<&StartupRow> = state
            .startups
            .iter()
            .rev()
            .filter(|row| {
                search
                    .as_deref()
                    .is_none_or(|term| row.name.to_lowercase().contains(term))
            })
            .filter(|row| {
                query.tag_ids.is_empty() || row.tag_ids.iter().any(|id| query.tag_ids.contains(id))
            })
            .collect();

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset(page_size))
            .map_err(|_| RepoError::InvalidInput {
                message: "page out of range".to_string(),
            })?;
        let startups = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .map(|row| StartupSummary::from(&state.startup_record(row)))
            .collect();

        Ok(StartupPage {
            startups,
            pagination: Pagination::new(total, query.page, page_size),
        })
    }

    async fn find_startup(&self, id: &str) -> Result<Option<StartupRecord>, RepoError> {
        let state = self.lock();
        Ok(state
            .startups
            .iter()
            .find(|row| row.id == id)
            .map(|row| state.startup_record(row)))
    }

    async fn create_startup(
        &self,
        params: CreateStartupParams,
    ) -> Result<StartupRecord, RepoError> {
        let CreateStartupParams {
            creator_id,
            startup,
        } = params;

        let mut state = self.lock();
        if !state.users.contains_key(&creator_id) {
            return Err(RepoError::NotFound);
        }

        let mut tag_ids: Vec<i32> = Vec::new();
        for id in startup.tag_ids {
            if !state.tags.iter().any(|tag| tag.id == id) {
                return Err(RepoError::InvalidInput {
                    message: format!("unknown tag id {id}"),
                });
            }
            if !tag_ids.contains(&id) {
                tag_ids.push(id);
            }
        }
        for id in state.resolve_tags(&startup.tag_names) {
            if !tag_ids.contains(&id) {
                tag_ids.push(id);
            }
        }

        state.next_startup += 1;
        let row = StartupRow {
            id: state.next_startup.to_string(),
            name: startup.name,
            description: startup.description,
            creator_id: creator_id.clone(),
            tag_ids,
            images: startup.images,
            participant_ids: vec![creator_id],
            created_at: OffsetDateTime::now_utc(),
        };
        let record = state.startup_record(&row);
        state.startups.push(row);
        Ok(record)
    }

    async fn has_requested_access(
        &self,
        startup_id: &str,
        user_id: &str,
    ) -> Result<bool, RepoError> {
        Ok(self.lock().pending_request(startup_id, user_id))
    }
}

#[async_trait]
impl TagsRepo for MemoryStore {
    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError> {
        let mut tags = self.lock().tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfileRecord>, RepoError> {
        Ok(self.lock().profile(user_id))
    }

    async fn update_description(
        &self,
        user_id: &str,
        description: &str,
    ) -> Result<UserProfileRecord, RepoError> {
        let mut state = self.lock();
        let row = state.users.get_mut(user_id).ok_or(RepoError::NotFound)?;
        row.description = (!description.is_empty()).then(|| description.to_string());
        state.profile(user_id).ok_or(RepoError::NotFound)
    }

    async fn update_tags(
        &self,
        user_id: &str,
        tag_names: &[String],
    ) -> Result<UserProfileRecord, RepoError> {
        let mut state = self.lock();
        if !state.users.contains_key(user_id) {
            return Err(RepoError::NotFound);
        }
        let tag_ids = state.resolve_tags(tag_names);
        if let Some(row) = state.users.get_mut(user_id) {
            row.tag_ids = tag_ids;
        }
        state.profile(user_id).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl JoinRequestsRepo for MemoryStore {
    async fn create_request(
        &self,
        params: CreateJoinRequestParams,
    ) -> Result<JoinRequestRecord, RepoError> {
        let mut state = self.lock();
        if !state.startups.iter().any(|row| row.id == params.startup_id) {
            return Err(RepoError::NotFound);
        }
        if state.pending_request(&params.startup_id, &params.user_id) {
            return Err(RepoError::duplicate("join_request_pending"));
        }

        state.next_request += 1;
        let record = JoinRequestRecord {
            id: state.next_request,
            startup_id: params.startup_id,
            requester_ids: vec![params.user_id],
            message: params.message,
            status: RequestStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        state.requests.push(record.clone());
        Ok(record)
    }

    async fn find_request(&self, id: i64) -> Result<Option<JoinRequestRecord>, RepoError> {
        Ok(self
            .lock()
            .requests
            .iter()
            .find(|request| request.id == id)
            .cloned())
    }

    async fn accept_request(&self, id: i64) -> Result<JoinRequestRecord, RepoError> {
        let mut state = self.lock();
        let record = decide(&mut state, id, RequestStatus::Accepted)?;

        let row = state
            .startups
            .iter_mut()
            .find(|row| row.id == record.startup_id)
            .ok_or(RepoError::NotFound)?;
        for user_id in &record.requester_ids {
            if !row.participant_ids.contains(user_id) {
                row.participant_ids.push(user_id.clone());
            }
        }
        Ok(record)
    }

    async fn reject_request(&self, id: i64) -> Result<JoinRequestRecord, RepoError> {
        decide(&mut self.lock(), id, RequestStatus::Rejected)
    }
}

fn decide(state: &mut State, id: i64, status: RequestStatus) -> Result<JoinRequestRecord, RepoError> {
    let request = state
        .requests
        .iter_mut()
        .find(|request| request.id == id)
        .ok_or(RepoError::NotFound)?;
    if !request.status.is_open() {
        return Err(RepoError::InvalidInput {
            message: format!("request {id} was already decided"),
        });
    }
    request.status = status;
    Ok(request.clone())
}
