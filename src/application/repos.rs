//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    JoinRequestRecord, StartupPage, StartupRecord, TagRecord, UserProfileRecord,
};
use crate::domain::startups::{NewStartup, StartupListQuery};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateStartupParams {
    pub creator_id: String,
    pub startup: NewStartup,
}

#[derive(Debug, Clone)]
pub struct CreateJoinRequestParams {
    pub startup_id: String,
    pub user_id: String,
    pub message: String,
}

#[async_trait]
pub trait StartupsRepo: Send + Sync {
    /// Newest first. Search matches names case-insensitively; tag filters
    /// keep startups carrying any of the given tags.
    async fn list_startups(
        &self,
        query: &StartupListQuery,
        page_size: u32,
    ) -> Result<StartupPage, RepoError>;

    async fn find_startup(&self, id: &str) -> Result<Option<StartupRecord>, RepoError>;

    /// Persist a startup, connect its tags, and enroll the creator as its
    /// first participant.
    async fn create_startup(&self, params: CreateStartupParams)
    -> Result<StartupRecord, RepoError>;

    async fn has_requested_access(
        &self,
        startup_id: &str,
        user_id: &str,
    ) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    /// Ordered by name.
    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfileRecord>, RepoError>;

    async fn update_description(
        &self,
        user_id: &str,
        description: &str,
    ) -> Result<UserProfileRecord, RepoError>;

    /// Replace the user's skill tags, creating unknown names.
    async fn update_tags(
        &self,
        user_id: &str,
        tag_names: &[String],
    ) -> Result<UserProfileRecord, RepoError>;
}

#[async_trait]
pub trait JoinRequestsRepo: Send + Sync {
    async fn create_request(
        &self,
        params: CreateJoinRequestParams,
    ) -> Result<JoinRequestRecord, RepoError>;

    async fn find_request(&self, id: i64) -> Result<Option<JoinRequestRecord>, RepoError>;

    /// Mark the request accepted and enroll its requesters as participants.
    async fn accept_request(&self, id: i64) -> Result<JoinRequestRecord, RepoError>;

    async fn reject_request(&self, id: i64) -> Result<JoinRequestRecord, RepoError>;
}
