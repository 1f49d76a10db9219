//! Startup directory: cached reads and the writes that invalidate them.

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::error::AppError;
use crate::application::repos::{
    CreateJoinRequestParams, CreateStartupParams, JoinRequestsRepo, StartupsRepo, TagsRepo,
};
use crate::cache::{Cache, Invalidator, Mutation, access_key, startup_key, tags_key};
use crate::domain::entities::{JoinRequestRecord, StartupPage, StartupRecord, TagRecord};
use crate::domain::startups::{DEFAULT_PAGE_SIZE, NewStartup, StartupListQuery};

#[derive(Clone)]
pub struct StartupService {
    startups: Arc<dyn StartupsRepo>,
    tags: Arc<dyn TagsRepo>,
    requests: Arc<dyn JoinRequestsRepo>,
    cache: Cache,
    invalidator: Invalidator,
    page_size: u32,
}

impl StartupService {
    pub fn new(
        startups: Arc<dyn StartupsRepo>,
        tags: Arc<dyn TagsRepo>,
        requests: Arc<dyn JoinRequestsRepo>,
        cache: Cache,
    ) -> Self {
        let invalidator = Invalidator::new(cache.clone());
        Self {
            startups,
            tags,
            requests,
            cache,
            invalidator,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn list(&self, query: &StartupListQuery) -> Result<StartupPage, AppError> {
        let repo = self.startups.clone();
        let owned = query.clone();
        let page_size = self.page_size;

        let page = self
            .cache
            .get(&query.cache_key(), move || async move {
                repo.list_startups(&owned, page_size).await
            })
            .await?;
        Ok(page)
    }

    pub async fn get(&self, startup_id: &str) -> Result<StartupRecord, AppError> {
        let repo = self.startups.clone();
        let id = startup_id.to_string();

        let record: Option<StartupRecord> = self
            .cache
            .get(&startup_key(startup_id), move || async move {
                repo.find_startup(&id).await
            })
            .await?;
        record.ok_or(AppError::NotFound)
    }

    pub async fn tags(&self) -> Result<Vec<TagRecord>, AppError> {
        let repo = self.tags.clone();

        let tags = self
            .cache
            .get(&tags_key(), move || async move { repo.list_tags().await })
            .await?;
        Ok(tags)
    }

    /// Whether `user_id` has a join request on file for the startup.
    /// Anonymous visitors have not.
    pub async fn has_requested_access(
        &self,
        startup_id: &str,
        user_id: Option<&str>,
    ) -> Result<bool, AppError> {
        let Some(user_id) = user_id.filter(|id| !id.trim().is_empty()) else {
            return Ok(false);
        };
        if startup_id.trim().is_empty() {
            return Ok(false);
        }

        let repo = self.startups.clone();
        let (startup, user) = (startup_id.to_string(), user_id.to_string());

        let requested = self
            .cache
            .get(&access_key(startup_id, user_id), move || async move {
                repo.has_requested_access(&startup, &user).await
            })
            .await?;
        Ok(requested)
    }

    pub async fn create(
        &self,
        creator_id: &str,
        startup: NewStartup,
    ) -> Result<StartupRecord, AppError> {
        let startup = startup.validated()?;

        let record = self
            .startups
            .create_startup(CreateStartupParams {
                creator_id: creator_id.to_string(),
                startup,
            })
            .await?;

        self.invalidator.apply(&Mutation::StartupCreated {
            startup_id: record.id.clone(),
            creator_id: creator_id.to_string(),
        });
        info!(startup_id = %record.id, creator_id, "Startup created");
        Ok(record)
    }

    pub async fn request_to_join(
        &self,
        startup_id: &str,
        user_id: &str,
        message: &str,
    ) -> Result<JoinRequestRecord, AppError> {
        let startup = self
            .startups
            .find_startup(startup_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if startup.has_participant(user_id) {
            return Err(AppError::conflict("already a participant"));
        }
        if self
            .startups
            .has_requested_access(startup_id, user_id)
            .await?
        {
            return Err(AppError::conflict("a request is already pending"));
        }

        let request = self
            .requests
            .create_request(CreateJoinRequestParams {
                startup_id: startup_id.to_string(),
                user_id: user_id.to_string(),
                message: message.trim().to_string(),
            })
            .await?;

        self.invalidator.apply(&Mutation::JoinRequestSent {
            startup_id: startup_id.to_string(),
            user_id: user_id.to_string(),
        });
        debug!(request_id = request.id, startup_id, user_id, "Join request sent");
        Ok(request)
    }

    /// Accept a pending request. Only the startup's creator may do so.
    pub async fn accept_request(
        &self,
        request_id: i64,
        acting_user: &str,
    ) -> Result<JoinRequestRecord, AppError> {
        let startup = self.owned_startup_for(request_id, acting_user).await?;

        let accepted = self.requests.accept_request(request_id).await?;

        self.invalidator.apply(&Mutation::JoinRequestAccepted {
            startup_id: startup.id.clone(),
            owner_id: startup.creator_id.clone(),
            participant_ids: accepted.requester_ids.clone(),
        });
        info!(
            request_id,
            startup_id = %startup.id,
            participants = accepted.requester_ids.len(),
            "Join request accepted"
        );
        Ok(accepted)
    }

    /// Reject a pending request. Only the startup's creator may do so.
    pub async fn reject_request(
        &self,
        request_id: i64,
        acting_user: &str,
    ) -> Result<JoinRequestRecord, AppError> {
        let startup = self.owned_startup_for(request_id, acting_user).await?;

        let rejected = self.requests.reject_request(request_id).await?;

        self.invalidator.apply(&Mutation::JoinRequestRejected {
            startup_id: startup.id.clone(),
            requester_ids: rejected.requester_ids.clone(),
        });
        info!(request_id, startup_id = %startup.id, "Join request rejected");
        Ok(rejected)
    }

    async fn owned_startup_for(
        &self,
        request_id: i64,
        acting_user: &str,
    ) -> Result<StartupRecord, AppError> {
        let request = self
            .requests
            .find_request(request_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !request.status.is_open() {
            return Err(AppError::conflict("request was already decided"));
        }

        let startup = self
            .startups
            .find_startup(&request.startup_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !startup.is_owned_by(acting_user) {
            return Err(AppError::forbidden(
                "only the startup creator can decide requests",
            ));
        }
        Ok(startup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::DomainError;
    use crate::domain::types::RequestStatus;
    use crate::infra::memory::MemoryStore;

    fn service(store: &Arc<MemoryStore>) -> StartupService {
        StartupService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Cache::default(),
        )
    }

    fn new_startup(name: &str) -> NewStartup {
        NewStartup {
            name: name.to_string(),
            description: "Building something worth joining".to_string(),
            tag_names: vec!["rust".to_string()],
            ..NewStartup::default()
        }
    }

    #[tokio::test]
    async fn created_startup_appears_in_cached_listing() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("owner", "Owner");
        let service = service(&store);

        let empty = service
            .list(&StartupListQuery::default())
            .await
            .expect("list");
        assert!(empty.startups.is_empty());

        service
            .create("owner", new_startup("Rocket"))
            .await
            .expect("create");

        let page = service
            .list(&StartupListQuery::default())
            .await
            .expect("list");
        assert_eq!(page.startups.len(), 1);
        assert_eq!(page.pagination.total_items, 1);

        let tags = service.tags().await.expect("tags");
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn invalid_startup_is_rejected_before_the_repo() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);

        let err = service
            .create("owner", new_startup("ab"))
            .await
            .expect_err("short name");
        assert!(matches!(err, AppError::Domain(DomainError::Validation { .. })));
        assert_eq!(store.startup_count(), 0);
    }

    #[tokio::test]
    async fn missing_startup_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);

        let err = service.get("nope").await.expect_err("missing");
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn request_flow_keeps_access_check_current() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("owner", "Owner");
        store.add_user("dev", "Dev");
        let service = service(&store);
        let startup = service
            .create("owner", new_startup("Rocket"))
            .await
            .expect("create");

        assert!(
            !service
                .has_requested_access(&startup.id, Some("dev"))
                .await
                .expect("check")
        );

        let request = service
            .request_to_join(&startup.id, "dev", "let me in")
            .await
            .expect("request");
        assert!(
            service
                .has_requested_access(&startup.id, Some("dev"))
                .await
                .expect("check")
        );

        let err = service
            .request_to_join(&startup.id, "dev", "again")
            .await
            .expect_err("duplicate");
        assert!(matches!(err, AppError::Conflict(_)));

        // warm the detail entry, then accept
        assert!(!service.get(&startup.id).await.expect("get").has_participant("dev"));
        let accepted = service
            .accept_request(request.id, "owner")
            .await
            .expect("accept");
        assert_eq!(accepted.status, RequestStatus::Accepted);

        let detail = service.get(&startup.id).await.expect("get");
        assert!(detail.has_participant("dev"));
    }

    #[tokio::test]
    async fn only_the_creator_decides_requests() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("owner", "Owner");
        store.add_user("dev", "Dev");
        let service = service(&store);
        let startup = service
            .create("owner", new_startup("Rocket"))
            .await
            .expect("create");
        let request = service
            .request_to_join(&startup.id, "dev", "hi")
            .await
            .expect("request");

        let err = service
            .reject_request(request.id, "dev")
            .await
            .expect_err("not the owner");
        assert!(matches!(err, AppError::Forbidden(_)));

        let rejected = service
            .reject_request(request.id, "owner")
            .await
            .expect("reject");
        assert_eq!(rejected.status, RequestStatus::Rejected);

        let err = service
            .accept_request(request.id, "owner")
            .await
            .expect_err("already decided");
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn small_pages_split_the_listing() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("owner", "Owner");
        let service = service(&store).with_page_size(1);
        for name in ["Alpha", "Bravo"] {
            service.create("owner", new_startup(name)).await.expect("create");
        }

        let first = service
            .list(&StartupListQuery {
                page: 0,
                ..StartupListQuery::default()
            })
            .await
            .expect("list");
        assert_eq!(first.pagination.current_page, 1);
        assert_eq!(first.pagination.total_pages, 2);
        assert_eq!(first.startups[0].name, "Bravo");

        let second = service.list(&StartupListQuery::page(2)).await.expect("list");
        assert_eq!(second.startups.len(), 1);
        assert_eq!(second.startups[0].name, "Alpha");
    }

    #[tokio::test]
    async fn anonymous_users_have_not_requested_access() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);

        assert!(!service.has_requested_access("s1", None).await.expect("check"));
        assert!(!service.has_requested_access("s1", Some(" ")).await.expect("check"));
    }
}
