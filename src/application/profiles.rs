use std::sync::Arc;

use tracing::info;

use crate::application::error::AppError;
use crate::application::repos::UsersRepo;
use crate::cache::{Cache, Invalidator, Mutation, profile_key};
use crate::domain::entities::UserProfileRecord;

#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UsersRepo>,
    cache: Cache,
    invalidator: Invalidator,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UsersRepo>, cache: Cache) -> Self {
        let invalidator = Invalidator::new(cache.clone());
        Self {
            users,
            cache,
            invalidator,
        }
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfileRecord, AppError> {
        let repo = self.users.clone();
        let id = user_id.to_string();

        let profile: Option<UserProfileRecord> = self
            .cache
            .get(&profile_key(user_id), move || async move {
                repo.find_profile(&id).await
            })
            .await?;
        profile.ok_or(AppError::NotFound)
    }

    pub async fn update_description(
        &self,
        user_id: &str,
        description: &str,
    ) -> Result<UserProfileRecord, AppError> {
        let updated = self
            .users
            .update_description(user_id, description.trim())
            .await?;

        self.invalidator.apply(&Mutation::ProfileUpdated {
            user_id: user_id.to_string(),
        });
        info!(user_id, "Profile description updated");
        Ok(updated)
    }

    pub async fn update_tags(
        &self,
        user_id: &str,
        tag_names: &[String],
    ) -> Result<UserProfileRecord, AppError> {
        let mut names: Vec<String> = Vec::with_capacity(tag_names.len());
        for name in tag_names.iter().map(|name| name.trim()) {
            if !name.is_empty() && !names.iter().any(|seen| seen == name) {
                names.push(name.to_string());
            }
        }

        let updated = self.users.update_tags(user_id, &names).await?;

        self.invalidator.apply(&Mutation::ProfileTagsUpdated {
            user_id: user_id.to_string(),
        });
        info!(user_id, tags = names.len(), "Profile tags updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryStore;

    #[tokio::test]
    async fn description_update_is_visible_on_next_read() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("u1", "Ada");
        let service = ProfileService::new(store.clone(), Cache::default());

        let before = service.profile("u1").await.expect("profile");
        assert_eq!(before.description, None);

        service
            .update_description("u1", "  Systems programmer  ")
            .await
            .expect("update");

        let after = service.profile("u1").await.expect("profile");
        assert_eq!(after.description.as_deref(), Some("Systems programmer"));
    }

    #[tokio::test]
    async fn tag_update_dedupes_and_refreshes_tag_list() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("u1", "Ada");
        let cache = Cache::default();
        let service = ProfileService::new(store.clone(), cache.clone());
        cache
            .set(&crate::cache::tags_key(), Vec::<String>::new())
            .expect("valid key");

        let updated = service
            .update_tags("u1", &["rust".to_string(), " rust ".to_string(), "go".to_string()])
            .await
            .expect("update");

        let names: Vec<&str> = updated.tags.iter().map(|tag| tag.name.as_str()).collect();
        assert_eq!(names, vec!["rust", "go"]);
        assert!(!cache.has(&crate::cache::tags_key()));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = ProfileService::new(store, Cache::default());

        assert!(matches!(
            service.profile("ghost").await,
            Err(AppError::NotFound)
        ));
    }
}
