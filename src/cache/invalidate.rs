//! Cache invalidation helpers.
//!
//! Write paths call these after committing, and before returning to their
//! caller, so the next read of an affected key misses and refetches instead
//! of serving outdated data for the rest of its window.

use metrics::counter;
use tracing::{debug, info};

use super::events::Mutation;
use super::keys::{Namespace, access_key, profile_key, startup_key, tags_key};
use super::planner::{Invalidation, InvalidationPlan};
use super::store::Cache;

const METRIC_CACHE_INVALIDATED: &str = "startupcoders_cache_invalidated_total";

/// Domain-aware deletion over a shared [`Cache`].
///
/// # Usage
///
/// ```ignore
/// // After a join request was accepted and committed:
/// invalidator.apply(&Mutation::JoinRequestAccepted { .. });
/// ```
#[derive(Debug, Clone)]
pub struct Invalidator {
    cache: Cache,
}

impl Invalidator {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    /// Plan and execute the invalidations for a committed mutation.
    ///
    /// Returns the number of entries removed.
    pub fn apply(&self, mutation: &Mutation) -> usize {
        let plan = InvalidationPlan::from_mutation(mutation);
        let removed = self.execute(&plan);

        info!(
            mutation = mutation.label(),
            plan = %plan,
            removed,
            "Cache invalidated after mutation"
        );
        removed
    }

    /// Execute a plan step by step.
    pub fn execute(&self, plan: &InvalidationPlan) -> usize {
        plan.steps().iter().map(|step| self.run(step)).sum()
    }

    pub fn invalidate_startup(&self, startup_id: &str) -> bool {
        self.delete(&startup_key(startup_id))
    }

    pub fn invalidate_access(&self, startup_id: &str, user_id: &str) -> bool {
        self.delete(&access_key(startup_id, user_id))
    }

    pub fn invalidate_profile(&self, user_id: &str) -> bool {
        self.delete(&profile_key(user_id))
    }

    pub fn invalidate_tags(&self) -> bool {
        self.delete(&tags_key())
    }

    /// Drop every cached listing, whatever its page and filters.
    pub fn invalidate_lists(&self) -> usize {
        self.run(&Invalidation::Namespace(Namespace::Startups))
    }

    /// Startup detail, then the user's access check if given, then all
    /// listings.
    pub fn invalidate_startup_related(&self, startup_id: &str, user_id: Option<&str>) -> usize {
        let users: Vec<String> = user_id.map(str::to_string).into_iter().collect();
        self.execute(&InvalidationPlan::related(startup_id, &users))
    }

    fn run(&self, step: &Invalidation) -> usize {
        let removed = match step {
            Invalidation::Key(key) => usize::from(self.cache.delete(key)),
            Invalidation::Namespace(namespace) => self.cache.delete_prefix(&namespace.prefix()),
        };
        if removed > 0 {
            counter!(METRIC_CACHE_INVALIDATED).increment(removed as u64);
        }
        debug!(step = %step, removed, "Invalidation step");
        removed
    }

    fn delete(&self, key: &str) -> bool {
        self.run(&Invalidation::Key(key.to_string())) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::list_key;

    fn seeded() -> (Cache, Invalidator) {
        let cache = Cache::default();
        for key in [
            startup_key("s1"),
            startup_key("s2"),
            access_key("s1", "u1"),
            access_key("s1", "u2"),
            profile_key("u1"),
            list_key(1, None, &[]),
            list_key(2, Some("rust"), &[4, 2]),
            tags_key(),
        ] {
            cache.set(&key, ()).expect("valid key");
        }
        let invalidator = Invalidator::new(cache.clone());
        (cache, invalidator)
    }

    #[test]
    fn single_key_helpers_report_presence() {
        let (cache, invalidator) = seeded();

        assert!(invalidator.invalidate_startup("s1"));
        assert!(!invalidator.invalidate_startup("s1"));
        assert!(invalidator.invalidate_access("s1", "u1"));
        assert!(invalidator.invalidate_profile("u1"));
        assert!(invalidator.invalidate_tags());

        assert!(cache.has(&startup_key("s2")));
        assert!(cache.has(&access_key("s1", "u2")));
    }

    #[test]
    fn invalidate_lists_keeps_detail_keys() {
        let (cache, invalidator) = seeded();

        assert_eq!(invalidator.invalidate_lists(), 2);
        assert_eq!(invalidator.invalidate_lists(), 0);
        assert!(cache.has(&startup_key("s1")));
        assert!(cache.has(&startup_key("s2")));
    }

    #[test]
    fn related_invalidation_with_and_without_user() {
        let (cache, invalidator) = seeded();

        assert_eq!(invalidator.invalidate_startup_related("s1", Some("u1")), 4);
        assert!(!cache.has(&access_key("s1", "u1")));
        assert!(cache.has(&access_key("s1", "u2")));

        assert_eq!(invalidator.invalidate_startup_related("s2", None), 1);
        assert!(cache.has(&profile_key("u1")));
    }

    #[test]
    fn apply_accepted_request() {
        let (cache, invalidator) = seeded();

        let removed = invalidator.apply(&Mutation::JoinRequestAccepted {
            startup_id: "s1".to_string(),
            owner_id: "owner".to_string(),
            participant_ids: vec!["u1".to_string(), "u2".to_string()],
        });

        // detail + two access checks + two listings + u1's profile
        assert_eq!(removed, 6);
        assert_eq!(
            cache.keys().into_iter().collect::<std::collections::HashSet<_>>(),
            [startup_key("s2"), tags_key()].into_iter().collect()
        );
    }
}
