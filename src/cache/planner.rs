//! Invalidation plan generation.
//!
//! Translates a mutation into the ordered set of keys and namespaces that
//! must be dropped before the mutation's caller sees its result.

use std::collections::HashSet;
use std::fmt;

use super::events::Mutation;
use super::keys::{Namespace, access_key, profile_key, startup_key, tags_key};

/// One deletion step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Invalidation {
    /// Delete a single key.
    Key(String),
    /// Delete every key in a namespace.
    Namespace(Namespace),
}

impl fmt::Display for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalidation::Key(key) => f.write_str(key),
            Invalidation::Namespace(namespace) => write!(f, "{}*", namespace.prefix()),
        }
    }
}

/// Ordered, duplicate-free deletion steps.
///
/// Steps run entity detail first, then user-scoped keys, then broad
/// namespaces. Deletions commute, so the order only documents intent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    steps: Vec<Invalidation>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(ToString::to_string).collect();
        write!(f, "InvalidationPlan [{}]", steps.join(", "))
    }
}

impl InvalidationPlan {
    pub fn from_mutation(mutation: &Mutation) -> Self {
        let mut plan = Self::default();

        match mutation {
            Mutation::StartupCreated { creator_id, .. } => {
                plan.push(Invalidation::Key(profile_key(creator_id)));
                plan.push(Invalidation::Namespace(Namespace::Startups));
                plan.push(Invalidation::Key(tags_key()));
            }
            Mutation::JoinRequestSent {
                startup_id,
                user_id,
            } => {
                plan.push(Invalidation::Key(access_key(startup_id, user_id)));
            }
            Mutation::JoinRequestAccepted {
                startup_id,
                owner_id,
                participant_ids,
            } => {
                plan.extend_related(startup_id, participant_ids);
                plan.push(Invalidation::Key(profile_key(owner_id)));
                for participant in participant_ids {
                    plan.push(Invalidation::Key(profile_key(participant)));
                }
            }
            Mutation::JoinRequestRejected {
                startup_id,
                requester_ids,
            } => {
                plan.extend_related(startup_id, requester_ids);
            }
            Mutation::ProfileUpdated { user_id } => {
                plan.push(Invalidation::Key(profile_key(user_id)));
            }
            Mutation::ProfileTagsUpdated { user_id } => {
                plan.push(Invalidation::Key(profile_key(user_id)));
                plan.push(Invalidation::Key(tags_key()));
            }
        }

        plan
    }

    /// Detail key, then each user's access key, then every listing.
    pub fn related(startup_id: &str, user_ids: &[String]) -> Self {
        let mut plan = Self::default();
        plan.extend_related(startup_id, user_ids);
        plan
    }

    pub fn steps(&self) -> &[Invalidation] {
        &self.steps
    }

    fn extend_related(&mut self, startup_id: &str, user_ids: &[String]) {
        self.push(Invalidation::Key(startup_key(startup_id)));
        for user_id in user_ids {
            self.push(Invalidation::Key(access_key(startup_id, user_id)));
        }
        self.push(Invalidation::Namespace(Namespace::Startups));
    }

    fn push(&mut self, step: Invalidation) {
        if !self.steps.contains(&step) {
            self.steps.push(step);
        }
    }

    /// Keys removed individually, ignoring namespace steps.
    pub fn keys(&self) -> HashSet<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Invalidation::Key(key) => Some(key.as_str()),
                Invalidation::Namespace(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn startup_creation_clears_listings_and_tags() {
        let plan = InvalidationPlan::from_mutation(&Mutation::StartupCreated {
            startup_id: "s1".to_string(),
            creator_id: "u1".to_string(),
        });

        assert!(plan.steps().contains(&Invalidation::Namespace(Namespace::Startups)));
        assert!(plan.keys().contains("tags:all"));
        assert!(plan.keys().contains("profile:u1"));
        assert!(!plan.keys().contains("startup:s1"));
    }

    #[test]
    fn accepted_request_orders_detail_before_users_before_lists() {
        let plan = InvalidationPlan::from_mutation(&Mutation::JoinRequestAccepted {
            startup_id: "s1".to_string(),
            owner_id: "owner".to_string(),
            participant_ids: ids(&["a", "b"]),
        });

        assert_eq!(
            plan.steps(),
            &[
                Invalidation::Key("startup:s1".to_string()),
                Invalidation::Key("access:s1:a".to_string()),
                Invalidation::Key("access:s1:b".to_string()),
                Invalidation::Namespace(Namespace::Startups),
                Invalidation::Key("profile:owner".to_string()),
                Invalidation::Key("profile:a".to_string()),
                Invalidation::Key("profile:b".to_string()),
            ]
        );
    }

    #[test]
    fn rejected_request_leaves_profiles_alone() {
        let plan = InvalidationPlan::from_mutation(&Mutation::JoinRequestRejected {
            startup_id: "s1".to_string(),
            requester_ids: ids(&["a"]),
        });

        assert!(plan.keys().contains("startup:s1"));
        assert!(plan.keys().contains("access:s1:a"));
        assert!(!plan.keys().iter().any(|key| key.starts_with("profile:")));
    }

    #[test]
    fn profile_update_touches_only_that_profile() {
        let plan = InvalidationPlan::from_mutation(&Mutation::ProfileUpdated {
            user_id: "u1".to_string(),
        });

        assert_eq!(plan.steps(), &[Invalidation::Key("profile:u1".to_string())]);
    }

    #[test]
    fn tag_edits_also_drop_the_tag_list() {
        let plan = InvalidationPlan::from_mutation(&Mutation::ProfileTagsUpdated {
            user_id: "u1".to_string(),
        });

        assert_eq!(
            plan.steps(),
            &[
                Invalidation::Key("profile:u1".to_string()),
                Invalidation::Key("tags:all".to_string()),
            ]
        );
    }

    #[test]
    fn duplicate_users_collapse() {
        let plan = InvalidationPlan::related("s1", &ids(&["a", "a"]));
        assert_eq!(plan.steps().len(), 3);
        assert_eq!(
            plan.to_string(),
            "InvalidationPlan [startup:s1, access:s1:a, startups:*]"
        );
    }
}
