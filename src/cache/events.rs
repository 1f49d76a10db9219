//! Domain mutations that make cached reads outdated.

/// A committed write, described by the identifiers the cache cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A startup was created. It can appear in any listing.
    StartupCreated {
        startup_id: String,
        creator_id: String,
    },
    /// A user asked to join a startup.
    JoinRequestSent { startup_id: String, user_id: String },
    /// The owner accepted a join request; the requesters are now participants.
    JoinRequestAccepted {
        startup_id: String,
        owner_id: String,
        participant_ids: Vec<String>,
    },
    /// The owner rejected a join request.
    JoinRequestRejected {
        startup_id: String,
        requester_ids: Vec<String>,
    },
    /// A user's description, name, username or image changed.
    ProfileUpdated { user_id: String },
    /// A user's skill tags changed; unknown tag names were created.
    ProfileTagsUpdated { user_id: String },
}

impl Mutation {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::StartupCreated { .. } => "startup_created",
            Mutation::JoinRequestSent { .. } => "join_request_sent",
            Mutation::JoinRequestAccepted { .. } => "join_request_accepted",
            Mutation::JoinRequestRejected { .. } => "join_request_rejected",
            Mutation::ProfileUpdated { .. } => "profile_updated",
            Mutation::ProfileTagsUpdated { .. } => "profile_tags_updated",
        }
    }
}
