//! Application services: cached reads and invalidating writes.

pub mod error;
pub mod profiles;
pub mod repos;
pub mod startups;
