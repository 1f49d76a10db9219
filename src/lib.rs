//! Caching layer for the StartupCoders platform.
//!
//! Expensive reads (startup listings, startup details, join-request checks,
//! user profiles, the tag list) go through a stale-while-revalidate
//! [`cache::Cache`]; writes invalidate the affected keys through
//! [`cache::Invalidator`] before they return.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
