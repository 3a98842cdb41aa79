//! Thin client for the external user registry.
//!
//! Registration is best-effort: the advisor keeps working when the registry is
//! unreachable or not configured.

pub mod client;

pub use client::{RegisteredUser, UpsertUserRequest, UpsertUserResponse, UserRegistryClient};
