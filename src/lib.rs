//! Client for a products REST API with an optimistic resource cache.
//!
//! Reads go through [`cache::ResourceCache`], which shares in-flight fetches
//! and serves stale data while a refetch is pending. Writes go through
//! [`mutation::MutationOrchestrator`], which applies their expected effect
//! to the cache before the server answers and rolls it back on failure.
//! [`products::ProductStore`] ties both to the products endpoint.

pub mod cache;
pub mod config;
pub mod logging;
pub mod mutation;
pub mod products;
pub mod remote;
