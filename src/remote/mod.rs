//! Remote resource client: pure request/response CRUD over REST.

mod client;
mod error;
mod retry;

pub use client::{Deleted, HttpResourceClient, RemoteResource};
pub use error::{ClientError, ClientResult};
pub use retry::RetryPolicy;
