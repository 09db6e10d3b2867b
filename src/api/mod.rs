//! Client for the wiki's api.php endpoint
//!
//! This module contains everything that talks to the remote API:
//! - Deep-merging of paginated partial responses
//! - The request client with retry and continuation handling
//! - The connection governor that caps concurrent fetches

mod client;
mod governor;
mod merge;

pub use client::{ApiClient, Batch, Params};
pub use governor::ConnectionGovernor;
pub use merge::{merge_values, MergeError};

use thiserror::Error;
use url::Url;

/// One API endpoint plus its batching limits
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Base URL of the api.php script
    pub base_url: Url,

    /// Maximum items the server returns per call
    pub result_limit: u32,

    /// Maximum item identifiers a client may pack into one call;
    /// never larger than `result_limit`
    pub request_limit: u32,
}

/// Errors surfaced by a single logical API call
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport failure fetching {url} after retry: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("remote error {code}: {info}")]
    Remote { code: String, info: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl ApiError {
    /// A merge violation means a protocol assumption is broken and the whole
    /// crawl must stop. Everything else is a per-job failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Merge(_))
    }
}
