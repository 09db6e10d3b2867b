//! Harvest module: crawl orchestration
//!
//! This module contains the dependency-expanding crawl engine:
//! - Work queues, deduplication, and job counters
//! - The coordinator running the discovery, dispatch, and edit-history
//!   passes until the crawl is quiescent

mod coordinator;
mod scheduler;

pub use coordinator::Harvester;
pub use scheduler::{take_block, CrawlState, WorkItem};

use crate::api::{ApiClient, ConnectionGovernor, Endpoint};
use crate::config::Config;
use crate::output::FsSink;
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;

/// Runs a complete harvest from a validated configuration
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Build the API client and connection governor
/// 2. Create the output directory tree
/// 3. Run the discovery, dispatch, and edit-history passes
/// 4. Hand all records to the filesystem sink
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Content hash recorded in the run summary
///
/// # Returns
///
/// * `Ok(CrawlState)` - The frozen state of the finished crawl
/// * `Err(HarvestError)` - Harvest failed
pub async fn run_harvest(config: Config, config_hash: String) -> Result<CrawlState, HarvestError> {
    let endpoint = Endpoint {
        base_url: url::Url::parse(&config.api.base_url)?,
        result_limit: config.api.result_limit,
        request_limit: config.api.request_limit,
    };
    let governor = Arc::new(ConnectionGovernor::new(
        config.harvester.max_connections as usize,
    ));
    let api = Arc::new(ApiClient::new(endpoint, governor)?);
    let sink = Box::new(FsSink::create(Path::new(&config.output.target_dir))?);

    let seeds: Vec<(String, Option<u64>)> = config
        .seeds
        .iter()
        .map(|seed| (seed.title.clone(), seed.revision))
        .collect();

    Harvester::new(api, sink, config_hash).run(&seeds).await
}
