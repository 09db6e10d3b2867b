//! Harvest coordinator - crawl orchestration
//!
//! This module runs the three-pass harvest protocol:
//! - Discovery pass: batched metadata fetches over the seeds, learning
//!   which revisions, templates and images each page references
//! - Dispatch pass: drains the discovered work queues under the connection
//!   cap, images before revisions before titles
//! - Edit-history pass: once discovery has fully drained, one history
//!   fetch per title seeded at its latest revision
//!
//! Fetches run as spawned tasks. Every task reports exactly one completion
//! event over a channel, and the receive loop below is the only place crawl
//! state is mutated, so no locking is needed around it.

use crate::api::{ApiClient, ApiError, Batch};
use crate::harvest::scheduler::{take_block, CrawlState};
use crate::output::{HarvestSummary, Sink};
use crate::HarvestError;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Completion event of one fetch job
enum JobOutcome {
    SiteInfo(Result<Value, ApiError>),
    Used(Result<Value, ApiError>),
    Pages(Result<Value, ApiError>),
    ImageInfo(Result<Value, ApiError>),
    ImageBytes {
        title: String,
        result: Result<Vec<u8>, ApiError>,
    },
    Edits {
        title: String,
        result: Result<Value, ApiError>,
    },
}

/// Main harvest coordinator structure
pub struct Harvester {
    api: Arc<ApiClient>,
    sink: Box<dyn Sink>,
    state: CrawlState,
    events_tx: mpsc::UnboundedSender<JobOutcome>,
    events_rx: mpsc::UnboundedReceiver<JobOutcome>,
    /// Outstanding discovery jobs; the edit-history pass starts when this
    /// drains to zero.
    used_pending: usize,
    started_at: chrono::DateTime<chrono::Utc>,
    config_hash: String,
}

impl Harvester {
    pub fn new(api: Arc<ApiClient>, sink: Box<dyn Sink>, config_hash: String) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            sink,
            state: CrawlState::new(),
            events_tx,
            events_rx,
            used_pending: 0,
            started_at: chrono::Utc::now(),
            config_hash,
        }
    }

    /// Runs a crawl over the given seeds to completion and returns the
    /// final state after handing all records to the sink.
    ///
    /// Per-job failures are logged and dropped; the crawl itself only fails
    /// on a merge contract violation or a sink error.
    pub async fn run(
        mut self,
        seeds: &[(String, Option<u64>)],
    ) -> Result<CrawlState, HarvestError> {
        self.seed(seeds);
        self.dispatch();

        while let Some(outcome) = self.events_rx.recv().await {
            self.state.jobs_completed += 1;
            self.handle(outcome)?;
            self.dispatch();
            if self.quiescent() {
                break;
            }
        }

        self.finish()
    }

    /// Phase 1: site metadata plus batched discovery over the seeds.
    fn seed(&mut self, seeds: &[(String, Option<u64>)]) {
        let api = self.api.clone();
        self.spawn_job(async move { JobOutcome::SiteInfo(api.get_siteinfo().await) });

        let (titles, revids) = CrawlState::split_seeds(seeds);
        let limit = self.api.endpoint().request_limit as usize;

        tracing::info!(
            titles = titles.len(),
            revids = revids.len(),
            "seeding discovery pass"
        );

        for block in titles.chunks(limit) {
            self.spawn_used_job(Batch::Titles(block.to_vec()));
        }
        for block in revids.chunks(limit) {
            self.spawn_used_job(Batch::RevisionIds(block.to_vec()));
        }
    }

    fn spawn_used_job(&mut self, batch: Batch) {
        self.used_pending += 1;
        let api = self.api.clone();
        self.spawn_job(async move { JobOutcome::Used(api.fetch_used(&batch).await) });
    }

    /// Issues one fetch job. The counter increments before the fetch starts
    /// so quiescence detection can never observe a false zero mid-crawl.
    fn spawn_job<F>(&mut self, job: F)
    where
        F: Future<Output = JobOutcome> + Send + 'static,
    {
        self.state.jobs_issued += 1;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(job.await);
        });
    }

    /// Phase 2: issue fetches while idle capacity remains, draining images
    /// first, then revisions, then titles.
    fn dispatch(&mut self) {
        let limit = self.api.endpoint().request_limit as usize;

        while self.idle() && !self.state.imageinfo_todo.is_empty() {
            let block = take_block(&mut self.state.imageinfo_todo, limit);
            let api = self.api.clone();
            self.spawn_job(async move { JobOutcome::ImageInfo(api.fetch_imageinfo(&block).await) });
        }

        while self.idle() && !self.state.revids_todo.is_empty() {
            let block = take_block(&mut self.state.revids_todo, limit);
            let api = self.api.clone();
            self.spawn_job(async move {
                JobOutcome::Pages(api.fetch_pages(&Batch::RevisionIds(block)).await)
            });
        }

        while self.idle() && !self.state.pages_todo.is_empty() {
            let block = take_block(&mut self.state.pages_todo, limit);
            let api = self.api.clone();
            self.spawn_job(async move {
                JobOutcome::Pages(api.fetch_pages(&Batch::Titles(block)).await)
            });
        }

        tracing::debug!(
            done = self.state.jobs_completed,
            issued = self.state.jobs_issued,
            capacity = self.api.governor().max_connections(),
            "dispatch pass"
        );
    }

    fn idle(&self) -> bool {
        self.state.jobs_in_flight() < self.api.governor().max_connections() as u64
    }

    /// Done: every issued job has settled and no work remains queued.
    fn quiescent(&self) -> bool {
        self.state.jobs_in_flight() == 0 && self.state.queues_empty()
    }

    /// Routes one settled job to its consumer.
    fn handle(&mut self, outcome: JobOutcome) -> Result<(), HarvestError> {
        match outcome {
            JobOutcome::SiteInfo(result) => {
                if let Some(data) = self.settle("siteinfo", result)? {
                    self.sink.write_siteinfo(&data)?;
                }
            }
            JobOutcome::Used(result) => {
                if let Some(data) = self.settle("discovery", result)? {
                    self.state.note_used(&data);
                }
                self.used_pending -= 1;
                if self.used_pending == 0 {
                    self.issue_edit_jobs();
                }
            }
            JobOutcome::Pages(result) => {
                if let Some(data) = self.settle("pages", result)? {
                    self.state.pages_written += self.sink.write_pages(&data)?;
                }
            }
            JobOutcome::ImageInfo(result) => {
                if let Some(data) = self.settle("imageinfo", result)? {
                    self.issue_image_downloads(&data);
                }
            }
            JobOutcome::ImageBytes { title, result } => match result {
                Ok(bytes) => {
                    let path = self.sink.write_image(&title, &bytes)?;
                    self.state.images.push((title, path));
                }
                Err(error) => {
                    self.state.jobs_failed += 1;
                    tracing::warn!(title, %error, "image download failed, dropping it");
                }
            },
            JobOutcome::Edits { title, result } => {
                if let Some(data) = self.settle(&title, result)? {
                    if let Some(pages) = data.get("pages").and_then(Value::as_object) {
                        self.state.edits.extend(pages.values().cloned());
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies the per-job failure policy: a merge contract violation
    /// aborts the crawl, anything else is logged and dropped so quiescence
    /// detection stays correct.
    fn settle(
        &mut self,
        what: &str,
        result: Result<Value, ApiError>,
    ) -> Result<Option<Value>, HarvestError> {
        match result {
            Ok(data) => Ok(Some(data)),
            Err(error) if error.is_fatal() => {
                tracing::error!(job = what, %error, "protocol contract violated, aborting");
                Err(error.into())
            }
            Err(error) => {
                self.state.jobs_failed += 1;
                tracing::warn!(job = what, %error, "job failed, dropping its items");
                Ok(None)
            }
        }
    }

    /// Phase 3: one edit-history fetch per title, seeded at its latest
    /// revision. The map is cleared so this pass runs exactly once.
    fn issue_edit_jobs(&mut self) {
        let title2latest = std::mem::take(&mut self.state.title2latest);
        tracing::info!(
            titles = title2latest.len(),
            "discovery drained, fetching edit histories"
        );
        for (title, revision) in title2latest {
            let api = self.api.clone();
            self.spawn_job(async move {
                let result = api.get_edits(&title, Some(revision)).await;
                JobOutcome::Edits { title, result }
            });
        }
    }

    /// Starts one byte download per resolved image URL. Downloads run
    /// through the connection governor like every other fetch.
    fn issue_image_downloads(&mut self, data: &Value) {
        let Some(pages) = data.get("pages").and_then(Value::as_object) else {
            return;
        };
        for page in pages.values() {
            let Some(title) = page.get("title").and_then(Value::as_str) else {
                continue;
            };
            let url = page
                .get("imageinfo")
                .and_then(Value::as_array)
                .and_then(|infos| infos.first())
                .and_then(|info| {
                    info.get("thumburl")
                        .or_else(|| info.get("url"))
                        .and_then(Value::as_str)
                });
            let Some(url) = url else {
                tracing::debug!(title, "image has no resolvable url");
                continue;
            };

            let api = self.api.clone();
            let title = title.to_string();
            let url = url.to_string();
            self.spawn_job(async move {
                let result = api.download(&url).await;
                JobOutcome::ImageBytes { title, result }
            });
        }
    }

    /// Hands the accumulated records to the sink and returns the frozen
    /// state.
    fn finish(mut self) -> Result<CrawlState, HarvestError> {
        self.sink.write_edits(&self.state.edits)?;
        self.sink.write_redirects(&self.state.redirects)?;

        let summary = HarvestSummary {
            started_at: self.started_at.to_rfc3339(),
            finished_at: chrono::Utc::now().to_rfc3339(),
            config_hash: self.config_hash,
            jobs_issued: self.state.jobs_issued,
            jobs_completed: self.state.jobs_completed,
            jobs_failed: self.state.jobs_failed,
            pages_written: self.state.pages_written,
            images_downloaded: self.state.images.len() as u64,
            edit_histories: self.state.edits.len() as u64,
            redirects: self.state.redirects.len() as u64,
        };
        self.sink.write_summary(&summary)?;

        tracing::info!(
            jobs = self.state.jobs_completed,
            failed = self.state.jobs_failed,
            pages = self.state.pages_written,
            images = self.state.images.len(),
            "harvest complete"
        );
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ConnectionGovernor, Endpoint};
    use crate::output::SinkResult;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    struct NullSink;

    impl Sink for NullSink {
        fn write_siteinfo(&mut self, _siteinfo: &Value) -> SinkResult<()> {
            Ok(())
        }
        fn write_pages(&mut self, _data: &Value) -> SinkResult<u64> {
            Ok(0)
        }
        fn write_edits(&mut self, _edits: &[Value]) -> SinkResult<()> {
            Ok(())
        }
        fn write_redirects(&mut self, _redirects: &BTreeMap<String, String>) -> SinkResult<()> {
            Ok(())
        }
        fn write_image(&mut self, title: &str, _bytes: &[u8]) -> SinkResult<PathBuf> {
            Ok(PathBuf::from(title))
        }
        fn write_summary(&mut self, _summary: &HarvestSummary) -> SinkResult<()> {
            Ok(())
        }
    }

    fn test_harvester(max_connections: usize) -> Harvester {
        let endpoint = Endpoint {
            base_url: url::Url::parse("http://wiki.test/w/api.php").unwrap(),
            result_limit: 500,
            request_limit: 20,
        };
        let governor = Arc::new(ConnectionGovernor::new(max_connections));
        let api = Arc::new(ApiClient::new(endpoint, governor).unwrap());
        Harvester::new(api, Box::new(NullSink), String::new())
    }

    #[tokio::test]
    async fn test_idle_tracks_in_flight_jobs() {
        let mut harvester = test_harvester(2);
        assert!(harvester.idle());

        harvester.state.jobs_issued = 2;
        assert!(!harvester.idle());

        harvester.state.jobs_completed = 1;
        assert!(harvester.idle());
    }

    #[tokio::test]
    async fn test_quiescent_requires_empty_queues() {
        let mut harvester = test_harvester(2);
        assert!(harvester.quiescent());

        harvester.state.enqueue_title("Template:Infobox".to_string());
        assert!(!harvester.quiescent());
    }

    #[tokio::test]
    async fn test_per_job_failure_is_swallowed_and_counted() {
        let mut harvester = test_harvester(2);
        let result = harvester.settle(
            "pages",
            Err(ApiError::Remote {
                code: "maxlag".to_string(),
                info: "server busy".to_string(),
            }),
        );
        assert!(matches!(result, Ok(None)));
        assert_eq!(harvester.state.jobs_failed, 1);
    }

    #[tokio::test]
    async fn test_merge_violation_is_fatal() {
        use crate::api::MergeError;
        let mut harvester = test_harvester(2);
        let result = harvester.settle(
            "pages",
            Err(ApiError::Merge(MergeError::ShapeMismatch {
                expected: "mapping",
                found: "sequence",
            })),
        );
        assert!(result.is_err());
    }
}
