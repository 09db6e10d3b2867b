//! Crawl bookkeeping: work queues, deduplication, and job counters
//!
//! All mutation happens in the coordinator's event loop; this module keeps
//! the state transitions themselves free of I/O so they stay unit-testable.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

/// One unit of discovered work, identity-keyed for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkItem {
    /// A page to fetch by title (discovered templates)
    Title(String),

    /// A revision to fetch by id
    RevisionId(u64),

    /// An image to resolve via the image-info call
    Image(String),
}

/// Mutable state of one crawl, exclusively owned by the coordinator
///
/// The job counters are monotonic: `jobs_issued` increments before a fetch
/// starts and `jobs_completed` when it settles, success or failure. The
/// crawl is done exactly when the counters meet and every queue is empty.
#[derive(Debug, Default)]
pub struct CrawlState {
    /// Pending page titles (discovered templates)
    pub pages_todo: Vec<String>,

    /// Pending revision ids
    pub revids_todo: Vec<u64>,

    /// Pending image titles
    pub imageinfo_todo: Vec<String>,

    /// Everything ever enqueued; items enter once and never leave
    scheduled: HashSet<WorkItem>,

    /// title -> latest revision id, drives the edit-history pass
    pub title2latest: HashMap<String, u64>,

    /// Redirect mapping (from-title -> to-title)
    pub redirects: BTreeMap<String, String>,

    /// Accumulated edit-history records
    pub edits: Vec<Value>,

    /// (image title, local path) for downloaded images
    pub images: Vec<(String, PathBuf)>,

    /// Jobs issued so far
    pub jobs_issued: u64,

    /// Jobs settled so far, success or failure
    pub jobs_completed: u64,

    /// Subset of settled jobs that failed
    pub jobs_failed: u64,

    /// Revisions written through the sink
    pub pages_written: u64,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits seeds into sorted, deduplicated title and revision lists.
    pub fn split_seeds(seeds: &[(String, Option<u64>)]) -> (Vec<String>, Vec<u64>) {
        let mut titles = BTreeSet::new();
        let mut revids = BTreeSet::new();
        for (title, revision) in seeds {
            match revision {
                Some(id) => {
                    revids.insert(*id);
                }
                None => {
                    titles.insert(title.clone());
                }
            }
        }
        (titles.into_iter().collect(), revids.into_iter().collect())
    }

    /// Digests one discovery payload: records redirects and latest revision
    /// ids, and enqueues every reference not seen before.
    pub fn note_used(&mut self, data: &Value) {
        for entry in list_of(data.get("redirects")) {
            if let (Some(from), Some(to)) = (
                entry.get("from").and_then(Value::as_str),
                entry.get("to").and_then(Value::as_str),
            ) {
                self.redirects.insert(from.to_string(), to.to_string());
            }
        }

        let Some(pages) = data.get("pages").and_then(Value::as_object) else {
            return;
        };
        for page in pages.values() {
            let mut revids = Vec::new();
            for revision in list_of(page.get("revisions")) {
                if let Some(revid) = revision.get("revid").and_then(Value::as_u64) {
                    revids.push(revid);
                }
            }

            // Keep the maximum when a title shows up more than once.
            if let (Some(title), Some(latest)) = (
                page.get("title").and_then(Value::as_str),
                revids.iter().max().copied(),
            ) {
                let known = self.title2latest.entry(title.to_string()).or_insert(0);
                *known = (*known).max(latest);
            }

            for revid in revids {
                self.enqueue_revision(revid);
            }
            for image in titles_of(page.get("images")) {
                self.enqueue_image(image);
            }
            for template in titles_of(page.get("templates")) {
                self.enqueue_title(template);
            }
        }
    }

    /// Enqueues a template title unless already scheduled.
    pub fn enqueue_title(&mut self, title: String) {
        if self.scheduled.insert(WorkItem::Title(title.clone())) {
            self.pages_todo.push(title);
        }
    }

    /// Enqueues a revision id unless already scheduled.
    pub fn enqueue_revision(&mut self, revid: u64) {
        if self.scheduled.insert(WorkItem::RevisionId(revid)) {
            self.revids_todo.push(revid);
        }
    }

    /// Enqueues an image title unless already scheduled.
    pub fn enqueue_image(&mut self, title: String) {
        if self.scheduled.insert(WorkItem::Image(title.clone())) {
            self.imageinfo_todo.push(title);
        }
    }

    /// True once every queue has drained.
    pub fn queues_empty(&self) -> bool {
        self.pages_todo.is_empty() && self.revids_todo.is_empty() && self.imageinfo_todo.is_empty()
    }

    /// Jobs currently issued but not settled.
    pub fn jobs_in_flight(&self) -> u64 {
        self.jobs_issued - self.jobs_completed
    }
}

/// Pops up to `limit` items off the tail of a queue.
pub fn take_block<T>(queue: &mut Vec<T>, limit: usize) -> Vec<T> {
    let start = queue.len().saturating_sub(limit);
    queue.split_off(start)
}

fn list_of(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value.and_then(Value::as_array).into_iter().flatten()
}

/// Extracts the `title` member of each entry of an optional sequence.
fn titles_of(value: Option<&Value>) -> Vec<String> {
    list_of(value)
        .filter_map(|entry| entry.get("title").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}
