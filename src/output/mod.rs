//! Output sinks for harvested records
//!
//! The crawl engine ends at "raw structured records have been fetched";
//! everything here is about persisting those records.

mod fs_sink;
mod traits;

pub use fs_sink::FsSink;
pub use traits::{HarvestSummary, Sink, SinkError, SinkResult};
