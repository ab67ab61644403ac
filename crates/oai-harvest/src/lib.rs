//! Stacks Harvest -- incremental OAI-PMH harvesting into per-record files.
//!
//! Each configured target is harvested into its own directory. Records are
//! written as `<timestamp>_<id>.xml`, deletions as `<timestamp>_<id>.delete`,
//! and `last_harvest.txt` holds the newest datestamp seen so the next run
//! can ask only for changes.

pub mod client;
pub mod harvester;
pub mod response;

pub use harvester::{HarvestSummary, Harvester};
