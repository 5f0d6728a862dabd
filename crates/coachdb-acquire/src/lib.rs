//! Cache-first profile acquisition on top of a store and a scraping
//! provider.

pub mod bulk;
pub mod cache;
pub mod dedup;
pub mod error;
pub mod orchestrator;
pub mod store;

pub use bulk::BulkResultCache;
pub use cache::{CacheGateway, CacheLookup, MissReason};
pub use dedup::{merge_unique, ProfileSet};
pub use error::{AcquireError, StoreError};
pub use orchestrator::{
    AcquireSettings, Acquisition, AcquisitionSource, BatchOutcome, BulkPoll, BulkTrigger,
    FailedAcquisition, Orchestrator, NOT_FOUND_MESSAGE,
};
pub use store::{DrainedJob, MemoryProfileStore, PgProfileStore, ProfileFilter, ProfileStore};
