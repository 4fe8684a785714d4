//! Session persistence
//!
//! Components:
//! - `record`: the versioned wire format of a persisted session.
//! - `transport`: the byte-queue abstraction between producers and consumers.
//! - `worker_pool`: per-record task spawning, unbounded or capped.
//! - `pipeline`: producer queue, forwarder and consumer dispatcher.

pub mod pipeline;
pub mod record;
pub mod transport;
pub mod worker_pool;


pub use pipeline::{
    spawn_forwarder, start, Dispatcher, PersistTask, PersistencePipeline, PipelineHandle,
    PipelineStats,
};
pub use record::SessionRecord;
pub use transport::{MemoryTransport, QueueTransport};
pub use worker_pool::WorkerPool;
