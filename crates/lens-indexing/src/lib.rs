//! Batch indexing for media-lens.
//!
//! Turns a loaded collection into a [`SessionEmbeddingIndex`], consulting the
//! embedding cache first and only extracting frames and running the model
//! for items that are missing or stale.
//!
//! ## Key Components
//!
//! - [`BatchIndexer`]: cache-first orchestration with bounded parallelism
//! - [`IndexingProgress`]: monotonic counters reported after every item
//! - [`ProgressCallback`] / [`ItemErrorCallback`]: caller-supplied sinks
//! - [`IndexingOutcome`]: the session index plus an [`AiStatus`]
//!
//! ## Failure model
//!
//! A single item's failure is reported through [`ItemErrorCallback`] and the
//! batch moves on. A model that never loads is reported once as
//! [`AiStatus::Disabled`]; the collection stays browsable.
//!
//! ## Example
//!
//! ```ignore
//! use lens_indexing::{BatchIndexer, LoggingProgressCallback};
//!
//! let indexer = BatchIndexer::new(cache, extractor, engine, settings.indexing)?;
//! let outcome = indexer
//!     .run(&items, &LoggingProgressCallback::new(25), &|item, err| eprintln!("{}: {}", item.path, err), &cancel)
//!     .await;
//! println!("{} embedded", outcome.index.len());
//! ```

pub mod error;
pub mod indexer;
pub mod progress;

pub use error::IndexingError;
pub use indexer::{AiStatus, BatchIndexer, IndexingOutcome};
pub use lens_types::SessionEmbeddingIndex;
pub use progress::{
    IndexingProgress, ItemErrorCallback, LoggingItemErrorCallback, LoggingProgressCallback,
    NoOpItemErrorCallback, NoOpProgressCallback, ProgressCallback,
};
pub use tokio_util::sync::CancellationToken;
