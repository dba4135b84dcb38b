//! Build and query orchestration for fleetsql.
//!
//! This crate ties the document provider and the storage layer together:
//! processor flattening, relational projection, transactional package writes,
//! the background store build, and the read-only query surface.

pub mod build;
pub mod ecs;
pub mod flatten;
pub mod projector;
pub mod query;
pub mod writer;

pub use build::{
    BuildPhase, BuildProgress, SilentProgress, StoreHandle, StorePublisher, build_store,
    dictionary_for, spawn_build, staging_path, store_channel,
};
pub use ecs::{EcsDictionary, ExternalField, FieldDictionary, NoDictionary};
pub use flatten::{FlatProcessor, flatten_processors};
pub use query::{NOT_READY_MESSAGE, QueryOutcome, QuerySurface};
pub use writer::write_package;
