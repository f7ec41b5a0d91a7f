pub mod observability;
pub mod streaming;

pub use streaming::{
    create_store, decode_line, LineProcessor, ObjectStore, RunSummary, StreamBufferManager,
    TargetConfig, TargetError,
};
