// Normalization pipeline: source spreadsheets in, interchange CSV out

pub mod normalize;
pub mod orchestrator;
pub mod projector;
pub mod sink;
pub mod source;

pub use orchestrator::{write_drop_log, DroppedRow, Normalized, Pipeline, PipelineReport};
pub use sink::{file_checksum, read_interchange, write_interchange};
pub use source::{Cell, RawRowSet, SourceReader};
