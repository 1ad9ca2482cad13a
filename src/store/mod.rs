//! Durable storage for accumulated notes, tags, thoughts and outputs.

pub mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::{SqliteStore, open_pool};
pub use traits::{MessageStore, TagStore, ThoughtStore};
pub use types::{
    AccumulatedMessage, DeleteRange, NewMessage, NewOutput, NewThought, OutputRecord,
    RecordWithOutputs, Tag, ThoughtRecord, TimeBound,
};
