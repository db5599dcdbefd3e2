//! Graph model for the Qualys connector.
//!
//! Qualys records are converted into [`Entity`] and [`Relationship`] values
//! and collected in a [`JobState`] sink, which [`InMemoryJobState`] writes
//! out as `entities.json` and `relationships.json`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod converters;
mod entity;
mod job_state;

pub use converters::ServiceKind;
pub use entity::{Entity, Relationship, RelationshipClass};
pub use job_state::{InMemoryJobState, JobState};
