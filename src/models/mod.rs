//! Core data models for the document store.
//!
//! Documents serialize as plain JSON objects via `serde`; listings and
//! media descriptors are what the store hands back to callers.

pub mod document;
pub mod media;
pub mod object;
