// src/services/mod.rs

//! Lookups and use cases behind the presentation handlers. Each service owns
//! handles to the storage ports it needs and is built once at startup.

pub mod answers;
pub mod attempts;
pub mod essays;
pub mod forms;
pub mod quiz_stats;
