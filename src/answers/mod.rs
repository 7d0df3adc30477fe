// src/answers/mod.rs

//! Decoding, option reconstruction, classification and rendering of stored
//! quiz answers. Pure and infallible; storage access lives in `services`.

pub mod classify;
pub mod decode;
pub mod options;
pub mod php;
pub mod render;
pub mod value;

pub use classify::{AnswerKind, Classification, classify};
pub use decode::{DecodeFormat, Decoded, decode};
pub use options::{AnswerOption, extract_options};
pub use render::{DisplayMode, NO_ANSWER, render};
pub use value::Value;
