// src/models/mod.rs

pub mod attempt;
pub mod essay;
pub mod form;
