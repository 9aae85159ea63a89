//! Data models

pub mod classification;

pub use classification::*;
