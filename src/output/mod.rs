//! Result reporting
//!
//! The bare result goes to stdout; summaries and JSON reports are extras.

pub mod json;
pub mod text;
