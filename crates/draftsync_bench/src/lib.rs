//! Benchmark support for draftsync.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
