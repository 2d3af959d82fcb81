//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream reading, DTS word repacking and error handling
//! for header parsing and burst construction.

pub mod bitstream_io;
pub mod convert;
pub mod errors;
