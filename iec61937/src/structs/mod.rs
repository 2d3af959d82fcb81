//! Syncframe headers of the supported codecs.
//!
//! Each parser is a pure function over a byte buffer that validates the sync
//! pattern and extracts the fields needed to size and label a burst.

pub mod a52;
pub mod dts;
pub mod frame;
pub mod mlp;
