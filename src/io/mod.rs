//! File access helpers: extension-driven compression and atomic replacement.

mod atomic;
mod compression;

pub use atomic::atomic_rewrite;
pub use compression::{open_with_auto_compression, CompressedWriter, Compression};
