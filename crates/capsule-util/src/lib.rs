#![forbid(unsafe_code)]
//! Glob patterns, path resolution, and read-only filesystem helpers for Capsule.

pub mod error;
pub mod fs;
pub mod pattern;
pub mod resolve;

pub use pattern::GlobPattern;
pub use resolve::resolve_paths;
