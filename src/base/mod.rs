//! Foundation types for the stubtype toolchain.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`FileId`], [`FileSet`] - File identifiers and path bookkeeping
//! - [`TextRange`], [`TextSize`] - Source positions
//! - [`LineCol`], [`LineIndex`] - Line/column conversion
//!
//! This module has NO dependencies on other stubtype modules.

mod file_id;
mod file_set;
mod span;

pub use file_id::FileId;
pub use file_set::{FileSet, SourceKind};
pub use span::{LineCol, LineIndex, TextRange, TextSize};

// Re-export text-size types for convenience
pub use text_size;
