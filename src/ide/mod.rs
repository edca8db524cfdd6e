//! IDE features: high-level APIs for editor and tool integrations.
//!
//! This module is the interface between the semantic model (HIR) and a
//! language server. Each query method on [`Analysis`] corresponds to one
//! client request.
//!
//! ## Design Principles
//!
//! 1. **Snapshots**: queries run against an immutable [`Analysis`]
//! 2. **No protocol types**: results are our own types, converted at the boundary
//! 3. **Composable**: built on top of HIR resolution
//!
//! ## Usage
//!
//! ```ignore
//! use stubtype::ide::AnalysisHost;
//!
//! let mut host = AnalysisHost::new();
//! host.set_file_content("types_stub.pyi", "MY_CONSTANT: int\n")?;
//! let file = host.set_file_content("usage.py", "from types_stub import MY_CONSTANT\n")?;
//!
//! let analysis = host.analysis();
//! let response = analysis.provide_type(file, &[LineCol::new(0, 25)]);
//! ```

mod analysis;
mod document;
mod inlay_hints;
mod provide_type;

pub use analysis::{Analysis, AnalysisHost};
pub use inlay_hints::{InlayHint, InlayHintKind};
pub use provide_type::{CacheInvalidated, Cancelled, ProvideTypeResponse, TypeDescriptor, TypeKind};
