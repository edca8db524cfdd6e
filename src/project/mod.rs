//! Project loading: turning directories of stubs into loaded modules.

mod loader;

pub use loader::{LoadError, LoadSummary, StubLoader};
