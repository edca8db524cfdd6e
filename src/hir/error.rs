//! Errors raised while building declaration tables.

use smol_str::SmolStr;
use thiserror::Error;

use super::ids::ModuleName;
use crate::base::TextRange;

/// Structurally invalid builder input. The build fails as a whole; no partial
/// table is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("malformed declaration in module '{module}': {message}")]
    Malformed {
        module: ModuleName,
        message: SmolStr,
        range: TextRange,
    },

    #[error("invalid identifier '{name}' in module '{module}'")]
    InvalidName {
        module: ModuleName,
        name: SmolStr,
        range: TextRange,
    },
}

impl BuildError {
    pub fn module(&self) -> &ModuleName {
        match self {
            BuildError::Malformed { module, .. } | BuildError::InvalidName { module, .. } => {
                module
            }
        }
    }

    pub fn range(&self) -> TextRange {
        match self {
            BuildError::Malformed { range, .. } | BuildError::InvalidName { range, .. } => *range,
        }
    }
}
