//! The type query service: `(document, position) -> TypeDescriptor`.
//!
//! Descriptors are the rendering-ready result of a query. They distinguish
//! "nothing under the cursor" (`resolved: false`) from "resolved to no useful
//! type" (`resolved: true`, kind `Unknown`, with the reason attached).

use std::path::PathBuf;

use crate::base::{FileId, TextSize};
use crate::hir::{Resolver, Type, Unresolved};
use crate::syntax::NodeAt;

use super::document::Document;

/// The kind of a resolved type, as reported to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    Class,
    Function,
    Instance,
    Scalar,
    Module,
    Unknown,
}

/// The externally consumable summary of a query result.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct TypeDescriptor {
    /// False when the position holds no queryable node or the document is
    /// not tracked.
    pub resolved: bool,
    pub kind: Option<TypeKind>,
    pub display_name: String,
    pub origin_module: Option<String>,
    pub qualified_name: Option<String>,
    pub unresolved_reason: Option<String>,
}

impl TypeDescriptor {
    /// No node under the cursor.
    pub fn no_node() -> Self {
        Self {
            resolved: false,
            kind: None,
            display_name: String::new(),
            origin_module: None,
            qualified_name: None,
            unresolved_reason: None,
        }
    }

    /// Resolution ran and failed for `reason`.
    pub fn unknown(reason: &Unresolved) -> Self {
        Self {
            resolved: true,
            kind: Some(TypeKind::Unknown),
            display_name: Type::Unknown.to_string(),
            origin_module: None,
            qualified_name: None,
            unresolved_reason: Some(reason.to_string()),
        }
    }

    pub fn from_type(ty: &Type) -> Self {
        let kind = match ty {
            Type::Class(_) => TypeKind::Class,
            Type::Function(_) => TypeKind::Function,
            Type::Instance(_) => TypeKind::Instance,
            Type::Scalar(_) => TypeKind::Scalar,
            Type::Module(_) => TypeKind::Module,
            Type::Unknown => TypeKind::Unknown,
        };
        Self {
            resolved: true,
            kind: Some(kind),
            display_name: ty.to_string(),
            origin_module: ty.origin_module().map(|m| m.to_string()),
            qualified_name: ty.qualified_name(),
            unresolved_reason: None,
        }
    }

    pub fn from_result(result: Result<Type, Unresolved>) -> Self {
        match result {
            Ok(ty) => Self::from_type(&ty),
            Err(reason) => Self::unknown(&reason),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == Some(TypeKind::Unknown)
    }
}

/// One descriptor per requested position, in request order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct ProvideTypeResponse {
    pub contents: Vec<TypeDescriptor>,
}

/// Files whose query results may have changed since the last notification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct CacheInvalidated {
    pub invalidated_files: Vec<PathBuf>,
}

impl CacheInvalidated {
    pub fn is_empty(&self) -> bool {
        self.invalidated_files.is_empty()
    }
}

/// A batch query was abandoned because its token was cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("type query for file {file} was cancelled")]
pub struct Cancelled {
    pub file: FileId,
}

/// Resolve whatever sits at `offset` in `document`.
pub(crate) fn type_at(
    document: &Document,
    snapshot: &crate::hir::RegistrySnapshot,
    offset: TextSize,
) -> TypeDescriptor {
    let Some(node) = document.parse.file.node_at(offset) else {
        return TypeDescriptor::no_node();
    };

    let resolver = Resolver::new(snapshot, &document.scope);
    let result = match node {
        NodeAt::Expr(expr) => resolver.try_resolve(expr),
        // A binding has the type a reference right after its statement sees.
        NodeAt::Binding {
            name, visible_from, ..
        } => resolver.resolve_name(name, visible_from),
    };
    TypeDescriptor::from_result(result)
}
