//! Inlay hints: inferred types after unannotated assignment targets.

use crate::hir::{RegistrySnapshot, Resolver, Type};

use super::document::Document;

/// Kind of inlay hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InlayHintKind {
    /// Type annotation hint (e.g., `: int`)
    Type,
    /// Parameter name hint (e.g., `x=`)
    Parameter,
}

/// An inlay hint to display in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct InlayHint {
    /// Line where the hint should appear (0-indexed)
    pub line: u32,
    /// Column where the hint should appear (0-indexed)
    pub col: u32,
    pub label: String,
    pub kind: InlayHintKind,
    pub padding_left: bool,
    pub padding_right: bool,
}

/// Type hints for every unannotated module-level assignment whose value
/// resolves.
///
/// Assignments resolving to `Unknown` get no hint; an editor showing
/// `: Unknown` everywhere is noise.
pub(crate) fn inlay_hints(document: &Document, snapshot: &RegistrySnapshot) -> Vec<InlayHint> {
    let resolver = Resolver::new(snapshot, &document.scope);

    document
        .scope
        .assignments()
        .filter_map(|assignment| {
            // Annotated targets already show their type.
            if assignment.annotation.is_some() {
                return None;
            }
            let ty = resolver.resolve(assignment.value.as_ref()?);
            if matches!(ty, Type::Unknown) {
                return None;
            }
            let position = document.line_index.line_col(assignment.range.end());
            Some(InlayHint {
                line: position.line,
                col: position.col,
                label: format!(": {ty}"),
                kind: InlayHintKind::Type,
                padding_left: false,
                padding_right: true,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::base::LineCol;
    use crate::ide::AnalysisHost;

    use super::*;

    #[test]
    fn test_hints_after_targets() {
        let mut host = AnalysisHost::new();
        host.set_file_content(
            "/w/lib.pyi",
            "class Widget:\n    def size(self) -> int: ...\n",
        )
        .unwrap();
        let file = host
            .set_file_content(
                "/w/app.py",
                "from lib import Widget\nw = Widget()\nn = w.size()\nmystery = nowhere\n\
                    k: int = 1\n",
            )
            .unwrap();

        let hints = host.analysis().inlay_hints(file);
        let labels: Vec<_> = hints
            .iter()
            .map(|h| (LineCol::new(h.line, h.col), h.label.as_str()))
            .collect();

        assert_eq!(
            labels,
            vec![(LineCol::new(1, 1), ": Widget"), (LineCol::new(2, 1), ": int")]
        );
        assert!(hints.iter().all(|h| h.kind == InlayHintKind::Type));
    }
}
