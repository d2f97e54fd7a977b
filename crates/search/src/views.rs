//! Model → protocol conversions.

use lens_frontend::{Diagnostic, SourceRange};
use lens_indexer::{Role, UnitEntry};
use lens_model::{DataItem, Edge, EdgeTarget, ProcedureKind, ProcedureNode, ProgramModel};
use lens_protocol::{
    DataItemView, DiagnosticView, EdgeView, Origin, RangeKey, ReferenceRole, SymbolKind,
};

pub(crate) fn range_key(range: &SourceRange) -> RangeKey {
    RangeKey::new(
        range.unit.to_string(),
        range.line,
        range.start_col,
        range.end_line,
        range.end_col,
    )
}

/// Original member and line for text that came in through COPY
pub(crate) fn origin(model: &ProgramModel, range: &SourceRange) -> Option<Origin> {
    let line = model.source.line(range.line)?;
    (line.depth > 0).then(|| Origin {
        file: line.origin.file.clone(),
        line: line.origin.line,
    })
}

pub(crate) fn node_id(unit: &str, key: &str) -> String {
    format!("{unit}/{key}")
}

pub(crate) const fn procedure_kind(kind: ProcedureKind) -> SymbolKind {
    match kind {
        ProcedureKind::Section => SymbolKind::Section,
        ProcedureKind::Paragraph => SymbolKind::Paragraph,
        ProcedureKind::InlinePerform => SymbolKind::InlinePerform,
    }
}

pub(crate) const fn item_kind(item: &DataItem) -> SymbolKind {
    if item.is_condition() {
        SymbolKind::ConditionName
    } else {
        SymbolKind::DataItem
    }
}

pub(crate) const fn reference_role(role: Role) -> ReferenceRole {
    match role {
        Role::Definition => ReferenceRole::Definition,
        Role::Read => ReferenceRole::Read,
        Role::Write => ReferenceRole::Write,
        Role::ReadWrite => ReferenceRole::ReadWrite,
        Role::Perform => ReferenceRole::Perform,
        Role::GoTo => ReferenceRole::GoTo,
        Role::Call => ReferenceRole::Call,
        Role::Clause => ReferenceRole::Clause,
    }
}

pub(crate) fn data_item(item: &DataItem) -> DataItemView {
    DataItemView {
        name: item.name.clone().unwrap_or_else(|| "FILLER".to_string()),
        qualified_name: item.qualified_name(),
        level: item.level,
        picture: item.picture.clone(),
        usage: item.usage.clone(),
        location: range_key(item.definition_range()),
    }
}

pub(crate) fn edge(entry: &UnitEntry, edge: &Edge) -> EdgeView {
    let unit = entry.unit_id();
    let to = match &edge.target {
        EdgeTarget::Resolved { key } => node_id(unit, key),
        other => other.label().to_string(),
    };
    let mut label = format!("{} {}", edge.kind.as_str(), edge.target);
    if let Some(thru) = &edge.thru {
        label.push_str(" thru ");
        label.push_str(&thru.to_string());
    }
    EdgeView {
        from: node_id(unit, &edge.from),
        to,
        kind: edge.kind.as_str().to_string(),
        resolved: edge.target.resolved_key().is_some(),
        label,
        location: range_key(&edge.range),
    }
}

pub(crate) fn diagnostic(model: &ProgramModel, diagnostic: &Diagnostic) -> DiagnosticView {
    DiagnosticView {
        unit: model.unit_id.to_string(),
        kind: diagnostic.kind.as_str().to_string(),
        severity: diagnostic.severity.as_str().to_string(),
        message: diagnostic.message.clone(),
        location: range_key(&diagnostic.range),
        origin: origin(model, &diagnostic.range),
    }
}

/// `SECTION::PARA` → the procedure label shown to users
pub(crate) fn procedure_label(node: &ProcedureNode) -> String {
    match node.kind {
        ProcedureKind::InlinePerform => node.key.clone(),
        _ => node.display_name().to_string(),
    }
}
