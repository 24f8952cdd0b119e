use std::collections::BTreeSet;

use crate::reference::{MemberHandle, Reference};

/// Collects field references made from synthetic members and the static calls that
/// may reach them, so accessor indirection can be folded into direct field references.
///
/// One tracker is shared by a root type and all of its nested types.
#[derive(Debug, Default)]
pub(crate) struct FieldAccessTracker {
    fields: Vec<usize>,
    accessors: Vec<usize>,
}

/// Result of folding accessors: references to drop and the direct references replacing them.
#[derive(Debug, Default)]
pub(crate) struct Collapse {
    pub(crate) removed: BTreeSet<usize>,
    /// New references, each paired with the index of the accessor call it replaces.
    pub(crate) created: Vec<(usize, Reference)>,
}

impl FieldAccessTracker {
    /// Track a field reference whose source is synthetic.
    pub(crate) fn add_field(&mut self, index: usize) {
        self.fields.push(index);
    }

    /// Track a static call that may target an accessor.
    pub(crate) fn add_accessor(&mut self, index: usize) {
        self.accessors.push(index);
    }

    /// Forget references at or past `len`, after a nested type is abandoned.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.fields.retain(|&index| index < len);
        self.accessors.retain(|&index| index < len);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn collapse(&self, references: &[Reference]) -> Collapse {
        let mut collapse = Collapse::default();
        for &field_index in &self.fields {
            let field = &references[field_index];
            let calls: Vec<usize> = self
                .accessors
                .iter()
                .copied()
                .filter(|&call| calls_member(&references[call], field.source()))
                .collect();
            if calls.is_empty() {
                continue;
            }
            for call_index in calls {
                let call = &references[call_index];
                let mut direct = Reference::field_reference(
                    call.source().clone(),
                    field.referenced_type_name(),
                    field.referenced_member_name().unwrap_or_default(),
                    field.kind(),
                );
                direct.set_line_number(call.line_number());
                collapse.created.push((call_index, direct));
                collapse.removed.insert(call_index);
            }
            collapse.removed.insert(field_index);
        }
        collapse
    }
}

/// Whether a call reference targets the given member.
fn calls_member(call: &Reference, member: &MemberHandle) -> bool {
    match member {
        MemberHandle::Method {
            type_name,
            name,
            descriptor,
        } => {
            call.referenced_type_name() == type_name
                && call.referenced_member_name() == Some(name.as_str())
                && call.referenced_signature() == Some(descriptor.as_str())
        }
        MemberHandle::Field { type_name, name } => {
            call.referenced_type_name() == type_name
                && call.referenced_member_name() == Some(name.as_str())
        }
        MemberHandle::Type { .. } => false,
    }
}
