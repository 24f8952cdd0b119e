use serde_sarif::sarif::{
    Location, LogicalLocation, Message, MultiformatMessageString, ReportingDescriptor,
    Result as SarifResult,
};

use crate::analyzer::DetectorMetadata;
use crate::reference::{MemberHandle, Reference, ReferenceKind, ReferenceKinds};

pub mod missing_reference;
pub mod system_api;

pub use missing_reference::MissingReferenceDetector;
pub use system_api::SystemApiDetector;

/// Kinds worth checking for availability. Overrides of a method the super type lacks
/// are ordinary new methods, and class names found in string constants are only guesses.
pub(crate) fn checked_kinds() -> ReferenceKinds {
    ReferenceKinds::ALL
        .without(ReferenceKind::Override)
        .without(ReferenceKind::ConstantPoolUse)
}

pub(crate) fn member_location(member: &MemberHandle) -> Location {
    let logical = member_logical_location(member);
    Location::builder().logical_locations(vec![logical]).build()
}

pub(crate) fn member_logical_location(member: &MemberHandle) -> LogicalLocation {
    match member {
        MemberHandle::Type { name } => LogicalLocation::builder().name(name).kind("type").build(),
        MemberHandle::Field { type_name, name } => LogicalLocation::builder()
            .name(format!("{type_name}.{name}"))
            .kind("member")
            .build(),
        MemberHandle::Method {
            type_name,
            name,
            descriptor,
        } => LogicalLocation::builder()
            .name(format!("{type_name}.{name}{descriptor}"))
            .kind("function")
            .build(),
    }
}

pub(crate) fn result_message(text: impl Into<String>) -> Message {
    Message::builder().text(text.into()).build()
}

/// Target of a reference as written at the use site, e.g. `a.B#m(I)V`.
pub(crate) fn target_text(reference: &Reference) -> String {
    let mut text = reference.referenced_type_name().to_string();
    if let Some(member) = reference.referenced_member_name() {
        text.push('#');
        text.push_str(member);
        if let Some(descriptor) = reference.referenced_signature() {
            text.push_str(descriptor);
        }
    }
    text
}

pub(crate) fn problem(
    metadata: &DetectorMetadata,
    reference: &Reference,
    text: String,
) -> SarifResult {
    let text = if reference.line_number() >= 0 {
        format!("{text} (line {})", reference.line_number())
    } else {
        text
    };
    SarifResult::builder()
        .rule_id(metadata.id)
        .message(result_message(text))
        .locations(vec![member_location(reference.source())])
        .build()
}

/// SARIF rule entry describing a detector.
pub fn reporting_descriptor(metadata: &DetectorMetadata) -> ReportingDescriptor {
    ReportingDescriptor::builder()
        .id(metadata.id)
        .name(metadata.name)
        .short_description(
            MultiformatMessageString::builder()
                .text(metadata.description)
                .build(),
        )
        .build()
}
