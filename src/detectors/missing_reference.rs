use std::collections::BTreeMap;
use std::sync::Arc;

use serde_sarif::sarif::Result as SarifResult;

use crate::analyzer::{DetectorMetadata, ProblemDetector};
use crate::detectors::{checked_kinds, problem, target_text};
use crate::reference::{MemberHandle, Reference, ReferenceKinds, ReferenceType};
use crate::universe::TypeUniverse;

/// Detector that reports references the type universe cannot satisfy.
///
/// A missing owner type is reported once per type; a missing member once per
/// member and calling site.
pub struct MissingReferenceDetector {
    universe: Arc<dyn TypeUniverse>,
    missing_types: BTreeMap<String, Reference>,
    missing_members: BTreeMap<(String, MemberHandle), Reference>,
}

impl MissingReferenceDetector {
    pub fn new(universe: Arc<dyn TypeUniverse>) -> Self {
        Self {
            universe,
            missing_types: BTreeMap::new(),
            missing_members: BTreeMap::new(),
        }
    }
}

impl ProblemDetector for MissingReferenceDetector {
    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            id: "MISSING_REFERENCE",
            name: "Missing reference",
            description: "References to types or members absent from the analyzed classpath",
        }
    }

    fn reference_kinds(&self) -> ReferenceKinds {
        checked_kinds()
    }

    fn consider_reference(&mut self, reference: &Reference) {
        if !reference.resolve_attempted() || reference.is_resolved() {
            return;
        }
        let owner = reference.referenced_type_name();
        if self.universe.lookup(owner).is_none() {
            self.missing_types
                .entry(owner.to_string())
                .or_insert_with(|| reference.clone());
            return;
        }
        self.missing_members
            .entry((target_text(reference), reference.source().clone()))
            .or_insert_with(|| reference.clone());
    }

    fn create_problems(&self) -> Vec<SarifResult> {
        let metadata = self.metadata();
        let types = self.missing_types.iter().map(|(owner, reference)| {
            problem(&metadata, reference, format!("Type not found: {owner}"))
        });
        let members = self.missing_members.iter().map(|((target, _), reference)| {
            let element = match reference.reference_type() {
                ReferenceType::Field => "Field",
                ReferenceType::Method => "Method",
                ReferenceType::Type => "Type",
            };
            problem(&metadata, reference, format!("{element} not found: {target}"))
        });
        types.chain(members).collect()
    }
}
