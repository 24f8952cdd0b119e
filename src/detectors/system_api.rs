use std::collections::BTreeMap;

use serde_sarif::sarif::Result as SarifResult;

use crate::analyzer::{DetectorMetadata, ProblemDetector};
use crate::detectors::{checked_kinds, problem, target_text};
use crate::reference::{MemberHandle, Reference, ReferenceKinds};
use crate::resolver::resolve_in_environment;
use crate::universe::{ClassUniverse, TypeUniverse};

/// Detector that checks references against the stubs of a minimum execution environment.
///
/// Only types the stubs define are checked: a reference to such a type that names a
/// member the environment lacks would fail at run time there.
pub struct SystemApiDetector {
    stubs: ClassUniverse,
    unavailable: BTreeMap<(String, MemberHandle), Reference>,
}

impl SystemApiDetector {
    pub fn new(stubs: ClassUniverse) -> Self {
        Self {
            stubs,
            unavailable: BTreeMap::new(),
        }
    }
}

impl ProblemDetector for SystemApiDetector {
    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            id: "SYSTEM_API",
            name: "Unavailable system API",
            description: "Members used from system types that the minimum execution environment does not provide",
        }
    }

    fn reference_kinds(&self) -> ReferenceKinds {
        checked_kinds()
    }

    fn consider_reference(&mut self, reference: &Reference) {
        if resolve_in_environment(reference, Some(&self.stubs as &dyn TypeUniverse)) {
            return;
        }
        self.unavailable
            .entry((target_text(reference), reference.source().clone()))
            .or_insert_with(|| reference.clone());
    }

    fn create_problems(&self) -> Vec<SarifResult> {
        let metadata = self.metadata();
        self.unavailable
            .iter()
            .map(|((target, _), reference)| {
                problem(
                    &metadata,
                    reference,
                    format!("Not available in the execution environment: {target}"),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceKind;
    use crate::universe::testing::{class, field, method};

    fn stubs() -> ClassUniverse {
        let mut string = class("java/lang/String", Some("java/lang/Object"));
        string.methods.push(method("length", "()I"));
        let mut system = class("java/lang/System", Some("java/lang/Object"));
        system.fields.push(field("out", "Ljava/io/PrintStream;"));
        ClassUniverse::new(vec![class("java/lang/Object", None), string, system])
    }

    fn call(owner: &str, name: &str, descriptor: &str) -> Reference {
        Reference::method_reference(
            MemberHandle::method("app.Main", "run", "()V"),
            owner,
            name,
            descriptor,
            ReferenceKind::VirtualCall,
            0,
        )
    }

    fn messages(detector: &SystemApiDetector) -> Vec<String> {
        detector
            .create_problems()
            .iter()
            .map(|result| result.message.text.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn system_api_detector_reports_member_missing_from_stub() {
        let mut detector = SystemApiDetector::new(stubs());

        detector.consider_reference(&call("java.lang.String", "isBlank", "()Z"));
        detector.consider_reference(&call("java.lang.String", "length", "()I"));

        assert_eq!(
            messages(&detector),
            vec![
                "Not available in the execution environment: java.lang.String#isBlank()Z"
                    .to_string()
            ]
        );
    }

    #[test]
    fn system_api_detector_ignores_types_outside_the_environment() {
        let mut detector = SystemApiDetector::new(stubs());

        detector.consider_reference(&call("com.example.Widget", "paint", "()V"));
        detector.consider_reference(&Reference::type_reference(
            MemberHandle::method("app.Main", "run", "()V"),
            "java.lang.String",
            ReferenceKind::Instantiate,
        ));
        detector.consider_reference(&Reference::field_reference(
            MemberHandle::method("app.Main", "run", "()V"),
            "java.lang.System",
            "out",
            ReferenceKind::GetStaticField,
        ));

        assert!(messages(&detector).is_empty());
    }
}
