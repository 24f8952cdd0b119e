use serde_sarif::sarif::Result as SarifResult;
use tracing::{debug, info};

use crate::reference::{Reference, ReferenceKinds};
use crate::resolver::resolve;
use crate::universe::TypeUniverse;

pub use crate::resolver::{BatchOutcome, Cancellation};

/// One slot per bit a reference kind can occupy.
const BUCKETS: usize = 32;

/// Metadata describing a problem detector.
#[derive(Clone, Debug)]
pub struct DetectorMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Consumer of resolved references.
pub trait ProblemDetector {
    fn metadata(&self) -> DetectorMetadata;

    /// Reference kinds this detector wants to see.
    fn reference_kinds(&self) -> ReferenceKinds;

    fn consider_reference(&mut self, reference: &Reference);

    fn create_problems(&self) -> Vec<SarifResult>;
}

/// Routes each reference to the detectors registered for its kind.
///
/// Detectors are indexed by kind bit position, so delivering a reference is one
/// bucket lookup no matter how many detectors are registered.
pub struct ReferenceAnalyzer {
    detectors: Vec<Box<dyn ProblemDetector>>,
    index: [Vec<usize>; BUCKETS],
    kinds: ReferenceKinds,
}

impl Default for ReferenceAnalyzer {
    fn default() -> Self {
        Self {
            detectors: Vec::new(),
            index: std::array::from_fn(|_| Vec::new()),
            kinds: ReferenceKinds::NONE,
        }
    }
}

impl ReferenceAnalyzer {
    /// Build an analyzer, registering each detector for the kinds it declares.
    pub fn new(detectors: Vec<Box<dyn ProblemDetector>>) -> Self {
        let mut analyzer = Self::default();
        for detector in detectors {
            let kinds = detector.reference_kinds();
            analyzer.register(detector, kinds);
        }
        analyzer
    }

    pub fn register(&mut self, detector: Box<dyn ProblemDetector>, kinds: ReferenceKinds) {
        let position = self.detectors.len();
        for kind in kinds.iter() {
            self.index[kind.bit_index()].push(position);
        }
        debug!(detector = detector.metadata().id, kinds = %kinds, "registered detector");
        self.kinds |= kinds;
        self.detectors.push(detector);
    }

    /// Union of the kinds every registered detector asked for; extraction can skip the rest.
    pub fn reference_kinds(&self) -> ReferenceKinds {
        self.kinds
    }

    pub fn metadata(&self) -> Vec<DetectorMetadata> {
        self.detectors.iter().map(|detector| detector.metadata()).collect()
    }

    /// Deliver one reference to every detector interested in its kind.
    pub fn dispatch(&mut self, reference: &Reference) {
        let bucket = &self.index[reference.kind().bit_index()];
        for &position in bucket {
            self.detectors[position].consider_reference(reference);
        }
    }

    /// Resolve and dispatch references in order, stopping between references once
    /// cancelled. References already resolved keep their results.
    pub fn analyze(
        &mut self,
        references: &mut [Reference],
        universe: &dyn TypeUniverse,
        cancellation: &Cancellation,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for reference in references.iter_mut() {
            if cancellation.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            if !reference.resolve_attempted() {
                resolve(reference, universe);
            }
            self.dispatch(reference);
            outcome.processed += 1;
        }
        info!(
            processed = outcome.processed,
            total = references.len(),
            cancelled = outcome.cancelled,
            "analyzed references"
        );
        outcome
    }

    /// Problems reported by every detector, in registration order.
    pub fn problems(&self) -> Vec<SarifResult> {
        self.detectors
            .iter()
            .flat_map(|detector| detector.create_problems())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::reference::{MemberHandle, ReferenceKind};
    use crate::universe::ClassUniverse;
    use crate::universe::testing::{class, method};

    struct Recorder {
        id: &'static str,
        kinds: ReferenceKinds,
        seen: Rc<RefCell<Vec<(&'static str, ReferenceKind)>>>,
    }

    impl ProblemDetector for Recorder {
        fn metadata(&self) -> DetectorMetadata {
            DetectorMetadata {
                id: self.id,
                name: "Recorder",
                description: "Records every reference it is given",
            }
        }

        fn reference_kinds(&self) -> ReferenceKinds {
            self.kinds
        }

        fn consider_reference(&mut self, reference: &Reference) {
            self.seen.borrow_mut().push((self.id, reference.kind()));
        }

        fn create_problems(&self) -> Vec<SarifResult> {
            Vec::new()
        }
    }

    fn recorder(
        id: &'static str,
        kinds: ReferenceKinds,
        seen: &Rc<RefCell<Vec<(&'static str, ReferenceKind)>>>,
    ) -> Box<dyn ProblemDetector> {
        Box::new(Recorder {
            id,
            kinds,
            seen: Rc::clone(seen),
        })
    }

    fn call(kind: ReferenceKind) -> Reference {
        Reference::method_reference(
            MemberHandle::method("app.Main", "run", "()V"),
            "lib.Api",
            "call",
            "()V",
            kind,
            0,
        )
    }

    fn universe() -> ClassUniverse {
        let mut api = class("lib/Api", Some("java/lang/Object"));
        api.methods.push(method("call", "()V"));
        ClassUniverse::new(vec![class("java/lang/Object", None), api])
    }

    #[test]
    fn dispatch_reaches_only_interested_detectors_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut analyzer = ReferenceAnalyzer::new(vec![
            recorder(
                "calls",
                ReferenceKind::VirtualCall | ReferenceKind::StaticCall,
                &seen,
            ),
            recorder("statics", ReferenceKinds::from(ReferenceKind::StaticCall), &seen),
        ]);
        let mut references = vec![
            call(ReferenceKind::VirtualCall),
            call(ReferenceKind::StaticCall),
            call(ReferenceKind::InterfaceCall),
        ];

        let outcome = analyzer.analyze(&mut references, &universe(), &Cancellation::new());

        assert_eq!(outcome, BatchOutcome { processed: 3, cancelled: false });
        assert_eq!(
            *seen.borrow(),
            vec![
                ("calls", ReferenceKind::VirtualCall),
                ("calls", ReferenceKind::StaticCall),
                ("statics", ReferenceKind::StaticCall),
            ]
        );
        assert!(references.iter().all(Reference::resolve_attempted));
        assert!(references[0].is_resolved());
    }

    #[test]
    fn reference_kinds_is_the_union_of_registrations() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut analyzer = ReferenceAnalyzer::default();
        assert!(analyzer.reference_kinds().is_empty());

        analyzer.register(
            recorder("a", ReferenceKinds::from(ReferenceKind::Extends), &seen),
            ReferenceKinds::from(ReferenceKind::Extends),
        );
        analyzer.register(
            recorder("b", ReferenceKinds::from(ReferenceKind::AnnotationUse), &seen),
            ReferenceKinds::from(ReferenceKind::AnnotationUse),
        );

        let kinds = analyzer.reference_kinds();
        assert!(kinds.contains(ReferenceKind::Extends));
        assert!(kinds.contains(ReferenceKind::AnnotationUse));
        assert!(!kinds.contains(ReferenceKind::Implements));
        assert_eq!(analyzer.metadata().len(), 2);
    }

    #[test]
    fn kinds_without_detectors_are_dropped_quietly() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut analyzer = ReferenceAnalyzer::new(vec![recorder(
            "extends",
            ReferenceKinds::from(ReferenceKind::Extends),
            &seen,
        )]);

        analyzer.dispatch(&call(ReferenceKind::Override));

        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn cancelled_analysis_keeps_partial_results() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut analyzer =
            ReferenceAnalyzer::new(vec![recorder("all", ReferenceKinds::ALL, &seen)]);
        let mut references = vec![
            call(ReferenceKind::VirtualCall),
            call(ReferenceKind::StaticCall),
        ];
        let cancellation = Cancellation::new();
        cancellation.cancel();

        let outcome = analyzer.analyze(&mut references, &universe(), &cancellation);

        assert_eq!(outcome, BatchOutcome { processed: 0, cancelled: true });
        assert!(seen.borrow().is_empty());
        assert!(!references[0].resolve_attempted());
    }
}
