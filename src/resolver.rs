use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::descriptor::qualified_name;
use crate::ir::{Class, Field, Method};
use crate::reference::{MemberHandle, Reference, ReferenceKind, ReferenceType};
use crate::universe::TypeUniverse;

const POLYMORPHIC_OWNERS: [&str; 2] = [
    "java.lang.invoke.MethodHandle",
    "java.lang.invoke.VarHandle",
];

/// Outcome of resolving one reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
    Found(MemberHandle),
    NotFound,
    /// The reference was marked as not resolvable and was left untouched.
    Skipped,
}

/// Cooperative cancellation signal checked between references by batch passes.
#[derive(Debug, Default)]
pub struct Cancellation {
    cancelled: AtomicBool,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// How far a batch pass got before finishing or being cancelled.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchOutcome {
    pub processed: usize,
    pub cancelled: bool,
}

/// Resolve a reference against a universe and record the result on it.
pub fn resolve(reference: &mut Reference, universe: &dyn TypeUniverse) -> Resolution {
    if !reference.is_resolvable() {
        return Resolution::Skipped;
    }
    let target = resolve_target(reference, universe);
    reference.set_resolved(target.clone());
    match target {
        Some(handle) => Resolution::Found(handle),
        None => {
            debug!(reference = %reference, "unresolved reference");
            Resolution::NotFound
        }
    }
}

/// Find the member a reference denotes without recording anything.
pub fn resolve_target(reference: &Reference, universe: &dyn TypeUniverse) -> Option<MemberHandle> {
    let owner = reference.referenced_type_name();
    match reference.reference_type() {
        ReferenceType::Type => universe
            .lookup(owner)
            .map(|_| MemberHandle::type_handle(owner)),
        ReferenceType::Field => {
            let name = reference.referenced_member_name()?;
            let (class, field) = find_field(universe, owner, name)?;
            if field.access.is_synthetic {
                return None;
            }
            Some(MemberHandle::field(qualified_name(&class.name), &field.name))
        }
        ReferenceType::Method => {
            let name = reference.referenced_member_name()?;
            let descriptor = reference.referenced_signature()?;
            if let Some(handle) =
                polymorphic_target(universe, reference.kind(), owner, name, descriptor)
            {
                return Some(handle);
            }
            let (class, method) = find_method(universe, owner, name, descriptor, reference.kind())?;
            if method.access.is_synthetic {
                return None;
            }
            Some(MemberHandle::method(
                qualified_name(&class.name),
                &method.name,
                &method.descriptor,
            ))
        }
    }
}

/// Check a reference against the stub universe of a minimum execution environment.
///
/// Types the stub does not know about are outside the environment and count as
/// resolved; only a known type missing the member is a problem. Without a stub
/// every reference passes.
pub fn resolve_in_environment(reference: &Reference, stub: Option<&dyn TypeUniverse>) -> bool {
    let Some(stub) = stub else {
        return true;
    };
    if stub.lookup(reference.referenced_type_name()).is_none() {
        return true;
    }
    match reference.reference_type() {
        ReferenceType::Type => true,
        _ => resolve_target(reference, stub).is_some(),
    }
}

/// Resolve every reference in parallel, stopping early once cancelled.
/// References resolved before cancellation keep their results.
pub fn resolve_all(
    references: &mut [Reference],
    universe: &dyn TypeUniverse,
    cancellation: &Cancellation,
) -> BatchOutcome {
    let processed = AtomicUsize::new(0);
    references.par_iter_mut().for_each(|reference| {
        if cancellation.is_cancelled() {
            return;
        }
        resolve(reference, universe);
        processed.fetch_add(1, Ordering::Relaxed);
    });
    BatchOutcome {
        processed: processed.into_inner(),
        cancelled: cancellation.is_cancelled(),
    }
}

/// Field lookup walks the superclass chain only.
pub(crate) fn find_field<'u>(
    universe: &'u dyn TypeUniverse,
    owner: &str,
    name: &str,
) -> Option<(&'u Class, &'u Field)> {
    let start = universe.lookup(owner)?;
    superclasses(universe, start)
        .into_iter()
        .find_map(|class| class.find_field(name).map(|field| (class, field)))
}

/// Method lookup in the order the VM uses for the given invocation kind.
pub(crate) fn find_method<'u>(
    universe: &'u dyn TypeUniverse,
    owner: &str,
    name: &str,
    descriptor: &str,
    kind: ReferenceKind,
) -> Option<(&'u Class, &'u Method)> {
    let start = universe.lookup(owner)?;
    if kind == ReferenceKind::InterfaceCall {
        if let Some(method) = start.find_method(name, descriptor) {
            return Some((start, method));
        }
        let mut visited = HashSet::new();
        if let Some(found) =
            find_in_interfaces(universe, &start.interfaces, name, descriptor, &mut visited)
        {
            return Some(found);
        }
        // Interfaces inherit the public methods of Object.
        return universe
            .lookup("java.lang.Object")
            .and_then(|object| object.find_method(name, descriptor).map(|method| (object, method)));
    }

    let chain = superclasses(universe, start);
    if let Some(found) = chain
        .iter()
        .copied()
        .find_map(|class| class.find_method(name, descriptor).map(|method| (class, method)))
    {
        return Some(found);
    }
    if !(start.access.is_abstract || start.access.is_interface) {
        return None;
    }
    let mut visited = HashSet::new();
    chain.iter().find_map(|class| {
        find_in_interfaces(universe, &class.interfaces, name, descriptor, &mut visited)
    })
}

/// The interface supplying a default implementation that `class` inherits for the
/// method, if no superclass declares it first.
pub(crate) fn default_provider<'u>(
    universe: &'u dyn TypeUniverse,
    class: &Class,
    name: &str,
    descriptor: &str,
) -> Option<&'u Class> {
    let mut chain = Vec::new();
    let mut seen = HashSet::from([qualified_name(&class.name)]);
    let mut next = class.super_name.as_deref();
    while let Some(super_name) = next {
        let qualified = qualified_name(super_name);
        if !seen.insert(qualified.clone()) {
            break;
        }
        let Some(super_class) = universe.lookup(&qualified) else {
            break;
        };
        if super_class.find_method(name, descriptor).is_some() {
            return None;
        }
        chain.push(super_class);
        next = super_class.super_name.as_deref();
    }

    let mut visited = HashSet::new();
    let interfaces = std::iter::once(class.interfaces.as_slice())
        .chain(chain.iter().map(|super_class| super_class.interfaces.as_slice()));
    for declared in interfaces {
        if let Some((interface, method)) =
            find_in_interfaces(universe, declared, name, descriptor, &mut visited)
        {
            return method.is_default().then_some(interface);
        }
    }
    None
}

/// `start` followed by its superclasses, stopping at the first type missing from
/// the universe or at a cycle.
fn superclasses<'u>(universe: &'u dyn TypeUniverse, start: &'u Class) -> Vec<&'u Class> {
    let mut chain = vec![start];
    let mut seen = HashSet::from([start.name.as_str()]);
    let mut current = start;
    while let Some(super_name) = current.super_name.as_deref() {
        if !seen.insert(super_name) {
            break;
        }
        let Some(super_class) = universe.lookup(&qualified_name(super_name)) else {
            break;
        };
        chain.push(super_class);
        current = super_class;
    }
    chain
}

/// Depth-first search through declared super-interfaces, in declaration order.
fn find_in_interfaces<'u>(
    universe: &'u dyn TypeUniverse,
    interfaces: &[String],
    name: &str,
    descriptor: &str,
    visited: &mut HashSet<String>,
) -> Option<(&'u Class, &'u Method)> {
    for interface_name in interfaces {
        let qualified = qualified_name(interface_name);
        if !visited.insert(qualified.clone()) {
            continue;
        }
        let Some(interface) = universe.lookup(&qualified) else {
            continue;
        };
        if let Some(method) = interface.find_method(name, descriptor) {
            return Some((interface, method));
        }
        if let Some(found) =
            find_in_interfaces(universe, &interface.interfaces, name, descriptor, visited)
        {
            return Some(found);
        }
    }
    None
}

/// Calls to signature-polymorphic methods carry the call site's descriptor, so
/// they match by name alone.
fn polymorphic_target(
    universe: &dyn TypeUniverse,
    kind: ReferenceKind,
    owner: &str,
    name: &str,
    descriptor: &str,
) -> Option<MemberHandle> {
    if kind != ReferenceKind::VirtualCall || !POLYMORPHIC_OWNERS.contains(&owner) {
        return None;
    }
    let class = universe.lookup(owner)?;
    class
        .methods
        .iter()
        .any(|method| method.name == name && method.is_signature_polymorphic())
        .then(|| MemberHandle::method(owner, name, descriptor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::ClassUniverse;
    use crate::universe::testing::{abstract_method, class, field, interface, method};

    fn method_reference(
        owner: &str,
        name: &str,
        descriptor: &str,
        kind: ReferenceKind,
    ) -> Reference {
        Reference::method_reference(
            MemberHandle::method("app.Caller", "call", "()V"),
            owner,
            name,
            descriptor,
            kind,
            0,
        )
    }

    fn hierarchy() -> ClassUniverse {
        let mut object = class("java/lang/Object", None);
        object.methods.push(method("toString", "()Ljava/lang/String;"));
        let mut base = class("lib/Base", Some("java/lang/Object"));
        base.methods.push(method("m", "()V"));
        base.fields.push(field("count", "I"));
        let mut middle = class("lib/Middle", Some("lib/Base"));
        middle.methods.push(method("other", "()V"));
        let child = class("lib/Child", Some("lib/Middle"));
        let mut unrelated = class("lib/Unrelated", Some("java/lang/Object"));
        unrelated.methods.push(method("m", "()V"));
        ClassUniverse::new(vec![object, base, middle, child, unrelated])
    }

    #[test]
    fn virtual_call_resolves_to_nearest_superclass() {
        let universe = hierarchy();
        let mut reference = method_reference("lib.Child", "m", "()V", ReferenceKind::VirtualCall);

        let resolution = resolve(&mut reference, &universe);

        assert_eq!(resolution, Resolution::Found(MemberHandle::method("lib.Base", "m", "()V")));
        assert_eq!(reference.resolved(), Some(&MemberHandle::method("lib.Base", "m", "()V")));
        assert!(reference.resolve_attempted());
    }

    #[test]
    fn override_resolves_against_declaring_super_type() {
        let universe = hierarchy();
        let mut reference = Reference::method_reference(
            MemberHandle::method("lib.Child", "m", "()V"),
            "lib.Middle",
            "m",
            "()V",
            ReferenceKind::Override,
            0,
        );

        assert_eq!(
            resolve(&mut reference, &universe),
            Resolution::Found(MemberHandle::method("lib.Base", "m", "()V"))
        );
    }

    #[test]
    fn field_lookup_walks_superclasses() {
        let universe = hierarchy();
        let mut reference = Reference::field_reference(
            MemberHandle::method("app.Caller", "call", "()V"),
            "lib.Child",
            "count",
            ReferenceKind::GetField,
        );

        assert_eq!(
            resolve(&mut reference, &universe),
            Resolution::Found(MemberHandle::field("lib.Base", "count"))
        );
    }

    #[test]
    fn missing_owner_or_member_is_not_found() {
        let universe = hierarchy();
        let mut missing_type =
            method_reference("lib.Gone", "m", "()V", ReferenceKind::StaticCall);
        let mut missing_member =
            method_reference("lib.Child", "gone", "()V", ReferenceKind::VirtualCall);

        assert_eq!(resolve(&mut missing_type, &universe), Resolution::NotFound);
        assert_eq!(resolve(&mut missing_member, &universe), Resolution::NotFound);
        assert!(missing_member.resolve_attempted());
        assert!(missing_member.resolved().is_none());
    }

    #[test]
    fn static_call_finds_default_method_of_abstract_owner() {
        let mut provider = interface("lib/Provider", &[]);
        provider.methods.push(method("helper", "()V"));
        let mut owner = class("lib/AbstractOwner", Some("java/lang/Object"));
        owner.access.is_abstract = true;
        owner.interfaces.push("lib/Provider".to_string());
        let universe = ClassUniverse::new(vec![class("java/lang/Object", None), provider, owner]);
        let mut reference =
            method_reference("lib.AbstractOwner", "helper", "()V", ReferenceKind::StaticCall);

        assert_eq!(
            resolve(&mut reference, &universe),
            Resolution::Found(MemberHandle::method("lib.Provider", "helper", "()V"))
        );
    }

    #[test]
    fn concrete_owner_does_not_search_interfaces() {
        let mut provider = interface("lib/Provider", &[]);
        provider.methods.push(method("helper", "()V"));
        let mut owner = class("lib/Concrete", Some("java/lang/Object"));
        owner.interfaces.push("lib/Provider".to_string());
        let universe = ClassUniverse::new(vec![provider, owner]);
        let mut reference =
            method_reference("lib.Concrete", "helper", "()V", ReferenceKind::StaticCall);

        assert_eq!(resolve(&mut reference, &universe), Resolution::NotFound);
    }

    #[test]
    fn interface_call_searches_super_interfaces_depth_first() {
        let mut root = interface("lib/Root", &[]);
        root.methods.push(abstract_method("walk", "()V"));
        let left = interface("lib/Left", &["lib/Root"]);
        let mut right = interface("lib/Right", &[]);
        right.methods.push(abstract_method("walk", "()V"));
        let leaf = interface("lib/Leaf", &["lib/Left", "lib/Right"]);
        let universe = ClassUniverse::new(vec![root, left, right, leaf]);
        let mut reference =
            method_reference("lib.Leaf", "walk", "()V", ReferenceKind::InterfaceCall);

        assert_eq!(
            resolve(&mut reference, &universe),
            Resolution::Found(MemberHandle::method("lib.Root", "walk", "()V"))
        );
    }

    #[test]
    fn synthetic_members_do_not_resolve() {
        let mut owner = class("lib/Owner", Some("java/lang/Object"));
        let mut accessor = method("access$000", "()I");
        accessor.access.is_synthetic = true;
        owner.methods.push(accessor);
        let universe = ClassUniverse::new(vec![owner]);
        let mut reference =
            method_reference("lib.Owner", "access$000", "()I", ReferenceKind::StaticCall);

        assert_eq!(resolve(&mut reference, &universe), Resolution::NotFound);
    }

    #[test]
    fn signature_polymorphic_calls_match_by_name() {
        let mut handle = class("java/lang/invoke/MethodHandle", Some("java/lang/Object"));
        let mut invoke = method("invokeExact", "([Ljava/lang/Object;)Ljava/lang/Object;");
        invoke.access.is_native = true;
        invoke.access.is_varargs = true;
        handle.methods.push(invoke);
        let universe = ClassUniverse::new(vec![handle]);
        let mut reference = method_reference(
            "java.lang.invoke.MethodHandle",
            "invokeExact",
            "(Ljava/lang/String;)I",
            ReferenceKind::VirtualCall,
        );

        assert!(matches!(resolve(&mut reference, &universe), Resolution::Found(_)));
    }

    #[test]
    fn unresolvable_references_are_skipped() {
        let universe = hierarchy();
        let mut reference = method_reference("lib.Child", "m", "()V", ReferenceKind::VirtualCall);
        reference.set_resolvable(false);

        assert_eq!(resolve(&mut reference, &universe), Resolution::Skipped);
        assert!(!reference.resolve_attempted());
        assert!(reference.resolved().is_none());
    }

    #[test]
    fn environment_check_inverts_missing_types() {
        let universe = hierarchy();
        let outside = method_reference("org.other.Thing", "m", "()V", ReferenceKind::VirtualCall);
        let missing = method_reference("lib.Child", "gone", "()V", ReferenceKind::VirtualCall);
        let present = method_reference("lib.Child", "m", "()V", ReferenceKind::VirtualCall);

        assert!(resolve_in_environment(&outside, Some(&universe)));
        assert!(!resolve_in_environment(&missing, Some(&universe)));
        assert!(resolve_in_environment(&present, Some(&universe)));
        assert!(resolve_in_environment(&missing, None));
    }

    #[test]
    fn default_provider_prefers_superclass_declarations() {
        let mut provider = interface("lib/Provider", &[]);
        provider.methods.push(method("run", "()V"));
        let mut base = class("lib/Base", Some("java/lang/Object"));
        base.methods.push(method("run", "()V"));
        let mut implementor = class("lib/Impl", Some("java/lang/Object"));
        implementor.interfaces.push("lib/Provider".to_string());
        let mut subclass = class("lib/Sub", Some("lib/Base"));
        subclass.interfaces.push("lib/Provider".to_string());
        let universe = ClassUniverse::new(vec![provider, base]);

        let found = default_provider(&universe, &implementor, "run", "()V");
        assert_eq!(found.map(|class| class.name.as_str()), Some("lib/Provider"));
        assert!(default_provider(&universe, &subclass, "run", "()V").is_none());
    }

    #[test]
    fn batch_resolution_stops_when_cancelled() {
        let universe = hierarchy();
        let mut references = vec![
            method_reference("lib.Child", "m", "()V", ReferenceKind::VirtualCall),
            method_reference("lib.Child", "other", "()V", ReferenceKind::VirtualCall),
        ];
        let cancellation = Cancellation::new();
        cancellation.cancel();

        let outcome = resolve_all(&mut references, &universe, &cancellation);

        assert!(outcome.cancelled);
        assert_eq!(outcome.processed, 0);
        assert!(references.iter().all(|reference| !reference.resolve_attempted()));

        let outcome = resolve_all(&mut references, &universe, &Cancellation::new());
        assert_eq!(outcome, BatchOutcome { processed: 2, cancelled: false });
        assert!(references.iter().all(Reference::is_resolved));
    }
}
