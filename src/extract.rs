use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::descriptor::{class_operand, field_type_class, method_types, qualified_name};
use crate::field_tracker::FieldAccessTracker;
use crate::ir::{
    CallKind, CallSite, Class, Code, Field, FieldAccessKind, Instruction, InstructionKind, Method,
    NestedKind, NestedType, TypeFailure,
};
use crate::lines::LinePositionTracker;
use crate::opcodes;
use crate::reference::{F_DEFAULT_METHOD, MemberHandle, Reference, ReferenceKind, ReferenceKinds};
use crate::resolver::{default_provider, find_method};
use crate::signature::{SignatureOwner, destructure};
use crate::universe::TypeUniverse;

/// Extraction settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExtractorConfig {
    /// Keep references to the scanned type itself and to its member types.
    pub include_local_refs: bool,
    /// Kinds to emit; usually the union requested by the registered detectors.
    pub reference_kinds: ReferenceKinds,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            include_local_refs: false,
            reference_kinds: ReferenceKinds::ALL,
        }
    }
}

/// References extracted from one root type and the types nested in it.
#[derive(Debug)]
pub struct TypeReferences {
    pub type_name: String,
    pub references: Vec<Reference>,
}

#[derive(Debug, Default)]
pub struct ExtractionOutput {
    /// Sorted by type name.
    pub types: Vec<TypeReferences>,
    pub failures: Vec<TypeFailure>,
}

impl ExtractionOutput {
    pub fn reference_count(&self) -> usize {
        self.types.iter().map(|types| types.references.len()).sum()
    }

    pub fn into_references(self) -> Vec<Reference> {
        self.types
            .into_iter()
            .flat_map(|types| types.references)
            .collect()
    }
}

/// Extract references from every root type in parallel. Nested types are reached
/// through their enclosing type; a type that fails is reported and skipped.
pub fn extract_all(
    classes: &[Class],
    universe: &dyn TypeUniverse,
    config: ExtractorConfig,
) -> ExtractionOutput {
    let names: HashSet<&str> = classes.iter().map(|class| class.name.as_str()).collect();
    let extractor = ReferenceExtractor::new(universe, config);
    let mut results: Vec<(String, Result<Vec<Reference>>)> = classes
        .par_iter()
        .filter(|class| is_root(class, &names))
        .map(|class| (qualified_name(&class.name), extractor.extract(class)))
        .collect();
    results.sort_by(|left, right| left.0.cmp(&right.0));

    let mut output = ExtractionOutput::default();
    for (type_name, result) in results {
        match result {
            Ok(references) => output.types.push(TypeReferences {
                type_name,
                references,
            }),
            Err(error) => {
                let message = format!("{error:#}");
                warn!(type_name = %type_name, error = %message, "failed to extract references");
                output.failures.push(TypeFailure { type_name, message });
            }
        }
    }
    info!(
        types = output.types.len(),
        failures = output.failures.len(),
        references = output.reference_count(),
        "extracted references"
    );
    output
}

fn is_root(class: &Class, names: &HashSet<&str>) -> bool {
    let Some(nesting) = &class.nesting else {
        return true;
    };
    let enclosing = nesting
        .outer_name
        .as_deref()
        .or_else(|| class.name.rsplit_once('$').map(|(outer, _)| outer));
    enclosing.is_none_or(|outer| !names.contains(outer))
}

/// Walks one type's declarations and method bodies and records the references they make.
pub struct ReferenceExtractor<'a> {
    universe: &'a dyn TypeUniverse,
    config: ExtractorConfig,
}

impl<'a> ReferenceExtractor<'a> {
    pub fn new(universe: &'a dyn TypeUniverse, config: ExtractorConfig) -> Self {
        ReferenceExtractor { universe, config }
    }

    /// References of `class` and, transitively, the types nested in it.
    pub fn extract(&self, class: &Class) -> Result<Vec<Reference>> {
        let mut state = ExtractionState::default();
        self.visit_type(class, &mut state)
            .with_context(|| format!("extract {}", qualified_name(&class.name)))?;
        state.collapse_accessors(&self.config);
        Ok(state.into_references())
    }

    fn visit_type(&self, class: &Class, state: &mut ExtractionState) -> Result<()> {
        let name = qualified_name(&class.name);
        debug!(type_name = %name, "visiting type");
        let super_type = if class.access.is_interface {
            class.interfaces.first()
        } else {
            class.super_name.as_ref()
        };
        let mut context = TypeContext {
            class,
            source: MemberHandle::type_handle(&name),
            scope: state.enter(&name),
            super_type: super_type.map(|name| qualified_name(name)),
            name,
            local_types: HashMap::new(),
        };

        self.visit_header(&context, state)?;
        for annotation in &class.annotations {
            self.record_type(
                state,
                &context,
                &context.source,
                qualified_name(annotation),
                ReferenceKind::AnnotationUse,
            );
        }
        self.visit_nested_types(&mut context, state);
        for field in &class.fields {
            self.visit_field(&context, field, state)
                .with_context(|| format!("field {}", field.name))?;
        }
        for method in &class.methods {
            self.visit_method(&context, method, state)
                .with_context(|| format!("method {}{}", method.name, method.descriptor))?;
        }
        debug!(type_name = %context.name, "finished type");
        Ok(())
    }

    fn visit_header(&self, context: &TypeContext<'_>, state: &mut ExtractionState) -> Result<()> {
        let class = context.class;
        if let Some(signature) = &class.signature {
            let owner = SignatureOwner::Class {
                is_interface: class.access.is_interface,
            };
            self.record_signature(state, context, &context.source, signature, owner)?;
            return Ok(());
        }
        if class.access.is_interface {
            // Super-interfaces of an interface are extended, not implemented.
            for interface in &class.interfaces {
                self.record_type(
                    state,
                    context,
                    &context.source,
                    qualified_name(interface),
                    ReferenceKind::Extends,
                );
            }
            return Ok(());
        }
        if let Some(super_name) = &class.super_name {
            self.record_type(
                state,
                context,
                &context.source,
                qualified_name(super_name),
                ReferenceKind::Extends,
            );
        }
        for interface in &class.interfaces {
            self.record_type(
                state,
                context,
                &context.source,
                qualified_name(interface),
                ReferenceKind::Implements,
            );
        }
        Ok(())
    }

    fn visit_nested_types(&self, context: &mut TypeContext<'_>, state: &mut ExtractionState) {
        for nested in &context.class.nested_types {
            if !is_direct_child(context.class, nested) {
                continue;
            }
            let nested_name = qualified_name(&nested.name);
            let Some(nested_class) = self.universe.lookup(&nested_name) else {
                debug!(type_name = %nested_name, "nested type not available");
                continue;
            };
            let start = state.len();
            if let Err(error) = self.visit_type(nested_class, state) {
                warn!(
                    type_name = %nested_name,
                    error = %format!("{error:#}"),
                    "skipping nested type"
                );
                state.truncate(start);
                continue;
            }
            if matches!(nested.kind, NestedKind::Local | NestedKind::Anonymous) {
                let unplaced = (start..state.len())
                    .filter(|&index| {
                        state.entries[index].retained && state.references[index].line_number() < 0
                    })
                    .collect();
                context.local_types.insert(nested_name, unplaced);
            }
        }
    }

    fn visit_field(
        &self,
        context: &TypeContext<'_>,
        field: &Field,
        state: &mut ExtractionState,
    ) -> Result<()> {
        let source = MemberHandle::field(&context.name, &field.name);
        if field.access.is_synthetic {
            if let Some(type_name) = field_type_class(&field.descriptor)? {
                let index = self.record_type(
                    state,
                    context,
                    &source,
                    type_name,
                    ReferenceKind::FieldDeclaration,
                );
                state.fields.add_field(index);
            }
        } else if let Some(signature) = &field.signature {
            self.record_signature(state, context, &source, signature, SignatureOwner::Field)?;
        } else if let Some(type_name) = field_type_class(&field.descriptor)? {
            self.record_type(
                state,
                context,
                &source,
                type_name,
                ReferenceKind::FieldDeclaration,
            );
        }
        for annotation in &field.annotations {
            self.record_type(
                state,
                context,
                &source,
                qualified_name(annotation),
                ReferenceKind::AnnotationUse,
            );
        }
        Ok(())
    }

    fn visit_method(
        &self,
        context: &TypeContext<'_>,
        method: &Method,
        state: &mut ExtractionState,
    ) -> Result<()> {
        let source = MemberHandle::method(&context.name, &method.name, &method.descriptor);
        let types = method_types(&method.descriptor)?;

        if may_override(method) {
            if let Some(super_type) = &context.super_type {
                let provider = default_provider(
                    self.universe,
                    context.class,
                    &method.name,
                    &method.descriptor,
                );
                let (target, flags) = match provider {
                    Some(interface) => (qualified_name(&interface.name), F_DEFAULT_METHOD),
                    None => (super_type.clone(), 0),
                };
                self.record(
                    state,
                    context,
                    Reference::method_reference(
                        source.clone(),
                        target,
                        &method.name,
                        &method.descriptor,
                        ReferenceKind::Override,
                        flags,
                    ),
                );
            }
        }

        if !method.access.is_synthetic {
            let mut throws_in_signature = false;
            if let Some(signature) = &method.signature {
                self.record_signature(state, context, &source, signature, SignatureOwner::Method)?;
                throws_in_signature = signature.contains('^');
            } else {
                for parameter in types.parameters.iter().flatten() {
                    self.record_type(
                        state,
                        context,
                        &source,
                        parameter.clone(),
                        ReferenceKind::Parameter,
                    );
                }
                if let Some(return_class) = &types.return_class {
                    self.record_type(
                        state,
                        context,
                        &source,
                        return_class.clone(),
                        ReferenceKind::ReturnType,
                    );
                }
            }
            if !throws_in_signature {
                for exception in &method.exceptions {
                    self.record_type(
                        state,
                        context,
                        &source,
                        qualified_name(exception),
                        ReferenceKind::Throws,
                    );
                }
            }
        }
        for annotation in &method.annotations {
            self.record_type(
                state,
                context,
                &source,
                qualified_name(annotation),
                ReferenceKind::AnnotationUse,
            );
        }

        if method.access.is_native || method.access.is_abstract {
            return Ok(());
        }
        if let Some(code) = &method.code {
            let first_local = types.argument_slots + usize::from(!method.access.is_static);
            self.visit_code(context, method, &source, code, first_local, state)?;
        }
        Ok(())
    }

    fn visit_code(
        &self,
        context: &TypeContext<'_>,
        method: &Method,
        source: &MemberHandle,
        code: &Code,
        first_local: usize,
        state: &mut ExtractionState,
    ) -> Result<()> {
        let mut walk = MethodWalk::default();
        let mut labels = BTreeSet::new();
        for entry in &code.line_numbers {
            walk.lines.add_line(entry.line, entry.start_pc);
            walk.line_at.insert(entry.start_pc, entry.line);
            labels.insert(entry.start_pc);
        }
        for handler in &code.exception_handlers {
            labels.extend([handler.start_pc, handler.end_pc, handler.handler_pc]);
            if let Some(catch_type) = &handler.catch_type {
                let index = self.record_type(
                    state,
                    context,
                    source,
                    qualified_name(catch_type),
                    ReferenceKind::CatchException,
                );
                walk.lines.add_catch(index, handler.handler_pc);
                walk.lines.add_reference(index);
            }
        }
        for variable in &code.local_variables {
            labels.extend([variable.start_pc, variable.start_pc + variable.length]);
        }

        let mut labels = labels.into_iter().peekable();
        for instruction in &code.instructions {
            while let Some(label) = labels.next_if(|&label| label <= instruction.offset) {
                walk.enter_label(label);
            }
            self.visit_instruction(context, method, source, instruction, &mut walk, state);
        }
        for label in labels {
            walk.enter_label(label);
        }

        self.visit_local_variables(context, source, code, first_local, &mut walk, state)?;
        walk.lines.compute(&mut state.references);
        Ok(())
    }

    fn visit_instruction(
        &self,
        context: &TypeContext<'_>,
        method: &Method,
        source: &MemberHandle,
        instruction: &Instruction,
        walk: &mut MethodWalk,
        state: &mut ExtractionState,
    ) {
        match &instruction.kind {
            InstructionKind::Store(slot) => {
                if let Some(line) = walk.last_line {
                    walk.marker = Some(LocalMarker { slot: *slot, line });
                }
            }
            InstructionKind::Field(site) => {
                let kind = match site.kind {
                    FieldAccessKind::Get => ReferenceKind::GetField,
                    FieldAccessKind::Put => ReferenceKind::PutField,
                    FieldAccessKind::GetStatic => ReferenceKind::GetStaticField,
                    FieldAccessKind::PutStatic => ReferenceKind::PutStaticField,
                };
                let reference = Reference::field_reference(
                    source.clone(),
                    qualified_name(&site.owner),
                    &site.name,
                    kind,
                );
                let index = self.record_located(state, context, walk, reference);
                if method.access.is_synthetic {
                    state.fields.add_field(index);
                }
            }
            InstructionKind::Invoke(call) => {
                self.visit_call(context, method, source, call, walk, state);
                walk.literal = None;
            }
            InstructionKind::Type(operand) => {
                let kind = match instruction.opcode {
                    opcodes::NEW => {
                        // Instantiation itself is recorded at the constructor call.
                        if let Some(indices) = context.local_types.get(&qualified_name(operand)) {
                            for &index in indices {
                                walk.lines.add_reference(index);
                            }
                        }
                        return;
                    }
                    opcodes::ANEWARRAY => ReferenceKind::ArrayAllocation,
                    opcodes::CHECKCAST => ReferenceKind::Checkcast,
                    opcodes::INSTANCEOF => ReferenceKind::Instanceof,
                    _ => return,
                };
                if let Some(type_name) = class_operand(operand) {
                    let reference = Reference::type_reference(source.clone(), type_name, kind);
                    self.record_located(state, context, walk, reference);
                }
            }
            InstructionKind::MultiNewArray(descriptor) => {
                if let Some(type_name) = class_operand(descriptor) {
                    let reference = Reference::type_reference(
                        source.clone(),
                        type_name,
                        ReferenceKind::ArrayAllocation,
                    );
                    self.record_located(state, context, walk, reference);
                }
            }
            InstructionKind::ConstClass(operand) => {
                if let Some(type_name) = class_operand(operand) {
                    let reference = Reference::type_reference(
                        source.clone(),
                        type_name,
                        ReferenceKind::ConstantPoolUse,
                    );
                    self.record_located(state, context, walk, reference);
                }
            }
            InstructionKind::ConstString(value) => {
                walk.literal = (!value.is_empty()).then(|| value.clone());
            }
            InstructionKind::Other => {}
        }
    }

    fn visit_call(
        &self,
        context: &TypeContext<'_>,
        method: &Method,
        source: &MemberHandle,
        call: &CallSite,
        walk: &mut MethodWalk,
        state: &mut ExtractionState,
    ) {
        let owner = qualified_name(&call.owner);
        let (kind, flags) = match call.kind {
            CallKind::Special if call.name == "<init>" => {
                // Known approximation: the first matching call in a constructor is
                // taken to be the super constructor call.
                if !walk.super_call_seen
                    && method.is_constructor()
                    && context.super_type.as_deref() == Some(owner.as_str())
                {
                    walk.super_call_seen = true;
                    (ReferenceKind::SuperConstructorCall, 0)
                } else {
                    let instantiate = Reference::type_reference(
                        source.clone(),
                        owner.clone(),
                        ReferenceKind::Instantiate,
                    );
                    self.record_located(state, context, walk, instantiate);
                    (ReferenceKind::ConstructorCall, 0)
                }
            }
            CallKind::Special => (ReferenceKind::SpecialCall, 0),
            CallKind::Static => {
                if owner == "java.lang.Class" && call.name == "forName" {
                    if let Some(literal) = &walk.literal {
                        let reference = Reference::type_reference(
                            source.clone(),
                            qualified_name(literal),
                            ReferenceKind::ConstantPoolUse,
                        );
                        self.record_located(state, context, walk, reference);
                    }
                }
                (ReferenceKind::StaticCall, 0)
            }
            CallKind::Virtual => (
                ReferenceKind::VirtualCall,
                self.virtual_call_flags(context, &owner, call),
            ),
            CallKind::Interface => (ReferenceKind::InterfaceCall, 0),
            CallKind::Dynamic => return,
        };
        let reference = Reference::method_reference(
            source.clone(),
            owner,
            &call.name,
            &call.descriptor,
            kind,
            flags,
        );
        let index = self.record_located(state, context, walk, reference);
        if kind == ReferenceKind::StaticCall {
            state.fields.add_accessor(index);
        }
    }

    /// Flags a virtual call whose static target is a default interface method.
    fn virtual_call_flags(&self, context: &TypeContext<'_>, owner: &str, call: &CallSite) -> u32 {
        if !context.class.supports_default_methods() {
            return 0;
        }
        match find_method(
            self.universe,
            owner,
            &call.name,
            &call.descriptor,
            ReferenceKind::VirtualCall,
        ) {
            Some((declaring, target)) if declaring.access.is_interface && target.is_default() => {
                F_DEFAULT_METHOD
            }
            Some(_) => 0,
            // Concrete owners inherit defaults their class chain does not declare.
            None => match self.universe.lookup(owner) {
                Some(class)
                    if default_provider(self.universe, class, &call.name, &call.descriptor)
                        .is_some() =>
                {
                    F_DEFAULT_METHOD
                }
                _ => 0,
            },
        }
    }

    fn visit_local_variables(
        &self,
        context: &TypeContext<'_>,
        source: &MemberHandle,
        code: &Code,
        first_local: usize,
        walk: &mut MethodWalk,
        state: &mut ExtractionState,
    ) -> Result<()> {
        for variable in &code.local_variables {
            // Primitive slots and arguments declare no local type.
            if variable.descriptor.len() == 1 || usize::from(variable.index) < first_local {
                continue;
            }
            let Some(line) = walk.take_marker(variable.start_pc, variable.index) else {
                continue;
            };
            let indices = match &variable.signature {
                Some(signature) => self.record_signature(
                    state,
                    context,
                    source,
                    signature,
                    SignatureOwner::LocalVariable,
                )?,
                None => field_type_class(&variable.descriptor)?
                    .map(|type_name| {
                        self.record_type(
                            state,
                            context,
                            source,
                            type_name,
                            ReferenceKind::LocalVariableDeclaration,
                        )
                    })
                    .into_iter()
                    .collect(),
            };
            for index in indices {
                state.references[index].set_line_number(line as i32);
            }
        }
        Ok(())
    }

    fn record(
        &self,
        state: &mut ExtractionState,
        context: &TypeContext<'_>,
        reference: Reference,
    ) -> usize {
        state.record(context.scope, reference, &self.config)
    }

    fn record_located(
        &self,
        state: &mut ExtractionState,
        context: &TypeContext<'_>,
        walk: &mut MethodWalk,
        reference: Reference,
    ) -> usize {
        let index = self.record(state, context, reference);
        walk.lines.add_reference(index);
        index
    }

    fn record_type(
        &self,
        state: &mut ExtractionState,
        context: &TypeContext<'_>,
        source: &MemberHandle,
        type_name: String,
        kind: ReferenceKind,
    ) -> usize {
        self.record(
            state,
            context,
            Reference::type_reference(source.clone(), type_name, kind),
        )
    }

    fn record_signature(
        &self,
        state: &mut ExtractionState,
        context: &TypeContext<'_>,
        source: &MemberHandle,
        signature: &str,
        owner: SignatureOwner,
    ) -> Result<Vec<usize>> {
        let types = destructure(signature, owner)?;
        Ok(types
            .into_iter()
            .map(|entry| {
                self.record(
                    state,
                    context,
                    Reference::signature_type_reference(
                        source.clone(),
                        entry.type_name,
                        signature,
                        entry.kind,
                    ),
                )
            })
            .collect())
    }
}

/// Traversal state for the type currently being visited.
struct TypeContext<'c> {
    class: &'c Class,
    name: String,
    source: MemberHandle,
    /// Super class, or first super-interface of an interface.
    super_type: Option<String>,
    scope: usize,
    /// References of local and anonymous nested types still lacking a line,
    /// placed at the enclosing `new` instruction.
    local_types: HashMap<String, Vec<usize>>,
}

fn may_override(method: &Method) -> bool {
    !method.access.is_private
        && !method.access.is_static
        && !method.access.is_synthetic
        && !method.is_constructor()
        && !method.is_class_initializer()
}

fn is_direct_child(class: &Class, nested: &NestedType) -> bool {
    if nested.name == class.name {
        return false;
    }
    match &nested.outer_name {
        Some(outer) => *outer == class.name,
        None => nested
            .name
            .strip_prefix(class.name.as_str())
            .and_then(|rest| rest.strip_prefix('$'))
            .is_some_and(|rest| !rest.contains('$')),
    }
}

/// Line and slot of the reference store that may introduce a local variable.
#[derive(Clone, Copy, Debug)]
struct LocalMarker {
    slot: u16,
    line: u32,
}

/// Per-method walk state.
#[derive(Default)]
struct MethodWalk {
    lines: LinePositionTracker,
    line_at: BTreeMap<u32, u32>,
    last_line: Option<u32>,
    marker: Option<LocalMarker>,
    markers: HashMap<u32, Vec<LocalMarker>>,
    /// Most recent string constant, for `Class.forName` literals.
    literal: Option<String>,
    super_call_seen: bool,
}

impl MethodWalk {
    fn enter_label(&mut self, label: u32) {
        self.lines.add_label(label);
        if let Some(marker) = self.marker.take() {
            self.markers.entry(label).or_default().push(marker);
        }
        if let Some(line) = self.line_at.get(&label) {
            self.last_line = Some(*line);
        }
    }

    fn take_marker(&mut self, label: u32, slot: u16) -> Option<u32> {
        let markers = self.markers.get_mut(&label)?;
        let position = markers.iter().position(|marker| marker.slot == slot)?;
        let marker = markers.remove(position);
        if markers.is_empty() {
            self.markers.remove(&label);
        }
        Some(marker.line)
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    retained: bool,
    scope: usize,
}

/// Everything recorded while extracting one root type, including references the
/// filters hide, which the line and accessor trackers still need.
#[derive(Default)]
struct ExtractionState {
    references: Vec<Reference>,
    entries: Vec<Entry>,
    scopes: Vec<String>,
    fields: FieldAccessTracker,
}

impl ExtractionState {
    fn enter(&mut self, type_name: &str) -> usize {
        self.scopes.push(type_name.to_string());
        self.scopes.len() - 1
    }

    fn len(&self) -> usize {
        self.references.len()
    }

    fn truncate(&mut self, len: usize) {
        self.references.truncate(len);
        self.entries.truncate(len);
        self.fields.truncate(len);
    }

    fn record(&mut self, scope: usize, reference: Reference, config: &ExtractorConfig) -> usize {
        let retained = considers(config, &self.scopes[scope], &reference);
        self.references.push(reference);
        self.entries.push(Entry { retained, scope });
        self.references.len() - 1
    }

    fn collapse_accessors(&mut self, config: &ExtractorConfig) {
        if self.fields.is_empty() {
            return;
        }
        let collapse = self.fields.collapse(&self.references);
        for &index in &collapse.removed {
            self.entries[index].retained = false;
        }
        for (call, reference) in collapse.created {
            let scope = self.entries[call].scope;
            self.record(scope, reference, config);
        }
    }

    /// Retained references in encounter order, without repeats of the same
    /// dependency on the same line.
    fn into_references(self) -> Vec<Reference> {
        let keep: Vec<bool> = {
            let mut seen = HashSet::new();
            self.references
                .iter()
                .zip(&self.entries)
                .map(|(reference, entry)| {
                    entry.retained && seen.insert((reference.identity(), reference.line_number()))
                })
                .collect()
        };
        self.references
            .into_iter()
            .zip(keep)
            .filter_map(|(reference, keep)| keep.then_some(reference))
            .collect()
    }
}

/// Local filter: references to the scanned type, to class initializers and to
/// member types of the scanned type are dropped unless local references are wanted.
fn considers(config: &ExtractorConfig, scanned: &str, reference: &Reference) -> bool {
    if !config.reference_kinds.contains(reference.kind()) {
        return false;
    }
    if config.include_local_refs {
        return true;
    }
    let target = reference.referenced_type_name();
    if target == scanned || reference.referenced_member_name() == Some("<clinit>") {
        return false;
    }
    let is_member_type = target
        .strip_prefix(scanned)
        .is_some_and(|rest| rest.starts_with('$'));
    if is_member_type {
        return matches!(
            reference.kind(),
            ReferenceKind::VirtualCall
                | ReferenceKind::Override
                | ReferenceKind::GetField
                | ReferenceKind::PutField
        );
    }
    true
}
