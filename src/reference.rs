use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::Serialize;

/// Reference flag: the target of an override or virtual call is a default interface method.
pub const F_DEFAULT_METHOD: u32 = 0x1;

/// The ways a member can depend on a type or member. Each kind is a single bit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ReferenceKind {
    Extends = 1 << 0,
    Implements = 1 << 1,
    SpecialCall = 1 << 2,
    StaticCall = 1 << 3,
    PutField = 1 << 4,
    PutStaticField = 1 << 5,
    FieldDeclaration = 1 << 6,
    Parameter = 1 << 7,
    LocalVariableDeclaration = 1 << 8,
    Throws = 1 << 9,
    Checkcast = 1 << 10,
    ArrayAllocation = 1 << 11,
    CatchException = 1 << 12,
    GetField = 1 << 13,
    GetStaticField = 1 << 14,
    Instanceof = 1 << 15,
    InterfaceCall = 1 << 16,
    ConstructorCall = 1 << 17,
    LocalVariable = 1 << 18,
    PassedParameter = 1 << 19,
    ReturnType = 1 << 20,
    VirtualCall = 1 << 21,
    ConstantPoolUse = 1 << 22,
    Instantiate = 1 << 23,
    Override = 1 << 24,
    SuperConstructorCall = 1 << 25,
    ParameterizedTypeDeclaration = 1 << 26,
    ParameterizedFieldDeclaration = 1 << 27,
    ParameterizedMethodDeclaration = 1 << 28,
    ParameterizedVariable = 1 << 29,
    AnnotationUse = 1 << 30,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 31] = [
        ReferenceKind::Extends,
        ReferenceKind::Implements,
        ReferenceKind::SpecialCall,
        ReferenceKind::StaticCall,
        ReferenceKind::PutField,
        ReferenceKind::PutStaticField,
        ReferenceKind::FieldDeclaration,
        ReferenceKind::Parameter,
        ReferenceKind::LocalVariableDeclaration,
        ReferenceKind::Throws,
        ReferenceKind::Checkcast,
        ReferenceKind::ArrayAllocation,
        ReferenceKind::CatchException,
        ReferenceKind::GetField,
        ReferenceKind::GetStaticField,
        ReferenceKind::Instanceof,
        ReferenceKind::InterfaceCall,
        ReferenceKind::ConstructorCall,
        ReferenceKind::LocalVariable,
        ReferenceKind::PassedParameter,
        ReferenceKind::ReturnType,
        ReferenceKind::VirtualCall,
        ReferenceKind::ConstantPoolUse,
        ReferenceKind::Instantiate,
        ReferenceKind::Override,
        ReferenceKind::SuperConstructorCall,
        ReferenceKind::ParameterizedTypeDeclaration,
        ReferenceKind::ParameterizedFieldDeclaration,
        ReferenceKind::ParameterizedMethodDeclaration,
        ReferenceKind::ParameterizedVariable,
        ReferenceKind::AnnotationUse,
    ];

    pub fn bit(self) -> u32 {
        self as u32
    }

    /// log2 of the kind's bit.
    pub fn bit_index(self) -> usize {
        self.bit().trailing_zeros() as usize
    }

    pub fn reference_type(self) -> ReferenceType {
        match self {
            ReferenceKind::SpecialCall
            | ReferenceKind::StaticCall
            | ReferenceKind::InterfaceCall
            | ReferenceKind::ConstructorCall
            | ReferenceKind::VirtualCall
            | ReferenceKind::Override
            | ReferenceKind::SuperConstructorCall => ReferenceType::Method,
            ReferenceKind::PutField
            | ReferenceKind::PutStaticField
            | ReferenceKind::GetField
            | ReferenceKind::GetStaticField => ReferenceType::Field,
            _ => ReferenceType::Type,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            ReferenceKind::Extends => "EXTENDS",
            ReferenceKind::Implements => "IMPLEMENTS",
            ReferenceKind::SpecialCall => "INVOKED_SPECIAL",
            ReferenceKind::StaticCall => "INVOKED_STATIC",
            ReferenceKind::PutField => "PUT_FIELD",
            ReferenceKind::PutStaticField => "PUT_STATIC_FIELD",
            ReferenceKind::FieldDeclaration => "DECLARED_FIELD",
            ReferenceKind::Parameter => "PARAMETER",
            ReferenceKind::LocalVariableDeclaration => "LOCAL_VAR_DECLARED",
            ReferenceKind::Throws => "THROWS",
            ReferenceKind::Checkcast => "CASTS",
            ReferenceKind::ArrayAllocation => "ALLOCATES_ARRAY",
            ReferenceKind::CatchException => "CATCHES_EXCEPTION",
            ReferenceKind::GetField => "GETS_FIELD",
            ReferenceKind::GetStaticField => "GETS_STATIC_FIELD",
            ReferenceKind::Instanceof => "INSTANCEOF",
            ReferenceKind::InterfaceCall => "INTERFACE_METHOD",
            ReferenceKind::ConstructorCall => "CONSTRUCTOR_METHOD",
            ReferenceKind::LocalVariable => "LOCAL_VARIABLE",
            ReferenceKind::PassedParameter => "PASSED_PARAMETER",
            ReferenceKind::ReturnType => "RETURN_TYPE",
            ReferenceKind::VirtualCall => "VIRTUAL_METHOD",
            ReferenceKind::ConstantPoolUse => "CONSTANT_POOL",
            ReferenceKind::Instantiate => "INSTANTIATION",
            ReferenceKind::Override => "OVERRIDE",
            ReferenceKind::SuperConstructorCall => "SUPER_CONSTRUCTORMETHOD",
            ReferenceKind::ParameterizedTypeDeclaration => "DECLARED_PARAMETERIZED_TYPE",
            ReferenceKind::ParameterizedFieldDeclaration => "DECLARED_PARAMETERIZED_FIELD",
            ReferenceKind::ParameterizedMethodDeclaration => "DECLARED_PARAMETERIZED_METHOD",
            ReferenceKind::ParameterizedVariable => "DECLARED_PARAMETERIZED_VARIABLE",
            ReferenceKind::AnnotationUse => "ANNOTATION_USE",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Bit mask over [`ReferenceKind`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct ReferenceKinds(u32);

impl ReferenceKinds {
    pub const NONE: ReferenceKinds = ReferenceKinds(0);
    pub const ALL: ReferenceKinds = ReferenceKinds((1 << 31) - 1);

    pub fn from_bits(bits: u32) -> Self {
        ReferenceKinds(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, kind: ReferenceKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn intersects(self, other: ReferenceKinds) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn without(self, kind: ReferenceKind) -> Self {
        ReferenceKinds(self.0 & !kind.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = ReferenceKind> {
        ReferenceKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl From<ReferenceKind> for ReferenceKinds {
    fn from(kind: ReferenceKind) -> Self {
        ReferenceKinds(kind.bit())
    }
}

impl FromIterator<ReferenceKind> for ReferenceKinds {
    fn from_iter<I: IntoIterator<Item = ReferenceKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ReferenceKinds::NONE, |mask, kind| mask | kind)
    }
}

impl BitOr for ReferenceKinds {
    type Output = ReferenceKinds;

    fn bitor(self, rhs: ReferenceKinds) -> ReferenceKinds {
        ReferenceKinds(self.0 | rhs.0)
    }
}

impl BitOr<ReferenceKind> for ReferenceKinds {
    type Output = ReferenceKinds;

    fn bitor(self, rhs: ReferenceKind) -> ReferenceKinds {
        ReferenceKinds(self.0 | rhs.bit())
    }
}

impl BitOr for ReferenceKind {
    type Output = ReferenceKinds;

    fn bitor(self, rhs: ReferenceKind) -> ReferenceKinds {
        ReferenceKinds(self.bit() | rhs.bit())
    }
}

impl BitOrAssign for ReferenceKinds {
    fn bitor_assign(&mut self, rhs: ReferenceKinds) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ReferenceKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("UNKNOWN_KIND");
        }
        let names: Vec<&str> = self.iter().map(ReferenceKind::text).collect();
        f.write_str(&names.join(" | "))
    }
}

/// What a reference points at.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Type,
    Field,
    Method,
}

/// Handle on a type, field or method. Type names are qualified (`a.b.C`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(tag = "element", rename_all = "lowercase")]
pub enum MemberHandle {
    Type {
        name: String,
    },
    Field {
        type_name: String,
        name: String,
    },
    Method {
        type_name: String,
        name: String,
        descriptor: String,
    },
}

impl MemberHandle {
    pub fn type_handle(name: impl Into<String>) -> Self {
        MemberHandle::Type { name: name.into() }
    }

    pub fn field(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        MemberHandle::Field {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    pub fn method(
        type_name: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        MemberHandle::Method {
            type_name: type_name.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Qualified name of the type this member is, or is declared in.
    pub fn type_name(&self) -> &str {
        match self {
            MemberHandle::Type { name } => name,
            MemberHandle::Field { type_name, .. } | MemberHandle::Method { type_name, .. } => {
                type_name
            }
        }
    }

    /// Simple member name; the type name for types.
    pub fn name(&self) -> &str {
        match self {
            MemberHandle::Type { name } => name,
            MemberHandle::Field { name, .. } | MemberHandle::Method { name, .. } => name,
        }
    }
}

impl fmt::Display for MemberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberHandle::Type { name } => write!(f, "{name}"),
            MemberHandle::Field { type_name, name } => write!(f, "{type_name}#{name}"),
            MemberHandle::Method {
                type_name,
                name,
                descriptor,
            } => write!(f, "{type_name}#{name}{descriptor}"),
        }
    }
}

/// A recorded dependency of one member on another type or member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reference {
    kind: ReferenceKind,
    flags: u32,
    source: MemberHandle,
    type_name: String,
    member_name: Option<String>,
    signature: Option<String>,
    line_number: i32,
    resolved: Option<MemberHandle>,
    resolvable: bool,
    resolve_attempted: bool,
}

impl Reference {
    fn new(
        source: MemberHandle,
        kind: ReferenceKind,
        type_name: String,
        member_name: Option<String>,
        signature: Option<String>,
        flags: u32,
    ) -> Self {
        Reference {
            kind,
            flags,
            source,
            type_name,
            member_name,
            signature,
            line_number: -1,
            resolved: None,
            resolvable: true,
            resolve_attempted: false,
        }
    }

    pub fn type_reference(
        source: MemberHandle,
        type_name: impl Into<String>,
        kind: ReferenceKind,
    ) -> Self {
        Self::new(source, kind, type_name.into(), None, None, 0)
    }

    /// Type reference carrying the generic signature it was destructured from.
    pub fn signature_type_reference(
        source: MemberHandle,
        type_name: impl Into<String>,
        signature: impl Into<String>,
        kind: ReferenceKind,
    ) -> Self {
        Self::new(source, kind, type_name.into(), None, Some(signature.into()), 0)
    }

    pub fn field_reference(
        source: MemberHandle,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        kind: ReferenceKind,
    ) -> Self {
        Self::new(source, kind, type_name.into(), Some(field_name.into()), None, 0)
    }

    pub fn method_reference(
        source: MemberHandle,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        descriptor: impl Into<String>,
        kind: ReferenceKind,
        flags: u32,
    ) -> Self {
        Self::new(
            source,
            kind,
            type_name.into(),
            Some(method_name.into()),
            Some(descriptor.into()),
            flags,
        )
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn reference_type(&self) -> ReferenceType {
        self.kind.reference_type()
    }

    pub fn source(&self) -> &MemberHandle {
        &self.source
    }

    pub fn referenced_type_name(&self) -> &str {
        &self.type_name
    }

    pub fn referenced_member_name(&self) -> Option<&str> {
        self.member_name.as_deref()
    }

    pub fn referenced_signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// Source line, or -1 when unknown.
    pub fn line_number(&self) -> i32 {
        self.line_number
    }

    pub(crate) fn set_line_number(&mut self, line: i32) {
        self.line_number = line;
    }

    pub fn resolved(&self) -> Option<&MemberHandle> {
        self.resolved.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    pub(crate) fn set_resolved(&mut self, resolved: Option<MemberHandle>) {
        self.resolved = resolved;
        self.resolve_attempted = true;
    }

    pub fn is_resolvable(&self) -> bool {
        self.resolvable
    }

    /// Mark the reference as not worth resolving; the resolver then skips it.
    pub fn set_resolvable(&mut self, resolvable: bool) {
        self.resolvable = resolvable;
    }

    pub fn resolve_attempted(&self) -> bool {
        self.resolve_attempted
    }

    /// Key used for set-based comparisons: kind, source and textual target.
    pub fn identity(&self) -> (ReferenceKind, &MemberHandle, &str, Option<&str>, Option<&str>) {
        (
            self.kind,
            &self.source,
            &self.type_name,
            self.member_name.as_deref(),
            self.signature.as_deref(),
        )
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "From: {}", self.source)?;
        match &self.resolved {
            Some(resolved) => write!(f, "\nResolved To: {resolved}")?,
            None => {
                write!(f, "\nUnresolved To: {}", self.type_name)?;
                if let Some(member) = &self.member_name {
                    write!(f, "#{member}")?;
                }
                if let Some(signature) = &self.signature {
                    write!(f, "#{signature}")?;
                }
            }
        }
        write!(f, "\nKind: {}", self.kind)
    }
}

/// Value key for methods, used to place methods in sets without double counting.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MethodKey {
    pub type_name: String,
    pub name: String,
    pub descriptor: String,
    pub is_constructor: bool,
}

impl MethodKey {
    pub fn new(type_name: &str, name: &str, descriptor: &str) -> Self {
        MethodKey {
            type_name: type_name.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_constructor: name == "<init>",
        }
    }

    /// Key of the method a reference points at, if it is a method reference.
    pub fn of_target(reference: &Reference) -> Option<Self> {
        if reference.reference_type() != ReferenceType::Method {
            return None;
        }
        Some(MethodKey::new(
            reference.referenced_type_name(),
            reference.referenced_member_name()?,
            reference.referenced_signature()?,
        ))
    }
}
