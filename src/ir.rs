/// Binary type model: a read-only structural view of one parsed class file.
///
/// Names are kept in internal form (`a/b/C`) exactly as the class file stores them;
/// use [`crate::descriptor::qualified_name`] to get the dotted form used by references.
#[derive(Clone, Debug)]
pub struct Class {
    pub name: String,
    pub access: ClassAccess,
    pub major_version: u16,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub signature: Option<String>,
    pub annotations: Vec<String>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    /// Entries of the InnerClasses attribute other than this class itself.
    pub nested_types: Vec<NestedType>,
    /// Set when this class is itself a member, local or anonymous type.
    pub nesting: Option<NestedType>,
    pub artifact_index: i64,
}

impl Class {
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Class files from Java 8 on may carry interface methods with bodies.
    pub fn supports_default_methods(&self) -> bool {
        self.major_version >= 52
    }
}

/// Class access flags needed by extraction and resolution.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ClassAccess {
    pub is_public: bool,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_synthetic: bool,
    pub is_annotation: bool,
    pub is_enum: bool,
}

/// One InnerClasses entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NestedType {
    pub name: String,
    pub outer_name: Option<String>,
    pub kind: NestedKind,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum NestedKind {
    Member,
    Local,
    Anonymous,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub access: FieldAccess,
    pub annotations: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FieldAccess {
    pub is_static: bool,
    pub is_private: bool,
    pub is_synthetic: bool,
}

/// Intermediate representation for a method and its bytecode.
#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub access: MethodAccess,
    pub exceptions: Vec<String>,
    pub annotations: Vec<String>,
    pub code: Option<Code>,
}

impl Method {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_class_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    /// An interface method that carries a body and can be inherited as is.
    pub fn is_default(&self) -> bool {
        !self.access.is_abstract && !self.access.is_static && !self.access.is_private
    }

    /// Signature-polymorphic methods as declared on `MethodHandle` and `VarHandle`.
    pub fn is_signature_polymorphic(&self) -> bool {
        self.access.is_native
            && self.access.is_varargs
            && self.descriptor.starts_with("([Ljava/lang/Object;)")
    }
}

/// Method access flags used for extraction and resolution.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MethodAccess {
    pub is_public: bool,
    pub is_protected: bool,
    pub is_private: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_native: bool,
    pub is_synthetic: bool,
    pub is_bridge: bool,
    pub is_varargs: bool,
}

/// Decoded Code attribute.
#[derive(Clone, Debug, Default)]
pub struct Code {
    pub length: u32,
    pub instructions: Vec<Instruction>,
    pub exception_handlers: Vec<ExceptionHandler>,
    pub line_numbers: Vec<LineNumber>,
    pub local_variables: Vec<LocalVariable>,
}

/// Exception handler metadata from the Code attribute.
#[derive(Clone, Debug)]
pub struct ExceptionHandler {
    pub start_pc: u32,
    pub end_pc: u32,
    pub handler_pc: u32,
    pub catch_type: Option<String>,
}

/// LineNumberTable entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineNumber {
    pub start_pc: u32,
    pub line: u32,
}

/// LocalVariableTable entry, merged with the LocalVariableTypeTable signature when present.
#[derive(Clone, Debug)]
pub struct LocalVariable {
    pub start_pc: u32,
    pub length: u32,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub index: u16,
}

/// Bytecode instruction captured for analysis.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: u8,
    pub kind: InstructionKind,
}

/// Instruction kinds needed for reference extraction.
#[derive(Clone, Debug)]
pub enum InstructionKind {
    Invoke(CallSite),
    Field(FieldSite),
    /// `new`, `anewarray`, `checkcast` and `instanceof` with their class operand.
    Type(String),
    MultiNewArray(String),
    ConstString(String),
    ConstClass(String),
    /// Reference store into a local slot.
    Store(u16),
    Other,
}

/// Call site extracted from bytecode.
#[derive(Clone, Debug)]
pub struct CallSite {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub kind: CallKind,
}

/// Call opcode classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CallKind {
    Virtual,
    Interface,
    Special,
    Static,
    Dynamic,
}

/// Field access extracted from bytecode.
#[derive(Clone, Debug)]
pub struct FieldSite {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub kind: FieldAccessKind,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldAccessKind {
    Get,
    Put,
    GetStatic,
    PutStatic,
}

/// A type that could not be read or extracted; the rest of the batch carries on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TypeFailure {
    pub type_name: String,
    pub message: String,
}
