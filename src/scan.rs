use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jclassfile::attributes::Attribute;
use jclassfile::class_file::{self, ClassFlags};
use jclassfile::constant_pool::ConstantPool;
use jclassfile::fields::FieldFlags;
use jclassfile::methods::MethodFlags;
use serde_json::Value;
use serde_sarif::sarif::{Artifact, ArtifactLocation, ArtifactRoles};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::ir::{
    CallKind, CallSite, Class, ClassAccess, Code, ExceptionHandler, Field, FieldAccess,
    FieldAccessKind, FieldSite, Instruction, InstructionKind, LineNumber, LocalVariable, Method,
    MethodAccess, NestedKind, NestedType, TypeFailure,
};
use crate::opcodes;

/// Classes read from the input and baseline paths, with the artifacts they came from.
#[derive(Debug, Default)]
pub struct ScanOutput {
    pub artifacts: Vec<Artifact>,
    /// Classes under analysis.
    pub classes: Vec<Class>,
    /// Classes that only complete the type universe.
    pub baseline: Vec<Class>,
    /// Class files that could not be read; scanning carried on without them.
    pub failures: Vec<TypeFailure>,
}

impl ScanOutput {
    pub fn class_count(&self) -> usize {
        self.classes.len() + self.baseline.len()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Role {
    Input,
    Baseline,
}

pub fn scan_inputs(input: &Path, baseline: &[PathBuf]) -> Result<ScanOutput> {
    let mut output = ScanOutput::default();
    scan_path(input, Role::Input, true, &mut output)?;
    scan_entries(baseline, &mut output)?;
    info!(
        classes = output.classes.len(),
        baseline = output.baseline.len(),
        failures = output.failures.len(),
        "scanned inputs"
    );
    Ok(output)
}

/// Scan paths whose classes only serve as a type universe, such as environment stubs.
pub fn scan_baseline(paths: &[PathBuf]) -> Result<ScanOutput> {
    let mut output = ScanOutput::default();
    scan_entries(paths, &mut output)?;
    Ok(output)
}

fn scan_entries(paths: &[PathBuf], output: &mut ScanOutput) -> Result<()> {
    // Keep deterministic ordering by sorting entries and directory listings.
    let mut entries = paths.to_vec();
    entries.sort_by_key(|entry| path_key(entry));
    for entry in entries {
        scan_path(&entry, Role::Baseline, true, output)?;
    }
    Ok(())
}

fn scan_path(path: &Path, role: Role, strict: bool, output: &mut ScanOutput) -> Result<()> {
    if path.is_dir() {
        return scan_dir(path, role, output);
    }

    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    let roles = match role {
        Role::Input if strict => Some(vec![
            serde_json::to_value(ArtifactRoles::AnalysisTarget)
                .context("serialize artifact role")?,
        ]),
        _ => None,
    };

    match extension {
        "class" => scan_class_file(path, role, roles, output),
        "jar" => scan_jar_file(path, role, roles, output),
        _ => {
            if strict {
                anyhow::bail!("unsupported input file: {}", path.display())
            } else {
                Ok(())
            }
        }
    }
}

fn scan_dir(path: &Path, role: Role, output: &mut ScanOutput) -> Result<()> {
    let mut entries = Vec::new();
    for entry in
        fs::read_dir(path).with_context(|| format!("failed to read directory {}", path.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry under {}", path.display()))?;
        entries.push(entry.path());
    }

    entries.sort_by_key(|entry| path_key(entry));

    for entry in entries {
        if entry.is_dir() {
            scan_dir(&entry, role, output)?;
        } else {
            scan_path(&entry, role, false, output)?;
        }
    }

    Ok(())
}

fn scan_class_file(
    path: &Path,
    role: Role,
    roles: Option<Vec<Value>>,
    output: &mut ScanOutput,
) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let artifact_index =
        push_path_artifact(path, roles, data.len() as u64, None, &mut output.artifacts);
    accept_class(&path_to_uri(path), &data, artifact_index, role, output);
    Ok(())
}

fn scan_jar_file(
    path: &Path,
    role: Role,
    roles: Option<Vec<Value>>,
    output: &mut ScanOutput,
) -> Result<()> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("failed to read {}", path.display()))?;

    let jar_len = fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .len();
    let jar_index = push_path_artifact(path, roles, jar_len, None, &mut output.artifacts);

    let mut entry_names = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.ends_with(".class") && !name.ends_with("module-info.class") {
            entry_names.push(name);
        }
    }

    entry_names.sort();

    for name in entry_names {
        let mut entry = archive
            .by_name(&name)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;

        let entry_uri = jar_entry_uri(path, &name);
        let artifact_index = push_artifact(
            entry_uri.clone(),
            entry.size(),
            Some(jar_index),
            None,
            &mut output.artifacts,
        );
        accept_class(&entry_uri, &data, artifact_index, role, output);
    }

    Ok(())
}

/// Parse one class body; a malformed one is recorded as a failure and skipped.
fn accept_class(uri: &str, data: &[u8], artifact_index: i64, role: Role, output: &mut ScanOutput) {
    match parse_class(data, artifact_index) {
        Ok(class) => {
            debug!(class = %class.name, uri, "parsed class");
            match role {
                Role::Input => output.classes.push(class),
                Role::Baseline => output.baseline.push(class),
            }
        }
        Err(err) => {
            let message = format!("{err:#}");
            warn!(uri, error = %message, "skipping unreadable class file");
            output.failures.push(TypeFailure {
                type_name: uri.to_string(),
                message,
            });
        }
    }
}

/// Push a path-based artifact and return its index for parent linkage (e.g., JAR entries).
fn push_path_artifact(
    path: &Path,
    roles: Option<Vec<Value>>,
    len: u64,
    parent_index: Option<i64>,
    artifacts: &mut Vec<Artifact>,
) -> i64 {
    push_artifact(path_to_uri(path), len, parent_index, roles, artifacts)
}

fn push_artifact(
    uri: String,
    len: u64,
    parent_index: Option<i64>,
    roles: Option<Vec<Value>>,
    artifacts: &mut Vec<Artifact>,
) -> i64 {
    let location = ArtifactLocation::builder().uri(uri).build();
    let artifact = match (parent_index, roles) {
        (Some(parent_index), Some(roles)) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .parent_index(parent_index)
            .roles(roles)
            .build(),
        (Some(parent_index), None) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .parent_index(parent_index)
            .build(),
        (None, Some(roles)) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .roles(roles)
            .build(),
        (None, None) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .build(),
    };
    let index = artifacts.len() as i64;
    artifacts.push(artifact);
    index
}

fn path_to_uri(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn jar_entry_uri(jar_path: &Path, entry_name: &str) -> String {
    format!("jar:{}!/{}", jar_path.to_string_lossy(), entry_name)
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Build the binary type model of one class file.
pub fn parse_class(data: &[u8], artifact_index: i64) -> Result<Class> {
    let class_file = class_file::parse(data).context("failed to parse class file bytes")?;
    let constant_pool = class_file.constant_pool();
    let name =
        resolve_class_name(constant_pool, class_file.this_class()).context("resolve class name")?;
    let super_name = if class_file.super_class() == 0 {
        None
    } else {
        Some(
            resolve_class_name(constant_pool, class_file.super_class())
                .context("resolve super class name")?,
        )
    };
    let mut interfaces = Vec::new();
    for interface in class_file.interfaces() {
        interfaces
            .push(resolve_class_name(constant_pool, *interface).context("resolve interface name")?);
    }

    let flags = class_file.access_flags();
    let access = ClassAccess {
        is_public: flags.contains(ClassFlags::ACC_PUBLIC),
        is_interface: flags.contains(ClassFlags::ACC_INTERFACE),
        is_abstract: flags.contains(ClassFlags::ACC_ABSTRACT),
        is_synthetic: flags.contains(ClassFlags::ACC_SYNTHETIC),
        is_annotation: flags.contains(ClassFlags::ACC_ANNOTATION),
        is_enum: flags.contains(ClassFlags::ACC_ENUM),
    };
    let attributes = class_file.attributes();
    let (nesting, nested_types) =
        parse_inner_classes(constant_pool, attributes, &name).context("parse inner classes")?;

    Ok(Class {
        major_version: major_version(data)?,
        access,
        super_name,
        interfaces,
        signature: parse_signature(constant_pool, attributes).context("parse class signature")?,
        annotations: parse_annotations(constant_pool, attributes)
            .context("parse class annotations")?,
        fields: parse_fields(constant_pool, class_file.fields()).context("parse fields")?,
        methods: parse_methods(constant_pool, class_file.methods())
            .with_context(|| format!("parse methods of {name}"))?,
        nested_types,
        nesting,
        artifact_index,
        name,
    })
}

/// Major version sits right after the magic number and the minor version.
fn major_version(data: &[u8]) -> Result<u16> {
    read_u16(data, 6).context("read class file version")
}

fn parse_fields(
    constant_pool: &[ConstantPool],
    fields: &[jclassfile::fields::FieldInfo],
) -> Result<Vec<Field>> {
    let mut parsed = Vec::new();
    for field in fields {
        let name = resolve_utf8(constant_pool, field.name_index()).context("resolve field name")?;
        let descriptor = resolve_utf8(constant_pool, field.descriptor_index())
            .context("resolve field descriptor")?;
        let flags = field.access_flags();
        let access = FieldAccess {
            is_static: flags.contains(FieldFlags::ACC_STATIC),
            is_private: flags.contains(FieldFlags::ACC_PRIVATE),
            is_synthetic: flags.contains(FieldFlags::ACC_SYNTHETIC),
        };
        parsed.push(Field {
            signature: parse_signature(constant_pool, field.attributes())
                .with_context(|| format!("parse signature of field {name}"))?,
            annotations: parse_annotations(constant_pool, field.attributes())
                .with_context(|| format!("parse annotations of field {name}"))?,
            name,
            descriptor,
            access,
        });
    }
    Ok(parsed)
}

fn parse_methods(
    constant_pool: &[ConstantPool],
    methods: &[jclassfile::methods::MethodInfo],
) -> Result<Vec<Method>> {
    let mut parsed = Vec::new();
    for method in methods {
        let name =
            resolve_utf8(constant_pool, method.name_index()).context("resolve method name")?;
        let descriptor = resolve_utf8(constant_pool, method.descriptor_index())
            .context("resolve method descriptor")?;
        let flags = method.access_flags();
        let access = MethodAccess {
            is_public: flags.contains(MethodFlags::ACC_PUBLIC),
            is_protected: flags.contains(MethodFlags::ACC_PROTECTED),
            is_private: flags.contains(MethodFlags::ACC_PRIVATE),
            is_static: flags.contains(MethodFlags::ACC_STATIC),
            is_abstract: flags.contains(MethodFlags::ACC_ABSTRACT),
            is_native: flags.contains(MethodFlags::ACC_NATIVE),
            is_synthetic: flags.contains(MethodFlags::ACC_SYNTHETIC),
            is_bridge: flags.contains(MethodFlags::ACC_BRIDGE),
            is_varargs: flags.contains(MethodFlags::ACC_VARARGS),
        };
        let attributes = method.attributes();
        let code = attributes
            .iter()
            .find_map(|attribute| match attribute {
                Attribute::Code {
                    code,
                    exception_table,
                    attributes,
                    ..
                } => Some(parse_code(constant_pool, code, exception_table, attributes)),
                _ => None,
            })
            .transpose()
            .with_context(|| format!("parse code of {name}{descriptor}"))?;
        parsed.push(Method {
            signature: parse_signature(constant_pool, attributes)
                .with_context(|| format!("parse signature of {name}"))?,
            exceptions: parse_exceptions(constant_pool, attributes)
                .with_context(|| format!("parse exceptions of {name}"))?,
            annotations: parse_annotations(constant_pool, attributes)
                .with_context(|| format!("parse annotations of {name}"))?,
            name,
            descriptor,
            access,
            code,
        });
    }
    Ok(parsed)
}

fn parse_code(
    constant_pool: &[ConstantPool],
    code: &[u8],
    exception_table: &[jclassfile::attributes::ExceptionRecord],
    attributes: &[Attribute],
) -> Result<Code> {
    Ok(Code {
        length: code.len() as u32,
        instructions: parse_bytecode(code, constant_pool).context("parse bytecode")?,
        exception_handlers: parse_exception_handlers(exception_table, constant_pool)
            .context("parse exception handlers")?,
        line_numbers: parse_line_numbers(attributes),
        local_variables: parse_local_variables(constant_pool, attributes)
            .context("parse local variables")?,
    })
}

fn parse_line_numbers(attributes: &[Attribute]) -> Vec<LineNumber> {
    let mut entries = Vec::new();
    for attribute in attributes {
        let Attribute::LineNumberTable { line_number_table } = attribute else {
            continue;
        };
        for record in line_number_table {
            entries.push(LineNumber {
                start_pc: record.start_pc() as u32,
                line: record.line_number() as u32,
            });
        }
    }
    entries.sort_by_key(|entry| entry.start_pc);
    entries
}

/// LocalVariableTable entries, with the generic signature of the matching
/// LocalVariableTypeTable entry when there is one.
fn parse_local_variables(
    constant_pool: &[ConstantPool],
    attributes: &[Attribute],
) -> Result<Vec<LocalVariable>> {
    let mut variables = Vec::new();
    let mut signatures = Vec::new();
    for attribute in attributes {
        match attribute {
            Attribute::LocalVariableTable {
                local_variable_table,
            } => {
                for record in local_variable_table {
                    variables.push(LocalVariable {
                        start_pc: record.start_pc() as u32,
                        length: record.length() as u32,
                        name: resolve_utf8(constant_pool, record.name_index())
                            .context("resolve local variable name")?,
                        descriptor: resolve_utf8(constant_pool, record.descriptor_index())
                            .context("resolve local variable descriptor")?,
                        signature: None,
                        index: record.index(),
                    });
                }
            }
            Attribute::LocalVariableTypeTable {
                local_variable_type_table,
            } => {
                for record in local_variable_type_table {
                    let signature = resolve_utf8(constant_pool, record.signature_index())
                        .context("resolve local variable signature")?;
                    signatures.push((record.start_pc() as u32, record.index(), signature));
                }
            }
            _ => {}
        }
    }
    for (start_pc, index, signature) in signatures {
        if let Some(variable) = variables
            .iter_mut()
            .find(|variable| variable.start_pc == start_pc && variable.index == index)
        {
            variable.signature = Some(signature);
        }
    }
    variables.sort_by_key(|variable| (variable.start_pc, variable.index));
    Ok(variables)
}

fn parse_exception_handlers(
    table: &[jclassfile::attributes::ExceptionRecord],
    constant_pool: &[ConstantPool],
) -> Result<Vec<ExceptionHandler>> {
    let mut handlers = Vec::new();
    for entry in table {
        let catch_type = if entry.catch_type() == 0 {
            None
        } else {
            Some(
                resolve_class_name(constant_pool, entry.catch_type())
                    .context("resolve catch type")?,
            )
        };
        handlers.push(ExceptionHandler {
            start_pc: entry.start_pc() as u32,
            end_pc: entry.end_pc() as u32,
            handler_pc: entry.handler_pc() as u32,
            catch_type,
        });
    }
    Ok(handlers)
}

fn parse_signature(
    constant_pool: &[ConstantPool],
    attributes: &[Attribute],
) -> Result<Option<String>> {
    for attribute in attributes {
        if let Attribute::Signature { signature_index } = attribute {
            return resolve_utf8(constant_pool, *signature_index).map(Some);
        }
    }
    Ok(None)
}

fn parse_exceptions(
    constant_pool: &[ConstantPool],
    attributes: &[Attribute],
) -> Result<Vec<String>> {
    let mut exceptions = Vec::new();
    for attribute in attributes {
        let Attribute::Exceptions {
            exception_index_table,
        } = attribute
        else {
            continue;
        };
        for index in exception_index_table {
            exceptions.push(resolve_class_name(constant_pool, *index)?);
        }
    }
    Ok(exceptions)
}

/// Annotation types, visible and invisible, as internal names.
fn parse_annotations(
    constant_pool: &[ConstantPool],
    attributes: &[Attribute],
) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for attribute in attributes {
        let annotations = match attribute {
            Attribute::RuntimeVisibleAnnotations { annotations, .. }
            | Attribute::RuntimeInvisibleAnnotations { annotations, .. } => annotations,
            _ => continue,
        };
        for annotation in annotations {
            names.push(annotation_class_name(constant_pool, annotation)?);
        }
    }
    Ok(names)
}

fn annotation_class_name(
    constant_pool: &[ConstantPool],
    annotation: &jclassfile::attributes::Annotation,
) -> Result<String> {
    let descriptor =
        resolve_utf8(constant_pool, annotation.type_index()).context("resolve annotation type")?;
    let trimmed = descriptor
        .strip_prefix('L')
        .and_then(|value| value.strip_suffix(';'))
        .context("invalid annotation descriptor")?;
    Ok(trimmed.to_string())
}

/// Split InnerClasses entries into this class's own nesting and the other entries.
fn parse_inner_classes(
    constant_pool: &[ConstantPool],
    attributes: &[Attribute],
    class_name: &str,
) -> Result<(Option<NestedType>, Vec<NestedType>)> {
    let mut nesting = None;
    let mut nested_types = Vec::new();
    for attribute in attributes {
        let Attribute::InnerClasses { classes } = attribute else {
            continue;
        };
        for record in classes {
            let name = resolve_class_name(constant_pool, record.inner_class_info_index())
                .context("resolve inner class name")?;
            let outer_name = match record.outer_class_info_index() {
                0 => None,
                index => Some(
                    resolve_class_name(constant_pool, index).context("resolve outer class name")?,
                ),
            };
            let kind = if record.inner_name_index() == 0 {
                NestedKind::Anonymous
            } else if outer_name.is_none() {
                NestedKind::Local
            } else {
                NestedKind::Member
            };
            let entry = NestedType {
                name,
                outer_name,
                kind,
            };
            if entry.name == class_name {
                nesting = Some(entry);
            } else {
                nested_types.push(entry);
            }
        }
    }
    Ok((nesting, nested_types))
}

/// Decode a Code attribute's bytes into the instructions extraction cares about.
pub(crate) fn parse_bytecode(
    code: &[u8],
    constant_pool: &[ConstantPool],
) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0usize;
    while offset < code.len() {
        let opcode = code[offset];
        let length = opcode_length(code, offset)?;
        if length == 0 || offset + length > code.len() {
            anyhow::bail!("invalid bytecode length at offset {}", offset);
        }
        let kind = decode(code, offset, opcode, constant_pool)
            .with_context(|| format!("decode opcode 0x{opcode:02x} at offset {offset}"))?;
        instructions.push(Instruction {
            offset: offset as u32,
            opcode,
            kind,
        });
        offset += length;
    }
    Ok(instructions)
}

fn decode(
    code: &[u8],
    offset: usize,
    opcode: u8,
    constant_pool: &[ConstantPool],
) -> Result<InstructionKind> {
    let kind = match opcode {
        opcodes::INVOKEVIRTUAL
        | opcodes::INVOKESPECIAL
        | opcodes::INVOKESTATIC
        | opcodes::INVOKEINTERFACE => {
            let member = resolve_member_ref(constant_pool, read_u16(code, offset + 1)?)
                .context("resolve method ref")?;
            let kind = match opcode {
                opcodes::INVOKEVIRTUAL => CallKind::Virtual,
                opcodes::INVOKESPECIAL => CallKind::Special,
                opcodes::INVOKESTATIC => CallKind::Static,
                _ => CallKind::Interface,
            };
            InstructionKind::Invoke(CallSite {
                owner: member.owner,
                name: member.name,
                descriptor: member.descriptor,
                kind,
            })
        }
        opcodes::INVOKEDYNAMIC => {
            let (name, descriptor) = resolve_dynamic(constant_pool, read_u16(code, offset + 1)?)
                .context("resolve invokedynamic")?;
            InstructionKind::Invoke(CallSite {
                owner: String::new(),
                name,
                descriptor,
                kind: CallKind::Dynamic,
            })
        }
        opcodes::GETFIELD | opcodes::PUTFIELD | opcodes::GETSTATIC | opcodes::PUTSTATIC => {
            let member = resolve_member_ref(constant_pool, read_u16(code, offset + 1)?)
                .context("resolve field ref")?;
            let kind = match opcode {
                opcodes::GETFIELD => FieldAccessKind::Get,
                opcodes::PUTFIELD => FieldAccessKind::Put,
                opcodes::GETSTATIC => FieldAccessKind::GetStatic,
                _ => FieldAccessKind::PutStatic,
            };
            InstructionKind::Field(FieldSite {
                owner: member.owner,
                name: member.name,
                descriptor: member.descriptor,
                kind,
            })
        }
        opcodes::NEW | opcodes::ANEWARRAY | opcodes::CHECKCAST | opcodes::INSTANCEOF => {
            InstructionKind::Type(resolve_class_name(constant_pool, read_u16(code, offset + 1)?)?)
        }
        opcodes::MULTIANEWARRAY => InstructionKind::MultiNewArray(resolve_class_name(
            constant_pool,
            read_u16(code, offset + 1)?,
        )?),
        opcodes::LDC => {
            let index = code.get(offset + 1).copied().context("ldc index")? as u16;
            resolve_constant(constant_pool, index)?
        }
        opcodes::LDC_W => resolve_constant(constant_pool, read_u16(code, offset + 1)?)?,
        opcodes::ASTORE => {
            InstructionKind::Store(code.get(offset + 1).copied().context("astore index")? as u16)
        }
        opcodes::ASTORE_0..=opcodes::ASTORE_3 => {
            InstructionKind::Store((opcode - opcodes::ASTORE_0) as u16)
        }
        opcodes::WIDE if code.get(offset + 1) == Some(&opcodes::ASTORE) => {
            InstructionKind::Store(read_u16(code, offset + 2)?)
        }
        _ => InstructionKind::Other,
    };
    Ok(kind)
}

/// Owner, name and descriptor of a field or method constant.
struct MemberRef {
    owner: String,
    name: String,
    descriptor: String,
}

fn resolve_member_ref(constant_pool: &[ConstantPool], index: u16) -> Result<MemberRef> {
    let entry = constant_pool
        .get(index as usize)
        .context("missing member ref entry")?;
    let (class_index, name_and_type_index) = match entry {
        ConstantPool::Fieldref {
            class_index,
            name_and_type_index,
        }
        | ConstantPool::Methodref {
            class_index,
            name_and_type_index,
        }
        | ConstantPool::InterfaceMethodref {
            class_index,
            name_and_type_index,
        } => (*class_index, *name_and_type_index),
        _ => anyhow::bail!("unexpected member ref entry"),
    };
    let owner = resolve_class_name(constant_pool, class_index).context("resolve owner")?;
    let (name, descriptor) = resolve_name_and_type(constant_pool, name_and_type_index)?;
    Ok(MemberRef {
        owner,
        name,
        descriptor,
    })
}

fn resolve_dynamic(constant_pool: &[ConstantPool], index: u16) -> Result<(String, String)> {
    let entry = constant_pool
        .get(index as usize)
        .context("missing invokedynamic entry")?;
    match entry {
        ConstantPool::InvokeDynamic {
            name_and_type_index,
            ..
        } => resolve_name_and_type(constant_pool, *name_and_type_index),
        _ => anyhow::bail!("unexpected invokedynamic entry"),
    }
}

fn resolve_name_and_type(constant_pool: &[ConstantPool], index: u16) -> Result<(String, String)> {
    let entry = constant_pool
        .get(index as usize)
        .context("missing name and type entry")?;
    match entry {
        ConstantPool::NameAndType {
            name_index,
            descriptor_index,
        } => Ok((
            resolve_utf8(constant_pool, *name_index).context("resolve member name")?,
            resolve_utf8(constant_pool, *descriptor_index).context("resolve member descriptor")?,
        )),
        _ => anyhow::bail!("unexpected name and type entry"),
    }
}

/// String and class constants loaded by `ldc`; numeric constants are of no interest.
fn resolve_constant(constant_pool: &[ConstantPool], index: u16) -> Result<InstructionKind> {
    let entry = constant_pool
        .get(index as usize)
        .context("missing constant pool entry")?;
    let kind = match entry {
        ConstantPool::String { string_index } => {
            InstructionKind::ConstString(resolve_utf8(constant_pool, *string_index)?)
        }
        ConstantPool::Class { name_index } => {
            InstructionKind::ConstClass(resolve_utf8(constant_pool, *name_index)?)
        }
        _ => InstructionKind::Other,
    };
    Ok(kind)
}

fn resolve_class_name(constant_pool: &[ConstantPool], class_index: u16) -> Result<String> {
    let entry = constant_pool
        .get(class_index as usize)
        .context("missing class entry")?;
    match entry {
        ConstantPool::Class { name_index } => resolve_utf8(constant_pool, *name_index),
        _ => anyhow::bail!("unexpected class entry"),
    }
}

fn resolve_utf8(constant_pool: &[ConstantPool], index: u16) -> Result<String> {
    let entry = constant_pool
        .get(index as usize)
        .context("missing utf8 entry")?;
    match entry {
        ConstantPool::Utf8 { value } => Ok(value.clone()),
        _ => anyhow::bail!("unexpected utf8 entry"),
    }
}

fn opcode_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = code[offset];
    let length = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        opcodes::LDC => 2,
        opcodes::LDC_W | opcodes::LDC2_W => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=opcodes::ASTORE => 2,
        0x3b..=0x83 => 1,
        opcodes::IINC => 3,
        0x85..=0x98 => 1,
        0x99..=0xa6 => 3,
        opcodes::GOTO | opcodes::JSR => 3,
        opcodes::RET => 2,
        opcodes::TABLESWITCH => tableswitch_length(code, offset)?,
        opcodes::LOOKUPSWITCH => lookupswitch_length(code, offset)?,
        0xac..=0xb1 => 1,
        opcodes::GETSTATIC..=opcodes::PUTFIELD => 3,
        opcodes::INVOKEVIRTUAL | opcodes::INVOKESPECIAL | opcodes::INVOKESTATIC => 3,
        opcodes::INVOKEINTERFACE | opcodes::INVOKEDYNAMIC => 5,
        opcodes::NEW => 3,
        opcodes::NEWARRAY => 2,
        opcodes::ANEWARRAY => 3,
        0xbe | 0xbf => 1,
        opcodes::CHECKCAST | opcodes::INSTANCEOF => 3,
        0xc2 | 0xc3 => 1,
        opcodes::WIDE => wide_length(code, offset)?,
        opcodes::MULTIANEWARRAY => 4,
        0xc6 | 0xc7 => 3,
        opcodes::GOTO_W | opcodes::JSR_W => 5,
        0xca => 1,
        0xfe | 0xff => 1,
        _ => anyhow::bail!("unsupported opcode 0x{:02x}", opcode),
    };
    Ok(length)
}

fn tableswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let padding = padding(offset);
    let base = offset + 1 + padding;
    let low = read_i32(code, base + 4)?;
    let high = read_i32(code, base + 8)?;
    let count = high
        .checked_sub(low)
        .and_then(|v| v.checked_add(1))
        .context("invalid tableswitch range")?;
    if count < 0 {
        anyhow::bail!("invalid tableswitch range");
    }
    Ok(1 + padding + 12 + (count as usize) * 4)
}

fn lookupswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let padding = padding(offset);
    let base = offset + 1 + padding;
    let npairs = read_i32(code, base + 4)?;
    if npairs < 0 {
        anyhow::bail!("invalid lookupswitch pairs");
    }
    Ok(1 + padding + 8 + (npairs as usize) * 8)
}

fn wide_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = code
        .get(offset + 1)
        .copied()
        .context("missing wide opcode")?;
    if opcode == opcodes::IINC { Ok(6) } else { Ok(4) }
}

/// Switch operands start on the next four-byte boundary.
fn padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

fn read_u16(code: &[u8], offset: usize) -> Result<u16> {
    let slice = code
        .get(offset..offset + 2)
        .context("bytecode u16 out of bounds")?;
    Ok(u16::from_be_bytes([slice[0], slice[1]]))
}

fn read_i32(code: &[u8], offset: usize) -> Result<i32> {
    let slice = code
        .get(offset..offset + 4)
        .context("bytecode i32 out of bounds")?;
    Ok(i32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Hand-assembled class file: `public class app.Main` with one static
    /// method `run()V` whose body is `lib.Api.call()` at line 7.
    fn main_class_bytes() -> Vec<u8> {
        let mut pool = ConstantPoolWriter::default();
        let this_class = pool.class("app/Main");
        let super_class = pool.class("java/lang/Object");
        let run = pool.utf8("run");
        let descriptor = pool.utf8("()V");
        let code_name = pool.utf8("Code");
        let lines_name = pool.utf8("LineNumberTable");
        let call = pool.method_ref("lib/Api", "call", "()V");

        let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe, 0x00, 0x00, 0x00, 0x34];
        bytes.extend(pool.finish());
        push_u16(&mut bytes, 0x0021);
        push_u16(&mut bytes, this_class);
        push_u16(&mut bytes, super_class);
        push_u16(&mut bytes, 0); // interfaces
        push_u16(&mut bytes, 0); // fields
        push_u16(&mut bytes, 1); // methods
        push_u16(&mut bytes, 0x0009);
        push_u16(&mut bytes, run);
        push_u16(&mut bytes, descriptor);
        push_u16(&mut bytes, 1);

        let body = [opcodes::INVOKESTATIC, (call >> 8) as u8, call as u8, 0xb1];
        let mut lines = Vec::new();
        push_u16(&mut lines, lines_name);
        push_u32(&mut lines, 6);
        push_u16(&mut lines, 1);
        push_u16(&mut lines, 0);
        push_u16(&mut lines, 7);

        let mut code = Vec::new();
        push_u16(&mut code, 0); // max_stack
        push_u16(&mut code, 0); // max_locals
        push_u32(&mut code, body.len() as u32);
        code.extend(body);
        push_u16(&mut code, 0); // exception table
        push_u16(&mut code, 1);
        code.extend(lines);

        push_u16(&mut bytes, code_name);
        push_u32(&mut bytes, code.len() as u32);
        bytes.extend(code);
        push_u16(&mut bytes, 0); // class attributes
        bytes
    }

    #[derive(Default)]
    struct ConstantPoolWriter {
        bytes: Vec<u8>,
        count: u16,
    }

    impl ConstantPoolWriter {
        fn next(&mut self, tag: u8) -> u16 {
            self.count += 1;
            self.bytes.push(tag);
            self.count
        }

        fn utf8(&mut self, value: &str) -> u16 {
            let index = self.next(1);
            push_u16(&mut self.bytes, value.len() as u16);
            self.bytes.extend(value.as_bytes());
            index
        }

        fn class(&mut self, name: &str) -> u16 {
            let name = self.utf8(name);
            let index = self.next(7);
            push_u16(&mut self.bytes, name);
            index
        }

        fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
            let owner = self.class(owner);
            let name = self.utf8(name);
            let descriptor = self.utf8(descriptor);
            let name_and_type = self.next(12);
            push_u16(&mut self.bytes, name);
            push_u16(&mut self.bytes, descriptor);
            let index = self.next(10);
            push_u16(&mut self.bytes, owner);
            push_u16(&mut self.bytes, name_and_type);
            index
        }

        fn finish(self) -> Vec<u8> {
            let mut bytes = Vec::new();
            push_u16(&mut bytes, self.count + 1);
            bytes.extend(self.bytes);
            bytes
        }
    }

    fn push_u16(bytes: &mut Vec<u8>, value: u16) {
        bytes.extend(value.to_be_bytes());
    }

    fn push_u32(bytes: &mut Vec<u8>, value: u32) {
        bytes.extend(value.to_be_bytes());
    }

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).expect("create jar");
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start jar entry");
            writer.write_all(data).expect("write jar entry");
        }
        writer.finish().expect("finish jar");
    }

    #[test]
    fn parse_class_builds_type_model() {
        let class = parse_class(&main_class_bytes(), 3).expect("parse class");

        assert_eq!(class.name, "app/Main");
        assert_eq!(class.super_name.as_deref(), Some("java/lang/Object"));
        assert_eq!(class.major_version, 52);
        assert_eq!(class.artifact_index, 3);
        assert!(class.access.is_public);
        assert!(!class.access.is_interface);

        let method = class.find_method("run", "()V").expect("run method");
        assert!(method.access.is_static);
        let code = method.code.as_ref().expect("code");
        assert_eq!(code.length, 4);
        assert_eq!(code.line_numbers, vec![LineNumber { start_pc: 0, line: 7 }]);
        match &code.instructions[0].kind {
            InstructionKind::Invoke(call) => {
                assert_eq!(call.owner, "lib/Api");
                assert_eq!(call.name, "call");
                assert_eq!(call.descriptor, "()V");
                assert_eq!(call.kind, CallKind::Static);
            }
            other => panic!("unexpected instruction {other:?}"),
        }
        assert!(matches!(code.instructions[1].kind, InstructionKind::Other));
    }

    #[test]
    fn parse_bytecode_follows_switch_padding_and_wide_stores() {
        let mut code = vec![opcodes::TABLESWITCH, 0, 0, 0];
        code.extend(8i32.to_be_bytes()); // default
        code.extend(0i32.to_be_bytes()); // low
        code.extend(1i32.to_be_bytes()); // high
        code.extend(8i32.to_be_bytes());
        code.extend(8i32.to_be_bytes());
        code.push(opcodes::ASTORE_0 + 1);
        code.extend([opcodes::WIDE, opcodes::ASTORE, 0x01, 0x2c]);
        code.extend([opcodes::ASTORE, 5]);

        let instructions = parse_bytecode(&code, &[]).expect("parse bytecode");

        let decoded: Vec<(u32, Option<u16>)> = instructions
            .iter()
            .map(|instruction| match instruction.kind {
                InstructionKind::Store(slot) => (instruction.offset, Some(slot)),
                _ => (instruction.offset, None),
            })
            .collect();
        assert_eq!(
            decoded,
            vec![(0, None), (24, Some(1)), (25, Some(300)), (29, Some(5))]
        );
    }

    #[test]
    fn parse_bytecode_rejects_truncated_operands() {
        let code = [opcodes::INVOKESTATIC, 0x00];

        assert!(parse_bytecode(&code, &[]).is_err());
    }

    #[test]
    fn scan_inputs_records_invalid_class_file_and_continues() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let bad = temp_dir.path().join("Bad.class");
        fs::write(&bad, b"nope").expect("write bad class");
        fs::write(temp_dir.path().join("Main.class"), main_class_bytes()).expect("write class");
        fs::write(temp_dir.path().join("notes.txt"), b"ignored").expect("write text");

        let output = scan_inputs(temp_dir.path(), &[]).expect("scan directory");

        assert_eq!(output.classes.len(), 1);
        assert_eq!(output.classes[0].name, "app/Main");
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].type_name, bad.to_string_lossy());
        assert_eq!(output.artifacts.len(), 2);
    }

    #[test]
    fn scan_inputs_reads_jar_entries_in_order() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let jar = temp_dir.path().join("app.jar");
        let class_bytes = main_class_bytes();
        write_jar(
            &jar,
            &[
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
                ("app/Main.class", class_bytes.as_slice()),
                ("module-info.class", b"skipped"),
            ],
        );
        let classes_dir = temp_dir.path().join("lib");
        fs::create_dir_all(&classes_dir).expect("create baseline dir");
        fs::write(classes_dir.join("Main.class"), &class_bytes).expect("write baseline class");

        let output = scan_inputs(&jar, &[classes_dir]).expect("scan jar");

        assert_eq!(output.classes.len(), 1);
        assert_eq!(output.baseline.len(), 1);
        assert!(output.failures.is_empty());
        let uris: Vec<String> = output
            .artifacts
            .iter()
            .filter_map(|artifact| artifact.location.as_ref())
            .filter_map(|location| location.uri.clone())
            .collect();
        assert_eq!(uris.len(), 3);
        assert!(uris[0].ends_with("app.jar"));
        assert!(uris[1].ends_with("app.jar!/app/Main.class"));
        assert_eq!(output.artifacts[1].parent_index, Some(0));
        assert_eq!(output.classes[0].artifact_index, 1);
    }

    #[test]
    fn scan_inputs_rejects_unsupported_input() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let input = temp_dir.path().join("readme.txt");
        fs::write(&input, b"text").expect("write input");

        assert!(scan_inputs(&input, &[]).is_err());
    }
}
