use std::str::FromStr;

use anyhow::{Context, Result};
use jdescriptor::{MethodDescriptor, TypeDescriptor};

/// Convert an internal class name (`a/b/C`) into its qualified form (`a.b.C`).
pub fn qualified_name(internal: &str) -> String {
    internal.replace('/', ".")
}

/// Class referenced by a type descriptor, looking through arrays. Primitives yield `None`.
pub(crate) fn referenced_class(descriptor: &TypeDescriptor) -> Option<String> {
    match descriptor {
        TypeDescriptor::Object(name) => Some(qualified_name(name)),
        TypeDescriptor::Array(element, _) => referenced_class(element),
        _ => None,
    }
}

/// Class referenced by a field descriptor such as `[Ljava/lang/String;`.
pub(crate) fn field_type_class(descriptor: &str) -> Result<Option<String>> {
    let parsed = TypeDescriptor::from_str(descriptor)
        .with_context(|| format!("parse field descriptor {descriptor}"))?;
    Ok(referenced_class(&parsed))
}

/// Classes mentioned by a method descriptor, plus its argument slot count.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct MethodTypes {
    pub(crate) parameters: Vec<Option<String>>,
    pub(crate) return_class: Option<String>,
    /// Local slots taken by the declared parameters, not counting `this`.
    pub(crate) argument_slots: usize,
}

pub(crate) fn method_types(descriptor: &str) -> Result<MethodTypes> {
    let parsed = MethodDescriptor::from_str(descriptor)
        .with_context(|| format!("parse method descriptor {descriptor}"))?;
    let mut types = MethodTypes::default();
    for parameter in parsed.parameter_types() {
        types.argument_slots += slot_size(parameter);
        types.parameters.push(referenced_class(parameter));
    }
    types.return_class = referenced_class(parsed.return_type());
    Ok(types)
}

fn slot_size(descriptor: &TypeDescriptor) -> usize {
    match descriptor {
        TypeDescriptor::Long | TypeDescriptor::Double => 2,
        _ => 1,
    }
}

/// Class named by the operand of `new`, `anewarray`, `checkcast`, `instanceof` or
/// `multianewarray`: either an internal name or an array descriptor.
pub(crate) fn class_operand(operand: &str) -> Option<String> {
    let element = operand.trim_start_matches('[');
    if element.len() == operand.len() {
        return Some(qualified_name(operand));
    }
    element
        .strip_prefix('L')
        .and_then(|name| name.strip_suffix(';'))
        .map(qualified_name)
}

/// Package part of a qualified name, empty for the default package.
pub fn package_name(qualified: &str) -> &str {
    qualified
        .rfind('.')
        .map(|index| &qualified[..index])
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_types_counts_wide_slots() {
        let types = method_types("(JLjava/lang/String;[Lcom/example/Foo;D)Ljava/util/List;")
            .expect("parse descriptor");

        assert_eq!(types.argument_slots, 6);
        assert_eq!(
            types.parameters,
            vec![
                None,
                Some("java.lang.String".to_string()),
                Some("com.example.Foo".to_string()),
                None,
            ]
        );
        assert_eq!(types.return_class.as_deref(), Some("java.util.List"));
    }

    #[test]
    fn field_type_class_ignores_primitive_arrays() {
        assert_eq!(field_type_class("[[I").expect("parse"), None);
        assert_eq!(
            field_type_class("[Ljava/lang/Object;").expect("parse").as_deref(),
            Some("java.lang.Object")
        );
    }

    #[test]
    fn class_operand_handles_arrays_and_plain_names() {
        assert_eq!(class_operand("com/example/Foo").as_deref(), Some("com.example.Foo"));
        assert_eq!(class_operand("[Lcom/example/Foo;").as_deref(), Some("com.example.Foo"));
        assert_eq!(class_operand("[[I"), None);
    }

    #[test]
    fn package_name_of_default_package_is_empty() {
        assert_eq!(package_name("Foo"), "");
        assert_eq!(package_name("a.b.Foo"), "a.b");
    }
}
