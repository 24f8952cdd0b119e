use anyhow::{Context, Result, bail};

use crate::descriptor::qualified_name;
use crate::reference::ReferenceKind;

/// Which declaration a generic signature belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SignatureOwner {
    Class { is_interface: bool },
    Field,
    Method,
    LocalVariable,
}

impl SignatureOwner {
    /// Kind given to type arguments and bounds of the declaration.
    fn declaration_kind(self) -> ReferenceKind {
        match self {
            SignatureOwner::Class { .. } => ReferenceKind::ParameterizedTypeDeclaration,
            SignatureOwner::Field => ReferenceKind::ParameterizedFieldDeclaration,
            SignatureOwner::Method => ReferenceKind::ParameterizedMethodDeclaration,
            SignatureOwner::LocalVariable => ReferenceKind::ParameterizedVariable,
        }
    }
}

/// A class named by a generic signature, tagged with the role it plays there.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct SignatureType {
    pub(crate) type_name: String,
    pub(crate) kind: ReferenceKind,
}

/// Split a generic signature into the classes it names. Type variables and
/// primitive types name no class and are skipped.
pub(crate) fn destructure(signature: &str, owner: SignatureOwner) -> Result<Vec<SignatureType>> {
    let mut parser = Parser {
        input: signature.as_bytes(),
        position: 0,
        declaration_kind: owner.declaration_kind(),
        types: Vec::new(),
    };
    parser
        .parse(owner)
        .with_context(|| format!("malformed signature {signature}"))?;
    Ok(parser.types)
}

struct Parser<'a> {
    input: &'a [u8],
    position: usize,
    declaration_kind: ReferenceKind,
    types: Vec<SignatureType>,
}

impl Parser<'_> {
    fn parse(&mut self, owner: SignatureOwner) -> Result<()> {
        match owner {
            SignatureOwner::Class { is_interface } => self.class_signature(is_interface)?,
            SignatureOwner::Method => self.method_signature()?,
            SignatureOwner::Field | SignatureOwner::LocalVariable => {
                self.reference_type(self.declaration_kind)?
            }
        }
        if self.position != self.input.len() {
            bail!("trailing characters at {}", self.position);
        }
        Ok(())
    }

    fn class_signature(&mut self, is_interface: bool) -> Result<()> {
        self.type_parameters()?;
        if is_interface {
            // The superclass of an interface is always Object.
            let mut skipped = Vec::new();
            std::mem::swap(&mut skipped, &mut self.types);
            self.class_type(ReferenceKind::Extends)?;
            std::mem::swap(&mut skipped, &mut self.types);
        } else {
            self.class_type(ReferenceKind::Extends)?;
        }
        let interface_kind = if is_interface {
            ReferenceKind::Extends
        } else {
            ReferenceKind::Implements
        };
        while self.peek().is_some() {
            self.class_type(interface_kind)?;
        }
        Ok(())
    }

    fn method_signature(&mut self) -> Result<()> {
        self.type_parameters()?;
        self.expect(b'(')?;
        while self.peek() != Some(b')') {
            self.java_type(ReferenceKind::Parameter)?;
        }
        self.expect(b')')?;
        if self.peek() == Some(b'V') {
            self.position += 1;
        } else {
            self.java_type(ReferenceKind::ReturnType)?;
        }
        while self.peek() == Some(b'^') {
            self.position += 1;
            self.reference_type(ReferenceKind::Throws)?;
        }
        Ok(())
    }

    fn type_parameters(&mut self) -> Result<()> {
        if self.peek() != Some(b'<') {
            return Ok(());
        }
        self.position += 1;
        while self.peek() != Some(b'>') {
            self.identifier(b':')?;
            // Class bound, possibly empty when only interface bounds follow.
            self.expect(b':')?;
            if !matches!(self.peek(), Some(b':') | Some(b'>')) && !self.at_type_parameter_start() {
                self.reference_type(self.declaration_kind)?;
            }
            while self.peek() == Some(b':') {
                self.position += 1;
                self.reference_type(self.declaration_kind)?;
            }
        }
        self.expect(b'>')
    }

    /// After an empty class bound the next type parameter name may start with
    /// `L`, `T` or `[`; it is told apart by the `:` that ends a name.
    fn at_type_parameter_start(&self) -> bool {
        let rest = &self.input[self.position..];
        let name_end = rest
            .iter()
            .position(|byte| matches!(byte, b':' | b';' | b'<' | b'/' | b'>'));
        matches!(name_end.map(|index| rest[index]), Some(b':'))
    }

    fn java_type(&mut self, kind: ReferenceKind) -> Result<()> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                self.position += 1;
                Ok(())
            }
            _ => self.reference_type(kind),
        }
    }

    fn reference_type(&mut self, kind: ReferenceKind) -> Result<()> {
        match self.peek() {
            Some(b'L') => self.class_type(kind),
            Some(b'T') => {
                self.position += 1;
                self.identifier(b';')?;
                self.expect(b';')
            }
            Some(b'[') => {
                self.position += 1;
                self.java_type(kind)
            }
            Some(other) => bail!("unexpected '{}' at {}", other as char, self.position),
            None => bail!("unexpected end"),
        }
    }

    fn class_type(&mut self, kind: ReferenceKind) -> Result<()> {
        self.expect(b'L')?;
        let mut name = self.class_name()?;
        loop {
            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
            match self.peek() {
                Some(b'.') => {
                    self.position += 1;
                    name.push('$');
                    name.push_str(&self.class_name()?);
                }
                Some(b';') => {
                    self.position += 1;
                    break;
                }
                Some(other) => bail!("unexpected '{}' at {}", other as char, self.position),
                None => bail!("unterminated class type"),
            }
        }
        self.types.push(SignatureType {
            type_name: qualified_name(&name),
            kind,
        });
        Ok(())
    }

    fn type_arguments(&mut self) -> Result<()> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => self.position += 1,
                Some(b'+' | b'-') => {
                    self.position += 1;
                    self.reference_type(self.declaration_kind)?;
                }
                _ => self.reference_type(self.declaration_kind)?,
            }
        }
        self.expect(b'>')
    }

    fn class_name(&mut self) -> Result<String> {
        let start = self.position;
        while let Some(byte) = self.peek() {
            if matches!(byte, b'<' | b';' | b'.') {
                break;
            }
            self.position += 1;
        }
        if start == self.position {
            bail!("empty class name at {start}");
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.position]).into_owned())
    }

    fn identifier(&mut self, terminator: u8) -> Result<()> {
        let start = self.position;
        while let Some(byte) = self.peek() {
            if byte == terminator {
                break;
            }
            self.position += 1;
        }
        if start == self.position {
            bail!("empty identifier at {start}");
        }
        Ok(())
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.peek() {
            Some(byte) if byte == expected => {
                self.position += 1;
                Ok(())
            }
            Some(byte) => bail!(
                "expected '{}' but found '{}' at {}",
                expected as char,
                byte as char,
                self.position
            ),
            None => bail!("expected '{}' at end", expected as char),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(types: &[SignatureType]) -> Vec<(&str, ReferenceKind)> {
        types
            .iter()
            .map(|entry| (entry.type_name.as_str(), entry.kind))
            .collect()
    }

    #[test]
    fn class_signature_tags_super_types_and_bounds() {
        let types = destructure(
            "<K:Ljava/lang/Number;V::Ljava/lang/Comparable<TV;>;>Ljava/util/AbstractMap<TK;TV;>;Ljava/io/Serializable;",
            SignatureOwner::Class {
                is_interface: false,
            },
        )
        .expect("parse class signature");

        assert_eq!(
            names(&types),
            vec![
                ("java.lang.Number", ReferenceKind::ParameterizedTypeDeclaration),
                ("java.lang.Comparable", ReferenceKind::ParameterizedTypeDeclaration),
                ("java.util.AbstractMap", ReferenceKind::Extends),
                ("java.io.Serializable", ReferenceKind::Implements),
            ]
        );
    }

    #[test]
    fn interface_signature_extends_super_interfaces() {
        let types = destructure(
            "<T:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Iterable<TT;>;",
            SignatureOwner::Class { is_interface: true },
        )
        .expect("parse interface signature");

        assert_eq!(
            names(&types),
            vec![
                ("java.lang.Object", ReferenceKind::ParameterizedTypeDeclaration),
                ("java.lang.Iterable", ReferenceKind::Extends),
            ]
        );
    }

    #[test]
    fn method_signature_tags_each_position() {
        let types = destructure(
            "<T:Ljava/lang/Object;>(Ljava/util/List<Lcom/example/Item;>;I[TT;)Ljava/util/Map<Ljava/lang/String;TT;>;^Ljava/io/IOException;",
            SignatureOwner::Method,
        )
        .expect("parse method signature");

        assert_eq!(
            names(&types),
            vec![
                ("java.lang.Object", ReferenceKind::ParameterizedMethodDeclaration),
                ("com.example.Item", ReferenceKind::ParameterizedMethodDeclaration),
                ("java.util.List", ReferenceKind::Parameter),
                ("java.lang.String", ReferenceKind::ParameterizedMethodDeclaration),
                ("java.util.Map", ReferenceKind::ReturnType),
                ("java.io.IOException", ReferenceKind::Throws),
            ]
        );
    }

    #[test]
    fn inner_class_types_use_binary_names() {
        let types = destructure(
            "Lcom/example/Outer<Ljava/lang/String;>.Inner<Ljava/lang/Integer;>;",
            SignatureOwner::Field,
        )
        .expect("parse field signature");

        assert_eq!(
            names(&types),
            vec![
                ("java.lang.String", ReferenceKind::ParameterizedFieldDeclaration),
                ("java.lang.Integer", ReferenceKind::ParameterizedFieldDeclaration),
                ("com.example.Outer$Inner", ReferenceKind::ParameterizedFieldDeclaration),
            ]
        );
    }

    #[test]
    fn wildcards_and_type_variables_name_no_class() {
        let types = destructure("Ljava/util/List<*>;", SignatureOwner::LocalVariable)
            .expect("parse wildcard");
        assert_eq!(
            names(&types),
            vec![("java.util.List", ReferenceKind::ParameterizedVariable)]
        );

        let types = destructure("TT;", SignatureOwner::Field).expect("parse type variable");
        assert!(types.is_empty());
    }

    #[test]
    fn malformed_signature_is_an_error() {
        assert!(destructure("Ljava/util/List<", SignatureOwner::Field).is_err());
        assert!(destructure("(I", SignatureOwner::Method).is_err());
    }
}
