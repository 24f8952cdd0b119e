use std::collections::BTreeMap;

use crate::descriptor::qualified_name;
use crate::ir::Class;

/// Read-only collection of types that references are resolved against.
pub trait TypeUniverse: Sync {
    /// Look up a type by its qualified name (`a.b.C`).
    fn lookup(&self, qualified_name: &str) -> Option<&Class>;
}

/// In-memory universe built from scanned classes.
#[derive(Debug, Default)]
pub struct ClassUniverse {
    classes: BTreeMap<String, Class>,
}

impl ClassUniverse {
    pub fn new(classes: impl IntoIterator<Item = Class>) -> Self {
        let mut universe = ClassUniverse::default();
        universe.extend(classes);
        universe
    }

    /// Add classes; a class already present under the same name is kept.
    pub fn extend(&mut self, classes: impl IntoIterator<Item = Class>) {
        for class in classes {
            self.classes
                .entry(qualified_name(&class.name))
                .or_insert(class);
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Classes in qualified-name order.
    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.values()
    }
}

impl TypeUniverse for ClassUniverse {
    fn lookup(&self, qualified_name: &str) -> Option<&Class> {
        self.classes.get(qualified_name)
    }
}
