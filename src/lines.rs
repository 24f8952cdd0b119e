use std::collections::HashMap;

use crate::reference::Reference;

/// Either a code label (bytecode offset) or an emitted reference, in encounter order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Position {
    Label(u32),
    Reference(usize),
}

/// Assigns approximate source lines to the references emitted while visiting one method.
///
/// References are addressed by their index in the extraction's reference list.
#[derive(Debug, Default)]
pub(crate) struct LinePositionTracker {
    positions: Vec<Position>,
    lines: HashMap<u32, u32>,
    first_line: Option<u32>,
    catch_labels: Vec<(usize, u32)>,
}

impl LinePositionTracker {
    pub(crate) fn add_reference(&mut self, index: usize) {
        self.positions.push(Position::Reference(index));
    }

    pub(crate) fn add_label(&mut self, offset: u32) {
        self.positions.push(Position::Label(offset));
    }

    pub(crate) fn add_line(&mut self, line: u32, label: u32) {
        self.lines.insert(label, line);
        self.first_line = Some(self.first_line.map_or(line, |first| first.min(line)));
    }

    /// Catch references take their line from the handler label.
    pub(crate) fn add_catch(&mut self, index: usize, handler: u32) {
        self.catch_labels.push((index, handler));
    }

    pub(crate) fn compute(&self, references: &mut [Reference]) {
        let Some(first_line) = self.first_line else {
            return;
        };
        if self.positions.is_empty() {
            return;
        }
        let mut current = first_line as i32;

        let mut pending_catches = Vec::new();
        for &(index, handler) in &self.catch_labels {
            match self.lines.get(&handler) {
                Some(line) => references[index].set_line_number(*line as i32),
                None => pending_catches.push((index, handler)),
            }
        }

        for position in &self.positions {
            match *position {
                Position::Label(offset) => {
                    if let Some(line) = self.lines.get(&offset) {
                        current = *line as i32;
                        continue;
                    }
                    pending_catches.retain(|&(index, handler)| {
                        if handler == offset {
                            references[index].set_line_number(current);
                            false
                        } else {
                            true
                        }
                    });
                }
                Position::Reference(index) => {
                    let reference = &mut references[index];
                    if reference.line_number() == -1 {
                        reference.set_line_number(current);
                    } else {
                        current = reference.line_number();
                    }
                }
            }
        }
    }
}
