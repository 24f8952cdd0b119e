//! Reference extraction and resolution for JVM class files.
//!
//! Class files are read into a binary type model ([`ir`]), every dependency a
//! type has on another type or member is recorded as a [`reference::Reference`]
//! ([`extract`]), references are resolved against a type universe ([`resolver`])
//! and handed to the detectors interested in their kind ([`analyzer`]).

pub mod analyzer;
pub mod descriptor;
pub mod detectors;
pub mod extract;
mod field_tracker;
pub mod ir;
mod lines;
mod opcodes;
pub mod reference;
pub mod resolver;
pub mod scan;
mod signature;
pub mod universe;
