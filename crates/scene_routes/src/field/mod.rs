//! Typed field model.
//!
//! - [`types`] holds type tags and access modes.
//! - [`value`] holds the [`FieldValue`] tagged union.
//! - [`table`] holds per-node-type declaration tables and name aliasing.
pub mod table;
pub mod types;
pub mod value;

pub use table::{FieldDeclaration, FieldTable, FieldTableBuilder};
pub use types::{AccessMode, FieldKind, FieldType};
pub use value::{ArrayValue, FieldValue};
