//! Per-node-type field declaration tables.
//!
//! A [`FieldTable`] is built once per node type with [`FieldTableBuilder`] and then frozen.
//! Indices are assigned in declaration order and never change afterwards. Exposed fields are
//! reachable under three spellings (`X`, `set_X`, `X_changed`) that all resolve to one index.
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field::types::{AccessMode, FieldKind, FieldType};
use crate::field::value::FieldValue;

/// Immutable description of one field slot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDeclaration {
    pub access: AccessMode,
    pub field_type: FieldType,
    /// Canonical name, without `set_` / `_changed` decoration.
    pub name: String,
    /// Value new instances start with.
    pub default: FieldValue,
}

impl FieldDeclaration {
    pub fn new(
        access: AccessMode,
        field_type: FieldType,
        name: impl Into<String>,
        default: impl Into<FieldValue>,
    ) -> Self {
        Self {
            access,
            field_type,
            name: name.into(),
            default: default.into(),
        }
    }

    /// Every legal spelling of this field's name.
    pub fn aliases(&self) -> Vec<String> {
        match self.access {
            AccessMode::ExposedField => vec![
                self.name.clone(),
                format!("set_{}", self.name),
                format!("{}_changed", self.name),
            ],
            _ => vec![self.name.clone()],
        }
    }

    /// Checks that `value` has the payload shape this field's type requires.
    ///
    /// A kind mismatch is an [`Error::InvalidField`]: the field does not accept that type at
    /// all. A wrong element count for a vector type is an [`Error::InvalidFieldValue`].
    pub fn check_shape(&self, node_type: &str, value: &FieldValue) -> Result<()> {
        let expected = self.field_type.kind();
        if value.kind() != expected {
            return Err(Error::invalid_field(
                node_type,
                &self.name,
                format!(
                    "{} field does not accept a {:?} value",
                    self.field_type,
                    value.kind()
                ),
            ));
        }

        let width = self.field_type.components();
        if expected == FieldKind::FloatArray {
            let count = value.valid_count();
            if self.field_type.is_fixed_tuple() && count != width {
                return Err(Error::invalid_value(
                    node_type,
                    &self.name,
                    format!("{} needs exactly {width} components, got {count}", self.field_type),
                ));
            }
            if self.field_type.is_multi() && count % width != 0 {
                return Err(Error::invalid_value(
                    node_type,
                    &self.name,
                    format!(
                        "{} needs a multiple of {width} components, got {count}",
                        self.field_type
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Frozen, ordered set of field declarations for one node type.
#[derive(Clone, Debug)]
pub struct FieldTable {
    declarations: Vec<FieldDeclaration>,
    names: HashMap<String, usize>,
    node_fields: Vec<usize>,
}

impl FieldTable {
    /// Starts a table for the node type `type_name`. The name is only used in error messages.
    pub fn builder(type_name: impl Into<String>) -> FieldTableBuilder {
        FieldTableBuilder::new(type_name)
    }

    #[inline]
    pub fn num_fields(&self) -> usize {
        self.declarations.len()
    }

    /// Declaration at `index`, or `None` when out of range.
    #[inline]
    pub fn declaration(&self, index: usize) -> Option<&FieldDeclaration> {
        self.declarations.get(index)
    }

    /// Resolves any legal spelling of a field name to its index.
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Indices of `SFNode` / `MFNode` fields, in declaration order.
    #[inline]
    pub fn node_field_indices(&self) -> &[usize] {
        &self.node_fields
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &FieldDeclaration)> {
        self.declarations.iter().enumerate()
    }

    /// Default values, one per field, in index order.
    pub fn defaults(&self) -> Vec<FieldValue> {
        self.declarations.iter().map(|d| d.default.clone()).collect()
    }
}

/// Declarative builder for a [`FieldTable`].
///
/// Name collisions, including collisions between aliases, are reported by [`Self::build`].
#[derive(Debug)]
pub struct FieldTableBuilder {
    type_name: String,
    declarations: Vec<FieldDeclaration>,
}

impl FieldTableBuilder {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            declarations: Vec::new(),
        }
    }

    pub fn declare(mut self, declaration: FieldDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    /// Initialize-only field.
    pub fn field(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        default: impl Into<FieldValue>,
    ) -> Self {
        self.declare(FieldDeclaration::new(
            AccessMode::Field,
            field_type,
            name,
            default,
        ))
    }

    pub fn exposed_field(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        default: impl Into<FieldValue>,
    ) -> Self {
        self.declare(FieldDeclaration::new(
            AccessMode::ExposedField,
            field_type,
            name,
            default,
        ))
    }

    pub fn event_in(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.declare(FieldDeclaration::new(
            AccessMode::EventIn,
            field_type,
            name,
            FieldValue::default_for(field_type),
        ))
    }

    pub fn event_out(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.declare(FieldDeclaration::new(
            AccessMode::EventOut,
            field_type,
            name,
            FieldValue::default_for(field_type),
        ))
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Freezes the table, assigning indices in declaration order.
    pub fn build(self) -> Result<FieldTable> {
        let mut names = HashMap::with_capacity(self.declarations.len() * 2);
        let mut node_fields = Vec::new();

        for (index, decl) in self.declarations.iter().enumerate() {
            decl.check_shape(&self.type_name, &decl.default)
                .map_err(|e| Error::invalid_field(&self.type_name, &decl.name, e.to_string()))?;

            for alias in decl.aliases() {
                if let Some(prev) = names.insert(alias.clone(), index) {
                    return Err(Error::invalid_field(
                        &self.type_name,
                        &decl.name,
                        format!(
                            "name '{alias}' already resolves to field '{}'",
                            self.declarations[prev].name
                        ),
                    ));
                }
            }

            if decl.field_type.kind().is_node() {
                node_fields.push(index);
            }
        }

        Ok(FieldTable {
            declarations: self.declarations,
            names,
            node_fields,
        })
    }
}
