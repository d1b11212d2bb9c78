//! Model descriptors: the static mapping between a record type and its table.
//!
//! A [`ModelDescriptor`] is built once per type, usually by
//! `#[derive(Model)]`, and validated at build time. Every mapping mistake a
//! descriptor can detect on its own (duplicate primary key, association on a
//! field of the wrong shape, two fields claiming one column) surfaces as
//! [`Error::Configuration`] before any statement runs.

use crate::error::{Error, Result};
use crate::model::TargetModel;
use crate::naming::field_to_column;
use std::collections::HashMap;

/// Direction of a declared association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    /// The target table carries the owner's primary key column; at most one
    /// target row per owner.
    HasOne,
    /// The target table carries the owner's primary key column; any number
    /// of target rows per owner.
    HasMany,
    /// The owner carries a column named like the target's primary key.
    BelongsTo,
}

impl AssociationKind {
    /// The field shape this kind must be declared on.
    pub const fn expected_shape(self) -> FieldShape {
        match self {
            AssociationKind::HasOne | AssociationKind::BelongsTo => FieldShape::Single,
            AssociationKind::HasMany => FieldShape::Collection,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            AssociationKind::HasOne => "has_one",
            AssociationKind::HasMany => "has_many",
            AssociationKind::BelongsTo => "belongs_to",
        }
    }
}

/// Structural shape of a field's type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldShape {
    /// A plain column value.
    #[default]
    Scalar,
    /// `Option<T>` or `Option<Box<T>>`.
    Single,
    /// `Vec<T>` or `Vec<Box<T>>`.
    Collection,
}

/// Declaration of one field, as written by the derive or by hand.
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: &'static str,
    column: Option<&'static str>,
    rename: Option<&'static str>,
    primary_key: bool,
    auto_increment: bool,
    ignore: bool,
    shape: FieldShape,
    association: Option<AssociationDef>,
}

#[derive(Debug, Clone)]
struct AssociationDef {
    kind: AssociationKind,
    table: Option<&'static str>,
    target: TargetModel,
}

impl FieldDef {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            rename: None,
            primary_key: false,
            auto_increment: false,
            ignore: false,
            shape: FieldShape::Scalar,
            association: None,
        }
    }

    /// Explicit column name. Wins over `rename` and derivation.
    #[must_use]
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    /// Naming alias used when no explicit column is given.
    #[must_use]
    pub const fn rename(mut self, alias: &'static str) -> Self {
        self.rename = Some(alias);
        self
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark the key as generated by the backend. Implies nothing on its own;
    /// only meaningful together with `primary_key`.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Exclude the field from every statement.
    #[must_use]
    pub const fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    #[must_use]
    pub const fn shape(mut self, shape: FieldShape) -> Self {
        self.shape = shape;
        self
    }

    /// Declare an association. `table` defaults to the target's table.
    #[must_use]
    pub fn association(
        mut self,
        kind: AssociationKind,
        table: Option<&'static str>,
        target: TargetModel,
    ) -> Self {
        self.association = Some(AssociationDef {
            kind,
            table,
            target,
        });
        self
    }

    #[must_use]
    pub fn has_one(self, target: TargetModel) -> Self {
        self.shape(FieldShape::Single)
            .association(AssociationKind::HasOne, None, target)
    }

    #[must_use]
    pub fn has_many(self, target: TargetModel) -> Self {
        self.shape(FieldShape::Collection)
            .association(AssociationKind::HasMany, None, target)
    }

    #[must_use]
    pub fn belongs_to(self, target: TargetModel) -> Self {
        self.shape(FieldShape::Single)
            .association(AssociationKind::BelongsTo, None, target)
    }
}

/// Resolved mapping of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub field_name: &'static str,
    pub column_name: String,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub ignored: bool,
    pub association: Option<AssociationKind>,
}

impl FieldMapping {
    /// Whether the field takes part in INSERT and UPDATE column lists.
    pub fn is_persisted(&self) -> bool {
        !self.ignored && self.association.is_none()
    }

    /// Whether the backend generates this field's value on insert.
    pub fn is_generated_key(&self) -> bool {
        self.primary_key && self.auto_increment
    }
}

/// Resolved association of one field.
#[derive(Debug, Clone)]
pub struct AssociationDescriptor {
    pub kind: AssociationKind,
    pub field_name: &'static str,
    pub target_table: String,
    pub target: TargetModel,
}

/// Validated mapping between a record type and its table.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    type_name: &'static str,
    table_name: String,
    fields: Vec<FieldMapping>,
    primary_key: Option<usize>,
    associations: Vec<AssociationDescriptor>,
    by_column: HashMap<String, usize>,
}

impl ModelDescriptor {
    pub fn builder(type_name: &'static str) -> ModelDescriptorBuilder {
        ModelDescriptorBuilder {
            type_name,
            table: None,
            fields: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    pub fn primary_key(&self) -> Option<&FieldMapping> {
        self.primary_key.map(|i| &self.fields[i])
    }

    /// The primary key, or a configuration error for operations that need one.
    pub fn require_primary_key(&self) -> Result<&FieldMapping> {
        self.primary_key().ok_or_else(|| {
            Error::configuration(self.type_name, "operation requires a primary key")
        })
    }

    pub fn associations(&self) -> &[AssociationDescriptor] {
        &self.associations
    }

    /// The field a result column feeds, matched ASCII case-insensitively.
    /// Association fields never match.
    pub fn field_for_column(&self, column: &str) -> Option<&FieldMapping> {
        self.by_column
            .get(&column.to_ascii_lowercase())
            .map(|&i| &self.fields[i])
    }

    /// Look a field up by its Rust name or its column name.
    pub fn resolve_field(&self, name: &str) -> Option<&FieldMapping> {
        self.fields
            .iter()
            .find(|f| f.field_name == name && f.is_persisted())
            .or_else(|| self.field_for_column(name))
    }

    /// Fields that appear in UPDATE lists and upsert column lists.
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields.iter().filter(|f| f.is_persisted())
    }

    /// Fields that appear in INSERT column lists.
    pub fn insert_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.persisted_fields().filter(|f| !f.is_generated_key())
    }
}

/// Builder for [`ModelDescriptor`]; see [`ModelDescriptor::builder`].
#[derive(Debug, Clone)]
pub struct ModelDescriptorBuilder {
    type_name: &'static str,
    table: Option<&'static str>,
    fields: Vec<FieldDef>,
}

impl ModelDescriptorBuilder {
    /// Override the table name; defaults to the snake_case type name.
    #[must_use]
    pub fn table(mut self, table: &'static str) -> Self {
        self.table = Some(table);
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<ModelDescriptor> {
        let type_name = self.type_name;
        let fail = |message: String| Error::configuration(type_name, message);

        let table_name = match self.table {
            Some(table) => table.to_string(),
            None => field_to_column(type_name),
        };
        if table_name.trim().is_empty() {
            return Err(fail("table name is empty".to_string()));
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        let mut associations = Vec::new();
        let mut primary_key = None;
        let mut by_column: HashMap<String, usize> = HashMap::new();

        for def in self.fields {
            let column_name = match (def.column, def.rename) {
                (Some(column), _) => column.to_string(),
                (None, Some(alias)) => alias.to_string(),
                (None, None) => field_to_column(def.name),
            };

            if def.primary_key {
                if let Some(existing) = primary_key {
                    let existing: &FieldMapping = &fields[existing];
                    return Err(fail(format!(
                        "more than one primary key: '{}' and '{}'",
                        existing.field_name, def.name
                    )));
                }
                if def.ignore || def.association.is_some() {
                    return Err(fail(format!(
                        "primary key '{}' cannot be ignored or an association",
                        def.name
                    )));
                }
                primary_key = Some(fields.len());
            }

            if let Some(assoc) = &def.association {
                let expected = assoc.kind.expected_shape();
                if def.shape != expected {
                    return Err(fail(format!(
                        "{} field '{}' must be {}",
                        assoc.kind.as_str(),
                        def.name,
                        match expected {
                            FieldShape::Single => "Option<T> or Option<Box<T>>",
                            FieldShape::Collection => "Vec<T> or Vec<Box<T>>",
                            FieldShape::Scalar => "a plain value",
                        }
                    )));
                }
                let target_table = assoc.table.unwrap_or_else(|| assoc.target.table_name());
                if target_table.trim().is_empty() {
                    return Err(fail(format!(
                        "{} field '{}' has no target table",
                        assoc.kind.as_str(),
                        def.name
                    )));
                }
                associations.push(AssociationDescriptor {
                    kind: assoc.kind,
                    field_name: def.name,
                    target_table: target_table.to_string(),
                    target: assoc.target.clone(),
                });
            } else if !def.ignore {
                let key = column_name.to_ascii_lowercase();
                if let Some(&other) = by_column.get(&key) {
                    let other: &FieldMapping = &fields[other];
                    return Err(fail(format!(
                        "fields '{}' and '{}' both map to column '{}'",
                        other.field_name, def.name, column_name
                    )));
                }
                by_column.insert(key, fields.len());
            }

            fields.push(FieldMapping {
                field_name: def.name,
                column_name,
                primary_key: def.primary_key,
                auto_increment: def.auto_increment,
                ignored: def.ignore,
                association: def.association.as_ref().map(|a| a.kind),
            });
        }

        let owner_key_required = associations
            .iter()
            .find(|a| matches!(a.kind, AssociationKind::HasOne | AssociationKind::HasMany));
        if let (Some(assoc), None) = (owner_key_required, primary_key) {
            return Err(fail(format!(
                "{} field '{}' requires the owner to declare a primary key",
                assoc.kind.as_str(),
                assoc.field_name
            )));
        }

        Ok(ModelDescriptor {
            type_name,
            table_name,
            fields,
            primary_key,
            associations,
            by_column,
        })
    }
}
