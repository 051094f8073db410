//! Identifier renaming engine.
//!
//! [`Renamer`] generates target names from source names under a
//! [`NamingPolicy`]. It never keeps state: every translation returns the
//! produced name together with the renaming events it caused, and the caller
//! folds those events into a [`Ledger`], which is where ambiguity is detected.
//!
//! ```rust
//! use pgsql_migrate::naming::{Ledger, NamingPolicy, Renamer};
//!
//! let renamer = Renamer::new(NamingPolicy::Canonicalizing);
//! let mut ledger = Ledger::new();
//!
//! let table = renamer.translate_table("dbo", "OrderItems")?.record_into(&mut ledger)?;
//! assert_eq!(table, "order_items");
//! assert_eq!(ledger.len(), 1);
//! # Ok::<(), pgsql_migrate::MigrateError>(())
//! ```

pub mod collision;
pub mod ledger;
pub mod policy;

pub use collision::resolve_index_collisions;
pub use ledger::{Ledger, RenamingRecord};
pub use policy::{canonicalize, NamingPolicy, PG_MAX_IDENTIFIER_LENGTH};

use crate::core::schema::{ConstraintDescriptor, IdentityDescriptor, IndexDescriptor, ObjectKind};
use crate::error::{MigrateError, Result};

/// A translated value and the renaming events produced while translating it.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Renamed<T> {
    pub value: T,
    pub events: Vec<RenamingRecord>,
}

impl<T> Renamed<T> {
    fn new(value: T, events: Vec<RenamingRecord>) -> Self {
        Self { value, events }
    }

    /// Fold the events into `ledger` and return the value.
    pub fn record_into(self, ledger: &mut Ledger) -> Result<T> {
        ledger.record_all(self.events)?;
        Ok(self.value)
    }

    /// Move the events into `events` and return the value.
    pub fn collect_into(self, events: &mut Vec<RenamingRecord>) -> T {
        events.extend(self.events);
        self.value
    }
}

/// Translates source identifiers and composite descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renamer {
    policy: NamingPolicy,
}

impl Renamer {
    /// Create a new renamer with the given policy.
    pub fn new(policy: NamingPolicy) -> Self {
        Self { policy }
    }

    /// The active naming policy.
    pub fn policy(&self) -> NamingPolicy {
        self.policy
    }

    /// Translate one name.
    ///
    /// The result is a pure function of the policy and the inputs, so
    /// translating the same triple twice yields the same name and the same
    /// event.
    pub fn translate(&self, schema: &str, kind: ObjectKind, raw: &str) -> Result<Renamed<String>> {
        let translated = self.policy.apply(kind, raw)?;
        let event = RenamingRecord {
            schema: schema.to_string(),
            kind,
            old_name: raw.to_string(),
            new_name: translated.name.clone(),
            normalized: translated.normalized,
        };
        Ok(Renamed::new(translated.name, vec![event]))
    }

    /// Translate an optional name. `None` yields `None` and no events.
    pub fn translate_opt(
        &self,
        schema: &str,
        kind: ObjectKind,
        raw: Option<&str>,
    ) -> Result<Renamed<Option<String>>> {
        match raw {
            Some(raw) => {
                let renamed = self.translate(schema, kind, raw)?;
                Ok(Renamed::new(Some(renamed.value), renamed.events))
            }
            None => Ok(Renamed::new(None, Vec::new())),
        }
    }

    pub fn translate_schema(&self, raw: &str) -> Result<Renamed<String>> {
        self.translate(raw, ObjectKind::Schema, raw)
    }

    pub fn translate_table(&self, schema: &str, raw: &str) -> Result<Renamed<String>> {
        self.translate(schema, ObjectKind::Table, raw)
    }

    pub fn translate_column(&self, schema: &str, raw: &str) -> Result<Renamed<String>> {
        self.translate(schema, ObjectKind::Column, raw)
    }

    fn translate_columns(
        &self,
        schema: &str,
        columns: &[String],
        events: &mut Vec<RenamingRecord>,
    ) -> Result<Vec<String>> {
        columns
            .iter()
            .map(|c| Ok(self.translate_column(schema, c)?.collect_into(events)))
            .collect()
    }

    /// Translate every name a constraint carries.
    ///
    /// Foreign-key references are translated under the referenced schema.
    /// Actions, default definitions and value types pass through unchanged.
    pub fn translate_constraint(&self, constraint: &ConstraintDescriptor) -> Result<Renamed<ConstraintDescriptor>> {
        if constraint.constraint_name.trim().is_empty() {
            return Err(MigrateError::MissingConstraintName {
                schema: constraint.schema.clone(),
                table: constraint.table_name.clone(),
            });
        }

        let source_schema = constraint.schema.as_str();
        let referenced_schema = constraint.referenced_schema.as_deref().unwrap_or(source_schema);
        let mut events = Vec::new();

        let mut translated = constraint.clone();
        translated.schema = self.translate_schema(source_schema)?.collect_into(&mut events);
        translated.table_name = self
            .translate_table(source_schema, &constraint.table_name)?
            .collect_into(&mut events);
        translated.constraint_name = self
            .translate(source_schema, constraint.kind.object_kind(), &constraint.constraint_name)?
            .collect_into(&mut events);
        translated.fields = self.translate_columns(source_schema, &constraint.fields, &mut events)?;

        translated.referenced_schema = match constraint.referenced_schema.as_deref() {
            Some(schema) => Some(self.translate_schema(schema)?.collect_into(&mut events)),
            None => None,
        };
        translated.referenced_table = self
            .translate_opt(referenced_schema, ObjectKind::Table, constraint.referenced_table.as_deref())?
            .collect_into(&mut events);
        translated.referenced_fields =
            self.translate_columns(referenced_schema, &constraint.referenced_fields, &mut events)?;

        Ok(Renamed::new(translated, events))
    }

    /// Translate schema, table, index name and both column lists of an index.
    pub fn translate_index(&self, index: &IndexDescriptor) -> Result<Renamed<IndexDescriptor>> {
        let schema = index.schema.as_str();
        let mut events = Vec::new();

        let translated = IndexDescriptor {
            schema: self.translate_schema(schema)?.collect_into(&mut events),
            table_name: self.translate_table(schema, &index.table_name)?.collect_into(&mut events),
            index_name: self
                .translate(schema, ObjectKind::Index, &index.index_name)?
                .collect_into(&mut events),
            key_columns: self.translate_columns(schema, &index.key_columns, &mut events)?,
            included_columns: self.translate_columns(schema, &index.included_columns, &mut events)?,
            is_unique: index.is_unique,
        };

        Ok(Renamed::new(translated, events))
    }

    /// Translate the names of an identity column; numeric fields pass through.
    pub fn translate_identity(&self, identity: &IdentityDescriptor) -> Result<Renamed<IdentityDescriptor>> {
        let schema = identity.schema.as_str();
        let mut events = Vec::new();

        let translated = IdentityDescriptor {
            schema: self.translate_schema(schema)?.collect_into(&mut events),
            table_name: self.translate_table(schema, &identity.table_name)?.collect_into(&mut events),
            column_name: self
                .translate_column(schema, &identity.column_name)?
                .collect_into(&mut events),
            seed_value: identity.seed_value,
            seed_increment: identity.seed_increment,
            last_observed_value: identity.last_observed_value,
        };

        Ok(Renamed::new(translated, events))
    }
}
