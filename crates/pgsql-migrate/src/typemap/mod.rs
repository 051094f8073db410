//! Type mapping engine.
//!
//! A [`TypeMap`] holds, per [`AbstractType`], a set of literal templates
//! ordered by size ceiling. Resolution picks the first template whose ceiling
//! admits the requested size and substitutes the `$size` / `$precision`
//! placeholders. The same templates, read backwards, classify dialect type
//! names into abstract types.
//!
//! Two profiles are provided:
//! - [`postgres_type_map`]: target literals for PostgreSQL
//! - [`sql_server_type_map`]: SQL Server 2008 literals, used to classify source columns

pub mod mssql;
pub mod postgres;

use std::collections::{BTreeMap, HashMap};

use crate::core::schema::AbstractType;
use crate::error::{MigrateError, Result};

pub use mssql::sql_server_type_map;
pub use postgres::postgres_type_map;

const SIZE_PLACEHOLDER: &str = "$size";
const PRECISION_PLACEHOLDER: &str = "$precision";

/// Upper bound on the size a template accepts.
///
/// `Bounded` sorts before `Unbounded`, so iterating a template set in key
/// order visits finite ceilings ascending and the catch-all last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SizeCeiling {
    Bounded(u32),
    Unbounded,
}

impl SizeCeiling {
    fn admits(&self, size: u32) -> bool {
        match self {
            SizeCeiling::Bounded(max) => size <= *max,
            SizeCeiling::Unbounded => false,
        }
    }
}

/// Templates of one abstract type, keyed by ceiling.
pub type TemplateSet = BTreeMap<SizeCeiling, String>;

/// Conflict resolver for [`TypeMap::invert_with`].
///
/// Receives the type name and every abstract type reachable from it, in
/// declaration order, and returns the one to keep.
pub type ConflictResolver<'a> = &'a dyn Fn(&str, &[AbstractType]) -> AbstractType;

/// A named set of type templates for one SQL dialect.
#[derive(Debug, Clone)]
pub struct TypeMap {
    profile: String,
    templates: BTreeMap<AbstractType, TemplateSet>,
    custom: Vec<(String, String)>,
    aliases: HashMap<String, AbstractType>,
    reverse: HashMap<String, AbstractType>,
}

impl TypeMap {
    /// Start building a type map for the named profile.
    pub fn builder(profile: impl Into<String>) -> TypeMapBuilder {
        TypeMapBuilder {
            profile: profile.into(),
            templates: BTreeMap::new(),
            custom: Vec::new(),
            aliases: HashMap::new(),
        }
    }

    /// Profile name, used in error messages.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Templates registered for an abstract type.
    pub fn templates(&self, abstract_type: AbstractType) -> Option<&TemplateSet> {
        self.templates.get(&abstract_type)
    }

    /// Resolve an abstract type and size into a type literal.
    ///
    /// Without a size, or when the only template is the catch-all, the
    /// catch-all is used. Otherwise the first finite ceiling that admits the
    /// size wins; if none does, the catch-all is used when registered and the
    /// request fails with [`MigrateError::UnsupportedType`] otherwise.
    pub fn resolve(
        &self,
        abstract_type: AbstractType,
        size: Option<u32>,
        precision: Option<u32>,
    ) -> Result<String> {
        let set = self
            .templates
            .get(&abstract_type)
            .ok_or_else(|| self.unsupported(abstract_type, size, precision))?;

        let only_catch_all = set.len() == 1 && set.contains_key(&SizeCeiling::Unbounded);

        let template = match size {
            Some(size) if !only_catch_all => set
                .iter()
                .find(|(ceiling, _)| ceiling.admits(size))
                .map(|(_, template)| template)
                .or_else(|| set.get(&SizeCeiling::Unbounded)),
            _ => set.get(&SizeCeiling::Unbounded),
        };

        template
            .map(|t| substitute(t, size, precision))
            .ok_or_else(|| self.unsupported(abstract_type, size, precision))
    }

    /// Resolve a dialect-specific type that has no abstract classification.
    ///
    /// Only the explicitly registered definitions are accepted, compared
    /// case-insensitively.
    pub fn resolve_custom(&self, definition: &str, size: Option<u32>, precision: Option<u32>) -> Result<String> {
        let definition = definition.trim();
        self.custom
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(definition))
            .map(|(_, template)| substitute(template, size, precision))
            .ok_or_else(|| MigrateError::UnsupportedCustomType {
                definition: definition.to_string(),
                profile: self.profile.clone(),
            })
    }

    /// Reverse index from type name to abstract type.
    ///
    /// When a name is reachable from several abstract types, the first in
    /// declaration order of [`AbstractType`] wins.
    pub fn invert(&self) -> &HashMap<String, AbstractType> {
        &self.reverse
    }

    /// Reverse index with a caller-supplied conflict resolver.
    pub fn invert_with(&self, resolver: ConflictResolver<'_>) -> HashMap<String, AbstractType> {
        reverse_index(&self.templates, resolver)
    }

    /// Classify a dialect type name, e.g. `"nvarchar"` or `"NVARCHAR(50)"`.
    ///
    /// Names derived from templates take precedence over registered aliases.
    pub fn classify(&self, type_name: &str) -> Option<AbstractType> {
        let name = type_name_of(type_name);
        self.reverse
            .get(&name)
            .or_else(|| self.aliases.get(&name))
            .copied()
    }

    fn unsupported(&self, abstract_type: AbstractType, size: Option<u32>, precision: Option<u32>) -> MigrateError {
        MigrateError::UnsupportedType {
            abstract_type: abstract_type.to_string(),
            size,
            precision,
            profile: self.profile.clone(),
        }
    }
}

/// Builder for [`TypeMap`].
#[derive(Debug)]
pub struct TypeMapBuilder {
    profile: String,
    templates: BTreeMap<AbstractType, TemplateSet>,
    custom: Vec<(String, String)>,
    aliases: HashMap<String, AbstractType>,
}

impl TypeMapBuilder {
    /// Register the catch-all template for a type.
    pub fn catch_all(self, abstract_type: AbstractType, template: impl Into<String>) -> Self {
        self.template(abstract_type, SizeCeiling::Unbounded, template)
    }

    /// Register a template admitting sizes up to `max_size`.
    pub fn bounded(self, abstract_type: AbstractType, max_size: u32, template: impl Into<String>) -> Self {
        self.template(abstract_type, SizeCeiling::Bounded(max_size), template)
    }

    /// Register a template; a later registration for the same ceiling replaces the earlier one.
    pub fn template(mut self, abstract_type: AbstractType, ceiling: SizeCeiling, template: impl Into<String>) -> Self {
        self.templates
            .entry(abstract_type)
            .or_default()
            .insert(ceiling, template.into());
        self
    }

    /// Register a dialect-specific type definition with its target literal.
    pub fn custom(mut self, definition: impl Into<String>, template: impl Into<String>) -> Self {
        self.custom.push((definition.into(), template.into()));
        self
    }

    /// Register an extra type name for classification.
    pub fn alias(mut self, type_name: &str, abstract_type: AbstractType) -> Self {
        self.aliases.insert(type_name_of(type_name), abstract_type);
        self
    }

    pub fn build(self) -> TypeMap {
        let reverse = reverse_index(&self.templates, &|_, candidates| candidates[0]);
        TypeMap {
            profile: self.profile,
            templates: self.templates,
            custom: self.custom,
            aliases: self.aliases,
            reverse,
        }
    }
}

/// The type name of a literal: the part before any parameter list, trimmed and lowercased.
fn type_name_of(literal: &str) -> String {
    literal
        .split('(')
        .next()
        .unwrap_or(literal)
        .trim()
        .to_lowercase()
}

fn reverse_index(
    templates: &BTreeMap<AbstractType, TemplateSet>,
    resolver: &dyn Fn(&str, &[AbstractType]) -> AbstractType,
) -> HashMap<String, AbstractType> {
    let mut candidates: Vec<(String, Vec<AbstractType>)> = Vec::new();

    for (abstract_type, set) in templates {
        for template in set.values() {
            let name = type_name_of(template);
            match candidates.iter_mut().find(|(n, _)| *n == name) {
                Some((_, types)) => {
                    if !types.contains(abstract_type) {
                        types.push(*abstract_type);
                    }
                }
                None => candidates.push((name, vec![*abstract_type])),
            }
        }
    }

    candidates
        .into_iter()
        .map(|(name, types)| {
            let chosen = if types.len() == 1 {
                types[0]
            } else {
                resolver(&name, &types)
            };
            (name, chosen)
        })
        .collect()
}

/// Replace placeholders; a placeholder whose input is absent becomes 0.
fn substitute(template: &str, size: Option<u32>, precision: Option<u32>) -> String {
    template
        .replace(SIZE_PLACEHOLDER, &size.unwrap_or(0).to_string())
        .replace(PRECISION_PLACEHOLDER, &precision.unwrap_or(0).to_string())
}
