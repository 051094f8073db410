//! Collision resolution for schema-wide index batches.
//!
//! SQL Server scopes index names to a table; PostgreSQL scopes them to a
//! schema. Once a whole schema's index names are translated, duplicates get
//! a 1-based ordinal suffix in enumeration order.

use std::collections::HashMap;

use tracing::debug;

use super::policy::PG_MAX_IDENTIFIER_LENGTH;
use crate::core::schema::IndexDescriptor;

/// Suffix every index whose translated name occurs more than once in the batch.
///
/// Members of a colliding group become `name1`, `name2`, ... in the order they
/// appear in `indexes`. Unique names are left unchanged. Suffixed names are
/// not recorded in the ledger: the source names are already mapped to the
/// shared translated name.
///
/// The base name is shortened so the suffixed name stays within
/// [`PG_MAX_IDENTIFIER_LENGTH`] characters. A suffixed name can still equal
/// another member of the batch (`x`, `x`, `x1`); this is not resolved and
/// only logged.
pub fn resolve_index_collisions(mut indexes: Vec<IndexDescriptor>) -> Vec<IndexDescriptor> {
    let mut group_sizes: HashMap<String, usize> = HashMap::new();
    for index in &indexes {
        *group_sizes.entry(index.index_name.clone()).or_default() += 1;
    }

    let mut ordinals: HashMap<String, usize> = HashMap::new();
    for index in &mut indexes {
        if group_sizes.get(&index.index_name).copied().unwrap_or(0) > 1 {
            let ordinal = ordinals.entry(index.index_name.clone()).or_default();
            *ordinal += 1;
            let suffixed = with_suffix(&index.index_name, *ordinal);
            if group_sizes.contains_key(&suffixed) {
                debug!(
                    "Index {} on {}.{}: suffixed name {} is also used by another index",
                    index.index_name, index.schema, index.table_name, suffixed
                );
            }
            index.index_name = suffixed;
        }
    }

    indexes
}

/// Append `ordinal`, truncating `name` so the result fits the identifier limit.
fn with_suffix(name: &str, ordinal: usize) -> String {
    let suffix = ordinal.to_string();
    let keep = PG_MAX_IDENTIFIER_LENGTH.saturating_sub(suffix.len());
    let base: String = name.chars().take(keep).collect();
    format!("{}{}", base, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(table: &str, name: &str) -> IndexDescriptor {
        IndexDescriptor {
            schema: "public".into(),
            table_name: table.into(),
            index_name: name.into(),
            key_columns: vec!["id".into()],
            included_columns: Vec::new(),
            is_unique: false,
        }
    }

    #[test]
    fn test_colliding_names_get_ordinal_suffix() {
        let resolved = resolve_index_collisions(vec![
            index("a", "x"),
            index("b", "x"),
            index("c", "y"),
        ]);
        let names: Vec<_> = resolved.iter().map(|i| i.index_name.as_str()).collect();
        assert_eq!(names, vec!["x1", "x2", "y"]);
    }

    #[test]
    fn test_interleaved_groups_keep_enumeration_order() {
        let resolved = resolve_index_collisions(vec![
            index("a", "ix"),
            index("b", "iy"),
            index("c", "ix"),
            index("d", "iy"),
            index("e", "ix"),
        ]);
        let names: Vec<_> = resolved.iter().map(|i| i.index_name.as_str()).collect();
        assert_eq!(names, vec!["ix1", "iy1", "ix2", "iy2", "ix3"]);
    }

    #[test]
    fn test_unique_names_untouched() {
        let resolved = resolve_index_collisions(vec![index("a", "one"), index("b", "two")]);
        assert_eq!(resolved[0].index_name, "one");
        assert_eq!(resolved[1].index_name, "two");
    }

    #[test]
    fn test_suffix_stays_within_identifier_limit() {
        let long = "a".repeat(PG_MAX_IDENTIFIER_LENGTH);
        let resolved = resolve_index_collisions(vec![index("a", &long), index("b", &long)]);

        let names: Vec<_> = resolved.iter().map(|i| i.index_name.clone()).collect();
        assert!(names.iter().all(|n| n.chars().count() == PG_MAX_IDENTIFIER_LENGTH));
        assert_ne!(names[0], names[1]);
        assert_eq!(names[0], format!("{}1", "a".repeat(PG_MAX_IDENTIFIER_LENGTH - 1)));
    }

    #[test]
    fn test_short_names_are_not_truncated() {
        assert_eq!(with_suffix("ix_name", 12), "ix_name12");
        assert_eq!(with_suffix(&"b".repeat(62), 10), format!("{}10", "b".repeat(61)));
    }

    #[test]
    fn test_suffix_can_match_existing_name() {
        let resolved = resolve_index_collisions(vec![index("a", "x"), index("b", "x"), index("c", "x1")]);
        let names: Vec<_> = resolved.iter().map(|i| i.index_name.as_str()).collect();
        assert_eq!(names, vec!["x1", "x2", "x1"]);
    }

    #[test]
    fn test_empty_batch() {
        assert!(resolve_index_collisions(Vec::new()).is_empty());
    }
}
