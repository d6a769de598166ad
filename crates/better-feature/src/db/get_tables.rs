// Table aggregation: every plugin's schema fragments folded into one logical
// table map, plus the generated `rateLimit` table.

use std::collections::BTreeSet;

use better_feature_core::db::schema::{FieldAttribute, TableFragment, TableSchema, TableSchemaMap};

use crate::options::{FeatureOptions, RateLimitStorage};

pub const RATE_LIMIT_TABLE: &str = "rateLimit";

/// Fold plugin schemas in plugin order.
///
/// Fragments for the same table key union their field maps; on a field
/// collision the later plugin's attribute replaces the earlier one whole.
/// The first explicit `modelName` for a key sticks.
pub fn get_feature_tables(options: &FeatureOptions) -> TableSchemaMap {
    let mut tables = TableSchemaMap::new();
    // Keys whose model name came from a fragment rather than the key itself.
    let mut named = BTreeSet::new();

    for plugin in options.plugins_iter() {
        for (key, fragment) in plugin.schema() {
            merge_fragment(&mut tables, &mut named, key, fragment);
        }
    }

    let rate_limit = options.rate_limit.clone().unwrap_or_default();
    if rate_limit.storage == Some(RateLimitStorage::Database) {
        let fields = rate_limit.fields.unwrap_or_default();
        let table = TableSchema::new(rate_limit.model_name.unwrap_or_else(|| RATE_LIMIT_TABLE.into()))
            .field(
                "key",
                FieldAttribute::string().field_name(fields.key.unwrap_or_else(|| "key".into())),
            )
            .field(
                "count",
                FieldAttribute::number().field_name(fields.count.unwrap_or_else(|| "count".into())),
            )
            .field(
                "lastRequest",
                FieldAttribute::number()
                    .bigint()
                    .field_name(fields.last_request.unwrap_or_else(|| "lastRequest".into())),
            );
        tables.insert(RATE_LIMIT_TABLE.into(), table);
    }

    tables
}

fn merge_fragment(
    tables: &mut TableSchemaMap,
    named: &mut BTreeSet<String>,
    key: String,
    fragment: TableFragment,
) {
    let first_name = fragment.model_name.is_some() && named.insert(key.clone());
    match tables.get_mut(&key) {
        Some(table) => {
            // A key-derived name is only a placeholder until a fragment names the model.
            match fragment.model_name {
                Some(name) if first_name => table.model_name = name,
                Some(name) if name != table.model_name => {
                    tracing::debug!(table = %key, ignored = %name, "model name already declared");
                }
                _ => {}
            }
            table.fields.extend(fragment.fields);
            if fragment.order.is_some() {
                table.order = fragment.order;
            }
            if let Some(disabled) = fragment.disable_migrations {
                table.disable_migrations = disabled;
            }
        }
        None => {
            let table = TableSchema {
                model_name: fragment.model_name.unwrap_or_else(|| key.clone()),
                fields: fragment.fields,
                disable_migrations: fragment.disable_migrations.unwrap_or(false),
                order: fragment.order,
            };
            tables.insert(key, table);
        }
    }
}
