// Physical schema for migrations: tables keyed by `modelName`, columns keyed
// by `fieldName`, references rewritten to the referenced table's model name.

use std::collections::BTreeMap;

use better_feature_core::db::schema::{DatabaseSchema, SchemaTable, TableSchemaMap};

use super::get_tables::get_feature_tables;
use crate::options::FeatureOptions;

pub fn get_schema(options: &FeatureOptions) -> DatabaseSchema {
    to_database_schema(&get_feature_tables(options))
}

/// Tables sharing a `modelName` merge their columns; the first keeps its
/// `order`.
pub fn to_database_schema(tables: &TableSchemaMap) -> DatabaseSchema {
    let mut schema: BTreeMap<String, SchemaTable> = BTreeMap::new();

    for table in tables.values() {
        let mut columns = BTreeMap::new();
        for (key, field) in &table.fields {
            let mut field = field.clone();
            if let Some(reference) = field.references.as_mut() {
                if let Some(target) = tables.get(&reference.model) {
                    reference.model = target.model_name.clone();
                }
            }
            columns.insert(field.column(key).to_string(), field);
        }

        match schema.get_mut(&table.model_name) {
            Some(existing) => existing.fields.extend(columns),
            None => {
                schema.insert(
                    table.model_name.clone(),
                    SchemaTable {
                        fields: columns,
                        order: table.order,
                        disable_migrations: table.disable_migrations,
                    },
                );
            }
        }
    }

    DatabaseSchema { tables: schema }
}

#[cfg(test)]
mod tests {
    use super::*;
    use better_feature_core::db::schema::{FieldAttribute, OnDelete, TableSchema};

    #[test]
    fn test_columns_keyed_by_field_name() {
        let mut tables = TableSchemaMap::new();
        tables.insert(
            "tester".into(),
            TableSchema::new("testers")
                .field("displayName", FieldAttribute::string().field_name("display_name")),
        );
        let schema = to_database_schema(&tables);
        assert!(schema.tables["testers"].fields.contains_key("display_name"));
    }

    #[test]
    fn test_references_use_model_name() {
        let mut tables = TableSchemaMap::new();
        tables.insert("user".into(), TableSchema::new("users"));
        tables.insert(
            "session".into(),
            TableSchema::new("session").field(
                "userId",
                FieldAttribute::string().references("user", "id", Some(OnDelete::Cascade)),
            ),
        );
        let schema = to_database_schema(&tables);
        let reference = schema.tables["session"].fields["userId"].references.clone().unwrap();
        assert_eq!(reference.model, "users");
        assert_eq!(reference.on_delete, Some(OnDelete::Cascade));
    }

    #[test]
    fn test_unordered_tables_sort_last() {
        let mut tables = TableSchemaMap::new();
        let mut first = TableSchema::new("first");
        first.order = Some(1);
        tables.insert("a".into(), TableSchema::new("zzz"));
        tables.insert("b".into(), first);
        let schema = to_database_schema(&tables);
        let names: Vec<&str> = schema.ordered().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["first", "zzz"]);
    }

    #[test]
    fn test_shared_model_name_merges_columns() {
        let mut tables = TableSchemaMap::new();
        tables.insert("a".into(), TableSchema::new("shared").field("x", FieldAttribute::string()));
        tables.insert("b".into(), TableSchema::new("shared").field("y", FieldAttribute::string()));
        let schema = to_database_schema(&tables);
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables["shared"].fields.len(), 2);
    }
}
