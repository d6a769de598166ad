// Shared fixtures: the `tester` table used by the conformance cases.

use serde_json::{json, Value};

use better_feature_core::db::schema::{
    DatabaseSchema, FieldAttribute, SchemaTable, TableSchema, TableSchemaMap,
};

pub const TESTER_MODEL: &str = "tester";

/// Logical table map with one `tester` table.
pub fn tester_tables() -> TableSchemaMap {
    let table = TableSchema::new(TESTER_MODEL)
        .field("name", FieldAttribute::string().sortable())
        .field("displayName", FieldAttribute::string().optional())
        .field("age", FieldAttribute::number().optional());
    let mut tables = TableSchemaMap::new();
    tables.insert(TESTER_MODEL.to_string(), table);
    tables
}

/// Physical schema for adapters that need a table before the suite runs.
pub fn conformance_schema() -> DatabaseSchema {
    let mut schema = DatabaseSchema::default();
    for table in tester_tables().into_values() {
        schema.tables.insert(
            table.model_name.clone(),
            SchemaTable {
                fields: table.fields,
                order: None,
                disable_migrations: false,
            },
        );
    }
    schema
}

pub fn tester_record(id: &str, name: &str, age: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "displayName": name.to_uppercase(),
        "age": age,
    })
}
