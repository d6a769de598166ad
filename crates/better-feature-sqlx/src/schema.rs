// DDL generation for the logical schema: column types per dialect,
// CREATE TABLE, ALTER TABLE ADD COLUMN and index statements.

use better_feature_core::db::schema::{FieldAttribute, FieldType, SchemaTable};

use crate::dialect::DatabaseType;

/// Physical column type for a field.
///
/// Dates and arrays are stored as text: values travel through the adapter as
/// JSON strings and the internal adapter restores them on read.
pub fn column_type(field: &FieldAttribute, db: DatabaseType) -> &'static str {
    // Indexed strings need a bounded length on MySQL and SQL Server.
    let indexed = field.unique || field.sortable || field.references.is_some();
    match (field.field_type, db) {
        (FieldType::String, DatabaseType::Mysql) if indexed => "VARCHAR(255)",
        (FieldType::String, DatabaseType::Mssql) if indexed => "VARCHAR(255)",
        (FieldType::String, DatabaseType::Mssql) => "VARCHAR(8000)",
        (FieldType::String, _) => "TEXT",
        (FieldType::Number, DatabaseType::Sqlite) => "INTEGER",
        (FieldType::Number, _) if field.bigint => "BIGINT",
        (FieldType::Number, DatabaseType::Postgres) => "INTEGER",
        (FieldType::Number, _) => "INT",
        (FieldType::Boolean, DatabaseType::Sqlite) => "INTEGER",
        (FieldType::Boolean, DatabaseType::Mssql) => "SMALLINT",
        (FieldType::Boolean, _) => "BOOLEAN",
        (FieldType::Date, DatabaseType::Mysql) | (FieldType::Date, DatabaseType::Mssql) => {
            "VARCHAR(64)"
        }
        (FieldType::Date, _) => "TEXT",
        (FieldType::StringArray | FieldType::NumberArray, DatabaseType::Mssql) => "VARCHAR(8000)",
        (FieldType::StringArray | FieldType::NumberArray, _) => "TEXT",
    }
}

fn id_column(db: DatabaseType) -> String {
    let ty = match db {
        DatabaseType::Sqlite | DatabaseType::Postgres => "TEXT",
        DatabaseType::Mysql | DatabaseType::Mssql => "VARCHAR(255)",
    };
    format!("{} {ty} PRIMARY KEY", db.quote("id"))
}

/// Literal SQL default; only scalar defaults are emitted.
fn default_literal(field: &FieldAttribute, db: DatabaseType) -> Option<String> {
    match field.default_value.as_ref()? {
        serde_json::Value::Bool(b) => Some(match db {
            DatabaseType::Postgres | DatabaseType::Mysql => b.to_string(),
            DatabaseType::Sqlite | DatabaseType::Mssql => u8::from(*b).to_string(),
        }),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        _ => None,
    }
}

/// `"col" TYPE [NOT NULL] [UNIQUE] [DEFAULT ..] [REFERENCES ..]`
pub fn column_definition(
    column: &str,
    field: &FieldAttribute,
    db: DatabaseType,
) -> String {
    let mut def = format!("{} {}", db.quote(column), column_type(field, db));
    if field.required {
        def.push_str(" NOT NULL");
    }
    if field.unique {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = default_literal(field, db) {
        def.push_str(&format!(" DEFAULT {default}"));
    }
    if let Some(reference) = &field.references {
        def.push_str(&format!(
            " REFERENCES {} ({})",
            db.quote(&reference.model),
            db.quote(&reference.field)
        ));
        if let Some(on_delete) = reference.on_delete {
            def.push_str(&format!(" ON DELETE {}", on_delete.as_sql()));
        }
    }
    def
}

pub fn create_table(
    name: &str,
    table: &SchemaTable,
    db: DatabaseType,
) -> String {
    let mut columns = vec![id_column(db)];
    columns.extend(
        table
            .fields
            .iter()
            .filter(|(column, _)| column.as_str() != "id")
            .map(|(column, field)| column_definition(column, field, db)),
    );
    let guard = if db == DatabaseType::Mssql { "" } else { "IF NOT EXISTS " };
    format!(
        "CREATE TABLE {guard}{} ({})",
        db.quote(name),
        columns.join(", ")
    )
}

/// `ALTER TABLE .. ADD COLUMN`, plus a unique index where the engine cannot
/// add a UNIQUE column in place.
pub fn add_column(table: &str, column: &str, field: &FieldAttribute, db: DatabaseType) -> Vec<String> {
    let mut field = field.clone();
    let mut statements = Vec::with_capacity(2);
    let mut unique_index = None;
    if db == DatabaseType::Sqlite {
        // SQLite cannot add a NOT NULL column without a default, nor a UNIQUE one.
        if field.required && field.default_value.is_none() {
            field.required = false;
        }
        if field.unique {
            field.unique = false;
            unique_index = Some(format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                db.quote(&format!("uq_{table}_{column}")),
                db.quote(table),
                db.quote(column)
            ));
        }
    }
    statements.push(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        db.quote(table),
        column_definition(column, &field, db)
    ));
    statements.extend(unique_index);
    statements
}

/// Indexes for sortable, non-unique columns.
pub fn create_indexes(name: &str, table: &SchemaTable, db: DatabaseType) -> Vec<String> {
    table
        .fields
        .iter()
        .filter(|(_, field)| field.sortable && !field.unique)
        .map(|(column, _)| {
            format!(
                "CREATE INDEX {} ON {} ({})",
                db.quote(&format!("idx_{name}_{column}")),
                db.quote(name),
                db.quote(column)
            )
        })
        .collect()
}

/// Whether an introspected column type is compatible with the field type.
pub fn match_type(actual: &str, field_type: FieldType, db: DatabaseType) -> bool {
    let actual = actual.to_lowercase();
    let candidates: &[&str] = match (field_type, db) {
        (FieldType::Boolean, DatabaseType::Sqlite) => &["integer", "int", "boolean"],
        (FieldType::Boolean, _) => &["bool", "tinyint", "smallint", "bit"],
        (FieldType::Number, _) => &["int", "integer", "bigint", "numeric", "real", "double", "float", "decimal"],
        (FieldType::String | FieldType::Date | FieldType::StringArray | FieldType::NumberArray, _) => {
            &["text", "char", "varchar", "character", "date", "timestamp"]
        }
    };
    candidates.iter().any(|c| actual.contains(c))
}

/// Join statements into a single script.
pub fn compile_statements(statements: &[String]) -> String {
    if statements.is_empty() {
        return ";".to_string();
    }
    let mut sql = statements.join(";\n\n");
    sql.push(';');
    sql
}
