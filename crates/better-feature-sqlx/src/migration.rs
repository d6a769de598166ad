// Differential migrations: introspect the live database, compare it with the
// target schema and produce CREATE TABLE for missing tables and
// ALTER TABLE ADD COLUMN for missing columns.

use std::collections::{BTreeMap, HashMap};

use sqlx::{AnyPool, Row};

use better_feature_core::db::schema::{DatabaseSchema, FieldAttribute, FieldType};
use better_feature_core::error::{FeatureError, Result};

use crate::dialect::DatabaseType;
use crate::schema::{add_column, compile_statements, create_indexes, create_table, match_type};

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone)]
pub struct ColumnsToAdd {
    pub table: String,
    pub fields: BTreeMap<String, FieldAttribute>,
}

/// Existing column whose type does not fit the field. Reported, never altered.
#[derive(Debug, Clone)]
pub struct TypeMismatch {
    pub table: String,
    pub field: String,
    pub expected: FieldType,
    pub actual: String,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    pub to_be_created: Vec<String>,
    pub to_be_added: Vec<ColumnsToAdd>,
    pub type_mismatches: Vec<TypeMismatch>,
    pub statements: Vec<String>,
}

impl MigrationPlan {
    pub fn compile(&self) -> String {
        compile_statements(&self.statements)
    }

    pub fn has_pending(&self) -> bool {
        !self.statements.is_empty()
    }

    pub async fn run(&self, pool: &AnyPool) -> Result<()> {
        for stmt in &self.statements {
            tracing::debug!(sql = %stmt, "running migration statement");
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| FeatureError::Database(format!("Migration failed: {e}\nSQL: {stmt}")))?;
        }
        Ok(())
    }
}

fn introspection_error(what: &str, e: sqlx::Error) -> FeatureError {
    FeatureError::Database(format!("{what} introspection failed: {e}"))
}

pub async fn introspect_tables(pool: &AnyPool, db: DatabaseType) -> Result<Vec<TableInfo>> {
    match db {
        DatabaseType::Sqlite => introspect_sqlite(pool).await,
        DatabaseType::Postgres => {
            let schema = postgres_schema(pool).await;
            introspect_information_schema(pool, db, &schema).await
        }
        DatabaseType::Mysql => {
            let row = sqlx::query("SELECT DATABASE() AS db_name")
                .fetch_optional(pool)
                .await
                .map_err(|e| introspection_error("MySQL", e))?;
            let db_name: String = row
                .and_then(|r| r.try_get::<String, _>("db_name").ok())
                .unwrap_or_default();
            if db_name.is_empty() {
                return Ok(Vec::new());
            }
            introspect_information_schema(pool, db, &db_name).await
        }
        // Not reachable through sqlx; every table is treated as missing.
        DatabaseType::Mssql => Ok(Vec::new()),
    }
}

async fn introspect_sqlite(pool: &AnyPool) -> Result<Vec<TableInfo>> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| introspection_error("SQLite", e))?;

    let mut tables = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row.try_get("name").map_err(|e| introspection_error("SQLite", e))?;
        let pragma = format!("PRAGMA table_info({})", DatabaseType::Sqlite.quote(&name));
        let columns = sqlx::query(&pragma)
            .fetch_all(pool)
            .await
            .map_err(|e| introspection_error("SQLite", e))?
            .iter()
            .map(|col| ColumnInfo {
                name: col.try_get("name").unwrap_or_default(),
                data_type: col.try_get("type").unwrap_or_default(),
                is_nullable: col.try_get::<i64, _>("notnull").unwrap_or(0) == 0,
            })
            .collect();
        tables.push(TableInfo { name, columns });
    }
    Ok(tables)
}

async fn postgres_schema(pool: &AnyPool) -> String {
    match sqlx::query("SHOW search_path").fetch_optional(pool).await {
        Ok(Some(row)) => {
            let search_path: String = row.try_get("search_path").unwrap_or_default();
            search_path
                .split(',')
                .map(|s| s.trim().trim_matches('"').trim_matches('\''))
                .find(|s| !s.starts_with('$') && !s.is_empty())
                .unwrap_or("public")
                .to_string()
        }
        _ => "public".to_string(),
    }
}

async fn introspect_information_schema(
    pool: &AnyPool,
    db: DatabaseType,
    schema: &str,
) -> Result<Vec<TableInfo>> {
    let (p1, p2) = (db.placeholder(1), db.placeholder(2));
    let rows = sqlx::query(&format!(
        "SELECT table_name AS table_name FROM information_schema.tables \
         WHERE table_schema = {p1} AND table_type = 'BASE TABLE'"
    ))
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(|e| introspection_error(db.as_str(), e))?;

    let mut tables = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row
            .try_get("table_name")
            .map_err(|e| introspection_error(db.as_str(), e))?;
        let columns = sqlx::query(&format!(
            "SELECT column_name AS column_name, data_type AS data_type, is_nullable AS is_nullable \
             FROM information_schema.columns \
             WHERE table_schema = {p1} AND table_name = {p2} ORDER BY ordinal_position"
        ))
        .bind(schema)
        .bind(&name)
        .fetch_all(pool)
        .await
        .map_err(|e| introspection_error(db.as_str(), e))?
        .iter()
        .map(|col| ColumnInfo {
            name: col.try_get("column_name").unwrap_or_default(),
            data_type: col.try_get("data_type").unwrap_or_default(),
            is_nullable: col
                .try_get::<String, _>("is_nullable")
                .map(|v| v.eq_ignore_ascii_case("YES"))
                .unwrap_or(true),
        })
        .collect();
        tables.push(TableInfo { name, columns });
    }
    Ok(tables)
}

/// Compare the schema with the live database and build the statements that
/// bring it up to date. Tables with migrations disabled are skipped.
pub async fn get_migrations(
    pool: &AnyPool,
    schema: &DatabaseSchema,
    db: DatabaseType,
) -> Result<MigrationPlan> {
    let existing = introspect_tables(pool, db).await?;
    Ok(plan_migrations(&existing, schema, db))
}

/// Pure diff step of [`get_migrations`].
pub fn plan_migrations(existing: &[TableInfo], schema: &DatabaseSchema, db: DatabaseType) -> MigrationPlan {
    let existing: HashMap<&str, &TableInfo> =
        existing.iter().map(|t| (t.name.as_str(), t)).collect();
    let mut plan = MigrationPlan::default();
    let mut creates = Vec::new();
    let mut indexes = Vec::new();
    let mut alters = Vec::new();

    for (name, table) in schema.ordered() {
        if table.disable_migrations {
            continue;
        }
        let Some(live) = existing.get(name) else {
            plan.to_be_created.push(name.to_string());
            creates.push(create_table(name, table, db));
            indexes.extend(create_indexes(name, table, db));
            continue;
        };

        let mut missing = BTreeMap::new();
        for (column, field) in table.fields.iter().filter(|(c, _)| c.as_str() != "id") {
            match live.columns.iter().find(|c| &c.name == column) {
                Some(col) if !match_type(&col.data_type, field.field_type, db) => {
                    plan.type_mismatches.push(TypeMismatch {
                        table: name.to_string(),
                        field: column.clone(),
                        expected: field.field_type,
                        actual: col.data_type.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    alters.extend(add_column(name, column, field, db));
                    missing.insert(column.clone(), field.clone());
                }
            }
        }
        if !missing.is_empty() {
            plan.to_be_added.push(ColumnsToAdd { table: name.to_string(), fields: missing });
        }
    }

    for mismatch in &plan.type_mismatches {
        tracing::warn!(
            table = %mismatch.table,
            field = %mismatch.field,
            actual = %mismatch.actual,
            "Field type mismatch: expected {:?}",
            mismatch.expected
        );
    }

    plan.statements = alters.into_iter().chain(creates).chain(indexes).collect();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use better_feature_core::db::schema::SchemaTable;

    fn schema() -> DatabaseSchema {
        let mut user = SchemaTable { order: Some(1), ..Default::default() };
        user.fields.insert("email".into(), FieldAttribute::string().unique());
        let mut session = SchemaTable { order: Some(2), ..Default::default() };
        session
            .fields
            .insert("userId".into(), FieldAttribute::string().references("user", "id", None));
        let mut legacy = SchemaTable { disable_migrations: true, ..Default::default() };
        legacy.fields.insert("x".into(), FieldAttribute::string());

        let mut schema = DatabaseSchema::default();
        schema.tables.insert("session".into(), session);
        schema.tables.insert("user".into(), user);
        schema.tables.insert("legacy".into(), legacy);
        schema
    }

    #[test]
    fn test_plan_for_empty_database_respects_order() {
        let plan = plan_migrations(&[], &schema(), DatabaseType::Sqlite);
        assert_eq!(plan.to_be_created, vec!["user".to_string(), "session".to_string()]);
        assert!(plan.statements[0].contains("\"user\""));
        assert!(plan.statements[1].contains("\"session\""));
        assert!(plan.has_pending());
    }

    #[test]
    fn test_plan_adds_missing_columns() {
        let live = vec![
            TableInfo {
                name: "user".into(),
                columns: vec![ColumnInfo { name: "id".into(), data_type: "TEXT".into(), is_nullable: false }],
            },
            TableInfo {
                name: "session".into(),
                columns: vec![ColumnInfo { name: "userId".into(), data_type: "INTEGER".into(), is_nullable: false }],
            },
        ];
        let plan = plan_migrations(&live, &schema(), DatabaseType::Sqlite);
        assert!(plan.to_be_created.is_empty());
        assert_eq!(plan.to_be_added.len(), 1);
        assert_eq!(plan.statements.len(), 2);
        assert_eq!(plan.statements[0], "ALTER TABLE \"user\" ADD COLUMN \"email\" TEXT");
        assert_eq!(plan.type_mismatches.len(), 1);
        assert_eq!(plan.type_mismatches[0].field, "userId");
    }

    #[test]
    fn test_up_to_date_plan_compiles_to_noop() {
        let plan = MigrationPlan::default();
        assert!(!plan.has_pending());
        assert_eq!(plan.compile(), ";");
    }
}
