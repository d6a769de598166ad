// Query builder: renders `NativeFilter` trees and CRUD statements into SQL
// with dialect-specific placeholders. Values are always bound, never inlined.

use serde_json::Value;

use better_feature_core::db::adapter::FindManyQuery;
use better_feature_core::db::filter::{NativeFilter, NativeOp};
use better_feature_core::error::{FeatureError, Result};

use crate::dialect::DatabaseType;

/// SQL text plus its bind values in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl SqlFragment {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    db: DatabaseType,
}

impl QueryBuilder {
    pub fn new(db: DatabaseType) -> Self {
        Self { db }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.db
    }

    pub fn quote(&self, ident: &str) -> String {
        self.db.quote(ident)
    }

    /// ` WHERE ...` for the filter, or an empty fragment when there is none.
    /// `bind_offset` is the number of binds already used by the statement.
    pub fn build_where(&self, filter: Option<&NativeFilter>, bind_offset: usize) -> Result<SqlFragment> {
        let Some(filter) = filter else {
            return Ok(SqlFragment::empty());
        };
        let mut binds = Vec::new();
        let condition = self.render(filter, bind_offset, &mut binds)?;
        Ok(SqlFragment {
            sql: format!(" WHERE {condition}"),
            binds,
        })
    }

    fn next(&self, offset: usize, binds: &mut Vec<Value>, value: Value) -> String {
        binds.push(value);
        self.db.placeholder(offset + binds.len())
    }

    fn render(&self, filter: &NativeFilter, offset: usize, binds: &mut Vec<Value>) -> Result<String> {
        match filter {
            NativeFilter::Condition { field, op, value } => {
                self.render_condition(field, *op, value, offset, binds)
            }
            NativeFilter::Group { and, or } => {
                let mut parts = Vec::new();
                if !and.is_empty() {
                    let rendered = and
                        .iter()
                        .map(|f| self.render(f, offset, binds))
                        .collect::<Result<Vec<_>>>()?;
                    parts.push(format!("({})", rendered.join(" AND ")));
                }
                if !or.is_empty() {
                    let rendered = or
                        .iter()
                        .map(|f| self.render(f, offset, binds))
                        .collect::<Result<Vec<_>>>()?;
                    parts.push(format!("({})", rendered.join(" OR ")));
                }
                if parts.is_empty() {
                    return Ok("1 = 1".to_string());
                }
                Ok(parts.join(" AND "))
            }
        }
    }

    fn render_condition(
        &self,
        field: &str,
        op: NativeOp,
        value: &Value,
        offset: usize,
        binds: &mut Vec<Value>,
    ) -> Result<String> {
        let column = self.quote(field);
        let sql = match op {
            NativeOp::Eq if value.is_null() => format!("{column} IS NULL"),
            NativeOp::Ne if value.is_null() => format!("{column} IS NOT NULL"),
            NativeOp::In | NativeOp::NotIn => {
                let items = value.as_array().ok_or_else(|| {
                    FeatureError::Validation(format!("{} expects an array for \"{field}\"", op.key()))
                })?;
                if items.is_empty() {
                    // Nothing is IN an empty set; everything is NOT IN it.
                    return Ok(if op == NativeOp::In { "1 = 0" } else { "1 = 1" }.to_string());
                }
                let placeholders: Vec<String> = items
                    .iter()
                    .map(|v| self.next(offset, binds, v.clone()))
                    .collect();
                let keyword = if op == NativeOp::In { "IN" } else { "NOT IN" };
                format!("{column} {keyword} ({})", placeholders.join(", "))
            }
            _ => {
                let symbol = match op {
                    NativeOp::Eq => "=",
                    NativeOp::Ne => "!=",
                    NativeOp::Gt => ">",
                    NativeOp::Gte => ">=",
                    NativeOp::Lt => "<",
                    NativeOp::Lte => "<=",
                    _ => "LIKE",
                };
                let placeholder = self.next(offset, binds, value.clone());
                format!("{column} {symbol} {placeholder}")
            }
        };
        Ok(sql)
    }

    pub fn build_order_by(&self, query: &FindManyQuery) -> String {
        match &query.sort_by {
            Some(sort) => format!(" ORDER BY {} {}", self.quote(&sort.field), sort.direction.as_sql()),
            None => String::new(),
        }
    }

    pub fn build_limit_offset(&self, query: &FindManyQuery) -> String {
        let mut sql = String::new();
        match (query.limit, query.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            // OFFSET without LIMIT is not valid SQL on these engines.
            (None, Some(_)) => match self.db {
                DatabaseType::Sqlite => sql.push_str(" LIMIT -1"),
                DatabaseType::Mysql => sql.push_str(" LIMIT 18446744073709551615"),
                _ => {}
            },
            (None, None) => {}
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    pub fn build_select(&self, table: &str, select: Option<&[String]>) -> String {
        let columns = match select {
            Some(cols) if !cols.is_empty() => {
                let mut cols: Vec<String> = cols.iter().map(|c| self.quote(c)).collect();
                let id = self.quote("id");
                if !cols.contains(&id) {
                    cols.insert(0, id);
                }
                cols.join(", ")
            }
            _ => "*".to_string(),
        };
        format!("SELECT {} FROM {}", columns, self.quote(table))
    }

    pub fn build_insert(&self, table: &str, data: &Value) -> Result<SqlFragment> {
        let obj = data
            .as_object()
            .ok_or_else(|| FeatureError::Validation(format!("insert into \"{table}\" expects an object")))?;
        let mut columns = Vec::with_capacity(obj.len());
        let mut placeholders = Vec::with_capacity(obj.len());
        let mut binds = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            columns.push(self.quote(key));
            placeholders.push(self.next(0, &mut binds, value.clone()));
        }
        Ok(SqlFragment {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.quote(table),
                columns.join(", "),
                placeholders.join(", ")
            ),
            binds,
        })
    }

    /// `col = $1, col2 = $2` starting after `bind_offset`.
    pub fn build_update_set(&self, data: &Value, bind_offset: usize) -> Result<SqlFragment> {
        let obj = data
            .as_object()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| FeatureError::Validation("update expects a non-empty object".into()))?;
        let mut parts = Vec::with_capacity(obj.len());
        let mut binds = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            let placeholder = self.next(bind_offset, &mut binds, value.clone());
            parts.push(format!("{} = {}", self.quote(key), placeholder));
        }
        Ok(SqlFragment {
            sql: parts.join(", "),
            binds,
        })
    }
}
