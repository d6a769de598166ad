// Schema DSL: field attributes, table fragments contributed by plugins,
// the aggregated table map and the migration-facing database schema.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "string[]")]
    StringArray,
    #[serde(rename = "number[]")]
    NumberArray,
}

impl FieldType {
    pub fn is_array(&self) -> bool {
        matches!(self, Self::StringArray | Self::NumberArray)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnDelete {
    #[serde(rename = "cascade")]
    Cascade,
    #[serde(rename = "restrict")]
    Restrict,
    #[serde(rename = "set null")]
    SetNull,
    #[serde(rename = "set default")]
    SetDefault,
    #[serde(rename = "no action")]
    NoAction,
}

impl OnDelete {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// Foreign key: target model key, target field and cascade rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub model: String,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<OnDelete>,
}

pub type TransformFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Value transforms applied by the internal adapter on write (`input`) and
/// on read (`output`).
#[derive(Clone, Default)]
pub struct FieldTransform {
    pub input: Option<TransformFn>,
    pub output: Option<TransformFn>,
}

impl fmt::Debug for FieldTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTransform")
            .field("input", &self.input.is_some())
            .field("output", &self.output.is_some())
            .finish()
    }
}

/// Rejects a field value on write with a message.
#[derive(Clone)]
pub struct FieldValidator(pub Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>);

impl fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldValidator(..)")
    }
}

/// Describes one schema field.
///
/// A field takes part in both the read and write paths unless `input` or
/// `returned` is set to `false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAttribute {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Storage-level column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<FieldReference>,
    #[serde(default = "default_true")]
    pub input: bool,
    #[serde(default = "default_true")]
    pub returned: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub bigint: bool,
    #[serde(skip)]
    pub transform: FieldTransform,
    #[serde(skip)]
    pub validator: Option<FieldValidator>,
}

fn default_true() -> bool {
    true
}

impl FieldAttribute {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            unique: false,
            default_value: None,
            field_name: None,
            references: None,
            input: true,
            returned: true,
            sortable: false,
            bigint: false,
            transform: FieldTransform::default(),
            validator: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn bigint(mut self) -> Self {
        self.bigint = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.returned = false;
        self
    }

    pub fn no_input(mut self) -> Self {
        self.input = false;
        self
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn references(
        mut self,
        model: impl Into<String>,
        field: impl Into<String>,
        on_delete: Option<OnDelete>,
    ) -> Self {
        self.references = Some(FieldReference {
            model: model.into(),
            field: field.into(),
            on_delete,
        });
        self
    }

    pub fn transform_input<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform.input = Some(Arc::new(f));
        self
    }

    pub fn transform_output<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform.output = Some(Arc::new(f));
        self
    }

    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(FieldValidator(Arc::new(f)));
        self
    }

    /// Column name for the logical key `key`.
    pub fn column<'a>(&'a self, key: &'a str) -> &'a str {
        self.field_name.as_deref().unwrap_or(key)
    }
}

// ─── Plugin fragments ────────────────────────────────────────────

/// A plugin's contribution to one logical table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_migrations: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl TableFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, attr: FieldAttribute) -> Self {
        self.fields.insert(key.into(), attr);
        self
    }

    pub fn order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn disable_migrations(mut self) -> Self {
        self.disable_migrations = Some(true);
        self
    }
}

/// Table key -> fragment, as declared by one plugin.
pub type PluginSchema = BTreeMap<String, TableFragment>;

// ─── Aggregated tables ───────────────────────────────────────────

/// One logical table after aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub model_name: String,
    pub fields: BTreeMap<String, FieldAttribute>,
    #[serde(default)]
    pub disable_migrations: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl TableSchema {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            fields: BTreeMap::new(),
            disable_migrations: false,
            order: None,
        }
    }

    pub fn field(mut self, key: impl Into<String>, attr: FieldAttribute) -> Self {
        self.fields.insert(key.into(), attr);
        self
    }

    /// Storage column for a logical field key. Unknown keys map to themselves.
    pub fn column_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.fields.get(key).map(|f| f.column(key)).unwrap_or(key)
    }
}

/// Table key -> aggregated table.
pub type TableSchemaMap = BTreeMap<String, TableSchema>;

/// Find a table by its key or by its `modelName`.
pub fn find_table<'a>(tables: &'a TableSchemaMap, model: &str) -> Option<&'a TableSchema> {
    tables
        .get(model)
        .or_else(|| tables.values().find(|t| t.model_name == model))
}

// ─── Database schema (migration input) ───────────────────────────

/// One physical table: fields keyed by column name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTable {
    pub fields: BTreeMap<String, FieldAttribute>,
    /// Lower first; `None` sorts last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default)]
    pub disable_migrations: bool,
}

/// Physical tables keyed by `modelName`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub tables: BTreeMap<String, SchemaTable>,
}

impl DatabaseSchema {
    /// Tables in creation order: by `order`, unordered last, ties by name.
    pub fn ordered(&self) -> Vec<(&str, &SchemaTable)> {
        let mut tables: Vec<(&str, &SchemaTable)> =
            self.tables.iter().map(|(k, v)| (k.as_str(), v)).collect();
        tables.sort_by(|(a_name, a), (b_name, b)| {
            let a_order = a.order.unwrap_or(u32::MAX);
            let b_order = b.order.unwrap_or(u32::MAX);
            a_order.cmp(&b_order).then_with(|| a_name.cmp(b_name))
        });
        tables
    }
}
