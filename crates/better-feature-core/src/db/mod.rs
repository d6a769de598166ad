pub mod adapter;
pub mod field;
pub mod filter;
pub mod schema;
pub mod secondary_storage;

pub use adapter::{
    Adapter, AdapterMetadata, Connector, FindManyQuery, Operator, SchemaOptions, SchemaStatus,
    SortBy, SortDirection, WhereClause,
};
pub use filter::{translate_where, translate_where_with, NativeFilter, NativeOp};
pub use schema::{
    DatabaseSchema, FieldAttribute, FieldReference, FieldType, OnDelete, PluginSchema,
    SchemaTable, TableFragment, TableSchema, TableSchemaMap,
};
