// Logical <-> storage field conversion driven by `FieldAttribute::field_name`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::schema::FieldAttribute;

/// Map logical keys to storage columns. `id` is kept when present;
/// keys without a schema entry and absent values are dropped.
pub fn convert_to_db(fields: &BTreeMap<String, FieldAttribute>, values: &Value) -> Value {
    let Some(obj) = values.as_object() else {
        return Value::Object(Map::new());
    };
    let mut out = Map::new();
    if let Some(id) = obj.get("id").filter(|v| !v.is_null()) {
        out.insert("id".into(), id.clone());
    }
    for (key, attr) in fields {
        if let Some(value) = obj.get(key) {
            out.insert(attr.column(key).to_string(), value.clone());
        }
    }
    Value::Object(out)
}

/// Map storage columns back to logical keys. Every schema field is present in
/// the result (`null` when the row lacks the column).
pub fn convert_from_db(fields: &BTreeMap<String, FieldAttribute>, row: &Value) -> Option<Value> {
    let obj = row.as_object()?;
    let mut out = Map::new();
    out.insert("id".into(), obj.get("id").cloned().unwrap_or(Value::Null));
    for (key, attr) in fields {
        let value = obj.get(attr.column(key)).cloned().unwrap_or(Value::Null);
        out.insert(key.clone(), value);
    }
    Some(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> BTreeMap<String, FieldAttribute> {
        let mut f = BTreeMap::new();
        f.insert("displayName".into(), FieldAttribute::string().field_name("display_name"));
        f.insert("name".into(), FieldAttribute::string());
        f
    }

    #[test]
    fn test_convert_to_db_renames_and_keeps_id() {
        let out = convert_to_db(&fields(), &json!({ "id": "1", "displayName": "A", "extra": 1 }));
        assert_eq!(out, json!({ "id": "1", "display_name": "A" }));
    }

    #[test]
    fn test_convert_from_db_restores_keys() {
        let out = convert_from_db(&fields(), &json!({ "id": "1", "display_name": "A", "name": "a" }))
            .unwrap();
        assert_eq!(out, json!({ "id": "1", "displayName": "A", "name": "a" }));
    }

    #[test]
    fn test_convert_from_db_null_row() {
        assert!(convert_from_db(&fields(), &Value::Null).is_none());
    }
}
