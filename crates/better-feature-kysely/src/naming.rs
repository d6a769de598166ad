// Kysely-style naming: snake_case tables and columns, optional plural tables.
// Logical keys stay camelCase above the adapter.

use better_feature_core::utils::{pluralize, to_camel_case, to_snake_case};

pub fn model_to_table_name(model: &str, use_plural: bool) -> String {
    let name = to_snake_case(model);
    if use_plural {
        pluralize(&name)
    } else {
        name
    }
}

pub fn field_to_column_name(field: &str) -> String {
    to_snake_case(field)
}

pub fn column_to_field_name(column: &str) -> String {
    to_camel_case(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names() {
        assert_eq!(field_to_column_name("createdAt"), "created_at");
        assert_eq!(field_to_column_name("id"), "id");
        assert_eq!(column_to_field_name("display_name"), "displayName");
    }

    #[test]
    fn test_model_to_table_name() {
        assert_eq!(model_to_table_name("user", false), "user");
        assert_eq!(model_to_table_name("user", true), "users");
        assert_eq!(model_to_table_name("rateLimit", false), "rate_limit");
        assert_eq!(model_to_table_name("rateLimit", true), "rate_limits");
    }
}
