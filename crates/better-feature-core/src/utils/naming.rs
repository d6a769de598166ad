// Name conversions shared by the SQL-backed and ORM-backed adapters.

use regex::Regex;
use std::sync::LazyLock;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"));

/// `createdAt` -> `created_at`
pub fn to_snake_case(s: &str) -> String {
    CAMEL_BOUNDARY.replace_all(s, "${1}_${2}").to_lowercase()
}

/// `created_at` -> `createdAt`
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut upper_next = false;
    for ch in s.chars() {
        if ch == '_' {
            upper_next = !result.is_empty();
        } else if upper_next {
            result.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

/// English-ish pluralization used for `usePlural` table names.
pub fn pluralize(name: &str) -> String {
    if name.ends_with('s') || name.ends_with('x') || name.ends_with("sh") || name.ends_with("ch") {
        format!("{name}es")
    } else if name.ends_with('y')
        && !["ay", "ey", "oy", "uy"].iter().any(|v| name.ends_with(v))
    {
        format!("{}ies", &name[..name.len() - 1])
    } else {
        format!("{name}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("rateLimit"), "rate_limit");
        assert_eq!(to_snake_case("id"), "id");
    }

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("display_name"), "displayName");
        assert_eq!(to_camel_case("last_request"), "lastRequest");
        assert_eq!(to_camel_case("_private"), "private");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("tester"), "testers");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("policy"), "policies");
        assert_eq!(pluralize("key"), "keys");
    }
}
