//! Case conversion between record field names (camelCase) and storage column names (snake_case).

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "min_capacity" -> "minCapacity", "deleted_at" -> "deletedAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "minCapacity" -> "min_capacity", "deletedAt" -> "deleted_at"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("minCapacity"), "min_capacity");
        assert_eq!(to_snake_case("deletedAt"), "deleted_at");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_snake_case("dayOfWeek"), "day_of_week");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("min_capacity"), "minCapacity");
        assert_eq!(to_camel_case("deleted_at"), "deletedAt");
        assert_eq!(to_camel_case("id"), "id");
        assert_eq!(to_camel_case("_private"), "private");
    }

    #[test]
    fn test_round_trip_of_simple_names() {
        for name in ["idStudent", "dayOfWeek", "name"] {
            assert_eq!(to_camel_case(&to_snake_case(name)), name);
        }
    }
}
