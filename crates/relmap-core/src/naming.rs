//! Identifier inflection between Rust names and column names.

/// Convert a field or type identifier to its column form.
///
/// Every uppercase letter after the first character starts a new
/// `_`-separated segment and the result is lowercased, so `TestOrmDId`
/// becomes `test_orm_d_id`. Identifiers already in snake_case pass through.
pub fn field_to_column(ident: &str) -> String {
    let ident = ident.strip_prefix("r#").unwrap_or(ident);
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, ch) in ident.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a column or table name to a type-style identifier:
/// `user_profile` becomes `UserProfile`.
pub fn column_to_field(column: &str) -> String {
    column
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_to_column() {
        assert_eq!(field_to_column("TestOrmDId"), "test_orm_d_id");
        assert_eq!(field_to_column("UserProfile"), "user_profile");
        assert_eq!(field_to_column("created_at"), "created_at");
        assert_eq!(field_to_column("userId"), "user_id");
        assert_eq!(field_to_column("r#type"), "type");
        assert_eq!(field_to_column("ID"), "i_d");
    }

    #[test]
    fn test_column_to_field() {
        assert_eq!(column_to_field("user_profile"), "UserProfile");
        assert_eq!(column_to_field("id"), "Id");
        assert_eq!(column_to_field("__x"), "X");
    }
}
