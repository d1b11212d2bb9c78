//! `IN (??)` list expansion.
//!
//! Positional drivers cannot bind a list to one placeholder. Statements
//! write `??` where a list goes and pass a `Value::Array`; expansion turns
//! each such pair into `?, ?, ?` plus the flattened elements.

use relmap_core::{Error, Result, Value};

/// Placeholder token a list argument expands into.
pub const LIST_TOKEN: &str = "??";

/// Expand every `??` with the next `Value::Array` argument.
///
/// Lists are matched to `??` tokens in order and their elements take the
/// list's place in the argument vector. An empty list becomes `NULL`, so
/// `IN (??)` with no elements matches nothing. Statements without `??` are
/// returned untouched.
pub fn expand_in_list(sql: &str, args: Vec<Value>) -> Result<(String, Vec<Value>)> {
    if !sql.contains(LIST_TOKEN) {
        return Ok((sql.to_string(), args));
    }

    let mut out = String::with_capacity(sql.len() + 16);
    let mut flat = Vec::with_capacity(args.len());
    let mut rest = sql;

    for arg in args {
        let Value::Array(items) = arg else {
            flat.push(arg);
            continue;
        };

        let Some(idx) = rest.find(LIST_TOKEN) else {
            return Err(Error::Custom(format!(
                "more list arguments than `{LIST_TOKEN}` placeholders in: {sql}"
            )));
        };
        out.push_str(&rest[..idx]);
        out.push_str(&placeholders(items.len()));
        rest = &rest[idx + LIST_TOKEN.len()..];
        flat.extend(items);
    }

    if rest.contains(LIST_TOKEN) {
        return Err(Error::Custom(format!(
            "`{LIST_TOKEN}` placeholder without a list argument in: {sql}"
        )));
    }
    out.push_str(rest);

    Ok((out, flat))
}

/// `n` comma-separated `?` placeholders, or `NULL` for zero.
pub fn placeholders(n: usize) -> String {
    if n == 0 {
        return "NULL".to_string();
    }
    let mut s = String::with_capacity(n * 3);
    for i in 0..n {
        if i > 0 {
            s.push_str(", ");
        }
        s.push('?');
    }
    s
}
