//! `#{name}` parameter binding.

use crate::rewrite::placeholders;
use regex::Regex;
use relmap_core::{Error, ParamSource, Result, Value};
use std::sync::OnceLock;

fn named_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"#\{([A-Za-z0-9_-]*)\}").expect("named parameter pattern compiles")
    })
}

/// Replace every `#{name}` with a positional placeholder.
///
/// Names resolve against `source`; each occurrence, repeats included, adds
/// one argument in the order the placeholders appear. A list value expands
/// in place like `??` does. An unknown name fails with
/// [`Error::MissingField`].
pub fn bind_named_params(sql: &str, source: &dyn ParamSource) -> Result<(String, Vec<Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut args = Vec::new();
    let mut last = 0;

    for caps in named_param().captures_iter(sql) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = source
            .param(name.as_str())
            .ok_or_else(|| Error::MissingField(name.as_str().to_string()))?;

        out.push_str(&sql[last..whole.start()]);
        match value {
            Value::Array(items) => {
                out.push_str(&placeholders(items.len()));
                args.extend(items);
            }
            single => {
                out.push('?');
                args.push(single);
            }
        }
        last = whole.end();
    }
    out.push_str(&sql[last..]);

    Ok((out, args))
}
