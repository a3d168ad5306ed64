use anyhow::{bail, Result};
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

/// Substitute `$name` and `${name}` in pipeline text, including inside quotes.
/// A `$` not followed by a name is kept literally.
pub fn expand_variables(input: &str, variables: &HashMap<String, String>) -> Result<String> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            output.push(c);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }
        let name = take_name(&mut chars);

        if braced {
            if chars.next() != Some('}') {
                bail!("Unterminated '${{' in pipeline (expected '}}' after '{}')", name);
            }
            if name.is_empty() {
                bail!("Empty variable name '${{}}'");
            }
        } else if name.is_empty() {
            output.push('$');
            continue;
        }

        match variables.get(&name) {
            Some(value) => output.push_str(value),
            None => bail!("Variable '${}' not defined (pass --var {}=...)", name, name),
        }
    }

    Ok(output)
}

/// Parse `key=value` pairs from `--var` arguments
pub fn parse_assignments<S: AsRef<str>>(pairs: &[S]) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid variable '{}' (expected key=value)", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid variable '{}' (empty name)", pair);
        }
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

fn take_name(chars: &mut Peekable<Chars>) -> String {
    let mut name = String::new();
    match chars.peek() {
        Some(&c) if c.is_alphabetic() || c == '_' => {}
        _ => return name,
    }
    while let Some(&c) = chars.peek() {
        if !(c.is_alphanumeric() || c == '_') {
            break;
        }
        name.push(c);
        chars.next();
    }
    name
}
