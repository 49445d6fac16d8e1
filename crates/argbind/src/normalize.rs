//! Pre-pass that makes every option token atomic before scanning.

/// Whether `token` looks like an option (`-x`, `--long`) rather than a value.
///
/// A lone `-` is a value (conventionally stdin).
pub fn is_option_shaped(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}

/// Rewrite `tokens` in place so the scanner only sees one option per token.
///
/// - `-abc` becomes `-a -b -c` (only when every character after the dash is a letter)
/// - `--name=value` becomes `--name value`
///
/// Everything after a literal `--` is left untouched.
pub fn normalize(tokens: &mut Vec<String>) {
    let input = std::mem::take(tokens);
    let mut out = Vec::with_capacity(input.len());
    let mut iter = input.into_iter();

    while let Some(token) = iter.next() {
        if token == "--" {
            out.push(token);
            out.extend(iter.by_ref());
            break;
        }
        if let Some(flags) = split_short_cluster(&token) {
            out.extend(flags);
            continue;
        }
        if let Some((key, value)) = split_long_assignment(&token) {
            out.push(key.to_string());
            out.push(value.to_string());
            continue;
        }
        out.push(token);
    }

    *tokens = out;
}

pub(crate) fn split_short_cluster(token: &str) -> Option<Vec<String>> {
    let rest = token.strip_prefix('-')?;
    if rest.starts_with('-') || rest.chars().count() < 2 {
        return None;
    }
    if !rest.chars().all(char::is_alphabetic) {
        return None;
    }
    Some(rest.chars().map(|c| format!("-{c}")).collect())
}

fn split_long_assignment(token: &str) -> Option<(&str, &str)> {
    if !token.starts_with("--") {
        return None;
    }
    let (key, value) = token.split_once('=')?;
    if key.len() <= 2 {
        return None;
    }
    Some((key, value))
}
