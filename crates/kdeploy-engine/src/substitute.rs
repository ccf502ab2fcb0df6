//! Variable substitution for manifest text.
//!
//! Replaces `${VAR}` tokens with values from a caller-supplied
//! environment before parsing. Tokens whose variable is not present in
//! the environment pass through verbatim and are reported back so the
//! loader can warn about them; the manifest still parses, and an invalid
//! value then fails at apply time like any other bad field.

use std::collections::BTreeMap;

/// Result of substituting one piece of manifest text.
#[derive(Debug, Clone)]
pub struct Substituted {
    /// The text with all resolvable tokens replaced.
    pub text: String,
    /// Variable names that were referenced but absent from the
    /// environment, in first-occurrence order, deduplicated.
    pub missing: Vec<String>,
}

/// Replace `${VAR}` occurrences in `input` with values from `env`.
///
/// Variable names are word characters (`[A-Za-z0-9_]`). Anything that
/// does not form a complete token, such as `$VAR` or `${foo.bar}`, is
/// left untouched.
pub fn substitute(input: &str, env: &BTreeMap<String, String>) -> Substituted {
    let bytes = input.as_bytes();
    let mut text = String::with_capacity(input.len());
    let mut missing: Vec<String> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(end) = token_end(bytes, i + 2) {
                let name = &input[i + 2..end];
                match env.get(name) {
                    Some(value) => text.push_str(value),
                    None => {
                        text.push_str(&input[i..=end]);
                        if !missing.iter().any(|m| m == name) {
                            missing.push(name.to_string());
                        }
                    }
                }
                i = end + 1;
                continue;
            }
        }
        // '$' is single-byte ASCII, so byte positions here are always
        // char boundaries.
        let next = input[i..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(1);
        text.push_str(&input[i..i + next]);
        i += next;
    }

    Substituted { text, missing }
}

/// Index of the closing `}` of a token starting at `start`, if the
/// characters up to it form a non-empty word-character name.
fn token_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'}' => return (i > start).then_some(i),
            b if b.is_ascii_alphanumeric() || b == b'_' => i += 1,
            _ => return None,
        }
    }
    None
}
