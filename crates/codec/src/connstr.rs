//! Connection-string diff suppression.
//!
//! The management API never echoes the password component back, so a naive
//! comparison between stored state and the configured string would show a
//! permanent diff. The comparison strips `password`-prefixed tokens from
//! the *new* side only; the old side is assumed to come from the API and
//! carry no password. This one-sidedness is load-bearing: do not make it
//! symmetric.

/// True when `old` and `new` describe the same connection, ignoring token
/// order, case, and any password tokens present in `new`.
pub fn connection_strings_equivalent(old: &str, new: &str) -> bool {
    let mut old_tokens: Vec<String> =
        old.to_lowercase().split(';').map(str::to_string).collect();
    old_tokens.sort();

    let mut new_tokens: Vec<String> = new
        .to_lowercase()
        .split(';')
        .filter(|t| !t.starts_with("password"))
        .map(str::to_string)
        .collect();
    new_tokens.sort();

    old_tokens.len() == new_tokens.len()
        && old_tokens
            .iter()
            .zip(new_tokens.iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}
