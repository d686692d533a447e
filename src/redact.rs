use std::borrow::Cow;

const TOKEN_FIELDS: [&str; 4] = [
    "\"access_token\"",
    "\"refresh_token\"",
    "\"refreshToken\"",
    "\"accessToken\"",
];

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() {
        return Some(0);
    }
    if nee.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - nee.len()).find(|&i| {
        hay[i..i + nee.len()]
            .iter()
            .zip(nee)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

/// `Bearer <token>` -> `Bearer REDACTED`, wherever it appears.
fn redact_bearer(text: String) -> String {
    const PREFIX: &str = "bearer ";
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = find_ascii_case_insensitive(rest, PREFIX) {
        out.push_str(&rest[..idx + PREFIX.len()]);
        rest = &rest[idx + PREFIX.len()..];

        let consumed: usize = rest
            .chars()
            .take_while(|ch| !ch.is_whitespace() && *ch != '"' && *ch != ',')
            .map(char::len_utf8)
            .sum();
        out.push_str("REDACTED");
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

/// `"refresh_token": "abc"` -> `"refresh_token": "REDACTED"`.
fn redact_json_field(text: String, field: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = rest.find(field) {
        out.push_str(&rest[..idx + field.len()]);
        rest = &rest[idx + field.len()..];

        let Some(colon) = rest.find(|c: char| !c.is_whitespace()) else {
            break;
        };
        if !rest[colon..].starts_with(':') {
            continue;
        }
        let after_colon = &rest[colon + 1..];
        let Some(quote) = after_colon.find(|c: char| !c.is_whitespace()) else {
            break;
        };
        if !after_colon[quote..].starts_with('"') {
            continue;
        }
        let value = &after_colon[quote + 1..];
        let Some(end) = value.find('"') else {
            break;
        };
        out.push_str(&rest[..colon + 1]);
        out.push_str(&after_colon[..quote + 1]);
        out.push_str("REDACTED");
        rest = &value[end..];
    }
    out.push_str(rest);
    out
}

/// Strips credentials from text headed for logs or error messages.
pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let mut value = redact_bearer(input.to_string());
    for field in TOKEN_FIELDS {
        if value.contains(field) {
            value = redact_json_field(value, field);
        }
    }

    if value == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(value)
    }
}
