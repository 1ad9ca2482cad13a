use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;
const REDACTED: &str = "[REDACTED]";

/// Prefixes of bare credentials (API keys, GitHub and Copilot tokens).
const TOKEN_PREFIXES: [&str; 7] = [
    "sk-", "ghp_", "gho_", "ghu_", "github_pat_", "tid=", "ya29.",
];

/// Markers whose following value is a credential.
const VALUE_MARKERS: [&str; 9] = [
    "Authorization: Bearer ",
    "authorization: bearer ",
    "Authorization: token ",
    "x-api-key: ",
    "api_key=",
    "access_token=",
    "\"access_token\":\"",
    "\"token\":\"",
    "\"device_code\":\"",
];

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=' | ';')
}

/// Replace every `marker<token>` occurrence with the redaction marker.
fn redact_after(text: &mut String, marker: &str) {
    let mut from = 0;
    while let Some(rel) = text[from..].find(marker) {
        let start = from + rel;
        let value_start = start + marker.len();
        let value_len: usize = text[value_start..]
            .chars()
            .take_while(|c| is_token_char(*c))
            .map(char::len_utf8)
            .sum();

        if value_len == 0 {
            from = value_start;
            continue;
        }

        text.replace_range(start..value_start + value_len, REDACTED);
        from = start + REDACTED.len();
    }
}

/// Redact credential-looking substrings before text reaches a log line.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let hit = TOKEN_PREFIXES
        .iter()
        .chain(VALUE_MARKERS.iter())
        .any(|pattern| input.contains(pattern));
    if !hit {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for marker in TOKEN_PREFIXES.iter().chain(VALUE_MARKERS.iter()) {
        redact_after(&mut scrubbed, marker);
    }
    Cow::Owned(scrubbed)
}

/// Scrub and cap an upstream error body.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    match scrubbed.char_indices().nth(MAX_API_ERROR_CHARS) {
        Some((cut, _)) => format!("{}...", &scrubbed[..cut]),
        None => scrubbed.into_owned(),
    }
}

/// Build a sanitized error from a non-success HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    anyhow::anyhow!("{provider} API error ({status}): {}", sanitize_api_error(&body))
}
