use once_cell::sync::Lazy;
use regex::Regex;

const REDACTED: &str = "***REDACTED***";

static INLINE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b(Bearer|Basic)\s+[A-Za-z0-9._~+/=-]{8,}").expect("redaction regex"),
            "$1 ***REDACTED***",
        ),
        (
            Regex::new(r#""(access_token|refresh_token|client_secret)"\s*:\s*"[^"]*""#)
                .expect("redaction regex"),
            r#""$1":"***REDACTED***""#,
        ),
        (
            Regex::new(r"\b(access_token|client_secret|token)=([^&\s]+)").expect("redaction regex"),
            "$1=***REDACTED***",
        ),
    ]
});

/// Masks bearer/basic credentials, token fields and any of the given literal secrets.
pub fn redact_text(text: &str, secrets: &[&str]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        // Very short values would mask unrelated text.
        if secret.len() >= 4 {
            out = out.replace(secret, REDACTED);
        }
    }
    for (pattern, replacement) in INLINE_PATTERNS.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::redact_text;

    #[test]
    fn masks_authorization_values() {
        let out = redact_text("Authorization: Bearer abcdef123456789", &[]);
        assert_eq!(out, "Authorization: Bearer ***REDACTED***");
    }

    #[test]
    fn masks_token_fields_in_json_bodies() {
        let out = redact_text(r#"{"access_token": "xyz", "scope": "api"}"#, &[]);
        assert!(out.contains(r#""access_token":"***REDACTED***""#));
        assert!(out.contains("scope"));
    }

    #[test]
    fn masks_literal_secrets() {
        let out = redact_text("invalid client s3cr3t-value", &["s3cr3t-value"]);
        assert_eq!(out, "invalid client ***REDACTED***");
    }
}
