//! Secret scrubbing for surfaced error text.
//!
//! Error messages that leave the orchestrator through events or logs pass
//! through [`redact_secrets`] first.  Two shapes are masked: `Bearer …`
//! authorization tokens, and long key-like runs (mixed alphanumeric strings
//! of the kind API keys are made of).  Plain string scanning, no regex.

/// Shortest run treated as a probable key.
const MIN_KEY_RUN: usize = 20;

/// Replacement marker.
const MASK: &str = "[REDACTED]";

/// Scrub probable secrets from a message.
///
/// # Example
///
/// ```rust
/// use agentflow::redact::redact_secrets;
///
/// let scrubbed = redact_secrets("401 from api, Bearer sk1234567890abcdefghij rejected");
/// assert!(!scrubbed.contains("sk1234567890abcdefghij"));
/// assert!(scrubbed.contains("[REDACTED]"));
/// ```
pub fn redact_secrets(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;

    // Pass 1: mask the token following any "Bearer " marker.
    while let Some(pos) = find_case_insensitive(rest, "bearer ") {
        let token_start = pos + "bearer ".len();
        out.push_str(&rest[..token_start]);

        let token_len = rest[token_start..]
            .find(char::is_whitespace)
            .unwrap_or(rest.len() - token_start);
        if token_len > 0 {
            out.push_str(MASK);
        }
        rest = &rest[token_start + token_len..];
    }
    out.push_str(rest);

    // Pass 2: mask long key-like runs.
    mask_key_runs(&out)
}

/// Byte-wise ASCII-case-insensitive find.  The needle is ASCII, so a match
/// position is always a char boundary in the haystack.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Replace runs of key characters that are long enough and mix letters with
/// digits.  Ordinary words and plain numbers survive.
fn mask_key_runs(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut run = String::new();

    let flush = |run: &mut String, out: &mut String| {
        if looks_like_key(run) {
            out.push_str(MASK);
        } else {
            out.push_str(run);
        }
        run.clear();
    };

    for c in message.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            run.push(c);
        } else {
            flush(&mut run, &mut out);
            out.push(c);
        }
    }
    flush(&mut run, &mut out);
    out
}

fn looks_like_key(run: &str) -> bool {
    run.len() >= MIN_KEY_RUN
        && run.chars().any(|c| c.is_ascii_digit())
        && run.chars().any(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_tokens_are_masked() {
        let scrubbed = redact_secrets("request denied: Bearer abc.def.ghi expired");
        assert_eq!(scrubbed, "request denied: Bearer [REDACTED] expired");
    }

    #[test]
    fn long_mixed_runs_are_masked() {
        let scrubbed = redact_secrets("key AIzaSyD4x9k2jv8Qw3n7Lm1pTz5 leaked");
        assert_eq!(scrubbed, "key [REDACTED] leaked");
    }

    #[test]
    fn prose_and_plain_numbers_survive() {
        let message = "connection to 192.168.0.1 timed out after 30000 ms (supercalifragilistic)";
        assert_eq!(redact_secrets(message), message);
    }

    #[test]
    fn hyphenated_api_keys_are_masked_as_one_run() {
        let scrubbed = redact_secrets("using key sk-proj-a1B2c3D4e5F6g7H8 now");
        assert_eq!(scrubbed, "using key [REDACTED] now");
    }
}
