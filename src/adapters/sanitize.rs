//! Redaction of biometric vectors and key material in log output.
//!
//! Log lines pass through [`SanitizingMakeWriter`], which replaces:
//! - Raw and normalized sample vectors
//! - E-mail addresses used as user ids
//! - Key material (hex and base64 blobs, `key=...` assignments, PEM blocks)
//!
//! Call sites should still avoid formatting samples or keys; the domain
//! types redact themselves in `Debug`. Input is capped at
//! `PRINTVAULT_SANITIZE_MAX_BYTES` bytes per call.

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

/// Compiled patterns for sensitive-data detection and sanitization.
static SENSITIVE_PATTERNS: OnceLock<Patterns> = OnceLock::new();

/// Bytes sanitized per call unless `PRINTVAULT_SANITIZE_MAX_BYTES` is set.
const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

/// A compiled pattern with its replacement text.
struct Pattern {
    regex: Regex,
    replacement: &'static str,
}

struct Patterns {
    fast_set: RegexSet,
    fast_patterns: Vec<Pattern>,
    pem_patterns: Vec<Pattern>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }

    // Ensure we don't panic on UTF-8 boundaries.
    let mut end = max_bytes.min(input.len());
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("PRINTVAULT_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

/// Initialize patterns (called once at startup).
fn get_patterns() -> &'static Patterns {
    SENSITIVE_PATTERNS.get_or_init(|| {
        let fast_rules: Vec<(&'static str, &'static str)> = vec![
            // Sample vectors: a decimal and at least two more numbers, each
            // after a comma, semicolon or whitespace. Timestamps do not qualify.
            (
                r"-?\d+\.\d+(?:(?:\s*[,;]\s*|\s+)-?\d+(?:\.\d+)?){2,}",
                "[REDACTED-VECTOR]",
            ),
            // Email patterns (bounded labels; case-insensitive)
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
            // `key=...` style assignments
            (
                r"(?i)\b(?:password|passwd|pwd|secret|secret[_-]?key|private[_-]?key|client[_-]?key|token|key)\b\s*[:=]\s*[A-Za-z0-9+/]{32,}={0,2}",
                "[REDACTED-SECRET]",
            ),
            (
                r"(?i)\b(?:password|passwd|pwd|secret|secret[_-]?key|private[_-]?key|client[_-]?key|token|key)\b\s*[:=]\s*[0-9a-fA-F]{16,}\b",
                "[REDACTED-SECRET]",
            ),
            // Serialized keys and ciphertexts
            (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]"),
            (r"[A-Za-z0-9+/]{64,}={0,2}", "[REDACTED-BLOB]"),
        ];

        // Kept out of the RegexSet: merged dot-all patterns compile too large.
        let pem_patterns: Vec<Pattern> = vec![
            Pattern {
                regex: Regex::new(
                    r"(?s)-----BEGIN [A-Z0-9 ]{0,40}(?:EC |RSA |OPENSSH )?PRIVATE KEY-----[\s\S]{0,8192}-----END [A-Z0-9 ]{0,40}(?:EC |RSA |OPENSSH )?PRIVATE KEY-----",
                )
                .expect("Valid regex"),
                replacement: "[REDACTED-PEM-PRIVATE-KEY]",
            },
            Pattern {
                regex: Regex::new(
                    r"(?s)-----BEGIN [A-Z0-9 ]{0,40}(?:EC |RSA |OPENSSH )?PUBLIC KEY-----[\s\S]{0,4096}-----END [A-Z0-9 ]{0,40}(?:EC |RSA |OPENSSH )?PUBLIC KEY-----",
                )
                .expect("Valid regex"),
                replacement: "[REDACTED-PEM-PUBLIC-KEY]",
            },
        ];

        let fast_set =
            RegexSet::new(fast_rules.iter().map(|(p, _)| *p)).expect("Valid regex set");
        let fast_patterns = fast_rules
            .into_iter()
            .map(|(pattern, replacement)| Pattern {
                regex: Regex::new(pattern).expect("Valid regex"),
                replacement,
            })
            .collect();

        Patterns {
            fast_set,
            fast_patterns,
            pem_patterns,
        }
    })
}

/// Sanitize a string by replacing sensitive patterns.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = get_patterns();

    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    // Fast path: single scan for "any match".
    if !patterns.fast_set.is_match(prefix)
        && !(prefix.contains("-----BEGIN ")
            && patterns.pem_patterns.iter().any(|p| p.regex.is_match(prefix)))
    {
        let mut out = prefix.to_string();
        if truncated {
            out.push_str(" [TRUNCATED]");
        }
        return out;
    }

    // Only apply patterns that matched the original prefix.
    let matched: Vec<usize> = patterns.fast_set.matches(prefix).into_iter().collect();
    let mut result = prefix.to_string();
    for idx in matched {
        let pattern = &patterns.fast_patterns[idx];
        result = pattern
            .regex
            .replace_all(&result, pattern.replacement)
            .to_string();
    }

    // Only attempt PEM patterns behind a cheap trigger.
    if result.contains("-----BEGIN ") {
        for pattern in &patterns.pem_patterns {
            if pattern.regex.is_match(&result) {
                result = pattern
                    .regex
                    .replace_all(&result, pattern.replacement)
                    .to_string();
            }
        }
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Check if a string contains anything the sanitizer would redact.
#[must_use]
pub fn contains_sensitive(input: &str) -> bool {
    let patterns = get_patterns();
    let (prefix, _truncated) = truncate_to_char_boundary(input, max_sanitize_bytes());
    if patterns.fast_set.is_match(prefix) {
        return true;
    }
    if prefix.contains("-----BEGIN ") {
        return patterns.pem_patterns.iter().any(|p| p.regex.is_match(prefix));
    }
    false
}

/// `MakeWriter` that sanitizes each formatted log line before it reaches
/// the inner sink.
#[derive(Debug)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<M> Clone for SanitizingMakeWriter<M>
where
    M: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }
}

impl<W> SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<u8>>();
            let line_str = String::from_utf8_lossy(&line);
            let sanitized = sanitize(&line_str);
            self.inner.write_all(sanitized.as_bytes())?;
        }
        Ok(())
    }
}

impl<W> std::io::Write for SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A line with no newline is flushed once it exceeds the cap.
        let hard_cap = max_sanitize_bytes().saturating_mul(2);
        if hard_cap > 0 && self.buffer.len() > hard_cap {
            let s = String::from_utf8_lossy(&self.buffer).to_string();
            let sanitized = sanitize(&s);
            self.inner.write_all(sanitized.as_bytes())?;
            self.inner.write_all(b"\n[TRUNCATED]\n")?;
            self.buffer.clear();
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;

        if !self.buffer.is_empty() {
            let s = String::from_utf8_lossy(&self.buffer);
            let sanitized = sanitize(&s);
            self.inner.write_all(sanitized.as_bytes())?;
            self.buffer.clear();
        }

        self.inner.flush()
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}
