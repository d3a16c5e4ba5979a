//! Log sanitization for clinical inputs.
//!
//! Redacts from formatted log lines:
//! - numeric series (ECG samples, feature vectors)
//! - clinical measurements written as `key=value` or `"key": value`
//! - categorical patient attributes and symptom lists
//! - identifiers (UUIDs, email addresses)
//!
//! The dispatcher never logs raw inputs; this is the fallback for anything a
//! `Debug` impl or an upstream error message lets through.
//!
//! # Performance
//!
//! `sanitize()` caps its input (see `STROKEGUARD_SANITIZE_MAX_BYTES`) so a
//! pathological line cannot stall the logging worker.

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static CLINICAL_PATTERNS: OnceLock<ClinicalPatterns> = OnceLock::new();

/// Default cap of bytes sanitized per line.
const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

struct ClinicalPatterns {
    set: RegexSet,
    rules: Vec<Rule>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }

    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("STROKEGUARD_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn get_patterns() -> &'static ClinicalPatterns {
    CLINICAL_PATTERNS.get_or_init(|| {
        // Order matters: series first so a bracketed signal is collapsed
        // before the key=value rules look at it.
        let rules: Vec<(&'static str, &'static str)> = vec![
            // Four or more numbers in a bracketed list
            (
                r"\[\s*-?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?(?:\s*,\s*-?(?:\d+\.?\d*|\.\d+|NaN|inf)(?:[eE][-+]?\d+)?){3,}\s*,?\s*\]",
                "[REDACTED-SERIES]",
            ),
            // Symptom lists
            (
                r#"(?i)\b(symptoms)\b"?\s*[:=]\s*\[[^\]]{0,1024}\]"#,
                "${1}=[REDACTED]",
            ),
            // Clinical measurements
            (
                r#"(?i)\b(age|bmi|avg_glucose_level|glucose|hypertension|heart_disease|symptom_duration_hours|duration_hours)\b"?\s*[:=]\s*-?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?"#,
                "${1}=[REDACTED]",
            ),
            // Categorical attributes
            (
                r#"(?i)\b(gender|ever_married|work_type|residence_type|smoking_status)\b"?\s*[:=]\s*"?[A-Za-z][A-Za-z _-]{0,31}"?"#,
                "${1}=[REDACTED]",
            ),
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
                "[REDACTED-UUID]",
            ),
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
        ];

        let set = RegexSet::new(rules.iter().map(|(p, _)| *p)).expect("Valid regex set");
        let rules = rules
            .into_iter()
            .map(|(pattern, replacement)| Rule {
                regex: Regex::new(pattern).expect("Valid regex"),
                replacement,
            })
            .collect();

        ClinicalPatterns { set, rules }
    })
}

/// Redact clinical values and identifiers from `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = get_patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    let matched: Vec<usize> = patterns.set.matches(prefix).into_iter().collect();
    for idx in matched {
        let rule = &patterns.rules[idx];
        result = rule.regex.replace_all(&result, rule.replacement).into_owned();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// `MakeWriter` wrapper that sanitizes each formatted log line before it
/// reaches the underlying sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

/// Line-buffering writer produced by [`SanitizingMakeWriter`].
pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
    max_bytes: usize,
}

impl<W> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self::with_limit(inner, max_sanitize_bytes())
    }

    fn with_limit(inner: W, max_bytes: usize) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            max_bytes,
        }
    }
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let mut sanitized =
                sanitize_with_limit(&String::from_utf8_lossy(&line), self.max_bytes);
            // Truncation drops the line's own newline.
            if !sanitized.ends_with('\n') {
                sanitized.push('\n');
            }
            self.inner.write_all(sanitized.as_bytes())?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A single line with no newline must not grow without bound.
        let hard_cap = self.max_bytes.saturating_mul(2);
        if self.buffer.len() > hard_cap {
            let sanitized =
                sanitize_with_limit(&String::from_utf8_lossy(&self.buffer), self.max_bytes);
            self.inner.write_all(sanitized.as_bytes())?;
            self.inner.write_all(b"\n")?;
            self.buffer.clear();
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let sanitized =
                sanitize_with_limit(&String::from_utf8_lossy(&self.buffer), self.max_bytes);
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
