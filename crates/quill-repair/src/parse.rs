//! Strict-then-repair parsing of partially streamed JSON text
//!
//! The entry point is [`parse`]. Strict parsing is always attempted first;
//! only on failure does the bounded repair pass run, and only ever against a
//! mutable copy. The original text is what progress estimation and key
//! extraction see, so a repair that strips a trailing fragment cannot make
//! the reported progress jump around.

use serde::Serialize;
use serde_json::Value;

/// Upper bound on key/literal repair iterations per parse attempt.
const MAX_REPAIR_PASSES: usize = 3;

/// Most keys a single outcome reports, deduplicated in first-seen order.
const MAX_REPORTED_KEYS: usize = 10;

/// Result of one parse attempt over an in-flight text buffer.
///
/// Invariants:
/// - `success == false` implies `parsed.is_none()`
/// - `is_complete == true` implies `success && progress == 100`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome {
    /// The parsed value, present whenever strict or repaired parsing worked.
    pub parsed: Option<Value>,
    /// Whether any parse (strict or repaired) produced a value.
    pub success: bool,
    /// Top-level keys discovered so far, first-seen order, capped at 10.
    pub available_keys: Vec<String>,
    /// True only when the original text parsed strictly, unrepaired.
    pub is_complete: bool,
    /// Heuristic completion estimate, 0..=100. Pinned to 100 when complete.
    pub progress: u8,
}

impl ParseOutcome {
    fn incomplete_failure(text: &str) -> Self {
        Self {
            parsed: None,
            success: false,
            available_keys: extract_top_keys(text),
            is_complete: false,
            progress: estimate_progress(text),
        }
    }
}

/// Parses `text`, repairing a truncated tail if strict parsing fails.
///
/// Never panics and never returns an error: malformed input degrades to a
/// `success: false` outcome carrying whatever keys and progress could still
/// be estimated from the raw text.
#[must_use]
pub fn parse(text: &str) -> ParseOutcome {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        let available_keys = top_level_keys(&value);
        return ParseOutcome {
            parsed: Some(value),
            success: true,
            available_keys,
            is_complete: true,
            progress: 100,
        };
    }

    let repaired = repair(text);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            let available_keys = top_level_keys(&value);
            ParseOutcome {
                parsed: Some(value),
                success: true,
                available_keys,
                is_complete: false,
                progress: estimate_progress(text),
            }
        }
        Err(err) => {
            tracing::debug!("repair did not yield parseable text: {err}");
            ParseOutcome::incomplete_failure(text)
        }
    }
}

/// Heuristic 0..=100 completion estimate for a partially streamed document.
///
/// Bracket closure ratio outside string literals weighs 80 points, buffer
/// length (saturating at 2000 bytes) the remaining 20. This is a display
/// hint, not an exact completion fraction; it is capped at 99 so only a
/// strict parse ever reports 100.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn estimate_progress(text: &str) -> u8 {
    let mut opens: u32 = 0;
    let mut closes: u32 = 0;
    let mut in_string = false;
    let mut escape = false;
    for c in text.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => opens += 1,
            '}' | ']' => closes += 1,
            _ => {}
        }
    }
    if opens == 0 {
        return 0;
    }
    let ratio = f64::from(closes) / f64::from(opens);
    let length_part = (text.len() as f64 / 2000.0).min(1.0);
    let score = (ratio * 80.0 + length_part * 20.0).round();
    score.min(99.0) as u8
}

/// Scans raw (possibly unparseable) text for `"key":` patterns.
///
/// Deliberately not scoped to the top level: this is a best-effort signal
/// for progress display, deduplicated in first-seen order and capped at 10.
#[must_use]
pub fn extract_top_keys(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() && keys.len() < MAX_REPORTED_KEYS {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }
        let Some((key, end)) = read_string_at(text, i) else {
            break;
        };
        let mut j = end;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j < bytes.len() && bytes[j] == b':' && !keys.iter().any(|k| k == &key) {
            keys.push(key);
        }
        i = end;
    }
    keys
}

/// Reads the quoted string starting at byte `start` (which must be `"`).
/// Returns the unescaped-ish content and the byte index just past the
/// closing quote, or `None` if the string never closes.
fn read_string_at(text: &str, start: usize) -> Option<(String, usize)> {
    let mut content = String::new();
    let mut escape = false;
    for (i, c) in text[start + 1..].char_indices() {
        if escape {
            escape = false;
            content.push(c);
            continue;
        }
        match c {
            '\\' => escape = true,
            '"' => return Some((content, start + 1 + i + 1)),
            _ => content.push(c),
        }
    }
    None
}

fn top_level_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().take(MAX_REPORTED_KEYS).cloned().collect(),
        _ => Vec::new(),
    }
}

// ── Repair pass ──

/// State of a full string-literal scan over a buffer.
struct StringScan {
    /// Buffer ends inside an unterminated string literal.
    in_string: bool,
    /// Buffer ends on the backslash of an unfinished escape sequence.
    escape: bool,
    /// Byte index of the opening quote of the unterminated string.
    open_index: usize,
}

fn scan_strings(text: &str) -> StringScan {
    let mut scan = StringScan {
        in_string: false,
        escape: false,
        open_index: 0,
    };
    for (i, c) in text.char_indices() {
        if scan.in_string {
            if scan.escape {
                scan.escape = false;
            } else if c == '\\' {
                scan.escape = true;
            } else if c == '"' {
                scan.in_string = false;
            }
        } else if c == '"' {
            scan.in_string = true;
            scan.escape = false;
            scan.open_index = i;
        }
    }
    scan
}

fn repair(text: &str) -> String {
    let mut buf = text.to_string();
    for _ in 0..MAX_REPAIR_PASSES {
        let stripped = strip_dangling_fragment(&mut buf);
        let normalized = normalize_truncated_literal(&mut buf);
        if !stripped && !normalized {
            break;
        }
    }
    close_unterminated_string(&mut buf);
    strip_trailing_comma(&mut buf);
    balance_brackets(&mut buf);
    buf
}

/// Strips one trailing incomplete key/value fragment: `,"key":` with no
/// value, `,"key"` with no colon, or `,"partial` with no closing quote.
fn strip_dangling_fragment(buf: &mut String) -> bool {
    buf.truncate(buf.trim_end().len());
    let Some(last) = buf.chars().last() else {
        return false;
    };
    let scan = scan_strings(buf);

    if last == ':' && !scan.in_string {
        let before_colon = buf[..buf.len() - 1].trim_end().to_string();
        if let Some(open) = closing_string_start(&before_colon) {
            return strip_from_leading_comma(buf, &before_colon, open);
        }
        return false;
    }
    if last == '"' && !scan.in_string {
        if let Some(open) = closing_string_start(buf) {
            let owned = buf.clone();
            return strip_from_leading_comma(buf, &owned, open);
        }
        return false;
    }
    if scan.in_string {
        let owned = buf.clone();
        return strip_from_leading_comma(buf, &owned, scan.open_index);
    }
    false
}

/// If the text before `open` (a quote's byte index within `context`) ends
/// with a comma, truncates `buf` to just before that comma.
fn strip_from_leading_comma(buf: &mut String, context: &str, open: usize) -> bool {
    let before = context[..open].trim_end();
    if before.ends_with(',') {
        buf.truncate(before.len() - 1);
        return true;
    }
    false
}

/// For text ending in an unescaped `"`, returns the byte index of the
/// matching opening quote.
fn closing_string_start(text: &str) -> Option<usize> {
    if !text.ends_with('"') {
        return None;
    }
    let prefix = &text[..text.len() - 1];
    let scan = scan_strings(prefix);
    (scan.in_string && !scan.escape).then_some(scan.open_index)
}

/// Rewrites a trailing truncated `true`/`false`/`null` to `null`.
fn normalize_truncated_literal(buf: &mut String) -> bool {
    buf.truncate(buf.trim_end().len());
    if scan_strings(buf).in_string {
        return false;
    }
    let token_start = buf
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphabetic())
        .last()
        .map(|(i, _)| i);
    let Some(start) = token_start else {
        return false;
    };
    let token = &buf[start..];
    let truncated = ["true", "false", "null"]
        .iter()
        .any(|lit| lit.starts_with(token) && token.len() < lit.len());
    if truncated {
        buf.truncate(start);
        buf.push_str("null");
        return true;
    }
    false
}

fn close_unterminated_string(buf: &mut String) {
    let scan = scan_strings(buf);
    if scan.in_string {
        if scan.escape {
            buf.pop();
        }
        buf.push('"');
    }
}

fn strip_trailing_comma(buf: &mut String) {
    buf.truncate(buf.trim_end().len());
    if buf.ends_with(',') {
        buf.pop();
    }
}

/// Appends the closing brackets still owed at the end of the buffer.
fn balance_brackets(buf: &mut String) {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    for c in buf.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    if !stack.is_empty() {
        strip_trailing_comma(buf);
        while let Some(close) = stack.pop() {
            buf.push(close);
        }
    }
}
