// Shared text helpers
//
// Quoting, case conversion, integer-aware ordering and dotted-quad
// arithmetic used across completion, validation, formatting and
// running-config synthesis.

use std::cmp::Ordering;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use strum::{Display, EnumString};

/// Compile a built-in pattern. The patterns are literals, so a failure is a
/// programming error caught by the unit tests.
pub(crate) fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid built-in pattern {re}: {e}"))
}

static DPID_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(([A-Fa-f\d]){2}:?){7}[A-Fa-f\d]{2}$"));
static SEPARATORS_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"[>;|]"));
static TAIL_INT_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(.*[^0-9])(\d+)$"));

// ── Values ───────────────────────────────────────────────────────────

/// Render a JSON value the way the shell prints it: strings bare, `null`
/// empty, booleans capitalized.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        other => other.to_string(),
    }
}

/// Field of a row as text, empty when absent.
pub fn field_text(row: &serde_json::Map<String, Value>, field: &str) -> String {
    row.get(field).map(value_text).unwrap_or_default()
}

/// Loose equality between a stored value and a declared default: numbers
/// stored as strings and booleans stored as `"True"` compare equal.
pub fn values_equal(value: &Value, default: &Value) -> bool {
    if value == default {
        return true;
    }
    match (value, default) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.trim() == n.to_string()
        }
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => {
            s.eq_ignore_ascii_case(if *b { "true" } else { "false" })
        }
        _ => false,
    }
}

// ── Quoting ──────────────────────────────────────────────────────────

/// Quote a value so the command tokenizer reads it back as one word.
pub fn quote_string(value: &str) -> String {
    if value.contains('\'') {
        if value.contains('"') {
            let mut escaped = String::with_capacity(value.len() + 4);
            for c in value.chars() {
                if c == '"' {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            return escaped;
        }
        return format!("\"{value}\"");
    }
    if value.contains('"') || value.chars().any(char::is_whitespace) || SEPARATORS_RE.is_match(value)
    {
        return format!("'{value}'");
    }
    value.to_owned()
}

/// Append `delim` to every entry.
pub fn add_delim<I, S>(items: I, delim: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| format!("{}{delim}", s.as_ref()))
        .collect()
}

// ── Case ─────────────────────────────────────────────────────────────

/// Case normalization declared on a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Case {
    Lower,
    Upper,
}

pub fn convert_case(case: Option<Case>, value: &str) -> String {
    match case {
        Some(Case::Lower) => value.to_lowercase(),
        Some(Case::Upper) => value.to_uppercase(),
        None => value.to_owned(),
    }
}

/// `switch-config` → `Switch config`, used in completion reasons.
pub fn pretty(text: &str) -> String {
    let spaced = text.replace('-', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ── Word choice ──────────────────────────────────────────────────────

/// The single choice `word` is a prefix of, or `word` itself when it is
/// an exact choice among several prefix matches.
pub fn full_word_from_choices<'a, S: AsRef<str>>(word: &str, choices: &'a [S]) -> Option<&'a str> {
    let mut matches = choices
        .iter()
        .map(AsRef::as_ref)
        .filter(|c| c.starts_with(word));
    let first = matches.next();
    if let (Some(only), None) = (first, matches.next()) {
        return Some(only);
    }
    choices.iter().map(AsRef::as_ref).find(|c| *c == word)
}

/// Stable de-duplication.
pub fn unique<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = indexmap::IndexSet::new();
    for item in items {
        seen.insert(item.into());
    }
    seen.into_iter().collect()
}

// ── Ordering ─────────────────────────────────────────────────────────

/// Sort key that puts integers before text and compares integers
/// numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TryInt<'a> {
    Int(i64),
    Text(&'a str),
}

pub fn try_int(text: &str) -> TryInt<'_> {
    text.trim()
        .parse::<i64>()
        .map_or(TryInt::Text(text), TryInt::Int)
}

/// Compare two `|`-joined keys component by component, integer-aware.
pub fn compare_compound_keys(a: &str, b: &str) -> Ordering {
    let left = a.split('|').map(try_int);
    let right = b.split('|').map(try_int);
    left.cmp(right)
}

fn ends_with_int_after_text(value: &str) -> bool {
    value.len() >= 2
        && value.ends_with(|c: char| c.is_ascii_digit())
        && !value.starts_with(|c: char| c.is_ascii_digit())
}

fn compare_digit_strings(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Order names so trailing numbers sort numerically: `Eth2` before `Eth10`.
pub fn trailing_integer_cmp(a: &str, b: &str) -> Ordering {
    if ends_with_int_after_text(a) && ends_with_int_after_text(b) {
        if let (Some(x), Some(y)) = (TAIL_INT_RE.captures(a), TAIL_INT_RE.captures(b)) {
            let (xp, xn) = (&x[1], &x[2]);
            let (yp, yn) = (&y[1], &y[2]);
            return xp.cmp(yp).then_with(|| compare_digit_strings(xn, yn));
        }
    }
    try_int(a).cmp(&try_int(b))
}

/// `trailing_integer_cmp` ignoring the completion delimiter.
pub fn completion_trailing_integer_cmp(a: &str, b: &str) -> Ordering {
    trailing_integer_cmp(a.strip_suffix(' ').unwrap_or(a), b.strip_suffix(' ').unwrap_or(b))
}

// ── Dotted quads ─────────────────────────────────────────────────────

pub fn is_power_of_two(n: u64) -> bool {
    n & n.wrapping_sub(1) == 0
}

pub fn inet_aton(ip: &str) -> Option<u32> {
    let mut value: u32 = 0;
    let mut count = 0;
    for octet in ip.split('.') {
        let byte: u8 = octet.parse().ok()?;
        value = (value << 8) | u32::from(byte);
        count += 1;
    }
    (count == 4).then_some(value)
}

pub fn inet_ntoa(n: u32) -> String {
    let [a, b, c, d] = n.to_be_bytes();
    format!("{a}.{b}.{c}.{d}")
}

/// Prefix length for an inverse (ACL-style) mask such as `0.0.0.255`;
/// zero when the mask is not of that shape.
pub fn mask_to_cidr(mask: u32) -> u32 {
    let wide = u64::from(mask) + 1;
    if !is_power_of_two(wide) {
        return 0;
    }
    32 - wide.trailing_zeros()
}

/// Byte-wise complement of a dotted-quad mask.
pub fn invert_netmask(value: &str) -> Option<String> {
    inet_aton(value).map(|n| inet_ntoa(!n))
}

/// Render an address with its inverse mask as `any`, `ip/len` or
/// `ip mask`, always with a trailing space.
pub fn ip_and_mask_ntoa(ip: &str, mask: &str) -> String {
    if ip == "0.0.0.0" && mask == "255.255.255.255" {
        return "any ".into();
    }
    match inet_aton(mask) {
        Some(n) if is_power_of_two(u64::from(n) + 1) => format!("{ip}/{} ", mask_to_cidr(n)),
        _ => format!("{ip} {mask} "),
    }
}

/// Like [`ip_and_mask_ntoa`], but a non-prefix mask is shown inverted.
pub fn ip_and_neg_mask(ip: &str, mask: &str) -> String {
    if ip == "0.0.0.0" && mask == "255.255.255.255" {
        return "any ".into();
    }
    let Some(n) = inet_aton(mask) else {
        return format!("{ip} {mask} ");
    };
    if is_power_of_two(u64::from(n) + 1) {
        let cidr = mask_to_cidr(n);
        if cidr > 0 {
            return format!("{ip}/{cidr} ");
        }
        return format!("{ip} ");
    }
    format!("{ip} {} ", inet_ntoa(!n))
}

pub fn is_dpid(value: &str) -> bool {
    DPID_RE.is_match(value)
}

// ── Interface names ──────────────────────────────────────────────────

/// Collapse names sharing a prefix into numeric ranges:
/// `Eth0 Eth1 Eth2 Eth4` → `Eth0-2 Eth4`.
pub fn interface_ranges<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut groups: IndexMap<String, Vec<u64>> = IndexMap::new();
    for name in names.iter().map(AsRef::as_ref).filter(|n| !n.is_empty()) {
        let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (prefix, number) = name.split_at(name.len() - digits);
        match number.parse::<u64>() {
            Ok(n) if digits > 0 => groups.entry(prefix.to_owned()).or_default().push(n),
            _ => {
                groups.entry(name.to_owned()).or_default();
            }
        }
    }

    let mut ranges = Vec::new();
    for (prefix, mut numbers) in groups {
        if numbers.is_empty() {
            ranges.push(prefix);
            continue;
        }
        numbers.sort_unstable();
        numbers.dedup();
        let mut low = numbers[0];
        let mut prev = low;
        for &next in numbers.iter().skip(1).chain(std::iter::once(&u64::MAX)) {
            if next > prev.saturating_add(1) {
                if prev == low {
                    ranges.push(format!("{prefix}{low}"));
                } else {
                    ranges.push(format!("{prefix}{low}-{prev}"));
                }
                low = next;
            }
            prev = next;
        }
    }
    ranges
}
