// ── Argument validators ──
//
// A validator takes the typedef attached to a command argument and the
// raw token, and either returns the canonical value or fails with
// `CoreError::ArgumentValidation` carrying the offending value. Purely
// syntactic checks are free functions; checks that consult the store or
// the alias tables are `Session` methods.

use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use indexmap::IndexMap;
use regex::Regex;
use sdnsh_api::{Row, VersionSelector};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::session::Session;
use crate::util::{full_word_from_choices, inet_aton, is_dpid, pattern};

static IP_ADDR_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(\d{1,3}\.){3}\d{1,3}$"));
static CIDR_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^((\d{1,3}\.){3}\d{1,3})/(\d{1,2})$"));
static HEX_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^0x[0-9a-fA-F]+$"));
static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[a-zA-Z0-9_-]+$"));
static MAC_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^(([A-Fa-f\d]){2}:?){5}[A-Fa-f\d]{2}$"));
static MAC_DOTTED_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^(([A-Fa-f\d]){4}\.?){2}[A-Fa-f\d]{4}$"));

const DURATION_SUFFIXES: [&str; 6] = ["weeks", "days", "hours", "mins", "secs", "ms"];

// ── Typedefs ─────────────────────────────────────────────────────────

/// One permitted length or value: an exact number or an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Exact(i64),
    Range([i64; 2]),
}

impl Bound {
    pub fn contains(self, n: i64) -> bool {
        match self {
            Self::Exact(x) => n == x,
            Self::Range([low, high]) => (low..=high).contains(&n),
        }
    }
}

/// A bound list as written in descriptions: `5`, `[1, 64]` or a list of
/// either. A two-element integer list is one range.
fn bounds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Bound>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Spec {
        One(Bound),
        Many(Vec<Bound>),
    }
    Ok(match Spec::deserialize(deserializer)? {
        Spec::One(bound) => vec![bound],
        Spec::Many(bounds) => bounds,
    })
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Spec {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Spec::deserialize(deserializer)? {
        Spec::One(s) => vec![s],
        Spec::Many(v) => v,
    })
}

/// Enum choices: typed word → stored value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnumValues {
    Map(IndexMap<String, String>),
    List(Vec<String>),
    One(String),
}

impl EnumValues {
    fn pairs(&self) -> Vec<(&str, &str)> {
        match self {
            Self::Map(map) => map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
            Self::List(list) => list.iter().map(|v| (v.as_str(), v.as_str())).collect(),
            Self::One(v) => vec![(v.as_str(), v.as_str())],
        }
    }
}

/// Restrictions attached to a command argument type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Typedef {
    pub name: String,
    /// The value must match at least one pattern.
    #[serde(deserialize_with = "one_or_many")]
    pub pattern: Vec<String>,
    #[serde(deserialize_with = "bounds")]
    pub length: Vec<Bound>,
    #[serde(deserialize_with = "bounds")]
    pub range: Vec<Bound>,
    pub values: Option<EnumValues>,
    /// Words rejected by identifier validation on top of the shell's.
    pub reserved: Vec<String>,
}

impl Typedef {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, re: &str) -> Self {
        self.pattern.push(re.to_owned());
        self
    }

    #[must_use]
    pub fn with_length(mut self, bound: Bound) -> Self {
        self.length.push(bound);
        self
    }

    #[must_use]
    pub fn with_range(mut self, bound: Bound) -> Self {
        self.range.push(bound);
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: EnumValues) -> Self {
        self.values = Some(values);
        self
    }
}

// ── Syntactic validators ─────────────────────────────────────────────

/// Pattern and length restrictions. Any one pattern and any one length
/// bound suffice.
pub fn validate_string(typedef: &Typedef, value: &str) -> Result<String, CoreError> {
    if !typedef.pattern.is_empty() {
        let mut matched = false;
        for re in &typedef.pattern {
            let re = Regex::new(re).map_err(|e| {
                CoreError::Description(format!("{}: bad pattern {re:?}: {e}", typedef.name))
            })?;
            if re.find(value).is_some_and(|m| m.start() == 0) {
                matched = true;
                break;
            }
        }
        if !matched {
            return Err(CoreError::invalid(value, "invalid string pattern"));
        }
    }
    if !typedef.length.is_empty() {
        let len = i64::try_from(value.chars().count()).unwrap_or(i64::MAX);
        if !typedef.length.iter().any(|b| b.contains(len)) {
            return Err(CoreError::invalid(value, "invalid string length"));
        }
    }
    Ok(value.to_owned())
}

fn validate_integer_range(value: &str, n: i64, ranges: &[Bound]) -> Result<(), CoreError> {
    if ranges.is_empty() || ranges.iter().any(|b| b.contains(n)) {
        return Ok(());
    }
    let message = match ranges.last() {
        Some(Bound::Range([low, high])) => {
            format!("value is outside specified range: ({low}-{high})")
        }
        Some(Bound::Exact(x)) => format!("value is outside specified range: ({x})"),
        None => "value is outside specified range".to_owned(),
    };
    Err(CoreError::invalid(value, message))
}

pub fn validate_integer(typedef: &Typedef, value: &str) -> Result<i64, CoreError> {
    let n = value
        .trim()
        .parse::<i64>()
        .map_err(|_| CoreError::invalid(value, "value is not an integer"))?;
    validate_integer_range(value, n, &typedef.range)?;
    Ok(n)
}

/// `0x`-prefixed hex or decimal. The token is returned as typed.
pub fn validate_hex_or_dec_integer(typedef: &Typedef, value: &str) -> Result<String, CoreError> {
    let n = if HEX_RE.is_match(value) {
        i64::from_str_radix(&value[2..], 16)
            .map_err(|_| CoreError::invalid(value, "value is not a hex integer"))?
    } else {
        value
            .parse::<i64>()
            .map_err(|_| CoreError::invalid(value, "value is not an integer"))?
    };
    validate_integer_range(value, n, &typedef.range)?;
    Ok(value.to_owned())
}

fn dotted_quad(value: &str) -> Option<u32> {
    if IP_ADDR_RE.is_match(value) {
        inet_aton(value)
    } else {
        None
    }
}

/// Leading one bits followed by zero bits, `0.0.0.0` through
/// `255.255.255.255`.
pub fn is_netmask(value: &str) -> bool {
    dotted_quad(value).is_some_and(|n| n.leading_ones() + n.trailing_zeros() == 32)
}

/// Leading zero bits followed by one bits, such as `0.0.0.255`. At least
/// one zero bit is required, so `255.255.255.255` is only a netmask.
pub fn is_inverse_netmask(value: &str) -> bool {
    dotted_quad(value).is_some_and(|n| n != u32::MAX && n.leading_zeros() + n.trailing_ones() == 32)
}

pub fn validate_netmask(value: &str) -> Result<String, CoreError> {
    if is_netmask(value) {
        Ok(value.to_owned())
    } else {
        Err(CoreError::invalid(value, "invalid netmask"))
    }
}

pub fn validate_inverse_netmask(value: &str) -> Result<String, CoreError> {
    if is_inverse_netmask(value) {
        Ok(value.to_owned())
    } else {
        Err(CoreError::invalid(value, "invalid netmask"))
    }
}

/// An interface address: a dotted quad that is neither kind of mask.
pub fn validate_ip_address_not_mask(value: &str) -> Result<String, CoreError> {
    if dotted_quad(value).is_none() {
        return Err(CoreError::invalid(value, "not an ip-address"));
    }
    if is_netmask(value) || is_inverse_netmask(value) {
        return Err(CoreError::invalid(value, "must not be a mask"));
    }
    Ok(value.to_owned())
}

/// `a.b.c.d/n` with `n` at most 32.
pub fn validate_cidr_range(value: &str) -> Result<String, CoreError> {
    let caps = CIDR_RE
        .captures(value)
        .ok_or_else(|| CoreError::invalid(value, "not cidr syntax: ip/n"))?;
    let bits: u32 = caps[3]
        .parse()
        .map_err(|_| CoreError::invalid(value, "not cidr syntax: ip/n"))?;
    if bits > 32 || inet_aton(&caps[1]).is_none() {
        return Err(CoreError::invalid(value, "cidr range above 32"));
    }
    Ok(value.to_owned())
}

/// Letters, digits, `_` and `-`, and not a reserved word.
pub fn validate_identifier(
    typedef: &Typedef,
    value: &str,
    reserved_words: &[String],
) -> Result<String, CoreError> {
    if !IDENTIFIER_RE.is_match(value) {
        return Err(CoreError::invalid(value, "Invalid characters in identifier"));
    }
    for reserved in [reserved_words, typedef.reserved.as_slice()] {
        if reserved.iter().any(|w| w == value) {
            return Err(CoreError::invalid(
                value,
                format!("reserved word \"{value}\" in \"{}\"", reserved.join(", ")),
            ));
        }
    }
    Ok(value.to_owned())
}

/// `now`, `current`, epoch milliseconds, or one of the date formats
/// [`parse_date`] accepts. Integers come back normalized.
pub fn validate_date(value: &str) -> Result<String, CoreError> {
    if value == "now" || value == "current" {
        return Ok(value.to_owned());
    }
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n.to_string());
    }
    if parse_date(value).is_some() {
        return Ok(value.to_owned());
    }
    Err(CoreError::invalid(value, "invalid date"))
}

/// A date in the first format that fits: `Y-m-dTH:M:S`, `Y-m-d H:M:S`
/// (either optionally with a UTC offset), `Y-m-d`, `m-d` (this year) or
/// `H:M` (today). Local time unless an offset is given.
pub fn parse_date(value: &str) -> Option<DateTime<Local>> {
    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Local));
        }
    }
    let naive = naive_date(value)?;
    Local.from_local_datetime(&naive).earliest()
}

fn naive_date(value: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    let today = Local::now().date_naive();
    let with_year = format!("{}-{value}", today.format("%Y"));
    if let Ok(date) = NaiveDate::parse_from_str(&with_year, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .ok()
        .map(|time| today.and_time(time))
}

/// A number followed by one of the duration units.
pub fn validate_duration(value: &str) -> Result<String, CoreError> {
    if DURATION_SUFFIXES.iter().any(|s| value.ends_with(s)) {
        Ok(value.to_owned())
    } else {
        Err(CoreError::invalid(value, "invalid duration"))
    }
}

/// One enum choice: the stored value and the word that selected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumChoice {
    pub value: String,
    pub word: String,
}

/// Result of matching a token against enum words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumMatch {
    /// A case-insensitive exact match, or the only prefix match.
    Unique(EnumChoice),
    /// Several words start with the token; the caller decides.
    Ambiguous(Vec<EnumChoice>),
}

pub fn validate_enum(typedef: &Typedef, value: &str) -> Result<EnumMatch, CoreError> {
    let values = typedef.values.as_ref().ok_or_else(|| {
        CoreError::Description(format!("{}: unspecified enum values", typedef.name))
    })?;
    let lower = value.to_lowercase();
    let mut prefix_matches = Vec::new();
    for (word, stored) in values.pairs() {
        let choice = || EnumChoice {
            value: stored.to_owned(),
            word: word.to_owned(),
        };
        let lower_word = word.to_lowercase();
        if lower_word == lower {
            return Ok(EnumMatch::Unique(choice()));
        }
        if lower_word.starts_with(&lower) {
            prefix_matches.push(choice());
        }
    }
    match prefix_matches.len() {
        0 => Err(CoreError::ArgumentValidation {
            value: value.to_owned(),
            message: "unexpected value for enum".to_owned(),
            expected: values.pairs().iter().map(|(w, _)| (*w).to_owned()).collect(),
        }),
        1 => Ok(EnumMatch::Unique(prefix_matches.remove(0))),
        _ => Ok(EnumMatch::Ambiguous(prefix_matches)),
    }
}

pub fn is_mac_address(value: &str) -> bool {
    MAC_RE.is_match(value) || MAC_DOTTED_RE.is_match(value)
}

/// Colon or dot-quad (`0123.4567.89ab`) MAC. The token is returned as
/// typed; [`normalize_mac_address`] produces the colon form.
pub fn validate_mac_address(value: &str) -> Result<String, CoreError> {
    if is_mac_address(value) {
        Ok(value.to_owned())
    } else {
        Err(CoreError::invalid(value, "mac address"))
    }
}

/// Colon-separated lower-case form of a MAC in either accepted syntax.
pub fn normalize_mac_address(value: &str) -> Option<String> {
    if !is_mac_address(value) {
        return None;
    }
    let digits: Vec<char> = value
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let pairs: Vec<String> = digits.chunks(2).map(|pair| pair.iter().collect()).collect();
    Some(pairs.join(":"))
}

pub fn validate_dpid(value: &str) -> Result<String, CoreError> {
    if is_dpid(value) {
        Ok(value.to_owned())
    } else {
        Err(CoreError::invalid(value, "switch dpid"))
    }
}

// ── Store-backed validators ──────────────────────────────────────────

impl Session {
    /// [`validate_identifier`] with this shell's reserved words.
    pub fn validate_identifier(&self, typedef: &Typedef, value: &str) -> Result<String, CoreError> {
        validate_identifier(typedef, value, &self.config().reserved_words)
    }

    /// A dpid, or a switch alias naming a configured switch.
    pub async fn validate_switch_dpid(&self, value: &str) -> Result<String, CoreError> {
        if is_dpid(value) {
            return Ok(value.to_owned());
        }
        let dpid = self.convert_alias_to_object_key("switch-config", value).await;
        if !is_dpid(&dpid) {
            return Err(CoreError::invalid(value, "not switch alias nor dpid"));
        }
        match self.store().get_object_from_store("switch-config", &dpid).await {
            Ok(_) => Ok(value.to_owned()),
            Err(e) => {
                debug!("validate_switch_dpid: {dpid}: {e}");
                Err(CoreError::invalid(
                    value,
                    format!("switch \"{value}\" doesn't exist"),
                ))
            }
        }
    }

    /// The key (or an alias of it) names an existing `obj_type` row.
    pub async fn validate_existing_obj(&self, obj_type: &str, value: &str) -> Result<String, CoreError> {
        let key = self.convert_alias_to_object_key(obj_type, value).await;
        match self.store().get_object_from_store(obj_type, &key).await {
            Ok(_) => Ok(value.to_owned()),
            Err(e) => {
                debug!("validate_existing_obj: {obj_type} {key}: {e}");
                Err(CoreError::invalid(value, "doesn't exist"))
            }
        }
    }

    /// A MAC, or a host alias whose host is currently known.
    pub async fn validate_host(&self, value: &str) -> Result<String, CoreError> {
        if is_mac_address(value) {
            return Ok(value.to_owned());
        }
        let mi = self.registry();
        let pk = mi
            .pk("host-config")
            .ok_or_else(|| CoreError::Description("host-config: no primary key".into()))?;
        let key = self.convert_alias_to_object_key("host-config", value).await;
        let mut key_row = Row::new();
        key_row.insert(pk.to_owned(), Value::String(key));
        mi.split_compound_into_dict("host-config", pk, &mut key_row, true);

        let mac = key_row.get("mac").and_then(Value::as_str).unwrap_or_default();
        if !is_mac_address(mac) {
            return Err(CoreError::invalid(value, "not host alias nor mac address"));
        }
        match self.get_model_from_url("host", &key_row).await {
            Ok(rows) if !rows.is_empty() => Ok(value.to_owned()),
            _ => Err(CoreError::invalid(
                value,
                format!("host \"{value}\": doesn't exist"),
            )),
        }
    }

    /// A dotted quad, a switch alias or dpid, or a name the resolver knows.
    pub async fn validate_resolvable_ip_address(&self, value: &str) -> Result<String, CoreError> {
        if dotted_quad(value).is_some() {
            return Ok(value.to_owned());
        }
        let dpid = self.convert_alias_to_object_key("switch-config", value).await;
        if is_dpid(&dpid) {
            return Ok(value.to_owned());
        }
        let resolved = match tokio::net::lookup_host((value, 0)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(_) => false,
        };
        if resolved {
            Ok(value.to_owned())
        } else {
            Err(CoreError::invalid(value, "unresolvable name"))
        }
    }

    /// A copy source or destination: a `config://` name, one of the
    /// built-in configs, a URL, or an existing saved configuration.
    pub async fn validate_config(&self, value: &str) -> Result<String, CoreError> {
        if value.starts_with("config://") {
            return Ok(value.to_owned());
        }
        if full_word_from_choices(value, &["running-config", "upgrade-config", "trash"]).is_some() {
            return Ok(value.to_owned());
        }
        if ["http://", "ftp://", "tftp://", "file://"]
            .iter()
            .any(|scheme| value.starts_with(scheme))
        {
            return Ok(value.to_owned());
        }
        let saved = self
            .store()
            .get_user_data_table(Some(value), VersionSelector::Latest)
            .await
            .unwrap_or_default();
        if saved.is_empty() {
            Err(CoreError::invalid(
                value,
                "not a valid copy, must be (running-config, upgrade-config or must start \
                 with config://, http://, ftp://, or tftp://",
            ))
        } else {
            Ok(value.to_owned())
        }
    }
}
