// Per-field value formatters
//
// A formatter turns one cell into display text, given the whole row for
// context. Formatters that read an alias display cache say so through
// `alias_families`, which the registry records on each field when the
// format is registered.

use chrono::{DateTime, Local, TimeZone, Utc};
use sdnsh_api::Row;
use serde::Deserialize;
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use crate::alias::{AliasCache, AliasFamilies, AliasFamily};
use crate::util::{field_text, value_text};

/// Well-known flow-cookie application ids.
const COOKIE_APP_IDS: &[(u64, &str)] = &[
    (1, "lswitch"),
    (2, "FL:forw"),
    (3, "TUN:forw"),
    (4, "VTA:forw"),
    (10, "static"),
];

/// Reserved OpenFlow port numbers.
const OPENFLOW_PORTS: &[(i64, &str)] = &[
    (0xfff8, "input"),
    (0xfff9, "table"),
    (0xfffa, "normal"),
    (0xfffb, "flood"),
    (0xfffc, "all"),
    (0xfffd, "controller"),
    (0xfffe, "local"),
    (0xffff, "none"),
];

/// Row fields that may carry the switch owning a port number.
const SWITCH_KEYS: &[&str] = &["switch", "Switch", "dpid"];

/// Named cell formatter usable from a format descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Formatter {
    ReplaceSwitchWithAlias,
    ReplaceHostWithAlias,
    ReplaceControllerNodeWithAlias,
    /// `dpid (alias)`
    SwitchAndAlias,
    /// Space separated dpids, each replaced by its alias.
    SwitchList,
    /// `mac (alias)`, preferring the row's own `mac` field.
    HostAndAlias,
    /// `switch (alias)/port` for one attachment point, a count for several.
    HostAttachmentPoint,
    /// Every attachment point as `switch/port`.
    AllHostAttachmentPoints,
    /// The most interesting address plus a count of the rest.
    HostIpAddresses,
    /// Port number with reserved names and the live port name.
    DecodeOpenflowPort,
    DecodeFlowCookie,
    EnableDisable,
    /// Epoch milliseconds as local time.
    Timestamp,
    /// Epoch milliseconds as elapsed time.
    TimeSince,
    JoinList,
    /// First name server and a count of the rest.
    DomainNameServers,
    /// 64-bit integer as a colon separated dpid.
    LongToDpid,
    Hex,
}

/// Context a formatter runs in.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    pub aliases: &'a AliasCache,
    /// Row field naming the switch for port decoding.
    pub switch_key: Option<&'a str>,
    pub now: DateTime<Utc>,
}

impl Formatter {
    /// Alias caches this formatter reads.
    pub fn alias_families(self) -> AliasFamilies {
        match self {
            Self::ReplaceSwitchWithAlias | Self::SwitchAndAlias | Self::SwitchList => {
                AliasFamilies::from([AliasFamily::Switch])
            }
            Self::ReplaceHostWithAlias | Self::HostAndAlias => {
                AliasFamilies::from([AliasFamily::Host])
            }
            Self::ReplaceControllerNodeWithAlias => AliasFamilies::from([AliasFamily::ControllerNode]),
            // port names are keyed by switch
            Self::DecodeOpenflowPort | Self::HostAttachmentPoint | Self::AllHostAttachmentPoints => {
                AliasFamilies::from([AliasFamily::Switch, AliasFamily::Port])
            }
            Self::DecodeFlowCookie => AliasFamilies::from([AliasFamily::Flow]),
            Self::EnableDisable
            | Self::Timestamp
            | Self::TimeSince
            | Self::JoinList
            | Self::DomainNameServers
            | Self::LongToDpid
            | Self::Hex
            | Self::HostIpAddresses => AliasFamilies::new(),
        }
    }

    pub fn render(self, value: &Value, row: &Row, ctx: &FormatContext<'_>) -> String {
        match self {
            Self::ReplaceSwitchWithAlias => replace_with_alias(ctx.aliases, AliasFamily::Switch, value),
            Self::ReplaceHostWithAlias => replace_with_alias(ctx.aliases, AliasFamily::Host, value),
            Self::ReplaceControllerNodeWithAlias => {
                replace_with_alias(ctx.aliases, AliasFamily::ControllerNode, value)
            }
            Self::SwitchAndAlias => switch_and_alias(ctx.aliases, &value_text(value)),
            Self::SwitchList => list_items(value)
                .iter()
                .map(|dpid| ctx.aliases.lookup(AliasFamily::Switch, dpid).unwrap_or_else(|| dpid.clone()))
                .collect::<Vec<_>>()
                .join(" "),
            Self::HostAndAlias => host_and_alias(ctx.aliases, value, row),
            Self::HostAttachmentPoint => match value {
                Value::Null => "Inactive".into(),
                Value::Array(points) => match points.as_slice() {
                    [] => String::new(),
                    [point] => attachment_point(ctx, point, true),
                    many => format!("multiple ({})", many.len()),
                },
                other => value_text(other),
            },
            Self::AllHostAttachmentPoints => match value {
                Value::Array(points) => points
                    .iter()
                    .map(|point| attachment_point(ctx, point, false))
                    .collect::<Vec<_>>()
                    .join(" "),
                other => value_text(other),
            },
            Self::HostIpAddresses => host_ip_addresses(value),
            Self::DecodeOpenflowPort => decode_openflow_port(ctx, value, row),
            Self::DecodeFlowCookie => decode_flow_cookie(ctx.aliases, value),
            Self::EnableDisable => match value {
                Value::Bool(true) => "enabled".into(),
                Value::Bool(false) => "disabled".into(),
                other => value_text(other),
            },
            Self::Timestamp => integer(value)
                .and_then(local_timestamp)
                .unwrap_or_else(|| value_text(value)),
            Self::TimeSince => integer(value)
                .map(|ms| time_since(ms, ctx.now))
                .unwrap_or_default(),
            Self::JoinList => list_items(value).join(", "),
            Self::DomainNameServers => {
                let servers = list_items(value);
                match servers.as_slice() {
                    [] => "None".into(),
                    [one] => one.clone(),
                    [first, rest @ ..] => format!("{first} +({})", rest.len()),
                }
            }
            Self::LongToDpid => integer(value).map_or_else(|| value_text(value), long_to_dpid),
            Self::Hex => match integer(value) {
                Some(0) | None => String::new(),
                Some(n) => format!("{n:#x}"),
            },
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_u64()
                .map(|u| i64::from_ne_bytes(u.to_ne_bytes()))
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn list_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_text).collect(),
        Value::Null => Vec::new(),
        other => vec![value_text(other)],
    }
}

fn replace_with_alias(aliases: &AliasCache, family: AliasFamily, value: &Value) -> String {
    let key = value_text(value);
    aliases.lookup(family, &key).unwrap_or(key)
}

fn switch_and_alias(aliases: &AliasCache, dpid: &str) -> String {
    match aliases.lookup(AliasFamily::Switch, dpid) {
        Some(alias) if alias != dpid => format!("{dpid} ({alias})"),
        _ => dpid.to_owned(),
    }
}

fn host_and_alias(aliases: &AliasCache, value: &Value, row: &Row) -> String {
    let mut key = value_text(value);
    // an int64-encoded host carries two extra leading octets
    if key.len() == 23 {
        key = key.split_off(6);
    }
    let suffix = match aliases.lookup(AliasFamily::Host, &key) {
        Some(name) if name != key => format!(" ({name})"),
        _ => String::new(),
    };
    match row.get("mac").map(value_text).filter(|mac| !mac.is_empty()) {
        Some(mac) => mac + &suffix,
        None => key + &suffix,
    }
}

fn attachment_point(ctx: &FormatContext<'_>, point: &Value, with_dpid: bool) -> String {
    let Some(point) = point.as_object() else {
        return value_text(point);
    };
    let switch = field_text(point, "switch");
    let port_ctx = FormatContext {
        switch_key: Some("switch"),
        ..*ctx
    };
    let port = point
        .get("ingress-port")
        .or_else(|| point.get("port"))
        .map(|port| decode_openflow_port(&port_ctx, port, point))
        .unwrap_or_default();
    let switch = if with_dpid {
        switch_and_alias(ctx.aliases, &switch)
    } else {
        ctx.aliases.lookup(AliasFamily::Switch, &switch).unwrap_or(switch)
    };
    format!("{switch}/{port}")
}

fn host_ip_addresses(value: &Value) -> String {
    let Value::Array(entries) = value else {
        return if value.is_null() { "Unknown".into() } else { value_text(value) };
    };
    let ip = |entry: &Value| {
        entry
            .as_object()
            .map_or_else(|| value_text(entry), |e| field_text(e, "ip-address"))
    };
    match entries.as_slice() {
        [] => String::new(),
        [one] => ip(one),
        many => {
            let (boring, interesting): (Vec<_>, Vec<_>) = many
                .iter()
                .map(ip)
                .partition(|addr| addr == "0.0.0.0" || addr.starts_with("169.254."));
            if let [only] = interesting.as_slice() {
                return format!("{only}+({})", boring.len());
            }
            let latest = many
                .iter()
                .max_by_key(|e| e.get("last-seen").and_then(Value::as_i64).unwrap_or_default())
                .map(ip)
                .unwrap_or_default();
            format!("{latest}+({})", many.len() - 1)
        }
    }
}

fn decode_openflow_port(ctx: &FormatContext<'_>, value: &Value, row: &Row) -> String {
    let text = value_text(value);
    if text.is_empty() || text == "*" {
        return "*".into();
    }
    if let Some(name) = text.strip_prefix('+') {
        return name.to_owned();
    }
    let Some(port) = integer(value) else {
        return text;
    };
    let port = port.rem_euclid(0x1_0000);
    if port >= 0xff00 {
        return match OPENFLOW_PORTS.iter().find(|(n, _)| *n == port) {
            Some((_, name)) => format!("{port} ({name})"),
            None => port.to_string(),
        };
    }
    let switch = match ctx.switch_key {
        Some(key) => field_text(row, key),
        None => SWITCH_KEYS
            .iter()
            .map(|key| field_text(row, key))
            .find(|s| !s.is_empty())
            .unwrap_or_default(),
    };
    match ctx.aliases.lookup(AliasFamily::Port, &format!("{switch}.{port}")) {
        Some(name) if name != port.to_string() => format!("{port} ({name})"),
        _ => port.to_string(),
    }
}

/// 12 bits application id, 20 bits flow hash, 32 bits user cookie.
fn decode_flow_cookie(aliases: &AliasCache, value: &Value) -> String {
    let Some(cookie) = integer(value).map(|n| u64::from_ne_bytes(n.to_ne_bytes())) else {
        return value_text(value);
    };
    let app_id = (cookie >> 52) & 0xfff;
    let flow_hash = (cookie >> 32) & 0xf_ffff;
    let user_cookie = cookie & 0xffff_ffff;

    let Some((_, app)) = COOKIE_APP_IDS.iter().find(|(id, _)| *id == app_id) else {
        return format!("unknown {app_id}, cookie {cookie}");
    };
    let mut decoded = (*app).to_owned();
    if *app == "static" {
        match aliases.lookup(AliasFamily::Flow, &flow_hash.to_string()) {
            Some(name) => decoded.push_str(&format!("-{name}")),
            None => decoded.push_str(&format!("-flow_hash: {flow_hash}")),
        }
    } else if flow_hash != 0 {
        decoded.push_str(&format!("-flow_hash: {flow_hash}"));
    }
    if user_cookie != 0 {
        decoded.push_str(&format!(", cookie: {user_cookie:#x}"));
    }
    decoded
}

fn long_to_dpid(n: i64) -> String {
    n.to_be_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn local_timestamp(ms: i64) -> Option<String> {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S %Z").to_string())
}

/// Elapsed time in its two most significant units, e.g. `1 hour, 5 minutes`.
pub fn time_since(ms: i64, now: DateTime<Utc>) -> String {
    const UNITS: &[(i64, &str)] = &[
        (365 * 24 * 3600, "year"),
        (30 * 24 * 3600, "month"),
        (7 * 24 * 3600, "week"),
        (24 * 3600, "day"),
        (3600, "hour"),
        (60, "minute"),
    ];
    let seconds = (now.timestamp_millis() - ms) / 1000;
    if seconds < 60 {
        return "0 minutes".into();
    }
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };
    for (i, (size, unit)) in UNITS.iter().enumerate() {
        let count = seconds / size;
        if count == 0 {
            continue;
        }
        let mut text = plural(count, unit);
        if let Some((next_size, next_unit)) = UNITS.get(i + 1) {
            let rest = (seconds - count * size) / next_size;
            if rest > 0 {
                text.push_str(", ");
                text.push_str(&plural(rest, next_unit));
            }
        }
        return text;
    }
    "0 minutes".into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn cache() -> AliasCache {
        let cache = AliasCache::default();
        cache.replace(
            AliasFamily::Switch,
            HashMap::from([("00:00:00:00:00:00:00:01".to_owned(), "core1".to_owned())]),
        );
        cache.replace(
            AliasFamily::Port,
            HashMap::from([("00:00:00:00:00:00:00:01.3".to_owned(), "Eth3".to_owned())]),
        );
        cache.replace(
            AliasFamily::Host,
            HashMap::from([("default|10|00:00:00:00:00:01".to_owned(), "web".to_owned())]),
        );
        cache.replace(
            AliasFamily::Flow,
            HashMap::from([(crate::alias::flow_hash("f1").to_string(), "f1".to_owned())]),
        );
        cache
    }

    fn ctx(aliases: &AliasCache) -> FormatContext<'_> {
        FormatContext {
            aliases,
            switch_key: None,
            now: Utc.timestamp_millis_opt(1_360_000_000_000).unwrap(),
        }
    }

    fn render(f: Formatter, value: Value, row: &Value) -> String {
        let aliases = cache();
        f.render(&value, row.as_object().unwrap(), &ctx(&aliases))
    }

    #[test]
    fn switch_aliases() {
        let row = json!({});
        assert_eq!(
            render(Formatter::SwitchAndAlias, json!("00:00:00:00:00:00:00:01"), &row),
            "00:00:00:00:00:00:00:01 (core1)"
        );
        assert_eq!(
            render(Formatter::SwitchAndAlias, json!("00:00:00:00:00:00:00:02"), &row),
            "00:00:00:00:00:00:00:02"
        );
        assert_eq!(
            render(Formatter::ReplaceSwitchWithAlias, json!("00:00:00:00:00:00:00:01"), &row),
            "core1"
        );
    }

    #[test]
    fn host_prefers_row_mac() {
        let row = json!({"mac": "00:00:00:00:00:01"});
        assert_eq!(
            render(Formatter::HostAndAlias, json!("default|10|00:00:00:00:00:01"), &row),
            "00:00:00:00:00:01 (web)"
        );
    }

    #[test]
    fn openflow_ports() {
        let row = json!({"switch": "00:00:00:00:00:00:00:01"});
        assert_eq!(render(Formatter::DecodeOpenflowPort, json!(3), &row), "3 (Eth3)");
        assert_eq!(render(Formatter::DecodeOpenflowPort, json!(4), &row), "4");
        assert_eq!(render(Formatter::DecodeOpenflowPort, json!(-3), &row), "65533 (controller)");
        assert_eq!(render(Formatter::DecodeOpenflowPort, json!(""), &row), "*");
        assert_eq!(render(Formatter::DecodeOpenflowPort, json!("+Eth9"), &row), "Eth9");
    }

    #[test]
    fn flow_cookies() {
        let row = json!({});
        let hash = u64::from(crate::alias::flow_hash("f1"));
        let cookie = (10_u64 << 52) | (hash << 32);
        assert_eq!(
            render(Formatter::DecodeFlowCookie, json!(cookie), &row),
            "static-f1"
        );
        assert_eq!(
            render(Formatter::DecodeFlowCookie, json!((2_u64 << 52) | 5), &row),
            "FL:forw, cookie: 0x5"
        );
        assert_eq!(
            render(Formatter::DecodeFlowCookie, json!(7_u64 << 52), &row),
            format!("unknown 7, cookie {}", 7_u64 << 52)
        );
    }

    #[test]
    fn attachment_points() {
        let row = json!({});
        let one = json!([{"switch": "00:00:00:00:00:00:00:01", "ingress-port": 3}]);
        assert_eq!(
            render(Formatter::HostAttachmentPoint, one.clone(), &row),
            "00:00:00:00:00:00:00:01 (core1)/3 (Eth3)"
        );
        assert_eq!(render(Formatter::AllHostAttachmentPoints, one, &row), "core1/3 (Eth3)");
        assert_eq!(render(Formatter::HostAttachmentPoint, Value::Null, &row), "Inactive");
        let two = json!([{"switch": "a", "ingress-port": 1}, {"switch": "b", "ingress-port": 2}]);
        assert_eq!(render(Formatter::HostAttachmentPoint, two, &row), "multiple (2)");
    }

    #[test]
    fn ip_addresses_prefer_routable() {
        let row = json!({});
        let ips = json!([
            {"ip-address": "0.0.0.0", "last-seen": 9},
            {"ip-address": "10.0.0.5", "last-seen": 1},
        ]);
        assert_eq!(render(Formatter::HostIpAddresses, ips, &row), "10.0.0.5+(1)");
        let ips = json!([
            {"ip-address": "10.0.0.5", "last-seen": 1},
            {"ip-address": "10.0.0.6", "last-seen": 9},
        ]);
        assert_eq!(render(Formatter::HostIpAddresses, ips, &row), "10.0.0.6+(1)");
    }

    #[test]
    fn plain_formatters() {
        let row = json!({});
        assert_eq!(render(Formatter::EnableDisable, json!(true), &row), "enabled");
        assert_eq!(render(Formatter::JoinList, json!(["a", "b"]), &row), "a, b");
        assert_eq!(
            render(Formatter::DomainNameServers, json!(["1.1.1.1", "8.8.8.8", "9.9.9.9"]), &row),
            "1.1.1.1 +(2)"
        );
        assert_eq!(render(Formatter::DomainNameServers, json!([]), &row), "None");
        assert_eq!(render(Formatter::LongToDpid, json!(1), &row), "00:00:00:00:00:00:00:01");
        assert_eq!(render(Formatter::Hex, json!(255), &row), "0xff");
        assert_eq!(render(Formatter::Hex, json!(0), &row), "");
    }

    #[test]
    fn elapsed_time() {
        let now = Utc.timestamp_millis_opt(1_360_000_000_000).unwrap();
        assert_eq!(time_since(1_360_000_000_000 - 3_900_000, now), "1 hour, 5 minutes");
        assert_eq!(time_since(1_360_000_000_000 - 120_000, now), "2 minutes");
        assert_eq!(time_since(1_360_000_000_000, now), "0 minutes");
    }

    #[test]
    fn families_follow_cache_use() {
        assert!(Formatter::DecodeOpenflowPort.alias_families().contains(&AliasFamily::Port));
        assert!(Formatter::DecodeOpenflowPort.alias_families().contains(&AliasFamily::Switch));
        assert!(Formatter::Timestamp.alias_families().is_empty());
    }
}
