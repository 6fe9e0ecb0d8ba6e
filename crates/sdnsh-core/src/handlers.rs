// ── Argument data handlers ──
//
// Data handlers run after an argument validates and derive further fields
// from it, writing into the command's `data` row. A failure here means
// the arguments contradict each other (an unknown port on the named
// switch, a switch that can't be identified) and aborts the command with
// `CoreError::DataHandler`.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use sdnsh_api::Row;
use serde_json::Value;
use tracing::debug;

use crate::complete::OtherSpec;
use crate::error::CoreError;
use crate::session::Session;
use crate::util::{
    convert_case, field_text, inet_ntoa, interface_ranges, invert_netmask, is_dpid, pattern,
};
use crate::validate::parse_date;

static CIDR_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^((\d{1,3}\.){3}\d{1,3})/(\d{1,2})$"));
static HEX_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^0x[0-9a-fA-F]+$"));

fn set(data: &mut Row, field: &str, value: impl Into<Value>) {
    data.insert(field.to_owned(), value.into());
}

// ── Pure handlers ────────────────────────────────────────────────────

/// `a.b.c.d/n` → `dest_ip` and `dest_netmask`. With `inverse` the mask is
/// written ACL style (`0.0.0.255` for `/24`). Values that aren't CIDR
/// leave `data` untouched.
pub fn split_cidr(
    value: &str,
    data: &mut Row,
    dest_ip: &str,
    dest_netmask: &str,
    inverse: bool,
) -> Result<(), CoreError> {
    let Some(caps) = CIDR_RE.captures(value) else {
        return Ok(());
    };
    let bits: u32 = caps[3]
        .parse()
        .map_err(|_| CoreError::DataHandler(format!("bad cidr block in {value}")))?;
    if bits > 32 {
        return Err(CoreError::DataHandler("max cidr block is 32".into()));
    }
    let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
    let mask = if inverse { !mask } else { mask };
    set(data, dest_ip, &caps[1]);
    set(data, dest_netmask, inet_ntoa(mask));
    Ok(())
}

/// `enable` → true, `disable` → false; anything else is left alone.
pub fn enable_disable_to_boolean(value: &str, data: &mut Row, field: &str) {
    match value {
        "enable" => set(data, field, true),
        "disable" => set(data, field, false),
        _ => {}
    }
}

/// Milliseconds since the epoch for `now`/`current`, a literal integer,
/// or any date [`parse_date`] accepts. Unparseable values are dropped.
pub fn date_to_integer(value: &str, data: &mut Row, field: &str) {
    let millis = if value == "now" || value == "current" {
        Some(Utc::now().timestamp_millis())
    } else if let Ok(n) = value.parse::<i64>() {
        Some(n)
    } else {
        parse_date(value).map(|dt| dt.timestamp_millis())
    };
    match millis {
        Some(ms) => set(data, field, ms),
        None => debug!("date_to_integer: {value} is not a date"),
    }
}

/// `0x`-prefixed hex or decimal, stored as a decimal string.
pub fn hex_to_integer(value: &str, data: &mut Row, field: &str) -> Result<(), CoreError> {
    let n = if HEX_RE.is_match(value) {
        i64::from_str_radix(&value[2..], 16)
    } else {
        value.parse::<i64>()
    }
    .map_err(|_| CoreError::DataHandler(format!("{value} is not an integer")))?;
    set(data, field, n.to_string());
    Ok(())
}

/// Byte-wise complement of a dotted-quad mask.
pub fn convert_inverse_netmask(value: &str, data: &mut Row, field: &str) -> Result<(), CoreError> {
    let inverted =
        invert_netmask(value).ok_or_else(|| CoreError::DataHandler(format!("bad netmask {value}")))?;
    set(data, field, inverted);
    Ok(())
}

/// `[namespace.]name=value` into three fields; the namespace defaults to
/// `default` and may itself contain dots.
pub fn convert_tag_to_parts(
    value: &str,
    data: &mut Row,
    namespace_key: &str,
    name_key: &str,
    value_key: &str,
) -> Result<(), CoreError> {
    let parts: Vec<&str> = value.split('=').collect();
    let [tag, tag_value] = *parts.as_slice() else {
        return Err(CoreError::DataHandler("tag <[tag-namespace.]name>=<value>".into()));
    };
    let (namespace, name) = tag.rsplit_once('.').unwrap_or(("default", tag));
    set(data, namespace_key, namespace);
    set(data, name_key, name);
    set(data, value_key, tag_value);
    Ok(())
}

// ── Store-backed handlers ────────────────────────────────────────────

impl Session {
    /// Store the canonical key for `value`, which may be an alias.
    ///
    /// When the key is compound and an alias was translated, its
    /// components are distributed into `data` instead of `field`.
    pub async fn alias_to_value(
        &self,
        value: &str,
        obj_type: &str,
        data: &mut Row,
        field: &str,
        other: Option<&OtherSpec>,
    ) -> Result<(), CoreError> {
        let mi = self.registry();
        let mut obj_type = obj_type;
        if mi.pk(obj_type) != Some(field) {
            if let Some((target, _)) = mi.foreign_key_references(obj_type, field) {
                obj_type = target;
            } else {
                debug!("alias_to_value: {field} of {obj_type} references nothing");
            }
        }
        let source = other.map_or(obj_type, OtherSpec::obj_type);
        let config = mi
            .obj_type_related_config_obj_type(source)
            .ok_or_else(|| CoreError::Description(format!("Unknown obj-type: {source}")))?;

        let converted = self.convert_alias_to_object_key(config, value).await;
        let pk = mi
            .pk(config)
            .ok_or_else(|| CoreError::Description(format!("{config}: no primary key")))?;
        if mi.is_compound_key(config, pk) && converted != value {
            let mut pk_row = Row::new();
            pk_row.insert(pk.to_owned(), Value::String(converted));
            mi.split_compound_into_dict(config, pk, &mut pk_row, true);
            for (k, v) in pk_row {
                if k != pk {
                    data.insert(k, v);
                }
            }
        } else {
            let case = mi.get_obj_type_field_case_sensitive(config, field);
            set(data, field, convert_case(case, &converted));
        }
        Ok(())
    }

    /// Copy fields of the `value` row of a related table into `data`.
    /// `other` names the table and, optionally, the field to copy;
    /// otherwise `field` is copied from `obj_type`.
    pub async fn replace_value(
        &self,
        value: &str,
        obj_type: &str,
        data: &mut Row,
        field: &str,
        other: Option<&OtherSpec>,
    ) -> Result<(), CoreError> {
        let table = other.map_or(obj_type, OtherSpec::obj_type);
        let copy = other.and_then(OtherSpec::field).unwrap_or(field);
        let row = self
            .store()
            .get_object_from_store(table, value)
            .await
            .map_err(|_| CoreError::DataHandler(format!("Unknown value {value} ({obj_type})")))?;
        let copied = row
            .get(copy)
            .ok_or_else(|| CoreError::DataHandler(format!("Unknown field {copy} ({obj_type})")))?;
        data.insert(copy.to_owned(), copied.clone());
        Ok(())
    }

    /// Replace an interface name with its OpenFlow port number on the
    /// switch named by `scoped`, `dpid` or `switch` in `data`. Without a
    /// switch the name is kept.
    pub async fn convert_interface_to_port(
        &self,
        value: &str,
        data: &mut Row,
        field: &str,
        scoped: Option<&str>,
    ) -> Result<(), CoreError> {
        let dpid = match scoped {
            Some(scoped) => field_text(data, scoped),
            None if data.contains_key("dpid") => field_text(data, "dpid"),
            None => field_text(data, "switch"),
        };
        if dpid.is_empty() {
            set(data, field, value);
            return Ok(());
        }

        let mut filter = Row::new();
        filter.insert("dpid".into(), Value::String(dpid.clone()));
        let ports = self.get_model_from_url("interfaces", &filter).await?;
        let port = ports
            .iter()
            .find(|p| field_text(p, "portName") == value)
            .and_then(|p| p.get("portNumber").cloned())
            .ok_or_else(|| {
                CoreError::DataHandler(format!("Can't find port {value} on switch {dpid}"))
            })?;
        data.insert(field.to_owned(), port);
        Ok(())
    }

    /// Warn when the switch being configured is inactive or lacks
    /// `interface`. The value is always stored.
    ///
    /// The switch comes from the submode object's key first, then from
    /// `switch` or `dpid` in `data`.
    pub async fn warn_missing_interface(
        &self,
        interface: &str,
        data: &mut Row,
        field: &str,
        is_no_command: bool,
        mode_obj: Option<(&str, &str)>,
    ) -> Result<(), CoreError> {
        if !is_no_command {
            let mi = self.registry();
            let mut key_row = Row::new();
            if let Some((obj_type, obj_id)) = mode_obj {
                if let Some(pk) = mi.pk(obj_type) {
                    key_row.insert(pk.to_owned(), Value::String(obj_id.to_owned()));
                    mi.split_compound_into_dict(obj_type, pk, &mut key_row, true);
                }
            }
            let switch = [&key_row, &*data]
                .into_iter()
                .flat_map(|row| [row.get("switch"), row.get("dpid")])
                .flatten()
                .find_map(|v| v.as_str().map(str::to_owned))
                .ok_or_else(|| {
                    CoreError::DataHandler("Can't identify switch for validation".into())
                })?;
            self.check_missing_interface(&switch, interface).await;
        }
        set(data, field, interface);
        Ok(())
    }

    async fn check_missing_interface(&self, switch: &str, interface: &str) {
        // A compound reference: pick the component that looks like a dpid.
        let switch = switch
            .split('|')
            .find(|part| is_dpid(part))
            .or_else(|| switch.split('|').next())
            .unwrap_or(switch);

        let mut filter = Row::new();
        filter.insert("dpid".into(), Value::String(switch.to_owned()));
        let rows = self
            .get_model_from_url("switches", &filter)
            .await
            .unwrap_or_default();
        if rows.first().is_none_or(|row| field_text(row, "ip-address").is_empty()) {
            self.warn(format!(
                "switch {switch} currently not active, interface {interface} may not exist"
            ));
            return;
        }

        let Ok(ports) = self.get_model_from_url("interfaces", &filter).await else {
            return;
        };
        let names: Vec<String> = ports.iter().map(|p| field_text(p, "portName")).collect();
        if !names.iter().any(|n| n.eq_ignore_ascii_case(interface)) {
            self.warn(format!(
                "active switch has no interface \"{interface}\", known: {}\n\
                 Use \"exit; no interface {interface}\" to remove",
                interface_ranges(&names).join(", ")
            ));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn cidr_splits_into_ip_and_mask() {
        let mut data = Row::new();
        split_cidr("10.1.0.0/16", &mut data, "ip", "netmask", false).unwrap();
        assert_eq!(data["ip"], json!("10.1.0.0"));
        assert_eq!(data["netmask"], json!("255.255.0.0"));

        split_cidr("10.1.0.0/16", &mut data, "ip", "netmask", true).unwrap();
        assert_eq!(data["netmask"], json!("0.0.255.255"));

        split_cidr("10.0.0.1/0", &mut data, "ip", "netmask", false).unwrap();
        assert_eq!(data["netmask"], json!("0.0.0.0"));
    }

    #[test]
    fn cidr_above_32_is_rejected() {
        let mut data = Row::new();
        let err = split_cidr("10.0.0.0/40", &mut data, "ip", "netmask", false).unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: max cidr block is 32");
        assert!(data.is_empty());
    }

    #[test]
    fn non_cidr_values_pass_through() {
        let mut data = Row::new();
        split_cidr("10.0.0.1", &mut data, "ip", "netmask", false).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn enable_disable() {
        let mut data = Row::new();
        enable_disable_to_boolean("enable", &mut data, "active");
        assert_eq!(data["active"], json!(true));
        enable_disable_to_boolean("disable", &mut data, "active");
        assert_eq!(data["active"], json!(false));
        enable_disable_to_boolean("maybe", &mut data, "active");
        assert_eq!(data["active"], json!(false));
    }

    #[test]
    fn dates_become_epoch_millis() {
        let mut data = Row::new();
        date_to_integer("1360000000000", &mut data, "start");
        assert_eq!(data["start"], json!(1_360_000_000_000_i64));

        date_to_integer("2013-02-04T17:46:40+0000", &mut data, "start");
        assert_eq!(data["start"], json!(1_360_000_000_000_i64));

        date_to_integer("now", &mut data, "end");
        assert!(data["end"].as_i64().unwrap() > 1_360_000_000_000);

        date_to_integer("garbage", &mut data, "other");
        assert!(!data.contains_key("other"));
    }

    #[test]
    fn hex_and_decimal_normalize() {
        let mut data = Row::new();
        hex_to_integer("0x1F", &mut data, "cookie").unwrap();
        assert_eq!(data["cookie"], json!("31"));
        hex_to_integer("42", &mut data, "cookie").unwrap();
        assert_eq!(data["cookie"], json!("42"));
        assert!(hex_to_integer("x", &mut data, "cookie").is_err());
    }

    #[test]
    fn netmask_inversion() {
        let mut data = Row::new();
        convert_inverse_netmask("255.255.255.0", &mut data, "mask").unwrap();
        assert_eq!(data["mask"], json!("0.0.0.255"));
        assert!(convert_inverse_netmask("255.255", &mut data, "mask").is_err());
    }

    #[test]
    fn tags_split_into_parts() {
        let mut data = Row::new();
        convert_tag_to_parts("owner=alice", &mut data, "namespace", "name", "value").unwrap();
        assert_eq!(data["namespace"], json!("default"));
        assert_eq!(data["name"], json!("owner"));
        assert_eq!(data["value"], json!("alice"));

        convert_tag_to_parts("com.acme.owner=bob", &mut data, "namespace", "name", "value")
            .unwrap();
        assert_eq!(data["namespace"], json!("com.acme"));
        assert_eq!(data["name"], json!("owner"));

        assert!(convert_tag_to_parts("owner", &mut data, "namespace", "name", "value").is_err());
    }
}
