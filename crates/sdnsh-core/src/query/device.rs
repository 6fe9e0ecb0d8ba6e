// Device-manager reshaping
//
// The `device` and `vns/device-interface` endpoints report one entry per
// learned device, with lists for vlans, addresses and attachment points.
// Each list fans out into separate rows here.

use sdnsh_api::{Query, Row};
use serde::Deserialize;
use serde_json::Value;

use super::{FieldFilter, decode_entries, row};
use crate::error::CoreError;
use crate::util::value_text;

const DEFAULT_ADDRESS_SPACE: &str = "default";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Device {
    mac: Vec<String>,
    #[serde(default)]
    ipv4: Vec<String>,
    #[serde(default)]
    vlan: Vec<Value>,
    #[serde(default)]
    attachment_point: Vec<AttachmentPoint>,
    #[serde(default)]
    last_seen: Value,
    #[serde(default = "default_address_space")]
    entity_class: String,
    #[serde(default)]
    dhcp_client_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentPoint {
    #[serde(rename = "switchDPID")]
    switch_dpid: String,
    port: Value,
    #[serde(default)]
    error_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceInterfaces {
    device: Device,
    #[serde(default)]
    iface: Vec<VnsIface>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VnsIface {
    name: String,
    #[serde(rename = "parentVNS")]
    parent_vns: NamedRef,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

fn default_address_space() -> String {
    DEFAULT_ADDRESS_SPACE.to_owned()
}

impl Device {
    /// The device's only mac. The device manager keys devices by mac, so a
    /// second one means the reply cannot be flattened.
    fn single_mac(&self, what: &str) -> Result<&str, CoreError> {
        match self.mac.as_slice() {
            [mac] => Ok(mac),
            [] => Err(CoreError::Internal(format!("{what}: no mac"))),
            _ => Err(CoreError::Internal(format!("{what}: >1 mac"))),
        }
    }

    /// Vlans as a row fan-out: `None` once when the device has none.
    fn vlan_fanout(&self) -> Vec<Option<&Value>> {
        if self.vlan.is_empty() {
            vec![None]
        } else {
            self.vlan.iter().map(Some).collect()
        }
    }

    fn ips(&self) -> Value {
        if self.ipv4.is_empty() {
            return Value::Null;
        }
        self.ipv4
            .iter()
            .map(|ip| {
                Value::Object(row([
                    ("ip-address", ip.as_str().into()),
                    ("last-seen", self.last_seen.clone()),
                ]))
            })
            .collect()
    }

    fn attachment_points(&self) -> Value {
        if self.attachment_point.is_empty() {
            return Value::Null;
        }
        self.attachment_point
            .iter()
            .map(|ap| {
                Value::Object(row([
                    ("switch", ap.switch_dpid.as_str().into()),
                    ("ingress-port", ap.port.clone()),
                ]))
            })
            .collect()
    }

    /// `address-space|vlan|mac` in the default address space, otherwise
    /// `address-space||mac` since vlans do not qualify other spaces.
    fn host_id(&self, mac: &str, vlan: Option<&Value>) -> String {
        match vlan {
            Some(vlan @ Value::Number(_)) if self.entity_class == DEFAULT_ADDRESS_SPACE => {
                format!("{}|{}|{mac}", self.entity_class, value_text(vlan))
            }
            _ => format!("{}||{mac}", self.entity_class),
        }
    }
}

fn with_vlan(mut row: Row, vlan: Option<&Value>) -> Row {
    if let Some(vlan) = vlan {
        row.insert("vlan".to_owned(), vlan.clone());
    }
    row
}

// ── host-attachment-point ────────────────────────────────────────────

pub(crate) fn attachment_point_rows(entries: Vec<Value>) -> Result<Vec<Row>, CoreError> {
    let mut result = Vec::new();
    for device in decode_entries::<Device>("host-attachment-point", entries) {
        let mac = device.single_mac("host (attachment point)")?;
        for ap in &device.attachment_point {
            let status = ap.error_status.clone().unwrap_or_default();
            for vlan in device.vlan_fanout() {
                let id = format!("{mac}|{}|{}", ap.switch_dpid, value_text(&ap.port));
                result.push(with_vlan(
                    row([
                        ("id", id.into()),
                        ("mac", mac.into()),
                        ("switch", ap.switch_dpid.as_str().into()),
                        ("ingress-port", ap.port.clone()),
                        ("status", status.as_str().into()),
                        ("last-seen", device.last_seen.clone()),
                        ("address-space", device.entity_class.as_str().into()),
                    ]),
                    vlan,
                ));
            }
        }
    }
    Ok(result)
}

// ── host-network-address ─────────────────────────────────────────────

pub(crate) fn network_address_rows(entries: Vec<Value>) -> Result<Vec<Row>, CoreError> {
    let mut result = Vec::new();
    for device in decode_entries::<Device>("host-network-address", entries) {
        let mac = device.single_mac("host (network-address)")?;
        for ip in &device.ipv4 {
            for vlan in device.vlan_fanout() {
                result.push(with_vlan(
                    row([
                        ("id", format!("{mac}|{ip}").into()),
                        ("mac", mac.into()),
                        ("ip-address", ip.as_str().into()),
                        ("address-space", device.entity_class.as_str().into()),
                        ("last-seen", device.last_seen.clone()),
                    ]),
                    vlan,
                ));
            }
        }
    }
    Ok(result)
}

// ── host ─────────────────────────────────────────────────────────────

/// One row per (device, vlan).
///
/// `ipv4`, `dpid` and `port` hold the values matching the query's filters
/// on those fields, while `ips` and `attachment-points` keep the device's
/// complete lists.
pub(crate) fn host_rows(entries: Vec<Value>, query: &Query) -> Result<Vec<Row>, CoreError> {
    let ip_filter = FieldFilter::from_query(query, "ipv4");
    let dpid_filter = FieldFilter::from_query(query, "dpid");
    let port_filter = FieldFilter::from_query(query, "port");
    let space_filter = FieldFilter::from_query(query, "address-space");

    let mut result = Vec::new();
    for device in decode_entries::<Device>("host", entries) {
        let mac = device.single_mac("host")?;
        if !space_filter.matches(&device.entity_class) {
            continue;
        }

        let ipv4: Vec<Value> = device
            .ipv4
            .iter()
            .filter(|ip| ip_filter.matches(ip))
            .map(|ip| Value::String(ip.clone()))
            .collect();
        let switches: Vec<Value> = device
            .attachment_point
            .iter()
            .filter(|ap| dpid_filter.matches(&ap.switch_dpid))
            .map(|ap| Value::String(ap.switch_dpid.clone()))
            .collect();
        let ports: Vec<Value> = device
            .attachment_point
            .iter()
            .filter(|ap| port_filter.matches(&value_text(&ap.port)))
            .map(|ap| ap.port.clone())
            .collect();

        for vlan in device.vlan_fanout() {
            result.push(with_vlan(
                row([
                    ("id", device.host_id(mac, vlan).into()),
                    ("mac", mac.into()),
                    ("ips", device.ips()),
                    ("ipv4", Value::Array(ipv4.clone())),
                    ("attachment-points", device.attachment_points()),
                    ("dpid", Value::Array(switches.clone())),
                    ("port", Value::Array(ports.clone())),
                    ("address-space", device.entity_class.as_str().into()),
                    (
                        "dhcp-client-name",
                        device.dhcp_client_name.as_deref().unwrap_or_default().into(),
                    ),
                    ("last-seen", device.last_seen.clone()),
                ]),
                vlan,
            ));
        }
    }
    Ok(result)
}

// ── host-vns-interface ───────────────────────────────────────────────

pub(crate) fn host_vns_interface_rows(
    entries: Vec<Value>,
    query: &Query,
) -> Result<Vec<Row>, CoreError> {
    let vns_filter = FieldFilter::from_query(query, "vns");

    let mut result = Vec::new();
    for entry in decode_entries::<DeviceInterfaces>("host-vns-interface", entries) {
        let device = &entry.device;
        let mac = device.single_mac("host (vns-interface)")?;
        let ips = device.ips();
        let aps = device.attachment_points();

        for iface in &entry.iface {
            let vns = iface.parent_vns.name.as_str();
            if !vns_filter.matches(vns) {
                continue;
            }
            for vlan in device.vlan_fanout() {
                result.push(row([
                    ("id", format!("{mac}|{vns}|{}", iface.name).into()),
                    ("host", device.host_id(mac, vlan).into()),
                    ("mac", mac.into()),
                    ("vlan", vlan.cloned().unwrap_or_else(|| Value::String(String::new()))),
                    ("address-space", device.entity_class.as_str().into()),
                    ("ips", ips.clone()),
                    ("attachment-points", aps.clone()),
                    ("vns", vns.into()),
                    ("interface", format!("{vns}|{}", iface.name).into()),
                    ("last-seen", device.last_seen.clone()),
                ]));
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::util::field_text;

    fn device(vlans: Value) -> Value {
        json!({
            "mac": ["00:00:00:00:00:0a"],
            "ipv4": ["10.0.0.1", "10.1.0.1"],
            "vlan": vlans,
            "attachmentPoint": [
                {"switchDPID": "00:00:00:00:00:00:00:01", "port": 3, "errorStatus": null},
                {"switchDPID": "00:00:00:00:00:00:00:02", "port": 7, "errorStatus": "duplicate"}
            ],
            "lastSeen": 1_350_000_000_000_u64,
            "entityClass": "default",
        })
    }

    #[test]
    fn two_vlans_make_two_host_rows() {
        let rows = host_rows(vec![device(json!([10, 20]))], &Query::new()).unwrap();
        let ids: Vec<String> = rows.iter().map(|r| field_text(r, "id")).collect();
        assert_eq!(
            ids,
            ["default|10|00:00:00:00:00:0a", "default|20|00:00:00:00:00:0a"]
        );
        assert!(rows.iter().all(|r| r["mac"] == json!("00:00:00:00:00:0a")));
        assert_eq!(rows[0]["vlan"], json!(10));
        assert_eq!(rows[1]["vlan"], json!(20));
    }

    #[test]
    fn host_without_vlan_has_empty_vlan_component() {
        let rows = host_rows(vec![device(json!([]))], &Query::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(field_text(&rows[0], "id"), "default||00:00:00:00:00:0a");
        assert!(!rows[0].contains_key("vlan"));
    }

    #[test]
    fn host_filters_narrow_match_lists_but_not_full_lists() {
        let query = Query::new()
            .startswith("ipv4", "10.1")
            .eq("dpid", "00:00:00:00:00:00:00:02");
        let rows = host_rows(vec![device(json!([]))], &query).unwrap();
        assert_eq!(rows[0]["ipv4"], json!(["10.1.0.1"]));
        assert_eq!(rows[0]["dpid"], json!(["00:00:00:00:00:00:00:02"]));
        assert_eq!(rows[0]["port"], json!([3, 7]));
        assert_eq!(rows[0]["ips"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn address_space_filter_skips_devices() {
        let query = Query::new().eq("address-space", "guest");
        assert!(host_rows(vec![device(json!([]))], &query).unwrap().is_empty());
    }

    #[test]
    fn non_default_address_space_ignores_vlan_in_id() {
        let mut entry = device(json!([5]));
        entry["entityClass"] = json!("tenant-a");
        let rows = host_rows(vec![entry], &Query::new()).unwrap();
        assert_eq!(field_text(&rows[0], "id"), "tenant-a||00:00:00:00:00:0a");
    }

    #[test]
    fn second_mac_is_an_internal_error() {
        let mut entry = device(json!([]));
        entry["mac"] = json!(["00:00:00:00:00:0a", "00:00:00:00:00:0b"]);
        let err = attachment_point_rows(vec![entry]).unwrap_err();
        assert_eq!(err.to_string(), "Internal error: host (attachment point): >1 mac");
    }

    #[test]
    fn attachment_points_fan_out_per_vlan() {
        let rows = attachment_point_rows(vec![device(json!([10, 20]))]).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(
            field_text(&rows[0], "id"),
            "00:00:00:00:00:0a|00:00:00:00:00:00:00:01|3"
        );
        assert_eq!(rows[0]["status"], json!(""));
        assert_eq!(rows[2]["status"], json!("duplicate"));
    }

    #[test]
    fn network_addresses_fan_out_per_ip() {
        let rows = network_address_rows(vec![device(json!([]))]).unwrap();
        let ids: Vec<String> = rows.iter().map(|r| field_text(r, "id")).collect();
        assert_eq!(
            ids,
            ["00:00:00:00:00:0a|10.0.0.1", "00:00:00:00:00:0a|10.1.0.1"]
        );
    }

    #[test]
    fn vns_interfaces_of_a_device() {
        let entry = json!({
            "device": device(json!([10])),
            "iface": [
                {"name": "Eth1", "parentVNS": {"name": "blue"}, "lastSeen": 1},
                {"name": "Eth2", "parentVNS": {"name": "red"}, "lastSeen": 1}
            ]
        });
        let query = Query::new().eq("vns", "blue");
        let rows = host_vns_interface_rows(vec![entry], &query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(field_text(&rows[0], "id"), "00:00:00:00:00:0a|blue|Eth1");
        assert_eq!(field_text(&rows[0], "host"), "default|10|00:00:00:00:00:0a");
        assert_eq!(field_text(&rows[0], "interface"), "blue|Eth1");
    }

    #[test]
    fn malformed_reply_is_empty() {
        let rows = host_rows(vec![json!({"unexpected": true})], &Query::new()).unwrap();
        assert!(rows.is_empty());
    }
}
