// Integration tests for running-config synthesis using wiremock.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sdnsh_core::{Catalog, Completions, CoreError, Section, Session, SessionConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Session) {
    setup_with(Some(false)).await
}

async fn setup_with(netvirt: Option<bool>) -> (MockServer, Session) {
    let server = MockServer::start().await;
    let config = SessionConfig {
        controller: Some(server.uri()),
        netvirt,
        ..SessionConfig::default()
    };
    let session = Session::new(config, Arc::new(Catalog::builtin().unwrap())).unwrap();
    (server, session)
}

async fn mount_table(server: &MockServer, table: &str, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/model/{table}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

const DPID: &str = "00:00:00:00:00:00:00:01";

// ── Default suppression ─────────────────────────────────────────────

#[tokio::test]
async fn test_defaults_are_not_emitted() {
    let (server, session) = setup().await;
    mount_table(
        &server,
        "feature",
        json!([{ "id": "feature", "netvirt-feature": true, "static-flow-pusher-feature": true }]),
    )
    .await;
    mount_table(
        &server,
        "controller-node",
        json!([{ "id": "localhost", "time-zone": "UTC", "logging-enabled": false }]),
    )
    .await;
    mount_table(
        &server,
        "switch-config",
        json!([{ "dpid": DPID, "core-switch": false, "tunnel-termination": "default" }]),
    )
    .await;
    mount_table(&server, "switch-alias", json!([])).await;

    let config = session.show_running_config(&[], "sdnsh 0.1.0").await.unwrap();
    assert!(config.starts_with("!\n! sdnsh 0.1.0\n! Current Time: "));
    assert!(config.ends_with("!\nversion 1.0\n!\nswitch 00:00:00:00:00:00:00:01"));
    assert!(!config.contains("feature"));
    assert!(!config.contains("controller-node"));
    assert!(!config.contains("core-switch"));
}

#[tokio::test]
async fn test_changed_fields_are_emitted() {
    let (server, session) = setup().await;
    mount_table(
        &server,
        "switch-config",
        json!([{ "dpid": DPID, "core-switch": true, "tunnel-termination": "default" }]),
    )
    .await;
    mount_table(&server, "switch-alias", json!([{ "id": "sw1", "switch": DPID }])).await;
    mount_table(
        &server,
        "flow-entry",
        json!([{ "name": "f1", "switch": DPID, "active": true, "priority": 100, "idle-timeout": 60 }]),
    )
    .await;

    let config = session.show_running_config(&["switch"], "v").await.unwrap();
    assert_eq!(
        config,
        "!\nswitch 00:00:00:00:00:00:00:01\n  switch-alias sw1\n  core-switch\n  flow-entry f1\n    active True\n    priority 100"
    );
}

const DPID2: &str = "00:00:00:00:00:00:00:02";

/// Mount the switch section's tables, as the controller holds them.
async fn mount_switch_store(
    server: &MockServer,
    switches: serde_json::Value,
    ports: serde_json::Value,
    flows: serde_json::Value,
) {
    mount_table(server, "switch-config", switches).await;
    mount_table(server, "switch-alias", json!([{ "id": "sw1", "switch": DPID }])).await;
    mount_table(server, "switch-interface-config", ports).await;
    mount_table(server, "switch-interface-alias", json!([])).await;
    mount_table(server, "flow-entry", flows).await;
}

#[tokio::test]
async fn test_replayed_config_synthesizes_identically() {
    // Everything the store holds, defaults included.
    let (server, session) = setup().await;
    mount_switch_store(
        &server,
        json!([
            { "dpid": DPID, "core-switch": true, "tunnel-termination": "default" },
            { "dpid": DPID2, "core-switch": false, "tunnel-termination": "enabled" },
        ]),
        json!([
            { "id": format!("{DPID}|eth1"), "switch": DPID, "name": "eth1", "mode": "default", "broadcast": false },
            { "id": format!("{DPID}|eth2"), "switch": DPID, "name": "eth2", "mode": "edge" },
        ]),
        json!([{
            "name": "f1", "switch": DPID, "active": true, "idle-timeout": 60, "hard-timeout": 0,
            "priority": 32768, "cookie": 0, "wildcards": 0,
            "src-mac": "00:00:00:00:00:0a", "dst-mac": null, "actions": "output=2",
        }]),
    )
    .await;

    let first = session.show_running_config(&["switch"], "v").await.unwrap();
    for silent in [
        "idle-timeout",
        "hard-timeout",
        "priority",
        "cookie",
        "wildcards",
        "dst-mac",
        "tunnel termination default",
        "switchport mode default",
        "interface eth1",
    ] {
        assert!(!first.contains(silent), "{silent} emitted:\n{first}");
    }
    assert!(first.contains("  interface eth2\n    switchport mode edge\n"));
    assert!(first.contains("switch 00:00:00:00:00:00:00:02\n  tunnel termination enabled"));

    // A fresh read of the same data gives the same text.
    session.store().cache().clear();
    let again = session.show_running_config(&["switch"], "v").await.unwrap();
    assert_eq!(again, first);

    // The store left behind by replaying the output holds only what was emitted.
    let (replayed, replay_session) = setup().await;
    mount_switch_store(
        &replayed,
        json!([
            { "dpid": DPID, "core-switch": true },
            { "dpid": DPID2, "tunnel-termination": "enabled" },
        ]),
        json!([{ "id": format!("{DPID}|eth2"), "switch": DPID, "name": "eth2", "mode": "edge" }]),
        json!([{
            "name": "f1", "switch": DPID, "active": true,
            "src-mac": "00:00:00:00:00:0a", "actions": "output=2",
        }]),
    )
    .await;
    let second = replay_session.show_running_config(&["switch"], "v").await.unwrap();
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_controller_node_firewall_defaults() {
    let (server, session) = setup().await;
    mount_table(&server, "controller-node", json!([{ "id": "c1", "ntp-server": "0.pool.ntp.org" }])).await;
    mount_table(
        &server,
        "controller-interface",
        json!([{ "id": "c1|Ethernet|0", "controller": "c1", "type": "Ethernet", "number": 0, "mode": "static" }]),
    )
    .await;
    mount_table(
        &server,
        "firewall-rule",
        json!([
            { "interface": "c1|Ethernet|0", "proto": "tcp", "port": 22 },
            { "interface": "c1|Ethernet|0", "proto": "tcp", "port": 443 },
        ]),
    )
    .await;

    let config = session.show_running_config(&["controller-node"], "v").await.unwrap();
    assert_eq!(
        config,
        "!\ncontroller-node c1\n  ntp server 0.pool.ntp.org\n  interface Ethernet 0\n    no firewall 6633 tcp\n    firewall allow ssl"
    );
}

#[tokio::test]
async fn test_static_arp_section() {
    let (server, session) = setup().await;
    mount_table(
        &server,
        "static-arp",
        json!([
            { "ip": "10.0.0.1", "mac": "00:00:00:00:00:01" },
            { "ip": "10.0.0.2", "mac": "00:00:00:00:00:02" },
        ]),
    )
    .await;

    let config = session.show_running_config(&["static"], "v").await.unwrap();
    assert_eq!(
        config,
        "!\narp 10.0.0.1 00:00:00:00:00:01\narp 10.0.0.2 00:00:00:00:00:02"
    );
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_switch_is_not_found() {
    let (server, session) = setup().await;
    mount_table(&server, "switch-config", json!([{ "dpid": DPID }])).await;
    mount_table(&server, "switch-alias", json!([])).await;

    let err = session
        .show_running_config(&["switch", "00:00:00:00:00:00:00:99"], "v")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    assert_eq!(err.to_string(), "No such switch \"00:00:00:00:00:00:00:99\"");
}

#[tokio::test]
async fn test_unreadable_sections_are_skipped() {
    // nothing mounted: every table read fails
    let (_server, session) = setup().await;
    let config = session.show_running_config(&[], "v").await.unwrap();
    assert_eq!(config, "");
}

#[tokio::test]
async fn test_gated_sections_need_netvirt() {
    let (_server, session) = setup_with(Some(false)).await;
    let err = session.show_running_config(&["tenant"], "v").await.unwrap_err();
    assert_eq!(err.to_string(), "unknown running-config item: tenant");

    let (_server, session) = setup_with(Some(true)).await;
    let sections = session.running_config_sections().await;
    assert!(sections.contains(&Section::Tenant));
    assert_eq!(sections.first(), Some(&Section::Feature));
}

#[tokio::test]
async fn test_tenant_nests_its_vns() {
    let (server, session) = setup_with(Some(true)).await;
    mount_table(&server, "tenant", json!([{ "name": "red", "active": true }])).await;
    mount_table(
        &server,
        "vns-definition",
        json!([{ "id": "red|v1", "tenant": "red", "vnsname": "v1", "active": false, "priority": 1000 }]),
    )
    .await;

    let config = session.show_running_config(&["tenant", "red"], "v").await.unwrap();
    assert_eq!(config, "!\ntenant red\n  vns-definition v1\n    no active");
}

// ── Completion ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_section_completion() {
    let (_server, session) = setup().await;
    let mut completions = Completions::new();
    session.complete_running_config("s", &mut completions).await;
    let mut keys: Vec<&str> = completions.keys().collect();
    keys.sort_unstable();
    assert_eq!(keys, ["static-arp ", "switch "]);
}
