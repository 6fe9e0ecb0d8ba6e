// Integration tests for the completion engine against a wiremock controller.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sdnsh_core::{
    Catalog, CompletionRequest, Completions, CoreError, OtherSpec, Row, Scope, Session,
    SessionConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Session) {
    setup_with(Catalog::builtin().unwrap()).await
}

async fn setup_with(catalog: Catalog) -> (MockServer, Session) {
    let server = MockServer::start().await;
    let config = SessionConfig {
        controller: Some(server.uri()),
        netvirt: Some(false),
        ..SessionConfig::default()
    };
    let session = Session::new(config, Arc::new(catalog)).unwrap();
    (server, session)
}

async fn mount_table(server: &MockServer, table: &str, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/model/{table}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

async fn mount_switches(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/switches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "dpid": DPID,
                "ports": [
                    { "portNumber": 1, "name": "Eth1" },
                    { "portNumber": 2, "name": "Eth2" },
                    { "portNumber": 65534, "name": "mgmt0" },
                ],
            },
            { "dpid": DPID2, "ports": [{ "portNumber": 9, "name": "Eth9" }] },
        ])))
        .mount(server)
        .await;
}

fn data(value: serde_json::Value) -> Row {
    value.as_object().unwrap().clone()
}

fn other(spec: &str) -> OtherSpec {
    spec.parse().unwrap()
}

fn sorted_keys(completions: &Completions) -> Vec<&str> {
    let mut keys: Vec<&str> = completions.keys().collect();
    keys.sort_unstable();
    keys
}

const DPID: &str = "00:00:00:00:00:00:00:01";
const DPID2: &str = "00:00:00:00:00:00:00:02";

/// A rack/server schema with plain fields that share names with obj-types.
const RACK_CATALOG: &str = r#"
[rack]
pk = "name"

[rack.fields.name]

[rack.fields.location]

[rack.fields.site]

[server]
pk = "id"

[server.fields.id]

[server.fields.rack]

[server.fields.site]
"#;

// ── complete-from-another ───────────────────────────────────────────

#[tokio::test]
async fn test_from_another_offers_nothing_to_no_commands() {
    let (_server, session) = setup().await;
    let req = CompletionRequest::new("flow-entry", "switch", "")
        .with_other(other("switch-config"))
        .no_command(true);

    let mut completions = Completions::new();
    session.complete_from_another(&req, &mut completions).await.unwrap();
    assert!(completions.is_empty());
}

#[tokio::test]
async fn test_from_another_without_other_is_a_description_error() {
    let (_server, session) = setup().await;
    let req = CompletionRequest::new("flow-entry", "switch", "");
    let err = session
        .complete_from_another(&req, &mut Completions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Description(_)));
}

#[tokio::test]
async fn test_from_another_assembles_primitive_compound_key() {
    let (server, session) = setup().await;
    mount_switches(&server).await;

    // `interfaces|portName` binds the field; the switch component comes
    // from data and the prefix completes the missing port name.
    let req = CompletionRequest::new("switch-interface-config", "name", "Eth")
        .with_other(other("interfaces|portName"))
        .with_data(data(json!({ "switch": DPID })));

    let mut completions = Completions::new();
    session.complete_from_another(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), ["Eth1 ", "Eth2 "]);
    assert_eq!(completions.get("Eth1 "), Some("Interfaces selection"));
}

#[tokio::test]
async fn test_from_another_searches_compound_key_components() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/model/switch-interface-config/"))
        .and(query_param("switch", DPID))
        .and(query_param("name__startswith", "Eth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": format!("{DPID}|Eth1"), "switch": DPID, "name": "Eth1" },
            { "id": format!("{DPID}|Eth2"), "switch": DPID, "name": "Eth2" },
        ])))
        .mount(&server)
        .await;

    let req = CompletionRequest::new("switch-interface-alias", "switch-interface", "Eth")
        .with_other(other("switch-interface-config|name"))
        .with_data(data(json!({ "switch": DPID })))
        .scoped(Scope::DataField("switch".into()));

    let mut completions = Completions::new();
    session.complete_from_another(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), ["Eth1 ", "Eth2 "]);
}

#[tokio::test]
async fn test_from_another_explicit_searches_only_the_scope_field() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/model/switch-interface-config/"))
        .and(query_param("switch", DPID))
        .and(query_param_is_missing("name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": format!("{DPID}|Eth1"), "switch": DPID, "name": "Eth1" },
            { "id": format!("{DPID}|Eth7"), "switch": DPID, "name": "Eth7" },
        ])))
        .mount(&server)
        .await;

    // Without `explicit` the sibling `name` would narrow the search too.
    let req = CompletionRequest::new("switch-interface-alias", "switch-interface", "")
        .with_other(other("switch-interface-config|name"))
        .with_data(data(json!({ "switch": DPID, "name": "Eth7" })))
        .scoped(Scope::DataField("switch".into()))
        .in_mode("uplink", None)
        .explicit(true);

    let mut completions = Completions::new();
    session.complete_from_another(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), ["Eth1 ", "Eth7 "]);
}

#[tokio::test]
async fn test_from_another_primary_key_prefix_search() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/model/switch-config/"))
        .and(query_param("dpid__startswith", "00:00:00:00:00:00:00:0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "dpid": DPID },
            { "dpid": DPID2 },
        ])))
        .mount(&server)
        .await;
    mount_table(&server, "switch-alias", json!([])).await;

    let req = CompletionRequest::new("flow-entry", "switch", "00:00:00:00:00:00:00:0")
        .with_other(other("switch-config|dpid"));

    let mut completions = Completions::new();
    session.complete_from_another(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), [format!("{DPID} "), format!("{DPID2} ")]);
    assert_eq!(completions.get(&format!("{DPID} ")), Some("Switch config selection"));
}

#[tokio::test]
async fn test_from_another_primary_key_prefers_aliases() {
    let (server, session) = setup().await;
    mount_table(&server, "switch-config", json!([{ "dpid": DPID }, { "dpid": DPID2 }])).await;
    mount_table(&server, "switch-alias", json!([{ "id": "core1", "switch": DPID }])).await;

    let req = CompletionRequest::new("flow-entry", "switch", "")
        .with_other(other("switch-config|dpid"));

    let mut completions = Completions::new();
    session.complete_from_another(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), [format!("{DPID2} ").as_str(), "core1 "]);
}

#[tokio::test]
async fn test_from_another_follows_local_foreign_key() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/model/switch-config/"))
        .and(query_param("dpid__startswith", "00:00:00:00:00:00:00:0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "dpid": DPID }])))
        .mount(&server)
        .await;

    // `switches` names no field, so the completed field `switch` is used;
    // it is a foreign key into switch-config.
    let req = CompletionRequest::new("flow-entry", "switch", "00:00:00:00:00:00:00:0")
        .with_other(other("switches"));

    let mut completions = Completions::new();
    session.complete_from_another(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), [format!("{DPID} ")]);
    assert_eq!(completions.get(&format!("{DPID} ")), Some("Switches selection"));
}

#[tokio::test]
async fn test_from_another_field_named_after_other() {
    let (server, session) = setup_with(Catalog::from_toml(RACK_CATALOG).unwrap()).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/model/rack/"))
        .and(query_param("name__startswith", "r"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "r1" },
            { "name": "r2" },
        ])))
        .mount(&server)
        .await;

    let req = CompletionRequest::new("server", "rack", "r").with_other(other("rack"));

    let mut completions = Completions::new();
    session.complete_from_another(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), ["r1 ", "r2 "]);
}

#[tokio::test]
async fn test_from_another_falls_back_to_filtered_read() {
    let (server, session) = setup_with(Catalog::from_toml(RACK_CATALOG).unwrap()).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/model/rack/"))
        .and(query_param("site", "east"))
        .and(query_param("location__startswith", "row"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "r1", "location": "row1", "site": "east" },
            { "name": "r2", "location": "row2", "site": "east" },
            { "name": "r3", "location": "row2", "site": "east" },
        ])))
        .mount(&server)
        .await;

    let req = CompletionRequest::new("server", "location", "row")
        .with_other(other("rack"))
        .with_data(data(json!({ "site": "east" })));

    let mut completions = Completions::new();
    session.complete_from_another(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), ["row1 ", "row2 "]);
}

#[tokio::test]
async fn test_from_another_unknown_other_is_a_description_error() {
    let (_server, session) = setup().await;
    let req = CompletionRequest::new("flow-entry", "switch", "").with_other(other("bogus"));
    let err = session
        .complete_from_another(&req, &mut Completions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Bad command description: Unknown obj-type/other: bogus");
}

// ── complete-tag-mapping ────────────────────────────────────────────

async fn mount_tags(server: &MockServer) {
    mount_table(
        server,
        "tag",
        json!([
            { "id": "default|owner|alice" },
            { "id": "default|site|lab" },
            { "id": "ops|owner|bob" },
        ]),
    )
    .await;
}

#[tokio::test]
async fn test_tag_mapping_filters_by_namespace() {
    let (server, session) = setup().await;
    mount_tags(&server).await;

    let mut completions = Completions::new();
    let req = CompletionRequest::new("tag", "id", "ops.");
    session.complete_tag_mapping(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), ["ops.owner=bob "]);
    assert_eq!(completions.get("ops.owner=bob "), Some("tag selection"));
}

#[tokio::test]
async fn test_tag_mapping_filters_by_name() {
    let (server, session) = setup().await;
    mount_tags(&server).await;

    let mut completions = Completions::new();
    let req = CompletionRequest::new("tag", "id", "default.s");
    session.complete_tag_mapping(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), ["default.site=lab "]);

    let mut completions = Completions::new();
    let req = CompletionRequest::new("tag", "id", "");
    session.complete_tag_mapping(&req, &mut completions).await.unwrap();
    assert_eq!(completions.len(), 3);
}

// ── complete-alias-choice ───────────────────────────────────────────

#[tokio::test]
async fn test_alias_choice_replaces_aliased_keys() {
    let (server, session) = setup().await;
    mount_table(&server, "switch-config", json!([{ "dpid": DPID }, { "dpid": DPID2 }])).await;
    mount_table(&server, "switch-alias", json!([{ "id": "core1", "switch": DPID }])).await;

    let mut completions = Completions::new();
    let req = CompletionRequest::new("switch-config", "dpid", "");
    session.complete_alias_choice(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), [format!("{DPID2} ").as_str(), "core1 "]);
    assert_eq!(completions.get("core1 "), Some("Switch config alias selection"));
}

#[tokio::test]
async fn test_alias_choice_redirects_to_other() {
    let (server, session) = setup().await;
    mount_table(&server, "switch-config", json!([{ "dpid": DPID }])).await;
    mount_table(&server, "switch-alias", json!([])).await;

    let mut completions = Completions::new();
    let req = CompletionRequest::new("flow-entry", "switch", "").with_other(other("switch-config|dpid"));
    session.complete_alias_choice(&req, &mut completions).await.unwrap();
    assert_eq!(sorted_keys(&completions), [format!("{DPID} ")]);

    let req = CompletionRequest::new("switch-config", "nope", "");
    let err = session
        .complete_alias_choice(&req, &mut Completions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Description(_)));
}

// ── complete-config ─────────────────────────────────────────────────

async fn mount_saved_configs(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "lab/timestamp=2013-02-01.10:00:00/version=1/length=4" },
            { "name": "prod/timestamp=2013-02-01.10:00:00/version=1/length=4" },
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_complete_config_excludes_bound_source() {
    let (server, session) = setup().await;
    mount_saved_configs(&server).await;

    let mut completions = Completions::new();
    let bound = data(json!({ "source": "config://lab" }));
    session
        .complete_config("", &bound, true, &mut completions)
        .await
        .unwrap();

    assert!(completions.contains("config://prod"));
    assert!(!completions.contains("config://lab"));
    assert_eq!(completions.get("running-config "), Some("running-config destination"));
    for scheme in ["http://", "file://", "ftp://", "tftp://", "config://"] {
        assert!(completions.contains(scheme), "missing {scheme}");
    }
}

#[tokio::test]
async fn test_complete_config_without_copy_offers_saved_only() {
    let (server, session) = setup().await;
    mount_saved_configs(&server).await;

    let mut completions = Completions::new();
    session
        .complete_config("config://p", &Row::new(), false, &mut completions)
        .await
        .unwrap();
    assert_eq!(sorted_keys(&completions), ["config://prod "]);
    assert_eq!(completions.get("config://prod "), Some("Saved Configuration source"));
}

// ── complete-interface-list ─────────────────────────────────────────

#[tokio::test]
async fn test_interface_list_continues_after_comma() {
    let (server, session) = setup().await;
    mount_switches(&server).await;
    mount_table(
        &server,
        "switch-interface-config",
        json!([{ "id": format!("{DPID}|Eth5"), "switch": DPID, "name": "Eth5" }]),
    )
    .await;

    let mut completions = Completions::new();
    let switch = data(json!({ "switch": DPID }));
    session
        .complete_interface_list("Eth1,", &switch, &mut completions)
        .await
        .unwrap();
    assert_eq!(
        sorted_keys(&completions),
        ["Eth1,Eth1", "Eth1,Eth2", "Eth1,Eth5", "Eth1,mgmt0"]
    );
}

#[tokio::test]
async fn test_interface_list_needs_a_switch() {
    let (_server, session) = setup().await;
    let mut completions = Completions::new();
    session
        .complete_interface_list("Eth", &Row::new(), &mut completions)
        .await
        .unwrap();
    assert!(completions.is_empty());
}
