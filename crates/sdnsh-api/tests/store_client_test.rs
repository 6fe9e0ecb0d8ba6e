// Integration tests for `StoreClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sdnsh_api::{Error, Lookup, Query, RestErrorInfo, RetryPolicy, StoreClient, VersionSelector};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, StoreClient) {
    let server = MockServer::start().await;
    let client = StoreClient::with_client(reqwest::Client::new(), Some(server.uri()));
    (server, client)
}

fn blob(name: &str, version: u32) -> serde_json::Value {
    json!({ "name": format!("{name}/timestamp=2013-02-01.10:00:00/version={version}/length=4") })
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_table_read_with_startswith_filter() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/model/switch-config/"))
        .and(query_param("dpid__startswith", "00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "dpid": "00:00:00:00:00:00:00:01", "alias": null },
        ])))
        .mount(&server)
        .await;

    let rows = client
        .get_table_from_store("switch-config", Some(("dpid", "00:00")), Lookup::StartsWith)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["dpid"], "00:00:00:00:00:00:00:01");
}

#[tokio::test]
async fn test_object_read_escapes_compound_key() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(
            "/rest/v1/model/host-config/default%7C10%7C00%3A00%3A00%3A00%3A00%3A0a/",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "default|10|00:00:00:00:00:0a", "mac": "00:00:00:00:00:0a" },
        ])))
        .mount(&server)
        .await;

    let row = client
        .get_object_from_store("host-config", "default|10|00:00:00:00:00:0a")
        .await
        .unwrap();
    assert_eq!(row["mac"], "00:00:00:00:00:0a");
}

#[tokio::test]
async fn test_timed_out_read_is_retried() {
    let server = MockServer::start().await;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let client = StoreClient::with_client(http, Some(server.uri())).with_retry(RetryPolicy {
        attempts: 1,
        delay: Duration::from_millis(10),
    });

    Mock::given(method("GET"))
        .and(path("/rest/v1/model/feature/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/model/feature/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "feature" }])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = client
        .get_table_from_store("feature", None, Lookup::Eq)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_missing_controller_fails_fast() {
    let client = StoreClient::with_client(reqwest::Client::new(), None);
    let err = client
        .get_table_from_store("switch-config", None, Lookup::StartsWith)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoController));
    assert_eq!(
        err.to_string(),
        "No controller specified. Set using 'controller <server:port>'."
    );
}

#[tokio::test]
async fn test_reads_are_served_from_cache() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/model/host-config/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "mac": "00:aa" }])))
        .expect(1)
        .mount(&server)
        .await;

    let first = client.rest_query_objects("host-config", &Query::new()).await.unwrap();
    let second = client.rest_query_objects("host-config", &Query::new()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_null_filters_become_isnull() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/model/switch-interface-config/"))
        .and(query_param("switch", "00:01"))
        .and(query_param("mode__isnull", "True"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let filters = json!({ "switch": "00:01", "mode": null });
    let query = Query::from_filters(filters.as_object().unwrap());
    let rows = client
        .rest_query_objects("switch-interface-config", &query)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

// ── Writes and invalidation ─────────────────────────────────────────

#[tokio::test]
async fn test_successful_write_invalidates_cache() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/model/switch-config/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "dpid": "00:01" }])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/model/switch-config/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "dpid": "00:01" },
            { "dpid": "00:02" },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/rest/v1/model/switch-config/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("saved"))
        .mount(&server)
        .await;

    let before = client
        .get_table_from_store("switch-config", None, Lookup::StartsWith)
        .await
        .unwrap();
    assert_eq!(before.len(), 1);

    let new_row = json!({ "dpid": "00:02" });
    client
        .rest_create_object("switch-config", new_row.as_object().unwrap())
        .await
        .unwrap();

    let after = client
        .get_table_from_store("switch-config", None, Lookup::StartsWith)
        .await
        .unwrap();
    assert_eq!(after.len(), 2);
}

#[tokio::test]
async fn test_failed_write_keeps_cache_and_reports_field_errors() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/model/host-alias/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/rest/v1/model/host-alias/"))
        .and(query_param("id", "web"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "field_errors": { "id": "alias already in use" } })),
        )
        .mount(&server)
        .await;

    client.rest_query_objects("host-alias", &Query::new()).await.unwrap();
    assert_eq!(client.cache().len(), 1);

    let err = client
        .rest_update_object("host-alias", "id", "web", json!({"host": "x"}).as_object().unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Syntax error: field id: alias already in use");
    assert_eq!(client.cache().len(), 1);
}

#[tokio::test]
async fn test_update_accepts_json_saved_description() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/rest/v1/model/controller-node/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "description": "saved" })))
        .mount(&server)
        .await;

    client
        .rest_update_object(
            "controller-node",
            "id",
            "localhost",
            json!({"domain-name": "example.com"}).as_object().unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_uses_exact_match() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/model/static-arp/"))
        .and(query_param("ip__exact", "10.0.0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("deleted"))
        .expect(1)
        .mount(&server)
        .await;

    client
        .rest_delete_object("static-arp", "ip", "10.0.0.1")
        .await
        .unwrap();
}

// ── Status mapping ──────────────────────────────────────────────────

#[tokio::test]
async fn test_http_status_mapping() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/model/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such table"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/model/broken/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client.rest_query_objects("missing", &Query::new()).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Error: Not Found: no such table");

    let err = client.rest_query_objects("broken", &Query::new()).await.unwrap_err();
    assert!(matches!(err.rest_info(), Some(RestErrorInfo::Connection(_))));
    assert!(err.to_string().contains("Cassandra possibly not running"));
}

#[tokio::test]
async fn test_error_dictionary_with_success_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/model/switch/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error_type": "internal",
            "description": "boom"
        })))
        .mount(&server)
        .await;

    let err = client.rest_query_objects("switch", &Query::new()).await.unwrap_err();
    assert!(err.to_string().ends_with("had internal error:\nboom"));
}

// ── User data ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_user_data_listing_latest() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/data/"))
        .and(query_param("name__startswith", "startup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            blob("startup", 1),
            blob("startup", 2),
            blob("startup-old", 7),
        ])))
        .mount(&server)
        .await;

    let latest = client
        .get_user_data_table(Some("startup"), VersionSelector::Latest)
        .await
        .unwrap();
    let got: Vec<_> = latest.iter().map(|e| (e.name().to_owned(), e.id.version)).collect();
    assert_eq!(got, vec![("startup".to_owned(), 2), ("startup-old".to_owned(), 7)]);
    assert_eq!(
        latest[0].full_name,
        "startup/timestamp=2013-02-01.10:00:00/version=2/length=4"
    );
}

#[tokio::test]
async fn test_set_user_data_picks_next_version() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            blob("startup", 1),
            blob("startup", 2),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/rest/v1/data/startup/timestamp=[^/]+/version=3/length=5/$"))
        .and(header("content-type", "text/plain"))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(200).set_body_string("saved"))
        .expect(1)
        .mount(&server)
        .await;

    let id = client.set_user_data_file("startup", "hello").await.unwrap();
    assert_eq!(id.version, 3);
    assert_eq!(id.length, 5);
}

#[tokio::test]
async fn test_set_user_data_detects_concurrent_writer() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([blob("startup", 1)])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            blob("startup", 1),
            blob("startup", 2),
            { "name": "startup/timestamp=2013-02-01.10:00:01/version=2/length=9" },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_string("saved"))
        .mount(&server)
        .await;

    let err = client.set_user_data_file("startup", "text").await.unwrap_err();
    assert!(matches!(err, Error::VersionConflict { version: 2, .. }));
}

#[tokio::test]
async fn test_copy_text_rejects_non_http_schemes() {
    let (_server, client) = setup().await;
    let err = client
        .copy_text_to_url("ftp://host/file", "text")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedScheme(s) if s == "ftp"));
}
