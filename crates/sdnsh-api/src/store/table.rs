// Model table endpoints
//
// Reads go through the URL cache; every write clears it once the server
// confirms success. Reply bodies for writes are the bare words "saved" /
// "deleted" on success and an error dictionary otherwise.

use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use url::form_urlencoded;

use crate::error::{Error, RestErrorInfo};
use crate::store::client::StoreClient;
use crate::store::query::{Lookup, Query};
use crate::Row;

/// Convert a JSON reply into rows.
///
/// A JSON object carrying an error key is the server's error dictionary and
/// becomes `Error::Rest`; a lone object is treated as a single row.
pub fn rows_from_value(controller: &str, value: Value) -> Result<Vec<Row>, Error> {
    if let Some(info) = RestErrorInfo::from_value(controller, &value) {
        return Err(Error::Rest(info));
    }
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect()),
        Value::Object(row) => Ok(vec![row]),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::Deserialization {
            message: "expected a list of rows".into(),
            body: other.to_string(),
        }),
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Percent-encode one path segment; form encoding's `+` is literal in a path.
fn encode_path_segment(value: &str) -> String {
    encode(value).replace('+', "%20")
}

impl StoreClient {
    async fn rows(&self, url: &str) -> Result<Vec<Row>, Error> {
        let value = self.rest_json_request(url).await?;
        rows_from_value(&self.controller_label(), value)
    }

    /// Interpret a write reply: `success` word, JSON `{"description": success}`,
    /// or an error dictionary.
    fn check_write_reply(&self, reply: &str, success: &str) -> Result<(), Error> {
        if reply.trim() == success {
            self.cache().clear();
            return Ok(());
        }
        let value: Value = serde_json::from_str(reply).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: reply.to_owned(),
        })?;
        if value.get("description").and_then(Value::as_str) == Some(success) {
            self.cache().clear();
            return Ok(());
        }
        let info = RestErrorInfo::from_value(&self.controller_label(), &value)
            .unwrap_or_else(|| RestErrorInfo::Unknown(format!("Unexpected reply: {reply}")));
        Err(Error::Rest(info))
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Read a model table, optionally filtered on one field.
    ///
    /// `GET /rest/v1/model/<table>/?<key>__<lookup>=<val>`
    pub async fn get_table_from_store(
        &self,
        table: &str,
        filter: Option<(&str, &str)>,
        lookup: Lookup,
    ) -> Result<Vec<Row>, Error> {
        let mut url = self.model_url(table)?;
        if let Some((key, val)) = filter.filter(|(k, v)| !k.is_empty() && !v.is_empty()) {
            let query = Query::new().with(key, lookup, val);
            url = format!("{url}?{}", query.to_query_string());
        }
        self.rows(&url).await
    }

    /// Read one object by primary key.
    ///
    /// `GET /rest/v1/model/<table>/<pk>/`
    pub async fn get_object_from_store(&self, table: &str, pk: &str) -> Result<Row, Error> {
        let url = format!("{}{}/", self.model_url(table)?, encode_path_segment(pk));
        self.rows(&url).await?.into_iter().next().ok_or_else(|| {
            Error::Rest(RestErrorInfo::NotFound(format!("Not Found: {table} {pk}")))
        })
    }

    /// Exact-match read on one field.
    pub async fn find_object_from_store(
        &self,
        table: &str,
        key: &str,
        val: &str,
    ) -> Result<Vec<Row>, Error> {
        self.get_table_from_store(table, Some((key, val)), Lookup::Exact)
            .await
    }

    /// Generic multi-field query.
    pub async fn rest_query_objects(&self, table: &str, query: &Query) -> Result<Vec<Row>, Error> {
        let mut url = self.model_url(table)?;
        if !query.is_empty() {
            url = format!("{url}?{}", query.to_query_string());
        }
        self.rows(&url).await
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// `PUT /rest/v1/model/<table>/` with the object's fields.
    pub async fn rest_create_object(&self, table: &str, data: &Row) -> Result<(), Error> {
        let url = self.model_url(table)?;
        debug!(table, "creating object");
        let reply = self
            .rest_post_request(&url, &Value::Object(data.clone()), Method::PUT)
            .await?;
        self.check_write_reply(&reply, "saved")
    }

    /// `PUT /rest/v1/model/<table>/?<key>=<val>` with the changed fields.
    pub async fn rest_update_object(
        &self,
        table: &str,
        key: &str,
        val: &str,
        data: &Row,
    ) -> Result<(), Error> {
        let url = format!("{}?{}={}", self.model_url(table)?, key, encode(val));
        debug!(table, key, val, "updating object");
        let reply = self
            .rest_post_request(&url, &Value::Object(data.clone()), Method::PUT)
            .await?;
        self.check_write_reply(&reply, "saved")
    }

    /// `DELETE /rest/v1/model/<table>/?<key>__exact=<val>`
    pub async fn rest_delete_object(&self, table: &str, key: &str, val: &str) -> Result<(), Error> {
        let url = format!(
            "{}?{}",
            self.model_url(table)?,
            Query::new().exact(key, val).to_query_string()
        );
        debug!(table, key, val, "deleting object");
        let reply = self.rest_post_request(&url, &json!({}), Method::DELETE).await?;
        self.check_write_reply(&reply, "deleted")
    }

    /// Delete every row matching `query`.
    pub async fn rest_delete_objects(&self, table: &str, query: &Query) -> Result<(), Error> {
        let mut url = self.model_url(table)?;
        if !query.is_empty() {
            url = format!("{url}?{}", query.to_query_string());
        }
        let reply = self.rest_post_request(&url, &json!({}), Method::DELETE).await?;
        self.check_write_reply(&reply, "deleted")
    }

    // ── Text transfer ────────────────────────────────────────────────

    /// Fetch raw text from an http(s) URL, bypassing the cache.
    pub async fn get_text_from_url(&self, url: &str) -> Result<String, Error> {
        check_scheme(url)?;
        let text = self.rest_simple_request(url, false).await?;
        self.cache().reset_url(url);
        Ok(text)
    }

    /// `PUT` `text` to an http(s) URL as `text/plain`, returning the reply.
    pub async fn copy_text_to_url(&self, url: &str, text: &str) -> Result<String, Error> {
        check_scheme(url)?;
        let reply = self.send_text(Method::PUT, url, text).await?;
        self.cache().reset_url(url);
        Ok(reply)
    }
}

fn check_scheme(url: &str) -> Result<(), Error> {
    let parsed = url::Url::parse(url)?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::UnsupportedScheme(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_escape_key_separators() {
        assert_eq!(
            encode_path_segment("default|10|00:00:00:00:00:0a"),
            "default%7C10%7C00%3A00%3A00%3A00%3A00%3A0a"
        );
        assert_eq!(encode_path_segment("a b/c+d"), "a%20b%2Fc%2Bd");
    }
}
