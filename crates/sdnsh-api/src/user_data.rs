// Versioned user-data blobs
//
// Saved configurations and other text blobs live under `/rest/v1/data/`.
// Each stored blob is addressed by a self-describing id,
// `<name>/timestamp=<UTC>/version=<n>/length=<bytes>`, and a name may have
// many versions. New versions are numbered max+1 over the existing ones.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Timelike, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Error, RestErrorInfo};
use crate::store::{Query, StoreClient};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d.%H:%M:%S";

/// Parsed user-data identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobId {
    pub name: String,
    pub timestamp: NaiveDateTime,
    pub version: u32,
    pub length: usize,
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/timestamp={}/version={}/length={}",
            self.name,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.version,
            self.length
        )
    }
}

impl FromStr for BlobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidBlobId {
            id: s.to_owned(),
            reason: reason.to_owned(),
        };

        let mut parts = s.trim_end_matches('/').split('/');
        let name = parts.next().filter(|n| !n.is_empty()).ok_or_else(|| invalid("empty name"))?;

        let mut attrs = HashMap::new();
        for part in parts {
            let (k, v) = part
                .split_once('=')
                .ok_or_else(|| invalid("expected key=value"))?;
            attrs.insert(k, v);
        }

        let timestamp = attrs
            .get("timestamp")
            .ok_or_else(|| invalid("missing timestamp"))
            .and_then(|t| {
                NaiveDateTime::parse_from_str(t, TIMESTAMP_FORMAT)
                    .map_err(|e| invalid(&format!("bad timestamp: {e}")))
            })?;
        let version = attrs
            .get("version")
            .ok_or_else(|| invalid("missing version"))
            .and_then(|v| v.parse().map_err(|_| invalid("version is not an integer")))?;
        let length = attrs
            .get("length")
            .ok_or_else(|| invalid("missing length"))
            .and_then(|v| v.parse().map_err(|_| invalid("length is not an integer")))?;

        Ok(Self {
            name: name.to_owned(),
            timestamp,
            version,
            length,
        })
    }
}

/// Which versions of a name a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionSelector {
    #[default]
    Latest,
    All,
    Version(u32),
}

impl FromStr for VersionSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            "all" => Ok(Self::All),
            n => n
                .parse()
                .map(Self::Version)
                .map_err(|_| format!("expected 'latest', 'all' or a version number, got '{n}'")),
        }
    }
}

/// One row of a user-data listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDataEntry {
    pub id: BlobId,
    /// The id exactly as the server reported it.
    pub full_name: String,
}

impl UserDataEntry {
    pub fn name(&self) -> &str {
        &self.id.name
    }
}

/// Apply name-prefix and version selection to a listing.
fn select_versions(
    entries: Vec<UserDataEntry>,
    name: Option<&str>,
    selector: VersionSelector,
) -> Vec<UserDataEntry> {
    let mut latest: HashMap<String, u32> = HashMap::new();
    for entry in &entries {
        let v = latest.entry(entry.id.name.clone()).or_insert(entry.id.version);
        *v = (*v).max(entry.id.version);
    }

    entries
        .into_iter()
        .filter(|e| name.is_none_or(|n| e.id.name.starts_with(n)))
        .filter(|e| match selector {
            VersionSelector::All => true,
            VersionSelector::Latest => latest.get(&e.id.name) == Some(&e.id.version),
            VersionSelector::Version(v) => e.id.version == v,
        })
        .collect()
}

impl StoreClient {
    async fn list_user_data(&self, name: Option<&str>, use_cache: bool) -> Result<Vec<UserDataEntry>, Error> {
        let mut url = self.user_data_url()?;
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            url = format!("{url}?{}", Query::new().startswith("name", name).to_query_string());
        }
        let text = self.rest_simple_request(&url, use_cache).await?;
        let rows: Vec<Value> = serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.clone(),
        })?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(full_name) = row.get("name").and_then(Value::as_str) else {
                continue;
            };
            match full_name.parse::<BlobId>() {
                Ok(id) => entries.push(UserDataEntry {
                    id,
                    full_name: full_name.to_owned(),
                }),
                Err(e) => warn!("skipping user data entry: {e}"),
            }
        }
        Ok(entries)
    }

    /// List stored blobs whose name starts with `name`.
    ///
    /// `GET /rest/v1/data/?name__startswith=<name>`
    pub async fn get_user_data_table(
        &self,
        name: Option<&str>,
        selector: VersionSelector,
    ) -> Result<Vec<UserDataEntry>, Error> {
        let entries = self.list_user_data(name, true).await?;
        Ok(select_versions(entries, name, selector))
    }

    /// Fetch a blob's text by its full id (or bare name, if the server
    /// resolves it).
    pub async fn get_user_data_file(&self, name: &str) -> Result<String, Error> {
        let url = format!("{}{}/", self.user_data_url()?, name.trim_end_matches('/'));
        self.rest_simple_request(&url, true).await
    }

    pub async fn delete_user_data_file(&self, name: &str) -> Result<(), Error> {
        let url = format!("{}{}/", self.user_data_url()?, name.trim_end_matches('/'));
        let reply = self.rest_post_request(&url, &json!({}), Method::DELETE).await?;
        if reply.trim() == "deleted" {
            self.cache().clear();
            return Ok(());
        }
        let value: Value = serde_json::from_str(&reply).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: reply.clone(),
        })?;
        let info = RestErrorInfo::from_value(&self.controller_label(), &value)
            .unwrap_or_else(|| RestErrorInfo::Unknown(format!("Unexpected reply: {reply}")));
        Err(Error::Rest(info))
    }

    /// Store `text` as the next version of `name`.
    ///
    /// The version is chosen from an uncached listing, and the listing is
    /// re-read after the write: if another writer stored the same version
    /// in the meantime the call fails with `Error::VersionConflict`.
    pub async fn set_user_data_file(&self, name: &str, text: &str) -> Result<BlobId, Error> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidBlobId {
                id: name.to_owned(),
                reason: "name must be non-empty and must not contain '/'".into(),
            });
        }

        let existing = self.list_user_data(Some(name), false).await?;
        let version = existing
            .iter()
            .filter(|e| e.id.name == name)
            .map(|e| e.id.version)
            .max()
            .map_or(1, |v| v + 1);

        let now = Utc::now().naive_utc();
        let id = BlobId {
            name: name.to_owned(),
            timestamp: now.with_nanosecond(0).unwrap_or(now),
            version,
            length: text.len(),
        };
        debug!(%id, "storing user data");

        let url = format!("{}{id}/", self.user_data_url()?);
        self.copy_text_to_url(&url, text).await?;
        self.cache().clear();

        let stored = self.list_user_data(Some(name), false).await?;
        let same_version = stored
            .iter()
            .filter(|e| e.id.name == name && e.id.version == version)
            .count();
        if same_version > 1 {
            return Err(Error::VersionConflict {
                name: name.to_owned(),
                version,
            });
        }
        Ok(id)
    }
}
