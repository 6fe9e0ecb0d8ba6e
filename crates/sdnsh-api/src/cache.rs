// Short-lived URL response cache
//
// Several lookups issued while resolving one command hit the same REST
// URLs (alias tables, switch lists). Entries age out a fixed time after
// they were saved; touching an entry does not extend it. Any successful
// write through the store client clears the whole cache.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{trace, warn};

/// Default entry lifetime.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(2);

/// A cached response body.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedBody {
    /// Raw reply text, as returned by the server.
    Text(String),
    /// Parsed JSON reply.
    Json(Value),
}

impl CachedBody {
    /// The body as text. JSON entries are re-serialized.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }

    /// The body as JSON. Text entries that fail to parse yield `None`.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Text(text) => serde_json::from_str(&text).ok(),
            Self::Json(value) => Some(value),
        }
    }
}

#[derive(Debug)]
struct Entry {
    body: CachedBody,
    expires: Instant,
}

/// URL → response cache with a fixed per-entry lifetime.
///
/// Interior mutability lets the cache sit behind `&self` inside a shared
/// session. Locks are never held across an `.await`.
#[derive(Debug)]
pub struct UrlCache {
    entries: RwLock<HashMap<String, Entry>>,
    max_age: Duration,
    recorder: Mutex<Option<BufWriter<File>>>,
}

impl Default for UrlCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE)
    }
}

impl UrlCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age,
            recorder: Mutex::new(None),
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Look up a live entry. Expired entries are dropped on the way out.
    pub fn get(&self, url: &str) -> Option<CachedBody> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(url) {
                None => return None,
                Some(entry) if entry.expires > Instant::now() => {
                    trace!(url, "cache hit");
                    return Some(entry.body.clone());
                }
                Some(_) => {}
            }
        }
        self.reset_url(url);
        None
    }

    pub fn get_text(&self, url: &str) -> Option<String> {
        self.get(url).map(CachedBody::into_text)
    }

    pub fn get_json(&self, url: &str) -> Option<Value> {
        self.get(url).and_then(CachedBody::into_json)
    }

    /// Store a response with the default lifetime.
    pub fn save(&self, url: &str, body: CachedBody) {
        self.save_with_age(url, body, self.max_age);
    }

    /// Store a response that expires `age` from now.
    pub fn save_with_age(&self, url: &str, body: CachedBody, age: Duration) {
        self.record_response(url, &body);
        let entry = Entry {
            body,
            expires: Instant::now() + age,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_owned(), entry);
    }

    /// Remove one URL from the cache.
    pub fn reset_url(&self, url: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url);
    }

    /// Discard every entry.
    pub fn clear(&self) {
        trace!("clearing url cache");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Recording ────────────────────────────────────────────────────

    /// Start (or with `None`, stop) recording saved responses to `path`.
    pub fn record(&self, path: Option<&Path>) -> std::io::Result<()> {
        let mut recorder = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut previous) = recorder.take() {
            previous.flush()?;
        }
        if let Some(path) = path {
            *recorder = Some(BufWriter::new(File::create(path)?));
        }
        Ok(())
    }

    /// Append a `COMMAND "<words>"` line. Words must already be quoted.
    pub fn command_finished(&self, quoted_words: &[String]) {
        self.write_record(&format!("COMMAND \"{}\"", quoted_words.join(" ")));
    }

    fn record_response(&self, url: &str, body: &CachedBody) {
        let line = match body {
            CachedBody::Text(text) => format!("REST {url} STR {text}"),
            CachedBody::Json(value) => format!("REST {url} JSON {value}"),
        };
        self.write_record(&line);
    }

    fn write_record(&self, line: &str) {
        let mut recorder = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(out) = recorder.as_mut() {
            if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
                warn!("url recording failed: {e}");
                *recorder = None;
            }
        }
    }
}
