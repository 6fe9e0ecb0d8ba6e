// sdnsh-api: Async client for the controller's REST model store

pub mod cache;
pub mod error;
pub mod store;
pub mod transport;
pub mod user_data;

pub use cache::{CachedBody, UrlCache};
pub use error::{Error, RestErrorInfo};
pub use store::{Lookup, Query, StoreClient};
pub use transport::{RetryPolicy, TlsMode, TransportConfig};
pub use user_data::{BlobId, UserDataEntry, VersionSelector};

/// A single store row: field name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;
