// Store client for the controller's REST model API
//
// `client` holds the transport mechanics (URL construction, caching,
// status mapping); `table` adds the model CRUD operations and text
// transfer on top as inherent methods.

mod client;
mod query;
mod table;

pub use client::StoreClient;
pub use query::{Lookup, Query, Term};
pub use table::rows_from_value;
