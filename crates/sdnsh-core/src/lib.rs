// sdnsh-core: Runtime services between the command grammar and the controller store.
//
// Every operation hangs off a `Session`: REST queries and their reshaping,
// alias resolution, tab completion, argument validation and data handlers,
// table rendering and running-config synthesis.

pub mod alias;
pub mod complete;
pub mod config;
pub mod error;
pub mod format;
pub mod handlers;
pub mod key;
pub mod model;
pub mod query;
pub mod running_config;
pub mod session;
pub mod util;
pub mod validate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use alias::{AliasCache, AliasFamilies, AliasFamily};
pub use complete::{CompletionRequest, Completions, OtherSpec, Scope};
pub use config::SessionConfig;
pub use error::CoreError;
pub use format::{FormatRegistry, Formatter, GraphSize};
pub use key::{CompoundKey, SEPARATOR};
pub use model::{Catalog, ModelRegistry};
pub use running_config::Section;
pub use session::Session;
pub use validate::{EnumMatch, Typedef};

// Store-level types callers need alongside the session.
pub use sdnsh_api::{Lookup, Row};
