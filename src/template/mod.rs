//! Template expansion engine
//!
//! Templates are strings with `{...}` references. A reference names a
//! context variable, optionally piped through transform functions:
//! `{id | asInt}`, `{label | autoCV('crops', 'hash')}`. URI templates are
//! wrapped in `<...>` and support a small set of identifier strategies
//! (`<row>`, `<uuid>`, `<parent>`, `<hash(...)>`) plus CURIEs.

pub mod context;
pub mod error;
pub mod expand;
pub mod pattern;
pub mod uri;
pub mod value;

pub use context::{vars, Context};
pub use error::{MapError, MapResult};
pub use expand::{value_expand, Expansion};
pub use pattern::{normalize, pattern_expand, valueof_var};
pub use uri::{expand_curie, hash_digest, uri_expand};
pub use value::{Record, Value};
