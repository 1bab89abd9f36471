//! xmlstream - Streaming XML to ordered key-value trees
//!
//! Converts a forward-only stream of XML parse events into nested,
//! insertion-ordered key-value trees, delivered one top-level element at
//! a time, without holding the whole document in memory as a DOM.
//!
//! Each delivered element is an object with a single key (the tag name)
//! whose value carries `attributes`, `name`, one key per distinct child
//! element name, and `value` for text content. A child name repeated
//! under the same parent becomes a list on its second occurrence.
//!
//! By default the first top-level element is skipped, so a single-rooted
//! document delivers the root's children one by one.
//!
//! # Quick Start
//!
//! ```
//! use xmlstream::{from_str, Value};
//! # fn main() -> Result<(), xmlstream::Error> {
//! let entries = from_str(r#"<feed><entry id="1">hello</entry></feed>"#)?;
//! let body = entries[0]
//!     .as_object()
//!     .and_then(|element| element.get("entry"))
//!     .and_then(Value::as_object);
//! let text = body
//!     .and_then(|body| body.get("value"))
//!     .and_then(Value::as_string)
//!     .unwrap_or_default();
//! assert_eq!(text, "hello");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod cursor;
pub use cursor::{Cursor, NodeKind};

pub mod error;
pub use error::{Error, ErrorKind, Pos, Result, Span};

pub mod escape;

pub mod reader;
pub use reader::Reader;

pub mod stream;
pub use stream::StreamParser;

pub mod value;
pub use value::{Array, Object, Value};

use tracing::{debug, instrument};

/// Parse XML from a string with the default filters and collect every
/// delivered element
pub fn from_str(s: &str) -> Result<Vec<Value>> {
    StreamParser::new(Reader::from_str(s)).collect_all()
}

/// Parse an XML file with the default filters and collect every
/// delivered element
#[instrument]
pub fn from_path(path: &str) -> Result<Vec<Value>> {
    debug!("opening xml stream");
    let reader = Reader::open(path)?;
    let elements = StreamParser::new(reader).collect_all()?;
    debug!(count = elements.len(), "stream drained");
    Ok(elements)
}
