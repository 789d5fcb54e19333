//! Core of the binedit framework: schema-described binary structures with
//! full round-trip editing.
//!
//! A byte buffer enters the codec guided by a schema and becomes a node
//! tree; the GUI consumes nodes through the binding contract, mutating
//! through each document's edit history; on save the codec reconciles
//! derived sizes and writes the tree back to exactly the declared layout.
//! The application's own preferences and themes are just two more schemas
//! (`formats`), carried across layout revisions by the version pipeline.

pub mod backup;
pub mod binding;
pub mod codec;
pub mod defaults;
pub mod document;
pub mod error;
pub mod formats;
pub mod history;
pub mod json;
pub mod node;
pub mod schema;
pub mod session;
pub mod value;
pub mod version;

pub use codec::{CodecOptions, ConstraintMode};
pub use document::Document;
pub use error::{Error, Result};
pub use node::Node;
pub use schema::Schema;
pub use session::Session;
pub use value::Value;
