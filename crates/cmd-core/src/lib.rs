//! Conway-Markdown (CMD) to HTML conversion.
//!
//! CMD documents carry their own replacement rules above a `%%%` delimiter.
//! Rules are written in a small declarative language: each rule names a
//! replacement class, an id, a queue position and class-specific attributes.
//! The [`RuleEngine`] compiles the standard rules and a document's rules into a
//! queue, then runs the document content through it.
//!
//! # Example
//!
//! ```
//! let html = cmd_core::cmd_to_html("## Hello\n\n*Emphasis*", "hello.cmd", false).unwrap();
//! assert!(html.contains("<h2>Hello</h2>"));
//! assert!(html.contains("<em>Emphasis</em>"));
//! ```

mod attributes;
mod document;
mod error;
mod idioms;
mod master;
pub mod pattern;
pub mod placeholder;
mod reference;
pub mod rule;
pub mod utilities;

pub use attributes::{build_attributes_sequence, escape_attribute_value_html};
pub use document::{
    STANDARD_RULES, cmd_to_html, extract_basename, extract_rules_and_content, extract_separator_normalised_cmd_name,
    make_clean_url,
};
pub use error::{ApplyError, ConvertError, LegislateError, LegislateErrorKind, LineRange};
pub use master::{RuleEngine, SYNTAX_HELP};
pub use reference::{Reference, ReferenceTable, UnrecognisedLabel};
pub use rule::{ApplyObserver, Rule, RuleClass, TracingObserver};

/// Version reported by the `CMD_VERSION` substitute keyword.
pub const CMD_VERSION: &str = env!("CARGO_PKG_VERSION");
