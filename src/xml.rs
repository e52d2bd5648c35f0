//! OSM XML (`.osm`, `.osc`, `.osh`) output.
//!
//! Buffers are encoded on the worker pool in parallel and written in the order
//! they were submitted.

pub mod block;
pub mod escape;
pub mod format;
pub mod options;
pub mod output_format;

pub use block::{encode_buffer, XmlOutputBlock};
pub use options::XmlOutputOptions;
pub use output_format::{StreamState, XmlOutputFormat};
