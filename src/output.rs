pub mod file;
pub mod registry;
pub mod sink;

use crate::data::{header::Header, Buffer};
use crate::errors::Result;

pub use file::{FileFormat, OutputFile};
pub use registry::{OutputFormatCtor, OutputFormatRegistry};
pub use sink::{OutputSink, SharedBuffer};

/// One encode session for a particular file format.
///
/// Calls must follow `write_header`, any number of `write_buffer`, then
/// `write_end`, all from one thread.
pub trait OutputFormat: Send {
    fn format_name(&self) -> &str;

    fn write_header(&mut self, header: &Header) -> Result<()>;
    fn write_buffer(&mut self, buffer: Buffer) -> Result<()>;
    fn write_end(&mut self) -> Result<()>;
}
