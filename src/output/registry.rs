use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::errors::{Error, Result};
use crate::worker::Pool;
use crate::xml::XmlOutputFormat;

use super::{FileFormat, OutputFile, OutputFormat, OutputSink};

pub type OutputFormatCtor =
    fn(&OutputFile, Arc<Pool>, Box<dyn OutputSink>) -> Result<Box<dyn OutputFormat>>;

/// Maps file formats to the constructor of their output format.
///
/// Built once by the caller and passed to wherever outputs are opened.
#[derive(Default)]
pub struct OutputFormatRegistry {
    ctors: HashMap<FileFormat, OutputFormatCtor>,
}

impl OutputFormatRegistry {
    pub fn new() -> Self {
        OutputFormatRegistry::default()
    }

    /// Registry knowing every output format this crate implements.
    pub fn with_defaults() -> Self {
        let mut registry = OutputFormatRegistry::new();
        registry.register(FileFormat::Xml, create_xml_output);
        registry
    }

    /// Returns false when the format already had a constructor, which is replaced.
    pub fn register(&mut self, format: FileFormat, ctor: OutputFormatCtor) -> bool {
        self.ctors.insert(format, ctor).is_none()
    }

    pub fn is_registered(&self, format: FileFormat) -> bool {
        self.ctors.contains_key(&format)
    }

    pub fn create(
        &self,
        file: &OutputFile,
        pool: Arc<Pool>,
        sink: Box<dyn OutputSink>,
    ) -> Result<Box<dyn OutputFormat>> {
        let ctor = self.ctors.get(&file.format()).ok_or_else(|| {
            Error::config(format!(
                "Support for output format '{}' not compiled into this binary",
                file.format().name()
            ))
        })?;
        debug!(format = file.format().name(); "Creating output format");
        ctor(file, pool, sink)
    }
}

fn create_xml_output(
    file: &OutputFile,
    pool: Arc<Pool>,
    sink: Box<dyn OutputSink>,
) -> Result<Box<dyn OutputFormat>> {
    Ok(Box::new(XmlOutputFormat::new(file, pool, sink)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::header::Header;
    use crate::errors::ErrorKind;
    use crate::output::SharedBuffer;

    #[test]
    fn xml_is_registered_by_default() {
        let registry = OutputFormatRegistry::with_defaults();
        assert!(registry.is_registered(FileFormat::Xml));
        assert!(!registry.is_registered(FileFormat::Pbf));
    }

    #[test]
    fn unregistered_formats_are_rejected() {
        let registry = OutputFormatRegistry::with_defaults();
        let pool = Arc::new(Pool::new(1).unwrap());
        let err = registry
            .create(
                &OutputFile::new(FileFormat::Opl),
                pool,
                Box::new(SharedBuffer::new()),
            )
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::Config);
        assert!(err.message.contains("opl"));
    }

    #[test]
    fn created_output_writes_through_the_sink() {
        let registry = OutputFormatRegistry::with_defaults();
        let pool = Arc::new(Pool::new(2).unwrap());
        let buffer = SharedBuffer::new();
        let mut output = registry
            .create(&OutputFile::new(FileFormat::Xml), pool, Box::new(buffer.clone()))
            .unwrap();
        assert_eq!(output.format_name(), "xml");
        output.write_header(&Header::new()).unwrap();
        output.write_end().unwrap();
        assert!(buffer.contents().ends_with("</osm>\n"));
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = OutputFormatRegistry::new();
        assert!(registry.register(FileFormat::Xml, create_xml_output));
        assert!(!registry.register(FileFormat::Xml, create_xml_output));
    }
}
