use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Xml,
    Pbf,
    Opl,
}

impl FileFormat {
    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Xml => "xml",
            FileFormat::Pbf => "pbf",
            FileFormat::Opl => "opl",
        }
    }
}

/// Description of an output file: its format plus free-form string options.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputFile {
    format: FileFormat,
    #[serde(default)]
    options: HashMap<String, String>,
    #[serde(default)]
    has_multiple_object_versions: bool,
}

impl OutputFile {
    pub fn new(format: FileFormat) -> Self {
        OutputFile {
            format,
            options: HashMap::new(),
            has_multiple_object_versions: false,
        }
    }

    /// Derives the format from the file suffix.
    ///
    /// `.osc` selects the change format, `.osh` marks a history file.
    pub fn from_name(name: &str) -> Result<Self> {
        let suffix = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| Error::config(format!("Could not determine file format of '{name}'")))?;

        let file = match suffix {
            "osm" | "xml" => OutputFile::new(FileFormat::Xml),
            "osc" => OutputFile::new(FileFormat::Xml).with_option("xml_change_format", "true"),
            "osh" => OutputFile::new(FileFormat::Xml).with_multiple_object_versions(true),
            "pbf" => OutputFile::new(FileFormat::Pbf),
            "opl" => OutputFile::new(FileFormat::Opl),
            other => return Err(Error::config(format!("Unknown file suffix '{other}'"))),
        };
        Ok(file)
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_multiple_object_versions(mut self, value: bool) -> Self {
        self.has_multiple_object_versions = value;
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn is_true(&self, name: &str) -> bool {
        matches!(self.get(name), Some("true" | "yes"))
    }

    pub fn is_not_false(&self, name: &str) -> bool {
        !matches!(self.get(name), Some("false" | "no"))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn has_multiple_object_versions(&self) -> bool {
        self.has_multiple_object_versions
    }
}
