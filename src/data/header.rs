use std::collections::HashMap;

use super::osm::Bounds;

/// File-level metadata written before the first block.
#[derive(Debug, Clone, Default)]
pub struct Header {
    options: HashMap<String, String>,
    boxes: Vec<Bounds>,
}

impl Header {
    pub fn new() -> Self {
        Header::default()
    }

    /// Returns "" when the option is not set.
    pub fn get(&self, name: &str) -> &str {
        self.options.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.insert(name.into(), value.into());
    }

    pub fn add_box(&mut self, bounds: Bounds) {
        self.boxes.push(bounds);
    }

    pub fn boxes(&self) -> &[Bounds] {
        &self.boxes
    }
}
