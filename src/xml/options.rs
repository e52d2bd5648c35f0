use crate::output::OutputFile;

/// Session-wide settings, fixed when the output is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XmlOutputOptions {
    /// Write version, timestamp, author and changeset of objects.
    pub add_metadata: bool,

    /// Write `visible="true|false"` on every object.
    pub add_visible_flag: bool,

    /// Group objects under `<create>`, `<modify>` and `<delete>` (.osc files).
    pub use_change_ops: bool,
}

impl XmlOutputOptions {
    /// The visible flag is never combined with change operations, the
    /// operation already says whether an object was deleted.
    pub fn from_file(file: &OutputFile) -> Self {
        let add_metadata = file.is_not_false("add_metadata");
        let use_change_ops = file.is_true("xml_change_format");
        let add_visible_flag = (file.has_multiple_object_versions()
            || file.is_true("force_visible_flag"))
            && !use_change_ops;

        XmlOutputOptions {
            add_metadata,
            add_visible_flag,
            use_change_ops,
        }
    }

    pub(crate) fn prefix_spaces(&self) -> usize {
        if self.use_change_ops {
            4
        } else {
            2
        }
    }
}
