use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Content type expected by MIRC receivers when the type is forced.
pub const FORCED_CONTENT_TYPE: &str = "application/x-mirc-dicom";

/// Content type for files the table does not know about.
pub const DEFAULT_CONTENT_TYPE: &str = "application/default";

static BUILTIN_PROPERTIES: &str = include_str!("../resources/content-types.properties");

static BUILTIN_TABLE: Lazy<Arc<ContentTypeTable>> =
    Lazy::new(|| Arc::new(ContentTypeTable::from_properties(BUILTIN_PROPERTIES)));

/// Extension to MIME type mapping, keyed by lower-case extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypeTable {
    types: HashMap<String, String>,
}

impl ContentTypeTable {
    /// The table shipped with the application
    pub fn builtin() -> Arc<ContentTypeTable> {
        BUILTIN_TABLE.clone()
    }

    /// Parse `ext=type` lines; blank lines and `#`/`!` comments are skipped.
    pub fn from_properties(text: &str) -> Self {
        let types = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .filter_map(|line| line.split_once(|c| c == '=' || c == ':'))
            .map(|(ext, ty)| (ext.trim().to_lowercase(), ty.trim().to_string()))
            .filter(|(ext, ty)| !ext.is_empty() && !ty.is_empty())
            .collect();
        Self { types }
    }

    /// Copy of this table with `overrides` layered on top
    pub fn with_overrides(&self, overrides: &HashMap<String, String>) -> Self {
        let mut types = self.types.clone();
        for (ext, ty) in overrides {
            types.insert(ext.trim_start_matches('.').to_lowercase(), ty.clone());
        }
        Self { types }
    }

    pub fn get(&self, extension: &str) -> Option<&str> {
        self.types.get(extension).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl From<HashMap<String, String>> for ContentTypeTable {
    fn from(map: HashMap<String, String>) -> Self {
        ContentTypeTable::default().with_overrides(&map)
    }
}

/// Chooses the `Content-Type` header for an HTTP upload.
#[derive(Debug, Clone)]
pub struct ContentTypeResolver {
    force: bool,
    table: Option<Arc<ContentTypeTable>>,
}

impl ContentTypeResolver {
    pub fn new(force: bool, table: Option<Arc<ContentTypeTable>>) -> Self {
        Self { force, table }
    }

    pub fn is_forced(&self) -> bool {
        self.force
    }

    /// Forced type, then table lookup by extension, then the default type.
    pub fn resolve(&self, file_name: &str) -> &str {
        if self.force {
            return FORCED_CONTENT_TYPE;
        }
        self.table
            .as_deref()
            .and_then(|table| table.get(&extension_of(file_name)))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Text after the last `.`, lower-cased; the whole name when there is no dot.
fn extension_of(file_name: &str) -> String {
    let ext = match file_name.rfind('.') {
        Some(k) => &file_name[k + 1..],
        None => file_name,
    };
    ext.to_lowercase()
}
