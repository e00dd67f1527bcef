use std::path::Path;

/// Selects the entries of a directory that a job should visit.
pub trait FileFilter: Send + Sync {
    fn accept(&self, path: &Path, is_dir: bool) -> bool;
}

impl<F> FileFilter for F
where
    F: Fn(&Path, bool) -> bool + Send + Sync,
{
    fn accept(&self, path: &Path, is_dir: bool) -> bool {
        self(path, is_dir)
    }
}

/// Accepts every entry
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FileFilter for AcceptAll {
    fn accept(&self, _path: &Path, _is_dir: bool) -> bool {
        true
    }
}

/// Accepts directories and files with one of the listed extensions.
///
/// Extensions compare case-insensitively and may be given with or without the
/// leading dot. An empty list, or `*`, accepts every file.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
    any: bool,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let any = extensions.is_empty() || extensions.iter().any(|e| e == "*");
        Self { extensions, any }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl FileFilter for ExtensionFilter {
    fn accept(&self, path: &Path, is_dir: bool) -> bool {
        if is_dir || self.any {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|e| self.extensions.contains(&e))
    }
}
