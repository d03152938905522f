use std::sync::Arc;
use std::path::{Path, PathBuf};

use derive_more::From;

/// A generated variable: `{taxonomy}_{index}[_{value}]` bound to rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub name: Arc<str>,
    pub value: Arc<str>,
}

/// Rendered content destined for a path under the protocol's output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum RenderedArtifact {
    Variable(VariableBinding),
    File(FileArtifact),
}

impl VariableBinding {
    pub fn new(name: impl Into<Arc<str>>, value: impl Into<Arc<str>>) -> Self {
        VariableBinding { name: name.into(), value: value.into() }
    }
}

impl FileArtifact {
    /// Leading `/` is dropped: artifact paths are always relative.
    pub fn new(path: impl AsRef<Path>, content: impl Into<String>) -> Self {
        let path = path.as_ref();
        let path = path.strip_prefix("/").unwrap_or(path);
        FileArtifact { path: path.to_path_buf(), content: content.into() }
    }

    pub fn bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }
}

impl RenderedArtifact {
    pub fn as_file(&self) -> Option<&FileArtifact> {
        match self {
            RenderedArtifact::File(file) => Some(file),
            RenderedArtifact::Variable(_) => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableBinding> {
        match self {
            RenderedArtifact::Variable(var) => Some(var),
            RenderedArtifact::File(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_paths_are_relative() {
        let file = FileArtifact::new("/feeds/atom.xml", "<feed/>");
        assert_eq!(file.path, Path::new("feeds/atom.xml"));

        let artifact = RenderedArtifact::from(file);
        assert!(artifact.as_variable().is_none());
        assert_eq!(artifact.as_file().unwrap().bytes(), b"<feed/>");
    }
}
