use std::path::Path;

use stencil::err;
use stencil::error::{Kind, Result};
use stencil::fstree::{EntryId, FsTree};

/// Dot files and `_`-prefixed files are never content, templates, or assets.
pub fn hidden(file_name: &str) -> bool {
    file_name.starts_with('.') || file_name.starts_with('_')
}

#[track_caller]
pub fn dircheck<P: AsRef<Path>>(
    tree: &FsTree,
    root: Option<EntryId>,
    path: P,
    must_exist: bool,
) -> Result<Option<EntryId>> {
    let path = path.as_ref();
    match (tree.get(root, path), must_exist) {
        (Some(e), _) if e.file_type.is_dir() => Ok(Some(e.id)),
        (None, false) => Ok(None),
        (Some(e), _) => err! {
            [Kind::Config] format!("{} must be a directory", e.file_name),
            "path is not a directory" => e.path.display(),
        },
        (None, true) => err! {
            [Kind::Config] format!("{} must point to an existing directory", path.display()),
            "path does not exist" => tree.root().path.join(path).display(),
        },
    }
}

/// Like [`dircheck()`] with `must_exist`, returning the directory's id.
#[track_caller]
pub fn required_dir<P: AsRef<Path>>(tree: &FsTree, root: Option<EntryId>, path: P) -> Result<EntryId> {
    let path = path.as_ref();
    match dircheck(tree, root, path, true)? {
        Some(id) => Ok(id),
        None => err!([Kind::Config] "required directory is missing", "path" => path.display()),
    }
}

/// A project directory holding `files`, for tests.
#[cfg(test)]
pub fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, contents) in files {
        let path = dir.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    dir
}
