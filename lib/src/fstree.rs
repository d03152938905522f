use std::sync::Arc;
use std::path::Path;
use std::collections::VecDeque;
use std::{fs, fmt};

use rustc_hash::FxHashMap;

use crate::error::Result;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(pub(crate) usize);

/// A snapshot of a directory tree, taken once per build.
#[derive(Debug)]
pub struct FsTree {
    entries: Vec<Entry>,
    map: FxHashMap<Arc<Path>, EntryId>,
}

#[derive(Debug)]
pub struct Entry {
    pub id: EntryId,
    pub path: Arc<Path>,
    pub file_name: String,
    pub file_type: fs::FileType,
    pub parent: Option<EntryId>,
    pub children: Vec<EntryId>,
    pub depth: usize,
}

impl FsTree {
    /// Walks `root`, following links, with siblings in file-name order so
    /// that discovery order is stable from one build to the next.
    pub fn build<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let walker = jwalk::WalkDir::new(root)
            .follow_links(true)
            .sort(true);

        let mut tree = FsTree { entries: vec![], map: FxHashMap::default() };
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            tree.insert(entry);
        }

        if tree.entries.is_empty() {
            return err! {
                "file system tree discovery yielded zero files",
                "search root" => root.display(),
            }
        }

        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn root(&self) -> &Entry {
        &self[self.root_id()]
    }

    pub fn root_id(&self) -> EntryId {
        EntryId(0)
    }

    /// Looks up `path`, relative to `root` or to the tree's root.
    pub fn get<R, P>(&self, root: R, path: P) -> Option<&Entry>
        where R: Into<Option<EntryId>>, P: AsRef<Path>
    {
        let root = root.into().unwrap_or(self.root_id());
        let full_path = self[root].path.join(path.as_ref());
        self.map.get(&*full_path).map(|&id| &self[id])
    }

    /// Like [`FsTree::get()`] but only returns directories.
    pub fn get_dir<R, P>(&self, root: R, path: P) -> Option<&Entry>
        where R: Into<Option<EntryId>>, P: AsRef<Path>
    {
        self.get(root, path).filter(|e| e.file_type.is_dir())
    }

    pub fn iter_breadth_first(&self, root: EntryId) -> Bfs<'_> {
        let mut queue = VecDeque::new();
        queue.push_back(root);
        Bfs { tree: self, queue }
    }

    fn insert(&mut self, entry: jwalk::DirEntry<((), ())>) {
        let id = EntryId(self.entries.len());
        let parent = self.map.get(&*entry.parent_path).copied();
        let entry = Entry {
            id,
            path: Arc::from(entry.path().into_boxed_path()),
            file_type: entry.file_type,
            file_name: entry.file_name.to_string_lossy().into_owned(),
            parent,
            children: vec![],
            depth: entry.depth,
        };

        self.map.insert(entry.path.clone(), id);
        if let Some(parent) = parent {
            self.entries[parent.0].children.push(id);
        }

        self.entries.push(entry);
    }
}

impl Entry {
    /// File name up to the first `.`: `post_page.tpl.html` is `post_page`.
    pub fn file_stem(&self) -> &str {
        match self.file_name.split_once('.') {
            Some((left, _)) => left,
            None => &self.file_name,
        }
    }

    /// The last extension, if any.
    pub fn file_ext(&self) -> Option<&str> {
        self.file_name.rsplit_once('.').map(|(_, right)| right)
    }

    pub fn is_file(&self) -> bool {
        self.file_type.is_file()
    }

    /// Path relative to `other`. `self` must be super-path of `other`.
    pub fn path_relative_to(&self, other: &Entry) -> Option<&Path> {
        self.path.strip_prefix(&other.path).ok()
    }
}

pub struct Bfs<'a> {
    tree: &'a FsTree,
    queue: VecDeque<EntryId>,
}

impl Iterator for Bfs<'_> {
    type Item = EntryId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        self.queue.extend(self.tree[node].children.iter().copied());
        Some(node)
    }
}

impl<'a> Bfs<'a> {
    #[inline]
    pub fn entries(self) -> impl Iterator<Item = &'a Entry> {
        let tree = self.tree;
        self.map(move |id| &tree[id])
    }

    #[inline]
    pub fn files(self) -> impl Iterator<Item = &'a Entry> {
        self.entries().filter(|e| e.is_file())
    }
}

impl std::ops::Index<EntryId> for FsTree {
    type Output = Entry;

    fn index(&self, index: EntryId) -> &Self::Output {
        &self.entries[index.0]
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
