// Entry tree: the volume contents as an arena of entries addressed by
// stable index. Entry 0 is the unnamed root directory.

use crate::fat_common::attributes::*;
use crate::fat_common::constants::MAX_LFN_LENGTH;
use chrono::{DateTime, Utc};
use log::debug;
use mkfat_core::{ContentSource, MkfatError};
use std::collections::HashMap;
use std::fmt;

/// Stable index of an entry in its [`EntryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl EntryId {
    pub const ROOT: EntryId = EntryId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub enum EntryKind {
    Directory,
    File(Box<dyn ContentSource>),
    /// Already resolved to a non-link target.
    Link(EntryId),
}

impl fmt::Debug for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Directory => write!(f, "Directory"),
            EntryKind::File(_) => write!(f, "File"),
            EntryKind::Link(target) => write!(f, "Link({})", target),
        }
    }
}

/// Optional per-entry metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMeta {
    pub mtime: Option<DateTime<Utc>>,
    pub read_only: bool,
    pub hidden: bool,
    pub system: bool,
    pub archive: bool,
}

impl EntryMeta {
    pub fn with_mtime(mtime: DateTime<Utc>) -> Self {
        Self { mtime: Some(mtime), ..Default::default() }
    }

    /// Attribute bits other than the directory flag.
    pub fn attribute_bits(&self) -> u8 {
        let mut attr = 0;
        if self.read_only {
            attr |= ATTR_READ_ONLY;
        }
        if self.hidden {
            attr |= ATTR_HIDDEN;
        }
        if self.system {
            attr |= ATTR_SYSTEM;
        }
        if self.archive {
            attr |= ATTR_ARCHIVE;
        }
        attr
    }
}

#[derive(Debug)]
pub struct Entry {
    name: String,
    path: String,
    parent: Option<EntryId>,
    kind: EntryKind,
    children: Vec<EntryId>,
    meta: EntryMeta,
}

impl Entry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path as declared.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Children in insertion order, which is also the on-disk order.
    pub fn children(&self) -> &[EntryId] {
        &self.children
    }

    pub fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, EntryKind::Link(_))
    }
}

/// Arena of entries plus a path index used for parent lookup and link
/// resolution. Paths compare case-insensitively.
#[derive(Debug)]
pub struct EntryTree {
    entries: Vec<Entry>,
    index: HashMap<String, EntryId>,
}

impl Default for EntryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryTree {
    pub fn new() -> Self {
        let root = Entry {
            name: String::new(),
            path: "/".to_string(),
            parent: None,
            kind: EntryKind::Directory,
            children: Vec::new(),
            meta: EntryMeta::default(),
        };
        let mut index = HashMap::new();
        index.insert("/".to_string(), EntryId::ROOT);
        Self { entries: vec![root], index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing besides the root has been declared.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    pub fn get(&self, id: EntryId) -> &Entry {
        &self.entries[id.0]
    }

    /// All entries in declaration order, root first.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &Entry)> {
        self.entries.iter().enumerate().map(|(i, e)| (EntryId(i), e))
    }

    pub fn lookup(&self, path: &str) -> Option<EntryId> {
        let components = split_path(path).ok()?;
        self.index.get(&index_key(&components)).copied()
    }

    /// The entry a link stands for; any other entry is its own target.
    pub fn resolve(&self, id: EntryId) -> EntryId {
        match self.entries[id.0].kind {
            EntryKind::Link(target) => target,
            _ => id,
        }
    }

    /// Whether the entry (or a link's target) is a directory.
    pub fn is_directory_like(&self, id: EntryId) -> bool {
        self.get(self.resolve(id)).is_directory()
    }

    pub fn add_directory(&mut self, path: &str) -> Result<EntryId, MkfatError> {
        self.add_directory_with(path, EntryMeta::default())
    }

    pub fn add_directory_with(&mut self, path: &str, meta: EntryMeta) -> Result<EntryId, MkfatError> {
        let (parent, name) = self.parent_of(path)?;
        self.insert(parent, name, EntryKind::Directory, meta)
    }

    pub fn add_file<S>(&mut self, path: &str, source: S) -> Result<EntryId, MkfatError>
    where
        S: ContentSource + 'static,
    {
        self.add_file_with(path, source, EntryMeta::default())
    }

    pub fn add_file_with<S>(&mut self, path: &str, source: S, meta: EntryMeta) -> Result<EntryId, MkfatError>
    where
        S: ContentSource + 'static,
    {
        let (parent, name) = self.parent_of(path)?;
        self.insert(parent, name, EntryKind::File(Box::new(source)), meta)
    }

    /// Declare a link to an absolute `target` path that must already exist.
    pub fn add_link(&mut self, path: &str, target: &str) -> Result<EntryId, MkfatError> {
        self.add_link_with(path, target, EntryMeta::default())
    }

    pub fn add_link_with(&mut self, path: &str, target: &str, meta: EntryMeta) -> Result<EntryId, MkfatError> {
        let (parent, name) = self.parent_of(path)?;
        let target_id = self.resolve_link_target(path, target)?;
        self.insert(parent, name, EntryKind::Link(target_id), meta)
    }

    /// Tree-builder view positioned at the root directory.
    pub fn root(&mut self) -> DirectoryBuilder<'_> {
        DirectoryBuilder { tree: self, dir: EntryId::ROOT }
    }

    /// Tree-builder view positioned at an existing directory.
    pub fn directory_at(&mut self, path: &str) -> Result<DirectoryBuilder<'_>, MkfatError> {
        match self.lookup(path) {
            Some(id) if self.get(id).is_directory() => Ok(DirectoryBuilder { tree: self, dir: id }),
            _ => Err(MkfatError::MissingParent(path.to_string())),
        }
    }

    fn resolve_link_target(&self, link: &str, target: &str) -> Result<EntryId, MkfatError> {
        let unresolved = || MkfatError::UnresolvedLinkTarget {
            link: link.to_string(),
            target: target.to_string(),
        };
        match self.lookup(target) {
            Some(EntryId::ROOT) | None => Err(unresolved()),
            Some(id) => Ok(self.resolve(id)),
        }
    }

    fn parent_of<'p>(&self, path: &'p str) -> Result<(EntryId, &'p str), MkfatError> {
        let components = split_path(path)?;
        let (name, parents) = components
            .split_last()
            .ok_or_else(|| MkfatError::InvalidName(format!("'{}' names the root directory", path)))?;

        match self.index.get(&index_key(parents)) {
            Some(&id) if self.get(id).is_directory() => Ok((id, *name)),
            _ => Err(MkfatError::MissingParent(format!("/{}", parents.join("/")))),
        }
    }

    fn insert(
        &mut self,
        parent: EntryId,
        name: &str,
        kind: EntryKind,
        meta: EntryMeta,
    ) -> Result<EntryId, MkfatError> {
        validate_name(name)?;

        let parent_path = &self.entries[parent.0].path;
        let path = if parent == EntryId::ROOT {
            format!("/{}", name)
        } else {
            format!("{}/{}", parent_path, name)
        };
        let key = path.to_lowercase();
        if self.index.contains_key(&key) {
            return Err(MkfatError::DuplicateEntry(path));
        }

        let id = EntryId(self.entries.len());
        debug!("Declared {} {:?} as {}", path, kind, id);
        self.entries.push(Entry {
            name: name.to_string(),
            path,
            parent: Some(parent),
            kind,
            children: Vec::new(),
            meta,
        });
        self.entries[parent.0].children.push(id);
        self.index.insert(key, id);
        Ok(id)
    }
}

/// Insertion target for the tree-builder API. Each directory call returns a
/// builder for the new directory; the parent builder stays usable afterwards.
pub struct DirectoryBuilder<'t> {
    tree: &'t mut EntryTree,
    dir: EntryId,
}

impl<'t> DirectoryBuilder<'t> {
    pub fn id(&self) -> EntryId {
        self.dir
    }

    pub fn directory(&mut self, name: &str) -> Result<DirectoryBuilder<'_>, MkfatError> {
        self.directory_with(name, EntryMeta::default())
    }

    pub fn directory_with(&mut self, name: &str, meta: EntryMeta) -> Result<DirectoryBuilder<'_>, MkfatError> {
        let dir = self.tree.insert(self.dir, name, EntryKind::Directory, meta)?;
        Ok(DirectoryBuilder { tree: &mut *self.tree, dir })
    }

    pub fn file<S>(&mut self, name: &str, source: S) -> Result<EntryId, MkfatError>
    where
        S: ContentSource + 'static,
    {
        self.file_with(name, source, EntryMeta::default())
    }

    pub fn file_with<S>(&mut self, name: &str, source: S, meta: EntryMeta) -> Result<EntryId, MkfatError>
    where
        S: ContentSource + 'static,
    {
        self.tree.insert(self.dir, name, EntryKind::File(Box::new(source)), meta)
    }

    /// Link `name` in this directory to the absolute path `target`.
    pub fn link(&mut self, name: &str, target: &str) -> Result<EntryId, MkfatError> {
        let link_path = format!("{}/{}", self.tree.get(self.dir).path.trim_end_matches('/'), name);
        let target = self.tree.resolve_link_target(&link_path, target)?;
        self.tree.insert(self.dir, name, EntryKind::Link(target), EntryMeta::default())
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, MkfatError> {
    if !path.starts_with('/') {
        return Err(MkfatError::InvalidName(format!("'{}' is not an absolute path", path)));
    }
    Ok(path.split('/').filter(|c| !c.is_empty()).collect())
}

fn index_key(components: &[&str]) -> String {
    format!("/{}", components.join("/")).to_lowercase()
}

fn validate_name(name: &str) -> Result<(), MkfatError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(MkfatError::InvalidName(format!("'{}' is not a valid entry name", name)));
    }
    if name.encode_utf16().count() > MAX_LFN_LENGTH {
        return Err(MkfatError::InvalidName(format!(
            "'{}' is longer than {} characters",
            name, MAX_LFN_LENGTH
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|&c| c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
    {
        return Err(MkfatError::InvalidName(format!("'{}' contains {:?}", name, c)));
    }
    Ok(())
}
