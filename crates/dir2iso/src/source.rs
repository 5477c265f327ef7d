//! Sources of directory trees to be written into an image.
//!
//! The writer only depends on [`DirectorySource`]. Two implementations are
//! provided: [`HostDirectory`], backed by the host filesystem, and
//! [`MemoryDirectory`], built up in memory.

use crate::{date::IsoDate, prelude::*};
use std::{
  io::Read,
  path::{Path, PathBuf},
  sync::Arc,
};

/// Represents the content of a file, either from the filesystem or in-memory.
#[derive(Debug, Clone)]
pub enum FileContent {
  /// File backed by an actual file on the host filesystem. Opened only while
  /// its content is being copied.
  Path(PathBuf),
  /// File with content stored directly in memory.
  InMemory(Arc<[u8]>),
}

impl FileContent {
  pub fn open(&self) -> Result<Box<dyn Read + '_>> {
    match self {
      FileContent::Path(path) => {
        let handle = std::fs::File::open(path).map_err(|e| Error::source_read(path, e))?;
        Ok(Box::new(handle))
      }
      FileContent::InMemory(data) => Ok(Box::new(&data[..])),
    }
  }

  pub fn host_path(&self) -> Option<&Path> {
    match self {
      FileContent::Path(path) => Some(path),
      FileContent::InMemory(_) => None,
    }
  }
}

impl From<Vec<u8>> for FileContent {
  fn from(vec: Vec<u8>) -> Self {
    FileContent::InMemory(vec.into())
  }
}

/// One child of a source directory.
pub struct SourceEntry {
  pub name: String,
  pub created: IsoDate,
  pub kind: SourceEntryKind,
}

pub enum SourceEntryKind {
  File { length: u64, content: FileContent },
  Directory(Box<dyn DirectorySource>),
}

impl std::fmt::Debug for SourceEntry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut s = f.debug_struct("SourceEntry");
    s.field("name", &self.name).field("created", &self.created);
    match &self.kind {
      SourceEntryKind::File { length, .. } => s.field("length", length),
      SourceEntryKind::Directory(_) => s.field("directory", &true),
    };
    s.finish()
  }
}

/// A directory whose children can be enumerated.
pub trait DirectorySource: Send {
  fn creation_date(&self) -> Result<IsoDate>;

  /// Lists the immediate children. No particular order is required.
  fn entries(&self) -> Result<Vec<SourceEntry>>;
}

/// A directory on the host filesystem.
#[derive(Debug, Clone)]
pub struct HostDirectory {
  path: PathBuf,
}

impl HostDirectory {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

fn creation_date_of(metadata: &std::fs::Metadata) -> IsoDate {
  // Not every platform records birth time.
  match metadata.created().or_else(|_| metadata.modified()) {
    Ok(time) => chrono::DateTime::<chrono::Local>::from(time).into(),
    Err(_) => IsoDate::no_date(),
  }
}

impl DirectorySource for HostDirectory {
  fn creation_date(&self) -> Result<IsoDate> {
    let metadata = std::fs::metadata(&self.path).map_err(|e| Error::source_read(&self.path, e))?;
    Ok(creation_date_of(&metadata))
  }

  fn entries(&self) -> Result<Vec<SourceEntry>> {
    let mut entries = vec![];

    let walker = walkdir::WalkDir::new(&self.path)
      .min_depth(1)
      .max_depth(1)
      .follow_links(false)
      .sort_by_file_name();

    for entry in walker {
      let entry = entry.map_err(|e| match e.path().map(Path::to_path_buf) {
        Some(path) => Error::source_read(path, e.into()),
        None => Error::WalkDir(e),
      })?;
      let metadata = entry
        .metadata()
        .map_err(|e| Error::source_read(entry.path(), e.into()))?;
      let name = entry.file_name().to_string_lossy().into_owned();
      let created = creation_date_of(&metadata);

      let kind = if metadata.is_dir() {
        SourceEntryKind::Directory(Box::new(HostDirectory::new(entry.path())))
      } else if metadata.is_file() {
        SourceEntryKind::File {
          length: metadata.len(),
          content: FileContent::Path(entry.path().to_path_buf()),
        }
      } else {
        log::warn!("Skipping {}: not a regular file or directory", entry.path().display());
        continue;
      };

      entries.push(SourceEntry {
        name,
        created,
        kind,
      });
    }

    Ok(entries)
  }
}

#[derive(Debug, Clone)]
enum MemoryEntry {
  File {
    name: String,
    created: IsoDate,
    length: u64,
    content: FileContent,
  },
  Directory {
    name: String,
    directory: MemoryDirectory,
  },
}

/// A directory tree held in memory.
///
/// ```
/// use dir2iso::source::MemoryDirectory;
/// use dir2iso::date::IsoDate;
///
/// let root = MemoryDirectory::new(IsoDate::no_date())
///   .with_file("hello.txt", IsoDate::no_date(), b"hello".to_vec())
///   .with_directory("docs", MemoryDirectory::new(IsoDate::no_date()));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
  created: IsoDate,
  entries: Vec<MemoryEntry>,
}

impl MemoryDirectory {
  pub fn new(created: impl Into<IsoDate>) -> Self {
    Self {
      created: created.into(),
      entries: vec![],
    }
  }

  pub fn insert_file(
    &mut self,
    name: impl Into<String>,
    created: impl Into<IsoDate>,
    data: Vec<u8>,
  ) {
    let length = data.len() as u64;
    self.insert_file_content(name, created, length, data.into());
  }

  /// Inserts a file whose declared length is given separately from its content.
  pub fn insert_file_content(
    &mut self,
    name: impl Into<String>,
    created: impl Into<IsoDate>,
    length: u64,
    content: FileContent,
  ) {
    self.entries.push(MemoryEntry::File {
      name: name.into(),
      created: created.into(),
      length,
      content,
    });
  }

  pub fn insert_directory(&mut self, name: impl Into<String>, directory: MemoryDirectory) {
    self.entries.push(MemoryEntry::Directory {
      name: name.into(),
      directory,
    });
  }

  pub fn with_file(
    mut self,
    name: impl Into<String>,
    created: impl Into<IsoDate>,
    data: Vec<u8>,
  ) -> Self {
    self.insert_file(name, created, data);
    self
  }

  pub fn with_directory(mut self, name: impl Into<String>, directory: MemoryDirectory) -> Self {
    self.insert_directory(name, directory);
    self
  }
}

impl DirectorySource for MemoryDirectory {
  fn creation_date(&self) -> Result<IsoDate> {
    Ok(self.created)
  }

  fn entries(&self) -> Result<Vec<SourceEntry>> {
    Ok(
      self
        .entries
        .iter()
        .map(|entry| match entry {
          MemoryEntry::File {
            name,
            created,
            length,
            content,
          } => SourceEntry {
            name: name.clone(),
            created: *created,
            kind: SourceEntryKind::File {
              length: *length,
              content: content.clone(),
            },
          },
          MemoryEntry::Directory { name, directory } => SourceEntry {
            name: name.clone(),
            created: directory.created,
            kind: SourceEntryKind::Directory(Box::new(directory.clone())),
          },
        })
        .collect(),
    )
  }
}
