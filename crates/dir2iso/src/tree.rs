//! In-memory element tree built from a [`DirectorySource`].
//!
//! Elements live in one arena and refer to each other by [`ElementId`]. Every
//! directory's children are sorted by long name, which fixes the order used
//! for numbering, path tables and on-disk records in both volumes.

use crate::{
  date::IsoDate,
  encoding::{self, SECTOR_SIZE},
  prelude::*,
  progress::{CancellationToken, ProgressSink, ProgressUpdate},
  source::{DirectorySource, FileContent, SourceEntryKind},
  spec::{self, DirectoryRecord, Identifier, VolumeKind},
};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
  pub fn index(&self) -> usize {
    self.0
  }
}

#[derive(Debug)]
pub struct Element {
  pub short_name: String,
  pub long_name: String,
  pub created: IsoDate,
  pub parent: Option<ElementId>,
  pub kind: ElementKind,
}

#[derive(Debug)]
pub enum ElementKind {
  Directory(DirectoryData),
  File(FileData),
}

#[derive(Debug, Default)]
pub struct DirectoryData {
  pub children: Vec<ElementId>,
  /// Sectors of this directory's record table in the Primary volume.
  pub size_primary: u32,
  /// Sectors of this directory's record table in the Joliet volume.
  pub size_secondary: u32,
  pub extent_primary: u32,
  pub extent_secondary: u32,
  /// 1-based breadth-first position, as used by path tables.
  pub number: u16,
}

impl DirectoryData {
  pub fn size(&self, kind: VolumeKind) -> u32 {
    match kind {
      VolumeKind::Primary => self.size_primary,
      VolumeKind::Supplementary => self.size_secondary,
    }
  }

  pub fn extent(&self, kind: VolumeKind) -> u32 {
    match kind {
      VolumeKind::Primary => self.extent_primary,
      VolumeKind::Supplementary => self.extent_secondary,
    }
  }

  pub fn set_extent(&mut self, kind: VolumeKind, extent: u32) {
    match kind {
      VolumeKind::Primary => self.extent_primary = extent,
      VolumeKind::Supplementary => self.extent_secondary = extent,
    }
  }

  /// Byte length recorded for this directory in records of `kind`.
  pub fn data_length(&self, kind: VolumeKind) -> u32 {
    self.size(kind) * SECTOR_SIZE
  }
}

#[derive(Debug)]
pub struct FileData {
  pub length: u64,
  pub content: FileContent,
  /// Shared by both volumes. Zero for empty files.
  pub extent: u32,
}

impl Element {
  pub fn is_directory(&self) -> bool {
    matches!(self.kind, ElementKind::Directory(_))
  }

  pub fn as_directory(&self) -> Option<&DirectoryData> {
    match &self.kind {
      ElementKind::Directory(dir) => Some(dir),
      ElementKind::File(_) => None,
    }
  }

  pub fn as_file(&self) -> Option<&FileData> {
    match &self.kind {
      ElementKind::File(file) => Some(file),
      ElementKind::Directory(_) => None,
    }
  }

  /// Name written in volumes of `kind`.
  pub fn name(&self, kind: VolumeKind) -> &str {
    match kind {
      VolumeKind::Primary => &self.short_name,
      VolumeKind::Supplementary => &self.long_name,
    }
  }

  pub fn identifier(&self, kind: VolumeKind) -> Result<Identifier> {
    if self.is_directory() {
      Identifier::directory(kind, self.name(kind))
    } else {
      Identifier::file(kind, self.name(kind))
    }
  }
}

/// Number of digits needed to tell `count` siblings apart.
fn index_width(count: usize) -> usize {
  let mut width = 0;
  let mut span = 1usize;

  while span < count {
    span = span.saturating_mul(10);
    width += 1;
  }

  width
}

/// Zero-padded position of a sibling. Never shorter than one digit.
pub fn index_suffix(index: usize, sibling_count: usize) -> String {
  format!("{index:0width$}", width = index_width(sibling_count))
}

fn normalize_short(c: char) -> char {
  match c {
    ' ' | '.' => '_',
    c if c.is_ascii() => c.to_ascii_uppercase(),
    _ => '_',
  }
}

/// Uppercase 8 character name for the Primary volume.
pub fn short_name(name: &str, suffix: &str) -> String {
  if name.chars().count() > spec::SHORT_NAME_MAX_LENGTH {
    indexed_short_name(name, suffix)
  } else {
    name.chars().map(normalize_short).collect()
  }
}

/// Short name that always carries `suffix`, cutting `name` to make room.
pub fn indexed_short_name(name: &str, suffix: &str) -> String {
  let keep = spec::SHORT_NAME_MAX_LENGTH.saturating_sub(suffix.len());
  name.chars().take(keep).map(normalize_short).chain(suffix.chars()).collect()
}

/// Name for the Joliet volume, at most 101 characters.
pub fn long_name(name: &str, suffix: &str) -> String {
  let name = encoding::to_bmp(name);

  if name.chars().count() > spec::LONG_NAME_MAX_LENGTH {
    let keep = spec::LONG_NAME_MAX_LENGTH.saturating_sub(suffix.len());
    name.chars().take(keep).chain(suffix.chars()).collect()
  } else {
    name.into_owned()
  }
}

struct BuildContext<'a> {
  progress: &'a mut dyn ProgressSink,
  cancel: &'a CancellationToken,
}

#[derive(Debug)]
pub struct ElementTree {
  elements: Vec<Element>,
}

impl ElementTree {
  pub const ROOT: ElementId = ElementId(0);

  /// Walks `source` depth-first and sizes every directory table.
  pub fn build(
    source: &dyn DirectorySource,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
  ) -> Result<Self> {
    let mut tree = Self { elements: vec![] };
    let mut context = BuildContext { progress, cancel };
    let created = source.creation_date()?;

    tree.build_directory(source, ".".into(), ".".into(), created, None, &mut context)?;

    log::info!(
      "Built element tree: {} directories, {} files",
      tree.directory_count(),
      tree.file_count()
    );

    Ok(tree)
  }

  fn push(&mut self, element: Element) -> ElementId {
    let id = ElementId(self.elements.len());
    self.elements.push(element);
    id
  }

  fn build_directory(
    &mut self,
    source: &dyn DirectorySource,
    short_name: String,
    long_name: String,
    created: IsoDate,
    parent: Option<ElementId>,
    context: &mut BuildContext<'_>,
  ) -> Result<ElementId> {
    context.cancel.check()?;

    let id = self.push(Element {
      short_name,
      long_name,
      created,
      parent,
      kind: ElementKind::Directory(DirectoryData::default()),
    });

    let entries = source.entries()?;
    let count = entries.len();
    let is_root = parent.is_none();

    if is_root {
      context.progress.update(ProgressUpdate::labelled(
        "Initializing ISO root directory...",
        0,
        count as i64,
      ));
    }

    let mut children = Vec::with_capacity(count);
    let mut taken = HashSet::with_capacity(count);

    for (index, entry) in entries.into_iter().enumerate() {
      let suffix = index_suffix(index, count);
      let mut short = self::short_name(&entry.name, &suffix);
      if taken.contains(&short) {
        let indexed = indexed_short_name(&entry.name, &suffix);
        log::warn!("Short name {short:?} of {:?} is taken, using {indexed:?}", entry.name);
        short = indexed;
      }
      taken.insert(short.clone());
      let long = self::long_name(&entry.name, &suffix);

      let child = match entry.kind {
        SourceEntryKind::File { length, content } => self.push(Element {
          short_name: short,
          long_name: long,
          created: entry.created,
          parent: Some(id),
          kind: ElementKind::File(FileData {
            length,
            content,
            extent: 0,
          }),
        }),
        SourceEntryKind::Directory(directory) => self.build_directory(
          directory.as_ref(),
          short,
          long,
          entry.created,
          Some(id),
          context,
        )?,
      };

      children.push(child);

      if is_root {
        context.progress.update(ProgressUpdate::position(index as i64 + 1));
      }
    }

    children.sort_by(|a, b| self.elements[a.0].long_name.cmp(&self.elements[b.0].long_name));

    let size_primary = self.table_sectors(&children, VolumeKind::Primary)?;
    let size_secondary = self.table_sectors(&children, VolumeKind::Supplementary)?;

    if let ElementKind::Directory(dir) = &mut self.elements[id.0].kind {
      dir.children = children;
      dir.size_primary = size_primary;
      dir.size_secondary = size_secondary;
    }

    Ok(id)
  }

  /// Sectors needed for a record table holding `.`, `..` and `children`.
  /// Records never straddle a sector boundary.
  fn table_sectors(&self, children: &[ElementId], kind: VolumeKind) -> Result<u32> {
    let sector = SECTOR_SIZE as usize;
    let mut sectors = 1u32;
    let mut fill = 2 * spec::DOT_RECORD_LENGTH;

    for &child in children {
      let length = DirectoryRecord::length_for(&self.get(child).identifier(kind)?)? as usize;

      if fill + length > sector {
        sectors += 1;
        fill = length;
      } else {
        fill += length;
      }
    }

    log::trace!("{kind} table of {} children: {sectors} sectors", children.len());

    Ok(sectors)
  }

  pub fn root(&self) -> ElementId {
    Self::ROOT
  }

  pub fn get(&self, id: ElementId) -> &Element {
    &self.elements[id.0]
  }

  pub fn get_mut(&mut self, id: ElementId) -> &mut Element {
    &mut self.elements[id.0]
  }

  pub fn len(&self) -> usize {
    self.elements.len()
  }

  pub fn is_empty(&self) -> bool {
    self.elements.is_empty()
  }

  pub fn directory(&self, id: ElementId) -> Result<&DirectoryData> {
    self
      .get(id)
      .as_directory()
      .ok_or_else(|| Error::layout(format!("{:?} is not a directory", self.get(id).long_name)))
  }

  pub fn directory_mut(&mut self, id: ElementId) -> Result<&mut DirectoryData> {
    let element = &mut self.elements[id.0];

    match &mut element.kind {
      ElementKind::Directory(dir) => Ok(dir),
      ElementKind::File(_) => Err(Error::layout(format!(
        "{:?} is not a directory",
        element.long_name
      ))),
    }
  }

  pub fn children(&self, id: ElementId) -> &[ElementId] {
    match &self.get(id).kind {
      ElementKind::Directory(dir) => &dir.children,
      ElementKind::File(_) => &[],
    }
  }

  /// Source-relative path of `id`, built from long names.
  pub fn path(&self, id: ElementId) -> std::path::PathBuf {
    let mut names = vec![];
    let mut current = Some(id);

    while let Some(id) = current {
      let element = self.get(id);
      if element.parent.is_some() {
        names.push(element.long_name.as_str());
      }
      current = element.parent;
    }

    names.iter().rev().collect()
  }

  /// Every directory, root first, in breadth-first order.
  pub fn directories_breadth_first(&self) -> Vec<ElementId> {
    let mut order = vec![];
    let mut queue = VecDeque::from([Self::ROOT]);

    while let Some(id) = queue.pop_front() {
      order.push(id);
      queue.extend(
        self
          .children(id)
          .iter()
          .copied()
          .filter(|&child| self.get(child).is_directory()),
      );
    }

    order
  }

  pub fn directory_count(&self) -> usize {
    self.elements.iter().filter(|e| e.is_directory()).count()
  }

  pub fn file_count(&self) -> usize {
    self.elements.len() - self.directory_count()
  }

  /// Sectors occupied by the subtree at `id`: both record tables of every
  /// directory plus all file data.
  pub fn total_sectors(&self, id: ElementId) -> u64 {
    match &self.get(id).kind {
      ElementKind::File(file) => encoding::sectors_for(file.length),
      ElementKind::Directory(dir) => {
        u64::from(dir.size_primary)
          + u64::from(dir.size_secondary)
          + dir
            .children
            .iter()
            .map(|&child| self.total_sectors(child))
            .sum::<u64>()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{progress::NoProgress, source::MemoryDirectory};

  fn build(root: &MemoryDirectory) -> ElementTree {
    ElementTree::build(root, &mut NoProgress, &CancellationToken::new()).unwrap()
  }

  fn no_date() -> IsoDate {
    IsoDate::no_date()
  }

  #[test]
  fn index_suffix_width() {
    assert_eq!(index_suffix(0, 1), "0");
    assert_eq!(index_suffix(3, 10), "3");
    assert_eq!(index_suffix(3, 11), "03");
    assert_eq!(index_suffix(10, 11), "10");
    assert_eq!(index_suffix(7, 100), "07");
    assert_eq!(index_suffix(7, 101), "007");
  }

  #[test]
  fn short_names() {
    assert_eq!(short_name("My File.txt", "0"), "MY_FILE0");
    assert_eq!(short_name("readme", "0"), "README");
    assert_eq!(short_name("a.b", "12"), "A_B");
    assert_eq!(short_name("résumé", "0"), "R_SUM_");
    assert_eq!(short_name("Documents", "04"), "DOCUME04");
  }

  #[test]
  fn long_names() {
    let long = "x".repeat(150);
    let truncated = long_name(&long, "03");
    assert_eq!(truncated.chars().count(), 101);
    assert!(truncated.ends_with("x03"));

    assert_eq!(long_name("My File.txt", "0"), "My File.txt");
    assert_eq!(long_name("smile\u{1F600}", "0"), "smile_");
  }

  #[test]
  fn truncated_siblings_stay_distinct() {
    let root = MemoryDirectory::new(no_date())
      .with_file("Application Data", no_date(), vec![])
      .with_file("Application Logs", no_date(), vec![]);
    let tree = build(&root);

    let names: Vec<_> = tree
      .children(tree.root())
      .iter()
      .map(|&c| tree.get(c).short_name.clone())
      .collect();
    assert_eq!(names, vec!["APPLICA0", "APPLICA1"]);
  }

  #[test]
  fn children_sorted_by_long_name() {
    let root = MemoryDirectory::new(no_date())
      .with_file("b", no_date(), vec![])
      .with_file("B", no_date(), vec![])
      .with_directory("a", MemoryDirectory::new(no_date()));
    let tree = build(&root);

    let names: Vec<_> = tree
      .children(tree.root())
      .iter()
      .map(|&c| tree.get(c).long_name.as_str())
      .collect();
    assert_eq!(names, vec!["B", "a", "b"]);
    assert_eq!(tree.get(tree.root()).short_name, ".");
  }

  #[test]
  fn colliding_short_names_get_the_index() {
    let root = MemoryDirectory::new(no_date())
      .with_file("a", no_date(), vec![])
      .with_file("A", no_date(), vec![])
      .with_file("my file", no_date(), vec![])
      .with_file("my.file", no_date(), vec![]);
    let tree = build(&root);

    let mut names: Vec<_> = tree
      .children(tree.root())
      .iter()
      .map(|&c| tree.get(c).short_name.clone())
      .collect();
    names.sort();
    assert_eq!(names, vec!["A", "A1", "MY_FILE", "MY_FILE3"]);
  }

  #[test]
  fn empty_directory_tables_take_one_sector() {
    let tree = build(&MemoryDirectory::new(no_date()));
    let root = tree.directory(tree.root()).unwrap();
    assert_eq!(root.size_primary, 1);
    assert_eq!(root.size_secondary, 1);
    assert_eq!(tree.total_sectors(tree.root()), 2);
  }

  #[test]
  fn table_sizes_pack_greedily() {
    // "FILE0000;1" is 10 bytes, so each record is 44 bytes. After the two
    // 34 byte dot records, 45 records fit in the first sector.
    let mut root = MemoryDirectory::new(no_date());
    for i in 0..46 {
      root.insert_file(format!("file{i:04}"), no_date(), vec![]);
    }
    let tree = build(&root);
    let dir = tree.directory(tree.root()).unwrap();
    assert_eq!(dir.size_primary, 2);

    let mut root = MemoryDirectory::new(no_date());
    for i in 0..45 {
      root.insert_file(format!("file{i:04}"), no_date(), vec![]);
    }
    let tree = build(&root);
    assert_eq!(tree.directory(tree.root()).unwrap().size_primary, 1);
  }

  #[test]
  fn joliet_table_sizes_pack_greedily() {
    // "entry000" is 16 bytes in UCS-2, so each Joliet record is 50 bytes
    // against 44 for "ENTRY000;1". The first sector holds 39 Joliet records
    // and every later one 40.
    let sizes = |count: usize| {
      let mut root = MemoryDirectory::new(no_date());
      for i in 0..count {
        root.insert_file(format!("entry{i:03}"), no_date(), vec![]);
      }
      let tree = build(&root);
      let dir = tree.directory(tree.root()).unwrap();
      (dir.size_primary, dir.size_secondary)
    };

    assert_eq!(sizes(79), (2, 2));
    assert_eq!(sizes(80), (2, 3));
  }

  #[test]
  fn breadth_first_directory_order() {
    let root = MemoryDirectory::new(no_date())
      .with_directory(
        "a",
        MemoryDirectory::new(no_date()).with_directory("deep", MemoryDirectory::new(no_date())),
      )
      .with_directory("b", MemoryDirectory::new(no_date()));
    let tree = build(&root);

    let names: Vec<_> = tree
      .directories_breadth_first()
      .into_iter()
      .map(|id| tree.get(id).long_name.as_str())
      .collect();
    assert_eq!(names, vec![".", "a", "b", "deep"]);
    assert_eq!(tree.directory_count(), 4);
    assert_eq!(tree.file_count(), 0);
  }

  #[test]
  fn total_sectors_counts_file_data() {
    let root = MemoryDirectory::new(no_date()).with_file("data", no_date(), vec![7; 5000]);
    let tree = build(&root);
    assert_eq!(tree.total_sectors(tree.root()), 2 + 3);
  }

  #[test]
  fn cancelled_build_stops() {
    let token = CancellationToken::new();
    token.cancel();
    let result = ElementTree::build(&MemoryDirectory::new(no_date()), &mut NoProgress, &token);
    assert!(matches!(result, Err(Error::Cancelled)));
  }
}
