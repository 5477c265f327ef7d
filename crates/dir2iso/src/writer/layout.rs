//! Extent and number assignment.
//!
//! Directory tables of each volume are placed breadth-first, each volume's
//! tables followed by its two path table copies. File data comes last, laid
//! out depth-first so it can be streamed in the same order.

use super::path_table::PathTable;
use crate::{
  encoding::{Endianness, SECTOR_SIZE},
  lba::LbaAllocator,
  prelude::*,
  spec::VolumeKind,
  tree::{ElementId, ElementKind, ElementTree},
};

/// Where one volume's directory tables and path tables ended up.
#[derive(Debug, Clone)]
pub struct VolumeLayout {
  pub kind: VolumeKind,
  pub tables_start: u32,
  pub path_table_size: u32,
  pub type_l_location: u32,
  pub type_m_location: u32,
  /// Type L copy, sector padded.
  pub type_l: Vec<u8>,
  /// Type M copy, sector padded.
  pub type_m: Vec<u8>,
}

impl VolumeLayout {
  /// First sector after the second path table copy.
  pub fn end(&self) -> u32 {
    self.type_m_location + (self.type_m.len() as u32) / SECTOR_SIZE
  }
}

/// Places every directory table of `kind` consecutively, breadth-first.
pub fn assign_directory_extents(
  tree: &mut ElementTree,
  order: &[ElementId],
  kind: VolumeKind,
  allocator: &mut LbaAllocator,
) -> Result<()> {
  for &id in order {
    let dir = tree.directory_mut(id)?;
    let extent = allocator.allocate_sectors(dir.size(kind))?;
    dir.set_extent(kind, extent);

    log::debug!(
      "{kind} table of {:?} at LBA {extent} ({} sectors)",
      tree.get(id).long_name,
      tree.directory(id)?.size(kind)
    );
  }

  Ok(())
}

/// Numbers directories 1..=N in breadth-first order.
pub fn assign_numbers(tree: &mut ElementTree, order: &[ElementId]) -> Result<()> {
  if order.len() > u16::MAX as usize {
    return Err(Error::layout(format!(
      "{} directories exceed the 65535 a path table can number",
      order.len()
    )));
  }

  for (index, &id) in order.iter().enumerate() {
    tree.directory_mut(id)?.number = index as u16 + 1;
  }

  Ok(())
}

/// Serializes both path table copies of `kind` and reserves sectors for them.
pub fn lay_out_path_tables(
  tree: &ElementTree,
  order: &[ElementId],
  kind: VolumeKind,
  tables_start: u32,
  allocator: &mut LbaAllocator,
) -> Result<VolumeLayout> {
  let table = PathTable::from_tree(tree, order, kind)?;
  let type_l = table.to_sectors(Endianness::Little)?;
  let type_m = table.to_sectors(Endianness::Big)?;

  let type_l_location = allocator.allocate(type_l.len() as u64)?;
  let type_m_location = allocator.allocate(type_m.len() as u64)?;

  log::debug!(
    "{kind} path tables: {} bytes, L at LBA {type_l_location}, M at LBA {type_m_location}",
    table.size()
  );

  Ok(VolumeLayout {
    kind,
    tables_start,
    path_table_size: table.size(),
    type_l_location,
    type_m_location,
    type_l,
    type_m,
  })
}

/// Gives every non-empty file a contiguous extent, depth-first: a
/// directory's own files first, then each subdirectory. Returns the files in
/// the order their data must be written.
pub fn assign_file_extents(
  tree: &mut ElementTree,
  allocator: &mut LbaAllocator,
) -> Result<Vec<ElementId>> {
  fn visit(
    tree: &mut ElementTree,
    dir: ElementId,
    allocator: &mut LbaAllocator,
    order: &mut Vec<ElementId>,
  ) -> Result<()> {
    let children = tree.children(dir).to_vec();

    for &child in &children {
      let element = tree.get_mut(child);

      if let ElementKind::File(file) = &mut element.kind {
        if file.length > u64::from(u32::MAX) {
          return Err(Error::layout(format!(
            "{:?} is {} bytes; files of 4 GiB or more are not supported",
            element.long_name, file.length
          )));
        }

        if file.length == 0 {
          file.extent = 0;
          continue;
        }

        file.extent = allocator.allocate(file.length)?;
        log::trace!("File {:?} at LBA {}", element.long_name, file.extent);
        order.push(child);
      }
    }

    for &child in &children {
      if tree.get(child).is_directory() {
        visit(tree, child, allocator, order)?;
      }
    }

    Ok(())
  }

  let mut order = vec![];
  visit(tree, ElementTree::ROOT, allocator, &mut order)?;
  Ok(order)
}
