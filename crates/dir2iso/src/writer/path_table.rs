use crate::{
  encoding::{Endianness, SECTOR_SIZE},
  prelude::*,
  serialize::IsoSerialize,
  spec::{self, Identifier, VolumeKind},
  tree::{ElementId, ElementTree},
};

/// Path table of one volume, in directory number order.
#[derive(Debug)]
pub struct PathTable {
  kind: VolumeKind,
  size: u32,
  records: Vec<spec::PathTableRecord>,
}

impl PathTable {
  /// Builds the table from directories that already have extents and numbers.
  /// `order` must list directories by number, root first.
  pub fn from_tree(tree: &ElementTree, order: &[ElementId], kind: VolumeKind) -> Result<Self> {
    let mut records = Vec::with_capacity(order.len());

    for &id in order {
      let element = tree.get(id);
      let dir = tree.directory(id)?;

      let (parent_directory_number, directory_identifier) = match element.parent {
        None => (1, Identifier::root_directory()),
        Some(parent) => (tree.directory(parent)?.number, element.identifier(kind)?),
      };

      records.push(spec::PathTableRecord {
        extended_attribute_record_length: 0,
        extent_location: dir.extent(kind),
        parent_directory_number,
        directory_identifier,
      });
    }

    let size = records.iter().map(|r| r.extent() as u64).sum::<u64>();
    let size = u32::try_from(size)
      .map_err(|_| Error::layout(format!("{kind} path table is {size} bytes")))?;

    Ok(Self {
      kind,
      size,
      records,
    })
  }

  /// Unpadded byte length of one copy.
  pub fn size(&self) -> u32 {
    self.size
  }

  pub fn records_iter(&self) -> impl Iterator<Item = &spec::PathTableRecord> {
    self.records.iter()
  }

  /// One copy of the table, zero padded to whole sectors.
  pub fn to_sectors(&self, endianness: Endianness) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(self.size as usize);
    let mut endianness = endianness;

    for record in &self.records {
      log::trace!("Serializing ({:?}) {} path table record: {:?}", endianness, self.kind, record);
      record.serialize(&mut endianness, &mut bytes)?;
    }

    let padded = (bytes.len() as u64).div_ceil(SECTOR_SIZE as u64) * SECTOR_SIZE as u64;
    bytes.resize(padded as usize, 0);

    Ok(bytes)
  }
}
