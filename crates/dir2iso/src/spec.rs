//! ISO 9660 and Joliet on-disk types written by this crate.
//!
//! Encoding lives in [`crate::serialize`]; these are the logical values.

use crate::{
  date::{IsoDate, NumericalDate},
  encoding,
  prelude::*,
};

/// Number of sectors at the start of the image reserved for system use.
pub const SYSTEM_AREA_SECTORS: u32 = 16;

/// First sector after the system area, the Primary and Supplementary volume
/// descriptors and the set terminator.
pub const FIRST_DATA_SECTOR: u32 = SYSTEM_AREA_SECTORS + 3;

/// Fixed part of a directory record, up to and including the identifier length byte.
pub const DIRECTORY_RECORD_HEADER_LENGTH: usize = 33;

/// Length of the `.` and `..` records.
pub const DOT_RECORD_LENGTH: usize = 34;

/// Fixed part of a path table record.
pub const PATH_TABLE_RECORD_HEADER_LENGTH: usize = 8;

/// Longest file name kept verbatim in the Joliet volume.
pub const LONG_NAME_MAX_LENGTH: usize = 101;

/// Longest name kept verbatim in the Primary volume.
pub const SHORT_NAME_MAX_LENGTH: usize = 8;

/// Which of the two volume descriptions a structure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeKind {
  /// ISO 9660 Primary volume: ASCII, 8 character names.
  Primary,
  /// Joliet Supplementary volume: UCS-2 big-endian, long names.
  Supplementary,
}

impl VolumeKind {
  pub fn descriptor_type(&self) -> VolumeDescriptorType {
    match self {
      VolumeKind::Primary => VolumeDescriptorType::Primary,
      VolumeKind::Supplementary => VolumeDescriptorType::Supplementary,
    }
  }
}

impl std::fmt::Display for VolumeKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      VolumeKind::Primary => f.write_str("primary"),
      VolumeKind::Supplementary => f.write_str("supplementary"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardIdentifier {
  /// Standard ISO 9660 identifier; "CD001"
  Cd001,
}

impl StandardIdentifier {
  pub fn as_bytes(&self) -> &[u8; 5] {
    match self {
      StandardIdentifier::Cd001 => b"CD001",
    }
  }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDescriptorType {
  Primary = 1,
  Supplementary = 2,
  Terminator = 255,
}

impl From<VolumeDescriptorType> for u8 {
  fn from(value: VolumeDescriptorType) -> u8 {
    value as u8
  }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDescriptorVersion {
  Standard = 1,
}

impl From<VolumeDescriptorVersion> for u8 {
  fn from(value: VolumeDescriptorVersion) -> u8 {
    value as u8
  }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStructureVersion {
  Standard = 1,
}

impl From<FileStructureVersion> for u8 {
  fn from(value: FileStructureVersion) -> u8 {
    value as u8
  }
}

/// Escape sequences conforming to ISO/IEC 2022, written to the
/// Supplementary volume descriptor to announce Joliet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapeSequences(pub(crate) [u8; 32]);

impl EscapeSequences {
  /// UCS-2 Level 3; `%/E`.
  pub fn joliet_level_3() -> Self {
    let mut bytes = [0u8; 32];
    bytes[..3].copy_from_slice(b"%/E");
    Self(bytes)
  }

  /// All zeros, as used by the Primary volume descriptor.
  pub fn none() -> Self {
    Self([0u8; 32])
  }

  pub fn as_bytes(&self) -> &[u8; 32] {
    &self.0
  }
}

bitflags::bitflags! {
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct FileFlags: u8 {
    const EXISTENCE = 1 << 0;
    const DIRECTORY = 1 << 1;
    const ASSOCIATED_FILE = 1 << 2;
    const RECORD = 1 << 3;
    const PROTECTION = 1 << 4;
    const MULTI_EXTENT = 1 << 7;
  }
}

/// Kind of identifier. Determines how the bytes were encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
  /// ASCII file identifier with a `;1` version suffix.
  StandardFileIdentifier,
  /// ASCII directory identifier.
  StandardDirectoryIdentifier,
  /// Joliet (UCS-2 big-endian) file identifier.
  JolietFileIdentifier,
  /// Joliet (UCS-2 big-endian) directory identifier.
  JolietDirectoryIdentifier,
  /// Special case for the `.` entry in a directory.
  CurrentDirectory,
  /// Special case for the `..` entry in a directory.
  ParentDirectory,
  /// Special case for the root directory in a path table.
  RootDirectory,
}

/// An encoded file or directory identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct Identifier {
  pub(crate) kind: IdentifierKind,
  pub(crate) data: Vec<u8>,
}

impl std::fmt::Debug for Identifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Identifier")
      .field("kind", &self.kind)
      .field("text", &self.display_name())
      .finish()
  }
}

impl Identifier {
  fn with_data(kind: IdentifierKind, data: Vec<u8>) -> Result<Self> {
    let identifier = Self { kind, data };

    if identifier.data.len() > u8::MAX as usize {
      return Err(Error::RecordTooLong {
        identifier: identifier.display_name(),
        length: identifier.data.len(),
      });
    }

    Ok(identifier)
  }

  pub fn kind(&self) -> IdentifierKind {
    self.kind
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// Single zero byte naming the root directory in a path table.
  pub fn root_directory() -> Self {
    Self {
      kind: IdentifierKind::RootDirectory,
      data: vec![0],
    }
  }

  pub fn current_directory() -> Self {
    Self {
      kind: IdentifierKind::CurrentDirectory,
      data: vec![0],
    }
  }

  pub fn parent_directory() -> Self {
    Self {
      kind: IdentifierKind::ParentDirectory,
      data: vec![1],
    }
  }

  /// `NAME;1` in the Primary volume, UCS-2 `name` (no version) in Joliet.
  pub fn file(kind: VolumeKind, name: &str) -> Result<Self> {
    match kind {
      VolumeKind::Primary => {
        let mut data = encoding::ascii_lossy(name);
        data.extend_from_slice(b";1");
        Self::with_data(IdentifierKind::StandardFileIdentifier, data)
      }
      VolumeKind::Supplementary => {
        Self::with_data(IdentifierKind::JolietFileIdentifier, encoding::ucs2_be(name)?)
      }
    }
  }

  pub fn directory(kind: VolumeKind, name: &str) -> Result<Self> {
    match kind {
      VolumeKind::Primary => Self::with_data(
        IdentifierKind::StandardDirectoryIdentifier,
        encoding::ascii_lossy(name),
      ),
      VolumeKind::Supplementary => Self::with_data(
        IdentifierKind::JolietDirectoryIdentifier,
        encoding::ucs2_be(name)?,
      ),
    }
  }

  /// Re-encodes the same characters for the other volume kind.
  ///
  /// Special identifiers are unchanged. Widening ASCII to UCS-2 and narrowing
  /// it back restores the same bytes.
  pub fn reencode(&self, kind: VolumeKind) -> Result<Self> {
    use IdentifierKind::*;

    match (self.kind, kind) {
      (CurrentDirectory | ParentDirectory | RootDirectory, _)
      | (StandardFileIdentifier | StandardDirectoryIdentifier, VolumeKind::Primary)
      | (JolietFileIdentifier | JolietDirectoryIdentifier, VolumeKind::Supplementary) => {
        Ok(self.clone())
      }
      (StandardFileIdentifier, VolumeKind::Supplementary) => {
        Self::with_data(JolietFileIdentifier, widen(&self.data))
      }
      (StandardDirectoryIdentifier, VolumeKind::Supplementary) => {
        Self::with_data(JolietDirectoryIdentifier, widen(&self.data))
      }
      (JolietFileIdentifier, VolumeKind::Primary) => Self::with_data(
        StandardFileIdentifier,
        encoding::ucs2_be_to_ascii(&self.data),
      ),
      (JolietDirectoryIdentifier, VolumeKind::Primary) => Self::with_data(
        StandardDirectoryIdentifier,
        encoding::ucs2_be_to_ascii(&self.data),
      ),
    }
  }

  /// Human readable form, for logs and error messages.
  pub fn display_name(&self) -> String {
    match self.kind {
      IdentifierKind::CurrentDirectory | IdentifierKind::RootDirectory => ".".to_owned(),
      IdentifierKind::ParentDirectory => "..".to_owned(),
      IdentifierKind::StandardFileIdentifier | IdentifierKind::StandardDirectoryIdentifier => {
        String::from_utf8_lossy(&self.data).into_owned()
      }
      IdentifierKind::JolietFileIdentifier | IdentifierKind::JolietDirectoryIdentifier => {
        let units: Vec<u16> = self
          .data
          .chunks(2)
          .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
          .collect();
        String::from_utf16_lossy(&units)
      }
    }
  }
}

fn widen(ascii: &[u8]) -> Vec<u8> {
  ascii.iter().flat_map(|&b| [0, b]).collect()
}

/// One entry in a directory's record table.
#[derive(Debug, Clone)]
pub struct DirectoryRecord {
  pub extended_attribute_length: u8,
  pub extent_location: u32,
  pub data_length: u32,
  pub recording_date: NumericalDate,
  pub file_flags: FileFlags,
  pub file_unit_size: u8,
  pub interleave_gap_size: u8,
  pub volume_sequence_number: u16,
  pub file_identifier: Identifier,
}

impl DirectoryRecord {
  pub fn new(
    extent_location: u32,
    data_length: u32,
    recording_date: &IsoDate,
    is_directory: bool,
    file_identifier: Identifier,
  ) -> Self {
    Self {
      extended_attribute_length: 0,
      extent_location,
      data_length,
      recording_date: recording_date.numerical(),
      file_flags: if is_directory {
        FileFlags::DIRECTORY
      } else {
        FileFlags::empty()
      },
      file_unit_size: 0,
      interleave_gap_size: 0,
      volume_sequence_number: 1,
      file_identifier,
    }
  }

  /// Serialized length of a record carrying `identifier`: the fixed header,
  /// the identifier, and a pad byte when the identifier length is even.
  /// Record length for an identifier of `identifier_length` bytes, including
  /// the pad byte that keeps records even.
  pub const fn record_length(identifier_length: usize) -> usize {
    DIRECTORY_RECORD_HEADER_LENGTH + identifier_length + (1 - identifier_length % 2)
  }

  pub fn length_for(identifier: &Identifier) -> Result<u8> {
    let length = Self::record_length(identifier.len());

    u8::try_from(length).map_err(|_| Error::RecordTooLong {
      identifier: identifier.display_name(),
      length,
    })
  }

  pub fn length(&self) -> Result<u8> {
    Self::length_for(&self.file_identifier)
  }

  /// The same record with its identifier re-encoded for `kind`.
  pub fn reencode(&self, kind: VolumeKind) -> Result<Self> {
    let file_identifier = self.file_identifier.reencode(kind)?;
    Self::length_for(&file_identifier)?;

    Ok(Self {
      file_identifier,
      ..self.clone()
    })
  }
}

/// One entry of a path table.
#[derive(Debug, Clone)]
pub struct PathTableRecord {
  pub extended_attribute_record_length: u8,
  pub extent_location: u32,
  pub parent_directory_number: u16,
  pub directory_identifier: Identifier,
}

impl PathTableRecord {
  /// Serialized length, including the pad byte after an odd-length identifier.
  pub fn length(&self) -> usize {
    let id_len = self.directory_identifier.len();
    PATH_TABLE_RECORD_HEADER_LENGTH + id_len + id_len % 2
  }
}

/// A Primary (type 1) or Supplementary (type 2) volume descriptor.
///
/// Text fields hold the logical strings; they are encoded as padded ASCII or
/// padded UCS-2 according to `kind` when serialized.
#[derive(Debug, Clone)]
pub struct VolumeDescriptor {
  pub kind: VolumeKind,
  pub standard_identifier: StandardIdentifier,
  pub version: VolumeDescriptorVersion,
  pub system_identifier: String,
  pub volume_identifier: String,
  pub volume_space_size: u32,
  pub escape_sequences: EscapeSequences,
  pub volume_set_size: u16,
  pub volume_sequence_number: u16,
  pub logical_block_size: u16,
  pub path_table_size: u32,
  pub type_l_path_table_location: u32,
  pub optional_type_l_path_table_location: u32,
  pub type_m_path_table_location: u32,
  pub optional_type_m_path_table_location: u32,
  pub root_directory_record: DirectoryRecord,
  pub volume_set_identifier: String,
  pub publisher_identifier: String,
  pub data_preparer_identifier: String,
  pub application_identifier: String,
  pub copyright_file_identifier: String,
  pub abstract_file_identifier: String,
  pub bibliographic_file_identifier: String,
  pub creation_date: IsoDate,
  pub modification_date: IsoDate,
  pub expiration_date: IsoDate,
  pub effective_date: IsoDate,
  pub file_structure_version: FileStructureVersion,
}

#[derive(Debug, Clone, Copy)]
pub struct VolumeDescriptorSetTerminator;
