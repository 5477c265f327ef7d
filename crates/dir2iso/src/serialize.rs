//! Byte-level encoding of the structures in [`crate::spec`].

use crate::{
  encoding::{self, Endianness, SECTOR_SIZE},
  prelude::*,
  spec::{self, VolumeKind},
};

pub trait IsoSerialize {
  /// Extra information needed to encode the value, such as the byte order of
  /// a path table copy.
  type Context;

  /// Number of bytes [`IsoSerialize::serialize`] appends.
  fn extent(&self) -> usize;

  fn serialize(&self, context: &mut Self::Context, out: &mut Vec<u8>) -> Result<()>;
}

impl IsoSerialize for spec::DirectoryRecord {
  type Context = ();

  fn extent(&self) -> usize {
    Self::record_length(self.file_identifier.len())
  }

  fn serialize(&self, _: &mut (), out: &mut Vec<u8>) -> Result<()> {
    let length = self.length()?;
    let identifier = self.file_identifier.as_bytes();

    out.push(length);
    out.push(self.extended_attribute_length);
    out.extend_from_slice(&encoding::both_endian_u32(self.extent_location));
    out.extend_from_slice(&encoding::both_endian_u32(self.data_length));
    out.extend_from_slice(&self.recording_date.to_bytes());
    out.push(self.file_flags.bits());
    out.push(self.file_unit_size);
    out.push(self.interleave_gap_size);
    out.extend_from_slice(&encoding::both_endian_u16(self.volume_sequence_number));
    out.push(identifier.len() as u8);
    out.extend_from_slice(identifier);

    if identifier.len() % 2 == 0 {
      out.push(0);
    }

    Ok(())
  }
}

impl IsoSerialize for spec::PathTableRecord {
  type Context = Endianness;

  fn extent(&self) -> usize {
    self.length()
  }

  fn serialize(&self, endianness: &mut Endianness, out: &mut Vec<u8>) -> Result<()> {
    let identifier = self.directory_identifier.as_bytes();

    out.push(identifier.len() as u8);
    out.push(self.extended_attribute_record_length);
    endianness.write_u32(out, self.extent_location);
    endianness.write_u16(out, self.parent_directory_number);
    out.extend_from_slice(identifier);

    if identifier.len() % 2 == 1 {
      out.push(0);
    }

    Ok(())
  }
}

fn text_field(kind: VolumeKind, field: &'static str, value: &str, width: usize) -> Result<Vec<u8>> {
  match kind {
    VolumeKind::Primary => encoding::pad_ascii(field, value, width),
    VolumeKind::Supplementary => encoding::pad_ucs2(field, value, width),
  }
}

impl IsoSerialize for spec::VolumeDescriptor {
  type Context = ();

  fn extent(&self) -> usize {
    SECTOR_SIZE as usize
  }

  fn serialize(&self, _: &mut (), out: &mut Vec<u8>) -> Result<()> {
    let start = out.len();
    let kind = self.kind;

    out.push(kind.descriptor_type().into());
    out.extend_from_slice(self.standard_identifier.as_bytes());
    out.push(self.version.into());
    // Volume flags; unused in the primary descriptor.
    out.push(0);
    out.extend(text_field(kind, "System identifier", &self.system_identifier, 32)?);
    out.extend(text_field(kind, "Volume identifier", &self.volume_identifier, 32)?);
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&encoding::both_endian_u32(self.volume_space_size));
    out.extend_from_slice(self.escape_sequences.as_bytes());
    out.extend_from_slice(&encoding::both_endian_u16(self.volume_set_size));
    out.extend_from_slice(&encoding::both_endian_u16(self.volume_sequence_number));
    out.extend_from_slice(&encoding::both_endian_u16(self.logical_block_size));
    out.extend_from_slice(&encoding::both_endian_u32(self.path_table_size));
    Endianness::Little.write_u32(out, self.type_l_path_table_location);
    Endianness::Little.write_u32(out, self.optional_type_l_path_table_location);
    Endianness::Big.write_u32(out, self.type_m_path_table_location);
    Endianness::Big.write_u32(out, self.optional_type_m_path_table_location);
    self.root_directory_record.serialize(&mut (), out)?;
    out.extend(text_field(kind, "Volume set identifier", &self.volume_set_identifier, 128)?);
    out.extend(text_field(kind, "Publisher identifier", &self.publisher_identifier, 128)?);
    out.extend(text_field(kind, "Data preparer identifier", &self.data_preparer_identifier, 128)?);
    out.extend(text_field(kind, "Application identifier", &self.application_identifier, 128)?);
    out.extend(text_field(kind, "Copyright file identifier", &self.copyright_file_identifier, 37)?);
    out.extend(text_field(kind, "Abstract file identifier", &self.abstract_file_identifier, 37)?);
    out.extend(text_field(
      kind,
      "Bibliographic file identifier",
      &self.bibliographic_file_identifier,
      37,
    )?);
    out.extend_from_slice(&self.creation_date.digits().to_bytes());
    out.extend_from_slice(&self.modification_date.digits().to_bytes());
    out.extend_from_slice(&self.expiration_date.digits().to_bytes());
    out.extend_from_slice(&self.effective_date.digits().to_bytes());
    out.push(self.file_structure_version.into());

    if out.len() - start > SECTOR_SIZE as usize {
      return Err(Error::layout(format!(
        "{kind} volume descriptor is {} bytes",
        out.len() - start
      )));
    }

    // Reserved byte, 512 bytes of application use, then the reserved tail.
    out.resize(start + SECTOR_SIZE as usize, 0);

    Ok(())
  }
}

impl IsoSerialize for spec::VolumeDescriptorSetTerminator {
  type Context = ();

  fn extent(&self) -> usize {
    SECTOR_SIZE as usize
  }

  fn serialize(&self, _: &mut (), out: &mut Vec<u8>) -> Result<()> {
    let start = out.len();

    out.push(spec::VolumeDescriptorType::Terminator.into());
    out.extend_from_slice(spec::StandardIdentifier::Cd001.as_bytes());
    out.push(spec::VolumeDescriptorVersion::Standard.into());
    out.resize(start + SECTOR_SIZE as usize, 0);

    Ok(())
  }
}
