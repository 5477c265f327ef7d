//! Stateless byte-level helpers shared by the record encoders.

use crate::prelude::*;
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use std::borrow::Cow;

/// Size of a logical sector. The only sector size this crate writes.
pub const SECTOR_SIZE: u32 = 2048;

/// ASCII space, used to pad `a-character` fields.
pub const ASCII_BLANK: u8 = b' ';

/// UCS-2 space, used to pad Joliet text fields.
pub const UCS2_BLANK: [u8; 2] = [0x00, 0x20];

/// Byte order of a pure-endian integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
  Little,
  Big,
}

impl Endianness {
  pub fn write_u16(&self, out: &mut Vec<u8>, value: u16) {
    // Writing into a `Vec` cannot fail.
    let _ = match self {
      Endianness::Little => out.write_u16::<LittleEndian>(value),
      Endianness::Big => out.write_u16::<BigEndian>(value),
    };
  }

  pub fn write_u32(&self, out: &mut Vec<u8>, value: u32) {
    let _ = match self {
      Endianness::Little => out.write_u32::<LittleEndian>(value),
      Endianness::Big => out.write_u32::<BigEndian>(value),
    };
  }
}

/// Encodes a 32-bit value as little-endian immediately followed by big-endian.
pub fn both_endian_u32(value: u32) -> [u8; 8] {
  let mut bytes = [0u8; 8];
  LittleEndian::write_u32(&mut bytes[..4], value);
  BigEndian::write_u32(&mut bytes[4..], value);
  bytes
}

/// Encodes a 16-bit value as little-endian immediately followed by big-endian.
pub fn both_endian_u16(value: u16) -> [u8; 4] {
  let mut bytes = [0u8; 4];
  LittleEndian::write_u16(&mut bytes[..2], value);
  BigEndian::write_u16(&mut bytes[2..], value);
  bytes
}

/// Reverses the byte order of a 32-bit value.
pub fn change_endian_u32(value: u32) -> u32 {
  BigEndian::read_u32(&value.to_le_bytes())
}

/// Reverses the byte order of a 16-bit value.
pub fn change_endian_u16(value: u16) -> u16 {
  BigEndian::read_u16(&value.to_le_bytes())
}

/// Number of whole sectors needed to hold `bytes` bytes.
pub fn sectors_for(bytes: u64) -> u64 {
  bytes.div_ceil(SECTOR_SIZE as u64)
}

/// Replaces every non-ASCII character with `_`.
pub fn ascii_lossy(text: &str) -> Vec<u8> {
  text
    .chars()
    .map(|c| if c.is_ascii() { c as u8 } else { b'_' })
    .collect()
}

/// Replaces characters that UCS-2 cannot represent with `_`.
pub fn to_bmp(text: &str) -> Cow<'_, str> {
  if text.chars().all(|c| (c as u32) <= 0xFFFF) {
    Cow::Borrowed(text)
  } else {
    Cow::Owned(
      text
        .chars()
        .map(|c| if (c as u32) <= 0xFFFF { c } else { '_' })
        .collect(),
    )
  }
}

/// Encodes `text` as big-endian UCS-2.
pub fn ucs2_be(text: &str) -> Result<Vec<u8>> {
  let text = to_bmp(text);
  let mut bytes = Vec::with_capacity(text.len() * 2);

  ucs2::encode_with(&text, |unit| {
    bytes.extend_from_slice(&unit.to_be_bytes());
    Ok(())
  })
  .map_err(|e| Error::layout(format!("UCS-2 encoding of {text:?} failed: {e:?}")))?;

  Ok(bytes)
}

/// Narrows big-endian UCS-2 back to ASCII. Units outside ASCII become `_`.
pub fn ucs2_be_to_ascii(bytes: &[u8]) -> Vec<u8> {
  bytes
    .chunks(2)
    .map(|unit| match unit {
      [0, low] if low.is_ascii() => *low,
      _ => b'_',
    })
    .collect()
}

/// Encodes `text` into an ASCII field of exactly `width` bytes, padded with spaces.
pub fn pad_ascii(field: &'static str, text: &str, width: usize) -> Result<Vec<u8>> {
  let mut bytes = ascii_lossy(text);

  if bytes.len() > width {
    return Err(Error::IdentifierTooLong {
      field,
      value: text.to_owned(),
      width,
    });
  }

  bytes.resize(width, ASCII_BLANK);
  Ok(bytes)
}

/// Encodes `text` into a UCS-2 field of exactly `width` bytes, padded with
/// UCS-2 spaces. An odd trailing byte is left zero.
pub fn pad_ucs2(field: &'static str, text: &str, width: usize) -> Result<Vec<u8>> {
  let mut bytes = ucs2_be(text)?;

  if bytes.len() > width {
    return Err(Error::IdentifierTooLong {
      field,
      value: text.to_owned(),
      width,
    });
  }

  while bytes.len() + 2 <= width {
    bytes.extend_from_slice(&UCS2_BLANK);
  }
  bytes.resize(width, 0);

  Ok(bytes)
}
