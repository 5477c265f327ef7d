use crate::{encoding::SECTOR_SIZE, prelude::*};

const SECTOR: u64 = SECTOR_SIZE as u64;
const ZEROS: [u8; SECTOR_SIZE as usize] = [0; SECTOR_SIZE as usize];

/// Sequential writer that keeps track of its position in sectors.
///
/// The output only needs [`std::io::Write`]; nothing is ever sought.
pub struct SectorWriter<W> {
  inner: W,
  position: u64,
}

impl<W> SectorWriter<W>
where
  W: std::io::Write,
{
  pub fn new(inner: W) -> Self {
    Self { inner, position: 0 }
  }

  pub fn bytes_written(&self) -> u64 {
    self.position
  }

  /// Sector currently being filled.
  pub fn lba(&self) -> u64 {
    self.position / SECTOR
  }

  fn offset_in_sector(&self) -> u64 {
    self.position % SECTOR
  }

  pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
    self.inner.write_all(buf)?;
    self.position += buf.len() as u64;
    Ok(())
  }

  /// Writes a record, first moving to the next sector if it would not fit in
  /// the current one.
  pub fn write_aligned(&mut self, buf: &[u8]) -> Result<()> {
    if self.offset_in_sector() + buf.len() as u64 > SECTOR {
      self.pad_to_sector()?;
    }

    log::trace!(
      "Writing {} bytes at sector {}, offset {}",
      buf.len(),
      self.lba(),
      self.offset_in_sector()
    );

    self.write_all(buf)
  }

  /// Zero-fills the rest of the current sector.
  pub fn pad_to_sector(&mut self) -> Result<()> {
    let offset = self.offset_in_sector();

    if offset != 0 {
      self.write_all(&ZEROS[..(SECTOR - offset) as usize])?;
    }

    Ok(())
  }

  pub fn write_zero_sectors(&mut self, count: u32) -> Result<()> {
    for _ in 0..count {
      self.write_all(&ZEROS)?;
    }
    Ok(())
  }

  /// Fails unless the writer sits exactly at the start of sector `lba`.
  pub fn expect_lba(&self, lba: u32, what: &str) -> Result<()> {
    if self.position != u64::from(lba) * SECTOR {
      return Err(Error::layout(format!(
        "{what} was allocated at sector {lba} but the output is at byte {}",
        self.position
      )));
    }
    Ok(())
  }

  pub fn flush(&mut self) -> Result<()> {
    self.inner.flush()?;
    Ok(())
  }

  pub fn into_inner(self) -> W {
    self.inner
  }
}
