use crate::{encoding, prelude::*};

/// Hands out consecutive sector ranges, starting from a fixed LBA.
#[derive(Debug, Clone)]
pub struct LbaAllocator {
  next_lba: u32,
}

impl LbaAllocator {
  pub fn new(offset: u32) -> Self {
    Self { next_lba: offset }
  }

  /// First sector that has not been handed out yet.
  pub fn next_lba(&self) -> u32 {
    self.next_lba
  }

  /// Reserves `sectors` whole sectors and returns the first one.
  pub fn allocate_sectors(&mut self, sectors: u32) -> Result<u32> {
    let lba = self.next_lba;

    self.next_lba = lba
      .checked_add(sectors)
      .ok_or_else(|| Error::layout(format!("sector {lba} + {sectors} exceeds 32 bits")))?;

    Ok(lba)
  }

  /// Reserves enough sectors for `size` bytes and returns the first one.
  pub fn allocate(&mut self, size: u64) -> Result<u32> {
    let sectors = u32::try_from(encoding::sectors_for(size))
      .map_err(|_| Error::layout(format!("{size} bytes exceed 32 bit sector numbers")))?;

    self.allocate_sectors(sectors)
  }
}
