use std::cell::Cell;

use crate::region::Region;

/// One contiguous region plus a bump offset separating used from unused
/// bytes.
pub struct Block {
  region: Region,
  offset: Cell<usize>,
}

impl Block {
  pub fn new(
    region: Region,
  ) -> Self {
    Self {
      region,
      offset: Cell::new(0),
    }
  }

  pub fn capacity(
    &self,
  ) -> usize {
    self.region.len()
  }

  pub fn offset(
    &self,
  ) -> usize {
    self.offset.get()
  }

  /// Trailing free space.
  pub fn remaining(
    &self,
  ) -> usize {
    self.capacity() - self.offset.get()
  }

  pub fn fits(
    &self,
    len: usize,
  ) -> bool {
    self.remaining() >= len
  }

  /// Reserves `len` bytes and returns the start of the reserved span.
  ///
  /// The caller must have checked [`Block::fits`].
  pub fn carve(
    &self,
    len: usize,
  ) -> *mut u8 {
    debug_assert!(self.fits(len));

    let start = self.offset.get();
    self.offset.set(start + len);

    unsafe { self.region.as_ptr().add(start) }
  }

  pub fn contains(
    &self,
    address: *const u8,
  ) -> bool {
    let base = self.region.as_ptr() as usize;
    let address = address as usize;

    address >= base && address < base + self.capacity()
  }

  pub fn clear(
    &self,
  ) {
    self.offset.set(0);
  }

  pub fn into_region(
    self,
  ) -> Region {
    self.region
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::region::{HeapAllocator, RegionAllocator};

  #[test]
  fn test_carve_advances_offset() {
    let block = Block::new(HeapAllocator.allocate(64).unwrap());

    assert_eq!(block.capacity(), 64);
    assert_eq!(block.remaining(), 64);

    let first = block.carve(10);
    let second = block.carve(20);

    assert_eq!(unsafe { second.offset_from(first) }, 10);
    assert_eq!(block.offset(), 30);
    assert_eq!(block.remaining(), 34);
    assert!(block.fits(34));
    assert!(!block.fits(35));
    assert!(block.contains(first));
    assert!(block.contains(second));

    block.clear();

    assert_eq!(block.offset(), 0);
    assert_eq!(block.carve(1), first);

    unsafe { HeapAllocator.release(block.into_region()) };
  }
}
