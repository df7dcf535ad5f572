use std::{cell::RefCell, fmt, slice, str};

use crate::{
  align::{page_size, round_to_page},
  block::Block,
  error::{Error, Result},
  region::{PageAllocator, RegionAllocator},
};

/// Construction options for a [`BlockSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOptions {
  /// Requested size of every regular block, rounded up to the page size.
  pub size_hint: usize,
  /// Whether a new block may be added when no existing block fits.
  pub grow: bool,
}

impl BlockOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn size_hint(
    mut self,
    size_hint: usize,
  ) -> Self {
    self.size_hint = size_hint;
    self
  }

  pub fn grow(
    mut self,
    grow: bool,
  ) -> Self {
    self.grow = grow;
    self
  }
}

impl Default for BlockOptions {
  fn default() -> Self {
    Self {
      size_hint: page_size(),
      grow: true,
    }
  }
}

/// Segmented bump allocator.
///
/// Requests are served first-fit from the newest block backwards; when
/// nothing fits and growth is allowed a fresh block is appended. Blocks are
/// never merged or returned individually, only all at once on drop.
pub struct BlockSet<A: RegionAllocator = PageAllocator> {
  // Oldest first; scanned in reverse.
  blocks: RefCell<Vec<Block>>,
  default_block_size: usize,
  grow: bool,
  allocator: A,
}

impl BlockSet<PageAllocator> {
  /// Creates a set with one block of `size_hint` bytes rounded up to the
  /// page size.
  pub fn new(
    size_hint: usize,
    grow: bool,
  ) -> Result<Self> {
    Self::with_options(BlockOptions { size_hint, grow })
  }

  pub fn with_options(
    options: BlockOptions,
  ) -> Result<Self> {
    Self::with_allocator(options, PageAllocator)
  }
}

impl<A: RegionAllocator> BlockSet<A> {
  pub fn with_allocator(
    options: BlockOptions,
    allocator: A,
  ) -> Result<Self> {
    let requested = options.size_hint.max(1);
    let default_block_size =
      round_to_page(requested).ok_or(Error::SizeOverflow { requested })?;

    let first = Block::new(allocator.allocate(default_block_size)?);

    log::debug!(
      "block set created: block size {default_block_size}, grow {}",
      options.grow
    );

    Ok(Self {
      blocks: RefCell::new(vec![first]),
      default_block_size,
      grow: options.grow,
      allocator,
    })
  }

  /// Carves `len` bytes out of the set.
  ///
  /// The returned slice stays valid until the set is cleared or dropped,
  /// both of which need exclusive access and so end the borrow.
  #[allow(clippy::mut_from_ref)]
  pub fn alloc(
    &self,
    len: usize,
  ) -> Result<&mut [u8]> {
    if len == 0 {
      return Err(Error::ZeroLength);
    }

    let start = match self.find_fit(len) {
      Some(start) => start,
      None => self.add_block(len)?,
    };

    Ok(unsafe { slice::from_raw_parts_mut(start, len) })
  }

  /// Allocates space for `bytes` and copies them in.
  #[allow(clippy::mut_from_ref)]
  pub fn alloc_copy(
    &self,
    bytes: &[u8],
  ) -> Result<&mut [u8]> {
    let dst = self.alloc(bytes.len())?;
    dst.copy_from_slice(bytes);

    Ok(dst)
  }

  #[allow(clippy::mut_from_ref)]
  pub fn alloc_str(
    &self,
    s: &str,
  ) -> Result<&mut str> {
    let bytes = self.alloc_copy(s.as_bytes())?;

    // Copied verbatim from a `&str`.
    Ok(unsafe { str::from_utf8_unchecked_mut(bytes) })
  }

  /// Resets every block to empty without giving memory back.
  pub fn clear(
    &mut self,
  ) {
    for block in self.blocks.get_mut().iter() {
      block.clear();
    }
  }

  pub fn block_count(
    &self,
  ) -> usize {
    self.blocks.borrow().len()
  }

  pub fn default_block_size(
    &self,
  ) -> usize {
    self.default_block_size
  }

  pub fn grows(
    &self,
  ) -> bool {
    self.grow
  }

  /// Total bytes held across all blocks.
  pub fn capacity(
    &self,
  ) -> usize {
    self.blocks.borrow().iter().map(Block::capacity).sum()
  }

  /// Bytes handed out since creation or the last clear.
  pub fn used(
    &self,
  ) -> usize {
    self.blocks.borrow().iter().map(Block::offset).sum()
  }

  /// Trailing free space summed over all blocks. A single request may still
  /// fail below this figure since it has to fit within one block.
  pub fn remaining(
    &self,
  ) -> usize {
    self.blocks.borrow().iter().map(Block::remaining).sum()
  }

  /// Whether `ptr` points into memory owned by this set.
  pub fn owns(
    &self,
    ptr: *const u8,
  ) -> bool {
    self.blocks.borrow().iter().any(|block| block.contains(ptr))
  }

  pub fn allocator(
    &self,
  ) -> &A {
    &self.allocator
  }

  fn find_fit(
    &self,
    len: usize,
  ) -> Option<*mut u8> {
    self
      .blocks
      .borrow()
      .iter()
      .rev()
      .find(|block| block.fits(len))
      .map(|block| block.carve(len))
  }

  fn add_block(
    &self,
    len: usize,
  ) -> Result<*mut u8> {
    if !self.grow {
      return Err(Error::Exhausted { requested: len });
    }

    let rounded = round_to_page(len).ok_or(Error::SizeOverflow { requested: len })?;
    let size = rounded.max(self.default_block_size);

    let block = Block::new(self.allocator.allocate(size)?);
    let start = block.carve(len);

    let mut blocks = self.blocks.borrow_mut();
    blocks.push(block);

    log::debug!(
      "block set grew to {} blocks (new block {size} bytes for a {len} byte request)",
      blocks.len()
    );

    Ok(start)
  }
}

impl<A: RegionAllocator> Drop for BlockSet<A> {
  fn drop(
    &mut self,
  ) {
    for block in self.blocks.get_mut().drain(..) {
      unsafe { self.allocator.release(block.into_region()) };
    }
  }
}

impl<A: RegionAllocator> fmt::Debug for BlockSet<A> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("BlockSet")
      .field("blocks", &self.block_count())
      .field("default_block_size", &self.default_block_size)
      .field("grow", &self.grow)
      .field("used", &self.used())
      .field("capacity", &self.capacity())
      .finish()
  }
}

// Blocks are exclusively owned; nothing is shared with other sets.
unsafe impl<A: RegionAllocator + Send> Send for BlockSet<A> {}
