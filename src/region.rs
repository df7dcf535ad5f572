//! Region allocation strategies.
//!
//! A [`RegionAllocator`] hands out raw, page-granular spans of memory and
//! takes them back. Containers receive one at construction time and release
//! every region through the same strategy on drop, so nothing here touches
//! process-global allocator state.

use std::{
  alloc::{self, Layout},
  ptr::{self, NonNull},
};

use crate::{
  align::page_size,
  error::{Error, Result},
};

/// A raw span of memory owned by whoever holds it.
///
/// Dropping a `Region` does not free it; the holder must pass it back to the
/// allocator that produced it.
#[derive(Debug)]
pub struct Region {
  ptr: NonNull<u8>,
  len: usize,
}

impl Region {
  /// # Safety
  ///
  /// `ptr` must point to `len` bytes that are readable and writable for as
  /// long as the region is held.
  pub unsafe fn from_raw_parts(
    ptr: NonNull<u8>,
    len: usize,
  ) -> Self {
    Self { ptr, len }
  }

  pub fn as_ptr(
    &self,
  ) -> *mut u8 {
    self.ptr.as_ptr()
  }

  pub fn len(
    &self,
  ) -> usize {
    self.len
  }

  pub fn is_empty(
    &self,
  ) -> bool {
    self.len == 0
  }
}

/// Source of backing memory for blocks and heap-backed ring buffers.
pub trait RegionAllocator {
  /// Obtains a zeroed region of exactly `len` bytes.
  fn allocate(
    &self,
    len: usize,
  ) -> Result<Region>;

  /// Returns a region to the allocator.
  ///
  /// # Safety
  ///
  /// `region` must have come from `allocate` on this same allocator and must
  /// not be used afterwards.
  unsafe fn release(
    &self,
    region: Region,
  );
}

/// Anonymous private memory mappings (`mmap`/`munmap`).
#[derive(Debug, Default, Clone, Copy)]
pub struct PageAllocator;

impl RegionAllocator for PageAllocator {
  fn allocate(
    &self,
    len: usize,
  ) -> Result<Region> {
    if len == 0 {
      return Err(Error::ZeroLength);
    }

    let address = unsafe {
      libc::mmap(
        ptr::null_mut(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == libc::MAP_FAILED {
      return Err(Error::last_os(len));
    }

    log::trace!("mapped {len} bytes at {address:?}");

    let ptr = NonNull::new(address.cast::<u8>()).ok_or_else(|| Error::last_os(len))?;

    Ok(Region { ptr, len })
  }

  unsafe fn release(
    &self,
    region: Region,
  ) {
    log::trace!("unmapping {} bytes at {:?}", region.len, region.ptr);

    unsafe {
      libc::munmap(region.ptr.as_ptr().cast(), region.len);
    }
  }
}

/// Page-aligned, zeroed allocations from the global Rust allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl HeapAllocator {
  fn layout(
    len: usize,
  ) -> Result<Layout> {
    Layout::from_size_align(len, page_size()).map_err(|_| Error::SizeOverflow { requested: len })
  }
}

impl RegionAllocator for HeapAllocator {
  fn allocate(
    &self,
    len: usize,
  ) -> Result<Region> {
    if len == 0 {
      return Err(Error::ZeroLength);
    }

    let layout = Self::layout(len)?;
    let address = unsafe { alloc::alloc_zeroed(layout) };
    let ptr = NonNull::new(address).ok_or(Error::OutOfMemory { size: len })?;

    Ok(Region { ptr, len })
  }

  unsafe fn release(
    &self,
    region: Region,
  ) {
    if let Ok(layout) = Self::layout(region.len) {
      unsafe { alloc::dealloc(region.ptr.as_ptr(), layout) };
    }
  }
}

impl<A: RegionAllocator + ?Sized> RegionAllocator for &A {
  fn allocate(
    &self,
    len: usize,
  ) -> Result<Region> {
    (**self).allocate(len)
  }

  unsafe fn release(
    &self,
    region: Region,
  ) {
    unsafe { (**self).release(region) }
  }
}
