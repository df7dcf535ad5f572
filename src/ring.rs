//! Circular byte buffer.
//!
//! ```text
//!   Heap backing, a write of n bytes at cursor c that crosses the end:
//!
//!   ┌──────────────┬──────────────────────────┬───────────────┐
//!   │ n - (C - c)  │                          │     C - c     │
//!   └──────────────┴──────────────────────────┴───────────────┘
//!   0              ▲ new cursor               c               C
//!
//!   Mirrored backing, the same write lands in one piece:
//!
//!   ┌──────────────────────────────┬──────────────────────────────┐
//!   │           view 0             │           view 1             │
//!   └──────────────────────────────┴──────────────────────────────┘
//!                         c ├────────── n ──────────┤
//! ```
//!
//! Writes and reads never fail for lack of room or data; they move fewer
//! bytes, possibly none.

use std::{fmt, mem::ManuallyDrop, ptr, slice};

use crate::{
  align::round_to_page,
  error::{Error, Result},
  mirror::MirrorMap,
  region::{HeapAllocator, Region, RegionAllocator},
};

/// Backing strategy requested at construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RingMode {
  /// Mirrored when the platform allows it, heap otherwise.
  #[default]
  Auto,
  /// Single linear buffer; wrapped transfers are split in two copies.
  Heap,
  /// Double-mapped storage; construction fails if it cannot be built.
  Mirrored,
}

struct HeapStorage<A: RegionAllocator> {
  region: ManuallyDrop<Region>,
  allocator: A,
}

impl<A: RegionAllocator> Drop for HeapStorage<A> {
  fn drop(
    &mut self,
  ) {
    let region = unsafe { ManuallyDrop::take(&mut self.region) };
    unsafe { self.allocator.release(region) };
  }
}

enum Backing<A: RegionAllocator> {
  Heap(HeapStorage<A>),
  Mirrored(MirrorMap),
}

impl<A: RegionAllocator> Backing<A> {
  fn heap(
    size: usize,
    allocator: A,
  ) -> Result<Self> {
    let region = allocator.allocate(size)?;

    Ok(Backing::Heap(HeapStorage {
      region: ManuallyDrop::new(region),
      allocator,
    }))
  }

  fn as_ptr(
    &self,
  ) -> *mut u8 {
    match self {
      Backing::Heap(storage) => storage.region.as_ptr(),
      Backing::Mirrored(mirror) => mirror.as_ptr(),
    }
  }
}

/// Fixed-size byte ring with independent read and write cursors.
///
/// `ready() + avail() == size()` holds after every call.
pub struct RingBuffer<A: RegionAllocator = HeapAllocator> {
  backing: Backing<A>,
  size: usize,
  read_pos: usize,
  write_pos: usize,
  ready: usize,
}

impl RingBuffer<HeapAllocator> {
  /// Creates a buffer of `size_hint` bytes rounded up to the page size,
  /// mirrored if possible.
  pub fn new(
    size_hint: usize,
  ) -> Result<Self> {
    Self::with_mode(size_hint, RingMode::Auto)
  }

  pub fn with_mode(
    size_hint: usize,
    mode: RingMode,
  ) -> Result<Self> {
    Self::with_allocator(size_hint, mode, HeapAllocator)
  }
}

impl<A: RegionAllocator> RingBuffer<A> {
  /// `allocator` supplies the storage when the buffer ends up heap backed.
  pub fn with_allocator(
    size_hint: usize,
    mode: RingMode,
    allocator: A,
  ) -> Result<Self> {
    Self::with_mirror(size_hint, mode, allocator, MirrorMap::new)
  }

  /// `mirror` builds the double mapping; `Auto` falls back to `allocator`
  /// whenever it fails.
  fn with_mirror(
    size_hint: usize,
    mode: RingMode,
    allocator: A,
    mirror: impl FnOnce(usize) -> Result<MirrorMap>,
  ) -> Result<Self> {
    if size_hint == 0 {
      return Err(Error::ZeroLength);
    }

    let size = round_to_page(size_hint).ok_or(Error::SizeOverflow {
      requested: size_hint,
    })?;

    let backing = match mode {
      RingMode::Heap => Backing::heap(size, allocator)?,
      RingMode::Mirrored => Backing::Mirrored(mirror(size)?),
      RingMode::Auto => match mirror(size) {
        Ok(mirror) => Backing::Mirrored(mirror),
        Err(err) => {
          log::debug!("mirrored ring of {size} bytes unavailable ({err}), using heap backing");
          Backing::heap(size, allocator)?
        }
      },
    };

    Ok(Self {
      backing,
      size,
      read_pos: 0,
      write_pos: 0,
      ready: 0,
    })
  }

  /// Copies as much of `data` as fits and returns how many bytes that was.
  pub fn write(
    &mut self,
    data: &[u8],
  ) -> usize {
    let n = data.len().min(self.avail());
    if n == 0 {
      return 0;
    }

    let base = self.backing.as_ptr();
    let at = self.write_pos;

    unsafe {
      match self.backing {
        Backing::Mirrored(_) => {
          ptr::copy_nonoverlapping(data.as_ptr(), base.add(at), n);
        }
        Backing::Heap(_) => {
          let first = n.min(self.size - at);
          ptr::copy_nonoverlapping(data.as_ptr(), base.add(at), first);
          ptr::copy_nonoverlapping(data.as_ptr().add(first), base, n - first);
        }
      }
    }

    self.write_pos = (at + n) % self.size;
    self.ready += n;

    n
  }

  /// Fills as much of `out` as there are ready bytes and returns the count.
  pub fn read(
    &mut self,
    out: &mut [u8],
  ) -> usize {
    let n = out.len().min(self.ready);
    if n == 0 {
      return 0;
    }

    let base = self.backing.as_ptr();
    let at = self.read_pos;

    unsafe {
      match self.backing {
        Backing::Mirrored(_) => {
          ptr::copy_nonoverlapping(base.add(at), out.as_mut_ptr(), n);
        }
        Backing::Heap(_) => {
          let first = n.min(self.size - at);
          ptr::copy_nonoverlapping(base.add(at), out.as_mut_ptr(), first);
          ptr::copy_nonoverlapping(base, out.as_mut_ptr().add(first), n - first);
        }
      }
    }

    self.advance_read(n);

    n
  }

  /// Consumes every ready byte and returns them as one slice into the
  /// buffer's own storage.
  ///
  /// Only a mirrored buffer can do this; a heap-backed one returns
  /// [`Error::Unsupported`] and consumes nothing. The slice borrows the
  /// buffer, so no write can overwrite it while it is alive.
  pub fn fast_read(
    &mut self,
  ) -> Result<&[u8]> {
    let start = self.mirrored_start()?;
    let len = self.ready;

    self.advance_read(len);

    Ok(unsafe { slice::from_raw_parts(start, len) })
  }

  /// Like [`RingBuffer::fast_read`] but leaves the bytes in place.
  pub fn peek(
    &self,
  ) -> Result<&[u8]> {
    let start = self.mirrored_start()?;

    Ok(unsafe { slice::from_raw_parts(start, self.ready) })
  }

  /// Discards up to `n` ready bytes and returns how many were dropped.
  pub fn consume(
    &mut self,
    n: usize,
  ) -> usize {
    let n = n.min(self.ready);
    self.advance_read(n);

    n
  }

  /// Bytes waiting to be read.
  pub fn ready(
    &self,
  ) -> usize {
    self.ready
  }

  /// Bytes that can be written before the buffer is full.
  pub fn avail(
    &self,
  ) -> usize {
    self.size - self.ready
  }

  pub fn size(
    &self,
  ) -> usize {
    self.size
  }

  pub fn is_empty(
    &self,
  ) -> bool {
    self.ready == 0
  }

  pub fn is_full(
    &self,
  ) -> bool {
    self.ready == self.size
  }

  /// The backing actually in use; never [`RingMode::Auto`].
  pub fn mode(
    &self,
  ) -> RingMode {
    match self.backing {
      Backing::Heap(_) => RingMode::Heap,
      Backing::Mirrored(_) => RingMode::Mirrored,
    }
  }

  /// Drops all content; storage is kept.
  pub fn clear(
    &mut self,
  ) {
    self.read_pos = 0;
    self.write_pos = 0;
    self.ready = 0;
  }

  fn mirrored_start(
    &self,
  ) -> Result<*const u8> {
    match &self.backing {
      Backing::Mirrored(mirror) => Ok(unsafe { mirror.as_ptr().add(self.read_pos) }.cast_const()),
      Backing::Heap(_) => Err(Error::Unsupported {
        what: "zero-copy read of a heap-backed ring buffer",
      }),
    }
  }

  fn advance_read(
    &mut self,
    n: usize,
  ) {
    self.read_pos = (self.read_pos + n) % self.size;
    self.ready -= n;
  }
}

impl<A: RegionAllocator> fmt::Debug for RingBuffer<A> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("RingBuffer")
      .field("mode", &self.mode())
      .field("size", &self.size)
      .field("ready", &self.ready)
      .field("read_pos", &self.read_pos)
      .field("write_pos", &self.write_pos)
      .finish()
  }
}

// Storage is exclusively owned by the buffer.
unsafe impl<A: RegionAllocator + Send> Send for RingBuffer<A> {}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, ptr::NonNull};

  use super::*;
  use crate::align::page_size;

  /// Hands out boxed byte slices and counts how many are outstanding.
  #[derive(Default)]
  struct VecAllocator {
    live: Cell<usize>,
  }

  impl RegionAllocator for VecAllocator {
    fn allocate(
      &self,
      len: usize,
    ) -> Result<Region> {
      let bytes = Box::into_raw(vec![0u8; len].into_boxed_slice());
      let ptr = NonNull::new(bytes.cast::<u8>()).unwrap();

      self.live.set(self.live.get() + 1);

      Ok(unsafe { Region::from_raw_parts(ptr, len) })
    }

    unsafe fn release(
      &self,
      region: Region,
    ) {
      let bytes = ptr::slice_from_raw_parts_mut(region.as_ptr(), region.len());
      drop(unsafe { Box::from_raw(bytes) });

      self.live.set(self.live.get() - 1);
    }
  }

  fn no_mirror(
    _len: usize,
  ) -> Result<MirrorMap> {
    Err(Error::Unsupported {
      what: "mirrored mapping",
    })
  }

  fn cycle(
    ring: &mut RingBuffer<impl RegionAllocator>,
    rounds: u8,
  ) {
    let chunk = ring.size() / 3 + 17;

    for round in 0..rounds {
      let data = pattern(chunk, round);
      assert_eq!(ring.write(&data), chunk);

      let mut out = vec![0; chunk];
      assert_eq!(ring.read(&mut out), chunk);
      assert_eq!(out, data, "round {round}");
    }
  }

  fn pattern(
    len: usize,
    seed: u8,
  ) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
  }

  fn modes() -> Vec<RingMode> {
    if MirrorMap::supported() {
      vec![RingMode::Heap, RingMode::Mirrored]
    } else {
      vec![RingMode::Heap]
    }
  }

  #[test]
  fn test_size_rounds_to_page() {
    for mode in modes() {
      let ring = RingBuffer::with_mode(1, mode).unwrap();

      assert_eq!(ring.size(), page_size());
      assert_eq!(ring.avail(), page_size());
      assert_eq!(ring.ready(), 0);
      assert_eq!(ring.mode(), mode);
    }
  }

  #[test]
  fn test_zero_size_rejected() {
    assert!(matches!(RingBuffer::new(0), Err(Error::ZeroLength)));
  }

  #[test]
  fn test_write_read_round_trip() {
    for mode in modes() {
      let mut ring = RingBuffer::with_mode(page_size(), mode).unwrap();
      let data = pattern(1000, 7);

      assert_eq!(ring.write(&data), 1000);
      assert_eq!(ring.ready(), 1000);

      let mut out = vec![0; 1000];
      assert_eq!(ring.read(&mut out), 1000);
      assert_eq!(out, data);
      assert!(ring.is_empty());
    }
  }

  #[test]
  fn test_wrapping_transfers_stay_intact() {
    for mode in modes() {
      let mut ring = RingBuffer::with_mode(page_size(), mode).unwrap();
      let size = ring.size();
      let chunk = size / 3 + 17;
      let mut wraps = 0;
      let mut last_write_pos = 0;

      for round in 0..12u8 {
        let data = pattern(chunk, round);

        assert_eq!(ring.write(&data), chunk);

        let mut out = vec![0; chunk];
        assert_eq!(ring.read(&mut out), chunk);
        assert_eq!(out, data, "round {round} in {mode:?}");

        if ring.write_pos < last_write_pos {
          wraps += 1;
        }
        last_write_pos = ring.write_pos;
        assert_eq!(ring.ready() + ring.avail(), size);
      }

      assert!(wraps >= 2);
    }
  }

  #[test]
  fn test_write_is_bounded_by_avail() {
    for mode in modes() {
      let mut ring = RingBuffer::with_mode(page_size(), mode).unwrap();
      let size = ring.size();

      assert_eq!(ring.write(&pattern(size - 10, 1)), size - 10);
      assert_eq!(ring.write(&pattern(64, 2)), 10);
      assert!(ring.is_full());
      assert_eq!(ring.write(&[0xFF]), 0);
      assert_eq!(ring.avail(), 0);
    }
  }

  #[test]
  fn test_read_is_bounded_by_ready() {
    for mode in modes() {
      let mut ring = RingBuffer::with_mode(page_size(), mode).unwrap();
      let mut out = [0u8; 16];

      assert_eq!(ring.read(&mut out), 0);

      ring.write(b"abc");
      assert_eq!(ring.read(&mut out), 3);
      assert_eq!(&out[..3], b"abc");
      assert_eq!(ring.read(&mut out), 0);
    }
  }

  #[test]
  fn test_fast_read_unsupported_on_heap() {
    let mut ring = RingBuffer::with_mode(page_size(), RingMode::Heap).unwrap();
    ring.write(b"data");

    assert!(matches!(ring.fast_read(), Err(Error::Unsupported { .. })));
    assert!(matches!(ring.peek(), Err(Error::Unsupported { .. })));
    assert_eq!(ring.ready(), 4);
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn test_fast_read_across_boundary() {
    let mut ring = RingBuffer::with_mode(page_size(), RingMode::Mirrored).unwrap();
    let size = ring.size();

    ring.write(&pattern(size - 5, 0));
    assert_eq!(ring.consume(size - 5), size - 5);

    let data = pattern(20, 9);
    ring.write(&data);

    assert_eq!(ring.peek().unwrap(), &data[..]);
    assert_eq!(ring.fast_read().unwrap(), &data[..]);
    assert!(ring.is_empty());
    assert_eq!(ring.fast_read().unwrap(), &[] as &[u8]);
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn test_auto_prefers_mirrored() {
    let ring = RingBuffer::new(page_size()).unwrap();

    assert_eq!(ring.mode(), RingMode::Mirrored);
  }

  #[test]
  fn test_auto_falls_back_to_heap() {
    let allocator = VecAllocator::default();

    {
      let mut ring = RingBuffer::with_mirror(page_size(), RingMode::Auto, &allocator, no_mirror).unwrap();

      assert_eq!(ring.mode(), RingMode::Heap);
      assert_eq!(ring.size(), page_size());
      assert_eq!(allocator.live.get(), 1);
      assert!(matches!(ring.fast_read(), Err(Error::Unsupported { .. })));

      cycle(&mut ring, 8);
    }

    assert_eq!(allocator.live.get(), 0);
  }

  #[test]
  fn test_mirrored_failure_is_hard_error() {
    let allocator = VecAllocator::default();
    let err = RingBuffer::with_mirror(page_size(), RingMode::Mirrored, &allocator, no_mirror).unwrap_err();

    assert!(matches!(err, Error::Unsupported { .. }));
    assert_eq!(allocator.live.get(), 0);
  }

  #[test]
  fn test_custom_allocator_backs_heap_ring() {
    let allocator = VecAllocator::default();

    {
      let mut ring = RingBuffer::with_allocator(100, RingMode::Heap, &allocator).unwrap();

      assert_eq!(ring.size(), page_size());
      assert_eq!(allocator.live.get(), 1);

      cycle(&mut ring, 10);
      assert_eq!(ring.ready() + ring.avail(), ring.size());
    }

    assert_eq!(allocator.live.get(), 0);
  }

  #[test]
  fn test_clear_resets_cursors() {
    for mode in modes() {
      let mut ring = RingBuffer::with_mode(page_size(), mode).unwrap();

      ring.write(&pattern(300, 3));
      ring.consume(100);
      ring.clear();

      assert_eq!(ring.ready(), 0);
      assert_eq!(ring.avail(), ring.size());

      ring.write(b"fresh");
      let mut out = [0u8; 5];
      ring.read(&mut out);
      assert_eq!(&out, b"fresh");
    }
  }

  #[test]
  fn test_consume_is_bounded() {
    let mut ring = RingBuffer::with_mode(page_size(), RingMode::Heap).unwrap();

    ring.write(b"0123456789");
    assert_eq!(ring.consume(4), 4);

    let mut out = [0u8; 6];
    assert_eq!(ring.read(&mut out), 6);
    assert_eq!(&out, b"456789");
    assert_eq!(ring.consume(4), 0);
  }
}
