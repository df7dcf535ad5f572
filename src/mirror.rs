//! Double virtual mapping of one backing object.
//!
//! ```text
//!   virtual:   base                base + len            base + 2 * len
//!              ├───────────────────┼─────────────────────┤
//!              │   view 0          │   view 1            │
//!              └─────────┬─────────┴──────────┬──────────┘
//!                        │                    │
//!                        ▼                    ▼
//!   backing:             ┌────────────────────┐
//!                        │   memfd, len bytes │
//!                        └────────────────────┘
//! ```
//!
//! A byte written at `base + i` is visible at `base + len + i`, so any window
//! of up to `len` bytes starting anywhere in the first view is contiguous.

use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Two back-to-back views of the same `len` bytes.
pub struct MirrorMap {
  base: NonNull<u8>,
  len: usize,
}

impl MirrorMap {
  /// Whether this platform can build a mirror at all.
  pub const fn supported() -> bool {
    cfg!(target_os = "linux")
  }

  /// Maps `len` bytes twice. `len` must be a multiple of the page size.
  pub fn new(
    len: usize,
  ) -> Result<Self> {
    if len == 0 {
      return Err(Error::ZeroLength);
    }

    let base = imp::map(len)?;

    log::trace!("mirrored {len} bytes at {base:?}");

    Ok(Self { base, len })
  }

  pub fn as_ptr(
    &self,
  ) -> *mut u8 {
    self.base.as_ptr()
  }

  /// Size of one view.
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

impl Drop for MirrorMap {
  fn drop(
    &mut self,
  ) {
    unsafe { imp::unmap(self.base, self.len) };
  }
}

// The mapping is owned by exactly one MirrorMap.
unsafe impl Send for MirrorMap {}

#[cfg(target_os = "linux")]
mod imp {
  use std::ptr::{self, NonNull};

  use crate::error::{Error, Result};

  pub fn map(
    len: usize,
  ) -> Result<NonNull<u8>> {
    let fd = unsafe { libc::memfd_create(c"rmemcore-ring".as_ptr(), libc::MFD_CLOEXEC) };
    if fd < 0 {
      return Err(Error::last_os(len));
    }

    // Both views keep the object alive; the descriptor is not needed after.
    let mapped = unsafe { resize(fd, len).and_then(|()| map_twice(fd, len)) };
    unsafe { libc::close(fd) };

    mapped
  }

  unsafe fn resize(
    fd: libc::c_int,
    len: usize,
  ) -> Result<()> {
    let size = libc::off_t::try_from(len).map_err(|_| Error::SizeOverflow { requested: len })?;

    if unsafe { libc::ftruncate(fd, size) } != 0 {
      return Err(Error::last_os(len));
    }

    Ok(())
  }

  /// Reserves `2 * len` bytes and maps `fd` over both halves. On failure the
  /// whole reservation is unmapped again.
  pub unsafe fn map_twice(
    fd: libc::c_int,
    len: usize,
  ) -> Result<NonNull<u8>> {
    let total = len.checked_mul(2).ok_or(Error::SizeOverflow { requested: len })?;

    unsafe {
      let reserved = libc::mmap(
        ptr::null_mut(),
        total,
        libc::PROT_NONE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      );
      if reserved == libc::MAP_FAILED {
        return Err(Error::last_os(total));
      }

      let base = reserved.cast::<u8>();

      for view in [base, base.add(len)] {
        let mapped = libc::mmap(
          view.cast(),
          len,
          libc::PROT_READ | libc::PROT_WRITE,
          libc::MAP_SHARED | libc::MAP_FIXED,
          fd,
          0,
        );

        if mapped != view.cast::<libc::c_void>() {
          let err = Error::last_os(len);
          libc::munmap(reserved, total);
          return Err(err);
        }
      }

      NonNull::new(base).ok_or(Error::OutOfMemory { size: total })
    }
  }

  pub unsafe fn unmap(
    base: NonNull<u8>,
    len: usize,
  ) {
    unsafe { libc::munmap(base.as_ptr().cast(), len * 2) };
  }
}

#[cfg(not(target_os = "linux"))]
mod imp {
  use std::ptr::NonNull;

  use crate::error::{Error, Result};

  pub fn map(
    _len: usize,
  ) -> Result<NonNull<u8>> {
    Err(Error::Unsupported {
      what: "mirrored mapping",
    })
  }

  pub unsafe fn unmap(
    _base: NonNull<u8>,
    _len: usize,
  ) {
  }
}
