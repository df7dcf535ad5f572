use std::sync::OnceLock;

/// Rounds a size up to the machine word size.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use rmemcore::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, ::std::mem::size_of::<usize>())
  };
}

/// Rounds a size up to a power-of-two boundary.
///
/// ```rust
/// use rmemcore::align_to;
///
/// assert_eq!(align_to!(1, 4096), 4096);
/// assert_eq!(align_to!(4096, 4096), 4096);
/// assert_eq!(align_to!(4097, 4096), 8192);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $boundary:expr) => {
    ($value + $boundary - 1) & !($boundary - 1)
  };
}

const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the OS page size, queried once per process.
pub fn page_size() -> usize {
  static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

  *PAGE_SIZE.get_or_init(|| {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

    if size > 0 && (size as usize).is_power_of_two() {
      size as usize
    } else {
      log::debug!("sysconf(_SC_PAGESIZE) returned {size}, assuming {FALLBACK_PAGE_SIZE}");
      FALLBACK_PAGE_SIZE
    }
  })
}

/// Rounds `len` up to a whole number of pages.
///
/// Returns `None` when the rounded value does not fit in a `usize`.
pub fn round_to_page(
  len: usize,
) -> Option<usize> {
  let page = page_size();

  len.checked_add(page - 1).map(|padded| padded & !(page - 1))
}

#[cfg(test)]
mod tests {
  use std::mem;

  use super::*;

  #[test]
  fn test_align_to_boundaries() {
    for boundary in [1usize, 2, 64, 4096, 65536] {
      assert_eq!(align_to!(0usize, boundary), 0);
      assert_eq!(align_to!(1usize, boundary), boundary);
      assert_eq!(align_to!(boundary, boundary), boundary);
      assert_eq!(align_to!(boundary + 1, boundary), boundary * 2);
    }
  }

  #[test]
  fn test_align_rounds_to_word() {
    let word = mem::size_of::<usize>();

    for size in 1..=word * 10 {
      assert_eq!(align!(size), size.div_ceil(word) * word);
      assert_eq!(align!(size), align_to!(size, word));
    }
  }

  #[test]
  fn test_page_size_is_power_of_two() {
    let page = page_size();

    assert!(page.is_power_of_two());
    assert_eq!(page, page_size());
  }

  #[test]
  fn test_round_to_page() {
    let page = page_size();

    assert_eq!(round_to_page(0), Some(0));
    assert_eq!(round_to_page(1), Some(page));
    assert_eq!(round_to_page(page), Some(page));
    assert_eq!(round_to_page(page + 1), Some(page * 2));
    assert_eq!(round_to_page(usize::MAX), None);
  }
}
