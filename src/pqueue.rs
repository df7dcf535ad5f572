//! Fixed-capacity binary max-heap keyed by `f64`.
//!
//! Heap positions are 1-based: the root lives at 1 and node `i` has its
//! parent at `i / 2` and its children at `2i` and `2i + 1`. Position `i` is
//! stored at `items[i - 1]`.

use std::{fmt, slice};

use crate::error::{Error, Result};

const MIN_CAPACITY: usize = 2;

/// A key and the opaque value it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Item<V> {
  pub key: f64,
  pub value: V,
}

/// Why a [`PriorityQueue::push`] did not take the item. Both variants hand
/// the item back untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum PushError<V> {
  /// The queue already holds `capacity` items. Expected flow control, not a
  /// fault.
  Overflow(Item<V>),
  /// The key is NaN and cannot be ordered.
  InvalidKey(Item<V>),
}

impl<V> PushError<V> {
  pub fn is_overflow(
    &self,
  ) -> bool {
    matches!(self, PushError::Overflow(_))
  }

  pub fn into_item(
    self,
  ) -> Item<V> {
    match self {
      PushError::Overflow(item) | PushError::InvalidKey(item) => item,
    }
  }
}

impl<V> fmt::Display for PushError<V> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      PushError::Overflow(_) => f.write_str("priority queue is full"),
      PushError::InvalidKey(_) => f.write_str("priority key is NaN"),
    }
  }
}

impl<V: fmt::Debug> std::error::Error for PushError<V> {}

/// Array-backed max-heap that never grows past the capacity it was built
/// with.
///
/// Equal keys are not reordered against each other on insertion, but no
/// ordering among equal keys is promised on extraction.
#[derive(Debug, Clone)]
pub struct PriorityQueue<V> {
  items: Vec<Item<V>>,
  capacity: usize,
}

impl<V> PriorityQueue<V> {
  pub fn new(
    capacity: usize,
  ) -> Result<Self> {
    if capacity < MIN_CAPACITY {
      return Err(Error::CapacityTooSmall {
        capacity,
        minimum: MIN_CAPACITY,
      });
    }

    Ok(Self {
      items: Vec::with_capacity(capacity),
      capacity,
    })
  }

  /// Inserts `value` under `key`.
  ///
  /// A NaN key is rejected with [`PushError::InvalidKey`] before capacity is
  /// looked at, so a NaN pushed onto a full queue is `InvalidKey`, not
  /// `Overflow`.
  pub fn push(
    &mut self,
    key: f64,
    value: V,
  ) -> std::result::Result<(), PushError<V>> {
    let item = Item { key, value };

    if key.is_nan() {
      return Err(PushError::InvalidKey(item));
    }

    if self.is_full() {
      return Err(PushError::Overflow(item));
    }

    self.items.push(item);
    self.sift_up(self.items.len());

    Ok(())
  }

  /// The largest key and its value, without removing them.
  pub fn peek_max(
    &self,
  ) -> Option<(f64, &V)> {
    self.items.first().map(|item| (item.key, &item.value))
  }

  /// Removes and returns the largest key and its value.
  pub fn delete_max(
    &mut self,
  ) -> Option<(f64, V)> {
    if self.items.is_empty() {
      return None;
    }

    let last = self.items.len() - 1;
    self.items.swap(0, last);

    let max = self.items.pop()?;
    self.sift_down(1);

    Some((max.key, max.value))
  }

  pub fn len(
    &self,
  ) -> usize {
    self.items.len()
  }

  pub fn capacity(
    &self,
  ) -> usize {
    self.capacity
  }

  pub fn is_empty(
    &self,
  ) -> bool {
    self.items.is_empty()
  }

  pub fn is_full(
    &self,
  ) -> bool {
    self.items.len() == self.capacity
  }

  /// Drops every item; capacity is kept.
  pub fn clear(
    &mut self,
  ) {
    self.items.clear();
  }

  /// Items in heap order, which is not sorted order.
  pub fn iter(
    &self,
  ) -> slice::Iter<'_, Item<V>> {
    self.items.iter()
  }

  /// Consumes the queue, yielding items by descending key.
  pub fn into_sorted_vec(
    mut self,
  ) -> Vec<Item<V>> {
    let mut sorted = Vec::with_capacity(self.items.len());

    while let Some((key, value)) = self.delete_max() {
      sorted.push(Item { key, value });
    }

    sorted
  }

  fn key(
    &self,
    position: usize,
  ) -> f64 {
    self.items[position - 1].key
  }

  fn swap(
    &mut self,
    a: usize,
    b: usize,
  ) {
    self.items.swap(a - 1, b - 1);
  }

  fn sift_up(
    &mut self,
    mut position: usize,
  ) {
    while position > 1 {
      let parent = position / 2;

      if self.key(position) <= self.key(parent) {
        break;
      }

      self.swap(position, parent);
      position = parent;
    }
  }

  fn sift_down(
    &mut self,
    mut position: usize,
  ) {
    let len = self.items.len();

    loop {
      let left = position * 2;
      if left > len {
        break;
      }

      let right = left + 1;
      let child = if right <= len && self.key(right) >= self.key(left) {
        right
      } else {
        left
      };

      if self.key(child) <= self.key(position) {
        break;
      }

      self.swap(position, child);
      position = child;
    }
  }
}

impl<'a, V> IntoIterator for &'a PriorityQueue<V> {
  type Item = &'a Item<V>;
  type IntoIter = slice::Iter<'a, Item<V>>;

  fn into_iter(
    self,
  ) -> Self::IntoIter {
    self.iter()
  }
}
