//! # rmemcore - Memory, Queue and Buffer Primitives
//!
//! This crate provides three independent, single-threaded building blocks:
//! a **segmented block allocator**, a **bounded max-heap priority queue** and
//! a **byte ring buffer** with an optional zero-copy read path.
//!
//! ## Overview
//!
//! ```text
//!   BlockSet (newest block scanned first):
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │ block 2  ┌────┬──────┬──────────────────────────────────────────────┐ │
//!   │          │ A5 │  A6  │                 free                         │ │
//!   │          └────┴──────┴──────────────────────────────────────────────┘ │
//!   │                      ▲ offset                                         │
//!   │ block 1  ┌──────────────────────────────────────────────┬─────────┐  │
//!   │          │                 A3 (oversized)               │  free   │  │
//!   │          └──────────────────────────────────────────────┴─────────┘  │
//!   │ block 0  ┌─────┬─────┬──────────────────────────────────────┬─────┐  │
//!   │          │ A1  │ A2  │                A4                    │free │  │
//!   │          └─────┴─────┴──────────────────────────────────────┴─────┘  │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Each allocation bumps the offset of the first block it fits in.
//!   Blocks are only added, never merged or freed one by one.
//! ```
//!
//! ```text
//!   PriorityQueue (1-based, parent of i is i / 2):
//!
//!                    [1] 9.0
//!                   /        \
//!              [2] 7.5      [3] 5.0
//!              /     \
//!         [4] 3.0  [5] 1.0
//! ```
//!
//! ```text
//!   RingBuffer:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │ ready ▓▓▓▓▓▓▓│            avail              │▓▓▓▓▓▓▓▓▓▓ ready       │
//!   └──────────────────────────────────────────────────────────────────────┘
//!                 ▲ write cursor                   ▲ read cursor
//!
//!   ready + avail == size, always.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rmemcore
//!   ├── align      - Alignment macros (align!, align_to!) and page size
//!   ├── region     - RegionAllocator trait, mmap and heap strategies
//!   ├── block      - One region with a bump offset (internal)
//!   ├── blocks     - BlockSet segmented allocator
//!   ├── pqueue     - PriorityQueue fixed-capacity max-heap
//!   ├── mirror     - MirrorMap double virtual mapping
//!   ├── ring       - RingBuffer, heap or mirrored backing
//!   └── error      - Error and Result
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rmemcore::{BlockSet, PriorityQueue, RingBuffer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let blocks = BlockSet::new(4096, true)?;
//!     let name = blocks.alloc_str("scratch")?;
//!     assert_eq!(name, "scratch");
//!
//!     let mut queue = PriorityQueue::new(16)?;
//!     queue.push(2.0, "low")?;
//!     queue.push(9.0, "high")?;
//!     assert_eq!(queue.delete_max(), Some((9.0, "high")));
//!
//!     let mut ring = RingBuffer::new(4096)?;
//!     ring.write(b"hello");
//!     let mut out = [0u8; 5];
//!     ring.read(&mut out);
//!     assert_eq!(&out, b"hello");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Mirrored Ring Buffers
//!
//! On Linux the ring's storage can be mapped twice back to back, so any
//! window of up to `size` bytes is contiguous in memory. Reads then need a
//! single copy, and [`RingBuffer::fast_read`] can hand out the ready bytes
//! without copying at all. Elsewhere the buffer falls back to one linear
//! heap allocation and `fast_read` reports [`Error::Unsupported`].
//!
//! ## Error Model
//!
//! - Invalid arguments (zero lengths, capacities below 2, NaN keys) are
//!   rejected before anything changes.
//! - A full queue is [`PushError::Overflow`], not an [`Error`]. A full or
//!   empty ring buffer simply transfers zero bytes.
//! - OS mapping failures and unavailable backings are hard errors at
//!   construction.
//!
//! Nothing here retries internally. Diagnostics go through the `log` facade
//! at `debug` and `trace` level only.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no internal locking
//! - **No individual frees**: block memory comes back only on clear or drop
//! - **Unix-only**: memory comes from `libc` mappings

pub mod align;
mod block;
mod blocks;
mod error;
mod mirror;
mod pqueue;
pub mod region;
mod ring;

pub use blocks::{BlockOptions, BlockSet};
pub use error::{Error, Result};
pub use mirror::MirrorMap;
pub use pqueue::{Item, PriorityQueue, PushError};
pub use region::{HeapAllocator, PageAllocator, Region, RegionAllocator};
pub use ring::{RingBuffer, RingMode};
