use std::io::Read;

use rmemcore::{BlockSet, PriorityQueue, PushError, RingBuffer, RingMode};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect the process with tools like `pmap` and see
/// the block and ring mappings appear.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  // RUST_LOG=debug shows block growth and ring backing decisions.
  env_logger::init();

  println!("PID = {}", std::process::id());

  // --------------------------------------------------------------------
  // 1) A block set with a single page and growth enabled.
  // --------------------------------------------------------------------
  let blocks = BlockSet::new(4096, true)?;
  println!("\n[1] {blocks:?}");

  let greeting = blocks.alloc_str("hello from block 0")?;
  let scratch = blocks.alloc(64)?;
  scratch.fill(0xAB);
  println!("[1] greeting at {:p}: {greeting}", greeting.as_ptr());
  println!("[1] scratch  at {:p}", scratch.as_ptr());

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) A request larger than the default block forces a new block.
  // --------------------------------------------------------------------
  let big = blocks.alloc(64 * 1024)?;
  println!("\n[2] 64 KiB allocation at {:p}", big.as_ptr());
  println!("[2] {blocks:?}");

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A bounded priority queue: the overflow comes back as a value.
  // --------------------------------------------------------------------
  let mut queue = PriorityQueue::new(4)?;
  for (key, name) in [(3.0, "c"), (9.0, "a"), (1.0, "d"), (5.0, "b")] {
    queue.push(key, name)?;
  }

  match queue.push(7.0, "late") {
    Err(PushError::Overflow(item)) => println!("\n[3] queue full, {:?} handed back", item),
    other => other?,
  }

  while let Some((key, name)) = queue.delete_max() {
    println!("[3] {key:>4} -> {name}");
  }

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) A ring buffer; mirrored when the platform allows it.
  // --------------------------------------------------------------------
  let mut ring = RingBuffer::with_mode(4096, RingMode::Auto)?;
  println!("\n[4] {ring:?}");

  let written = ring.write(&[0x42; 5000]);
  println!("[4] wrote {written} of 5000 bytes, avail = {}", ring.avail());

  let mut out = [0u8; 1000];
  let read = ring.read(&mut out);
  println!("[4] read {read} bytes, ready = {}", ring.ready());

  match ring.fast_read() {
    Ok(bytes) => println!("[4] fast_read borrowed {} bytes in place", bytes.len()),
    Err(err) => println!("[4] fast_read unavailable: {err}"),
  }

  println!("\n[5] End of tour. Everything is released on drop.");

  Ok(())
}
