// Demonstrates the entry-point contract a generated Pain program follows
// (SPEC_FULL §6): `init()` before any mutator code, `shutdown()` once
// after `main` returns, with `anyhow::Result` carrying any host-side
// setup failure in between.

use anyhow::Context;
use pain_gc::global;

fn run() -> anyhow::Result<()> {
    global::init();

    let mut slot = global::alloc(64).as_ptr();
    unsafe { global::add_root(&mut slot as *mut *mut u8) };

    global::collect();
    let stats = global::stats();
    println!(
        "live_bytes={} cycles={} threshold={}",
        stats.live_bytes, stats.cycle_count, stats.threshold
    );

    unsafe { global::remove_root(&mut slot as *mut *mut u8) };
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    run().context("pain-gc demo run failed")?;
    global::shutdown();
    Ok(())
}
