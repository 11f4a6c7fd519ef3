// Process-wide convenience API. Wraps a single thread-local `Heap` so
// callers that want the C-runtime-shaped init/shutdown/alloc/... surface
// don't have to thread a `Heap` handle through themselves. Prefer `Heap`
// directly in new code and tests - it composes better.

use std::cell::RefCell;
use std::ptr::NonNull;

use crate::heap::{GcStats, Heap};
use crate::roots::FrameToken;

thread_local! {
    static GLOBAL: RefCell<Option<Heap>> = const { RefCell::new(None) };
}

/// Initialise the process-wide heap. Must be called before any other
/// function in this module (§6 entry-point contract).
pub fn init() {
    GLOBAL.with(|g| *g.borrow_mut() = Some(Heap::new()));
}

/// Free every live object and drop the process-wide heap. Safe to call
/// more than once; a second call is a no-op.
pub fn shutdown() {
    GLOBAL.with(|g| {
        if let Some(heap) = g.borrow_mut().take() {
            heap.shutdown();
        }
    });
}

fn with_heap<R>(f: impl FnOnce(&Heap) -> R) -> R {
    GLOBAL.with(|g| {
        let guard = g.borrow();
        let heap = guard
            .as_ref()
            .expect("pain_gc::global::init() must be called before any mutator operation");
        f(heap)
    })
}

pub fn alloc(size_bytes: usize) -> NonNull<u8> {
    with_heap(|h| h.alloc(size_bytes))
}

/// # Safety
/// See [`Heap::add_root`].
pub unsafe fn add_root(slot: *mut *mut u8) {
    with_heap(|h| unsafe { h.add_root(slot) })
}

/// # Safety
/// See [`Heap::remove_root`].
pub unsafe fn remove_root(slot: *mut *mut u8) {
    with_heap(|h| unsafe { h.remove_root(slot) })
}

pub fn push_frame() -> FrameToken {
    with_heap(|h| h.push_frame())
}

pub fn pop_frame(token: FrameToken) {
    with_heap(|h| h.pop_frame(token))
}

pub fn collect() {
    with_heap(|h| h.collect())
}

pub fn set_memory_limit(bytes: usize) {
    with_heap(|h| h.set_memory_limit(bytes))
}

pub fn stats() -> GcStats {
    with_heap(|h| h.stats())
}

/// # Safety
/// See [`Heap::free`].
pub unsafe fn free(payload: NonNull<u8>) {
    with_heap(|h| unsafe { h.free(payload) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_round_trip() {
        init();
        let mut slot = alloc(32).as_ptr();
        unsafe { add_root(&mut slot as *mut *mut u8) };
        collect();
        assert_eq!(stats().live_bytes, 32);
        unsafe { remove_root(&mut slot as *mut *mut u8) };
        shutdown();
        // idempotent
        shutdown();
    }

    #[test]
    #[should_panic(expected = "init() must be called")]
    fn operations_before_init_panic() {
        shutdown(); // ensure clean slate for this thread
        stats();
    }
}
