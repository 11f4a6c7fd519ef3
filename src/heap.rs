// Heap registry: the process-facing `Heap` handle and its private
// `HeapInner` state. `Heap` wraps a `RefCell<HeapInner>` so a
// single-threaded caller gets interior mutability without a lock, and
// tests can build as many independent heaps as they like.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::cell::RefCell;
use std::mem::align_of;
use std::ptr::NonNull;

use tracing::{error, trace};

use crate::collector::{self, CollectorState};
use crate::config::GcConfig;
use crate::error::GcError;
use crate::header::{Header, HEADER_SIZE};
use crate::roots::{FrameToken, RootSet};

/// Read-only snapshot of the registry's bookkeeping counters (§6 `stats()`).
#[derive(Debug, Clone, Copy)]
pub struct GcStats {
    pub live_bytes: usize,
    pub collected_bytes: usize,
    pub cycle_count: usize,
    pub threshold: usize,
    pub root_count: usize,
}

pub(crate) struct HeapInner {
    pub(crate) head: *mut Header,
    pub(crate) roots: RootSet,
    pub(crate) alloc_since_gc: usize,
    pub(crate) threshold: usize,
    pub(crate) total_allocated: usize,
    pub(crate) collected_total: usize,
    pub(crate) cycle_count: usize,
    pub(crate) memory_limit: usize,
    pub(crate) state: CollectorState,
    config: GcConfig,
}

impl HeapInner {
    fn new(config: GcConfig) -> Self {
        Self {
            head: std::ptr::null_mut(),
            roots: RootSet::new(config.max_roots),
            alloc_since_gc: 0,
            threshold: config.initial_threshold,
            total_allocated: 0,
            collected_total: 0,
            cycle_count: 0,
            memory_limit: config.memory_limit_bytes,
            state: CollectorState::Idle,
            config,
        }
    }

    /// Release every header on the intrusive list to the host allocator,
    /// crediting the bytes to the cumulative-collected total. Used by both
    /// `shutdown()` and `Drop`.
    fn free_all(&mut self) {
        let mut cur = self.head;
        while !cur.is_null() {
            unsafe {
                let next = (*cur).next;
                let size = (*cur).size;
                let layout = Layout::from_size_align(HEADER_SIZE + size, align_of::<Header>())
                    .expect("header+payload layout was valid at allocation time");
                dealloc(cur as *mut u8, layout);
                self.collected_total += size;
                cur = next;
            }
        }
        self.head = std::ptr::null_mut();
        self.total_allocated = 0;
    }
}

impl Drop for HeapInner {
    fn drop(&mut self) {
        self.free_all();
    }
}

/// A conservative mark-and-sweep heap registry.
///
/// `Heap` is the unit of testing and embedding: construct one per mutator
/// (or per test), drive it with [`Heap::alloc`], register roots with
/// [`Heap::add_root`], and force a cycle with [`Heap::collect`]. The
/// free-function API in [`crate::global`] wraps a single thread-local
/// `Heap` for callers that want the C-runtime-shaped `init`/`shutdown`
/// surface described in §6.
pub struct Heap {
    inner: RefCell<HeapInner>,
}

impl Heap {
    /// Build a heap with the default construction knobs: threshold 1024, no
    /// ceiling, 4096-root cap (§4.2 `init()`).
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(HeapInner::new(GcConfig::default())),
        }
    }

    /// Build a heap with overridden construction-time knobs (`[AMBIENT]`,
    /// SPEC_FULL §6).
    pub fn with_config(config: GcConfig) -> Result<Self, GcError> {
        config.validate()?;
        Ok(Self {
            inner: RefCell::new(HeapInner::new(config)),
        })
    }

    /// Free every live object and reset the registry to the state it had
    /// right after construction (§4.2 `shutdown()`). All payload pointers
    /// obtained before this call are dangling afterwards — §9 open
    /// question, resolved: shutdown does not distinguish rooted survivors.
    pub fn shutdown(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.free_all();
        let config = inner.config;
        *inner = HeapInner::new(config);
    }

    /// Allocate `n` zero-initialised bytes and return the payload pointer
    /// (§4.2 `alloc()`).
    ///
    /// Under the `no_gc` feature this still writes a header so
    /// [`Heap::free`] can recover the size, but never links the object into
    /// the intrusive list and never triggers a collection — the object is
    /// only ever reclaimed by an explicit `free` call.
    #[cfg(feature = "no_gc")]
    pub fn alloc(&self, n: usize) -> NonNull<u8> {
        let mut inner = self.inner.borrow_mut();
        let layout = Layout::from_size_align(HEADER_SIZE + n, align_of::<Header>())
            .expect("requested size does not overflow isize when combined with the header");
        let raw = unsafe { alloc_zeroed(layout) };
        if raw.is_null() {
            fatal_allocator_exhausted(n);
        }
        let header = raw as *mut Header;
        unsafe {
            (*header).next = std::ptr::null_mut();
            (*header).size = n;
            (*header).marked = false;
        }
        inner.total_allocated += n;
        unsafe { Header::payload(NonNull::new_unchecked(header)) }
    }

    #[cfg(not(feature = "no_gc"))]
    pub fn alloc(&self, n: usize) -> NonNull<u8> {
        let mut inner = self.inner.borrow_mut();

        if inner.alloc_since_gc >= inner.threshold {
            trace!(threshold = inner.threshold, "threshold reached, collecting before alloc");
            collector::run_cycle(&mut *inner);
        }

        if inner.memory_limit > 0 && inner.total_allocated + n > inner.memory_limit {
            collector::run_cycle(&mut *inner);
            if inner.total_allocated + n > inner.memory_limit {
                fatal_ceiling_exceeded(inner.total_allocated, inner.memory_limit, n);
            }
        }

        let layout = Layout::from_size_align(HEADER_SIZE + n, align_of::<Header>())
            .expect("requested size does not overflow isize when combined with the header");

        let raw = unsafe { alloc_zeroed(layout) };
        let raw = if raw.is_null() {
            collector::run_cycle(&mut *inner);
            let retry = unsafe { alloc_zeroed(layout) };
            if retry.is_null() {
                fatal_allocator_exhausted(n);
            }
            retry
        } else {
            raw
        };

        let header = raw as *mut Header;
        unsafe {
            (*header).next = inner.head;
            (*header).size = n;
            (*header).marked = false;
        }
        inner.head = header;
        inner.alloc_since_gc += 1;
        inner.total_allocated += n;

        unsafe { Header::payload(NonNull::new_unchecked(header)) }
    }

    /// Release a `no_gc`-mode allocation directly to the host allocator.
    /// There is no list to unlink from — `alloc` under this feature never
    /// links one.
    ///
    /// # Safety
    /// `payload` must be a still-live pointer returned by [`Heap::alloc`]
    /// on this heap, not previously freed.
    #[cfg(feature = "no_gc")]
    pub unsafe fn free(&self, payload: NonNull<u8>) {
        let mut inner = self.inner.borrow_mut();
        let header = Header::from_payload(payload).as_ptr();
        let size = unsafe { (*header).size };
        inner.total_allocated -= size;
        let layout = Layout::from_size_align(HEADER_SIZE + size, align_of::<Header>())
            .expect("header+payload layout was valid at allocation time");
        unsafe { dealloc(header as *mut u8, layout) };
    }

    /// Explicit manual-free escape hatch (§4.2 `free()`). Unlinks the
    /// header if present on the list; falls through to the host allocator
    /// either way, best-effort.
    ///
    /// # Safety
    /// `payload` must be a still-live pointer returned by [`Heap::alloc`]
    /// on this heap, not previously freed or swept. Calling this on a
    /// payload another root still references is the mutator's bug, not
    /// this function's — a subsequent scan of that root is undefined.
    #[cfg(not(feature = "no_gc"))]
    pub unsafe fn free(&self, payload: NonNull<u8>) {
        let mut inner = self.inner.borrow_mut();
        let header = Header::from_payload(payload).as_ptr();

        let mut cursor: *mut *mut Header = &mut inner.head;
        let mut found = false;
        unsafe {
            while !(*cursor).is_null() {
                if *cursor == header {
                    *cursor = (*header).next;
                    found = true;
                    break;
                }
                cursor = &mut (**cursor).next;
            }
        }

        let size = unsafe { (*header).size };
        if found {
            inner.total_allocated -= size;
        }
        let layout = Layout::from_size_align(HEADER_SIZE + size, align_of::<Header>())
            .expect("header+payload layout was valid at allocation time");
        unsafe { dealloc(header as *mut u8, layout) };
    }

    /// Register a mutator-owned slot as a root (§4.3 `add_root`).
    ///
    /// # Safety
    /// `slot` must stay valid to dereference for as long as it remains
    /// registered (RE2) — the mutator owns the slot's storage.
    pub unsafe fn add_root(&self, slot: *mut *mut u8) {
        self.inner.borrow_mut().roots.add(slot);
    }

    /// Unregister the first root matching `slot` by identity (§4.3
    /// `remove_root`).
    ///
    /// # Safety
    /// Must be called with a `slot` previously passed to [`Heap::add_root`]
    /// on this heap.
    pub unsafe fn remove_root(&self, slot: *mut *mut u8) {
        self.inner.borrow_mut().roots.remove(slot);
    }

    /// Capture the current root count for a later [`Heap::pop_frame`]
    /// (§4.3 `push_frame`).
    pub fn push_frame(&self) -> FrameToken {
        self.inner.borrow().roots.push_frame()
    }

    /// Truncate the root vector back to the count captured by `token`
    /// (§4.3 `pop_frame`).
    pub fn pop_frame(&self, token: FrameToken) {
        self.inner.borrow_mut().roots.pop_frame(token);
    }

    /// No-op under the `no_gc` feature: objects are only ever reclaimed by
    /// an explicit [`Heap::free`] call.
    #[cfg(feature = "no_gc")]
    pub fn collect(&self) {}

    /// Force a mark-sweep cycle now (§6 `collect()`).
    #[cfg(not(feature = "no_gc"))]
    pub fn collect(&self) {
        let mut inner = self.inner.borrow_mut();
        collector::run_cycle(&mut *inner);
    }

    /// Set or clear (with `0`) the hard memory ceiling (§6
    /// `set_memory_limit`).
    pub fn set_memory_limit(&self, bytes: usize) {
        self.inner.borrow_mut().memory_limit = bytes;
    }

    /// Read-only snapshot of the registry's counters (§6 `stats()`).
    pub fn stats(&self) -> GcStats {
        let inner = self.inner.borrow();
        GcStats {
            live_bytes: inner.total_allocated,
            collected_bytes: inner.collected_total,
            cycle_count: inner.cycle_count,
            threshold: inner.threshold,
            root_count: inner.roots.len(),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Reserved write-barrier hook (§5, §9 Design Note). A no-op today beyond
/// the plain slot assignment; kept with this shape so a future generational
/// collector can intercept pointer writes without an API break.
///
/// # Safety
/// `slot` must be a valid, writable `*mut *mut u8` the mutator owns.
pub unsafe fn write_barrier(slot: *mut *mut u8, value: *mut u8) {
    unsafe { *slot = value };
}

/// Terminate the process after a ceiling violation survives a collection
/// (§4.2 step 2, §7). Never returns.
fn fatal_ceiling_exceeded(allocated: usize, limit: usize, requested: usize) -> ! {
    let err = GcError::CeilingExceeded {
        allocated,
        limit,
        requested,
    };
    error!(allocated, limit, requested, "{}", err);
    eprintln!("pain-gc: fatal: memory ceiling exceeded");
    eprintln!(
        "  {} bytes allocated, limit is {} bytes, requested {} bytes",
        allocated, limit, requested
    );
    eprintln!(
        "  increase the ceiling via GcConfig::memory_limit_bytes / Heap::set_memory_limit, or reduce allocation pressure"
    );
    std::process::exit(137);
}

/// Terminate the process after the host allocator refuses twice (§4.2
/// step 3, §7). Never returns.
fn fatal_allocator_exhausted(requested_bytes: usize) -> ! {
    let err = GcError::AllocatorExhausted { requested_bytes };
    error!(requested_bytes, "{}", err);
    eprintln!("pain-gc: fatal: {}", err);
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_free_unlinks_and_prevents_rescan() {
        let heap = Heap::new();
        let payload = heap.alloc(100);
        unsafe { heap.free(payload) };
        heap.collect();
        assert_eq!(heap.stats().live_bytes, 0);
    }

    #[test]
    fn shutdown_resets_to_init_state() {
        let heap = Heap::new();
        let _ = heap.alloc(64);
        heap.shutdown();
        let stats = heap.stats();
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.threshold, crate::config::DEFAULT_INITIAL_THRESHOLD);
    }

    #[test]
    fn zero_disables_ceiling() {
        let heap = Heap::new();
        heap.set_memory_limit(128);
        heap.set_memory_limit(0);
        let _ = heap.alloc(1024);
        assert_eq!(heap.stats().live_bytes, 1024);
    }

    #[test]
    fn write_barrier_writes_through() {
        let mut slot: *mut u8 = std::ptr::null_mut();
        let value = 0x2a as *mut u8;
        unsafe { write_barrier(&mut slot as *mut *mut u8, value) };
        assert_eq!(slot, value);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GcConfig {
            initial_threshold: 1024,
            memory_limit_bytes: 0,
            max_roots: 0,
        };
        assert!(Heap::with_config(config).is_err());
    }
}
