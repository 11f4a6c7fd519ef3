// Mark-and-sweep collector. Operates directly on HeapInner; owns no state
// of its own beyond the transient mark worklist.

use std::alloc::{dealloc, Layout};
use tracing::{debug, trace};

use crate::header::{Header, HEADER_SIZE, WORD_SIZE};
use crate::heap::HeapInner;

/// Collector phase for the cycle currently in progress (§4.4 state
/// machine). Only [`run_cycle`] drives transitions, and always in this
/// order — there is no abort or rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Marking,
    Sweeping,
}

/// Run one full mark-sweep-bookkeeping cycle to completion.
pub(crate) fn run_cycle(inner: &mut HeapInner) {
    let before = inner.total_allocated;
    debug!(total_allocated = before, cycle = inner.cycle_count, "gc cycle start");

    inner.state = CollectorState::Marking;
    mark(inner);

    inner.state = CollectorState::Sweeping;
    let survivors = sweep(inner);

    inner.state = CollectorState::Idle;
    bookkeep(inner, survivors);

    debug!(
        freed = before.saturating_sub(inner.total_allocated),
        total_allocated = inner.total_allocated,
        cycle = inner.cycle_count,
        threshold = inner.threshold,
        "gc cycle end"
    );
}

/// Mark phase: walk every root, conservatively resolve its contents against
/// the registry, and transitively mark reachable objects via an explicit
/// worklist (Design Note §9: recursive mark → explicit worklist).
fn mark(inner: &mut HeapInner) {
    let mut worklist: Vec<*mut Header> = Vec::new();

    // SAFETY: every registered root slot is guaranteed valid to dereference
    // by the mutator for as long as it stays registered (RE2).
    let candidates: Vec<*mut u8> = unsafe { inner.roots.iter_candidates().collect() };

    for candidate in candidates {
        if candidate.is_null() {
            continue;
        }
        if let Some(header) = resolve(inner, candidate as usize) {
            mark_one(header, &mut worklist);
        }
    }

    while let Some(header) = worklist.pop() {
        scan_body(inner, header, &mut worklist);
    }
}

/// Set the mark bit on a freshly-discovered object and enqueue its body for
/// scanning, if it was not already marked.
fn mark_one(header: *mut Header, worklist: &mut Vec<*mut Header>) {
    unsafe {
        if !(*header).marked {
            (*header).marked = true;
            worklist.push(header);
        }
    }
}

/// Read a marked object's payload as pointer-sized, pointer-aligned words
/// and conservatively resolve each one (§4.4 Body scanning).
fn scan_body(inner: &HeapInner, header: *mut Header, worklist: &mut Vec<*mut Header>) {
    unsafe {
        let size = (*header).size;
        let word_count = size / WORD_SIZE;
        let payload = Header::payload(std::ptr::NonNull::new_unchecked(header));
        let words = payload.as_ptr() as *const usize;
        for i in 0..word_count {
            let word = words.add(i).read();
            if word == 0 {
                continue;
            }
            if let Some(candidate_header) = resolve(inner, word) {
                mark_one(candidate_header, worklist);
            }
        }
    }
}

/// Conservative pointer resolution: does `p - HEADER_SIZE` match the
/// address of some header currently on the intrusive list? A linear walk
/// is sufficient and correct per §4.4 — no range trees, no sorted index.
fn resolve(inner: &HeapInner, p: usize) -> Option<*mut Header> {
    if p < HEADER_SIZE {
        return None;
    }

    let mut cur = inner.head;
    while !cur.is_null() {
        if Header::payload_addr(cur) == p {
            return Some(cur);
        }
        cur = unsafe { (*cur).next };
    }
    None
}

/// Sweep phase: free unmarked objects, clear marks on survivors (§4.4).
/// Returns the number of surviving objects for the adaptive threshold
/// policy.
fn sweep(inner: &mut HeapInner) -> usize {
    let mut survivors = 0usize;
    let mut cursor: *mut *mut Header = &mut inner.head;

    unsafe {
        while !(*cursor).is_null() {
            let cur = *cursor;
            if (*cur).marked {
                (*cur).marked = false;
                survivors += 1;
                cursor = &mut (*cur).next;
            } else {
                let next = (*cur).next;
                *cursor = next;

                let size = (*cur).size;
                inner.total_allocated -= size;
                inner.collected_total += size;

                let layout = Layout::from_size_align(HEADER_SIZE + size, std::mem::align_of::<Header>())
                    .expect("header+payload layout was valid at allocation time");
                dealloc(cur as *mut u8, layout);
            }
        }
    }

    trace!(survivors, "sweep phase complete");
    survivors
}

/// Post-cycle bookkeeping: reset the allocation counter, bump the cycle
/// count, and adaptively grow the threshold when the live set is large
/// (§4.4 Post-cycle bookkeeping).
fn bookkeep(inner: &mut HeapInner, survivors: usize) {
    inner.alloc_since_gc = 0;
    inner.cycle_count += 1;
    if survivors > inner.threshold / 2 {
        inner.threshold *= 2;
        debug!(new_threshold = inner.threshold, "gc threshold grown");
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GcConfig;
    use crate::Heap;

    #[test]
    fn unreached_allocation_is_freed() {
        let heap = Heap::new();
        let _payload = heap.alloc(64);
        heap.collect();
        assert_eq!(heap.stats().live_bytes, 0);
    }

    #[test]
    fn rooted_allocation_survives() {
        let heap = Heap::new();
        let mut slot = heap.alloc(64).as_ptr();
        unsafe { heap.add_root(&mut slot as *mut *mut u8) };
        heap.collect();
        assert_eq!(heap.stats().live_bytes, 64);
        unsafe { heap.remove_root(&mut slot as *mut *mut u8) };
    }

    #[test]
    fn self_referential_cycle_with_no_root_is_collected() {
        let heap = Heap::new();
        let a = heap.alloc(crate::header::WORD_SIZE * 4);
        let b = heap.alloc(crate::header::WORD_SIZE * 4);
        unsafe {
            (a.as_ptr() as *mut usize).write(b.as_ptr() as usize);
            (b.as_ptr() as *mut usize).write(a.as_ptr() as usize);
        }
        heap.collect();
        assert_eq!(heap.stats().live_bytes, 0);
    }

    #[test]
    fn adaptive_threshold_grows_under_sustained_load() {
        let heap = Heap::with_config(GcConfig {
            initial_threshold: 4,
            memory_limit_bytes: 0,
            max_roots: 4096,
        })
        .unwrap();

        let mut slots: Vec<Box<*mut u8>> = Vec::new();
        for _ in 0..5 {
            let mut boxed = Box::new(heap.alloc(8).as_ptr());
            let root_ptr: *mut *mut u8 = &mut *boxed;
            unsafe { heap.add_root(root_ptr) };
            slots.push(boxed);
        }
        assert_eq!(heap.stats().threshold, 8);
    }
}
