// Root set - bounded vector of pointer-to-pointer entries the mutator
// registers so the collector knows which slots hold live heap pointers.

use tracing::warn;

/// Opaque token returned by [`RootSet::push_frame`], consumed by
/// [`RootSet::pop_frame`]. Carries the root count captured at push time.
#[derive(Debug, Clone, Copy)]
pub struct FrameToken(usize);

/// A mutator-owned slot holding either a heap-object payload pointer or
/// null. The root set stores the *address of the slot*, not its contents —
/// the contents are read fresh on every mark phase (RE2).
pub struct RootSet {
    slots: Vec<*mut *mut u8>,
    max_roots: usize,
}

impl RootSet {
    pub fn new(max_roots: usize) -> Self {
        Self {
            slots: Vec::new(),
            max_roots,
        }
    }

    /// Append a root. If the set is already at capacity, emit one
    /// diagnostic and drop the root silently (RE1, §4.3 soft-fail).
    pub fn add(&mut self, slot: *mut *mut u8) {
        if self.slots.len() >= self.max_roots {
            warn!(
                max_roots = self.max_roots,
                "root set overflow, dropping root registration"
            );
            return;
        }
        self.slots.push(slot);
    }

    /// Remove the first slot equal by identity to `slot`, shifting the
    /// tail down so ordering is preserved and no gap remains (RE1).
    pub fn remove(&mut self, slot: *mut *mut u8) {
        if let Some(pos) = self.slots.iter().position(|&s| s == slot) {
            self.slots.remove(pos);
        }
    }

    /// Capture the current root count for a later [`RootSet::pop_frame`].
    pub fn push_frame(&self) -> FrameToken {
        FrameToken(self.slots.len())
    }

    /// Truncate the root vector back to the count captured by `token`.
    ///
    /// Truncating to an index past the prior push (a misnested token) is a
    /// caller bug; debug builds catch it, release builds simply no-op the
    /// truncate since `Vec::truncate` is a no-op when `len <= token`.
    pub fn pop_frame(&mut self, token: FrameToken) {
        debug_assert!(
            token.0 <= self.slots.len(),
            "pop_frame token from a frame that already shrank below its push point"
        );
        self.slots.truncate(token.0);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate the registered slot addresses, dereferencing each to its
    /// current contents (a candidate payload pointer, possibly null).
    ///
    /// # Safety
    /// Every registered slot must still be valid to dereference (RE2) —
    /// this is the mutator's obligation, not the root set's.
    pub unsafe fn iter_candidates(&self) -> impl Iterator<Item = *mut u8> + '_ {
        self.slots.iter().map(|&slot| unsafe { *slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_first_match() {
        let mut a: *mut u8 = std::ptr::null_mut();
        let mut b: *mut u8 = std::ptr::null_mut();
        let mut roots = RootSet::new(4096);
        roots.add(&mut a as *mut *mut u8);
        roots.add(&mut b as *mut *mut u8);
        roots.add(&mut a as *mut *mut u8);
        assert_eq!(roots.len(), 3);
        roots.remove(&mut a as *mut *mut u8);
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn frame_push_pop_restores_count() {
        let mut a: *mut u8 = std::ptr::null_mut();
        let mut roots = RootSet::new(4096);
        roots.add(&mut a as *mut *mut u8);
        let token = roots.push_frame();
        roots.add(&mut a as *mut *mut u8);
        roots.add(&mut a as *mut *mut u8);
        assert_eq!(roots.len(), 3);
        roots.pop_frame(token);
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn overflow_is_soft() {
        let mut a: *mut u8 = std::ptr::null_mut();
        let mut roots = RootSet::new(1);
        roots.add(&mut a as *mut *mut u8);
        roots.add(&mut a as *mut *mut u8);
        assert_eq!(roots.len(), 1);
    }
}
