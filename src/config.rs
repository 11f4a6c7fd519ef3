// Construction-time knobs for a Heap.

use crate::error::GcError;

/// Allocation count that triggers the first collection (§3, Heap Registry).
pub const DEFAULT_INITIAL_THRESHOLD: usize = 1024;

/// Hard cap on simultaneously registered roots (§3, Root Entry RE1/RE2; §9
/// open question on the 4096 magic number).
pub const DEFAULT_MAX_ROOTS: usize = 4096;

/// Construction-time configuration for a [`crate::Heap`].
///
/// `Heap::new()` uses the hardcoded defaults below (threshold 1024, no
/// ceiling, 4096-root cap); `Heap::with_config` accepts any of these three
/// overridden, which is what lets the adaptive-threshold and ceiling-
/// exhaustion scenarios be expressed as ordinary tests instead of needing a
/// 1025-allocation loop every time.
#[derive(Debug, Clone, Copy)]
pub struct GcConfig {
    pub initial_threshold: usize,
    pub memory_limit_bytes: usize,
    pub max_roots: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_threshold: DEFAULT_INITIAL_THRESHOLD,
            memory_limit_bytes: 0,
            max_roots: DEFAULT_MAX_ROOTS,
        }
    }
}

impl GcConfig {
    /// Validate the configuration, rejecting a zero root cap (which would
    /// make `add_root` unconditionally soft-fail and is almost certainly a
    /// caller mistake rather than an intentional root-less embedding).
    pub(crate) fn validate(&self) -> Result<(), GcError> {
        if self.max_roots == 0 {
            return Err(GcError::InvalidConfig {
                reason: "max_roots must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
