// Error kinds for the collector. Only `InvalidConfig` is ever returned as an
// ordinary `Result`; the other two back fatal messages on their way to exit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GcError {
    #[error("out of memory: allocator refused {requested_bytes} bytes after one collection")]
    AllocatorExhausted { requested_bytes: usize },

    #[error(
        "memory limit exceeded ({allocated} bytes allocated, limit is {limit} bytes, requested {requested} bytes)"
    )]
    CeilingExceeded {
        allocated: usize,
        limit: usize,
        requested: usize,
    },

    #[error("invalid GcConfig: {reason}")]
    InvalidConfig { reason: String },
}
