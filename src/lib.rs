// Conservative mark-and-sweep garbage collector for the Pain language
// runtime: heap object header, heap registry, root set, and collector.
//
// Build one `Heap` per mutator, allocate through it, register the
// storage slots that hold live payload pointers as roots, and either let
// the adaptive threshold trigger collection or call `Heap::collect`
// directly. `global` wraps a single thread-local `Heap` for callers that
// want the free-function, C-runtime-shaped surface instead.

pub mod collector;
pub mod config;
pub mod error;
pub mod global;
pub mod header;
mod heap;
pub mod roots;

pub use collector::CollectorState;
pub use config::GcConfig;
pub use error::GcError;
pub use header::{Header, HEADER_SIZE, WORD_SIZE};
pub use heap::{write_barrier, GcStats, Heap};
pub use roots::FrameToken;
