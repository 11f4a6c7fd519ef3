// Heap object header: the fixed prefix stored in front of every GC-managed
// allocation. Never scanned itself; payload bytes are the scanning target.

use std::mem;
use std::ptr::NonNull;

/// Pointer-sized, pointer-aligned word. The unit the conservative scanner
/// steps through a payload by.
pub const WORD_SIZE: usize = mem::size_of::<usize>();

/// Fixed prefix stored immediately before every GC-managed payload.
#[repr(C)]
pub struct Header {
    /// Next header in the registry's intrusive list, or null at the tail.
    pub next: *mut Header,
    /// Byte count requested at allocation (H2).
    pub size: usize,
    /// Cleared outside the mark phase (H3).
    pub marked: bool,
}

/// Byte distance between a header and its payload. Both directions of
/// the header/payload relationship are a single step of this size.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

impl Header {
    /// Given a header, obtain the payload pointer that follows it.
    ///
    /// # Safety
    /// `header` must point to a valid, live `Header` that was allocated
    /// with `HEADER_SIZE` bytes of payload space immediately following it.
    #[inline]
    pub unsafe fn payload(header: NonNull<Header>) -> NonNull<u8> {
        let base = header.as_ptr() as *mut u8;
        NonNull::new_unchecked(base.add(HEADER_SIZE))
    }

    /// Given a payload pointer, obtain the header that precedes it.
    ///
    /// # Safety
    /// `payload` must be a pointer previously returned by [`Header::payload`]
    /// (or by the allocator) for a still-live object.
    #[inline]
    pub unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<Header> {
        let base = payload.as_ptr().sub(HEADER_SIZE);
        NonNull::new_unchecked(base as *mut Header)
    }

    /// Address of the payload that would follow this header, without
    /// requiring a live reference — used by the conservative resolver to
    /// compare candidate words against registered headers.
    #[inline]
    pub fn payload_addr(header: *mut Header) -> usize {
        header as usize + HEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_and_back_roundtrip() {
        let mut h = Header {
            next: std::ptr::null_mut(),
            size: 16,
            marked: false,
        };
        let h_ptr = NonNull::new(&mut h as *mut Header).unwrap();
        unsafe {
            let payload = Header::payload(h_ptr);
            let back = Header::from_payload(payload);
            assert_eq!(back.as_ptr(), h_ptr.as_ptr());
        }
    }

    #[test]
    fn header_size_is_word_aligned() {
        assert_eq!(HEADER_SIZE % WORD_SIZE, 0);
    }
}
