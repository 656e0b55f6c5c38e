//! Bounded path construction
//!
//! Every path handed to a backend is materialized in a caller-sized byte buffer
//! that always keeps room for a trailing NUL. Copies that do not fit are cut
//! silently at the last whole UTF-8 character that does, so the buffer is never
//! overrun and its contents always read back as a valid `&str`.
//!
//! [`PathBuilder`] wraps one such buffer as a reusable scratch area: each
//! `join` overwrites the previous result, and the returned `&str` borrows the
//! builder, so the borrow checker enforces "valid until the next call".

// ═══════════════════════════════════════════════════════════════════════════════
// Truncating copy primitives
// ═══════════════════════════════════════════════════════════════════════════════

/// Longest prefix of `src` that fits in `room` bytes without splitting a
/// character. Input stops at an embedded NUL, as a C string would.
fn fitting_prefix(src: &str, room: usize) -> &str {
    let src = match src.find('\0') {
        Some(nul) => &src[..nul],
        None => src,
    };
    if src.len() <= room {
        return src;
    }
    let mut end = room;
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    &src[..end]
}

/// `src` cut to what a buffer of `bound` bytes (terminator included) can hold.
pub fn truncated(src: &str, bound: usize) -> &str {
    fitting_prefix(src, bound.saturating_sub(1))
}

/// Copy `src` into `dest`, truncating so the result plus its terminator fits.
///
/// Returns the number of bytes copied (terminator excluded). An empty `dest`
/// is left untouched.
pub fn copy_truncated(dest: &mut [u8], src: &str) -> usize {
    if dest.is_empty() {
        return 0;
    }
    let part = fitting_prefix(src, dest.len() - 1);
    dest[..part.len()].copy_from_slice(part.as_bytes());
    dest[part.len()] = 0;
    part.len()
}

/// Append `src` after the terminated string already in `dest`, truncating at
/// the end of the buffer. Returns the new length.
pub fn append_truncated(dest: &mut [u8], src: &str) -> usize {
    let start = terminated_len(dest);
    if start >= dest.len() {
        // No terminator at all: treat the last byte as the terminator slot.
        return match dest.last_mut() {
            Some(last) => {
                *last = 0;
                dest.len() - 1
            }
            None => 0,
        };
    }
    start + copy_truncated(&mut dest[start..], src)
}

/// Length of the terminated string at the start of `buf`.
pub fn terminated_len(buf: &[u8]) -> usize {
    buf.iter().position(|&b| b == 0).unwrap_or(buf.len())
}

/// The terminated string at the start of `buf`, as text.
pub fn terminated_str(buf: &[u8]) -> &str {
    let bytes = &buf[..terminated_len(buf)];
    match core::str::from_utf8(bytes) {
        Ok(s) => s,
        // Only reachable if a caller wrote raw bytes into the buffer.
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scratch path builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Reusable, bounded scratch buffer for building one path at a time.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    buf: Vec<u8>,
}

impl PathBuilder {
    /// Create a builder whose results never exceed `bound` bytes including the
    /// terminator. A bound of zero is raised to one (terminator only).
    pub fn new(bound: usize) -> Self {
        Self {
            buf: vec![0; bound.max(1)],
        }
    }

    /// Buffer size, terminator included.
    pub fn bound(&self) -> usize {
        self.buf.len()
    }

    /// `base` followed by `suffix`, either of which may be absent.
    pub fn join(&mut self, base: Option<&str>, suffix: Option<&str>) -> &str {
        match base {
            Some(base) => {
                copy_truncated(&mut self.buf, base);
            }
            None => self.buf[0] = 0,
        }
        if let Some(suffix) = suffix {
            append_truncated(&mut self.buf, suffix);
        }
        self.as_str()
    }

    /// `base` followed by two suffixes.
    pub fn join3(&mut self, base: Option<&str>, first: Option<&str>, second: Option<&str>) -> &str {
        self.join(base, first);
        if let Some(second) = second {
            append_truncated(&mut self.buf, second);
        }
        self.as_str()
    }

    /// The most recent result.
    pub fn as_str(&self) -> &str {
        terminated_str(&self.buf)
    }
}
