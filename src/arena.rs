//! Region-chained bump allocator with snapshot/rewind.
//!
//! The arena hands out `(region, offset, len)` handles instead of references so
//! callers can hold many allocations at once while still mutating the arena.
//! Regions are boxed word buffers: their addresses never move while the chain
//! grows, which lets the io_uring harvester hand raw pointers to the kernel.
//!
//! Nothing is ever freed individually. Memory comes back only through
//! [`Arena::rewind`], [`Arena::reset`], [`Arena::trim`] or [`Arena::release`].

use std::ffi::{CStr, FromBytesUntilNulError};
use std::fmt::{self, Write as _};
use std::str::Utf8Error;

const WORD: usize = std::mem::size_of::<usize>();

/// Default region capacity in words (64 KiB on 64-bit targets).
pub const REGION_DEFAULT_CAPACITY: usize = 8 * 1024;

struct Region {
    data: Box<[usize]>,
    /// High-water mark, in words.
    count: usize,
}

impl Region {
    fn new(capacity: usize) -> Self {
        Self {
            data: vec![0usize; capacity].into_boxed_slice(),
            count: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn fits(&self, words: usize) -> bool {
        self.count + words <= self.capacity()
    }

    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.data)
    }
}

/// Handle to a byte range owned by an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaSlice {
    region: usize,
    offset: usize,
    len: usize,
}

impl ArenaSlice {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the region backing this slice.
    pub fn region(&self) -> usize {
        self.region
    }

    /// Byte range of this slice inside its region.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Handle to a NUL-terminated string owned by an [`Arena`].
///
/// `len()` excludes the terminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaStr(ArenaSlice);

impl ArenaStr {
    pub fn len(&self) -> usize {
        self.0.len
    }

    pub fn is_empty(&self) -> bool {
        self.0.len == 0
    }

    pub fn as_slice(&self) -> ArenaSlice {
        self.0
    }

    fn with_nul(&self) -> ArenaSlice {
        ArenaSlice {
            len: self.0.len + 1,
            ..self.0
        }
    }
}

/// Frontier captured by [`Arena::snapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    region: Option<usize>,
    count: usize,
}

/// Bump allocator over a chain of word-aligned regions.
pub struct Arena {
    regions: Vec<Region>,
    /// Index of the region currently being filled.
    end: usize,
    default_capacity: usize,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    /// Creates an empty arena; no region is allocated until the first `alloc`.
    pub fn new() -> Self {
        Self::with_region_capacity(REGION_DEFAULT_CAPACITY * WORD)
    }

    /// Creates an empty arena whose regions hold at least `bytes` bytes.
    pub fn with_region_capacity(bytes: usize) -> Self {
        Self {
            regions: Vec::new(),
            end: 0,
            default_capacity: bytes.div_ceil(WORD).max(1),
        }
    }

    /// Allocates `size_bytes` bytes aligned to pointer width.
    ///
    /// Requests larger than the default capacity get a region of their own.
    pub fn alloc(&mut self, size_bytes: usize) -> ArenaSlice {
        let words = size_bytes.div_ceil(WORD);

        if self.regions.is_empty() {
            self.regions
                .push(Region::new(self.default_capacity.max(words)));
            self.end = 0;
        }

        while !self.regions[self.end].fits(words) && self.end + 1 < self.regions.len() {
            self.end += 1;
        }

        if !self.regions[self.end].fits(words) {
            self.regions
                .push(Region::new(self.default_capacity.max(words)));
            self.end = self.regions.len() - 1;
        }

        let region = &mut self.regions[self.end];
        let offset = region.count * WORD;
        region.count += words;

        ArenaSlice {
            region: self.end,
            offset,
            len: size_bytes,
        }
    }

    /// Grow-or-keep reallocation.
    ///
    /// Returns `old` untouched when `new_size` fits; otherwise copies the old
    /// bytes into fresh storage. The old space is not reclaimed.
    pub fn realloc(&mut self, old: ArenaSlice, new_size: usize) -> ArenaSlice {
        if new_size <= old.len {
            return old;
        }
        let new = self.alloc(new_size);
        self.copy(old, new);
        new
    }

    /// Copies `data` into arena-owned storage.
    pub fn duplicate_bytes(&mut self, data: &[u8]) -> ArenaSlice {
        let slice = self.alloc(data.len());
        self.bytes_mut(slice).copy_from_slice(data);
        slice
    }

    /// Copies `s` into the arena with a trailing NUL.
    pub fn duplicate_string(&mut self, s: &str) -> ArenaStr {
        let slice = self.alloc(s.len() + 1);
        let buf = self.bytes_mut(slice);
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf[s.len()] = 0;
        ArenaStr(ArenaSlice {
            len: s.len(),
            ..slice
        })
    }

    /// Renders `args` directly into the arena.
    ///
    /// The length is measured first and the text rendered second; a
    /// `Display` impl that grows between passes falls back to a heap render.
    pub fn formatted_string(&mut self, args: fmt::Arguments<'_>) -> ArenaStr {
        let mut counter = LenCounter(0);
        // LenCounter never fails; errors only come from user Display impls.
        let _ = counter.write_fmt(args);

        let slice = self.alloc(counter.0 + 1);
        let mut cursor = SliceWriter {
            buf: self.bytes_mut(slice),
            pos: 0,
        };
        if cursor.write_fmt(args).is_err() || cursor.pos == cursor.buf.len() {
            let rendered = args.to_string();
            return self.duplicate_string(&rendered);
        }
        let written = cursor.pos;
        cursor.buf[written] = 0;

        ArenaStr(ArenaSlice {
            len: written,
            ..slice
        })
    }

    /// Captures the current frontier.
    pub fn snapshot(&self) -> Snapshot {
        if self.regions.is_empty() {
            return Snapshot {
                region: None,
                count: 0,
            };
        }
        Snapshot {
            region: Some(self.end),
            count: self.regions[self.end].count,
        }
    }

    /// Discards every allocation made after `snapshot`.
    ///
    /// Regions are kept for reuse; memory is not zeroed.
    pub fn rewind(&mut self, snapshot: Snapshot) {
        let Some(region) = snapshot.region else {
            self.reset();
            return;
        };
        if region >= self.regions.len() {
            // The snapshot's region was trimmed or released since.
            self.reset();
            return;
        }

        self.regions[region].count = snapshot.count;
        for r in &mut self.regions[region + 1..] {
            r.count = 0;
        }
        self.end = region;
    }

    /// Rewinds to the very beginning, keeping every region.
    pub fn reset(&mut self) {
        for r in &mut self.regions {
            r.count = 0;
        }
        self.end = 0;
    }

    /// Returns every region to the allocator. The arena stays usable.
    pub fn release(&mut self) {
        self.regions.clear();
        self.end = 0;
    }

    /// Frees the regions past the current frontier.
    pub fn trim(&mut self) {
        if !self.regions.is_empty() {
            self.regions.truncate(self.end + 1);
        }
    }

    /// # Panics
    ///
    /// Panics if `slice` refers to a region freed by `trim` or `release`.
    pub fn bytes(&self, slice: ArenaSlice) -> &[u8] {
        &self.regions[slice.region].bytes()[slice.range()]
    }

    /// # Panics
    ///
    /// Panics if `slice` refers to a region freed by `trim` or `release`.
    pub fn bytes_mut(&mut self, slice: ArenaSlice) -> &mut [u8] {
        &mut self.regions[slice.region].bytes_mut()[slice.range()]
    }

    pub fn str(&self, s: ArenaStr) -> Result<&str, Utf8Error> {
        std::str::from_utf8(self.bytes(s.0))
    }

    pub fn c_str(&self, s: ArenaStr) -> Result<&CStr, FromBytesUntilNulError> {
        CStr::from_bytes_until_nul(self.bytes(s.with_nul()))
    }

    /// Stable pointer to the start of `slice`.
    ///
    /// Stays valid until the backing region is trimmed or released; it is
    /// meant for handing buffers to the kernel.
    pub fn as_mut_ptr(&mut self, slice: ArenaSlice) -> *mut u8 {
        self.regions[slice.region]
            .data
            .as_mut_ptr()
            .cast::<u8>()
            .wrapping_add(slice.offset)
    }

    pub fn as_ptr(&self, slice: ArenaSlice) -> *const u8 {
        self.regions[slice.region]
            .data
            .as_ptr()
            .cast::<u8>()
            .wrapping_add(slice.offset)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Total bytes held across all regions.
    pub fn capacity_bytes(&self) -> usize {
        self.regions.iter().map(|r| r.capacity() * WORD).sum()
    }

    /// Bytes below the high-water marks of all regions.
    pub fn used_bytes(&self) -> usize {
        self.regions.iter().map(|r| r.count * WORD).sum()
    }

    /// Capacity of a freshly created region, in bytes.
    pub fn default_region_bytes(&self) -> usize {
        self.default_capacity * WORD
    }

    fn copy(&mut self, from: ArenaSlice, to: ArenaSlice) {
        let len = from.len.min(to.len);
        if from.region == to.region {
            self.regions[from.region]
                .bytes_mut()
                .copy_within(from.offset..from.offset + len, to.offset);
            return;
        }

        let (src, dst) = if from.region < to.region {
            let (head, tail) = self.regions.split_at_mut(to.region);
            (&head[from.region], &mut tail[0])
        } else {
            let (head, tail) = self.regions.split_at_mut(from.region);
            (&tail[0], &mut head[to.region])
        };
        dst.bytes_mut()[to.offset..to.offset + len]
            .copy_from_slice(&src.bytes()[from.offset..from.offset + len]);
    }
}

/// Formats into an arena as `format!` does into a `String`.
#[macro_export]
macro_rules! arena_format {
    ($arena:expr, $($arg:tt)*) => {
        $arena.formatted_string(format_args!($($arg)*))
    };
}

struct LenCounter(usize);

impl fmt::Write for LenCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.pos..end].copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}
