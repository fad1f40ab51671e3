use core::ops::Range;

/// A region of an image, described by its offset from the start of the image and its length in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> ByteRange {
        ByteRange { offset, length }
    }

    /// The offset of the first byte past the end of the range. `None` if that isn't representable in a `u64`.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    pub fn as_range(&self) -> Option<Range<u64>> {
        Some(self.offset..self.end()?)
    }

    /// Get the bytes of `image` covered by this range. Returns `None` if any part of the range lies outside it.
    pub fn slice<'a>(&self, image: &'a [u8]) -> Option<&'a [u8]> {
        let start = usize::try_from(self.offset).ok()?;
        let end = start.checked_add(usize::try_from(self.length).ok()?)?;
        image.get(start..end)
    }
}
