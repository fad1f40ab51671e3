use crate::Firmware;

/// The physical address just past the end of the flash image, when it is mapped below 4GiB.
pub const DEFAULT_MAPPING_TOP: u64 = 0x1_0000_0000;

/// A flat firmware image (e.g. a dump of the SPI flash), mapped into the physical address space so that its last
/// byte sits directly below `mapping_top`.
#[derive(Clone, Copy, Debug)]
pub struct FlatImage<'a> {
    bytes: &'a [u8],
    mapping_top: u64,
}

impl<'a> FlatImage<'a> {
    pub fn new(bytes: &'a [u8]) -> FlatImage<'a> {
        FlatImage { bytes, mapping_top: DEFAULT_MAPPING_TOP }
    }

    pub fn with_mapping_top(bytes: &'a [u8], mapping_top: u64) -> FlatImage<'a> {
        FlatImage { bytes, mapping_top }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn mapping_top(&self) -> u64 {
        self.mapping_top
    }

    /// The physical address the first byte of the image is mapped at. `None` if the image is larger than the
    /// space below `mapping_top`.
    pub fn base_address(&self) -> Option<u64> {
        self.mapping_top.checked_sub(self.bytes.len() as u64)
    }

    /// The inverse of [`Firmware::phys_addr_to_offset`]. Returns `None` for offsets outside the image.
    pub fn offset_to_phys_addr(&self, offset: u64) -> Option<u64> {
        if offset >= self.bytes.len() as u64 {
            return None;
        }

        self.base_address()?.checked_add(offset)
    }
}

impl Firmware for FlatImage<'_> {
    fn image_bytes(&self) -> &[u8] {
        self.bytes
    }

    fn phys_addr_to_offset(&self, address: u64) -> Option<u64> {
        address.checked_sub(self.base_address()?)
    }
}
