//! Locates and decodes the Embedded Firmware Structure of AMD firmware images.
//!
//! The Embedded Firmware Structure is the anchor table the PSP boot firmware uses to discover the PSP and BIOS
//! directory tables. It is not referenced from anywhere else in the image, so it has to be found by probing a
//! short, fixed list of physical addresses for its signature. See the AMD Platform Security Processor BIOS
//! Architecture Design Guide for Family 17h and Family 19h processors (publication #55758), table 2.
//!
//! Everything here works on borrowed image bytes and keeps no state between calls. How an image is loaded, and
//! how physical addresses map onto it, is left to an implementation of [`Firmware`]. [`FlatImage`] provides the
//! usual mapping of a flash image sitting directly below 4GiB.

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod efs;
pub mod image;
pub mod range;

pub use efs::{BiosDirectoryModels, EmbeddedFirmwareStructure, EMBEDDED_FIRMWARE_STRUCTURE_SIGNATURE};
pub use image::FlatImage;
pub use range::ByteRange;

use core::fmt;

/// The capabilities this crate needs from a firmware image.
pub trait Firmware {
    /// The raw bytes of the whole image.
    fn image_bytes(&self) -> &[u8];

    /// Translate a physical address, as referenced by firmware metadata, into an offset into
    /// [`Firmware::image_bytes`]. Returns `None` if the address can't be expressed as an offset at all; an offset
    /// that is returned may still lie past the end of the image.
    fn phys_addr_to_offset(&self, address: u64) -> Option<u64>;
}

impl<T> Firmware for &T
where
    T: Firmware + ?Sized,
{
    fn image_bytes(&self) -> &[u8] {
        (**self).image_bytes()
    }

    fn phys_addr_to_offset(&self, address: u64) -> Option<u64> {
        (**self).phys_addr_to_offset(address)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ManifestError {
    /// None of the candidate addresses held the Embedded Firmware Structure signature.
    NotFound,

    /// The structure was cut short by the end of the image.
    ShortRead { needed: usize, available: usize },

    /// The decoded signature field was not `0x55aa55aa`. Carries the value that was actually read.
    InvalidSignature(u32),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::NotFound => write!(f, "Embedded Firmware Structure is not found"),
            ManifestError::ShortRead { needed, available } => {
                write!(f, "short read: needed {} bytes, but only {} are available", needed, available)
            }
            ManifestError::InvalidSignature(signature) => write!(f, "incorrect signature: {:#x}", signature),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ManifestError {}
