use crate::{ByteRange, Firmware, ManifestError};
use core::fmt;
use log::{debug, trace};
use scroll::{
    ctx::{TryFromCtx, TryIntoCtx},
    Endian,
    Pread,
    Pwrite,
    LE,
};

pub const EMBEDDED_FIRMWARE_STRUCTURE_SIGNATURE: u32 = 0x55aa_55aa;

/// The physical addresses the Embedded Firmware Structure can live at, in the order they're probed. The first one
/// holding the signature wins, so this order matters.
pub const CANDIDATE_ADDRESSES: [u64; 6] = [0xfffa_0000, 0xfff2_0000, 0xffe2_0000, 0xffc2_0000, 0xff82_0000, 0xff02_0000];

/// The Embedded Firmware Structure. All fields are little-endian on disk, and there is no padding between them.
///
/// The directory table pointers are stored exactly as found; depending on the platform they may be physical
/// addresses or offsets into the image, and nothing here checks that they point anywhere sensible.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EmbeddedFirmwareStructure {
    pub signature: u32,
    pub reserved1: [u8; 16],
    pub psp_directory_table_pointer: u32,

    pub bios_directory_table_family_17h_models_00h_0fh_pointer: u32,
    pub bios_directory_table_family_17h_models_10h_1fh_pointer: u32,
    pub bios_directory_table_family_17h_models_30h_3fh_pointer: u32,
    pub reserved2: u32,
    pub bios_directory_table_family_17h_models_60h_3fh_pointer: u32,

    pub reserved3: [u8; 30],
}

/// The processor models each BIOS directory table pointer applies to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BiosDirectoryModels {
    Family17hModels00h0Fh,
    Family17hModels10h1Fh,
    Family17hModels30h3Fh,
    Family17hModels60h3Fh,
}

impl EmbeddedFirmwareStructure {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 74;

    /// Decode the structure from the start of `bytes`. On success, also returns the number of bytes consumed.
    ///
    /// Only the signature is validated: the reserved regions and pointers can hold anything.
    pub fn parse(bytes: &[u8]) -> Result<(EmbeddedFirmwareStructure, u64), ManifestError> {
        let short_read = ManifestError::ShortRead { needed: Self::SIZE, available: bytes.len() };
        if bytes.len() < Self::SIZE {
            return Err(short_read);
        }

        let efs = bytes.pread_with::<EmbeddedFirmwareStructure>(0, LE).map_err(|_| short_read)?;
        if efs.signature != EMBEDDED_FIRMWARE_STRUCTURE_SIGNATURE {
            return Err(ManifestError::InvalidSignature(efs.signature));
        }

        Ok((efs, Self::SIZE as u64))
    }

    /// Encode the structure into `bytes`, returning the number of bytes written.
    pub fn write(&self, bytes: &mut [u8]) -> Result<usize, ManifestError> {
        let available = bytes.len();
        bytes.pwrite_with(self, 0, LE).map_err(|_| ManifestError::ShortRead { needed: Self::SIZE, available })
    }

    /// Encode the structure, in the order the fields appear on disk.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        let mut offset = 0;
        let mut put = |field: &[u8]| {
            bytes[offset..(offset + field.len())].copy_from_slice(field);
            offset += field.len();
        };

        put(&self.signature.to_le_bytes());
        put(&self.reserved1);
        put(&self.psp_directory_table_pointer.to_le_bytes());
        put(&self.bios_directory_table_family_17h_models_00h_0fh_pointer.to_le_bytes());
        put(&self.bios_directory_table_family_17h_models_10h_1fh_pointer.to_le_bytes());
        put(&self.bios_directory_table_family_17h_models_30h_3fh_pointer.to_le_bytes());
        put(&self.reserved2.to_le_bytes());
        put(&self.bios_directory_table_family_17h_models_60h_3fh_pointer.to_le_bytes());
        put(&self.reserved3);

        bytes
    }

    /// The BIOS directory table pointers, labelled with the models they're used for.
    pub fn bios_directory_pointers(&self) -> impl Iterator<Item = (BiosDirectoryModels, u32)> {
        [
            (BiosDirectoryModels::Family17hModels00h0Fh, self.bios_directory_table_family_17h_models_00h_0fh_pointer),
            (BiosDirectoryModels::Family17hModels10h1Fh, self.bios_directory_table_family_17h_models_10h_1fh_pointer),
            (BiosDirectoryModels::Family17hModels30h3Fh, self.bios_directory_table_family_17h_models_30h_3fh_pointer),
            (BiosDirectoryModels::Family17hModels60h3Fh, self.bios_directory_table_family_17h_models_60h_3fh_pointer),
        ]
        .into_iter()
    }
}

impl<'a> TryFromCtx<'a, Endian> for EmbeddedFirmwareStructure {
    type Error = scroll::Error;

    fn try_from_ctx(bytes: &'a [u8], endian: Endian) -> Result<(Self, usize), Self::Error> {
        let offset = &mut 0;

        let signature = bytes.gread_with(offset, endian)?;
        let mut reserved1 = [0; 16];
        reserved1.copy_from_slice(bytes.gread_with::<&'a [u8]>(offset, 16)?);
        let psp_directory_table_pointer = bytes.gread_with(offset, endian)?;
        let bios_directory_table_family_17h_models_00h_0fh_pointer = bytes.gread_with(offset, endian)?;
        let bios_directory_table_family_17h_models_10h_1fh_pointer = bytes.gread_with(offset, endian)?;
        let bios_directory_table_family_17h_models_30h_3fh_pointer = bytes.gread_with(offset, endian)?;
        let reserved2 = bytes.gread_with(offset, endian)?;
        let bios_directory_table_family_17h_models_60h_3fh_pointer = bytes.gread_with(offset, endian)?;
        let mut reserved3 = [0; 30];
        reserved3.copy_from_slice(bytes.gread_with::<&'a [u8]>(offset, 30)?);

        Ok((
            EmbeddedFirmwareStructure {
                signature,
                reserved1,
                psp_directory_table_pointer,
                bios_directory_table_family_17h_models_00h_0fh_pointer,
                bios_directory_table_family_17h_models_10h_1fh_pointer,
                bios_directory_table_family_17h_models_30h_3fh_pointer,
                reserved2,
                bios_directory_table_family_17h_models_60h_3fh_pointer,
                reserved3,
            },
            *offset,
        ))
    }
}

impl TryIntoCtx<Endian> for &EmbeddedFirmwareStructure {
    type Error = scroll::Error;

    fn try_into_ctx(self, bytes: &mut [u8], endian: Endian) -> Result<usize, Self::Error> {
        let offset = &mut 0;

        bytes.gwrite_with(self.signature, offset, endian)?;
        bytes.gwrite_with(&self.reserved1[..], offset, ())?;
        bytes.gwrite_with(self.psp_directory_table_pointer, offset, endian)?;
        bytes.gwrite_with(self.bios_directory_table_family_17h_models_00h_0fh_pointer, offset, endian)?;
        bytes.gwrite_with(self.bios_directory_table_family_17h_models_10h_1fh_pointer, offset, endian)?;
        bytes.gwrite_with(self.bios_directory_table_family_17h_models_30h_3fh_pointer, offset, endian)?;
        bytes.gwrite_with(self.reserved2, offset, endian)?;
        bytes.gwrite_with(self.bios_directory_table_family_17h_models_60h_3fh_pointer, offset, endian)?;
        bytes.gwrite_with(&self.reserved3[..], offset, ())?;

        Ok(*offset)
    }
}

impl fmt::Display for BiosDirectoryModels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let models = match self {
            BiosDirectoryModels::Family17hModels00h0Fh => "00h-0Fh",
            BiosDirectoryModels::Family17hModels10h1Fh => "10h-1Fh",
            BiosDirectoryModels::Family17hModels30h3Fh => "30h-3Fh",
            BiosDirectoryModels::Family17hModels60h3Fh => "60h-3Fh",
        };
        write!(f, "Family 17h models {}", models)
    }
}

impl fmt::Display for EmbeddedFirmwareStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Signature: {:#010x}", self.signature)?;
        writeln!(f, "PSP directory table: {:#010x}", self.psp_directory_table_pointer)?;
        for (models, pointer) in self.bios_directory_pointers() {
            writeln!(f, "BIOS directory table ({}): {:#010x}", models, pointer)?;
        }
        writeln!(f, "Reserved1: {:02x?}", self.reserved1)?;
        writeln!(f, "Reserved2: {:#010x}", self.reserved2)?;
        write!(f, "Reserved3: {:02x?}", self.reserved3)
    }
}

/// Find the offset of the Embedded Firmware Structure by probing each of [`CANDIDATE_ADDRESSES`] for its
/// signature. Addresses that don't translate to an offset inside the image are skipped.
pub fn locate<F>(firmware: &F) -> Result<u64, ManifestError>
where
    F: Firmware + ?Sized,
{
    let image = firmware.image_bytes();

    for &address in CANDIDATE_ADDRESSES.iter() {
        let offset = match firmware.phys_addr_to_offset(address) {
            Some(offset) => offset,
            None => {
                debug!("Skipping candidate address {:#x}: can't be translated to an offset", address);
                continue;
            }
        };

        // We only need the signature to be in bounds here - `parse` deals with the rest.
        let signature = match usize::try_from(offset).ok().and_then(|offset| image.pread_with::<u32>(offset, LE).ok())
        {
            Some(signature) => signature,
            None => {
                debug!("Skipping candidate address {:#x}: offset {:#x} is outside the image", address, offset);
                continue;
            }
        };

        trace!("Candidate address {:#x} (offset {:#x}) has signature {:#x}", address, offset, signature);
        if signature == EMBEDDED_FIRMWARE_STRUCTURE_SIGNATURE {
            debug!("Found Embedded Firmware Structure signature at {:#x} (offset {:#x})", address, offset);
            return Ok(offset);
        }
    }

    Err(ManifestError::NotFound)
}

/// Locate and decode the Embedded Firmware Structure, returning it along with the region of the image it occupies.
///
/// The first candidate address with a matching signature is committed to: if the structure there fails to
/// decode, that error is returned and no later candidates are tried.
pub fn find<F>(firmware: &F) -> Result<(EmbeddedFirmwareStructure, ByteRange), ManifestError>
where
    F: Firmware + ?Sized,
{
    let offset = locate(firmware)?;
    let bytes = usize::try_from(offset)
        .ok()
        .and_then(|offset| firmware.image_bytes().get(offset..))
        .ok_or(ManifestError::ShortRead { needed: EmbeddedFirmwareStructure::SIZE, available: 0 })?;
    let (efs, length) = EmbeddedFirmwareStructure::parse(bytes)?;
    Ok((efs, ByteRange::new(offset, length)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_bytes() -> [u8; EmbeddedFirmwareStructure::SIZE] {
        let mut bytes = [0u8; EmbeddedFirmwareStructure::SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = i as u8;
        }
        bytes[0..4].copy_from_slice(&[0xaa, 0x55, 0xaa, 0x55]);
        bytes
    }

    #[test]
    fn parse() {
        let (efs, length) = EmbeddedFirmwareStructure::parse(&example_bytes()).unwrap();

        assert_eq!(length, 74);
        assert_eq!(efs.signature, EMBEDDED_FIRMWARE_STRUCTURE_SIGNATURE);
        assert_eq!(efs.reserved1, [4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19]);
        assert_eq!(efs.psp_directory_table_pointer, 0x17161514);
        assert_eq!(efs.bios_directory_table_family_17h_models_00h_0fh_pointer, 0x1b1a1918);
        assert_eq!(efs.bios_directory_table_family_17h_models_10h_1fh_pointer, 0x1f1e1d1c);
        assert_eq!(efs.bios_directory_table_family_17h_models_30h_3fh_pointer, 0x23222120);
        assert_eq!(efs.reserved2, 0x27262524);
        assert_eq!(efs.bios_directory_table_family_17h_models_60h_3fh_pointer, 0x2b2a2928);
        assert_eq!(efs.reserved3[0], 0x2c);
        assert_eq!(efs.reserved3[29], 0x49);
    }

    #[test]
    fn parse_ignores_trailing_bytes() {
        let mut bytes = [0xffu8; 100];
        bytes[..74].copy_from_slice(&example_bytes());
        assert_eq!(EmbeddedFirmwareStructure::parse(&bytes).unwrap().1, 74);
    }

    #[test]
    fn short_read() {
        let bytes = example_bytes();
        assert_eq!(
            EmbeddedFirmwareStructure::parse(&bytes[..73]),
            Err(ManifestError::ShortRead { needed: 74, available: 73 })
        );
        assert_eq!(
            EmbeddedFirmwareStructure::parse(&bytes[..4]),
            Err(ManifestError::ShortRead { needed: 74, available: 4 })
        );
        assert_eq!(EmbeddedFirmwareStructure::parse(&[]), Err(ManifestError::ShortRead { needed: 74, available: 0 }));
    }

    #[test]
    fn invalid_signature() {
        let mut bytes = example_bytes();
        bytes[0..4].copy_from_slice(&0xdeadbeefu32.to_le_bytes());
        assert_eq!(EmbeddedFirmwareStructure::parse(&bytes), Err(ManifestError::InvalidSignature(0xdeadbeef)));

        /*
         * The signature is little-endian, so the big-endian encoding of the same value doesn't match.
         */
        bytes[0..4].copy_from_slice(&EMBEDDED_FIRMWARE_STRUCTURE_SIGNATURE.to_be_bytes());
        assert_eq!(EmbeddedFirmwareStructure::parse(&bytes), Err(ManifestError::InvalidSignature(0xaa55aa55)));
    }

    #[test]
    fn reencode() {
        let bytes = example_bytes();
        let (efs, _) = EmbeddedFirmwareStructure::parse(&bytes).unwrap();
        assert_eq!(efs.to_bytes(), bytes);

        let mut written = [0u8; 80];
        assert_eq!(efs.write(&mut written), Ok(EmbeddedFirmwareStructure::SIZE));
        assert_eq!(&written[..EmbeddedFirmwareStructure::SIZE], &efs.to_bytes()[..]);
        assert_eq!(&written[EmbeddedFirmwareStructure::SIZE..], &[0u8; 6]);

        let mut too_small = [0u8; 40];
        assert_eq!(efs.write(&mut too_small), Err(ManifestError::ShortRead { needed: 74, available: 40 }));
    }

    #[test]
    fn bios_directory_pointers() {
        let (efs, _) = EmbeddedFirmwareStructure::parse(&example_bytes()).unwrap();
        let mut pointers = efs.bios_directory_pointers();

        assert_eq!(pointers.next(), Some((BiosDirectoryModels::Family17hModels00h0Fh, 0x1b1a1918)));
        assert_eq!(pointers.next(), Some((BiosDirectoryModels::Family17hModels10h1Fh, 0x1f1e1d1c)));
        assert_eq!(pointers.next(), Some((BiosDirectoryModels::Family17hModels30h3Fh, 0x23222120)));
        assert_eq!(pointers.next(), Some((BiosDirectoryModels::Family17hModels60h3Fh, 0x2b2a2928)));
        assert_eq!(pointers.next(), None);
    }
}
