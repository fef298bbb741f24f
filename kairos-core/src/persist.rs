//! Flash persistence of the interpreter image.
//!
//! The image is an opaque byte blob; the HAL never looks inside it. A
//! fixed-size slot at the start of the flash region holds a postcard-
//! serialized [`ImageHeader`]; the payload follows it. The validity
//! probe reads only the header (magic and length), so it is cheap enough
//! to run on every boot; the CRC is verified when the image is actually
//! loaded.

use crc::{Crc, CRC_32_ISO_HDLC};
use serde::{Deserialize, Serialize};

use kairos_hal::flash::{FlashError, FlashOps};

/// Bytes reserved for the serialized header at the start of the region.
///
/// A worst-case postcard encoding of [`ImageHeader`] is 16 bytes
/// (three 5-byte varint u32s plus the version byte).
pub const HEADER_SPACE: usize = 16;

const IMAGE_MAGIC: u32 = 0x4B41_4952; // "KAIR"
const IMAGE_VERSION: u8 = 1;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ImageHeader {
    magic: u32,
    version: u8,
    len: u32,
    crc: u32,
}

/// Save an interpreter image, replacing any previous one.
pub fn save(flash: &mut impl FlashOps, image: &[u8]) -> Result<(), FlashError> {
    if HEADER_SPACE + image.len() > flash.flash_capacity() {
        return Err(FlashError::Full);
    }
    let header = ImageHeader {
        magic: IMAGE_MAGIC,
        version: IMAGE_VERSION,
        len: image.len() as u32,
        crc: CRC32.checksum(image),
    };
    let mut slot = [0u8; HEADER_SPACE];
    postcard::to_slice(&header, &mut slot).map_err(|_| FlashError::Flash)?;
    flash.flash_erase()?;
    flash.flash_write(0, &slot)?;
    flash.flash_write(HEADER_SPACE, image)
}

fn read_header(flash: &mut impl FlashOps) -> Option<ImageHeader> {
    let mut slot = [0u8; HEADER_SPACE];
    flash.flash_read(0, &mut slot).ok()?;
    let (header, _) = postcard::take_from_bytes::<ImageHeader>(&slot).ok()?;
    (header.magic == IMAGE_MAGIC && header.version == IMAGE_VERSION).then_some(header)
}

/// Cheap validity probe: header magic, version, and length only.
///
/// An erased region fails the magic check (an all-ones varint never
/// terminates inside the slot), so this is safe on a blank chip.
pub fn contains_image(flash: &mut impl FlashOps) -> bool {
    match read_header(flash) {
        Some(header) => HEADER_SPACE + header.len as usize <= flash.flash_capacity(),
        None => false,
    }
}

/// Load the stored image into `buf`, returning the byte count.
///
/// The payload CRC is verified; a mismatch surfaces
/// [`FlashError::Corrupted`] without touching the caller's view of the
/// flash contents.
pub fn load(flash: &mut impl FlashOps, buf: &mut [u8]) -> Result<usize, FlashError> {
    let header = read_header(flash).ok_or(FlashError::NotFound)?;
    let len = header.len as usize;
    if HEADER_SPACE + len > flash.flash_capacity() {
        return Err(FlashError::Corrupted);
    }
    if buf.len() < len {
        return Err(FlashError::BufferTooSmall);
    }
    flash.flash_read(HEADER_SPACE, &mut buf[..len])?;
    if CRC32.checksum(&buf[..len]) != header.crc {
        return Err(FlashError::Corrupted);
    }
    Ok(len)
}
