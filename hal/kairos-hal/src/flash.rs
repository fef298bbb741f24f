//! Non-volatile storage for the interpreter image.
//!
//! The HAL does not interpret the stored bytes; it guarantees a
//! byte-exact round trip through a fixed flash region and nothing more.
//! Image framing and integrity live above this trait in `kairos-core`.

/// Errors from flash storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Flash operation failed
    Flash,
    /// No valid image present
    NotFound,
    /// Buffer too small for the data
    BufferTooSmall,
    /// Data corrupted or invalid
    Corrupted,
    /// Image does not fit the reserved region
    Full,
}

/// Chip-facing flash operations on the reserved image region.
///
/// Offsets are relative to the region start.
pub trait FlashOps {
    /// Size in bytes of the reserved region.
    fn flash_capacity(&self) -> usize;

    /// Erase the whole region.
    fn flash_erase(&mut self) -> Result<(), FlashError>;

    /// Read bytes at `offset` into `buf`.
    fn flash_read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Write bytes at `offset`.
    ///
    /// The bytes must have been erased since they were last written.
    fn flash_write(&mut self, offset: usize, data: &[u8]) -> Result<(), FlashError>;
}
