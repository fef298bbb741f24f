//! Kairos Hardware Abstraction Layer
//!
//! This crate defines the chip-facing traits and shared value types the
//! Kairos runtime uses to drive a microcontroller on behalf of an
//! embedded scripting interpreter. Chip-specific crates implement the
//! traits; all policy (pin ownership, capability checks, scheduling)
//! lives above them in `kairos-core`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Scripting interpreter                  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  kairos-core (pin registry, scheduling) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  kairos-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  chip crates  │       │ kairos-hal-   │
//! │  (real HW)    │       │ sim (testing) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::PinOps`], [`gpio::AnalogOps`] - pin mode, digital and analog I/O
//! - [`uart::UartOps`], [`spi::SpiOps`], [`i2c::I2cOps`] - peripheral buses
//! - [`flash::FlashOps`] - non-volatile image storage
//! - [`time::Clock`] - monotonic ticks and busy-wait delays
//! - [`system::SystemOps`] - interrupt masking, sleep, watchdog, identity

#![no_std]
#![deny(unsafe_code)]

pub mod board;
pub mod error;
pub mod flash;
pub mod gpio;
pub mod i2c;
pub mod spi;
pub mod system;
pub mod time;
pub mod uart;

// Re-export key types at crate root for convenience
pub use board::BoardInfo;
pub use error::HalError;
pub use flash::{FlashError, FlashOps};
pub use gpio::{AnalogOps, PinCaps, PinId, PinOps, PinState};
pub use i2c::I2cOps;
pub use spi::SpiOps;
pub use system::SystemOps;
pub use time::{Clock, SysTime, TickRate};
pub use uart::UartOps;

/// Everything a chip must provide to back a full Kairos context.
pub trait Chip:
    PinOps + AnalogOps + UartOps + SpiOps + I2cOps + FlashOps + Clock + SystemOps
{
}

// Blanket implementation for types that implement all the per-concern traits
impl<T> Chip for T where
    T: PinOps + AnalogOps + UartOps + SpiOps + I2cOps + FlashOps + Clock + SystemOps
{
}
