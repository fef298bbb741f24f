//! Board-agnostic core logic for the Kairos runtime HAL
//!
//! This crate contains all HAL logic that does not depend on a specific
//! chip:
//!
//! - Pin registry and multiplexing state machine
//! - Time-ordered I/O event queue and scheduling
//! - Peripheral device table (UART/SPI/I2C)
//! - Strict-timing bit-bang engine
//! - Power/idle coordination
//! - Flash persistence of the interpreter image
//!
//! Everything hangs off a single owned [`Hal`] context generic over a
//! [`kairos_hal::Chip`], so the whole crate runs unmodified against the
//! simulated chip on a host.

#![no_std]
#![deny(unsafe_code)]

pub mod bitbang;
pub mod context;
pub mod devices;
pub mod events;
pub mod persist;
pub mod pins;

pub use context::Hal;
