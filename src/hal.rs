//! Hardware abstraction
//!
//! This module provides the [`Hal`] contract both backends implement. The
//! driver speaks the panel protocol purely in terms of these calls, so every
//! layer above it runs unchanged against the simulated backend.
//!
//! ## Ownership
//!
//! A backend value is owned by exactly one driver. Operations borrow it
//! mutably, and [`Hal::close`] consumes it, so a closed backend cannot be
//! used again.
//!
//! ## Example
//!
//! ```
//! use embedded_hal::digital::PinState;
//! use moodink::{Builder, Hal, Line, Open, SimulatedBackend};
//!
//! let config = Builder::reference_wiring().build()?;
//! let mut backend = SimulatedBackend::open(&config)?;
//!
//! // Send a command byte
//! backend.set_line(Line::DataCommand, PinState::Low)?;
//! backend.bus_write(&[0x12])?;
//!
//! // Check whether the panel is still working
//! assert_eq!(backend.read_busy()?, PinState::Low);
//!
//! backend.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use core::fmt;

pub use embedded_hal::digital::PinState;

use crate::config::{Config, LineRole};
use crate::error::HalError;

/// Output lines the driver can set
///
/// The busy line is input-only and read through [`Hal::read_busy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Line {
    /// Data/command select (low=command, high=data)
    DataCommand,
    /// Reset (active low)
    Reset,
    /// Power enable
    Power,
}

impl Line {
    /// The configuration role of this line
    pub fn role(self) -> LineRole {
        match self {
            Self::DataCommand => LineRole::DataCommand,
            Self::Reset => LineRole::Reset,
            Self::Power => LineRole::Power,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.role(), f)
    }
}

/// Capability contract implemented by every backend
///
/// No method may panic for ordinary hardware conditions; failures come back
/// as [`HalError`].
pub trait Hal {
    /// Write bytes on the bus
    ///
    /// Whether they are a command or data depends on the level of
    /// [`Line::DataCommand`] at the time of the call.
    fn bus_write(&mut self, bytes: &[u8]) -> Result<(), HalError>;

    /// Drive an output line
    fn set_line(&mut self, line: Line, level: PinState) -> Result<(), HalError>;

    /// Sample the busy line
    fn read_busy(&mut self) -> Result<PinState, HalError>;

    /// Host-level delay
    fn delay_ms(&mut self, ms: u32);

    /// Release the bus and all lines
    ///
    /// Every resource is released even if an earlier one fails; the failures
    /// are reported together.
    fn close(self) -> Result<(), HalError>
    where
        Self: Sized;
}

/// Backends that can be constructed from configuration
pub trait Open: Hal + Sized {
    /// Claim the resources described by `config`
    ///
    /// On failure, anything already claimed is released before returning.
    fn open(config: &Config) -> Result<Self, HalError>;
}
