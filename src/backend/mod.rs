//! Backend selection
//!
//! [`Backend`] is the closed set of implementations the driver can run on: the
//! in-memory [`SimulatedBackend`] or a physical backend `P`. The variant is
//! chosen once, from [`Config::target`], and never changes afterwards.
//!
//! ## Example
//!
//! ```
//! use moodink::{Backend, BackendKind, Builder, Open, SimulatedBackend};
//!
//! let config = Builder::reference_wiring().build()?;
//! let backend = Backend::<SimulatedBackend>::select(&config)?;
//! assert_eq!(backend.kind(), BackendKind::Simulated);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod physical;
pub mod simulated;

use core::fmt;

use log::info;

use crate::config::{Config, Target};
use crate::error::HalError;
use crate::hal::{Hal, Line, Open, PinState};

pub use physical::PhysicalBackend;
pub use simulated::SimulatedBackend;

/// Which backend variant is in use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-memory simulation
    Simulated,
    /// Real SPI and GPIO
    Physical,
}

impl BackendKind {
    /// The variant a configuration selects
    pub fn for_target(target: &Target) -> Self {
        match target {
            Target::Simulation(_) => Self::Simulated,
            Target::Device => Self::Physical,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simulated => f.write_str("simulated"),
            Self::Physical => f.write_str("physical"),
        }
    }
}

/// Simulated or physical backend
pub enum Backend<P> {
    /// In-memory simulation
    Simulated(SimulatedBackend),
    /// Physical hardware
    Physical(P),
}

impl<P> Backend<P> {
    /// Variant in use
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Simulated(_) => BackendKind::Simulated,
            Self::Physical(_) => BackendKind::Physical,
        }
    }

    /// The simulated backend, if that is the variant in use
    pub fn as_simulated(&self) -> Option<&SimulatedBackend> {
        match self {
            Self::Simulated(sim) => Some(sim),
            Self::Physical(_) => None,
        }
    }
}

impl<P: Open> Backend<P> {
    /// Open the backend the configuration's target selects
    ///
    /// The same configuration always selects the same variant.
    pub fn select(config: &Config) -> Result<Self, HalError> {
        let backend = match config.target {
            Target::Simulation(_) => Self::Simulated(SimulatedBackend::open(config)?),
            Target::Device => Self::Physical(P::open(config)?),
        };
        info!("selected {} backend", backend.kind());
        Ok(backend)
    }
}

impl<P: Hal> Hal for Backend<P> {
    fn bus_write(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        match self {
            Self::Simulated(sim) => sim.bus_write(bytes),
            Self::Physical(hw) => hw.bus_write(bytes),
        }
    }

    fn set_line(&mut self, line: Line, level: PinState) -> Result<(), HalError> {
        match self {
            Self::Simulated(sim) => sim.set_line(line, level),
            Self::Physical(hw) => hw.set_line(line, level),
        }
    }

    fn read_busy(&mut self) -> Result<PinState, HalError> {
        match self {
            Self::Simulated(sim) => sim.read_busy(),
            Self::Physical(hw) => hw.read_busy(),
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        match self {
            Self::Simulated(sim) => sim.delay_ms(ms),
            Self::Physical(hw) => hw.delay_ms(ms),
        }
    }

    fn close(self) -> Result<(), HalError> {
        match self {
            Self::Simulated(sim) => sim.close(),
            Self::Physical(hw) => hw.close(),
        }
    }
}

impl<P> fmt::Debug for Backend<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Builder;

    #[test]
    fn test_simulation_target_selects_simulated() {
        let config = Builder::reference_wiring().build().unwrap();
        for _ in 0..3 {
            let backend = Backend::<SimulatedBackend>::select(&config).unwrap();
            assert_eq!(backend.kind(), BackendKind::Simulated);
            assert!(backend.as_simulated().is_some());
        }
    }

    #[test]
    fn test_device_target_uses_physical_variant() {
        let config = Builder::reference_wiring()
            .target(Target::Device)
            .build()
            .unwrap();
        // Any `Open` type can stand in for hardware
        let backend = Backend::<SimulatedBackend>::select(&config).unwrap();
        assert_eq!(backend.kind(), BackendKind::Physical);
        assert!(backend.as_simulated().is_none());
        let kind = BackendKind::for_target(&config.target);
        assert_eq!(kind, BackendKind::Physical);
    }
}
