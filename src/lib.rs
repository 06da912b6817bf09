//! Mood Panel Display Stack
//!
//! Drives a 2.9" 296x128 monochrome e-paper panel (SSD1680 controller) that
//! shows one of a fixed set of moods.
//!
//! The stack has three layers:
//!
//! - [`Display`] coordinates the panel lifecycle and gates every operation
//! - [`Driver`] speaks the controller protocol: reset, init, frame writes,
//!   refresh and deep sleep
//! - a [`Hal`] backend moves bytes and toggles lines, either on real hardware
//!   ([`PhysicalBackend`]) or in memory ([`SimulatedBackend`])
//!
//! ## Features
//!
//! - `embedded-hal` v1.0 based physical backend
//! - `linux` (default): open the panel from spidev and GPIO character devices
//! - `graphics` (default): draw into an [`ImageBuffer`] with embedded-graphics
//! - Deterministic simulated backend with a recorded call log and PNG output
//! - Full and partial refresh
//! - Thread-owned [`DisplayServer`] with idle auto-sleep
//!
//! ## Usage
//!
//! ```rust
//! use moodink::{Builder, Display, Lifecycle, Mood, SimulatedBackend};
//!
//! let config = Builder::reference_wiring().build()?;
//! let mut display = Display::<SimulatedBackend>::new(config);
//!
//! display.init_display()?;
//! display.show_mood(Mood::Happy)?;
//! display.display_image(&[0x55; 4736])?;
//! display.sleep()?;
//!
//! let status = display.status();
//! assert!(!status.initialized);
//! assert_eq!(status.lifecycle, Lifecycle::Sleeping);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! On a Linux board, target the real panel instead:
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "linux", target_os = "linux"))]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use moodink::backend::physical::LinuxPanel;
//! use moodink::{Builder, Display, Mood, Target};
//!
//! let config = Builder::reference_wiring().target(Target::Device).build()?;
//! let mut display = Display::<LinuxPanel>::new(config);
//! display.init_display()?;
//! display.show_mood(Mood::Thinking)?;
//! # Ok(())
//! # }
//! # #[cfg(not(all(feature = "linux", target_os = "linux")))]
//! # fn main() {}
//! ```

/// Hardware backends: simulated and physical
pub mod backend;
/// SSD1680 command definitions
pub mod command;
/// Panel configuration types and builder
pub mod config;
/// Display coordinator
pub mod display;
/// Panel protocol driver
pub mod driver;
/// Error types for every layer
pub mod error;
/// 1 bpp frame buffers
pub mod frame;
/// Hardware abstraction contract
pub mod hal;
/// Waveform look-up tables for refresh modes
pub mod lut;
/// Moods and their images
pub mod mood;
/// Thread-owned display server
pub mod server;

pub use backend::{Backend, BackendKind, PhysicalBackend, SimulatedBackend};
pub use config::{
    Builder, Config, ConfigSummary, DEFAULT_BUSY_TIMEOUT, Dimensions, LineConfig, LineRole,
    SimulationOptions, Target,
};
pub use display::{Display, Lifecycle, Status};
pub use driver::{Driver, DriverState, Region};
pub use error::{ConfigError, DisplayError, Error, HalError, Phase, Resource};
pub use frame::ImageBuffer;
pub use hal::{Hal, Line, Open, PinState};
pub use mood::{Mood, MoodLibrary, UnknownMood};
pub use server::{DisplayHandle, DisplayServer};
