//! Error types for the stack
//!
//! Each layer has its own error type and wraps the one below it:
//!
//! - [`ConfigError`] - Errors during configuration construction
//! - [`HalError`] - Backend failures (SPI, GPIO, claiming and releasing resources)
//! - [`Error`] - Driver failures, tagged with the protocol [`Phase`] that failed
//! - [`DisplayError`] - What the display coordinator returns to its callers
//!
//! ## Example
//!
//! ```
//! use moodink::{Builder, ConfigError};
//!
//! // Missing bus device
//! let result = Builder::new().build();
//! assert!(matches!(result, Err(ConfigError::MissingBusDevice)));
//! ```

use core::fmt;

use embedded_hal::{digital, spi};

use crate::config::LineRole;
use crate::hal::Line;

/// Maximum gate outputs (rows) supported by the SSD1680 controller
pub const MAX_GATE_OUTPUTS: u16 = 296;

/// Maximum source outputs (columns) supported by the SSD1680 controller
pub const MAX_SOURCE_OUTPUTS: u16 = 176;

/// Errors that can occur when building configuration
///
/// These are programmer errors: they are detected before any hardware is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The bus device path was not specified or is empty
    #[error("bus device must be specified")]
    MissingBusDevice,
    /// A line descriptor was not specified
    #[error("{0} line must be specified")]
    MissingLine(LineRole),
    /// A line descriptor has an empty controller label
    #[error("{0} line has an empty controller label")]
    EmptyController(LineRole),
    /// Two roles were assigned the same physical line
    #[error("{first} and {second} lines both use {controller}:{offset}")]
    DuplicateLine {
        /// First role using the line
        first: LineRole,
        /// Second role using the line
        second: LineRole,
        /// Shared controller label
        controller: String,
        /// Shared line offset
        offset: u32,
    },
    /// Invalid dimensions provided
    #[error(
        "invalid dimensions {rows}x{cols} (max {max_rows}x{max_cols})",
        max_rows = MAX_GATE_OUTPUTS,
        max_cols = MAX_SOURCE_OUTPUTS
    )]
    InvalidDimensions {
        /// Number of rows (height) requested
        rows: u16,
        /// Number of columns (width) requested
        cols: u16,
    },
    /// Busy timeout of zero would make every busy wait fail immediately
    #[error("busy timeout must be non-zero")]
    ZeroBusyTimeout,
    /// A mood asset could not be read
    #[error("cannot read mood asset {path}")]
    AssetUnreadable {
        /// Asset file path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// A mood asset has the wrong size for the panel
    #[error("mood asset {path} is {actual} bytes, panel needs {expected}")]
    AssetSize {
        /// Asset file path
        path: String,
        /// Required size in bytes
        expected: usize,
        /// Actual size in bytes
        actual: usize,
    },
    /// The mood library was built for a different panel size
    #[error("mood images are {actual_rows}x{actual_cols}, panel is {rows}x{cols}")]
    MoodDimensions {
        /// Configured panel rows
        rows: u16,
        /// Configured panel columns
        cols: u16,
        /// Rows of the mood images
        actual_rows: u16,
        /// Columns of the mood images
        actual_cols: u16,
    },
}

/// Physical resource owned by a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// The SPI bus device
    Bus,
    /// One of the four GPIO lines
    Line(LineRole),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "bus"),
            Self::Line(role) => write!(f, "{role} line"),
        }
    }
}

/// Errors reported by a hardware backend
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    /// A bus device or line could not be claimed
    #[error("failed to claim {resource} at {path}: {reason}")]
    Claim {
        /// Resource that failed
        resource: Resource,
        /// Device path or line descriptor
        path: String,
        /// Description of the OS error
        reason: String,
    },
    /// SPI transfer failed
    #[error("bus write failed: {0:?}")]
    Bus(spi::ErrorKind),
    /// Output line write failed
    #[error("{line} line write failed: {kind:?}")]
    Line {
        /// Line being driven
        line: Line,
        /// Error kind reported by the pin
        kind: digital::ErrorKind,
    },
    /// Busy line read failed
    #[error("busy line read failed: {0:?}")]
    Busy(digital::ErrorKind),
    /// One or more resources failed to release
    #[error("{} resource(s) failed to release", .0.len())]
    Release(Vec<(Resource, String)>),
}

/// Step of the panel protocol, used as context on driver errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Opening the backend
    Open,
    /// Power-enable and hardware reset pulse
    HardwareReset,
    /// Software reset command
    SoftwareReset,
    /// Driver output control command
    DriverOutput,
    /// Data entry mode command
    DataEntryMode,
    /// Display memory window setup
    MemoryWindow,
    /// Display update control command
    UpdateControl,
    /// Memory cursor setup
    MemoryCursor,
    /// Waveform (LUT) load
    Waveform,
    /// Image data transfer
    FrameWrite,
    /// Display refresh
    Refresh,
    /// Deep sleep command
    DeepSleep,
    /// Line power-down and bus close
    PowerDown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::HardwareReset => "hardware reset",
            Self::SoftwareReset => "software reset",
            Self::DriverOutput => "driver output control",
            Self::DataEntryMode => "data entry mode",
            Self::MemoryWindow => "memory window",
            Self::UpdateControl => "display update control",
            Self::MemoryCursor => "memory cursor",
            Self::Waveform => "waveform load",
            Self::FrameWrite => "frame write",
            Self::Refresh => "refresh",
            Self::DeepSleep => "deep sleep",
            Self::PowerDown => "power down",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when driving the panel
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The reset-and-configure sequence failed
    #[error("hardware init failed during {phase}")]
    HardwareInit {
        /// Step that failed
        phase: Phase,
        /// Backend error
        #[source]
        source: HalError,
    },
    /// A bus or line operation failed outside the init sequence
    #[error("bus transfer failed during {phase}")]
    BusTransfer {
        /// Step that failed
        phase: Phase,
        /// Backend error
        #[source]
        source: HalError,
    },
    /// The busy line never cleared within the bound
    #[error("busy line still asserted after {waited_ms} ms during {phase}")]
    Timeout {
        /// Step that was waiting
        phase: Phase,
        /// Time budget that was exhausted
        waited_ms: u64,
    },
    /// The image buffer does not match the panel size
    #[error("image buffer must be {expected} bytes, got {actual}")]
    Validation {
        /// Required size in bytes
        expected: usize,
        /// Provided size in bytes
        actual: usize,
    },
    /// A partial-refresh region is empty, out of bounds or not byte-aligned
    #[error("invalid region: x={x}, y={y}, w={w}, h={h}")]
    InvalidRegion {
        /// X coordinate
        x: u16,
        /// Y coordinate
        y: u16,
        /// Width
        w: u16,
        /// Height
        h: u16,
    },
    /// Releasing backend resources failed
    #[error("resource release failed")]
    Resource(#[source] HalError),
}

impl Error {
    /// Wrap a backend error with the protocol step that produced it
    ///
    /// Failures while the reset-and-configure sequence is still running are
    /// init failures; anything later is a transfer failure.
    pub fn in_phase(phase: Phase, source: HalError, initializing: bool) -> Self {
        if initializing {
            Self::HardwareInit { phase, source }
        } else {
            Self::BusTransfer { phase, source }
        }
    }

    /// The protocol step this error is tagged with, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::HardwareInit { phase, .. }
            | Self::BusTransfer { phase, .. }
            | Self::Timeout { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Errors returned by the display coordinator
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// The operation requires an initialized display
    #[error("display is not initialized")]
    NotInitialized,
    /// The driver reported a failure
    #[error(transparent)]
    Driver(#[from] Error),
    /// The display server is no longer running
    #[error("display server stopped")]
    ServerStopped,
}
