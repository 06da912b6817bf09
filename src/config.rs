//! Configuration types and builder
//!
//! A [`Config`] is built once at startup and passed down unmodified: the
//! coordinator hands it to the driver, the driver hands it to the backend. No
//! layer re-derives its own target.

use core::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::simulated::{BusyBehavior, CallLog};
pub use crate::error::{ConfigError, MAX_GATE_OUTPUTS, MAX_SOURCE_OUTPUTS};

/// Default timeout for busy-wait
///
/// A full refresh has been observed to take up to 20 s on real panels.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default SPI clock in Hz
pub const DEFAULT_BUS_SPEED_HZ: u32 = 4_000_000;

/// Native panel width in pixels
pub const PANEL_COLS: u16 = 128;

/// Native panel height in pixels
pub const PANEL_ROWS: u16 = 296;

/// Display dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    /// Number of rows (height in pixels, corresponds to gate outputs)
    pub rows: u16,
    /// Number of columns (width in pixels, corresponds to source outputs)
    pub cols: u16,
}

impl Dimensions {
    /// Create new dimensions with validation
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDimensions` if either side is zero or
    /// exceeds what the controller can address.
    pub fn new(rows: u16, cols: u16) -> Result<Self, ConfigError> {
        if rows == 0 || rows > MAX_GATE_OUTPUTS || cols == 0 || cols > MAX_SOURCE_OUTPUTS {
            return Err(ConfigError::InvalidDimensions { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    /// Bytes per row (`ceil(cols / 8)`)
    pub fn row_bytes(&self) -> usize {
        (self.cols as usize).div_ceil(8)
    }

    /// Calculate required buffer size in bytes
    pub fn buffer_size(&self) -> usize {
        self.row_bytes() * self.rows as usize
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            rows: PANEL_ROWS,
            cols: PANEL_COLS,
        }
    }
}

/// Role of one of the four discrete lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LineRole {
    /// Data/command select (output, low=command, high=data)
    DataCommand,
    /// Reset (output, active low)
    Reset,
    /// Busy status (input, high while the panel works)
    Busy,
    /// Power enable (output)
    Power,
}

impl LineRole {
    /// All roles, in claim order
    pub const ALL: [Self; 4] = [Self::DataCommand, Self::Reset, Self::Busy, Self::Power];

    /// Consumer label used when requesting the line from the kernel
    pub fn consumer(self) -> &'static str {
        match self {
            Self::DataCommand => "moodink-dc",
            Self::Reset => "moodink-rst",
            Self::Busy => "moodink-busy",
            Self::Power => "moodink-pwr",
        }
    }
}

impl fmt::Display for LineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DataCommand => "data/command",
            Self::Reset => "reset",
            Self::Busy => "busy",
            Self::Power => "power",
        };
        f.write_str(name)
    }
}

/// A discrete line: GPIO controller label plus line offset
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LineConfig {
    /// Controller label, e.g. `gpiochip0` or a full `/dev/gpiochip0` path
    pub controller: String,
    /// Line offset on that controller
    pub offset: u32,
}

impl LineConfig {
    /// Create a line descriptor
    pub fn new(controller: impl Into<String>, offset: u32) -> Self {
        Self {
            controller: controller.into(),
            offset,
        }
    }

    /// Character device path of the controller
    pub fn chip_path(&self) -> String {
        if self.controller.starts_with('/') {
            self.controller.clone()
        } else {
            format!("/dev/{}", self.controller)
        }
    }
}

impl fmt::Display for LineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.controller, self.offset)
    }
}

/// Options for the simulated backend
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationOptions {
    /// How the synthetic busy line behaves
    pub busy: BusyBehavior,
    /// Perform real sleeps for delays instead of returning immediately
    pub real_delays: bool,
    /// Write the visible panel contents as a PNG here after every refresh
    pub render_path: Option<PathBuf>,
    /// Record into this log instead of a fresh one, so the history survives
    /// re-initialization
    pub log: Option<CallLog>,
}

/// Deployment target, which decides the backend
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// Host build: the simulated backend
    Simulation(SimulationOptions),
    /// Device build: the physical backend
    Device,
}

impl Default for Target {
    fn default() -> Self {
        Self::Simulation(SimulationOptions::default())
    }
}

/// Stack configuration
///
/// Use [`Builder`] to create a Config.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// SPI bus device path
    pub bus_device: String,
    /// Data/command select line
    pub data_cmd: LineConfig,
    /// Reset line
    pub reset: LineConfig,
    /// Busy status line
    pub busy: LineConfig,
    /// Power enable line
    pub power: LineConfig,
    /// Panel dimensions
    pub dimensions: Dimensions,
    /// Default bound for every busy-wait
    pub busy_timeout: Duration,
    /// SPI clock in Hz
    pub bus_speed_hz: u32,
    /// Deployment target
    pub target: Target,
}

impl Config {
    /// Line descriptor for a role
    pub fn line(&self, role: LineRole) -> &LineConfig {
        match role {
            LineRole::DataCommand => &self.data_cmd,
            LineRole::Reset => &self.reset,
            LineRole::Busy => &self.busy,
            LineRole::Power => &self.power,
        }
    }

    /// The configuration without its backend-selection fields
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            bus_device: self.bus_device.clone(),
            data_cmd: self.data_cmd.clone(),
            reset: self.reset.clone(),
            busy: self.busy.clone(),
            power: self.power.clone(),
            dimensions: self.dimensions,
            busy_timeout: self.busy_timeout,
        }
    }
}

/// Diagnostic view of a [`Config`] with the target elided
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigSummary {
    /// SPI bus device path
    pub bus_device: String,
    /// Data/command select line
    pub data_cmd: LineConfig,
    /// Reset line
    pub reset: LineConfig,
    /// Busy status line
    pub busy: LineConfig,
    /// Power enable line
    pub power: LineConfig,
    /// Panel dimensions
    pub dimensions: Dimensions,
    /// Default bound for every busy-wait
    pub busy_timeout: Duration,
}

/// Builder for constructing configuration
///
/// # Example
///
/// ```
/// use moodink::{Builder, LineConfig, Target};
///
/// let config = Builder::new()
///     .bus_device("/dev/spidev0.0")
///     .data_cmd(LineConfig::new("gpiochip0", 25))
///     .reset(LineConfig::new("gpiochip0", 17))
///     .busy(LineConfig::new("gpiochip0", 24))
///     .power(LineConfig::new("gpiochip0", 18))
///     .target(Target::Device)
///     .build();
/// assert!(config.is_ok());
/// ```
#[must_use]
pub struct Builder {
    bus_device: Option<String>,
    data_cmd: Option<LineConfig>,
    reset: Option<LineConfig>,
    busy: Option<LineConfig>,
    power: Option<LineConfig>,
    dimensions: Dimensions,
    busy_timeout: Duration,
    bus_speed_hz: u32,
    target: Target,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            bus_device: None,
            data_cmd: None,
            reset: None,
            busy: None,
            power: None,
            dimensions: Dimensions::default(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            bus_speed_hz: DEFAULT_BUS_SPEED_HZ,
            target: Target::default(),
        }
    }
}

impl Builder {
    /// Create a new Builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-filled with the reference wiring (Waveshare HAT on a Raspberry Pi)
    pub fn reference_wiring() -> Self {
        Self::new()
            .bus_device("/dev/spidev0.0")
            .data_cmd(LineConfig::new("gpiochip0", 25))
            .reset(LineConfig::new("gpiochip0", 17))
            .busy(LineConfig::new("gpiochip0", 24))
            .power(LineConfig::new("gpiochip0", 18))
    }

    /// Set the SPI bus device path (required)
    pub fn bus_device(mut self, path: impl Into<String>) -> Self {
        self.bus_device = Some(path.into());
        self
    }

    /// Set the data/command line (required)
    pub fn data_cmd(mut self, line: LineConfig) -> Self {
        self.data_cmd = Some(line);
        self
    }

    /// Set the reset line (required)
    pub fn reset(mut self, line: LineConfig) -> Self {
        self.reset = Some(line);
        self
    }

    /// Set the busy line (required)
    pub fn busy(mut self, line: LineConfig) -> Self {
        self.busy = Some(line);
        self
    }

    /// Set the power enable line (required)
    pub fn power(mut self, line: LineConfig) -> Self {
        self.power = Some(line);
        self
    }

    /// Set panel dimensions
    pub fn dimensions(mut self, dims: Dimensions) -> Self {
        self.dimensions = dims;
        self
    }

    /// Set the default busy-wait bound
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the SPI clock
    pub fn bus_speed_hz(mut self, hz: u32) -> Self {
        self.bus_speed_hz = hz;
        self
    }

    /// Set the deployment target
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the bus device or any line is missing or
    /// malformed, two roles share a line, or the busy timeout is zero.
    pub fn build(self) -> Result<Config, ConfigError> {
        let bus_device = self
            .bus_device
            .filter(|path| !path.trim().is_empty())
            .ok_or(ConfigError::MissingBusDevice)?;
        let data_cmd = Self::require(self.data_cmd, LineRole::DataCommand)?;
        let reset = Self::require(self.reset, LineRole::Reset)?;
        let busy = Self::require(self.busy, LineRole::Busy)?;
        let power = Self::require(self.power, LineRole::Power)?;

        // Re-validate in case the caller built Dimensions by hand.
        let dimensions = Dimensions::new(self.dimensions.rows, self.dimensions.cols)?;

        if self.busy_timeout.is_zero() {
            return Err(ConfigError::ZeroBusyTimeout);
        }

        let config = Config {
            bus_device,
            data_cmd,
            reset,
            busy,
            power,
            dimensions,
            busy_timeout: self.busy_timeout,
            bus_speed_hz: self.bus_speed_hz,
            target: self.target,
        };

        for (i, first) in LineRole::ALL.iter().enumerate() {
            for second in &LineRole::ALL[i + 1..] {
                let line = config.line(*first);
                if line == config.line(*second) {
                    return Err(ConfigError::DuplicateLine {
                        first: *first,
                        second: *second,
                        controller: line.controller.clone(),
                        offset: line.offset,
                    });
                }
            }
        }

        Ok(config)
    }

    fn require(line: Option<LineConfig>, role: LineRole) -> Result<LineConfig, ConfigError> {
        let line = line.ok_or(ConfigError::MissingLine(role))?;
        if line.controller.trim().is_empty() {
            return Err(ConfigError::EmptyController(role));
        }
        Ok(line)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dimensions_buffer_size() {
        let dims = Dimensions::default();
        assert_eq!(dims.row_bytes(), 16);
        assert_eq!(dims.buffer_size(), 4736);
    }

    #[test]
    fn test_buffer_size_rounds_partial_bytes_up() {
        let dims = Dimensions::new(10, 12).unwrap();
        assert_eq!(dims.row_bytes(), 2);
        assert_eq!(dims.buffer_size(), 20);
    }

    #[test]
    fn test_dimensions_too_large() {
        assert!(matches!(
            Dimensions::new(297, 128),
            Err(ConfigError::InvalidDimensions { rows: 297, .. })
        ));
        assert!(Dimensions::new(296, 184).is_err());
        assert!(Dimensions::new(0, 128).is_err());
    }

    #[test]
    fn test_reference_wiring_builds() {
        let config = Builder::reference_wiring().build().unwrap();
        assert_eq!(config.bus_device, "/dev/spidev0.0");
        assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
        assert!(matches!(config.target, Target::Simulation(_)));
    }

    #[test]
    fn test_missing_bus_device() {
        let result = Builder::reference_wiring().bus_device("  ").build();
        assert!(matches!(result, Err(ConfigError::MissingBusDevice)));
    }

    #[test]
    fn test_missing_line() {
        let result = Builder::new()
            .bus_device("/dev/spidev0.0")
            .data_cmd(LineConfig::new("gpiochip0", 25))
            .reset(LineConfig::new("gpiochip0", 17))
            .power(LineConfig::new("gpiochip0", 18))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingLine(LineRole::Busy))
        ));
    }

    #[test]
    fn test_empty_controller() {
        let result = Builder::reference_wiring()
            .power(LineConfig::new("", 18))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::EmptyController(LineRole::Power))
        ));
    }

    #[test]
    fn test_duplicate_line() {
        let result = Builder::reference_wiring()
            .power(LineConfig::new("gpiochip0", 17))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateLine {
                first: LineRole::Reset,
                second: LineRole::Power,
                offset: 17,
                ..
            })
        ));
    }

    #[test]
    fn test_same_offset_on_different_controllers_is_fine() {
        let result = Builder::reference_wiring()
            .power(LineConfig::new("gpiochip1", 17))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_zero_busy_timeout() {
        let result = Builder::reference_wiring()
            .busy_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(ConfigError::ZeroBusyTimeout)));
    }

    #[test]
    fn test_chip_path() {
        assert_eq!(
            LineConfig::new("gpiochip0", 1).chip_path(),
            "/dev/gpiochip0"
        );
        assert_eq!(
            LineConfig::new("/dev/gpiochip4", 1).chip_path(),
            "/dev/gpiochip4"
        );
    }

    #[test]
    fn test_summary_drops_target() {
        let config = Builder::reference_wiring()
            .target(Target::Device)
            .build()
            .unwrap();
        let summary = config.summary();
        assert_eq!(summary.bus_device, config.bus_device);
        assert_eq!(summary.busy, config.busy);
        assert_eq!(summary.dimensions, config.dimensions);
    }
}
