//! SSD1680 wire protocol
//!
//! [`Driver`] owns one [`Backend`] and speaks the controller's command set
//! through the [`Hal`] contract: the reset-and-configure sequence, full and
//! partial frame transfers, bounded busy waits and deep sleep.
//!
//! ## Example
//!
//! ```
//! use moodink::{Builder, Driver, SimulatedBackend};
//!
//! let config = Builder::reference_wiring().build()?;
//! let mut driver = Driver::<SimulatedBackend>::open(config)?;
//!
//! // A full-refresh frame must be exactly ceil(128/8) * 296 bytes
//! driver.display_image(&vec![0x55; 4736])?;
//! assert!(driver.display_image(&[0u8; 3]).is_err());
//!
//! driver.sleep()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use log::{debug, info, warn};

use crate::backend::{Backend, BackendKind};
use crate::command::{
    BORDER_PARTIAL, BORDER_WAVEFORM, DATA_ENTRY_MODE, DATA_ENTRY_PAYLOAD, DEEP_SLEEP,
    DEEP_SLEEP_PAYLOAD, DISPLAY_OPTION, DISPLAY_OPTION_PARTIAL, DISPLAY_UPDATE_CTRL1,
    DISPLAY_UPDATE_CTRL1_PAYLOAD, DISPLAY_UPDATE_CTRL2, DRIVER_OUTPUT_CONTROL, GATE_VOLTAGE,
    LUT_END_OPTION, MASTER_ACTIVATION, SET_RAM_X_COUNTER, SET_RAM_X_RANGE, SET_RAM_Y_COUNTER,
    SET_RAM_Y_RANGE, SOFT_RESET, SOURCE_VOLTAGE, UPDATE_FULL, UPDATE_LOAD_PARTIAL, UPDATE_PARTIAL,
    WRITE_LUT, WRITE_RAM_BW, WRITE_RAM_RED, WRITE_VCOM,
};
use crate::config::{Config, Dimensions};
use crate::error::{Error, HalError, Phase};
use crate::hal::{Hal, Line, Open, PinState};
use crate::lut::{WAVEFORM_FULL, WAVEFORM_PARTIAL, Waveform};

/// Interval between busy-line samples
pub const BUSY_POLL_INTERVAL_MS: u32 = 10;

/// Settle time between deep sleep and power-off
pub const SLEEP_SETTLE_MS: u32 = 2000;

/// Driver lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// Reset-and-configure sequence has not completed
    Uninitialized,
    /// Idle and ready for the next frame
    Ready,
    /// Waiting for the panel to release the busy line
    Busy,
}

/// Region specification for partial updates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    /// X coordinate in pixels (must be a multiple of 8)
    pub x: u16,
    /// Y coordinate in pixels
    pub y: u16,
    /// Width in pixels (must be a multiple of 8)
    pub w: u16,
    /// Height in pixels
    pub h: u16,
}

impl Region {
    /// Create a new region
    #[allow(clippy::many_single_char_names)]
    pub fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    /// Whole-panel region
    pub fn full(dimensions: Dimensions) -> Self {
        Self::new(0, 0, dimensions.cols, dimensions.rows)
    }

    /// Calculate the buffer size in bytes for this region
    pub fn buffer_size(&self) -> usize {
        (self.w as usize).div_ceil(8) * self.h as usize
    }

    /// Check the region is non-empty, byte-aligned and inside the panel
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRegion` otherwise.
    pub fn validate(&self, dimensions: Dimensions) -> Result<(), Error> {
        let Self { x, y, w, h } = *self;
        if w == 0
            || h == 0
            || x % 8 != 0
            || w % 8 != 0
            || x.saturating_add(w) > dimensions.cols
            || y.saturating_add(h) > dimensions.rows
        {
            return Err(Error::InvalidRegion { x, y, w, h });
        }
        Ok(())
    }
}

/// Driver output control payload for a panel with `rows` gate lines
fn driver_output_payload(rows: u16) -> [u8; 3] {
    let last = rows.saturating_sub(1);
    [(last & 0xFF) as u8, (last >> 8) as u8, 0x00]
}

fn wrap(phase: Phase, initializing: bool) -> impl Fn(HalError) -> Error {
    move |source| Error::in_phase(phase, source, initializing)
}

/// Panel driver over a selected backend
pub struct Driver<P> {
    backend: Backend<P>,
    config: Config,
    state: DriverState,
    /// The partial waveform is loaded and must be replaced before a full refresh
    partial_loaded: bool,
}

impl<P: Open> Driver<P> {
    /// Open the backend the configuration selects and initialize the panel
    ///
    /// # Errors
    ///
    /// Returns `Error::HardwareInit` if the backend cannot be opened or any
    /// step of the init sequence fails, `Error::Timeout` if the busy line
    /// never clears.
    pub fn open(config: Config) -> Result<Self, Error> {
        let backend = Backend::select(&config).map_err(wrap(Phase::Open, true))?;
        Self::with_backend(backend, config)
    }
}

impl<P: Hal> Driver<P> {
    /// Initialize the panel on an already-opened backend
    ///
    /// On failure the backend is closed before the error is returned.
    pub fn with_backend(backend: Backend<P>, config: Config) -> Result<Self, Error> {
        let mut driver = Self {
            backend,
            config,
            state: DriverState::Uninitialized,
            partial_loaded: false,
        };
        match driver.init() {
            Ok(()) => Ok(driver),
            Err(e) => {
                driver.release();
                Err(e)
            }
        }
    }

    /// Current driver state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Configuration the driver was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get display dimensions
    pub fn dimensions(&self) -> Dimensions {
        self.config.dimensions
    }

    /// Backend in use
    pub fn backend(&self) -> &Backend<P> {
        &self.backend
    }

    /// Which backend variant is in use
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    fn initializing(&self) -> bool {
        self.state == DriverState::Uninitialized
    }

    fn set_line(&mut self, line: Line, level: PinState, phase: Phase) -> Result<(), Error> {
        let wrap = wrap(phase, self.initializing());
        self.backend.set_line(line, level).map_err(wrap)
    }

    /// Send a command byte followed by its data
    fn command(&mut self, cmd: u8, data: &[u8], phase: Phase) -> Result<(), Error> {
        let wrap = wrap(phase, self.initializing());
        self.backend
            .set_line(Line::DataCommand, PinState::Low)
            .map_err(&wrap)?;
        self.backend.bus_write(&[cmd]).map_err(&wrap)?;
        if !data.is_empty() {
            self.backend
                .set_line(Line::DataCommand, PinState::High)
                .map_err(&wrap)?;
            self.backend.bus_write(data).map_err(&wrap)?;
        }
        Ok(())
    }

    /// Reset-and-configure sequence
    fn init(&mut self) -> Result<(), Error> {
        debug!("init: power on and hardware reset");
        self.set_line(Line::Power, PinState::High, Phase::HardwareReset)?;
        self.set_line(Line::Reset, PinState::High, Phase::HardwareReset)?;
        self.backend.delay_ms(50);
        self.set_line(Line::Reset, PinState::Low, Phase::HardwareReset)?;
        self.backend.delay_ms(2);
        self.set_line(Line::Reset, PinState::High, Phase::HardwareReset)?;
        self.backend.delay_ms(50);
        self.wait_idle(Phase::HardwareReset)?;

        debug!("init: software reset");
        self.command(SOFT_RESET, &[], Phase::SoftwareReset)?;
        self.wait_idle(Phase::SoftwareReset)?;

        let dims = self.config.dimensions;
        self.command(
            DRIVER_OUTPUT_CONTROL,
            &driver_output_payload(dims.rows),
            Phase::DriverOutput,
        )?;
        self.command(DATA_ENTRY_MODE, &DATA_ENTRY_PAYLOAD, Phase::DataEntryMode)?;
        self.set_window(Region::full(dims))?;
        self.command(
            DISPLAY_UPDATE_CTRL1,
            &DISPLAY_UPDATE_CTRL1_PAYLOAD,
            Phase::UpdateControl,
        )?;
        self.set_cursor(0, 0)?;
        self.wait_idle(Phase::MemoryCursor)?;

        self.load_waveform(&WAVEFORM_FULL)?;

        self.state = DriverState::Ready;
        info!("panel initialized ({}x{})", dims.cols, dims.rows);
        Ok(())
    }

    /// Load a waveform LUT and its voltage registers
    fn load_waveform(&mut self, waveform: &Waveform) -> Result<(), Error> {
        self.command(WRITE_LUT, &waveform.lut, Phase::Waveform)?;
        self.wait_idle(Phase::Waveform)?;
        self.command(LUT_END_OPTION, &[waveform.end_option], Phase::Waveform)?;
        self.command(GATE_VOLTAGE, &[waveform.gate_voltage], Phase::Waveform)?;
        self.command(SOURCE_VOLTAGE, &waveform.source_voltage, Phase::Waveform)?;
        self.command(WRITE_VCOM, &[waveform.vcom], Phase::Waveform)?;
        Ok(())
    }

    /// Set the RAM window; X bounds go out in bytes, Y bounds in rows
    fn set_window(&mut self, region: Region) -> Result<(), Error> {
        let x_start = (region.x / 8) as u8;
        let x_end = ((region.x + region.w - 1) / 8) as u8;
        let [ys_lo, ys_hi] = region.y.to_le_bytes();
        let [ye_lo, ye_hi] = (region.y + region.h - 1).to_le_bytes();

        self.command(SET_RAM_X_RANGE, &[x_start, x_end], Phase::MemoryWindow)?;
        self.command(
            SET_RAM_Y_RANGE,
            &[ys_lo, ys_hi, ye_lo, ye_hi],
            Phase::MemoryWindow,
        )
    }

    fn set_cursor(&mut self, x: u16, y: u16) -> Result<(), Error> {
        self.command(SET_RAM_X_COUNTER, &[(x / 8) as u8], Phase::MemoryCursor)?;
        self.command(SET_RAM_Y_COUNTER, &y.to_le_bytes(), Phase::MemoryCursor)
    }

    fn activate(&mut self, sequence: u8) -> Result<(), Error> {
        self.command(DISPLAY_UPDATE_CTRL2, &[sequence], Phase::Refresh)?;
        self.command(MASTER_ACTIVATION, &[], Phase::Refresh)?;
        self.wait_idle(Phase::Refresh)
    }

    /// Full-refresh transfer of a complete frame
    ///
    /// The previous-frame RAM receives the same data so a later partial
    /// refresh compares against what is on screen.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` without touching the bus if `frame` is not
    /// exactly `dimensions().buffer_size()` bytes.
    pub fn display_image(&mut self, frame: &[u8]) -> Result<(), Error> {
        let expected = self.config.dimensions.buffer_size();
        if frame.len() != expected {
            warn!("rejected {} byte frame, need {expected}", frame.len());
            return Err(Error::Validation {
                expected,
                actual: frame.len(),
            });
        }

        if self.partial_loaded {
            self.load_waveform(&WAVEFORM_FULL)?;
            self.partial_loaded = false;
        }

        debug!("full refresh");
        self.set_window(Region::full(self.config.dimensions))?;
        self.set_cursor(0, 0)?;
        self.command(WRITE_RAM_BW, frame, Phase::FrameWrite)?;
        self.command(WRITE_RAM_RED, frame, Phase::FrameWrite)?;
        self.activate(UPDATE_FULL)
    }

    /// Fill the panel with white
    pub fn clear(&mut self) -> Result<(), Error> {
        let white = vec![0xFF; self.config.dimensions.buffer_size()];
        self.display_image(&white)
    }

    /// Partial refresh of a byte-aligned region
    ///
    /// `data` holds `region.buffer_size()` bytes in the same layout as a full
    /// frame, restricted to the region.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRegion` or `Error::Validation` before any bus
    /// traffic if the region or data length is wrong.
    pub fn display_region(&mut self, region: Region, data: &[u8]) -> Result<(), Error> {
        region.validate(self.config.dimensions)?;
        let expected = region.buffer_size();
        if data.len() != expected {
            warn!("rejected {} byte region, need {expected}", data.len());
            return Err(Error::Validation {
                expected,
                actual: data.len(),
            });
        }

        debug!(
            "partial refresh at ({}, {}) size {}x{}",
            region.x, region.y, region.w, region.h
        );
        self.set_line(Line::Reset, PinState::Low, Phase::HardwareReset)?;
        self.backend.delay_ms(1);
        self.set_line(Line::Reset, PinState::High, Phase::HardwareReset)?;
        self.backend.delay_ms(2);

        self.load_waveform(&WAVEFORM_PARTIAL)?;
        self.partial_loaded = true;
        self.command(
            DISPLAY_OPTION,
            &DISPLAY_OPTION_PARTIAL,
            Phase::UpdateControl,
        )?;
        self.command(BORDER_WAVEFORM, &[BORDER_PARTIAL], Phase::UpdateControl)?;
        self.activate(UPDATE_LOAD_PARTIAL)?;

        self.set_window(region)?;
        self.set_cursor(region.x, region.y)?;
        self.command(WRITE_RAM_BW, data, Phase::FrameWrite)?;
        self.activate(UPDATE_PARTIAL)
    }

    /// Poll the busy line until it clears
    ///
    /// Samples every 10 ms for at most `timeout / 10 ms` polls. The bound is a
    /// poll count, so it holds even when the backend's delays are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` if the line is still asserted after the last
    /// poll.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> Result<(), Error> {
        self.poll_busy(timeout, Phase::Refresh)
    }

    fn wait_idle(&mut self, phase: Phase) -> Result<(), Error> {
        self.poll_busy(self.config.busy_timeout, phase)
    }

    fn poll_busy(&mut self, timeout: Duration, phase: Phase) -> Result<(), Error> {
        let wrap = wrap(phase, self.initializing());
        let previous = self.state;
        let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let polls = (waited_ms / u64::from(BUSY_POLL_INTERVAL_MS)).max(1);

        self.state = DriverState::Busy;
        for _ in 0..polls {
            if self.backend.read_busy().map_err(&wrap)? == PinState::Low {
                // A wait during init must not mark the driver ready early.
                self.state = if previous == DriverState::Uninitialized {
                    previous
                } else {
                    DriverState::Ready
                };
                return Ok(());
            }
            self.backend.delay_ms(BUSY_POLL_INTERVAL_MS);
        }

        warn!("busy line still asserted after {waited_ms} ms during {phase}");
        Err(Error::Timeout { phase, waited_ms })
    }

    /// Deep sleep and power off, then release the backend
    ///
    /// A release failure is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns `Error::BusTransfer` if the sleep command or power-off fails.
    /// The backend is released either way.
    pub fn sleep(mut self) -> Result<(), Error> {
        let result = self.power_down();
        self.release();
        if result.is_ok() {
            info!("panel asleep");
        }
        result
    }

    fn power_down(&mut self) -> Result<(), Error> {
        self.command(DEEP_SLEEP, &DEEP_SLEEP_PAYLOAD, Phase::DeepSleep)?;
        self.backend.delay_ms(SLEEP_SETTLE_MS);
        self.set_line(Line::Power, PinState::Low, Phase::PowerDown)
    }

    /// Release the backend
    ///
    /// # Errors
    ///
    /// Returns `Error::Resource` if any resource failed to release.
    pub fn close(self) -> Result<(), Error> {
        self.backend.close().map_err(Error::Resource)
    }

    /// Release the backend, logging instead of returning a failure
    fn release(self) {
        if let Err(e) = self.backend.close() {
            warn!("failed to release backend: {e}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::backend::simulated::{BusyBehavior, Call, CallLog};
    use crate::command::DRIVER_OUTPUT_PAYLOAD;
    use crate::config::{Builder, PANEL_ROWS, SimulationOptions, Target};

    fn config(busy: BusyBehavior, timeout: Duration) -> Config {
        Builder::reference_wiring()
            .busy_timeout(timeout)
            .target(Target::Simulation(SimulationOptions {
                busy,
                ..SimulationOptions::default()
            }))
            .build()
            .unwrap()
    }

    fn open(
        busy: BusyBehavior,
        timeout: Duration,
    ) -> (Result<Driver<SimulatedBackend>, Error>, CallLog) {
        let config = config(busy, timeout);
        let sim = SimulatedBackend::open(&config).unwrap();
        let log = sim.log();
        (Driver::with_backend(Backend::Simulated(sim), config), log)
    }

    fn ready() -> (Driver<SimulatedBackend>, CallLog) {
        let (driver, log) = open(BusyBehavior::AlwaysReady, Duration::from_secs(30));
        (driver.unwrap(), log)
    }

    #[test]
    fn test_init_command_order() {
        let (driver, log) = ready();
        assert_eq!(driver.state(), DriverState::Ready);
        assert_eq!(
            log.command_bytes(),
            vec![
                SOFT_RESET,
                DRIVER_OUTPUT_CONTROL,
                DATA_ENTRY_MODE,
                SET_RAM_X_RANGE,
                SET_RAM_Y_RANGE,
                DISPLAY_UPDATE_CTRL1,
                SET_RAM_X_COUNTER,
                SET_RAM_Y_COUNTER,
                WRITE_LUT,
                LUT_END_OPTION,
                GATE_VOLTAGE,
                SOURCE_VOLTAGE,
                WRITE_VCOM,
            ]
        );
    }

    #[test]
    fn test_init_payloads() {
        let (_driver, log) = ready();
        assert_eq!(log.last_payload(SOFT_RESET), Some(vec![]));
        assert_eq!(
            log.last_payload(DRIVER_OUTPUT_CONTROL),
            Some(DRIVER_OUTPUT_PAYLOAD.to_vec())
        );
        assert_eq!(log.last_payload(DATA_ENTRY_MODE), Some(vec![0x03]));
        assert_eq!(log.last_payload(SET_RAM_X_RANGE), Some(vec![0x00, 0x0F]));
        assert_eq!(
            log.last_payload(SET_RAM_Y_RANGE),
            Some(vec![0x00, 0x00, 0x27, 0x01])
        );
        assert_eq!(
            log.last_payload(DISPLAY_UPDATE_CTRL1),
            Some(vec![0x00, 0x80])
        );
        assert_eq!(log.last_payload(SET_RAM_X_COUNTER), Some(vec![0x00]));
        assert_eq!(log.last_payload(SET_RAM_Y_COUNTER), Some(vec![0x00, 0x00]));
        assert_eq!(log.last_payload(WRITE_LUT).unwrap().len(), 153);
        assert_eq!(
            log.last_payload(SOURCE_VOLTAGE),
            Some(WAVEFORM_FULL.source_voltage.to_vec())
        );
    }

    #[test]
    fn test_reset_ordering() {
        let (_driver, log) = ready();
        let calls = log.calls();
        assert_eq!(
            &calls[..8],
            &[
                Call::Open,
                Call::SetLine(Line::Power, PinState::High),
                Call::SetLine(Line::Reset, PinState::High),
                Call::Delay(50),
                Call::SetLine(Line::Reset, PinState::Low),
                Call::Delay(2),
                Call::SetLine(Line::Reset, PinState::High),
                Call::Delay(50),
            ]
        );
        assert_eq!(calls[8], Call::ReadBusy(PinState::Low));
    }

    #[test]
    fn test_driver_output_payload_from_rows() {
        assert_eq!(driver_output_payload(PANEL_ROWS), DRIVER_OUTPUT_PAYLOAD);
        assert_eq!(driver_output_payload(296), [0x27, 0x01, 0x00]);
        assert_eq!(driver_output_payload(250), [0xF9, 0x00, 0x00]);
    }

    #[test]
    fn test_busy_wait_is_bounded() {
        let (result, log) = open(BusyBehavior::NeverReady, Duration::from_millis(100));
        assert!(matches!(
            result,
            Err(Error::Timeout {
                phase: Phase::HardwareReset,
                waited_ms: 100
            })
        ));

        let calls = log.calls();
        let polls = calls
            .iter()
            .filter(|c| matches!(c, Call::ReadBusy(_)))
            .count();
        assert_eq!(polls, 10);
        // Failed init still releases the backend
        assert_eq!(calls.last(), Some(&Call::Close));
    }

    #[test]
    fn test_scripted_busy_polls_every_10ms() {
        let (driver, log) = open(
            BusyBehavior::Scripted(vec![PinState::High, PinState::High]),
            Duration::from_secs(1),
        );
        assert!(driver.is_ok());
        let calls = log.calls();
        assert_eq!(
            &calls[8..13],
            &[
                Call::ReadBusy(PinState::High),
                Call::Delay(10),
                Call::ReadBusy(PinState::High),
                Call::Delay(10),
                Call::ReadBusy(PinState::Low),
            ]
        );
    }

    #[test]
    fn test_wait_until_idle_timeout_leaves_busy_state() {
        // Four idle reads cover the init sequence, then the panel stays busy
        let mut script = vec![PinState::Low; 4];
        script.extend([PinState::High; 20]);
        let (driver, log) = open(BusyBehavior::Scripted(script), Duration::from_secs(1));
        let mut driver = driver.unwrap();
        log.clear();

        let result = driver.wait_until_idle(Duration::from_millis(50));
        assert!(matches!(
            result,
            Err(Error::Timeout {
                phase: Phase::Refresh,
                waited_ms: 50
            })
        ));
        assert_eq!(driver.state(), DriverState::Busy);
        assert_eq!(log.len(), 10);
    }

    #[test]
    fn test_successful_wait_after_timeout_returns_to_ready() {
        // Idle through init, then five busy reads, then idle again
        let mut script = vec![PinState::Low; 4];
        script.extend([PinState::High; 5]);
        let (driver, _log) = open(BusyBehavior::Scripted(script), Duration::from_secs(1));
        let mut driver = driver.unwrap();

        assert!(driver.wait_until_idle(Duration::from_millis(50)).is_err());
        assert_eq!(driver.state(), DriverState::Busy);

        driver.wait_until_idle(Duration::from_millis(50)).unwrap();
        assert_eq!(driver.state(), DriverState::Ready);

        driver.display_image(&[0xFF; 4736]).unwrap();
        assert_eq!(driver.state(), DriverState::Ready);
    }

    #[test]
    fn test_wait_until_idle_returns_to_ready() {
        let (mut driver, _log) = ready();
        assert!(driver.wait_until_idle(Duration::from_millis(50)).is_ok());
        assert_eq!(driver.state(), DriverState::Ready);
    }

    #[test]
    fn test_display_image_full_refresh() {
        let (mut driver, log) = ready();
        log.clear();

        let frame: Vec<u8> = (0..4736).map(|i| (i % 7) as u8).collect();
        driver.display_image(&frame).unwrap();

        assert_eq!(
            log.command_bytes(),
            vec![
                SET_RAM_X_RANGE,
                SET_RAM_Y_RANGE,
                SET_RAM_X_COUNTER,
                SET_RAM_Y_COUNTER,
                WRITE_RAM_BW,
                WRITE_RAM_RED,
                DISPLAY_UPDATE_CTRL2,
                MASTER_ACTIVATION,
            ]
        );
        assert_eq!(log.last_payload(WRITE_RAM_BW), Some(frame.clone()));
        assert_eq!(log.last_payload(WRITE_RAM_RED), Some(frame.clone()));
        assert_eq!(log.last_payload(DISPLAY_UPDATE_CTRL2), Some(vec![0xC7]));
        let sim = driver.backend().as_simulated().unwrap();
        assert_eq!(sim.visible(), frame.as_slice());
        assert_eq!(sim.previous_ram(), frame.as_slice());
    }

    #[test]
    fn test_display_image_rejects_wrong_length_without_bus_traffic() {
        let (mut driver, log) = ready();
        log.clear();

        for len in [0, 3, 4735, 4737] {
            let result = driver.display_image(&vec![0u8; len]);
            assert!(matches!(
                result,
                Err(Error::Validation {
                    expected: 4736,
                    actual
                }) if actual == len
            ));
        }
        assert!(log.is_empty());
    }

    #[test]
    fn test_clear_writes_white() {
        let (mut driver, log) = ready();
        driver.clear().unwrap();
        assert_eq!(log.last_payload(WRITE_RAM_BW), Some(vec![0xFF; 4736]));
    }

    #[test]
    fn test_region_validation() {
        let dims = Dimensions::default();
        assert!(Region::new(8, 0, 16, 10).validate(dims).is_ok());
        assert!(Region::new(4, 0, 16, 10).validate(dims).is_err());
        assert!(Region::new(8, 0, 12, 10).validate(dims).is_err());
        assert!(Region::new(120, 0, 16, 10).validate(dims).is_err());
        assert!(Region::new(0, 290, 8, 10).validate(dims).is_err());
        assert!(Region::new(0, 0, 0, 10).validate(dims).is_err());
        assert_eq!(Region::new(8, 0, 16, 10).buffer_size(), 20);
    }

    #[test]
    fn test_display_region_rejects_before_bus_traffic() {
        let (mut driver, log) = ready();
        log.clear();

        let result = driver.display_region(Region::new(3, 0, 8, 8), &[0u8; 8]);
        assert!(matches!(result, Err(Error::InvalidRegion { x: 3, .. })));

        let result = driver.display_region(Region::new(0, 0, 8, 8), &[0u8; 7]);
        assert!(matches!(
            result,
            Err(Error::Validation {
                expected: 8,
                actual: 7
            })
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn test_display_region_partial_sequence() {
        let (mut driver, log) = ready();
        driver.clear().unwrap();
        log.clear();

        let data = vec![0x00; 2 * 4];
        driver
            .display_region(Region::new(16, 100, 16, 4), &data)
            .unwrap();

        assert_eq!(
            log.last_payload(DISPLAY_OPTION),
            Some(DISPLAY_OPTION_PARTIAL.to_vec())
        );
        assert_eq!(log.last_payload(BORDER_WAVEFORM), Some(vec![0x80]));
        assert_eq!(log.last_payload(SET_RAM_X_RANGE), Some(vec![2, 3]));
        assert_eq!(
            log.last_payload(SET_RAM_Y_RANGE),
            Some(vec![100, 0, 103, 0])
        );
        assert_eq!(log.last_payload(SET_RAM_X_COUNTER), Some(vec![2]));
        assert_eq!(log.last_payload(WRITE_RAM_BW), Some(data));
        assert_eq!(log.last_payload(DISPLAY_UPDATE_CTRL2), Some(vec![0x0F]));

        let updates: Vec<Vec<u8>> = log
            .commands()
            .into_iter()
            .filter(|(cmd, _)| *cmd == DISPLAY_UPDATE_CTRL2)
            .map(|(_, data)| data)
            .collect();
        assert_eq!(updates, vec![vec![0xC0], vec![0x0F]]);

        let visible = driver.backend().as_simulated().unwrap().visible();
        assert_eq!(visible[100 * 16 + 2], 0x00);
        assert_eq!(visible[100 * 16 + 3], 0x00);
        assert_eq!(visible[100 * 16 + 4], 0xFF);
        assert_eq!(visible[104 * 16 + 2], 0xFF);
    }

    #[test]
    fn test_full_refresh_after_partial_reloads_full_waveform() {
        let (mut driver, log) = ready();
        driver
            .display_region(Region::new(0, 0, 8, 1), &[0x00])
            .unwrap();
        assert_eq!(
            log.last_payload(SOURCE_VOLTAGE),
            Some(WAVEFORM_PARTIAL.source_voltage.to_vec())
        );

        driver.clear().unwrap();
        assert_eq!(
            log.last_payload(SOURCE_VOLTAGE),
            Some(WAVEFORM_FULL.source_voltage.to_vec())
        );
    }

    #[test]
    fn test_sleep_ordering() {
        let (driver, log) = ready();
        log.clear();
        driver.sleep().unwrap();
        assert_eq!(
            log.calls(),
            vec![
                Call::SetLine(Line::DataCommand, PinState::Low),
                Call::BusWrite(vec![DEEP_SLEEP]),
                Call::SetLine(Line::DataCommand, PinState::High),
                Call::BusWrite(vec![0x01]),
                Call::Delay(2000),
                Call::SetLine(Line::Power, PinState::Low),
                Call::Close,
            ]
        );
    }

    #[test]
    fn test_close_releases_once() {
        let (driver, log) = ready();
        driver.close().unwrap();
        let closes = log
            .calls()
            .iter()
            .filter(|c| **c == Call::Close)
            .count();
        assert_eq!(closes, 1);
    }
}
