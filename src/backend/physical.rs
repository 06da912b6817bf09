//! Hardware backend over embedded-hal
//!
//! [`PhysicalBackend`] implements [`Hal`] for any embedded-hal 1.0 SPI device,
//! output pins, input pin and delay. On Linux, [`LinuxPanel`] opens spidev and
//! the GPIO character devices named in the configuration.
//!
//! ## Hardware Requirements
//!
//! - SPI bus (MOSI + SCK, chip select handled by the `SpiDevice`)
//! - 4 GPIO lines:
//!   - **DC**: Data/Command select (output)
//!   - **RST**: Reset (output, active low)
//!   - **BUSY**: Busy status (input, active high)
//!   - **PWR**: Power enable (output)
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "linux", target_os = "linux"))]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use moodink::backend::physical::LinuxPanel;
//! use moodink::{Builder, Driver, Target};
//!
//! let config = Builder::reference_wiring().target(Target::Device).build()?;
//! let mut driver = Driver::<LinuxPanel>::open(config)?;
//! driver.clear()?;
//! driver.sleep()?;
//! # Ok(())
//! # }
//! # #[cfg(not(all(feature = "linux", target_os = "linux")))]
//! # fn main() {}
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, SpiDevice};
use log::{debug, warn};

use crate::config::LineRole;
use crate::error::{HalError, Resource};
use crate::hal::{Hal, Line, PinState};

#[cfg(all(feature = "linux", target_os = "linux"))]
pub use linux::LinuxPanel;

/// Largest single SPI transfer (spidev's default `bufsiz`)
pub const MAX_TRANSFER: usize = 4096;

/// [`Hal`] implementation over embedded-hal traits
///
/// ## Type Parameters
///
/// * `SPI` - SPI device implementing [`SpiDevice`]
/// * `DC` - Data/Command pin implementing [`OutputPin`]
/// * `RST` - Reset pin implementing [`OutputPin`]
/// * `BUSY` - Busy pin implementing [`InputPin`]
/// * `PWR` - Power enable pin implementing [`OutputPin`]
/// * `D` - Delay implementing [`DelayNs`]
pub struct PhysicalBackend<SPI, DC, RST, BUSY, PWR, D> {
    /// SPI device for communication
    spi: SPI,
    /// Data/Command select pin (low=command, high=data)
    dc: DC,
    /// Reset pin (active low)
    rst: RST,
    /// Busy pin (active high)
    busy: BUSY,
    /// Power enable pin
    pwr: PWR,
    delay: D,
}

impl<SPI, DC, RST, BUSY, PWR, D> PhysicalBackend<SPI, DC, RST, BUSY, PWR, D>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    PWR: OutputPin,
    D: DelayNs,
{
    /// Wrap already-claimed bus, pins and delay
    pub fn new(spi: SPI, dc: DC, rst: RST, busy: BUSY, pwr: PWR, delay: D) -> Self {
        Self {
            spi,
            dc,
            rst,
            busy,
            pwr,
            delay,
        }
    }
}

fn drive<P: OutputPin>(pin: &mut P, level: PinState) -> Result<(), digital::ErrorKind> {
    pin.set_state(level).map_err(|e| digital::Error::kind(&e))
}

fn park<P: OutputPin>(
    pin: &mut P,
    role: LineRole,
    failures: &mut Vec<(Resource, String)>,
) {
    if let Err(e) = pin.set_low() {
        let kind = digital::Error::kind(&e);
        warn!("failed to park {role} line low: {kind:?}");
        failures.push((Resource::Line(role), format!("{kind:?}")));
    } else {
        debug!("released {role} line");
    }
}

impl<SPI, DC, RST, BUSY, PWR, D> Hal for PhysicalBackend<SPI, DC, RST, BUSY, PWR, D>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    PWR: OutputPin,
    D: DelayNs,
{
    fn bus_write(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        for chunk in bytes.chunks(MAX_TRANSFER) {
            self.spi
                .write(chunk)
                .map_err(|e| HalError::Bus(spi::Error::kind(&e)))?;
        }
        Ok(())
    }

    fn set_line(&mut self, line: Line, level: PinState) -> Result<(), HalError> {
        let result = match line {
            Line::DataCommand => drive(&mut self.dc, level),
            Line::Reset => drive(&mut self.rst, level),
            Line::Power => drive(&mut self.pwr, level),
        };
        result.map_err(|kind| HalError::Line { line, kind })
    }

    fn read_busy(&mut self) -> Result<PinState, HalError> {
        self.busy
            .is_high()
            .map(PinState::from)
            .map_err(|e| HalError::Busy(digital::Error::kind(&e)))
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    fn close(self) -> Result<(), HalError> {
        let Self {
            spi,
            mut dc,
            mut rst,
            busy,
            mut pwr,
            delay,
        } = self;
        let mut failures = Vec::new();

        drop(spi);
        debug!("released bus");

        park(&mut dc, LineRole::DataCommand, &mut failures);
        drop(dc);
        park(&mut rst, LineRole::Reset, &mut failures);
        drop(rst);
        drop(busy);
        debug!("released busy line");
        park(&mut pwr, LineRole::Power, &mut failures);
        drop(pwr);
        drop(delay);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HalError::Release(failures))
        }
    }
}

#[cfg(all(feature = "linux", target_os = "linux"))]
mod linux {
    use linux_embedded_hal::{
        CdevPin, Delay, SpidevDevice,
        gpio_cdev::{Chip, LineRequestFlags},
        spidev::{SpiModeFlags, SpidevOptions},
    };
    use log::{debug, info};

    use super::PhysicalBackend;
    use crate::config::{Config, LineRole};
    use crate::error::{HalError, Resource};
    use crate::hal::Open;

    /// Physical backend on Linux spidev and GPIO character devices
    pub type LinuxPanel = PhysicalBackend<SpidevDevice, CdevPin, CdevPin, CdevPin, CdevPin, Delay>;

    fn open_bus(config: &Config) -> Result<SpidevDevice, HalError> {
        let claim_err = |reason: String| HalError::Claim {
            resource: Resource::Bus,
            path: config.bus_device.clone(),
            reason,
        };

        let mut spi = SpidevDevice::open(&config.bus_device)
            .map_err(|e| claim_err(e.to_string()))?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(config.bus_speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)
            .map_err(|e| claim_err(e.to_string()))?;
        debug!(
            "claimed bus {} at {} Hz",
            config.bus_device, config.bus_speed_hz
        );
        Ok(spi)
    }

    fn request_line(config: &Config, role: LineRole) -> Result<CdevPin, HalError> {
        let line = config.line(role);
        let claim_err = |reason: String| HalError::Claim {
            resource: Resource::Line(role),
            path: line.to_string(),
            reason,
        };

        let (flags, default) = match role {
            LineRole::Busy => (LineRequestFlags::INPUT, 0),
            LineRole::Reset => (LineRequestFlags::OUTPUT, 1),
            LineRole::DataCommand | LineRole::Power => (LineRequestFlags::OUTPUT, 0),
        };

        let mut chip = Chip::new(line.chip_path())
            .map_err(|e| claim_err(e.to_string()))?;
        let handle = chip
            .get_line(line.offset)
            .and_then(|l| l.request(flags, default, role.consumer()))
            .map_err(|e| claim_err(e.to_string()))?;
        let pin = CdevPin::new(handle).map_err(|e| claim_err(e.to_string()))?;
        debug!("claimed {role} line {line}");
        Ok(pin)
    }

    impl Open for LinuxPanel {
        fn open(config: &Config) -> Result<Self, HalError> {
            // Each `?` drops whatever was claimed before it, releasing it.
            let spi = open_bus(config)?;
            let dc = request_line(config, LineRole::DataCommand)?;
            let rst = request_line(config, LineRole::Reset)?;
            let busy = request_line(config, LineRole::Busy)?;
            let pwr = request_line(config, LineRole::Power)?;
            info!("opened panel on {}", config.bus_device);
            Ok(PhysicalBackend::new(spi, dc, rst, busy, pwr, Delay))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreachable)]
mod tests {
    use std::io::ErrorKind;

    use embedded_hal_mock::eh1::MockError;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    use super::*;

    type MockBackend = PhysicalBackend<SpiMock<u8>, PinMock, PinMock, PinMock, PinMock, NoopDelay>;

    struct Mocks {
        spi: SpiMock<u8>,
        dc: PinMock,
        rst: PinMock,
        busy: PinMock,
        pwr: PinMock,
    }

    impl Mocks {
        fn done(mut self) {
            self.spi.done();
            self.dc.done();
            self.rst.done();
            self.busy.done();
            self.pwr.done();
        }
    }

    fn backend(
        spi: &[SpiTransaction<u8>],
        dc: &[PinTransaction],
        rst: &[PinTransaction],
        busy: &[PinTransaction],
        pwr: &[PinTransaction],
    ) -> (MockBackend, Mocks) {
        let mocks = Mocks {
            spi: SpiMock::new(spi),
            dc: PinMock::new(dc),
            rst: PinMock::new(rst),
            busy: PinMock::new(busy),
            pwr: PinMock::new(pwr),
        };
        let backend = PhysicalBackend::new(
            mocks.spi.clone(),
            mocks.dc.clone(),
            mocks.rst.clone(),
            mocks.busy.clone(),
            mocks.pwr.clone(),
            NoopDelay,
        );
        (backend, mocks)
    }

    fn write(bytes: Vec<u8>) -> [SpiTransaction<u8>; 3] {
        [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(bytes),
            SpiTransaction::transaction_end(),
        ]
    }

    fn parked() -> [PinTransaction; 1] {
        [PinTransaction::set(State::Low)]
    }

    fn failing_set() -> PinTransaction {
        PinTransaction::set(State::Low)
            .with_error(MockError::Io(ErrorKind::Other))
    }

    #[test]
    fn test_command_then_data() {
        let mut spi = Vec::new();
        spi.extend(write(vec![0x12]));
        spi.extend(write(vec![0x27, 0x01, 0x00]));
        let (mut backend, mocks) = backend(
            &spi,
            &[
                PinTransaction::set(State::Low),
                PinTransaction::set(State::High),
            ],
            &[],
            &[],
            &[],
        );

        backend.set_line(Line::DataCommand, PinState::Low).unwrap();
        backend.bus_write(&[0x12]).unwrap();
        backend.set_line(Line::DataCommand, PinState::High).unwrap();
        backend.bus_write(&[0x27, 0x01, 0x00]).unwrap();

        drop(backend);
        mocks.done();
    }

    #[test]
    fn test_large_writes_are_chunked() {
        let data: Vec<u8> = (0..5000).map(|i| (i % 256) as u8).collect();
        let mut spi = Vec::new();
        spi.extend(write(data[..MAX_TRANSFER].to_vec()));
        spi.extend(write(data[MAX_TRANSFER..].to_vec()));
        let (mut backend, mocks) = backend(&spi, &[], &[], &[], &[]);

        backend.bus_write(&data).unwrap();

        drop(backend);
        mocks.done();
    }

    #[test]
    fn test_read_busy_maps_levels() {
        let (mut backend, mocks) = backend(
            &[],
            &[],
            &[],
            &[
                PinTransaction::get(State::High),
                PinTransaction::get(State::Low),
            ],
            &[],
        );

        assert_eq!(backend.read_busy().unwrap(), PinState::High);
        assert_eq!(backend.read_busy().unwrap(), PinState::Low);

        drop(backend);
        mocks.done();
    }

    #[test]
    fn test_pin_error_maps_to_line_error() {
        let (mut backend, mocks) = backend(
            &[],
            &[],
            &[failing_set()],
            &[],
            &[],
        );

        let err = backend.set_line(Line::Reset, PinState::Low).unwrap_err();
        assert!(matches!(
            err,
            HalError::Line {
                line: Line::Reset,
                ..
            }
        ));

        drop(backend);
        mocks.done();
    }

    #[test]
    fn test_close_parks_outputs_low() {
        let (backend, mocks) = backend(&[], &parked(), &parked(), &[], &parked());
        backend.close().unwrap();
        mocks.done();
    }

    #[test]
    fn test_close_collects_failures_and_continues() {
        let (backend, mocks) = backend(
            &[],
            &[failing_set()],
            &parked(),
            &[],
            &[failing_set()],
        );

        let resources: Vec<Resource> = match backend.close() {
            Err(HalError::Release(failures)) => failures.into_iter().map(|(r, _)| r).collect(),
            other => unreachable!("expected release error, got {other:?}"),
        };
        assert_eq!(
            resources,
            vec![
                Resource::Line(LineRole::DataCommand),
                Resource::Line(LineRole::Power)
            ]
        );

        // The reset line was still parked despite the earlier failure
        mocks.done();
    }
}
