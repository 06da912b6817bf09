//! In-memory backend
//!
//! [`SimulatedBackend`] implements [`Hal`] without touching hardware. Every
//! call is appended to a [`CallLog`], the busy line follows a
//! [`BusyBehavior`], and a small model of the controller RAM decodes the
//! command stream so the "visible" panel contents can be inspected (or
//! rendered to a PNG) after each refresh.
//!
//! ## Example
//!
//! ```
//! use moodink::backend::simulated::{Call, SimulatedBackend};
//! use moodink::{Builder, Hal, Line, Open, PinState};
//!
//! let config = Builder::reference_wiring().build()?;
//! let mut backend = SimulatedBackend::open(&config)?;
//! let log = backend.log();
//!
//! backend.set_line(Line::Power, PinState::High)?;
//! backend.close()?;
//!
//! assert_eq!(
//!     log.calls(),
//!     vec![Call::Open, Call::SetLine(Line::Power, PinState::High), Call::Close]
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, trace, warn};

use crate::command;
use crate::config::{Config, Dimensions, SimulationOptions, Target};
use crate::error::HalError;
use crate::frame::ImageBuffer;
use crate::hal::{Hal, Line, Open, PinState};

/// One recorded backend call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// Backend opened
    Open,
    /// Output line driven
    SetLine(Line, PinState),
    /// Bytes written on the bus
    BusWrite(Vec<u8>),
    /// Busy line sampled, with the level returned
    ReadBusy(PinState),
    /// Delay requested, in ms
    Delay(u32),
    /// Backend closed
    Close,
}

/// Shared, append-only record of backend calls
///
/// Clones share the same log, so a test can keep one while the backend is
/// moved into a driver (and eventually consumed by `close`).
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, call: Call) {
        self.lock().push(call);
    }

    /// Snapshot of every call so far
    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    /// Number of calls recorded
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Payloads of every bus write, in order
    pub fn bus_writes(&self) -> Vec<Vec<u8>> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                Call::BusWrite(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Bus traffic decoded into `(command, data)` pairs
    ///
    /// Uses the level of the data/command line at each write: bytes written
    /// while it is low are commands, bytes written while it is high are
    /// appended to the data of the preceding command. Data with no preceding
    /// command is dropped.
    pub fn commands(&self) -> Vec<(u8, Vec<u8>)> {
        let mut dc = PinState::Low;
        let mut out: Vec<(u8, Vec<u8>)> = Vec::new();
        for call in self.lock().iter() {
            match call {
                Call::SetLine(Line::DataCommand, level) => dc = *level,
                Call::BusWrite(bytes) if dc == PinState::Low => {
                    out.extend(bytes.iter().map(|cmd| (*cmd, Vec::new())));
                }
                Call::BusWrite(bytes) => {
                    if let Some((_, data)) = out.last_mut() {
                        data.extend_from_slice(bytes);
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Command bytes only, in order
    pub fn command_bytes(&self) -> Vec<u8> {
        self.commands().into_iter().map(|(cmd, _)| cmd).collect()
    }

    /// Data sent with the most recent occurrence of `cmd`
    pub fn last_payload(&self, cmd: u8) -> Option<Vec<u8>> {
        self.commands()
            .into_iter()
            .rev()
            .find(|(c, _)| *c == cmd)
            .map(|(_, data)| data)
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl PartialEq for CallLog {
    /// Two handles are equal when they share the same log
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.calls, &other.calls)
    }
}

/// How the simulated busy line responds to reads
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BusyBehavior {
    /// Always low (idle)
    #[default]
    AlwaysReady,
    /// Always high, so every busy wait times out
    NeverReady,
    /// Each read pops the next level; low once the script runs out
    Scripted(Vec<PinState>),
}

#[derive(Debug)]
enum BusyLine {
    Level(PinState),
    Script(VecDeque<PinState>),
}

impl BusyLine {
    fn new(behavior: &BusyBehavior) -> Self {
        match behavior {
            BusyBehavior::AlwaysReady => Self::Level(PinState::Low),
            BusyBehavior::NeverReady => Self::Level(PinState::High),
            BusyBehavior::Scripted(levels) => Self::Script(levels.iter().copied().collect()),
        }
    }

    fn read(&mut self) -> PinState {
        match self {
            Self::Level(level) => *level,
            Self::Script(levels) => levels.pop_front().unwrap_or(PinState::Low),
        }
    }
}

/// Controller RAM model
///
/// Assumes data entry mode 0x03 (X then Y, both incrementing), which is the
/// only mode the driver uses.
#[derive(Debug)]
struct PanelModel {
    dimensions: Dimensions,
    bw: Vec<u8>,
    red: Vec<u8>,
    visible: Vec<u8>,
    x_range: (u16, u16),
    y_range: (u16, u16),
    x: u16,
    y: u16,
    current: Option<u8>,
    params: Vec<u8>,
    refreshes: usize,
}

impl PanelModel {
    fn new(dimensions: Dimensions) -> Self {
        let size = dimensions.buffer_size();
        let last_col_byte = (dimensions.row_bytes() as u16).saturating_sub(1);
        Self {
            dimensions,
            bw: vec![0xFF; size],
            red: vec![0xFF; size],
            visible: vec![0xFF; size],
            x_range: (0, last_col_byte),
            y_range: (0, dimensions.rows.saturating_sub(1)),
            x: 0,
            y: 0,
            current: None,
            params: Vec::new(),
            refreshes: 0,
        }
    }

    /// Returns true when the command latched RAM to the visible frame
    fn command(&mut self, cmd: u8) -> bool {
        self.current = Some(cmd);
        self.params.clear();
        if cmd == command::MASTER_ACTIVATION {
            self.visible.clone_from(&self.bw);
            self.refreshes += 1;
            return true;
        }
        false
    }

    fn data(&mut self, bytes: &[u8]) {
        let Some(cmd) = self.current else {
            return;
        };
        for &byte in bytes {
            match cmd {
                command::WRITE_RAM_BW | command::WRITE_RAM_RED => self.write_ram(cmd, byte),
                _ => {
                    self.params.push(byte);
                    self.apply_params(cmd);
                }
            }
        }
    }

    fn apply_params(&mut self, cmd: u8) {
        let p = &self.params;
        match (cmd, p.len()) {
            (command::SET_RAM_X_RANGE, 2) => {
                self.x_range = (u16::from(p[0]), u16::from(p[1]));
            }
            (command::SET_RAM_Y_RANGE, 4) => {
                let start = u16::from_le_bytes([p[0], p[1]]);
                let end = u16::from_le_bytes([p[2], p[3]]);
                self.y_range = (start, end);
            }
            (command::SET_RAM_X_COUNTER, 1) => self.x = u16::from(p[0]),
            (command::SET_RAM_Y_COUNTER, 2) => self.y = u16::from_le_bytes([p[0], p[1]]),
            _ => {}
        }
    }

    fn write_ram(&mut self, cmd: u8, byte: u8) {
        let row_bytes = self.dimensions.row_bytes();
        if (self.x as usize) < row_bytes && self.y < self.dimensions.rows {
            let index = self.y as usize * row_bytes + self.x as usize;
            let plane = if cmd == command::WRITE_RAM_BW {
                &mut self.bw
            } else {
                &mut self.red
            };
            if let Some(slot) = plane.get_mut(index) {
                *slot = byte;
            }
        }

        self.x += 1;
        if self.x > self.x_range.1 {
            self.x = self.x_range.0;
            self.y += 1;
            if self.y > self.y_range.1 {
                self.y = self.y_range.0;
            }
        }
    }
}

/// Deterministic, non-blocking [`Hal`] implementation
#[derive(Debug)]
pub struct SimulatedBackend {
    log: CallLog,
    busy: BusyLine,
    real_delays: bool,
    render_path: Option<PathBuf>,
    dc: PinState,
    panel: PanelModel,
}

impl SimulatedBackend {
    /// Create a backend for a panel of the given size
    pub fn new(dimensions: Dimensions, options: &SimulationOptions) -> Self {
        Self {
            log: options.log.clone().unwrap_or_default(),
            busy: BusyLine::new(&options.busy),
            real_delays: options.real_delays,
            render_path: options.render_path.clone(),
            dc: PinState::Low,
            panel: PanelModel::new(dimensions),
        }
    }

    /// Handle to the call log, valid after the backend is closed
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Contents latched by the most recent refresh
    pub fn visible(&self) -> &[u8] {
        &self.panel.visible
    }

    /// Current contents of the new-frame RAM
    pub fn ram(&self) -> &[u8] {
        &self.panel.bw
    }

    /// Current contents of the previous-frame RAM
    pub fn previous_ram(&self) -> &[u8] {
        &self.panel.red
    }

    /// Number of master activations seen
    pub fn refresh_count(&self) -> usize {
        self.panel.refreshes
    }

    /// The visible frame as an [`ImageBuffer`]
    pub fn visible_frame(&self) -> Option<ImageBuffer> {
        ImageBuffer::from_slice(self.panel.dimensions, &self.panel.visible)
            .ok()
    }

    fn render(&self) {
        let Some(path) = &self.render_path else {
            return;
        };
        let Some(frame) = self.visible_frame() else {
            return;
        };
        match frame.save_png(path) {
            Ok(()) => debug!("rendered panel to {}", path.display()),
            Err(e) => warn!("failed to render panel to {}: {e}", path.display()),
        }
    }
}

impl Hal for SimulatedBackend {
    fn bus_write(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        self.log.push(Call::BusWrite(bytes.to_vec()));
        if self.dc == PinState::Low {
            let mut latched = false;
            for &cmd in bytes {
                trace!("sim: command 0x{cmd:02X}");
                latched |= self.panel.command(cmd);
            }
            if latched {
                self.render();
            }
        } else {
            self.panel.data(bytes);
        }
        Ok(())
    }

    fn set_line(&mut self, line: Line, level: PinState) -> Result<(), HalError> {
        self.log.push(Call::SetLine(line, level));
        if line == Line::DataCommand {
            self.dc = level;
        }
        Ok(())
    }

    fn read_busy(&mut self) -> Result<PinState, HalError> {
        let level = self.busy.read();
        self.log.push(Call::ReadBusy(level));
        Ok(level)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.push(Call::Delay(ms));
        if self.real_delays {
            std::thread::sleep(Duration::from_millis(u64::from(ms)));
        }
    }

    fn close(self) -> Result<(), HalError> {
        self.log.push(Call::Close);
        debug!("simulated backend closed");
        Ok(())
    }
}

impl Open for SimulatedBackend {
    fn open(config: &Config) -> Result<Self, HalError> {
        let backend = match &config.target {
            Target::Simulation(options) => Self::new(config.dimensions, options),
            Target::Device => Self::new(config.dimensions, &SimulationOptions::default()),
        };
        backend.log.push(Call::Open);
        debug!(
            "simulated backend opened for {}x{} panel",
            config.dimensions.cols, config.dimensions.rows
        );
        Ok(backend)
    }
}
