//! SSD1680 command definitions
//!
//! Command bytes and fixed payloads used to drive the 2.9" panel controller.
//! Commands are sent over SPI with the data/command line low; their payload
//! follows with the line high.
//!
//! ## Command Structure
//!
//! Every command follows the same pattern:
//! 1. Set DC low (command mode)
//! 2. Send the command byte
//! 3. Set DC high (data mode)
//! 4. Send the payload bytes (if any)
//!
//! Opcodes and payloads must go out bit-exactly; the controller does not
//! tolerate substitutes.
//!
//! ## Example
//!
//! ```
//! use moodink::command;
//!
//! assert_eq!(command::SOFT_RESET, 0x12);
//! assert_eq!(command::DEEP_SLEEP_PAYLOAD, [0x01]);
//! ```

// System control commands

/// Driver output control command (0x01)
///
/// Sets the number of gate outputs (rows) and scanning direction.
/// Requires 3 bytes: [rows-1 (LSB), rows-1 (MSB), scanning mode]
pub const DRIVER_OUTPUT_CONTROL: u8 = 0x01;

/// Gate driving voltage command (0x03)
///
/// Part of the waveform block. Requires 1 byte.
pub const GATE_VOLTAGE: u8 = 0x03;

/// Source driving voltage command (0x04)
///
/// Part of the waveform block. Requires 3 bytes (VSH1, VSH2, VSL).
pub const SOURCE_VOLTAGE: u8 = 0x04;

/// Deep sleep mode command (0x10)
///
/// Requires 1 byte. Waking up needs a hardware reset and full init.
pub const DEEP_SLEEP: u8 = 0x10;

/// Data entry mode command (0x11)
///
/// Controls the address counter auto-increment direction.
pub const DATA_ENTRY_MODE: u8 = 0x11;

/// Soft reset command (0x12)
///
/// Resets the controller to default state. Must wait for BUSY low after issuing.
pub const SOFT_RESET: u8 = 0x12;

// Display update commands

/// Master activation command (0x20)
///
/// Runs the display update sequence configured via [`DISPLAY_UPDATE_CTRL2`].
/// Must not be interrupted; BUSY stays high until the refresh is done.
pub const MASTER_ACTIVATION: u8 = 0x20;

/// Display update control 1 command (0x21)
///
/// RAM content options. Requires 2 bytes.
pub const DISPLAY_UPDATE_CTRL1: u8 = 0x21;

/// Display update control 2 command (0x22)
///
/// Selects the update sequence run by [`MASTER_ACTIVATION`].
pub const DISPLAY_UPDATE_CTRL2: u8 = 0x22;

// RAM commands

/// Write new-frame RAM command (0x24)
///
/// Pixel data follows: 1 bit per pixel, MSB first, 0=black, 1=white.
pub const WRITE_RAM_BW: u8 = 0x24;

/// Write previous-frame RAM command (0x26)
///
/// The controller diffs against this plane during a partial refresh.
pub const WRITE_RAM_RED: u8 = 0x26;

/// Write VCOM register command (0x2C)
pub const WRITE_VCOM: u8 = 0x2C;

/// Write LUT register command (0x32)
///
/// Requires exactly [`crate::lut::LUT_SIZE`] bytes.
pub const WRITE_LUT: u8 = 0x32;

/// Write display option register command (0x37)
///
/// Used before a partial refresh to enable the ping-pong RAM mode.
pub const DISPLAY_OPTION: u8 = 0x37;

/// Border waveform control command (0x3C)
pub const BORDER_WAVEFORM: u8 = 0x3C;

/// LUT end option command (0x3F)
pub const LUT_END_OPTION: u8 = 0x3F;

/// Set RAM X address start/end command (0x44)
///
/// X addresses are in bytes (pixel / 8). Requires 2 bytes.
pub const SET_RAM_X_RANGE: u8 = 0x44;

/// Set RAM Y address start/end command (0x45)
///
/// Requires 4 bytes: [start LSB, start MSB, end LSB, end MSB]
pub const SET_RAM_Y_RANGE: u8 = 0x45;

/// Set RAM X address counter command (0x4E)
pub const SET_RAM_X_COUNTER: u8 = 0x4E;

/// Set RAM Y address counter command (0x4F)
pub const SET_RAM_Y_COUNTER: u8 = 0x4F;

// Fixed payloads

/// Payload for [`DRIVER_OUTPUT_CONTROL`] on the 296-row panel
pub const DRIVER_OUTPUT_PAYLOAD: [u8; 3] = [0x27, 0x01, 0x00];

/// Payload for [`DATA_ENTRY_MODE`]: X increment, Y increment, X first
pub const DATA_ENTRY_PAYLOAD: [u8; 1] = [0x03];

/// Payload for [`DISPLAY_UPDATE_CTRL1`]: normal RAM, source S8-S167
pub const DISPLAY_UPDATE_CTRL1_PAYLOAD: [u8; 2] = [0x00, 0x80];

/// Payload for [`DEEP_SLEEP`]: deep sleep mode 1, RAM retained
pub const DEEP_SLEEP_PAYLOAD: [u8; 1] = [0x01];

/// [`DISPLAY_UPDATE_CTRL2`] sequence for a full refresh
pub const UPDATE_FULL: u8 = 0xC7;

/// [`DISPLAY_UPDATE_CTRL2`] sequence that only loads the waveform before a partial refresh
pub const UPDATE_LOAD_PARTIAL: u8 = 0xC0;

/// [`DISPLAY_UPDATE_CTRL2`] sequence for a partial refresh
pub const UPDATE_PARTIAL: u8 = 0x0F;

/// [`BORDER_WAVEFORM`] value used for partial refresh
pub const BORDER_PARTIAL: u8 = 0x80;

/// [`DISPLAY_OPTION`] block enabling ping-pong mode for partial refresh
pub const DISPLAY_OPTION_PARTIAL: [u8; 10] =
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00];
