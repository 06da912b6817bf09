//! Look-Up Tables for refresh modes
//!
//! A [`Waveform`] bundles the 153-byte LUT with the register values that are
//! loaded alongside it (end option, gate/source voltages and VCOM).

/// LUT size required by the SSD1680 controller
pub const LUT_SIZE: usize = 153;

/// Refresh waveform loaded into the controller before an update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Waveform {
    /// LUT register contents (command 0x32)
    pub lut: [u8; LUT_SIZE],
    /// LUT end option (command 0x3F)
    pub end_option: u8,
    /// Gate driving voltage (command 0x03)
    pub gate_voltage: u8,
    /// Source driving voltages VSH1, VSH2, VSL (command 0x04)
    pub source_voltage: [u8; 3],
    /// VCOM register (command 0x2C)
    pub vcom: u8,
}

/// Full refresh waveform
///
/// Slow, flashes the panel, clears ghosting.
#[rustfmt::skip]
pub const WAVEFORM_FULL: Waveform = Waveform {
    lut: [
        0x80, 0x66, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00,
        0x10, 0x66, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00,
        0x80, 0x66, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00,
        0x10, 0x66, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x14, 0x08, 0x00, 0x00, 0x00, 0x00, 0x01,
        0x0A, 0x0A, 0x00, 0x0A, 0x0A, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x14, 0x08, 0x00, 0x01, 0x00, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x44, 0x44, 0x44, 0x44, 0x44, 0x44, 0x00, 0x00, 0x00,
    ],
    end_option: 0x22,
    gate_voltage: 0x17,
    source_voltage: [0x41, 0x00, 0x32],
    vcom: 0x36,
};

/// Partial refresh waveform
///
/// Only drives pixels that differ between the two RAM planes. Fast, leaves
/// some ghosting.
#[rustfmt::skip]
pub const WAVEFORM_PARTIAL: Waveform = Waveform {
    lut: [
        0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x80, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x40, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x00, 0x00, 0x00,
    ],
    end_option: 0x22,
    gate_voltage: 0x17,
    source_voltage: [0x41, 0xB0, 0x32],
    vcom: 0x36,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveforms_have_distinct_luts() {
        assert_ne!(WAVEFORM_FULL.lut, WAVEFORM_PARTIAL.lut);
    }

    #[test]
    fn test_lut_size_matches_controller() {
        assert_eq!(WAVEFORM_FULL.lut.len(), 153);
        assert_eq!(WAVEFORM_PARTIAL.lut.len(), 153);
    }
}
