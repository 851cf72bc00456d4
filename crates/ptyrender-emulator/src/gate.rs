//! Binary content heuristic applied to each chunk before parsing.

use ptyrender_core::GateSettings;

/// Decides whether a chunk looks like binary data rather than terminal output.
///
/// Only the first `sample_size` bytes are inspected. Chunks shorter than the
/// sample window are never classified as binary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentGate {
    settings: GateSettings,
}

impl Default for ContentGate {
    fn default() -> Self {
        Self::new(GateSettings::default())
    }
}

impl ContentGate {
    /// Create a gate with the given thresholds.
    pub fn new(settings: GateSettings) -> Self {
        Self { settings }
    }

    /// Gate thresholds.
    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Check if `chunk` should be treated as binary content.
    pub fn is_binary(&self, chunk: &[u8]) -> bool {
        let sample_size = self.settings.sample_size;
        if sample_size == 0 || chunk.len() < sample_size {
            return false;
        }

        let sample = &chunk[..sample_size];
        let (nulls, controls) = sample.iter().fold((0usize, 0usize), |(nulls, controls), &byte| {
            (
                nulls + usize::from(byte == 0),
                controls + usize::from(is_counted_control(byte)),
            )
        });

        let len = sample.len() as f64;
        nulls as f64 / len > self.settings.null_threshold
            || controls as f64 / len > self.settings.control_threshold
    }

    /// Check if rendering of `chunk` should be skipped.
    pub fn should_skip_rendering(&self, chunk: &[u8]) -> bool {
        self.is_binary(chunk)
    }
}

/// C0 controls and DEL, except the whitespace controls TAB, LF and CR.
fn is_counted_control(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F | 0x7F)
}
