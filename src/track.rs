//! Module: track
//!
//! Purpose: Track descriptor for the stored audio clips.
//!
//! A track is a contiguous byte range in the external EEPROM: a 24-bit start
//! address and a sample count. The table of all five tracks lives in
//! [`crate::config::TRACKS`] and is fixed at build time; nothing mutates a
//! descriptor at runtime.

/// One stored audio clip.
///
/// `start` is a byte address into the EEPROM address space (only the low
/// 24 bits are meaningful, which is all the read command can address).
/// `samples` is the clip length; at 8 bits per sample it is also the byte
/// length of the range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Track {
    /// First EEPROM byte address of the clip.
    pub start: u32,
    /// Number of samples (= bytes) in the clip.
    pub samples: u32,
}

impl Track {
    /// Create a track descriptor.
    pub const fn new(start: u32, samples: u32) -> Self {
        Self { start, samples }
    }

    /// One-past-the-end byte address of the clip.
    pub const fn end(&self) -> u32 {
        self.start + self.samples
    }

    /// Clip duration in whole milliseconds at the given sample rate.
    pub const fn duration_ms(&self, sample_rate_hz: u32) -> u32 {
        (self.samples as u64 * 1_000 / sample_rate_hz as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_end() {
        let t = Track::new(72_800, 32_000);
        assert_eq!(t.end(), 104_800);
    }

    #[test]
    fn test_track_duration() {
        let t = Track::new(0, 68_000);
        assert_eq!(t.duration_ms(8_000), 8_500);
    }
}
