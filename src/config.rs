//! Module: config
//!
//! Purpose: Named timing and layout constants for the player.
//!
//! Every value here used to be a magic number scattered through the control
//! flow of the firmware. They are collected in one place and the derived
//! values are computed from their sources, so the sample clock, the PWM
//! carrier and the LED ramp cannot drift apart when one of them is retuned.
//! The track table is validated at compile time.

use crate::track::Track;

/// Main clock frequency in Hz (DCO calibrated to 12 MHz).
pub const CLOCK_HZ: u32 = 12_000_000;

/// Audio sample rate in Hz: 8-bit unsigned samples, one per tick.
pub const SAMPLE_RATE_HZ: u32 = 8_000;

/// Sample timer period in clock cycles. The timer overflow flag sets once
/// per rollover, which is the per-sample rendezvous for the playback loop.
pub const SAMPLE_CYCLES: u32 = CLOCK_HZ / SAMPLE_RATE_HZ;

/// PWM carrier rollover. The duty compare register takes the raw 8-bit
/// sample value directly, so the carrier period must be 256 counts.
pub const PWM_ROLLOVER: u32 = 256;

/// Number of stored audio clips. The play index wraps after the last one.
pub const TRACK_COUNT: usize = 5;

/// LED brightness ramp resolution (step counter runs 0..=LED_STEPS).
pub const LED_STEPS: u16 = 10;

/// Full bright-dim-bright LED cycles per second while playing.
pub const BLINK_PER_SEC: u32 = 2;

/// Samples between LED ramp steps, derived so one triangle period covers
/// `1 / BLINK_PER_SEC` seconds: rising and falling halves of LED_STEPS each.
pub const LED_STEP_TIME: u32 = (SAMPLE_RATE_HZ / BLINK_PER_SEC) / LED_STEPS as u32;

/// Pause between the end of one clip and re-arming the button, in ms.
pub const SETTLE_MS: u32 = 1_000;

/// Power-on delay before the first arm, in ms.
pub const STARTUP_DELAY_MS: u32 = 1_000;

// --- Bootstrap (XMODEM) ---

/// XMODEM payload size; equals the EEPROM page size, so one block is one
/// page-program transaction.
pub const XMODEM_BLOCK_LEN: usize = 128;

/// Spin iterations to wait for the sender after a NAK before resending it.
/// The outer await loop retries forever; this only paces the NAKs.
pub const XMODEM_AWAIT_SPINS: u32 = 0x10_0000;

/// Status-register polls (at 1 ms apiece) allowed for one page program
/// before the write is declared dead. Exceeding this is fatal.
pub const EEPROM_WRITE_TIMEOUT_POLLS: u32 = 1_000;

/// Milliseconds between write-in-progress polls.
pub const EEPROM_POLL_INTERVAL_MS: u32 = 1;

// --- Track table ---

/// Samples for a clip length given in tenths of a second.
const fn tenths(t: u32) -> u32 {
    SAMPLE_RATE_HZ * t / 10
}

/// The five stored clips. Offsets are byte addresses into the EEPROM;
/// at 8 kHz / 8-bit, bytes and samples coincide.
pub const TRACKS: [Track; TRACK_COUNT] = [
    Track::new(tenths(0), tenths(85)),   // 0.0s .. 8.5s
    Track::new(tenths(91), tenths(40)),  // 9.1s .. 13.1s
    Track::new(tenths(138), tenths(30)), // 13.8s .. 16.8s
    Track::new(tenths(174), tenths(94)), // 17.4s .. 26.8s
    Track::new(tenths(278), tenths(72)), // 27.8s .. 35.0s
];

/// Track ranges must be stored in address order without overlap, and every
/// byte must be reachable with a 24-bit read address.
const fn layout_is_valid(tracks: &[Track]) -> bool {
    let mut i = 0;
    while i < tracks.len() {
        if tracks[i].end() > 1 << 24 {
            return false;
        }
        if i + 1 < tracks.len() {
            if tracks[i].start >= tracks[i + 1].start {
                return false;
            }
            if tracks[i].end() > tracks[i + 1].start {
                return false;
            }
        }
        i += 1;
    }
    true
}

const _: () = assert!(layout_is_valid(&TRACKS));
const _: () = assert!(SAMPLE_CYCLES == 1_500);
const _: () = assert!(LED_STEP_TIME == 400);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_timing() {
        assert_eq!(SAMPLE_CYCLES, 1_500);
        assert_eq!(LED_STEP_TIME, 400);
        assert_eq!(PWM_ROLLOVER, 256);
    }

    #[test]
    fn test_track_table_shape() {
        assert_eq!(TRACKS.len(), TRACK_COUNT);
        assert_eq!(TRACKS[0].start, 0);
        // 8.5 s at 8 kHz
        assert_eq!(TRACKS[0].samples, 68_000);
        // Last clip ends inside the 24-bit address space
        assert!(TRACKS[4].end() <= 1 << 24);
    }

    #[test]
    fn test_layout_validator_rejects_overlap() {
        let bad = [Track::new(0, 200), Track::new(100, 50)];
        assert!(!layout_is_valid(&bad));

        let unordered = [Track::new(100, 10), Track::new(50, 10)];
        assert!(!layout_is_valid(&unordered));

        let good = [Track::new(0, 100), Track::new(100, 50)];
        assert!(layout_is_valid(&good));
    }
}
