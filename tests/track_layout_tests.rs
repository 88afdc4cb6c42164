//! Track table layout tests

use soundbox::config::{SAMPLE_RATE_HZ, TRACKS, TRACK_COUNT};

#[test]
fn test_five_tracks() {
    assert_eq!(TRACKS.len(), TRACK_COUNT);
    assert_eq!(TRACK_COUNT, 5);
}

#[test]
fn test_starts_monotonically_increasing() {
    for pair in TRACKS.windows(2) {
        assert!(
            pair[0].start < pair[1].start,
            "track starts out of order: {} >= {}",
            pair[0].start,
            pair[1].start
        );
    }
}

#[test]
fn test_ranges_do_not_overlap() {
    for pair in TRACKS.windows(2) {
        assert!(
            pair[0].end() <= pair[1].start,
            "track range overlaps the next: end {} > start {}",
            pair[0].end(),
            pair[1].start
        );
    }
}

#[test]
fn test_addressable_with_24_bits() {
    for track in &TRACKS {
        assert!(track.end() <= 1 << 24);
    }
}

#[test]
fn test_lengths_match_recordings() {
    // 8.5 / 4 / 3 / 9.4 / 7.2 seconds at 8 kHz.
    let expected_ms = [8_500, 4_000, 3_000, 9_400, 7_200];
    for (track, ms) in TRACKS.iter().zip(expected_ms) {
        assert_eq!(track.duration_ms(SAMPLE_RATE_HZ), ms);
    }
}
