//! Bootstrap (XMODEM receive + EEPROM program) tests

use core::cell::RefCell;

use soundbox::eeprom::{Eeprom, EepromError};
use soundbox::sim::{EepromSim, SimCsPin, SimDelay, SimSpiBus, SimUart};
use soundbox::xmodem::{Bootstrap, BootstrapError, ACK, EOT, NAK};

type Model = RefCell<EepromSim<4096>>;

fn driver(model: &Model) -> Eeprom<SimSpiBus<'_, 4096>, SimCsPin<'_, 4096>> {
    Eeprom::new(SimSpiBus::new(model), SimCsPin::new(model))
}

fn pattern_block(base: u8) -> [u8; 128] {
    let mut block = [0u8; 128];
    for (i, slot) in block.iter_mut().enumerate() {
        *slot = base.wrapping_add(i as u8);
    }
    block
}

#[test]
fn test_round_trip_two_blocks() {
    let model = Model::default();
    let mut eeprom = driver(&model);
    let mut uart: SimUart = SimUart::new();
    let mut delay = SimDelay::new();

    // Spec scenario: 0x00..0x7F then 0x80..0xFF, then EOT.
    let first = pattern_block(0x00);
    let second = pattern_block(0x80);
    uart.feed_block(1, &first);
    uart.feed_block(2, &second);
    uart.feed(&[EOT]);

    let mut bootstrap = Bootstrap::new(&mut uart, &mut eeprom, &mut delay);
    let programmed = bootstrap.run().unwrap();

    // Cursor advanced 128 per block.
    assert_eq!(programmed, 256);
    assert_eq!(bootstrap.cursor(), 256);

    // Image equals the payload concatenation from address 0.
    let m = model.borrow();
    for i in 0..128 {
        assert_eq!(m.mem(i), first[i]);
        assert_eq!(m.mem(128 + i), second[i]);
    }
    assert_eq!(m.program_count(), 2);
}

#[test]
fn test_wire_protocol_sequence() {
    let model = Model::default();
    let mut eeprom = driver(&model);
    let mut uart: SimUart = SimUart::new();
    let mut delay = SimDelay::new();

    uart.feed_block(1, &pattern_block(0x10));
    uart.feed(&[EOT]);

    Bootstrap::new(&mut uart, &mut eeprom, &mut delay)
        .run()
        .unwrap();

    let sent = uart.sent();
    let banner = b"Awaiting XMODEM...\r\n";
    assert_eq!(&sent[..banner.len()], banner);

    // After the banner: one opening NAK, one ACK per block, Done.
    let rest = &sent[banner.len()..];
    assert_eq!(rest[0], NAK);
    assert_eq!(rest[1], ACK);
    assert_eq!(&rest[2..], b"Done\r\n\r\n");
}

#[test]
fn test_malformed_lead_byte_is_fatal_without_partial_write() {
    let model = Model::default();
    let mut eeprom = driver(&model);
    let mut uart: SimUart = SimUart::new();
    let mut delay = SimDelay::new();

    // Neither SOH nor EOT.
    uart.feed(&[0x2A]);

    let err = Bootstrap::new(&mut uart, &mut eeprom, &mut delay)
        .run()
        .unwrap_err();
    assert_eq!(err, BootstrapError::Framing(0x2A));

    // Diagnostic names the byte; nothing was written to the device.
    let sent = String::from_utf8_lossy(uart.sent());
    assert!(sent.contains("Failed: 2A"), "diagnostic was: {}", sent);
    assert_eq!(model.borrow().program_count(), 0);
    assert!(model.borrow().image().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_garbage_after_good_block_leaves_block_intact() {
    let model = Model::default();
    let mut eeprom = driver(&model);
    let mut uart: SimUart = SimUart::new();
    let mut delay = SimDelay::new();

    let block = pattern_block(0x40);
    uart.feed_block(1, &block);
    uart.feed(&[0xFE]);

    let err = Bootstrap::new(&mut uart, &mut eeprom, &mut delay)
        .run()
        .unwrap_err();
    assert_eq!(err, BootstrapError::Framing(0xFE));

    // The accepted block committed; the fatal frame wrote nothing more.
    let m = model.borrow();
    assert_eq!(m.program_count(), 1);
    for i in 0..128 {
        assert_eq!(m.mem(i), block[i]);
    }
    assert_eq!(m.mem(128), 0xFF);
}

#[test]
fn test_checksum_is_not_validated() {
    let model = Model::default();
    let mut eeprom = driver(&model);
    let mut uart: SimUart = SimUart::new();
    let mut delay = SimDelay::new();

    // Frame a block by hand with a deliberately wrong checksum.
    let block = pattern_block(0x55);
    uart.feed(&[soundbox::xmodem::SOH, 1, !1u8]);
    uart.feed(&block);
    uart.feed(&[0xEE]); // bogus checksum, accepted on faith
    uart.feed(&[EOT]);

    let programmed = Bootstrap::new(&mut uart, &mut eeprom, &mut delay)
        .run()
        .unwrap();
    assert_eq!(programmed, 128);
    assert_eq!(model.borrow().mem(0), 0x55);
}

#[test]
fn test_write_timeout_surfaces_as_fatal_eeprom_error() {
    let model = Model::default();
    model.borrow_mut().set_stuck_busy(true);
    let mut eeprom = driver(&model);
    let mut uart: SimUart = SimUart::new();
    let mut delay = SimDelay::new();

    uart.feed_block(1, &pattern_block(0));

    let err = Bootstrap::new(&mut uart, &mut eeprom, &mut delay)
        .run()
        .unwrap_err();
    match err {
        BootstrapError::Eeprom(EepromError::WriteTimeout { .. }) => {}
        other => panic!("expected WriteTimeout, got {:?}", other),
    }
    // The block was never acknowledged, and the link carries the timeout
    // dump with the last status byte (write-in-progress still set).
    assert!(!uart.sent().contains(&ACK));
    let sent = String::from_utf8_lossy(uart.sent());
    assert!(
        sent.contains("EEPROM write timeout exceeded! Status: 01"),
        "diagnostic was: {}",
        sent
    );
}

#[test]
fn test_empty_transfer_is_done_immediately() {
    let model = Model::default();
    let mut eeprom = driver(&model);
    let mut uart: SimUart = SimUart::new();
    let mut delay = SimDelay::new();

    uart.feed(&[EOT]);

    let programmed = Bootstrap::new(&mut uart, &mut eeprom, &mut delay)
        .run()
        .unwrap();
    assert_eq!(programmed, 0);
    assert_eq!(model.borrow().program_count(), 0);
}
