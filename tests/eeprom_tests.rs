//! EEPROM driver tests against the SPI-level device model

use core::cell::RefCell;

use soundbox::eeprom::{Eeprom, EepromError};
use soundbox::sim::{EepromSim, SimCsPin, SimDelay, SimSpiBus, SIM_BUSY_POLLS, SIM_EEPROM_ID};

type Model = RefCell<EepromSim<4096>>;

fn driver(model: &Model) -> Eeprom<SimSpiBus<'_, 4096>, SimCsPin<'_, 4096>> {
    Eeprom::new(SimSpiBus::new(model), SimCsPin::new(model))
}

#[test]
fn test_read_id() {
    let model = Model::default();
    let mut eeprom = driver(&model);

    let id = eeprom.read_id().unwrap();
    assert_eq!(id, SIM_EEPROM_ID);

    // Exactly one chip-select bracket, closed afterwards.
    assert_eq!(model.borrow().select_count(), 1);
    assert!(!model.borrow().is_selected());
}

#[test]
fn test_page_program_sequence() {
    let model = Model::default();
    let mut eeprom = driver(&model);
    let mut delay = SimDelay::new();

    let data: Vec<u8> = (0u8..128).collect();
    eeprom.write_enable().unwrap();
    eeprom.page_program(0x80, &data).unwrap();
    let polls = eeprom.wait_write_complete(&mut delay).unwrap();

    // Device reports busy for a few polls, then idle.
    assert_eq!(polls, SIM_BUSY_POLLS as u32 + 1);

    let m = model.borrow();
    for (i, &b) in data.iter().enumerate() {
        assert_eq!(m.mem(0x80 + i), b);
    }
    // write-enable, page-program, status poll: three brackets.
    assert_eq!(m.select_count(), 3);
    assert!(!m.is_selected());
}

#[test]
fn test_program_without_write_enable_is_ignored() {
    let model = Model::default();
    let mut eeprom = driver(&model);

    eeprom.page_program(0, &[0x42]).unwrap();
    assert_eq!(model.borrow().mem(0), 0xFF);
}

#[test]
fn test_streaming_read_autoincrements() {
    let model = Model::default();
    model.borrow_mut().load(200, &[10, 20, 30, 40]);
    let mut eeprom = driver(&model);

    let mut stream = eeprom.begin_read(200).unwrap();
    assert!(model.borrow().is_selected());

    assert_eq!(stream.next().unwrap(), 10);
    assert_eq!(stream.next().unwrap(), 20);
    assert_eq!(stream.next().unwrap(), 30);
    assert_eq!(stream.next().unwrap(), 40);
    drop(stream);

    // The whole stream was one bracket, and dropping closed it.
    assert_eq!(model.borrow().select_count(), 1);
    assert!(!model.borrow().is_selected());
}

#[test]
fn test_write_timeout_is_fatal() {
    let model = Model::default();
    model.borrow_mut().set_stuck_busy(true);
    let mut eeprom = driver(&model);
    let mut delay = SimDelay::new();

    eeprom.write_enable().unwrap();
    eeprom.page_program(0, &[1, 2, 3]).unwrap();
    let err = eeprom.wait_write_complete(&mut delay).unwrap_err();

    match err {
        EepromError::WriteTimeout { status } => assert_eq!(status & 0x01, 0x01),
        other => panic!("expected WriteTimeout, got {:?}", other),
    }
    // Chip select was released on the error path.
    assert!(!model.borrow().is_selected());
}

#[test]
fn test_status_poll_respects_poll_interval() {
    let model = Model::default();
    let mut eeprom = driver(&model);
    let mut delay = SimDelay::new();

    eeprom.write_enable().unwrap();
    eeprom.page_program(0, &[0xAA]).unwrap();
    let polls = eeprom.wait_write_complete(&mut delay).unwrap();

    // One poll interval elapsed per status read.
    assert_eq!(delay.total_ms(), polls as u64);
}
