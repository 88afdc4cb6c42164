//! soundbox - simulator entry point
//!
//! Runs the full firmware path against the simulated board: bootstrap two
//! XMODEM blocks into the EEPROM model, then trigger one playback cycle
//! and report what reached the PWM duty register. Chip/clock/pin bring-up
//! for the real target is out of scope here; on hardware the same
//! `Bootstrap` and `Player` run over the register-backed peripheral
//! implementations.

use core::cell::RefCell;

use soundbox::fault::{FaultCode, FaultState};
use soundbox::sim::{
    EepromSim, EventLog, SimCsPin, SimDelay, SimLed, SimPwm, SimSpiBus, SimTimer, SimUart,
    SimWake,
};
use soundbox::{Board, Bootstrap, BootstrapError, Eeprom, EepromError, Player, Track};

static FAULT: FaultState = FaultState::new();

fn main() {
    let model = RefCell::new(EepromSim::<1024>::new());
    let log = RefCell::new(EventLog::<2048>::new());
    let mut uart: SimUart = SimUart::new();

    let mut board = Board {
        eeprom: Eeprom::new(SimSpiBus::new(&model), SimCsPin::new(&model)),
        pwm: SimPwm::new(&log),
        timer: SimTimer::new(&log),
        led: SimLed::new(),
        wake: SimWake::new(),
        delay: SimDelay::new(),
    };
    board.power_on().expect("sim power on");

    // Host side of the transfer: two framed blocks, then EOT.
    let mut first = [0u8; 128];
    let mut second = [0u8; 128];
    for i in 0..128 {
        first[i] = i as u8;
        second[i] = 0x80 | i as u8;
    }
    uart.feed_block(1, &first);
    uart.feed_block(2, &second);
    uart.feed(&[soundbox::xmodem::EOT]);

    let id = board.eeprom.read_id().expect("sim id read");
    println!(
        "EEPROM ID: {:02X} {:02X} {:02X}",
        id[0], id[1], id[2]
    );

    let programmed = {
        let mut bootstrap = Bootstrap::new(&mut uart, &mut board.eeprom, &mut board.delay);
        match bootstrap.run() {
            Ok(bytes) => bytes,
            Err(e) => {
                // The firmware's fatal path: record the fault and park.
                // The simulator reports and exits instead of spinning.
                match e {
                    BootstrapError::Framing(byte) => {
                        FAULT.set(FaultCode::BootstrapFraming, byte as u32)
                    }
                    BootstrapError::Eeprom(EepromError::WriteTimeout { status }) => {
                        FAULT.set(FaultCode::EepromWriteTimeout, status as u32)
                    }
                    _ => {}
                }
                eprintln!("bootstrap failed: {:?} (fault {:?})", e, FAULT.code());
                std::process::exit(1);
            }
        }
    };
    println!("Programmed {} bytes", programmed);
    println!("Device said: {}", String::from_utf8_lossy(uart.sent()));

    // One playback cycle over the freshly programmed image.
    let tracks = [Track::new(0, 256)];
    let mut player = Player::new(board, &tracks);
    player.play_next().expect("sim playback");

    let log = log.borrow();
    let samples: Vec<u8> = log.duty_writes().collect();
    println!(
        "Played {} samples over {} ticks; first 8: {:?}",
        samples.len(),
        log.tick_count(),
        &samples[..8]
    );
    assert_eq!(&samples[..128], &first[..]);
    assert_eq!(&samples[128..], &second[..]);
    println!("Playback image matches programmed blocks");
}
