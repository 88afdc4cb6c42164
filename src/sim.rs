//! Module: sim
//!
//! Purpose: Simulated peripheral set for host tests and the simulator
//! binary.
//!
//! Each simulated part implements the same trait seam the hardware does, so
//! the engine and the bootstrap run unmodified against it. The EEPROM is
//! modeled at the SPI level (opcode decode, write latch, auto-increment
//! read pointer, busy countdown) because the drivers' correctness claims
//! (chip-select bracketing, no partial page writes, one transaction in
//! flight) live at that level.
//!
//! Shared state goes through `RefCell`: the SPI bus adapter and the
//! chip-select pin adapter both point at the one `EepromSim`, and the PWM
//! and sample-timer sims share an event log so tests can assert the
//! one-duty-write-per-tick cadence.

use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, SpiBus};
use embedded_io::{ErrorType as IoErrorType, Read, ReadReady, Write};
use heapless::{Deque, Vec};

use crate::eeprom::{
    CMD_PAGE_PROGRAM, CMD_READ, CMD_READ_ID, CMD_READ_STATUS, CMD_WRITE_ENABLE, STATUS_WIP,
};
use crate::hal::{PwmCarrier, SampleTimer, WakeButton};
use crate::xmodem::SOH;

/// ID bytes the simulated part answers to 0x9F.
pub const SIM_EEPROM_ID: [u8; 3] = [0x20, 0x71, 0x15];

/// Status polls the simulated part stays busy after a page program.
pub const SIM_BUSY_POLLS: u8 = 3;

// ---------------------------------------------------------------------------
// EEPROM
// ---------------------------------------------------------------------------

/// Where the simulated device is within one chip-select bracket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BusPhase {
    /// Selected, opcode not yet received.
    Opcode,
    /// READ: collecting the 24-bit address, `n` bytes so far.
    ReadAddr { addr: u32, n: u8 },
    /// READ: streaming data, auto-incrementing.
    Reading { addr: u32 },
    /// PAGE PROGRAM: collecting the 24-bit address.
    ProgramAddr { addr: u32, n: u8 },
    /// PAGE PROGRAM: absorbing payload bytes.
    Programming { addr: u32 },
    /// READ STATUS: every further transfer returns a fresh status byte.
    Status,
    /// READ ID: returning the `n`th ID byte next.
    Id { n: u8 },
    /// Opcode consumed, nothing more to exchange (e.g. WRITE ENABLE).
    Complete,
}

/// SPI-level model of the serial EEPROM, `N` bytes of storage.
pub struct EepromSim<const N: usize> {
    mem: [u8; N],
    selected: bool,
    phase: BusPhase,
    write_enabled: bool,
    busy_polls: u8,
    stuck_busy: bool,
    programmed_this_bracket: bool,
    select_count: u32,
    program_count: u32,
}

impl<const N: usize> EepromSim<N> {
    pub fn new() -> Self {
        Self {
            mem: [0xFF; N],
            selected: false,
            phase: BusPhase::Complete,
            write_enabled: false,
            busy_polls: 0,
            stuck_busy: false,
            programmed_this_bracket: false,
            select_count: 0,
            program_count: 0,
        }
    }

    /// Stored byte at `addr` (wrapped to the array size).
    pub fn mem(&self, addr: usize) -> u8 {
        self.mem[addr % N]
    }

    /// Slice of the memory image.
    pub fn image(&self) -> &[u8] {
        &self.mem
    }

    /// Preload the image (for playback tests that skip the bootstrap).
    pub fn load(&mut self, addr: usize, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.mem[(addr + i) % N] = b;
        }
    }

    /// How many chip-select brackets the device has seen.
    pub fn select_count(&self) -> u32 {
        self.select_count
    }

    /// How many page programs committed.
    pub fn program_count(&self) -> u32 {
        self.program_count
    }

    /// True while a chip-select bracket is open.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    fn assert_cs(&mut self) {
        // Re-asserting an already-low CS is a driver bug worth surfacing.
        debug_assert!(!self.selected, "chip select asserted twice");
        self.selected = true;
        self.phase = BusPhase::Opcode;
        self.programmed_this_bracket = false;
        self.select_count += 1;
    }

    fn release_cs(&mut self) {
        if self.selected && self.programmed_this_bracket {
            // The device goes busy once the bracket closes.
            self.busy_polls = SIM_BUSY_POLLS;
            self.program_count += 1;
        }
        self.selected = false;
        self.phase = BusPhase::Complete;
    }

    /// Fault injection: the write-in-progress bit never clears again,
    /// exercising the bounded busy-wait's fatal path.
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    fn status(&mut self) -> u8 {
        if self.stuck_busy {
            return STATUS_WIP;
        }
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            STATUS_WIP
        } else {
            0
        }
    }

    /// One full-duplex byte exchange while selected.
    fn exchange(&mut self, mosi: u8) -> u8 {
        debug_assert!(self.selected, "SPI exchange without chip select");
        match self.phase {
            BusPhase::Opcode => {
                self.phase = match mosi {
                    CMD_READ => BusPhase::ReadAddr { addr: 0, n: 0 },
                    CMD_PAGE_PROGRAM => BusPhase::ProgramAddr { addr: 0, n: 0 },
                    CMD_READ_STATUS => BusPhase::Status,
                    CMD_READ_ID => BusPhase::Id { n: 0 },
                    CMD_WRITE_ENABLE => {
                        self.write_enabled = true;
                        BusPhase::Complete
                    }
                    _ => BusPhase::Complete,
                };
                0
            }
            BusPhase::ReadAddr { addr, n } => {
                let addr = (addr << 8) | mosi as u32;
                if n == 2 {
                    self.phase = BusPhase::Reading { addr };
                } else {
                    self.phase = BusPhase::ReadAddr { addr, n: n + 1 };
                }
                0
            }
            BusPhase::Reading { addr } => {
                let out = self.mem[addr as usize % N];
                self.phase = BusPhase::Reading {
                    addr: addr.wrapping_add(1),
                };
                out
            }
            BusPhase::ProgramAddr { addr, n } => {
                let addr = (addr << 8) | mosi as u32;
                if n == 2 {
                    self.phase = BusPhase::Programming { addr };
                } else {
                    self.phase = BusPhase::ProgramAddr { addr, n: n + 1 };
                }
                0
            }
            BusPhase::Programming { addr } => {
                if self.write_enabled {
                    self.mem[addr as usize % N] = mosi;
                    self.programmed_this_bracket = true;
                }
                self.phase = BusPhase::Programming {
                    addr: addr.wrapping_add(1),
                };
                0
            }
            BusPhase::Status => self.status(),
            BusPhase::Id { n } => {
                let out = SIM_EEPROM_ID[n as usize % 3];
                self.phase = BusPhase::Id { n: (n + 1) % 3 };
                out
            }
            BusPhase::Complete => 0,
        }
    }
}

impl<const N: usize> Default for EepromSim<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// `SpiBus` adapter over a shared [`EepromSim`].
pub struct SimSpiBus<'a, const N: usize> {
    model: &'a RefCell<EepromSim<N>>,
}

impl<'a, const N: usize> SimSpiBus<'a, N> {
    pub fn new(model: &'a RefCell<EepromSim<N>>) -> Self {
        Self { model }
    }
}

impl<const N: usize> SpiErrorType for SimSpiBus<'_, N> {
    type Error = Infallible;
}

impl<const N: usize> SpiBus<u8> for SimSpiBus<'_, N> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut model = self.model.borrow_mut();
        for word in words {
            *word = model.exchange(0);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut model = self.model.borrow_mut();
        for &word in words {
            model.exchange(word);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let mut model = self.model.borrow_mut();
        let common = read.len().min(write.len());
        for i in 0..common {
            read[i] = model.exchange(write[i]);
        }
        for word in &mut read[common..] {
            *word = model.exchange(0);
        }
        for &word in &write[common..] {
            model.exchange(word);
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut model = self.model.borrow_mut();
        for word in words {
            *word = model.exchange(*word);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Chip-select pin adapter over the same shared [`EepromSim`].
pub struct SimCsPin<'a, const N: usize> {
    model: &'a RefCell<EepromSim<N>>,
}

impl<'a, const N: usize> SimCsPin<'a, N> {
    pub fn new(model: &'a RefCell<EepromSim<N>>) -> Self {
        Self { model }
    }
}

impl<const N: usize> PinErrorType for SimCsPin<'_, N> {
    type Error = Infallible;
}

impl<const N: usize> OutputPin for SimCsPin<'_, N> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.model.borrow_mut().assert_cs();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.model.borrow_mut().release_cs();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PWM carrier + sample timer, sharing one event log
// ---------------------------------------------------------------------------

/// One observable playback event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Duty compare register written with a sample value.
    Duty(u8),
    /// Sample timer overflow consumed.
    Tick,
}

/// Interleaved record of duty writes and ticks, capacity `N` events.
pub struct EventLog<const N: usize> {
    events: Vec<PlaybackEvent, N>,
    overflowed: bool,
}

impl<const N: usize> EventLog<N> {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            overflowed: false,
        }
    }

    fn push(&mut self, event: PlaybackEvent) {
        if self.events.push(event).is_err() {
            self.overflowed = true;
        }
    }

    pub fn events(&self) -> &[PlaybackEvent] {
        &self.events
    }

    /// True if the log filled up and dropped events (a test sizing bug).
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Duty values in write order.
    pub fn duty_writes(&self) -> impl Iterator<Item = u8> + '_ {
        self.events.iter().filter_map(|e| match e {
            PlaybackEvent::Duty(v) => Some(*v),
            PlaybackEvent::Tick => None,
        })
    }

    pub fn tick_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::Tick))
            .count()
    }
}

impl<const N: usize> Default for EventLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated PWM carrier recording every duty write.
pub struct SimPwm<'a, const N: usize> {
    log: &'a RefCell<EventLog<N>>,
    running: bool,
    start_count: u32,
    stop_count: u32,
}

impl<'a, const N: usize> SimPwm<'a, N> {
    pub fn new(log: &'a RefCell<EventLog<N>>) -> Self {
        Self {
            log,
            running: false,
            start_count: 0,
            stop_count: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start_count(&self) -> u32 {
        self.start_count
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count
    }
}

impl<const N: usize> PwmCarrier for SimPwm<'_, N> {
    fn start(&mut self) {
        self.running = true;
        self.start_count += 1;
    }

    fn stop(&mut self) {
        self.running = false;
        self.stop_count += 1;
    }

    fn set_sample(&mut self, sample: u8) {
        self.log.borrow_mut().push(PlaybackEvent::Duty(sample));
    }
}

/// Simulated sample timer: every `wait_tick` completes immediately and is
/// recorded, so simulated time advances one sample per call.
pub struct SimTimer<'a, const N: usize> {
    log: &'a RefCell<EventLog<N>>,
    running: bool,
    ticks: u32,
}

impl<'a, const N: usize> SimTimer<'a, N> {
    pub fn new(log: &'a RefCell<EventLog<N>>) -> Self {
        Self {
            log,
            running: false,
            ticks: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

impl<const N: usize> SampleTimer for SimTimer<'_, N> {
    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn wait_tick(&mut self) {
        debug_assert!(self.running, "tick rendezvous with stopped timer");
        self.ticks += 1;
        self.log.borrow_mut().push(PlaybackEvent::Tick);
    }
}

// ---------------------------------------------------------------------------
// LED, wake button, delay
// ---------------------------------------------------------------------------

/// LED pin recording its level and edge count.
pub struct SimLed {
    level: bool,
    edges: u32,
}

impl SimLed {
    pub fn new() -> Self {
        Self {
            level: false,
            edges: 0,
        }
    }

    pub fn is_on(&self) -> bool {
        self.level
    }

    pub fn edges(&self) -> u32 {
        self.edges
    }

    fn set(&mut self, level: bool) {
        if self.level != level {
            self.edges += 1;
        }
        self.level = level;
    }
}

impl Default for SimLed {
    fn default() -> Self {
        Self::new()
    }
}

impl PinErrorType for SimLed {
    type Error = Infallible;
}

impl OutputPin for SimLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

/// Wake source that "presses the button" instantly and counts the sleeps.
pub struct SimWake {
    wakes: u32,
}

impl SimWake {
    pub fn new() -> Self {
        Self { wakes: 0 }
    }

    pub fn wakes(&self) -> u32 {
        self.wakes
    }
}

impl Default for SimWake {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeButton for SimWake {
    fn sleep_until_pressed(&mut self) {
        self.wakes += 1;
    }
}

/// Delay source that only accounts for requested time.
pub struct SimDelay {
    total_ns: u64,
}

impl SimDelay {
    pub fn new() -> Self {
        Self { total_ns: 0 }
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl Default for SimDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}

// ---------------------------------------------------------------------------
// UART
// ---------------------------------------------------------------------------

/// Scripted serial link: the test preloads the receive side and inspects
/// everything the firmware transmitted.
pub struct SimUart<const RX: usize = 2048, const TX: usize = 2048> {
    rx: Deque<u8, RX>,
    tx: Vec<u8, TX>,
}

impl<const RX: usize, const TX: usize> SimUart<RX, TX> {
    pub fn new() -> Self {
        Self {
            rx: Deque::new(),
            tx: Vec::new(),
        }
    }

    /// Queue bytes for the firmware to receive.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.rx
                .push_back(b)
                .expect("SimUart rx capacity exceeded; enlarge RX");
        }
    }

    /// Queue one framed XMODEM block: SOH, seq, ~seq, payload, checksum.
    pub fn feed_block(&mut self, seq: u8, payload: &[u8; 128]) {
        self.feed(&[SOH, seq, !seq]);
        self.feed(payload);
        let checksum = payload
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_add(b));
        self.feed(&[checksum]);
    }

    /// Everything the firmware wrote.
    pub fn sent(&self) -> &[u8] {
        &self.tx
    }

    /// Unconsumed receive bytes.
    pub fn rx_remaining(&self) -> usize {
        self.rx.len()
    }
}

impl<const RX: usize, const TX: usize> Default for SimUart<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const RX: usize, const TX: usize> IoErrorType for SimUart<RX, TX> {
    type Error = Infallible;
}

impl<const RX: usize, const TX: usize> Read for SimUart<RX, TX> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        for slot in buf.iter_mut() {
            match self.rx.pop_front() {
                Some(b) => {
                    *slot = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl<const RX: usize, const TX: usize> ReadReady for SimUart<RX, TX> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

impl<const RX: usize, const TX: usize> Write for SimUart<RX, TX> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &b in buf {
            self.tx
                .push(b)
                .expect("SimUart tx capacity exceeded; enlarge TX");
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eeprom_sim_program_and_read() {
        let model = RefCell::new(EepromSim::<512>::new());
        {
            let mut m = model.borrow_mut();
            m.assert_cs();
            m.exchange(CMD_WRITE_ENABLE);
            m.release_cs();

            m.assert_cs();
            m.exchange(CMD_PAGE_PROGRAM);
            m.exchange(0);
            m.exchange(0);
            m.exchange(0x10);
            m.exchange(0xAB);
            m.exchange(0xCD);
            m.release_cs();
        }
        let m = model.borrow();
        assert_eq!(m.mem(0x10), 0xAB);
        assert_eq!(m.mem(0x11), 0xCD);
        assert_eq!(m.program_count(), 1);
    }

    #[test]
    fn test_eeprom_sim_ignores_program_without_latch() {
        let mut m = EepromSim::<64>::new();
        m.assert_cs();
        m.exchange(CMD_PAGE_PROGRAM);
        m.exchange(0);
        m.exchange(0);
        m.exchange(0);
        m.exchange(0x42);
        m.release_cs();
        assert_eq!(m.mem(0), 0xFF);
        assert_eq!(m.program_count(), 0);
    }

    #[test]
    fn test_eeprom_sim_busy_then_idle() {
        let mut m = EepromSim::<64>::new();
        m.assert_cs();
        m.exchange(CMD_WRITE_ENABLE);
        m.release_cs();
        m.assert_cs();
        m.exchange(CMD_PAGE_PROGRAM);
        m.exchange(0);
        m.exchange(0);
        m.exchange(0);
        m.exchange(1);
        m.release_cs();

        m.assert_cs();
        m.exchange(CMD_READ_STATUS);
        let mut polls = 0;
        while m.exchange(0) & STATUS_WIP != 0 {
            polls += 1;
        }
        m.release_cs();
        assert_eq!(polls, SIM_BUSY_POLLS as u32);
    }

    #[test]
    fn test_eeprom_sim_read_autoincrement() {
        let mut m = EepromSim::<64>::new();
        m.load(5, &[1, 2, 3]);
        m.assert_cs();
        m.exchange(CMD_READ);
        m.exchange(0);
        m.exchange(0);
        m.exchange(5);
        assert_eq!(m.exchange(0), 1);
        assert_eq!(m.exchange(0), 2);
        assert_eq!(m.exchange(0), 3);
        m.release_cs();
    }

    #[test]
    fn test_sim_uart_script() {
        let mut uart = SimUart::<64, 64>::new();
        uart.feed(&[0xAA, 0xBB]);
        assert!(uart.read_ready().unwrap());

        let mut buf = [0u8; 1];
        assert_eq!(uart.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0xAA);

        uart.write(&[0x06]).unwrap();
        assert_eq!(uart.sent(), &[0x06]);
        assert_eq!(uart.rx_remaining(), 1);
    }
}
