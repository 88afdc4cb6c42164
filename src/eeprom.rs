//! Module: eeprom
//!
//! Purpose: Driver for the external SPI EEPROM holding the audio clips.
//!
//! The device speaks the classic serial-flash command set: READ with a
//! 24-bit address and an auto-incrementing internal pointer, WRITE ENABLE,
//! 128-byte PAGE PROGRAM, READ STATUS (bit 0 = write in progress) and
//! READ ID. The bus is a single shared synchronous resource, so every
//! logical command is bracketed by exactly one chip-select assert/deassert
//! pair; the streaming read path hands out a guard that keeps the select
//! line low for the life of the stream and releases it on drop.
//!
//! Write completion is polled with chip select held low: one 0x05 command,
//! then repeated dummy transfers each returning a fresh status byte. The
//! poll is bounded: a page program that never completes means the part is
//! bad or mis-wired, and playing garbage is worse than halting (see the
//! error policy in DESIGN.md).

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::config::{EEPROM_POLL_INTERVAL_MS, EEPROM_WRITE_TIMEOUT_POLLS};

/// READ: 24-bit address, then streamed data bytes.
pub const CMD_READ: u8 = 0x03;
/// WRITE ENABLE: sets the write latch; required before every page program.
pub const CMD_WRITE_ENABLE: u8 = 0x06;
/// PAGE PROGRAM: 24-bit address plus up to one page of data.
pub const CMD_PAGE_PROGRAM: u8 = 0x02;
/// READ STATUS: bit 0 is the write-in-progress flag.
pub const CMD_READ_STATUS: u8 = 0x05;
/// READ ID: three manufacturer/device bytes.
pub const CMD_READ_ID: u8 = 0x9F;

/// Write-in-progress bit in the status register.
pub const STATUS_WIP: u8 = 0x01;

/// Largest single page-program payload.
pub const PAGE_SIZE: usize = 128;

/// EEPROM driver errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EepromError<SpiE, PinE> {
    /// SPI bus transfer failed.
    Spi(SpiE),
    /// Chip-select pin failed.
    Pin(PinE),
    /// The write-in-progress bit never cleared within the bounded poll.
    /// Carries the last status byte read, for the diagnostic dump.
    WriteTimeout { status: u8 },
}

/// SPI EEPROM behind a dedicated chip-select pin.
///
/// Holding the bus and the select pin by value means only one transaction
/// can be in flight at a time; the borrow checker enforces the bracketing
/// invariant for the streaming reader.
pub struct Eeprom<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS> Eeprom<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    /// Take ownership of the bus and select pin. The pin is assumed to be
    /// deasserted (high) at rest.
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self { spi, cs }
    }

    /// Release the bus and select pin.
    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn select(&mut self) -> Result<(), EepromError<SPI::Error, CS::Error>> {
        self.cs.set_low().map_err(EepromError::Pin)
    }

    fn deselect(&mut self) -> Result<(), EepromError<SPI::Error, CS::Error>> {
        self.cs.set_high().map_err(EepromError::Pin)
    }

    /// Full-duplex exchange of one byte.
    fn transfer(&mut self, byte: u8) -> Result<u8, EepromError<SPI::Error, CS::Error>> {
        let mut word = [byte];
        self.spi
            .transfer_in_place(&mut word)
            .map_err(EepromError::Spi)?;
        Ok(word[0])
    }

    fn send_addr(&mut self, addr: u32) -> Result<(), EepromError<SPI::Error, CS::Error>> {
        // Big-endian 24-bit address: high, mid, low.
        self.transfer((addr >> 16) as u8)?;
        self.transfer((addr >> 8) as u8)?;
        self.transfer(addr as u8)?;
        Ok(())
    }

    /// Read the three manufacturer/device ID bytes.
    pub fn read_id(&mut self) -> Result<[u8; 3], EepromError<SPI::Error, CS::Error>> {
        self.select()?;
        let result = (|| {
            self.transfer(CMD_READ_ID)?;
            Ok([self.transfer(0)?, self.transfer(0)?, self.transfer(0)?])
        })();
        self.deselect()?;
        result
    }

    /// Read the status register once.
    pub fn read_status(&mut self) -> Result<u8, EepromError<SPI::Error, CS::Error>> {
        self.select()?;
        let result = (|| {
            self.transfer(CMD_READ_STATUS)?;
            self.transfer(0)
        })();
        self.deselect()?;
        result
    }

    /// Set the write latch. Must precede every page program.
    pub fn write_enable(&mut self) -> Result<(), EepromError<SPI::Error, CS::Error>> {
        self.select()?;
        let result = self.transfer(CMD_WRITE_ENABLE).map(|_| ());
        self.deselect()?;
        result
    }

    /// Program `data` starting at `addr`. `data` must fit in one page.
    ///
    /// The caller issues [`write_enable`](Self::write_enable) first and
    /// [`wait_write_complete`](Self::wait_write_complete) after, matching
    /// the device's three-command write sequence.
    pub fn page_program(
        &mut self,
        addr: u32,
        data: &[u8],
    ) -> Result<(), EepromError<SPI::Error, CS::Error>> {
        debug_assert!(data.len() <= PAGE_SIZE);
        self.select()?;
        let result = (|| {
            self.transfer(CMD_PAGE_PROGRAM)?;
            self.send_addr(addr)?;
            for &byte in data {
                self.transfer(byte)?;
            }
            Ok(())
        })();
        self.deselect()?;
        result
    }

    /// Poll the write-in-progress bit until it clears, at
    /// [`EEPROM_POLL_INTERVAL_MS`] per poll, giving up after
    /// [`EEPROM_WRITE_TIMEOUT_POLLS`]. Returns the number of polls taken.
    ///
    /// Chip select stays low for the whole poll; each dummy transfer after
    /// the one 0x05 command returns a fresh status byte.
    pub fn wait_write_complete<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<u32, EepromError<SPI::Error, CS::Error>> {
        self.select()?;
        let result = (|| {
            self.transfer(CMD_READ_STATUS)?;
            let mut polls = 0u32;
            loop {
                delay.delay_ms(EEPROM_POLL_INTERVAL_MS);
                let status = self.transfer(0)?;
                polls += 1;
                if status & STATUS_WIP == 0 {
                    return Ok(polls);
                }
                if polls == EEPROM_WRITE_TIMEOUT_POLLS {
                    return Err(EepromError::WriteTimeout { status });
                }
            }
        })();
        self.deselect()?;
        result
    }

    /// Start a sequential read at `addr` and return the streaming guard.
    ///
    /// The device's internal address auto-increments on every byte, so a
    /// whole track is one chip-select bracket with no re-addressing.
    pub fn begin_read(
        &mut self,
        addr: u32,
    ) -> Result<EepromReader<'_, SPI, CS>, EepromError<SPI::Error, CS::Error>> {
        self.select()?;
        let setup = (|| {
            self.transfer(CMD_READ)?;
            self.send_addr(addr)
        })();
        if let Err(e) = setup {
            let _ = self.deselect();
            return Err(e);
        }
        Ok(EepromReader { eeprom: self })
    }
}

/// Streaming read in progress: chip select is held low until this guard is
/// dropped. Borrowing the driver mutably guarantees no other command can be
/// interleaved into the stream.
pub struct EepromReader<'a, SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    eeprom: &'a mut Eeprom<SPI, CS>,
}

impl<SPI, CS> EepromReader<'_, SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    /// Fetch the next byte of the stream.
    pub fn next(&mut self) -> Result<u8, EepromError<SPI::Error, CS::Error>> {
        self.eeprom.transfer(0)
    }
}

impl<SPI, CS> Drop for EepromReader<'_, SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    fn drop(&mut self) {
        // Closing the bracket cannot report failure from a destructor; an
        // infallible pin is the normal case on real hardware.
        let _ = self.eeprom.deselect();
    }
}
