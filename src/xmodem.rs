//! Module: xmodem
//!
//! Purpose: One-shot bootstrap that fills the EEPROM over the serial link.
//!
//! Classic XMODEM receive, checksum variant, with the payload size chosen
//! to match the EEPROM page: every accepted block is exactly one
//! write-enable / page-program / busy-wait sequence, and the write cursor
//! advances by 128 per block. The checksum byte is read and discarded,
//! never validated; the data is audio and a rare bad page is preferable to
//! a stalled field-programming session.
//!
//! Error policy: any leading byte other than SOH or EOT is a framing error
//! and is **fatal**; so is a page program whose busy-wait never completes.
//! Both report on the link (`Failed: XX`, or the write-timeout dump with
//! the last status byte) and return an error for the outer loop to park
//! on. See DESIGN.md.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use embedded_io::{Read, ReadReady, Write};

use crate::config::{XMODEM_AWAIT_SPINS, XMODEM_BLOCK_LEN};
use crate::eeprom::{Eeprom, EepromError};
use crate::serial::{write_crlf, write_hex_byte, write_text};

/// Start of a 128-byte block.
pub const SOH: u8 = 0x01;
/// End of transmission.
pub const EOT: u8 = 0x04;
/// Block accepted.
pub const ACK: u8 = 0x06;
/// Request (re)transmission; also the session opener.
pub const NAK: u8 = 0x15;

/// Bootstrap failure modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapError<UartE, SpiE, PinE> {
    /// UART read or write failed.
    Uart(UartE),
    /// EEPROM programming failed (including the fatal write timeout).
    Eeprom(EepromError<SpiE, PinE>),
    /// Leading byte was neither SOH nor EOT. Fatal; carries the byte.
    Framing(u8),
    /// The serial source reported end-of-input. Cannot happen on a real
    /// UART; surfaces a mis-scripted simulator run instead of spinning.
    ChannelClosed,
}

impl<UartE, SpiE, PinE> From<EepromError<SpiE, PinE>> for BootstrapError<UartE, SpiE, PinE> {
    fn from(e: EepromError<SpiE, PinE>) -> Self {
        BootstrapError::Eeprom(e)
    }
}

/// XMODEM receiver programming the EEPROM from address zero.
pub struct Bootstrap<'a, U, SPI, CS, D> {
    uart: &'a mut U,
    eeprom: &'a mut Eeprom<SPI, CS>,
    delay: &'a mut D,
    cursor: u32,
}

impl<'a, U, SPI, CS, D> Bootstrap<'a, U, SPI, CS, D>
where
    U: Read + ReadReady + Write,
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    pub fn new(uart: &'a mut U, eeprom: &'a mut Eeprom<SPI, CS>, delay: &'a mut D) -> Self {
        Self {
            uart,
            eeprom,
            delay,
            cursor: 0,
        }
    }

    /// Current write cursor (bytes programmed so far).
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Run the whole transfer. Returns the number of bytes programmed.
    ///
    /// Blocks until the sender opens the session; the await loop NAKs and
    /// retries forever (a recoverable wait, not a failure).
    pub fn run(&mut self) -> Result<u32, BootstrapError<U::Error, SPI::Error, CS::Error>> {
        write_text(self.uart, "Awaiting XMODEM...\r\n").map_err(BootstrapError::Uart)?;
        self.await_sender()?;

        loop {
            let lead = self.read_byte()?;
            match lead {
                SOH => self.accept_block()?,
                EOT => {
                    write_text(self.uart, "Done\r\n\r\n").map_err(BootstrapError::Uart)?;
                    return Ok(self.cursor);
                }
                other => {
                    write_text(self.uart, "Failed: ").map_err(BootstrapError::Uart)?;
                    write_hex_byte(self.uart, other).map_err(BootstrapError::Uart)?;
                    write_crlf(self.uart).map_err(BootstrapError::Uart)?;
                    write_crlf(self.uart).map_err(BootstrapError::Uart)?;
                    return Err(BootstrapError::Framing(other));
                }
            }
        }
    }

    /// NAK, then spin on the receive-ready flag with a bounded count; on
    /// timeout resend the NAK and wait again. Returns once the first byte
    /// of the session is waiting.
    fn await_sender(&mut self) -> Result<(), BootstrapError<U::Error, SPI::Error, CS::Error>> {
        loop {
            self.uart.write_all(&[NAK]).map_err(BootstrapError::Uart)?;
            for _ in 0..XMODEM_AWAIT_SPINS {
                if self.uart.read_ready().map_err(BootstrapError::Uart)? {
                    return Ok(());
                }
            }
        }
    }

    /// Receive one SOH block (lead byte already consumed) and program it.
    ///
    /// No EEPROM command is issued until the whole payload is in the
    /// transfer buffer, so a short or garbled block never half-writes a
    /// page.
    fn accept_block(&mut self) -> Result<(), BootstrapError<U::Error, SPI::Error, CS::Error>> {
        // Sequence number and its complement: read and discarded.
        self.read_byte()?;
        self.read_byte()?;

        let mut buffer = [0u8; XMODEM_BLOCK_LEN];
        for slot in buffer.iter_mut() {
            *slot = self.read_byte()?;
        }

        // Checksum: read and discarded, never validated.
        self.read_byte()?;

        self.eeprom.write_enable()?;
        self.eeprom.page_program(self.cursor, &buffer)?;
        if let Err(e) = self.eeprom.wait_write_complete(self.delay) {
            // A stuck write-in-progress bit parks the device; dump the
            // last status byte on the link first.
            if let EepromError::WriteTimeout { status } = &e {
                write_text(self.uart, "EEPROM write timeout exceeded! Status: ")
                    .map_err(BootstrapError::Uart)?;
                write_hex_byte(self.uart, *status).map_err(BootstrapError::Uart)?;
                write_crlf(self.uart).map_err(BootstrapError::Uart)?;
                write_crlf(self.uart).map_err(BootstrapError::Uart)?;
            }
            return Err(e.into());
        }
        self.cursor += XMODEM_BLOCK_LEN as u32;

        self.uart.write_all(&[ACK]).map_err(BootstrapError::Uart)?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BootstrapError<U::Error, SPI::Error, CS::Error>> {
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte) {
            Ok(1) => Ok(byte[0]),
            Ok(_) => Err(BootstrapError::ChannelClosed),
            Err(e) => Err(BootstrapError::Uart(e)),
        }
    }
}
