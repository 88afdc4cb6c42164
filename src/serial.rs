//! Module: serial
//!
//! Purpose: UART text diagnostics.
//!
//! The device talks to the host twice: protocol banners during the bootstrap
//! and a diagnostic dump before a fatal halt. Plain blocking writes through
//! `embedded_io::Write` are fine for both; nothing here runs inside the
//! sample loop.

use embedded_io::Write;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Send a string, bytes as-is (callers embed `\r\n` where they want it).
pub fn write_text<W: Write>(uart: &mut W, text: &str) -> Result<(), W::Error> {
    uart.write_all(text.as_bytes())
}

/// Send one byte as two uppercase hex digits.
pub fn write_hex_byte<W: Write>(uart: &mut W, byte: u8) -> Result<(), W::Error> {
    let digits = [
        HEX_DIGITS[(byte >> 4) as usize],
        HEX_DIGITS[(byte & 0x0F) as usize],
    ];
    uart.write_all(&digits)
}

/// Send a CR-LF line ending.
pub fn write_crlf<W: Write>(uart: &mut W) -> Result<(), W::Error> {
    uart.write_all(b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture<F: FnOnce(&mut &mut [u8])>(buf: &mut [u8], f: F) -> usize {
        let len = buf.len();
        let mut slice: &mut [u8] = buf;
        f(&mut slice);
        len - slice.len()
    }

    #[test]
    fn test_hex_formatting() {
        let mut buf = [0u8; 8];
        let n = capture(&mut buf, |w| {
            write_hex_byte(w, 0x00).unwrap();
            write_hex_byte(w, 0x5A).unwrap();
            write_hex_byte(w, 0xFF).unwrap();
        });
        assert_eq!(&buf[..n], b"005AFF");
    }

    #[test]
    fn test_text_and_crlf() {
        let mut buf = [0u8; 16];
        let n = capture(&mut buf, |w| {
            write_text(w, "Done").unwrap();
            write_crlf(w).unwrap();
        });
        assert_eq!(&buf[..n], b"Done\r\n");
    }
}
