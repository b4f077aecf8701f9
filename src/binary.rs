//! The machine-code artifact and the memory image it is cut from.
//!
//! On disk a program is `start ‖ size ‖ bytes[start .. start+size]`: one
//! byte of load address, one byte of length, then exactly that many image
//! bytes. [Binary::parse] accepts nothing more and nothing less.

use std::fmt;

use nom::bytes::complete::take;
use nom::combinator::eof;
use nom::number::complete::u8 as byte;
use nom::IResult;

/// Size of main memory in bytes.
pub const MEMORY_SIZE: usize = 256;

/// First address of the ROM region holding the IPL.
pub const ROM_START: u8 = 0xE0;

/// The 256-byte image the second pass emits into.
///
/// Plain stores go anywhere; the zero-fill used by `ORG` and `DS` drops
/// bytes in the ROM region, the same rule the machine applies to runtime
/// stores.
#[derive(Clone)]
pub struct Image {
    bytes: [u8; MEMORY_SIZE],
}

impl Image {
    pub fn new() -> Image {
        Image {
            bytes: [0; MEMORY_SIZE],
        }
    }

    pub fn write(&mut self, addr: u8, value: u8) {
        self.bytes[addr as usize] = value;
    }

    /// Zero store for gap filling; ROM addresses are skipped.
    pub fn fill_byte(&mut self, addr: u8) {
        if addr < ROM_START {
            self.bytes[addr as usize] = 0;
        }
    }

    pub fn get(&self, addr: u8) -> u8 {
        self.bytes[addr as usize]
    }
}

impl Default for Image {
    fn default() -> Image {
        Image::new()
    }
}

/// A loadable program: its start address and payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub start: u8,
    pub data: Vec<u8>,
}

/// Error for a `.bin` file that does not follow the artifact layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryError;

impl fmt::Display for BinaryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("malformed machine-code file")
    }
}

impl std::error::Error for BinaryError {}

fn binary_file(input: &[u8]) -> IResult<&[u8], Binary> {
    let (input, start) = byte(input)?;
    let (input, size) = byte(input)?;
    let (input, data) = take(size as usize)(input)?;
    let (input, _) = eof(input)?;

    Ok((
        input,
        Binary {
            start,
            data: data.to_vec(),
        },
    ))
}

impl Binary {
    /// Cuts the artifact out of a finished image. The payload is read with
    /// wrapping addresses, matching how the image was filled.
    pub fn from_image(image: &Image, start: u8, size: u8) -> Binary {
        let data = (0..size)
            .map(|i| image.get(start.wrapping_add(i)))
            .collect();

        Binary { start, data }
    }

    pub fn size(&self) -> u8 {
        self.data.len() as u8
    }

    /// The on-disk byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + self.data.len());
        bytes.push(self.start);
        bytes.push(self.size());
        bytes.extend_from_slice(&self.data);
        bytes
    }

    /// Parses a `.bin` file. The file must contain exactly the two header
    /// bytes plus `size` payload bytes.
    pub fn parse(input: &[u8]) -> Result<Binary, BinaryError> {
        match binary_file(input) {
            Ok((_, binary)) => Ok(binary),
            Err(_) => Err(BinaryError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trip() {
        let binary = Binary {
            start: 0x10,
            data: vec![0x13, 0x05, 0xFF],
        };

        let bytes = binary.to_bytes();
        assert_eq!(bytes, [0x10, 0x03, 0x13, 0x05, 0xFF]);
        assert_eq!(Binary::parse(&bytes).unwrap(), binary);
    }

    #[test]
    fn parse_rejects_short_and_long_files() {
        assert_eq!(Binary::parse(&[]), Err(BinaryError));
        assert_eq!(Binary::parse(&[0x00]), Err(BinaryError));
        assert_eq!(Binary::parse(&[0x00, 0x02, 0xFF]), Err(BinaryError));
        assert_eq!(Binary::parse(&[0x00, 0x01, 0xFF, 0xFF]), Err(BinaryError));
    }

    #[test]
    fn parse_accepts_empty_payload() {
        let binary = Binary::parse(&[0x00, 0x00]).unwrap();

        assert_eq!(binary.start, 0);
        assert!(binary.data.is_empty());
    }

    #[test]
    fn image_fill_skips_rom() {
        let mut image = Image::new();

        image.write(0xE0, 0xAA);
        image.fill_byte(0xE0);
        assert_eq!(image.get(0xE0), 0xAA);

        image.write(0x10, 0xBB);
        image.fill_byte(0x10);
        assert_eq!(image.get(0x10), 0x00);
    }

    #[test]
    fn from_image_wraps_past_end_of_memory() {
        let mut image = Image::new();
        image.write(0xFF, 1);
        image.write(0x00, 2);

        let binary = Binary::from_image(&image, 0xFF, 2);
        assert_eq!(binary.data, [1, 2]);
    }
}
