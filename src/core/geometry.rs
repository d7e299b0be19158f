//! Purpose: Tile layout value types and per-pixel addressing math.
//! Exports: `Pixel`, `TilePosition`, `TileFormat`, `TileConfiguration`, `expected_pixel_count`.
//! Role: Shared vocabulary between the native boundary, the facade and decoder strategies.
//! Invariants: `TileFormat::bytes_per_tile` is fixed at construction (derived when given as 0).
//! Invariants: Offset arithmetic is checked; overflow surfaces as a Range error.
use std::ops::Range;

use crate::core::error::{Error, ErrorKind};

/// One RGBA pixel. Layout matches the native `pixel_t`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Unpacks a little-endian RGBA word (red in the lowest byte).
    pub const fn from_rgba_u32(value: u32) -> Self {
        let [r, g, b, a] = value.to_le_bytes();
        Self { r, g, b, a }
    }

    pub const fn to_rgba_u32(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct TilePosition {
    pub tile_index: i32,
    pub x: i32,
    pub y: i32,
}

impl TilePosition {
    pub const fn new(tile_index: i32, x: i32, y: i32) -> Self {
        Self { tile_index, x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct TileFormat {
    width: u32,
    height: u32,
    bits_per_pixel: u8,
    bytes_per_tile: u32,
}

impl TileFormat {
    /// Builds a format; a zero `bytes_per_tile` is derived from the other fields.
    pub fn new(width: u32, height: u32, bits_per_pixel: u8, bytes_per_tile: u32) -> Self {
        let bytes_per_tile = if bytes_per_tile != 0 {
            bytes_per_tile
        } else {
            derive_bytes_per_tile(width, height, bits_per_pixel)
        };
        Self {
            width,
            height,
            bits_per_pixel,
            bytes_per_tile,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bits_per_pixel(&self) -> u8 {
        self.bits_per_pixel
    }

    pub fn bytes_per_tile(&self) -> u32 {
        self.bytes_per_tile
    }

    /// Whole bytes addressed per pixel; sub-byte formats address one byte.
    pub fn bytes_per_pixel(&self) -> usize {
        usize::from((self.bits_per_pixel / 8).max(1))
    }

    /// Byte range of the pixel at `position` inside a buffer of `data_len` bytes.
    pub fn pixel_range(&self, position: TilePosition, data_len: usize) -> Result<Range<usize>, Error> {
        let bytes_per_pixel = self.bytes_per_pixel();
        let offset = i64::from(position.tile_index)
            .checked_mul(i64::from(self.bytes_per_tile))
            .and_then(|tile_offset| {
                i64::from(position.y)
                    .checked_mul(i64::from(self.width))
                    .and_then(|row| row.checked_add(i64::from(position.x)))
                    .and_then(|index| index.checked_mul(bytes_per_pixel as i64))
                    .and_then(|pixel_offset| tile_offset.checked_add(pixel_offset))
            })
            .ok_or_else(|| Error::new(ErrorKind::Range).with_message("pixel offset overflows"))?;

        let start = usize::try_from(offset).map_err(|_| {
            Error::new(ErrorKind::Range).with_message("pixel offset is negative")
        })?;
        let end = start
            .checked_add(bytes_per_pixel)
            .filter(|end| *end <= data_len)
            .ok_or_else(|| {
                Error::new(ErrorKind::Range)
                    .with_message(format!("pixel outside {data_len}-byte buffer"))
                    .with_offset(start as u64)
            })?;
        Ok(start..end)
    }

    pub fn pixel_offset(&self, position: TilePosition, data_len: usize) -> Result<usize, Error> {
        self.pixel_range(position, data_len).map(|range| range.start)
    }
}

/// `ceil(width * height * bpp / 8)`, saturating at `u32::MAX`.
pub fn derive_bytes_per_tile(width: u32, height: u32, bits_per_pixel: u8) -> u32 {
    if width == 0 || height == 0 {
        return 0;
    }
    let total_bits = u128::from(width) * u128::from(height) * u128::from(bits_per_pixel);
    u32::try_from(total_bits.div_ceil(8)).unwrap_or(u32::MAX)
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct TileConfiguration {
    pub start: u32,
    pub size: u32,
    pub rows: u16,
    pub format: TileFormat,
}

/// Number of pixels a buffer of `data_len` bytes holds: `floor(data_len * 8 / bpp)`.
pub fn expected_pixel_count(data_len: usize, format: &TileFormat) -> Result<usize, Error> {
    let bits_per_pixel = format.bits_per_pixel();
    if bits_per_pixel == 0 {
        return Err(Error::new(ErrorKind::Format).with_message("bits per pixel is zero"));
    }
    let total_bits = data_len
        .checked_mul(8)
        .ok_or_else(|| Error::new(ErrorKind::Range).with_message("buffer bit length overflows"))?;
    let count = total_bits / usize::from(bits_per_pixel);
    let byte_len = count.checked_mul(std::mem::size_of::<Pixel>());
    if byte_len.is_none_or(|len| len > isize::MAX as usize) {
        return Err(Error::new(ErrorKind::Range)
            .with_message(format!("{count} pixels exceed the addressable range")));
    }
    Ok(count)
}
