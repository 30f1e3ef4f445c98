/*
 * Copyright (c) 2024.
 *
 * This software is free software; You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use crate::errors::ZelErrors;
use crate::headers::FileHeader;

/// Pixel representation of the frames in a file
///
/// ZEL currently defines a single format, 8-bit indices into an
/// RGB565 palette.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ZelColorFormat {
    Indexed8 = 0
}

impl ZelColorFormat {
    pub fn from_u8(num: u8) -> Option<ZelColorFormat> {
        match num {
            0 => Some(ZelColorFormat::Indexed8),
            _ => None
        }
    }
}

/// Compression scheme of the zone chunks inside a frame block
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ZelCompression {
    None = 0,
    Lz4  = 1,
    /// Reserved in the container, refused by this decoder
    Rle  = 2
}

impl ZelCompression {
    pub fn from_u8(num: u8) -> Option<ZelCompression> {
        match num {
            0 => Some(ZelCompression::None),
            1 => Some(ZelCompression::Lz4),
            2 => Some(ZelCompression::Rle),
            _ => None
        }
    }
}

/// Byte ordering of RGB565 palette entries
///
/// Files declare the ordering their palettes are stored in; callers may ask
/// the decoder for a different one, see
/// [`set_output_color_encoding`](crate::ZelDecoder::set_output_color_encoding).
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ZelColorEncoding {
    Rgb565Le = 0,
    Rgb565Be = 1
}

impl ZelColorEncoding {
    pub fn from_u8(num: u8) -> Option<ZelColorEncoding> {
        match num {
            0 => Some(ZelColorEncoding::Rgb565Le),
            1 => Some(ZelColorEncoding::Rgb565Be),
            _ => None
        }
    }
}

/// Scope of a palette block, one per file or one per frame
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ZelPaletteType {
    Global = 0,
    Local  = 1
}

/// Zone grid geometry derived from the file header
///
/// Every frame in a file shares the same layout.
#[derive(Debug, Copy, Clone)]
pub(crate) struct ZoneLayout {
    pub zone_width:       usize,
    pub zone_height:      usize,
    pub zones_per_row:    usize,
    pub zone_count:       usize,
    pub zone_pixel_bytes: usize
}

impl ZoneLayout {
    pub(crate) fn from_header(header: &FileHeader) -> Result<ZoneLayout, ZelErrors> {
        let width = usize::from(header.width);
        let height = usize::from(header.height);
        let zone_width = usize::from(header.zone_width);
        let zone_height = usize::from(header.zone_height);

        if zone_width == 0 || zone_height == 0 {
            return Err(ZelErrors::CorruptData("zero zone dimensions"));
        }
        if width % zone_width != 0 || height % zone_height != 0 {
            return Err(ZelErrors::CorruptData(
                "image dimensions not a multiple of the zone dimensions"
            ));
        }
        let zones_per_row = width / zone_width;
        let zones_per_col = height / zone_height;
        let zone_count = zones_per_row * zones_per_col;

        if zone_count == 0 {
            return Err(ZelErrors::CorruptData("zone grid is empty"));
        }
        if zone_count > usize::from(u16::MAX) {
            return Err(ZelErrors::UnsupportedFormat(
                "zone count does not fit in 16 bits"
            ));
        }

        Ok(ZoneLayout {
            zone_width,
            zone_height,
            zones_per_row,
            zone_count,
            zone_pixel_bytes: zone_width * zone_height
        })
    }

    /// Top-left pixel coordinate of a zone, in frame space
    pub(crate) fn zone_origin(&self, zone_index: usize) -> (usize, usize) {
        let zone_x = (zone_index % self.zones_per_row) * self.zone_width;
        let zone_y = (zone_index / self.zones_per_row) * self.zone_height;

        (zone_x, zone_y)
    }
}
