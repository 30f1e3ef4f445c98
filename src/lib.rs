/*
 * Copyright (c) 2024.
 *
 * This software is free software; You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! A decoder for the ZEL animated-image container
//!
//! ZEL stores an animation as indexed-8 frames partitioned into a fixed grid
//! of rectangular zones, each zone compressed independently (none or LZ4) and
//! addressed through an absolute frame-index table. The layout is built for
//! memory-constrained targets: any frame, and any zone inside a frame, can be
//! decoded without touching the rest of the file.
//!
//! # Features
//! - `no_std` with `alloc` feature
//! - Whole-frame and single-zone decoding, to palette indices or RGB565
//! - Memory-backed (zero copy) and stream-backed (e.g. SD card) inputs
//! - Bounds checked on every header, chunk and pixel access
//!
//! # Example
//! ```no_run
//! use zune_zel::ZelDecoder;
//!
//! let data = [0_u8; 34];
//! let mut decoder = ZelDecoder::open_memory(&data).unwrap();
//!
//! let width = usize::from(decoder.get_width());
//! let height = usize::from(decoder.get_height());
//!
//! let mut pixels = vec![0_u16; width * height];
//! decoder.decode_frame_rgb565(0, &mut pixels, width).unwrap();
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
#![macro_use]
extern crate alloc;

pub use zune_core;

pub use crate::common::{ZelColorEncoding, ZelColorFormat, ZelCompression, ZelPaletteType};
pub use crate::decoder::{probe_zel, ZelDecoder};
pub use crate::errors::ZelErrors;
pub use crate::source::ZelInputStream;

mod common;
mod constants;
mod decoder;
mod errors;
mod frame;
mod headers;
mod palette;
mod source;
