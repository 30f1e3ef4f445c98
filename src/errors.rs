/*
 * Copyright (c) 2024.
 *
 * This software is free software; You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use core::fmt::{Debug, Display, Formatter};

use lz4_flex::block::DecompressError;

/// Possible errors that may occur while opening a file or decoding frames
pub enum ZelErrors {
    /// A caller-supplied argument is unusable, e.g. a destination stride
    /// smaller than the image width
    InvalidArgument(&'static str),
    /// The file does not start with the `ZEL0` signature, or carries a
    /// version this decoder does not understand
    InvalidMagic,
    /// Reserved for future container revisions
    UnsupportedVersion(u16),
    /// The file uses a capability this decoder refuses, e.g. an unknown
    /// compression or color format, or lacks a frame-index table
    UnsupportedFormat(&'static str),
    /// A structural invariant of the container is violated
    CorruptData(&'static str),
    /// Image dimensions exceed the configured decoder limits
    ///
    /// # Arguments
    /// - 1st argument is the dimension name
    /// - 2nd argument is the configured maximum
    /// - 3rd argument is the value found in the header
    TooLargeDimensions(&'static str, usize, usize),
    /// The destination buffer cannot hold the decoded output
    ///
    /// # Arguments
    /// - 1st argument is the number of elements required
    /// - 2nd argument is the number of elements provided
    TooSmallOutput(usize, usize),
    /// An internal scratch buffer could not be grown to the required
    /// number of bytes
    OutOfMemory(usize),
    /// A frame or zone index is past the end, or a palette was requested
    /// from a file that has none
    ///
    /// # Arguments
    /// - 1st argument is the index requested
    /// - 2nd argument is the number of items present
    OutOfBounds(usize, usize),
    /// A palette was requested but neither a global nor a local palette
    /// is present
    MissingPalette,
    /// The stream callback returned fewer bytes than requested
    ///
    /// # Arguments
    /// - 1st argument is the number of bytes requested
    /// - 2nd argument is the number of bytes the stream returned
    Io(usize, usize),
    /// A zone chunk could not be inflated
    Lz4DecodeErrors(DecompressError),
    /// A should-be-unreachable condition, indicates a decoder bug
    Internal(&'static str)
}

impl ZelErrors {
    /// Return a stable identifier for the error kind
    ///
    /// The returned string never changes between releases, making it
    /// suitable for logs and device-side diagnostics.
    pub const fn code(&self) -> &'static str {
        match self {
            ZelErrors::InvalidArgument(_) | ZelErrors::TooSmallOutput(..) => "INVALID_ARGUMENT",
            ZelErrors::InvalidMagic => "INVALID_MAGIC",
            ZelErrors::UnsupportedVersion(_) => "UNSUPPORTED_VERSION",
            ZelErrors::UnsupportedFormat(_) | ZelErrors::TooLargeDimensions(..) => {
                "UNSUPPORTED_FORMAT"
            }
            ZelErrors::CorruptData(_) | ZelErrors::Lz4DecodeErrors(_) => "CORRUPT_DATA",
            ZelErrors::OutOfMemory(_) => "OUT_OF_MEMORY",
            ZelErrors::OutOfBounds(..) | ZelErrors::MissingPalette => "OUT_OF_BOUNDS",
            ZelErrors::Io(..) => "IO",
            ZelErrors::Internal(_) => "INTERNAL"
        }
    }
}

impl Debug for ZelErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ZelErrors::InvalidArgument(reason) => {
                writeln!(f, "Invalid argument: {reason}")
            }
            ZelErrors::InvalidMagic => {
                writeln!(f, "Invalid magic bytes, file does not start with ZEL0 version 1")
            }
            ZelErrors::UnsupportedVersion(version) => {
                writeln!(f, "Unsupported container version {version}")
            }
            ZelErrors::UnsupportedFormat(reason) => {
                writeln!(f, "Unsupported format: {reason}")
            }
            ZelErrors::CorruptData(reason) => {
                writeln!(f, "Corrupt data: {reason}")
            }
            ZelErrors::TooLargeDimensions(dimension, expected, found) => {
                writeln!(
                    f,
                    "Too large dimensions for {dimension}, {found} exceeds {expected}"
                )
            }
            ZelErrors::TooSmallOutput(expected, found) => {
                writeln!(
                    f,
                    "Too small output size, expected {expected} elements but found {found}"
                )
            }
            ZelErrors::OutOfMemory(bytes) => {
                writeln!(f, "Could not grow scratch buffer to {bytes} bytes")
            }
            ZelErrors::OutOfBounds(index, count) => {
                writeln!(f, "Index {index} out of bounds for {count} items")
            }
            ZelErrors::MissingPalette => {
                writeln!(f, "No palette present for this image")
            }
            ZelErrors::Io(expected, found) => {
                writeln!(
                    f,
                    "I/O error, requested {expected} bytes but the stream returned {found}"
                )
            }
            ZelErrors::Lz4DecodeErrors(err) => {
                writeln!(f, "Error inflating zone chunk: {err}")
            }
            ZelErrors::Internal(reason) => {
                writeln!(f, "Internal decoder error: {reason}")
            }
        }
    }
}

impl Display for ZelErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "{:?}", self)
    }
}

impl From<DecompressError> for ZelErrors {
    fn from(err: DecompressError) -> Self {
        ZelErrors::Lz4DecodeErrors(err)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ZelErrors {}
