//! Loader for the character widths in TeX font metric (.tfm) files.
//!
//! A DVI-reading program needs exactly one thing from a font's .tfm file:
//!     the width of each character, so that it knows how far a `set_char`
//!     command moves the cursor.
//! This crate reads the header, the character range and the width table of a
//!     .tfm file and scales every width to a given "at size",
//!     using the fixed-point algorithm from TeX so that the results match TeX
//!     exactly.
//! Heights, depths, italic corrections, the lig/kern program and the font
//!     parameters are skipped.

mod load;

/// Error returned if a .tfm file is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The file ended before the width table was complete.
    ///
    /// The payload is the byte offset at which the missing word starts.
    Truncated(usize),
    /// The scale factor is not in the range `(0, 2^30)`.
    InvalidScale(i32),
    /// The number of words in the width table is 0 or more than 256.
    InvalidWidthTableSize(u16),
    /// The design size in the header is negative.
    NegativeDesignSize,
    /// A character refers to a width past the end of the width table.
    InvalidWidthIndex {
        char: i32,
        index: u8,
        num_widths: u16,
    },
    /// The first byte of a width is neither 0 nor 255.
    InvalidWidthSign { index: usize, byte: u8 },
    /// The first entry in the width table is not zero.
    NonZeroFirstWidth(i32),
    /// A width scaled to the at size does not fit in 32 bits.
    WidthOverflow { index: usize, width: i64 },
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Truncated(offset) => {
                write!(f, "the file ended prematurely at byte {offset}")
            }
            Error::InvalidScale(z) => write!(f, "the scale factor {z} is out of range"),
            Error::InvalidWidthTableSize(nw) => {
                write!(f, "the width table has {nw} entries")
            }
            Error::NegativeDesignSize => write!(f, "the design size is negative"),
            Error::InvalidWidthIndex {
                char,
                index,
                num_widths,
            } => write!(
                f,
                "character {char} has width index {index} but there are only {num_widths} widths"
            ),
            Error::InvalidWidthSign { index, byte } => {
                write!(f, "width {index} has an invalid first byte {byte}")
            }
            Error::NonZeroFirstWidth(w) => {
                write!(f, "the first width should be zero, but is {w}")
            }
            Error::WidthOverflow { index, width } => {
                write!(f, "width {index} is {width} when scaled, which is out of range")
            }
        }
    }
}

/// Conversion factors used when loading a font.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    /// The size the font is used at, in DVI units.
    pub at_size: i32,
    /// Factor converting TFM design units to DVI units.
    pub tfm_conv: f64,
    /// Factor converting DVI units to pixels, including magnification.
    pub conv: f64,
}

/// Width of one character at the font's at size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharWidth {
    /// The width in DVI units.
    pub width: i32,
    /// The width in pixels, rounded to the nearest pixel.
    pub pixels: i32,
}

/// The width data of one font, scaled to a specific at size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontMetrics {
    /// The checksum in the file's header.
    pub checksum: u32,
    /// The design size in the file's header, converted to DVI units.
    pub design_size: i32,
    /// Smallest character code in the font.
    pub bc: i32,
    /// Largest character code in the font.
    ///
    /// If the font has no characters this is `bc-1`.
    pub ec: i32,
    /// Widths of the characters `bc..=ec`, in order.
    ///
    /// Characters that exist in the font's range but have width index 0
    ///     have no width.
    pub widths: Vec<Option<CharWidth>>,
}

impl FontMetrics {
    /// Load font metrics from .tfm bytes.
    ///
    /// ```
    /// // A font with one character 'A' that is 0.5 design units wide.
    /// let tfm: Vec<u8> = vec![
    ///     0, 9, 0, 2,   0, 65, 0, 65,   0, 2, 0, 1,   0, 1, 0, 1,
    ///     0, 0, 0, 0,   0, 0, 0, 0,
    ///     0, 0, 0, 0,   0, 160, 0, 0,
    ///     1, 0, 0, 0,
    ///     0, 0, 0, 0,   0, 8, 0, 0,
    /// ];
    /// let scale = tfm::Scale{ at_size: 655360, tfm_conv: 1.0 / 16.0, conv: 0.001 };
    /// let metrics = tfm::FontMetrics::load(&tfm, scale).unwrap();
    /// assert_eq![metrics.design_size, 655360];
    /// assert_eq![
    ///     metrics.width(65),
    ///     Some(tfm::CharWidth{ width: 327680, pixels: 328 }),
    /// ];
    /// assert_eq![metrics.width(66), None];
    /// ```
    pub fn load(b: &[u8], scale: Scale) -> Result<FontMetrics, Error> {
        load::load(b, scale)
    }

    /// Returns the width of a character, or [`None`] if the character is not in the font.
    pub fn width(&self, c: i32) -> Option<CharWidth> {
        if c < self.bc || c > self.ec {
            return None;
        }
        self.widths.get((c - self.bc) as usize).copied().flatten()
    }

    /// The number of characters in the font's range.
    pub fn num_chars(&self) -> usize {
        self.widths.len()
    }
}
