//! Fatal errors and non-fatal warnings.

/// An error that stops processing of the DVI file.
#[derive(Debug)]
pub enum Error {
    /// The file ended while a value was being read.
    UnexpectedEndOfFile { offset: u64 },
    /// The preamble is malformed.
    BadPreamble(BadPreamble),
    /// The end of the file is malformed.
    BadTrailer(BadTrailer),
    /// The pointer before the identification byte at the end of the file
    /// does not point to a postamble.
    BadPostPointer { pointer: i32, offset: u64 },
    /// The font definitions of the postamble are not followed by `post_post`.
    BadPostamble { offset: u64 },
    /// A backpointer does not point to an earlier `bop` command.
    BadPageLink { pointer: i64, from: u64 },
    /// No page in the file matches the page selector.
    StartPageNotFound,
    /// A command other than `bop` appeared where a page should start.
    ExpectedBeginPage { offset: u64, op_code: u8 },
    /// A page could not be interpreted to its end.
    PageEndedUnexpectedly { page: u64, fault: PageFault },
    /// A structural command appeared inside a page that is being skipped.
    IllegalCommand { offset: u64, op_code: u8 },
    /// One of the fixed capacities of the program was exceeded.
    CapacityExceeded(Capacity),
    /// A font's .tfm file is malformed.
    BadFontFile { font: String, err: tfm::Error },
    /// Writing the trace failed.
    Io(std::io::Error),
}

/// Reasons the preamble is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadPreamble {
    NotPreamble(u8),
    IdByte(u8),
    Numerator(i32),
    Denominator(i32),
    Magnification(i32),
}

/// Reasons the end of the file is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadTrailer {
    /// The file is too short to contain a postamble.
    TooShort(u64),
    /// The file consists only of signature bytes.
    AllSignatureBytes,
    /// The identification byte has the wrong value.
    IdByte { offset: u64, byte: u8 },
    /// The pointer after `post_post` does not point to the postamble.
    PostamblePointer { offset: u64, pointer: i32 },
    /// A byte after the identification byte is not a signature byte.
    Signature { offset: u64 },
}

/// A capacity that was exceeded; the payload is the configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Fonts(usize),
    Names(usize),
    Widths(usize),
}

/// A problem that stops interpretation of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFault {
    /// A `bop` appeared before the current page ended.
    BeginPageBeforeEndPage { offset: u64 },
    /// A `pre` command appeared within a page.
    Preamble { offset: u64 },
    /// A `post` or `post_post` command appeared within a page.
    Postamble { offset: u64 },
    /// One of the undefined op codes 250-255 appeared within a page.
    UndefinedOpCode { offset: u64, op_code: u8 },
    /// A `push` would make the stack deeper than its capacity.
    StackOverflow { offset: u64, capacity: usize },
}

impl std::fmt::Display for PageFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageFault::BeginPageBeforeEndPage { .. } => write!(f, "bop occurred before eop!"),
            PageFault::Preamble { .. } => write!(f, "preamble command within a page!"),
            PageFault::Postamble { .. } => write!(f, "postamble command within a page!"),
            PageFault::UndefinedOpCode { op_code, .. } => {
                write!(f, "undefined command {op_code}!")
            }
            PageFault::StackOverflow { capacity, .. } => {
                write!(f, "DVItype capacity exceeded (stack size={capacity})!")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::BadFontFile { err, .. } => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnexpectedEndOfFile { offset } => write!(
                f,
                "Bad DVI file: the file ended prematurely (reading byte {offset})!"
            ),
            Error::BadPreamble(reason) => {
                write!(f, "Bad DVI file: ")?;
                match reason {
                    BadPreamble::NotPreamble(_) => write!(f, "First byte isn't start of preamble")?,
                    BadPreamble::IdByte(b) => write!(
                        f,
                        "identification in byte 1 should be {}, not {b}",
                        dvi::ID_BYTE
                    )?,
                    BadPreamble::Numerator(n) => write!(f, "numerator is {n}")?,
                    BadPreamble::Denominator(d) => write!(f, "denominator is {d}")?,
                    BadPreamble::Magnification(m) => write!(f, "magnification is {m}")?,
                }
                write!(f, "!")
            }
            Error::BadTrailer(reason) => {
                write!(f, "Bad DVI file: ")?;
                match reason {
                    BadTrailer::TooShort(n) => write!(f, "only {n} bytes long")?,
                    BadTrailer::AllSignatureBytes => write!(f, "all {}s", dvi::SIGNATURE_BYTE)?,
                    BadTrailer::IdByte { offset, byte } => write!(
                        f,
                        "identification in byte {offset} should be {}, not {byte}",
                        dvi::ID_BYTE
                    )?,
                    BadTrailer::PostamblePointer { offset, pointer } => {
                        write!(f, "bad postamble pointer {pointer} in byte {offset}")?
                    }
                    BadTrailer::Signature { offset } => write!(
                        f,
                        "signature in byte {offset} should be {}",
                        dvi::SIGNATURE_BYTE
                    )?,
                }
                write!(f, "!")
            }
            Error::BadPostPointer { pointer, offset } => write!(
                f,
                "Bad DVI file: post pointer {pointer} at byte {offset} does not point to post!"
            ),
            Error::BadPostamble { offset } => {
                write!(f, "Bad DVI file: byte {offset} is not postpost!")
            }
            Error::BadPageLink { pointer, from } => write!(
                f,
                "Bad DVI file: page link {pointer} from byte {from} does not point to bop!"
            ),
            Error::StartPageNotFound => {
                write!(f, "Bad DVI file: starting page number could not be found!")
            }
            Error::ExpectedBeginPage { offset, .. } => {
                write!(f, "Bad DVI file: byte {offset} is not bop!")
            }
            Error::PageEndedUnexpectedly { .. } => {
                write!(f, "Bad DVI file: page ended unexpectedly!")
            }
            Error::IllegalCommand { offset, .. } => {
                write!(f, "Bad DVI file: illegal command at byte {offset}!")
            }
            Error::CapacityExceeded(capacity) => {
                write!(f, "DVItype capacity exceeded (")?;
                match capacity {
                    Capacity::Fonts(n) => write!(f, "max fonts={n}")?,
                    Capacity::Names(n) => write!(f, "name size={n}")?,
                    Capacity::Widths(n) => write!(f, "max widths={n}")?,
                }
                write!(f, ")!")
            }
            Error::BadFontFile { font, err } => {
                write!(f, "TFM file for font {font} is bad: {err}!")
            }
            Error::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl From<dvi::InvalidDviData> for Error {
    fn from(value: dvi::InvalidDviData) -> Self {
        match value {
            dvi::InvalidDviData::UnexpectedEndOfFile { offset } => {
                Error::UnexpectedEndOfFile { offset }
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

/// A problem in the DVI file that is reported but does not stop processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A font was redefined with a different checksum.
    ChecksumMismatch { font: i32 },
    /// A font was redefined with a different scaled size.
    ScaledSizeMismatch { font: i32 },
    /// A font was redefined with a different design size.
    DesignSizeMismatch { font: i32 },
    /// A font was redefined with a different name.
    NameMismatch { font: i32 },
    /// The checksum in the DVI file differs from the checksum in the .tfm file.
    TfmChecksumMismatch { font: i32, dvi: u32, tfm: u32 },
    /// The design size in the DVI file differs from the design size in the .tfm file.
    TfmDesignSizeMismatch { font: i32, dvi: i32, tfm: i32 },
    NumeratorMismatch,
    DenominatorMismatch,
    MagnificationMismatch,
    /// The largest |v| seen in the pages exceeds the postamble's value.
    ObservedMaxV(i32),
    /// The largest |h| seen in the pages exceeds the postamble's value.
    ObservedMaxH(i32),
    /// The deepest stack seen in the pages exceeds the postamble's value.
    ObservedMaxStackDepth(usize),
    /// The number of pages differs from the postamble's count.
    PageCount { actual: usize, declared: u16 },
    /// A `bop` or `post` does not point back to the previous page.
    BadBackpointer {
        offset: u64,
        expected: i64,
        found: i32,
    },
    /// Fewer than four signature bytes end the file.
    FewSignatureBytes(usize),
    /// A character has no width in the current font.
    UndefinedCharacter { char: i32, font: String },
    /// A character was typeset before any font was selected.
    NoFontSelected { char: i32 },
    /// A font that was never defined was selected.
    UndefinedFont(i32),
    /// A font whose metrics could not be loaded was selected.
    UnusableFont(i32),
    /// A `pop` at stack level zero.
    StackUnderflow,
    /// A page ended with a non-empty stack.
    StackNotEmptyAtEop(usize),
    /// The stack is deeper than the postamble claims.
    DeeperThanClaimed,
    /// A movement would take a position past the maximum; the movement was clamped.
    ArithmeticOverflow { original: i64, clamped: i64 },
    /// |h| exceeds the postamble's maximum.
    ExceedsMaxH(i32),
    /// |v| exceeds the postamble's maximum.
    ExceedsMaxV(i32),
    /// A special contains bytes outside printable ASCII.
    NonAsciiSpecial,
    /// A special has a negative length.
    InvalidLength(i32),
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::ChecksumMismatch { .. } => {
                write!(f, "---check sum doesn't match previous definition!")
            }
            Warning::ScaledSizeMismatch { .. } => {
                write!(f, "---scaled size doesn't match previous definition!")
            }
            Warning::DesignSizeMismatch { .. } => {
                write!(f, "---design size doesn't match previous definition!")
            }
            Warning::NameMismatch { .. } => {
                write!(f, "---font name doesn't match previous definition!")
            }
            Warning::TfmChecksumMismatch { dvi, tfm, .. } => write!(
                f,
                "---beware: check sums do not agree!\n   ({dvi:o} vs. {tfm:o})\n   "
            ),
            Warning::TfmDesignSizeMismatch { dvi, tfm, .. } => write!(
                f,
                "---beware: design sizes do not agree!\n   ({dvi} vs. {tfm})\n   "
            ),
            Warning::NumeratorMismatch => write!(f, "numerator doesn't match the preamble!"),
            Warning::DenominatorMismatch => {
                write!(f, "denominator doesn't match the preamble!")
            }
            Warning::MagnificationMismatch => {
                write!(f, "magnification doesn't match the preamble!")
            }
            Warning::ObservedMaxV(v) => write!(f, "warning: observed maxv was {v}"),
            Warning::ObservedMaxH(h) => write!(f, "warning: observed maxh was {h}"),
            Warning::ObservedMaxStackDepth(s) => {
                write!(f, "warning: observed maxstackdepth was {s}")
            }
            Warning::PageCount { actual, declared } => {
                write!(f, "there are really {actual} pages, not {declared}!")
            }
            Warning::BadBackpointer {
                offset,
                expected,
                found,
            } => write!(
                f,
                "backpointer in byte {offset} should be {expected}, not {found}!"
            ),
            Warning::FewSignatureBytes(n) => {
                write!(f, "not enough signature bytes at end of file ({n})")
            }
            Warning::UndefinedCharacter { char, font } => {
                write!(f, "character {char} invalid in font {font}!")
            }
            Warning::NoFontSelected { char } => {
                write!(f, "character {char} invalid in font UNDEFINED!")
            }
            Warning::UndefinedFont(n) => {
                write!(f, "invalid font selection: font {n} was never defined!")
            }
            Warning::UnusableFont(n) => {
                write!(f, "invalid font selection: font {n} was not loaded!")
            }
            Warning::StackUnderflow => write!(f, "(illegal at level zero)!"),
            Warning::StackNotEmptyAtEop(level) => {
                write!(f, "stack not empty at end of page (level {level})!")
            }
            Warning::DeeperThanClaimed => write!(f, "deeper than claimed in postamble!"),
            Warning::ArithmeticOverflow { original, clamped } => write!(
                f,
                "arithmetic overflow! parameter changed from {original} to {clamped}"
            ),
            Warning::ExceedsMaxH(max) => write!(f, "warning: |h|>{max}!"),
            Warning::ExceedsMaxV(max) => write!(f, "warning: |v|>{max}!"),
            Warning::NonAsciiSpecial => write!(f, "non-ASCII character in xxx command!"),
            Warning::InvalidLength(_) => write!(f, "string of negative length!"),
        }
    }
}
