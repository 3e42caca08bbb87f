//! # DVI file format
//!
//! This crate decodes the DVI ("device-independent file format") format.
//!
//! The most important type in the crate is [`Op`],
//! which describes a single operation or
//! command in a DVI file. A DVI file is just a list of such operations,
//! preceded by a preamble and followed by a postamble.
//!
//! Programs that check DVI files need to jump around in the data:
//!     the postamble is found by reading backwards from the end of the file,
//!     and pages are linked together by pointers to their predecessors.
//! For this reason decoding is built on a [`ByteCursor`],
//!     which reads from an arbitrary offset and reports the offset of
//!     every command it reads.
//!
//! ```
//! let data: Vec<u8> = vec![158, 1, 0, 68, 255];
//! let mut cursor = dvi::ByteCursor::new(&data);
//! assert_eq![dvi::Op::read(&mut cursor), Ok(dvi::Op::Down(256))];
//! assert_eq![cursor.position(), 3];
//! assert_eq![
//!     dvi::Op::read(&mut cursor),
//!     Ok(dvi::Op::TypesetChar{char: 'D' as i32, move_h: true}),
//! ];
//! assert_eq![dvi::Op::read(&mut cursor), Ok(dvi::Op::Undefined(255))];
//! ```
//!
//! ## The format in brief
//!
//! A DVI file is a stream of 8-bit bytes.
//! The first byte of each command is the operation code, and this code is
//!     followed by zero or more bytes that provide parameters to the command.
//! Multi-byte parameters are big-endian.
//! Four-byte parameters, and shorter parameters that denote distances,
//!     are signed and given in two's complement notation;
//!     other shorter parameters are unsigned.
//!
//! The file is a preamble ([`Op::Preamble`]), a sequence of pages
//!     ([`Op::BeginPage`] ... [`Op::EndPage`]) possibly interleaved with font
//!     definitions and no-ops, and a postamble
//!     ([`Op::BeginPostamble`], font definitions, [`Op::EndPostamble`])
//!     followed by at least four bytes with the value [`SIGNATURE_BYTE`].

mod cursor;
mod deserialize;

pub use cursor::ByteCursor;

/// The DVI format identification byte, appearing in the preamble and after the postamble.
pub const ID_BYTE: u8 = 2;

/// The byte value used to pad the end of a DVI file.
pub const SIGNATURE_BYTE: u8 = 223;

/// Op codes of the DVI commands.
///
/// Commands with 1, 2, 3 and 4 byte variants are identified by the op code
///     of the 1 byte variant.
pub mod opcode {
    pub const SET_CHAR_0: u8 = 0;
    pub const SET1: u8 = 128;
    pub const SET_RULE: u8 = 132;
    pub const PUT1: u8 = 133;
    pub const PUT_RULE: u8 = 137;
    pub const NOP: u8 = 138;
    pub const BOP: u8 = 139;
    pub const EOP: u8 = 140;
    pub const PUSH: u8 = 141;
    pub const POP: u8 = 142;
    pub const RIGHT1: u8 = 143;
    pub const W0: u8 = 147;
    pub const W1: u8 = 148;
    pub const X0: u8 = 152;
    pub const X1: u8 = 153;
    pub const DOWN1: u8 = 157;
    pub const Y0: u8 = 161;
    pub const Y1: u8 = 162;
    pub const Z0: u8 = 166;
    pub const Z1: u8 = 167;
    pub const FNT_NUM_0: u8 = 171;
    pub const FNT1: u8 = 235;
    pub const XXX1: u8 = 239;
    pub const FNT_DEF1: u8 = 243;
    pub const PRE: u8 = 247;
    pub const POST: u8 = 248;
    pub const POST_POST: u8 = 249;
}

/// A variable in DVI data.
///
/// DVI data has access to four variables.
/// These variables are set using the [`Op::SetVar`] operation
/// and used in the [`Op::Move`] operation.
/// Of the four variables, [`Var::W`] and [`Var::X`] operate on the
/// horizontal part of the cursor _h_, and [`Var::Y`] and [`Var::Z`]
/// operate on the vertical part of the cursor _v_.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Var {
    W = 0,
    X = 1,
    Y = 2,
    Z = 3,
}

impl Var {
    /// Returns true if the variable moves _h_ rather than _v_.
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Var::W | Var::X)
    }

    /// Lowercase name of the variable, as used in DVI command mnemonics.
    pub fn name(&self) -> char {
        match self {
            Var::W => 'w',
            Var::X => 'x',
            Var::Y => 'y',
            Var::Z => 'z',
        }
    }
}

/// Operation that appears in DVI data.
///
/// The variants don't map one-to-one on to commands.
/// Instead, commands that are logically connected are represented
/// in the same variant. For example, `set_char_0`, `set1` and `put1` are
/// all represented using the [`Op::TypesetChar`] variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Typeset the specified character from the current font _f_
    /// such that the reference point of the character is at (_h_,_v_).
    ///
    /// This op corresponds to the DVI commands `set_char_N`, `set_N`
    /// and `put_N`.
    /// The 4 byte variants carry a signed character code.
    TypesetChar {
        /// The character to typeset.
        char: i32,
        /// If true, after typesetting the character,
        /// increase _h_ by the width of that character.
        ///
        /// This field is true for `setX` commands and false for `putX` commands.
        move_h: bool,
    },
    /// Typeset a solid black rectangle
    /// of the provided height and width, with its bottom left corner at (_h_,_v_).
    ///
    /// If either the width or height is not positive, nothing should be typeset.
    ///
    /// This op corresponds to the DVI commands `set_rule` and `put_rule`.
    TypesetRule {
        height: i32,
        width: i32,
        /// If true, after typesetting the rule,
        /// increase _h_ by the width of the rule.
        move_h: bool,
    },
    /// No operation, do nothing.
    NoOp,
    /// Beginning of a page.
    ///
    /// Set (_h_,_v_,_w_,_x_,_y_,_z_) equal to (0,0,0,0,0,0) and set the stack empty.
    /// Set the current font _f_ to an undefined value.
    BeginPage {
        /// The ten parameters.
        ///
        /// In the output from TeX, these hold
        /// the values of `\count 0`...`\count 9`
        /// at the time shipout was invoked for this page.
        parameters: [i32; 10],
        /// Pointer to the previous [`Op::BeginPage`] in the file,
        /// or -1 if this is the first begin page op.
        previous_begin_page: i32,
    },
    /// End of page. At this point the stack should be empty.
    EndPage,
    /// Push the current values of
    /// (_h_,_v_,_w_,_x_,_y_,_z_) onto the top of the stack.
    /// The current font _f_ is not pushed.
    Push,
    /// Pop the top six values off of the stack and assign
    /// them respectively to (_h_,_v_,_w_,_x_,_y_,_z_).
    Pop,
    /// Move _h_ right by the number in the payload.
    /// If the payload is negative, _h_ moves left.
    ///
    /// This op corresponds to the four DVI commands `rightN`.
    Right(i32),
    /// Move _h_ or _v_ by the value of the variable in the payload.
    ///
    /// This op corresponds to the four DVI commands `w0`, `x0`, `y0` and `z0`.
    Move(Var),
    /// Set the value of the specified variable, and then move _h_ or _v_
    /// based on the new value.
    ///
    /// This op corresponds to the DVI commands `wN`, `xN`, `yN` and `zN`
    /// for `N>0`.
    SetVar(Var, i32),
    /// Move _v_ down by the number in the payload.
    /// If the payload is negative, _v_ moves up.
    ///
    /// This op corresponds to the four DVI commands `downN`.
    Down(i32),
    /// Enable the specified font.
    ///
    /// This op corresponds to the DVI commands `fnt_num_N` and `fntN`.
    EnableFont(i32),
    /// A special: bytes that are meaningless to DVI itself but may be
    /// interpreted by particular DVI-reading programs.
    ///
    /// This op corresponds to the DVI commands `xxxN`.
    Extension(Vec<u8>),
    /// An `xxx4` command whose declared length is negative.
    ///
    /// No payload bytes are consumed for this command.
    NegativeExtension(i32),
    /// Define a font.
    ///
    /// This op corresponds to the DVI commands `fnt_defN`.
    /// Font definitions appear in the pages and again in the postamble.
    DefineFont {
        /// Number of the font.
        number: i32,
        /// Check sum that TeX found in the TFM file for this font.
        checksum: u32,
        /// A fixed-point scale factor that is applied to
        /// the character widths this font; font dimensions in TFM files
        /// are relative to this quantity, which is called the "at size".
        at_size: i32,
        /// The "design size" of the font, in DVI units.
        design_size: i32,
        /// The "area" or directory of the font.
        area: Vec<u8>,
        /// The external name of the font.
        name: Vec<u8>,
    },
    /// The preamble.
    /// This must come at the very beginning of the file.
    Preamble {
        /// The DVI format; always [`ID_BYTE`] for files produced by TeX.
        dvi_format: u8,
        /// The numerator and denominator define the unit of measurement;
        /// they are the numerator and denominator of a
        /// fraction by which all dimensions in the DVI file could be multiplied
        /// in order to get lengths in units of `10^(-7)` meters.
        unit_numerator: i32,
        /// See the description of the previous field.
        unit_denominator: i32,
        /// 1000 times the desired magnification.
        magnification: i32,
        /// A comment, which is not interpreted further.
        comment: Vec<u8>,
    },
    /// The start of the postamble.
    BeginPostamble {
        /// A pointer to the final [`Op::BeginPage`] in the file.
        final_begin_page: i32,
        /// Duplicate of the analagous parameter in [`Op::Preamble`]
        unit_numerator: i32,
        /// Duplicate of the analagous parameter in [`Op::Preamble`]
        unit_denominator: i32,
        /// Duplicate of the analagous parameter in [`Op::Preamble`]
        magnification: i32,
        /// The height-plus-depth of the tallest page.
        largest_height: i32,
        /// The width of the widest page.
        largest_width: i32,
        /// The maximum stack depth needed to process this file.
        max_stack_depth: u16,
        /// The total number of pages ([`Op::BeginPage`] commands) present.
        num_pages: u16,
    },
    /// The end of the postamble.
    EndPostamble {
        /// A pointer to the [`Op::BeginPostamble`] command that started the postamble.
        postamble: i32,
        /// Duplicate of the analagous parameter in [`Op::Preamble`]
        dvi_format: u8,
        /// Number of [`SIGNATURE_BYTE`] bytes immediately following the format byte.
        ///
        /// TeX writes four to seven of these so that the file length is a
        /// multiple of four; any number of at least four is allowed.
        num_223_bytes: usize,
    },
    /// One of the op codes 250 to 255, which are undefined.
    Undefined(u8),
}

impl Op {
    /// Read the next operation at the cursor.
    ///
    /// ```
    /// let data = vec![128, 4, 129, 1, 0];
    /// let mut cursor = dvi::ByteCursor::new(&data);
    /// assert_eq![
    ///     dvi::Op::read(&mut cursor),
    ///     Ok(dvi::Op::TypesetChar{char: 4, move_h: true}),
    /// ];
    /// assert_eq![
    ///     dvi::Op::read(&mut cursor),
    ///     Ok(dvi::Op::TypesetChar{char: 256, move_h: true}),
    /// ];
    /// ```
    ///
    /// If the data ends in the middle of the operation an error is returned:
    /// ```
    /// let data = vec![129, 1];
    /// let mut cursor = dvi::ByteCursor::new(&data);
    /// assert_eq![
    ///     dvi::Op::read(&mut cursor),
    ///     Err(dvi::InvalidDviData::UnexpectedEndOfFile{offset: 1}),
    /// ];
    /// ```
    pub fn read(cursor: &mut ByteCursor) -> Result<Self, InvalidDviData> {
        let op_code = cursor.u8()?;
        Self::read_payload(op_code, cursor)
    }

    /// Read the payload of an operation whose op code has already been consumed.
    pub fn read_payload(op_code: u8, cursor: &mut ByteCursor) -> Result<Self, InvalidDviData> {
        deserialize::deserialize(op_code, cursor)
    }
}

/// Error returned if decoding DVI data fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidDviData {
    /// The data ended before all of the bytes of a value could be read.
    ///
    /// The offset is the position of the first byte of the value.
    UnexpectedEndOfFile { offset: u64 },
}

impl std::error::Error for InvalidDviData {}

impl std::fmt::Display for InvalidDviData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidDviData::UnexpectedEndOfFile { offset } => {
                write!(f, "the file ended prematurely (reading byte {offset})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_deserialize_test(b: Vec<u8>, want: Op) {
        let mut cursor = ByteCursor::new(&b);
        let got = Op::read(&mut cursor);
        assert_eq!(got, Ok(want));
        assert_eq!(cursor.position(), b.len() as u64);
    }

    macro_rules! deserialize_tests {
        ( $( ($name: ident, [ $($elem: expr),+], $op: expr ), )+  ) => {
            $(
            #[test]
            fn $name() {
                let b = vec![ $( $elem, )+ ];
                run_deserialize_test(b, $op);
            }
            )+
        };
    }

    deserialize_tests!(
        (
            op_code_0,
            [0],
            Op::TypesetChar {
                char: 0,
                move_h: true
            }
        ),
        (
            op_code_127,
            [127],
            Op::TypesetChar {
                char: 127,
                move_h: true
            }
        ),
        (
            op_code_128,
            [128, 255],
            Op::TypesetChar {
                char: 255,
                move_h: true
            }
        ),
        (
            op_code_129,
            [129, 1, 2],
            Op::TypesetChar {
                char: 256 + 2,
                move_h: true
            }
        ),
        (
            op_code_130,
            [130, 255, 255, 255],
            Op::TypesetChar {
                char: 256 * 256 * 256 - 1,
                move_h: true
            }
        ),
        (
            op_code_131,
            [131, 255, 255, 255, 255],
            Op::TypesetChar {
                char: -1,
                move_h: true
            }
        ),
        (
            op_code_132,
            [132, 0, 0, 0, 1, 255, 255, 255, 254],
            Op::TypesetRule {
                height: 1,
                width: -2,
                move_h: true
            }
        ),
        (
            op_code_134,
            [134, 255, 255],
            Op::TypesetChar {
                char: 256 * 256 - 1,
                move_h: false,
            }
        ),
        (
            op_code_137,
            [137, 0, 0, 0, 3, 0, 0, 0, 4],
            Op::TypesetRule {
                height: 3,
                width: 4,
                move_h: false
            }
        ),
        (op_code_138, [138], Op::NoOp),
        (
            op_code_139,
            [
                139, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0, 5, 0, 0, 0, 6, 0,
                0, 0, 7, 0, 0, 0, 8, 0, 0, 0, 9, 255, 255, 255, 246, 255, 255, 255, 255
            ],
            Op::BeginPage {
                parameters: [1, 2, 3, 4, 5, 6, 7, 8, 9, -10],
                previous_begin_page: -1,
            }
        ),
        (op_code_140, [140], Op::EndPage),
        (op_code_141, [141], Op::Push),
        (op_code_142, [142], Op::Pop),
        (op_code_143, [143, 255], Op::Right(-1)),
        (op_code_144, [144, 1, 0], Op::Right(256)),
        (op_code_145, [145, 255, 255, 0], Op::Right(-256)),
        (op_code_146, [146, 0, 0, 1, 0], Op::Right(256)),
        (op_code_147, [147], Op::Move(Var::W)),
        (op_code_148, [148, 128], Op::SetVar(Var::W, -128)),
        (op_code_156, [156, 0, 0, 0, 7], Op::SetVar(Var::X, 7)),
        (op_code_157, [157, 127], Op::Down(127)),
        (op_code_161, [161], Op::Move(Var::Y)),
        (op_code_164, [164, 128, 0, 0], Op::SetVar(Var::Y, -(1 << 23))),
        (op_code_166, [166], Op::Move(Var::Z)),
        (op_code_167, [167, 5], Op::SetVar(Var::Z, 5)),
        (op_code_171, [171], Op::EnableFont(0)),
        (op_code_234, [234], Op::EnableFont(63)),
        (op_code_235, [235, 200], Op::EnableFont(200)),
        (op_code_238, [238, 255, 255, 255, 255], Op::EnableFont(-1)),
        (
            op_code_239,
            [239, 3, b'a', b'b', b'c'],
            Op::Extension(b"abc".to_vec())
        ),
        (
            op_code_242_negative,
            [242, 255, 255, 255, 254],
            Op::NegativeExtension(-2)
        ),
        (
            op_code_243,
            [243, 7, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 1, 2, b'a', b'c', b'd'],
            Op::DefineFont {
                number: 7,
                checksum: 1,
                at_size: 2,
                design_size: 3,
                area: b"a".to_vec(),
                name: b"cd".to_vec(),
            }
        ),
        (
            op_code_247,
            [247, 2, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 3, 232, 2, b'h', b'i'],
            Op::Preamble {
                dvi_format: 2,
                unit_numerator: 1,
                unit_denominator: 2,
                magnification: 1000,
                comment: b"hi".to_vec(),
            }
        ),
        (
            op_code_248,
            [
                248, 0, 0, 0, 42, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 3, 232, 0, 0, 0, 5, 0, 0, 0, 6,
                0, 1, 0, 2
            ],
            Op::BeginPostamble {
                final_begin_page: 42,
                unit_numerator: 1,
                unit_denominator: 2,
                magnification: 1000,
                largest_height: 5,
                largest_width: 6,
                max_stack_depth: 1,
                num_pages: 2,
            }
        ),
        (
            op_code_249,
            [249, 0, 0, 0, 100, 2, 223, 223, 223, 223],
            Op::EndPostamble {
                postamble: 100,
                dvi_format: 2,
                num_223_bytes: 4,
            }
        ),
        (op_code_250, [250], Op::Undefined(250)),
        (op_code_255, [255], Op::Undefined(255)),
    );

    #[test]
    fn end_postamble_stops_at_first_non_signature_byte() {
        let b = vec![249, 0, 0, 0, 100, 2, 223, 223, 7, 223];
        let mut cursor = ByteCursor::new(&b);
        assert_eq!(
            Op::read(&mut cursor),
            Ok(Op::EndPostamble {
                postamble: 100,
                dvi_format: 2,
                num_223_bytes: 2,
            })
        );
        assert_eq!(cursor.position(), 8);
    }

    #[test]
    fn truncated_font_name() {
        let b = vec![243, 7, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 5, b'a'];
        let mut cursor = ByteCursor::new(&b);
        assert_eq!(
            Op::read(&mut cursor),
            Err(InvalidDviData::UnexpectedEndOfFile { offset: 16 })
        );
    }
}
