//! Builders for DVI and .tfm data used in unit tests.

use crate::convert::Conversions;
use crate::fonts::{FontTable, ReadMode};
use crate::options::OutMode;
use crate::trace::Trace;
use crate::Context;
use dvi::opcode;
use std::collections::HashMap;

/// Checksum of the test font.
pub const CHECKSUM: u32 = 0o1234567;

/// Ten points in TeX's DVI units (scaled points).
pub const TEN_POINTS: i32 = 10 << 16;

/// Number of characters in the test font.
pub const NUM_CHARS: usize = 96;

/// A character with no width in the test font.
pub const MISSING_CHAR: u8 = 127;

/// Width in DVI units of every character of the test font at ten points.
pub const CHAR_WIDTH: i32 = TEN_POINTS / 2;

/// Returns a .tfm file with design size 10pt and characters 32 to 127.
///
/// Every character is half a design unit wide, except [`MISSING_CHAR`].
pub fn tfm() -> Vec<u8> {
    let (bc, ec) = (32_u16, 127_u16);
    let lh = 2_u16;
    let nw = 2_u16;
    let lf = 6 + lh + (ec - bc + 1) + nw;
    let mut b = vec![];
    for half_word in [lf, lh, bc, ec, nw, 1, 1, 0, 0, 0, 0, 0] {
        b.extend(half_word.to_be_bytes());
    }
    b.extend(CHECKSUM.to_be_bytes());
    b.extend((10_i32 << 20).to_be_bytes());
    for c in bc..=ec {
        let index = if c == u16::from(MISSING_CHAR) { 0 } else { 1 };
        b.extend([index, 0, 0, 0]);
    }
    b.extend(0_i32.to_be_bytes());
    b.extend((1_i32 << 19).to_be_bytes());
    b
}

/// A locator that knows the test font under the name `cmr10`.
pub fn font_map() -> HashMap<String, Vec<u8>> {
    HashMap::from([("cmr10".to_string(), tfm())])
}

/// Builds DVI data command by command.
pub struct Dvi {
    b: Vec<u8>,
    last_bop: i32,
    num_pages: u16,
    font_defs: Vec<u8>,
    /// The maximum |v|, |h| and stack depth written in the postamble.
    pub declared: (i32, i32, u16),
}

impl Default for Dvi {
    fn default() -> Self {
        Dvi {
            b: vec![],
            last_bop: -1,
            num_pages: 0,
            font_defs: vec![],
            declared: ((1 << 30) - 1, (1 << 30) - 1, 100),
        }
    }
}

impl Dvi {
    pub fn new() -> Dvi {
        Default::default()
    }

    pub fn position(&self) -> u64 {
        self.b.len() as u64
    }

    pub fn byte(mut self, b: u8) -> Self {
        self.b.push(b);
        self
    }

    pub fn int(mut self, n: i32) -> Self {
        self.b.extend(n.to_be_bytes());
        self
    }

    /// The preamble TeX writes, with the comment `test`.
    pub fn preamble(self) -> Self {
        self.byte(opcode::PRE)
            .byte(dvi::ID_BYTE)
            .int(25400000)
            .int(473628672)
            .int(1000)
            .byte(4)
            .bytes(b"test")
    }

    pub fn bytes(mut self, b: &[u8]) -> Self {
        self.b.extend_from_slice(b);
        self
    }

    pub fn bop(mut self, counts: &[i32]) -> Self {
        let offset = self.b.len() as i32;
        self.b.push(opcode::BOP);
        for i in 0..10 {
            self.b
                .extend(counts.get(i).copied().unwrap_or(0).to_be_bytes());
        }
        self.b.extend(self.last_bop.to_be_bytes());
        self.last_bop = offset;
        self.num_pages += 1;
        self
    }

    pub fn eop(self) -> Self {
        self.byte(opcode::EOP)
    }

    pub fn push(self) -> Self {
        self.byte(opcode::PUSH)
    }

    pub fn pop(self) -> Self {
        self.byte(opcode::POP)
    }

    pub fn nop(self) -> Self {
        self.byte(opcode::NOP)
    }

    pub fn right(self, p: i32) -> Self {
        self.byte(opcode::RIGHT1 + 3).int(p)
    }

    pub fn down(self, p: i32) -> Self {
        self.byte(opcode::DOWN1 + 3).int(p)
    }

    pub fn w(self, p: i32) -> Self {
        self.byte(opcode::W1 + 3).int(p)
    }

    pub fn x(self, p: i32) -> Self {
        self.byte(opcode::X1 + 3).int(p)
    }

    pub fn y(self, p: i32) -> Self {
        self.byte(opcode::Y1 + 3).int(p)
    }

    pub fn z(self, p: i32) -> Self {
        self.byte(opcode::Z1 + 3).int(p)
    }

    pub fn set_rule(self, height: i32, width: i32) -> Self {
        self.byte(opcode::SET_RULE).int(height).int(width)
    }

    pub fn fnt(self, number: u8) -> Self {
        self.byte(opcode::FNT1).byte(number)
    }

    pub fn xxx(self, b: &[u8]) -> Self {
        self.byte(opcode::XXX1).byte(b.len() as u8).bytes(b)
    }

    /// Define the test font at ten points, with the given number and name.
    ///
    /// The same definition is repeated in the postamble.
    pub fn fnt_def(mut self, number: u8, name: &str) -> Self {
        let start = self.b.len();
        self.b.push(opcode::FNT_DEF1);
        self.b.push(number);
        self.b.extend(CHECKSUM.to_be_bytes());
        self.b.extend(TEN_POINTS.to_be_bytes());
        self.b.extend(TEN_POINTS.to_be_bytes());
        self.b.push(0);
        self.b.push(name.len() as u8);
        self.b.extend_from_slice(name.as_bytes());
        let def = self.b[start..].to_vec();
        self.font_defs.extend(def);
        self
    }

    /// The data written so far, without a postamble.
    pub fn page_data(self) -> Vec<u8> {
        self.b
    }

    /// Write the postamble and trailer and return the file.
    pub fn finish(mut self) -> Vec<u8> {
        let post = self.b.len() as i32;
        let (max_v, max_h, max_stack) = self.declared;
        self.b.push(opcode::POST);
        self.b.extend(self.last_bop.to_be_bytes());
        self.b.extend(25400000_i32.to_be_bytes());
        self.b.extend(473628672_i32.to_be_bytes());
        self.b.extend(1000_i32.to_be_bytes());
        self.b.extend(max_v.to_be_bytes());
        self.b.extend(max_h.to_be_bytes());
        self.b.extend(max_stack.to_be_bytes());
        self.b.extend(self.num_pages.to_be_bytes());
        let font_defs = std::mem::take(&mut self.font_defs);
        self.b.extend(font_defs);
        self.b.push(opcode::POST_POST);
        self.b.extend(post.to_be_bytes());
        self.b.push(dvi::ID_BYTE);
        self.b.extend([dvi::SIGNATURE_BYTE; 4]);
        self.b
    }
}

/// A context for interpreting the given page data at the given output level.
pub fn context(data: &[u8], out_mode: OutMode) -> Context<'_, Vec<u8>, HashMap<String, Vec<u8>>> {
    Context {
        cursor: dvi::ByteCursor::new(data),
        trace: Trace::new(vec![], out_mode),
        fonts: FontTable::new(Default::default(), ReadMode::Sequential),
        locator: font_map(),
        conversions: Conversions::default(),
    }
}
