use super::*;

/// Largest scale factor (exclusive) that the fixed-point algorithm supports.
const MAX_SCALE: i32 = 1 << 30;

/// Reads the .tfm data one 4-byte word at a time.
struct Words<'a> {
    b: &'a [u8],
    offset: usize,
}

impl<'a> Words<'a> {
    fn next(&mut self) -> Result<[u8; 4], Error> {
        let Some(word) = self.b.get(self.offset..).and_then(|b| b.first_chunk::<4>()) else {
            return Err(Error::Truncated(self.offset));
        };
        self.offset += 4;
        Ok(*word)
    }
}

fn round(f: f64) -> i32 {
    f.round() as i32
}

pub fn load(b: &[u8], scale: Scale) -> Result<FontMetrics, Error> {
    let z = scale.at_size;
    if z <= 0 || z >= MAX_SCALE {
        return Err(Error::InvalidScale(z));
    }
    let mut words = Words { b, offset: 0 };

    // The first six words are the sub file sizes.
    // Only the header length, character range and width table length are needed.
    let [_, _, lh_0, lh_1] = words.next()?;
    let lh = u16::from_be_bytes([lh_0, lh_1]);
    let [bc_0, bc_1, ec_0, ec_1] = words.next()?;
    let ec = i32::from(u16::from_be_bytes([ec_0, ec_1]));
    let mut bc = i32::from(u16::from_be_bytes([bc_0, bc_1]));
    if ec < bc {
        bc = ec + 1;
    }
    let [nw_0, nw_1, _, _] = words.next()?;
    let nw = u16::from_be_bytes([nw_0, nw_1]);
    if nw == 0 || nw > 256 {
        return Err(Error::InvalidWidthTableSize(nw));
    }
    let mut checksum = 0_u32;
    let mut design_size = 0_i32;
    for k in 1..=(3 + u32::from(lh)) {
        let word = words.next()?;
        match k {
            4 => {
                checksum = u32::from_be_bytes(word);
            }
            5 => {
                if word[0] >= 128 {
                    return Err(Error::NegativeDesignSize);
                }
                design_size = round(scale.tfm_conv * f64::from(i32::from_be_bytes(word)));
            }
            _ => {}
        }
    }

    let num_chars = (ec - bc + 1) as usize;
    let mut width_indices: Vec<u8> = Vec::with_capacity(num_chars);
    for c in bc..=ec {
        let [index, _, _, _] = words.next()?;
        if u16::from(index) >= nw {
            return Err(Error::InvalidWidthIndex {
                char: c,
                index,
                num_widths: nw,
            });
        }
        width_indices.push(index);
    }

    // Replace z by z' and compute alpha and beta, as in TeX.
    let mut z = i64::from(z);
    let mut alpha: i64 = 16;
    while z >= 1 << 27 {
        z /= 2;
        alpha += alpha;
    }
    let beta = 256 / alpha;
    let alpha = alpha * z;

    let mut in_widths: Vec<i32> = Vec::with_capacity(nw.into());
    for index in 0..usize::from(nw) {
        let [b0, b1, b2, b3] = words.next()?;
        let (b1, b2, b3) = (i64::from(b1), i64::from(b2), i64::from(b3));
        let mut width = (((b3 * z) / 256 + (b2 * z)) / 256 + (b1 * z)) / beta;
        match b0 {
            0 => {}
            255 => width -= alpha,
            byte => return Err(Error::InvalidWidthSign { index, byte }),
        }
        let Ok(width) = i32::try_from(width) else {
            return Err(Error::WidthOverflow { index, width });
        };
        in_widths.push(width);
    }
    if in_widths[0] != 0 {
        return Err(Error::NonZeroFirstWidth(in_widths[0]));
    }

    let widths = width_indices
        .into_iter()
        .map(|index| match index {
            0 => None,
            _ => {
                let width = in_widths[usize::from(index)];
                Some(CharWidth {
                    width,
                    pixels: round(scale.conv * f64::from(width)),
                })
            }
        })
        .collect();
    Ok(FontMetrics {
        checksum,
        design_size,
        bc,
        ec,
        widths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE: Scale = Scale {
        at_size: 10 << 16,
        tfm_conv: 1.0 / 16.0,
        conv: 300.0 / 72.27 / 65536.0,
    };

    /// Builds .tfm bytes with the provided character range and width table.
    ///
    /// Character `bc+i` uses width index `indices[i]`.
    fn build(bc: u16, ec: u16, indices: &[u8], widths: &[[u8; 4]]) -> Vec<u8> {
        let mut b = vec![];
        let nw = widths.len() as u16;
        let lh: u16 = 2;
        b.extend(0_u16.to_be_bytes());
        b.extend(lh.to_be_bytes());
        b.extend(bc.to_be_bytes());
        b.extend(ec.to_be_bytes());
        b.extend(nw.to_be_bytes());
        b.extend(1_u16.to_be_bytes());
        b.extend([0; 12]);
        // checksum
        b.extend(0o1234567_u32.to_be_bytes());
        // design size of 10.0
        b.extend((10_u32 << 20).to_be_bytes());
        for index in indices {
            b.extend([*index, 0, 0, 0]);
        }
        for width in widths {
            b.extend(width);
        }
        b
    }

    fn fix_word(n: i32) -> [u8; 4] {
        n.to_be_bytes()
    }

    #[test]
    fn load_widths() {
        let b = build(
            65,
            68,
            &[1, 0, 2, 1],
            &[fix_word(0), fix_word(1 << 19), fix_word(-(1 << 18))],
        );
        let metrics = FontMetrics::load(&b, SCALE).unwrap();
        assert_eq!(metrics.checksum, 0o1234567);
        assert_eq!(metrics.design_size, 655360);
        assert_eq!(metrics.bc, 65);
        assert_eq!(metrics.ec, 68);
        assert_eq!(metrics.num_chars(), 4);
        assert_eq!(metrics.width(65).map(|w| w.width), Some(327680));
        assert_eq!(metrics.width(65).map(|w| w.pixels), Some(21));
        assert_eq!(metrics.width(66), None);
        assert_eq!(metrics.width(67).map(|w| w.width), Some(-163840));
        assert_eq!(metrics.width(67).map(|w| w.pixels), Some(-10));
        assert_eq!(metrics.width(64), None);
        assert_eq!(metrics.width(69), None);
    }

    #[test]
    fn large_scale_is_halved() {
        let b = build(0, 0, &[1], &[fix_word(0), fix_word(1 << 20)]);
        let scale = Scale {
            at_size: (1 << 28) + 3,
            ..SCALE
        };
        let metrics = FontMetrics::load(&b, scale).unwrap();
        // A width of exactly one design unit is the at size, less the bits lost to halving.
        assert_eq!(metrics.width(0).map(|w| w.width), Some(1 << 28));
    }

    #[test]
    fn empty_character_range() {
        let b = build(10, 5, &[], &[fix_word(0)]);
        let metrics = FontMetrics::load(&b, SCALE).unwrap();
        assert_eq!(metrics.bc, 6);
        assert_eq!(metrics.ec, 5);
        assert_eq!(metrics.num_chars(), 0);
        assert_eq!(metrics.width(5), None);
    }

    #[test]
    fn reject_empty_width_table() {
        let b = build(0, 0, &[0], &[]);
        assert_eq!(
            FontMetrics::load(&b, SCALE),
            Err(Error::InvalidWidthTableSize(0))
        );
    }

    #[test]
    fn reject_too_many_widths() {
        let widths = vec![fix_word(0); 257];
        let b = build(0, 0, &[0], &widths);
        assert_eq!(
            FontMetrics::load(&b, SCALE),
            Err(Error::InvalidWidthTableSize(257))
        );
    }

    #[test]
    fn accept_256_widths() {
        let widths = vec![fix_word(0); 256];
        let b = build(0, 0, &[255], &widths);
        assert!(FontMetrics::load(&b, SCALE).is_ok());
    }

    #[test]
    fn reject_non_zero_first_width() {
        let b = build(0, 0, &[1], &[fix_word(1 << 16), fix_word(1 << 16)]);
        assert_eq!(
            FontMetrics::load(&b, SCALE),
            Err(Error::NonZeroFirstWidth(40960))
        );
    }

    #[test]
    fn reject_width_index_past_table() {
        let b = build(0, 1, &[1, 2], &[fix_word(0), fix_word(1 << 16)]);
        assert_eq!(
            FontMetrics::load(&b, SCALE),
            Err(Error::InvalidWidthIndex {
                char: 1,
                index: 2,
                num_widths: 2,
            })
        );
    }

    #[test]
    fn reject_bad_sign_byte() {
        let b = build(0, 0, &[1], &[fix_word(0), [7, 0, 0, 0]]);
        assert_eq!(
            FontMetrics::load(&b, SCALE),
            Err(Error::InvalidWidthSign { index: 1, byte: 7 })
        );
    }

    #[test]
    fn reject_negative_design_size() {
        let mut b = build(0, 0, &[1], &[fix_word(0), fix_word(1)]);
        // the design size is the second header word
        b[28] = 128;
        assert_eq!(
            FontMetrics::load(&b, SCALE),
            Err(Error::NegativeDesignSize)
        );
    }

    #[test]
    fn reject_truncated_file() {
        let mut b = build(0, 0, &[1], &[fix_word(0), fix_word(1)]);
        b.truncate(b.len() - 2);
        assert_eq!(
            FontMetrics::load(&b, SCALE),
            Err(Error::Truncated(b.len() - 2))
        );
    }

    #[test]
    fn reject_width_past_i32_range() {
        // A width of four design units at an at size of 2^29 is 2^31 DVI units.
        let b = build(0, 0, &[1], &[fix_word(0), fix_word(4 << 20)]);
        let scale = Scale {
            at_size: 1 << 29,
            ..SCALE
        };
        assert_eq!(
            FontMetrics::load(&b, scale),
            Err(Error::WidthOverflow {
                index: 1,
                width: 1 << 31
            })
        );
        let b = build(0, 0, &[1], &[fix_word(0), fix_word(-(4 << 20))]);
        assert!(FontMetrics::load(&b, scale).is_ok());
        let b = build(0, 0, &[1], &[fix_word(0), fix_word(-(5 << 20))]);
        assert!(matches!(
            FontMetrics::load(&b, scale),
            Err(Error::WidthOverflow { index: 1, .. })
        ));
    }

    #[test]
    fn reject_out_of_range_scale() {
        let b = build(0, 0, &[1], &[fix_word(0), fix_word(1)]);
        for at_size in [0, -5, 1 << 30] {
            let scale = Scale { at_size, ..SCALE };
            assert_eq!(
                FontMetrics::load(&b, scale),
                Err(Error::InvalidScale(at_size))
            );
        }
    }
}
