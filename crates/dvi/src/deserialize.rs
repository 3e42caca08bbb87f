use super::*;

pub fn deserialize(op_code: u8, d: &mut ByteCursor) -> Result<Op, InvalidDviData> {
    let op = match op_code {
        0..128 => Op::TypesetChar {
            char: op_code as i32,
            move_h: true,
        },
        128..132 => Op::TypesetChar {
            char: unsigned(op_code - 128, d)?,
            move_h: true,
        },
        132 => Op::TypesetRule {
            height: d.i32()?,
            width: d.i32()?,
            move_h: true,
        },
        133..137 => Op::TypesetChar {
            char: unsigned(op_code - 133, d)?,
            move_h: false,
        },
        137 => Op::TypesetRule {
            height: d.i32()?,
            width: d.i32()?,
            move_h: false,
        },
        138 => Op::NoOp,
        139 => {
            let mut parameters = [0_i32; 10];
            for parameter in &mut parameters {
                *parameter = d.i32()?;
            }
            Op::BeginPage {
                parameters,
                previous_begin_page: d.i32()?,
            }
        }
        140 => Op::EndPage,
        141 => Op::Push,
        142 => Op::Pop,
        143..147 => Op::Right(signed(op_code - 143, d)?),
        147 => Op::Move(Var::W),
        148..152 => Op::SetVar(Var::W, signed(op_code - 148, d)?),
        152 => Op::Move(Var::X),
        153..157 => Op::SetVar(Var::X, signed(op_code - 153, d)?),
        157..161 => Op::Down(signed(op_code - 157, d)?),
        161 => Op::Move(Var::Y),
        162..166 => Op::SetVar(Var::Y, signed(op_code - 162, d)?),
        166 => Op::Move(Var::Z),
        167..171 => Op::SetVar(Var::Z, signed(op_code - 167, d)?),
        171..235 => Op::EnableFont((op_code - 171) as i32),
        235..239 => Op::EnableFont(unsigned(op_code - 235, d)?),
        239..243 => {
            let n = unsigned(op_code - 239, d)?;
            match usize::try_from(n) {
                Ok(n) => Op::Extension(d.bytes(n)?.to_vec()),
                Err(_) => Op::NegativeExtension(n),
            }
        }
        243..247 => {
            let number = unsigned(op_code - 243, d)?;
            font_def(number, d)?
        }
        247 => Op::Preamble {
            dvi_format: d.u8()?,
            unit_numerator: d.i32()?,
            unit_denominator: d.i32()?,
            magnification: d.i32()?,
            comment: string(d)?,
        },
        248 => Op::BeginPostamble {
            final_begin_page: d.i32()?,
            unit_numerator: d.i32()?,
            unit_denominator: d.i32()?,
            magnification: d.i32()?,
            largest_height: d.i32()?,
            largest_width: d.i32()?,
            max_stack_depth: d.u16()?,
            num_pages: d.u16()?,
        },
        249 => {
            let postamble = d.i32()?;
            let dvi_format = d.u8()?;
            let mut num_end_bytes = 0;
            while !d.at_end() {
                let pos = d.position();
                if d.u8()? != SIGNATURE_BYTE {
                    d.seek(pos);
                    break;
                }
                num_end_bytes += 1;
            }
            Op::EndPostamble {
                postamble,
                dvi_format,
                num_223_bytes: num_end_bytes,
            }
        }
        250..=255 => Op::Undefined(op_code),
    };
    Ok(op)
}

/// Reads a 1, 2 or 3 byte unsigned parameter, or a 4 byte signed parameter.
///
/// The argument is the number of bytes minus one.
fn unsigned(k: u8, d: &mut ByteCursor) -> Result<i32, InvalidDviData> {
    Ok(match k {
        0 => d.u8()?.into(),
        1 => d.u16()?.into(),
        // a 24-bit value always fits in an i32
        2 => d.u24()? as i32,
        _ => d.i32()?,
    })
}

/// Reads a 1, 2, 3 or 4 byte signed parameter.
fn signed(k: u8, d: &mut ByteCursor) -> Result<i32, InvalidDviData> {
    Ok(match k {
        0 => d.i8()?.into(),
        1 => d.i16()?.into(),
        2 => d.i24()?,
        _ => d.i32()?,
    })
}

fn string(d: &mut ByteCursor) -> Result<Vec<u8>, InvalidDviData> {
    let l = d.u8()?;
    Ok(d.bytes(l.into())?.to_vec())
}

fn font_def(number: i32, d: &mut ByteCursor) -> Result<Op, InvalidDviData> {
    let checksum = d.u32()?;
    let at_size = d.i32()?;
    let design_size = d.i32()?;
    let area_l = d.u8()?;
    let name_l = d.u8()?;
    Ok(Op::DefineFont {
        number,
        checksum,
        at_size,
        design_size,
        area: d.bytes(area_l.into())?.to_vec(),
        name: d.bytes(name_l.into())?.to_vec(),
    })
}
