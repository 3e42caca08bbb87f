//! Interpretation of the commands of one page.
//!
//! The interpreter keeps two versions of each position:
//!     the exact position `h`/`v` in DVI units,
//!     and the pixel position `hh`/`vv` that a device driver would use.
//! Small movements are rounded individually and added to the pixel position,
//!     so that the spacing of the characters in a word is uniform.
//! Large movements (word spaces, line breaks) resynchronize the pixel position
//!     with the rounded exact position.
//! In both cases the pixel position is never allowed to drift more than
//!     [`MAX_DRIFT`] pixels from the rounded exact position.

use crate::error::{Error, PageFault, Warning};
use crate::fonts::{DefinitionContext, FontDef, FontHandle, FontLocator};
use crate::Context;
use dvi::{opcode, Op, Var};
use std::io::Write;

/// Maximum distance in pixels between `hh` and the rounded value of `h`,
///     and between `vv` and the rounded value of `v`.
pub const MAX_DRIFT: i32 = 2;

/// Maximum absolute value of `h` and `v`.
pub const MAX_POSITION: i64 = (1 << 30) - 1;

/// The registers of the DVI machine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub h: i32,
    pub v: i32,
    pub w: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub hh: i32,
    pub vv: i32,
}

impl Registers {
    fn var(&mut self, var: Var) -> &mut i32 {
        match var {
            Var::W => &mut self.w,
            Var::X => &mut self.x,
            Var::Y => &mut self.y,
            Var::Z => &mut self.z,
        }
    }
}

/// The current registers and the stack of saved registers.
#[derive(Debug, Default, Clone)]
pub struct PositionState {
    pub current: Registers,
    stack: Vec<Registers>,
}

impl PositionState {
    /// The number of saved register sets.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn push(&mut self) {
        self.stack.push(self.current);
    }

    fn pop(&mut self) -> bool {
        match self.stack.pop() {
            None => false,
            Some(registers) => {
                self.current = registers;
                true
            }
        }
    }

    fn reset(&mut self) {
        self.current = Default::default();
        self.stack.clear();
    }
}

/// Declared and observed extremes of the positions and the stack depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Maxima {
    /// The declared maximum |h|.
    ///
    /// This is raised if a page exceeds it by more than 99 units.
    pub max_h: i32,
    pub max_v: i32,
    pub max_s: usize,
    pub max_h_so_far: i32,
    pub max_v_so_far: i32,
    pub max_s_so_far: usize,
}

impl Maxima {
    /// Maxima that are never exceeded, used before the postamble has been read.
    pub fn unbounded(stack_size: usize) -> Maxima {
        Maxima {
            max_h: i32::MAX - 99,
            max_v: i32::MAX - 99,
            max_s: stack_size + 1,
            max_h_so_far: 0,
            max_v_so_far: 0,
            max_s_so_far: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrentFont {
    None,
    Undefined,
    Font(FontHandle),
}

/// How the interpretation of a page ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page ended with `eop`.
    Completed,
    /// A structural problem stopped interpretation before `eop`.
    Aborted(PageFault),
}

pub struct PageInterpreter {
    state: PositionState,
    font: CurrentFont,
    stack_size: usize,
    pub maxima: Maxima,
}

impl PageInterpreter {
    pub fn new(stack_size: usize) -> PageInterpreter {
        PageInterpreter {
            state: Default::default(),
            font: CurrentFont::None,
            stack_size,
            maxima: Maxima::unbounded(stack_size),
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    /// Interpret the commands of a page, starting at the cursor.
    ///
    /// The cursor must be positioned just after the page's `bop` command.
    /// On success the cursor is positioned just after the `eop` command.
    pub fn run<W: Write, L: FontLocator>(
        &mut self,
        ctx: &mut Context<W, L>,
    ) -> Result<PageOutcome, Error> {
        self.state.reset();
        self.font = CurrentFont::None;
        loop {
            let a = ctx.cursor.position();
            ctx.trace.start_command();
            let op_code = ctx.cursor.u8()?;
            if let Some(fault) = structural_fault(a, op_code) {
                ctx.trace.fault(a, &fault)?;
                return Ok(PageOutcome::Aborted(fault));
            }
            let op = Op::read_payload(op_code, &mut ctx.cursor)?;
            if op == Op::EndPage {
                ctx.trace.major(a, format_args!("eop"))?;
                if self.state.depth() != 0 {
                    ctx.trace
                        .error(a, Warning::StackNotEmptyAtEop(self.state.depth()))?;
                }
                ctx.trace.line(format_args!(""))?;
                return Ok(PageOutcome::Completed);
            }
            if let Some(fault) = self.execute(ctx, a, op_code, op)? {
                ctx.trace.fault(a, &fault)?;
                return Ok(PageOutcome::Aborted(fault));
            }
            ctx.trace.end_command()?;
        }
    }

    fn execute<W: Write, L: FontLocator>(
        &mut self,
        ctx: &mut Context<W, L>,
        a: u64,
        op_code: u8,
        op: Op,
    ) -> Result<Option<PageFault>, Error> {
        match op {
            Op::TypesetChar { char, move_h } => {
                if op_code < opcode::SET1 {
                    if op_code > b' ' && op_code <= b'~' {
                        ctx.trace.out_text(op_code)?;
                        ctx.trace.minor(a, format_args!("setchar{char}"))?;
                    } else {
                        ctx.trace.major(a, format_args!("setchar{char}"))?;
                    }
                } else if move_h {
                    let k = op_code - opcode::SET1 + 1;
                    ctx.trace.major(a, format_args!("set{k} {char}"))?;
                } else {
                    let k = op_code - opcode::PUT1 + 1;
                    ctx.trace.major(a, format_args!("put{k} {char}"))?;
                }
                self.typeset_char(ctx, a, char, move_h)?;
            }
            Op::TypesetRule {
                height,
                width,
                move_h,
            } => {
                let name = if move_h { "setrule" } else { "putrule" };
                ctx.trace.major(a, format_args!("{name}"))?;
                ctx.trace
                    .shown(format_args!(" height {height}, width {width}"))?;
                if height <= 0 || width <= 0 {
                    ctx.trace.detail(format_args!(" (invisible)"))?;
                } else {
                    ctx.trace.detail(format_args!(
                        " ({}x{} pixels)",
                        ctx.conversions.rule_pixels(height),
                        ctx.conversions.rule_pixels(width)
                    ))?;
                }
                if move_h {
                    ctx.trace.detail(format_args!("\n"))?;
                    let s = &mut self.state.current;
                    s.hh = s.hh.saturating_add(ctx.conversions.rule_pixels(width));
                    self.move_right(ctx, a, width)?;
                }
            }
            Op::NoOp => {
                ctx.trace.minor(a, format_args!("nop"))?;
            }
            Op::Push => {
                ctx.trace.major(a, format_args!("push"))?;
                let s = self.state.depth();
                if s == self.maxima.max_s_so_far {
                    self.maxima.max_s_so_far = s + 1;
                    if s == self.maxima.max_s {
                        ctx.trace.error(a, Warning::DeeperThanClaimed)?;
                    }
                }
                if s >= self.stack_size {
                    return Ok(Some(PageFault::StackOverflow {
                        offset: a,
                        capacity: self.stack_size,
                    }));
                }
                self.state.push();
                self.show_state(ctx, s)?;
            }
            Op::Pop => {
                ctx.trace.major(a, format_args!("pop"))?;
                if !self.state.pop() {
                    ctx.trace.error(a, Warning::StackUnderflow)?;
                }
                self.show_state(ctx, self.state.depth())?;
            }
            Op::Right(p) => {
                let k = op_code - opcode::RIGHT1 + 1;
                self.horizontal(ctx, a, p, format_args!("right{k} {p}"))?;
            }
            Op::Down(p) => {
                let k = op_code - opcode::DOWN1 + 1;
                self.vertical(ctx, a, p, format_args!("down{k} {p}"))?;
            }
            Op::Move(var) => {
                let p = *self.state.current.var(var);
                self.move_var(ctx, a, var, 0, p)?;
            }
            Op::SetVar(var, p) => {
                *self.state.current.var(var) = p;
                let k = op_code - var_op_code(var);
                self.move_var(ctx, a, var, k, p)?;
            }
            Op::EnableFont(number) => {
                if op_code < opcode::FNT1 {
                    ctx.trace.major(a, format_args!("fntnum{number}"))?;
                } else {
                    let k = op_code - opcode::FNT1 + 1;
                    ctx.trace.major(a, format_args!("fnt{k} {number}"))?;
                }
                match ctx.fonts.get(number) {
                    None => {
                        self.font = CurrentFont::Undefined;
                        ctx.trace.error(a, Warning::UndefinedFont(number))?;
                    }
                    Some(handle) => {
                        self.font = CurrentFont::Font(handle);
                        if !ctx.fonts.font(handle).is_usable() {
                            ctx.trace.error(a, Warning::UnusableFont(number))?;
                        }
                    }
                }
                let name = self.font_name(ctx);
                ctx.trace.detail(format_args!(" current font is {name}"))?;
            }
            Op::Extension(b) => {
                ctx.trace.major(a, format_args!("xxx '"))?;
                ctx.trace.shown_bytes(&b)?;
                ctx.trace.shown(format_args!("'"))?;
                if b.iter().any(|c| !(b' '..=b'~').contains(c)) {
                    ctx.trace.error(a, Warning::NonAsciiSpecial)?;
                }
            }
            Op::NegativeExtension(n) => {
                ctx.trace.major(a, format_args!("xxx '"))?;
                ctx.trace.error(a, Warning::InvalidLength(n))?;
                ctx.trace.shown(format_args!("'"))?;
            }
            op @ Op::DefineFont { .. } => {
                let k = op_code - opcode::FNT_DEF1 + 1;
                let Some(def) = FontDef::from_op(op) else {
                    return Ok(None);
                };
                ctx.trace
                    .major(a, format_args!("fntdef{k} {}", def.number))?;
                ctx.define_font(&def, DefinitionContext::Page)?;
                if !ctx.trace.showing() {
                    ctx.trace.line(format_args!(""))?;
                }
            }
            Op::EndPage
            | Op::BeginPage { .. }
            | Op::Preamble { .. }
            | Op::BeginPostamble { .. }
            | Op::EndPostamble { .. }
            | Op::Undefined(_) => return Ok(structural_fault(a, op_code)),
        }
        Ok(None)
    }

    fn typeset_char<W: Write, L: FontLocator>(
        &mut self,
        ctx: &mut Context<W, L>,
        a: u64,
        char: i32,
        move_h: bool,
    ) -> Result<(), Error> {
        let c = fold_char(char);
        let width = match self.font {
            CurrentFont::Font(handle) => ctx.fonts.font(handle).width(c),
            _ => None,
        };
        let q = match width {
            Some(width) => {
                if move_h {
                    let s = &mut self.state.current;
                    s.hh = s.hh.saturating_add(width.pixels);
                }
                width.width
            }
            None => {
                let warning = match self.font {
                    CurrentFont::Font(handle) => Warning::UndefinedCharacter {
                        char: c,
                        font: ctx.fonts.font(handle).display_name(),
                    },
                    _ => Warning::NoFontSelected { char: c },
                };
                ctx.trace.error(a, warning)?;
                0
            }
        };
        if move_h {
            self.move_right(ctx, a, q)?;
        }
        Ok(())
    }

    fn move_var<W: Write, L: FontLocator>(
        &mut self,
        ctx: &mut Context<W, L>,
        a: u64,
        var: Var,
        k: u8,
        p: i32,
    ) -> Result<(), Error> {
        let name = var.name();
        if var.is_horizontal() {
            self.horizontal(ctx, a, p, format_args!("{name}{k} {p}"))
        } else {
            self.vertical(ctx, a, p, format_args!("{name}{k} {p}"))
        }
    }

    /// The movement threshold of the current font.
    fn space<W, L>(&self, ctx: &Context<W, L>) -> i64 {
        match self.font {
            CurrentFont::Font(handle) => ctx.fonts.font(handle).space.into(),
            _ => 0,
        }
    }

    fn font_name<W, L>(&self, ctx: &Context<W, L>) -> String {
        match self.font {
            CurrentFont::Font(handle) => ctx.fonts.font(handle).display_name(),
            _ => "UNDEFINED!".to_string(),
        }
    }

    fn horizontal<W: Write, L: FontLocator>(
        &mut self,
        ctx: &mut Context<W, L>,
        a: u64,
        p: i32,
        mnemonic: std::fmt::Arguments,
    ) -> Result<(), Error> {
        let space = self.space(ctx);
        let p_64 = i64::from(p);
        let s = &mut self.state.current;
        if p_64 >= space || p_64 <= -4 * space {
            ctx.trace.out_text(b' ')?;
            s.hh = ctx.conversions.pixel_round(i64::from(s.h) + p_64);
        } else {
            s.hh = s.hh.saturating_add(ctx.conversions.pixel_round(p_64));
        }
        ctx.trace.minor(a, mnemonic)?;
        self.move_right(ctx, a, p)
    }

    fn vertical<W: Write, L: FontLocator>(
        &mut self,
        ctx: &mut Context<W, L>,
        a: u64,
        p: i32,
        mnemonic: std::fmt::Arguments,
    ) -> Result<(), Error> {
        let space = self.space(ctx);
        let p_64 = i64::from(p);
        let s = &mut self.state.current;
        if p_64.abs() >= 5 * space {
            s.vv = ctx.conversions.pixel_round(i64::from(s.v) + p_64);
        } else {
            s.vv = s.vv.saturating_add(ctx.conversions.pixel_round(p_64));
        }
        ctx.trace.major(a, mnemonic)?;
        self.move_down(ctx, a, p)
    }

    fn move_right<W: Write, L: FontLocator>(
        &mut self,
        ctx: &mut Context<W, L>,
        a: u64,
        q: i32,
    ) -> Result<(), Error> {
        let h = i64::from(self.state.current.h);
        let q = clamp_movement(ctx, a, h, q)?;
        let hh = drift(ctx.conversions.pixel_round(h + q), self.state.current.hh);
        let sign = if q >= 0 { "+" } else { "" };
        ctx.trace
            .detail(format_args!(" h:={h}{sign}{q}={}, hh:={hh}", h + q))?;
        let h = h + q;
        self.state.current.h = h as i32;
        self.state.current.hh = hh;
        let abs = h.abs() as i32;
        if abs > self.maxima.max_h_so_far {
            if i64::from(abs) > i64::from(self.maxima.max_h) + 99 {
                ctx.trace.error(a, Warning::ExceedsMaxH(self.maxima.max_h))?;
                self.maxima.max_h = abs;
            }
            self.maxima.max_h_so_far = abs;
        }
        Ok(())
    }

    fn move_down<W: Write, L: FontLocator>(
        &mut self,
        ctx: &mut Context<W, L>,
        a: u64,
        p: i32,
    ) -> Result<(), Error> {
        let v = i64::from(self.state.current.v);
        let p = clamp_movement(ctx, a, v, p)?;
        let vv = drift(ctx.conversions.pixel_round(v + p), self.state.current.vv);
        let sign = if p >= 0 { "+" } else { "" };
        ctx.trace
            .detail(format_args!(" v:={v}{sign}{p}={}, vv:={vv}", v + p))?;
        let v = v + p;
        self.state.current.v = v as i32;
        self.state.current.vv = vv;
        let abs = v.abs() as i32;
        if abs > self.maxima.max_v_so_far {
            if i64::from(abs) > i64::from(self.maxima.max_v) + 99 {
                ctx.trace.error(a, Warning::ExceedsMaxV(self.maxima.max_v))?;
                self.maxima.max_v = abs;
            }
            self.maxima.max_v_so_far = abs;
        }
        Ok(())
    }

    fn show_state<W: Write, L>(&self, ctx: &mut Context<W, L>, level: usize) -> Result<(), Error> {
        let Registers {
            h,
            v,
            w,
            x,
            y,
            z,
            hh,
            vv,
        } = self.state.current;
        ctx.trace.detail(format_args!(
            "\nlevel {level}:(h={h},v={v},w={w},x={x},y={y},z={z},hh={hh},vv={vv})"
        ))?;
        Ok(())
    }
}

/// Returns the fault for op codes that may not appear within a page.
fn structural_fault(offset: u64, op_code: u8) -> Option<PageFault> {
    match op_code {
        opcode::BOP => Some(PageFault::BeginPageBeforeEndPage { offset }),
        opcode::PRE => Some(PageFault::Preamble { offset }),
        opcode::POST | opcode::POST_POST => Some(PageFault::Postamble { offset }),
        250..=255 => Some(PageFault::UndefinedOpCode { offset, op_code }),
        _ => None,
    }
}

/// The op code of the zero-parameter form of a movement by a variable.
fn var_op_code(var: Var) -> u8 {
    match var {
        Var::W => opcode::W0,
        Var::X => opcode::X0,
        Var::Y => opcode::Y0,
        Var::Z => opcode::Z0,
    }
}

/// Folds a character code into the range 0 to 255.
fn fold_char(c: i32) -> i32 {
    if c < 0 {
        255 - ((-1 - c) % 256)
    } else {
        c % 256
    }
}

/// Clamps a movement so that the new position stays within [`MAX_POSITION`].
fn clamp_movement<W: Write, L>(
    ctx: &mut Context<W, L>,
    a: u64,
    position: i64,
    delta: i32,
) -> Result<i64, Error> {
    let delta = i64::from(delta);
    let clamped = (position + delta).clamp(-MAX_POSITION, MAX_POSITION) - position;
    if clamped != delta {
        ctx.trace.error(
            a,
            Warning::ArithmeticOverflow {
                original: delta,
                clamped,
            },
        )?;
    }
    Ok(clamped)
}

/// Limits the distance between the pixel position and the rounded exact position.
fn drift(rounded: i32, pixels: i32) -> i32 {
    let (rounded_64, pixels_64) = (i64::from(rounded), i64::from(pixels));
    if (rounded_64 - pixels_64).abs() <= i64::from(MAX_DRIFT) {
        pixels
    } else if rounded > pixels {
        rounded - MAX_DRIFT
    } else {
        rounded + MAX_DRIFT
    }
}
