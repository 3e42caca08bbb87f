//! Traversal of a DVI file: preamble, pages and postamble.

use crate::convert::Conversions;
use crate::error::{BadPreamble, BadTrailer, Error, Warning};
use crate::fonts::{DefinitionContext, FontDef, FontLocator, FontTable, ReadMode};
use crate::options::Options;
use crate::page::{PageInterpreter, PageOutcome};
use crate::trace::Trace;
use crate::{Context, Summary};
use dvi::{opcode, Op, ID_BYTE, SIGNATURE_BYTE};
use std::io::Write;

/// The shortest possible DVI file with a postamble.
const MIN_FILE_LENGTH: u64 = 53;

/// Where a page starts in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// The values of `\count0` to `\count9`.
    pub counts: [i32; 10],
    /// Offset of the page's `bop` command.
    pub offset: u64,
    /// Offset of the previous page's `bop` command, or -1 for the first page.
    pub backpointer: i32,
}

pub struct DocumentNavigator<'a, W, L> {
    ctx: Context<'a, W, L>,
    options: Options,
    interpreter: PageInterpreter,
    in_postamble: bool,
    started: bool,
    /// Offset of the last `bop` seen, or -1.
    old_backpointer: i64,
    /// The page most recently found by [`DocumentNavigator::scan_bop`].
    current_page: Option<PageRecord>,
    page_count: usize,
    pages: Vec<PageRecord>,
    after_pre: u64,
    post_loc: u64,
    total_pages: u16,
}

impl<'a, W: Write, L: FontLocator> DocumentNavigator<'a, W, L> {
    pub fn new(data: &'a [u8], options: Options, locator: L, out: W) -> Self {
        let mode = if options.random_access {
            ReadMode::RandomAccess
        } else {
            ReadMode::Sequential
        };
        let stack_size = options.capacities.stack_size;
        DocumentNavigator {
            ctx: Context {
                cursor: dvi::ByteCursor::new(data),
                trace: Trace::new(out, options.out_mode),
                fonts: FontTable::new(options.capacities, mode),
                locator,
                conversions: Default::default(),
            },
            options,
            interpreter: PageInterpreter::new(stack_size),
            in_postamble: false,
            started: false,
            old_backpointer: -1,
            current_page: None,
            page_count: 0,
            pages: vec![],
            after_pre: 0,
            post_loc: 0,
            total_pages: 0,
        }
    }

    /// Process the whole file.
    pub fn run(mut self) -> Result<Summary, Error> {
        self.print_options()?;
        self.read_preamble()?;
        if self.options.random_access {
            self.find_postamble()?;
            self.find_start_page()?;
        }
        if !self.in_postamble {
            self.skip_pages(false)?;
        }
        let mut pages_rendered = 0_usize;
        if !self.in_postamble {
            for _ in 0..self.options.max_pages {
                let Some(page) = self.current_page.clone() else {
                    break;
                };
                let trace = &mut self.ctx.trace;
                let offset = page.offset;
                trace.line(format_args!(""))?;
                trace.print(format_args!("{offset}: beginning of page "))?;
                let n = self.options.page_start.len().clamp(1, 10);
                for (i, count) in page.counts[..n].iter().enumerate() {
                    if i > 0 {
                        trace.print(format_args!("."))?;
                    }
                    trace.print(format_args!("{count}"))?;
                }
                trace.line(format_args!(""))?;
                tracing::trace!(offset = page.offset, counts = ?page.counts, "interpreting page");
                match self.interpreter.run(&mut self.ctx)? {
                    PageOutcome::Completed => {}
                    PageOutcome::Aborted(fault) => {
                        return Err(Error::PageEndedUnexpectedly {
                            page: page.offset,
                            fault,
                        });
                    }
                }
                pages_rendered += 1;
                self.scan_bop()?;
                if self.in_postamble {
                    break;
                }
            }
        }
        if !self.options.random_access {
            if !self.in_postamble {
                self.skip_pages(true)?;
            }
            self.read_postamble()?;
        }
        self.ctx.trace.flush()?;
        Ok(Summary {
            pages: self.pages,
            page_count: self.page_count,
            pages_rendered,
            total_pages: self.total_pages,
            postamble_offset: self.post_loc,
            conversions: self.ctx.conversions,
            maxima: self.interpreter.maxima,
            warnings: self.ctx.trace.into_warnings(),
        })
    }

    fn print_options(&mut self) -> Result<(), Error> {
        let trace = &mut self.ctx.trace;
        let options = &self.options;
        trace.line(format_args!("This is DVItype, Version 3.6"))?;
        trace.line(format_args!("Options selected:"))?;
        trace.line(format_args!("  Starting page = {}", options.page_start))?;
        trace.line(format_args!(
            "  Maximum number of pages = {}",
            options.max_pages
        ))?;
        trace.line(format_args!(
            "  Output level = {} ({})",
            options.out_mode as u8,
            options.out_mode.description()
        ))?;
        trace.line(format_args!(
            "  Resolution = {:12.8} pixels per inch",
            options.resolution
        ))?;
        if let Some(new_mag) = options.new_mag {
            trace.line(format_args!(
                "  New magnification factor = {:8.3}",
                f64::from(new_mag) / 1000.0
            ))?;
        }
        Ok(())
    }

    fn read_preamble(&mut self) -> Result<(), Error> {
        let op_code = self.ctx.cursor.u8()?;
        if op_code != opcode::PRE {
            return Err(Error::BadPreamble(BadPreamble::NotPreamble(op_code)));
        }
        let Op::Preamble {
            dvi_format,
            unit_numerator: numerator,
            unit_denominator: denominator,
            magnification,
            comment,
        } = Op::read_payload(op_code, &mut self.ctx.cursor)?
        else {
            return Err(Error::BadPreamble(BadPreamble::NotPreamble(op_code)));
        };
        if dvi_format != ID_BYTE {
            return Err(Error::BadPreamble(BadPreamble::IdByte(dvi_format)));
        }
        if numerator <= 0 {
            return Err(Error::BadPreamble(BadPreamble::Numerator(numerator)));
        }
        if denominator <= 0 {
            return Err(Error::BadPreamble(BadPreamble::Denominator(denominator)));
        }
        let trace = &mut self.ctx.trace;
        trace.line(format_args!(
            "numerator/denominator={numerator}/{denominator}"
        ))?;
        let mag = match self.options.new_mag {
            Some(new_mag) if new_mag > 0 => new_mag,
            _ => magnification,
        };
        if mag <= 0 {
            return Err(Error::BadPreamble(BadPreamble::Magnification(mag)));
        }
        let conversions = Conversions::new(numerator, denominator, mag, self.options.resolution);
        trace.line(format_args!(
            "magnification={mag}; {:16.8} pixels per DVI unit",
            conversions.conv
        ))?;
        trace.print(format_args!("'"))?;
        trace.print(format_args!("{}", String::from_utf8_lossy(&comment)))?;
        trace.line(format_args!("'"))?;
        self.ctx.conversions = conversions;
        self.after_pre = self.ctx.cursor.position();
        tracing::debug!(numerator, denominator, mag, after_pre = self.after_pre, "read preamble");
        Ok(())
    }

    /// Find the postamble from the end of the file and read it.
    fn find_postamble(&mut self) -> Result<(), Error> {
        let cursor = &mut self.ctx.cursor;
        let n = cursor.len();
        if n < MIN_FILE_LENGTH {
            return Err(Error::BadTrailer(BadTrailer::TooShort(n)));
        }
        let mut m = n - 4;
        let k = loop {
            if m == 0 {
                return Err(Error::BadTrailer(BadTrailer::AllSignatureBytes));
            }
            cursor.seek(m);
            let k = cursor.u8()?;
            if k != SIGNATURE_BYTE {
                break k;
            }
            m -= 1;
        };
        if k != ID_BYTE {
            return Err(Error::BadTrailer(BadTrailer::IdByte {
                offset: m,
                byte: k,
            }));
        }
        let pointer_offset = m.saturating_sub(4);
        cursor.seek(pointer_offset);
        let q = cursor.i32()?;
        if q < 0 || i64::from(q) > m as i64 - 34 {
            return Err(Error::BadPostPointer {
                pointer: q,
                offset: pointer_offset,
            });
        }
        cursor.seek(q as u64);
        if cursor.u8()? != opcode::POST {
            return Err(Error::BadPostPointer {
                pointer: q,
                offset: pointer_offset,
            });
        }
        tracing::debug!(offset = q, "found postamble");
        self.post_loc = q as u64;
        self.in_postamble = true;
        self.read_postamble()?;
        self.in_postamble = false;
        Ok(())
    }

    /// Follow the backpointers from the postamble to find the start page.
    fn find_start_page(&mut self) -> Result<(), Error> {
        let mut q = self.post_loc as i64;
        let mut p = self.old_backpointer;
        if p < 0 {
            self.in_postamble = true;
            return self.check_page_count(0);
        }
        let mut start_loc: Option<u64> = None;
        let mut page_count = 0_usize;
        while p >= 0 {
            if p > q - 46 {
                return Err(Error::BadPageLink {
                    pointer: p,
                    from: q as u64,
                });
            }
            q = p;
            self.ctx.cursor.seek(q as u64);
            let op_code = self.ctx.cursor.u8()?;
            if op_code != opcode::BOP {
                return Err(Error::BadPageLink {
                    pointer: p,
                    from: q as u64,
                });
            }
            let Op::BeginPage {
                parameters,
                previous_begin_page,
            } = Op::read_payload(op_code, &mut self.ctx.cursor)?
            else {
                return Err(Error::BadPageLink {
                    pointer: p,
                    from: q as u64,
                });
            };
            page_count += 1;
            p = previous_begin_page.into();
            if self.options.page_start.matches(&parameters) {
                start_loc = Some(q as u64);
                self.old_backpointer = p;
            }
        }
        let Some(mut start_loc) = start_loc else {
            return Err(Error::StartPageNotFound);
        };
        if self.old_backpointer < 0 {
            start_loc = self.after_pre;
        }
        tracing::debug!(start_loc, page_count, "found start page");
        self.ctx.cursor.seek(start_loc);
        self.check_page_count(page_count)
    }

    fn check_page_count(&mut self, page_count: usize) -> Result<(), Error> {
        self.page_count = page_count;
        if page_count != usize::from(self.total_pages) {
            self.ctx.trace.warn(Warning::PageCount {
                actual: page_count,
                declared: self.total_pages,
            })?;
        }
        Ok(())
    }

    /// Read font definitions and nops up to the next `bop` or `post` command.
    ///
    /// If a page is found it becomes the current page.
    fn scan_bop(&mut self) -> Result<(), Error> {
        let (offset, op_code) = loop {
            let offset = self.ctx.cursor.position();
            let op_code = self.ctx.cursor.u8()?;
            if op_code == opcode::NOP {
                continue;
            }
            if !(opcode::FNT_DEF1..opcode::FNT_DEF1 + 4).contains(&op_code) {
                break (offset, op_code);
            }
            self.define_font(op_code, DefinitionContext::Page)?;
        };
        if op_code == opcode::POST {
            self.in_postamble = true;
            self.post_loc = offset;
            self.current_page = None;
            return Ok(());
        }
        if op_code != opcode::BOP {
            return Err(Error::ExpectedBeginPage { offset, op_code });
        }
        let Op::BeginPage {
            parameters,
            previous_begin_page,
        } = Op::read_payload(op_code, &mut self.ctx.cursor)?
        else {
            return Err(Error::ExpectedBeginPage { offset, op_code });
        };
        if !self.options.random_access {
            self.page_count += 1;
        }
        if i64::from(previous_begin_page) != self.old_backpointer {
            self.ctx.trace.warn(Warning::BadBackpointer {
                offset: offset + 41,
                expected: self.old_backpointer,
                found: previous_begin_page,
            })?;
        }
        self.old_backpointer = offset as i64;
        let page = PageRecord {
            counts: parameters,
            offset,
            backpointer: previous_begin_page,
        };
        self.pages.push(page.clone());
        self.current_page = Some(page);
        Ok(())
    }

    /// Skip pages until the start page or the postamble.
    ///
    /// If `bop_seen` is true the first page has already been scanned and is skipped.
    /// Once the start page has been found, every remaining page is skipped.
    fn skip_pages(&mut self, mut bop_seen: bool) -> Result<(), Error> {
        loop {
            if !bop_seen {
                self.scan_bop()?;
                if self.in_postamble {
                    return Ok(());
                }
                if !self.started {
                    if let Some(page) = &self.current_page {
                        if self.options.page_start.matches(&page.counts) {
                            self.started = true;
                            return Ok(());
                        }
                    }
                }
            }
            loop {
                let offset = self.ctx.cursor.position();
                let op_code = self.ctx.cursor.u8()?;
                match op_code {
                    opcode::EOP => break,
                    opcode::BOP | opcode::PRE | opcode::POST | opcode::POST_POST | 250..=255 => {
                        return Err(Error::IllegalCommand { offset, op_code });
                    }
                    _ if (opcode::FNT_DEF1..opcode::FNT_DEF1 + 4).contains(&op_code) => {
                        self.define_font(op_code, DefinitionContext::Page)?;
                    }
                    _ => {
                        Op::read_payload(op_code, &mut self.ctx.cursor)?;
                    }
                }
            }
            bop_seen = false;
        }
    }

    /// Read the payload of a font definition and process it, ending the line.
    fn define_font(&mut self, op_code: u8, context: DefinitionContext) -> Result<(), Error> {
        let op = Op::read_payload(op_code, &mut self.ctx.cursor)?;
        if let Some(def) = FontDef::from_op(op) {
            self.ctx.trace.start_command();
            self.ctx.define_font(&def, context)?;
            self.ctx.trace.line(format_args!(""))?;
        }
        Ok(())
    }

    /// Read and check the postamble, starting at its `post` command.
    fn read_postamble(&mut self) -> Result<(), Error> {
        self.ctx.cursor.seek(self.post_loc);
        let op_code = self.ctx.cursor.u8()?;
        let Op::BeginPostamble {
            final_begin_page,
            unit_numerator,
            unit_denominator,
            magnification,
            largest_height,
            largest_width,
            max_stack_depth,
            num_pages,
        } = Op::read_payload(op_code, &mut self.ctx.cursor)?
        else {
            return Err(Error::BadPostPointer {
                pointer: self.post_loc as i32,
                offset: self.post_loc,
            });
        };
        let random_access = self.options.random_access;
        if random_access {
            self.old_backpointer = final_begin_page.into();
        } else if i64::from(final_begin_page) != self.old_backpointer {
            self.ctx.trace.warn(Warning::BadBackpointer {
                offset: self.post_loc + 1,
                expected: self.old_backpointer,
                found: final_begin_page,
            })?;
        }
        let trace = &mut self.ctx.trace;
        trace.line(format_args!("Postamble starts at byte {}.", self.post_loc))?;
        let conversions = self.ctx.conversions;
        if unit_numerator != conversions.numerator {
            trace.warn(Warning::NumeratorMismatch)?;
        }
        if unit_denominator != conversions.denominator {
            trace.warn(Warning::DenominatorMismatch)?;
        }
        if magnification != conversions.mag && self.options.new_mag.is_none() {
            trace.warn(Warning::MagnificationMismatch)?;
        }
        trace.line(format_args!(
            "maxv={largest_height}, maxh={largest_width}, \
             maxstackdepth={max_stack_depth}, totalpages={num_pages}"
        ))?;
        self.total_pages = num_pages;
        let maxima = &mut self.interpreter.maxima;
        if !random_access {
            // Positions may exceed the declared maxima by up to 99 units.
            if i64::from(maxima.max_v_so_far) > i64::from(largest_height) + 99 {
                trace.warn(Warning::ObservedMaxV(maxima.max_v_so_far))?;
            }
            if i64::from(maxima.max_h_so_far) > i64::from(largest_width) + 99 {
                trace.warn(Warning::ObservedMaxH(maxima.max_h_so_far))?;
            }
            if maxima.max_s_so_far > usize::from(max_stack_depth) {
                trace.warn(Warning::ObservedMaxStackDepth(maxima.max_s_so_far))?;
            }
            if self.page_count != usize::from(num_pages) {
                trace.warn(Warning::PageCount {
                    actual: self.page_count,
                    declared: num_pages,
                })?;
            }
        }
        maxima.max_v = largest_height;
        maxima.max_h = largest_width;
        maxima.max_s = max_stack_depth.into();

        let (offset, op_code) = loop {
            let offset = self.ctx.cursor.position();
            let op_code = self.ctx.cursor.u8()?;
            if op_code == opcode::NOP {
                continue;
            }
            if !(opcode::FNT_DEF1..opcode::FNT_DEF1 + 4).contains(&op_code) {
                break (offset, op_code);
            }
            self.define_font(op_code, DefinitionContext::Postamble)?;
        };
        if op_code != opcode::POST_POST {
            return Err(Error::BadPostamble { offset });
        }
        let Op::EndPostamble {
            postamble,
            dvi_format,
            num_223_bytes,
        } = Op::read_payload(op_code, &mut self.ctx.cursor)?
        else {
            return Err(Error::BadPostamble { offset });
        };
        if i64::from(postamble) != self.post_loc as i64 {
            return Err(Error::BadTrailer(BadTrailer::PostamblePointer {
                offset: offset + 1,
                pointer: postamble,
            }));
        }
        if dvi_format != ID_BYTE {
            return Err(Error::BadTrailer(BadTrailer::IdByte {
                offset: offset + 5,
                byte: dvi_format,
            }));
        }
        if !self.ctx.cursor.at_end() {
            return Err(Error::BadTrailer(BadTrailer::Signature {
                offset: self.ctx.cursor.position(),
            }));
        }
        if num_223_bytes < 4 {
            self.ctx
                .trace
                .warn(Warning::FewSignatureBytes(num_223_bytes))?;
        }
        tracing::debug!(post_loc = self.post_loc, num_pages, "read postamble");
        Ok(())
    }
}
