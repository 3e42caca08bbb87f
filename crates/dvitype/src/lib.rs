//! # DVItype
//!
//! This crate validates DVI files and prints a line-oriented trace of their contents,
//!     in the manner of Knuth's DVItype program.
//!
//! The entry point is [`run`].
//! It reads the preamble, optionally locates the postamble from the end of the file
//!     and follows the chain of page backpointers to find the first page to print,
//!     interprets the selected pages command by command,
//!     and finally reads and checks the postamble.
//!
//! While interpreting a page the program tracks both the exact positions in DVI units
//!     and the rounded pixel positions that a device driver at a given resolution
//!     would use.
//! Character widths come from the fonts' .tfm files, found through a [`FontLocator`].
//!
//! Problems in the file are reported in two tiers.
//! Fatal problems stop the run and are returned as an [`Error`].
//! Other problems are printed in the trace as they are found,
//!     and are also returned in [`Summary::warnings`].

pub mod convert;
pub mod error;
pub mod fonts;
pub mod navigator;
pub mod options;
pub mod page;
pub mod trace;

#[cfg(test)]
mod testutil;

pub use error::{Error, Warning};
pub use fonts::{DirectoryLocator, FontLocator};
pub use navigator::{DocumentNavigator, PageRecord};
pub use options::{Capacities, Options, OutMode, PageSelector};

use convert::Conversions;
use fonts::{DefinitionContext, FontDef, FontHandle, FontTable};
use page::Maxima;
use std::io::Write;
use trace::Trace;

/// The result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Every page found while reading forward through the file, in order.
    pub pages: Vec<PageRecord>,
    /// The number of pages in the file.
    pub page_count: usize,
    /// The number of pages that were interpreted.
    pub pages_rendered: usize,
    /// The number of pages according to the postamble.
    pub total_pages: u16,
    /// Offset of the `post` command.
    pub postamble_offset: u64,
    pub conversions: Conversions,
    pub maxima: Maxima,
    /// The warnings printed in the trace, in order.
    pub warnings: Vec<Warning>,
}

/// Process a DVI file, writing the trace to `out`.
///
/// ```
/// let mut out: Vec<u8> = vec![];
/// let err = dvitype::run(
///     &[1, 2, 3],
///     dvitype::Options::default(),
///     std::collections::HashMap::<String, Vec<u8>>::new(),
///     &mut out,
/// ).unwrap_err();
/// assert_eq![
///     err.to_string(),
///     "Bad DVI file: First byte isn't start of preamble!",
/// ];
/// ```
pub fn run<W: Write, L: FontLocator>(
    data: &[u8],
    options: Options,
    locator: L,
    out: W,
) -> Result<Summary, Error> {
    tracing::debug!(
        len = data.len(),
        random_access = options.random_access,
        "processing DVI file"
    );
    DocumentNavigator::new(data, options, locator, out).run()
}

/// The state shared by the navigator and the page interpreter.
pub struct Context<'a, W, L> {
    pub cursor: dvi::ByteCursor<'a>,
    pub trace: Trace<W>,
    pub fonts: FontTable,
    pub locator: L,
    pub conversions: Conversions,
}

impl<'a, W: Write, L: FontLocator> Context<'a, W, L> {
    /// Process a font definition.
    pub fn define_font(
        &mut self,
        def: &FontDef,
        context: DefinitionContext,
    ) -> Result<FontHandle, Error> {
        self.fonts.define(
            def,
            context,
            &self.conversions,
            &mut self.locator,
            &mut self.trace,
        )
    }
}
