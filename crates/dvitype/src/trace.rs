//! The line-oriented trace of a run.
//!
//! Every command of a page that is shown starts a line of the form
//!     `OFFSET: mnemonic parameters`.
//! Commands are either major or minor.
//! Major commands are shown at [`OutMode::Terse`] and above;
//!     minor commands (printable characters, `nop` and short horizontal movements)
//!     only at [`OutMode::Mnemonics`] and above.
//!
//! Printable characters and the spaces implied by large horizontal movements are
//!     also collected in a text buffer, which is printed in brackets before the
//!     next major command.
//! This gives an approximate rendering of the text of each page.

use crate::error::{PageFault, Warning};
use crate::options::OutMode;
use std::io::Write;

/// Maximum length of a line of text, including the brackets.
const LINE_LENGTH: usize = 79;

pub struct Trace<W> {
    out: W,
    mode: OutMode,
    showing: bool,
    text: Vec<u8>,
    warnings: Vec<Warning>,
}

impl<W: Write> Trace<W> {
    pub fn new(out: W, mode: OutMode) -> Self {
        Trace {
            out,
            mode,
            showing: false,
            text: Vec::with_capacity(LINE_LENGTH),
            warnings: vec![],
        }
    }

    /// Whether the current command has started a line in the trace.
    pub fn showing(&self) -> bool {
        self.showing
    }

    /// Reset the state at the start of a command.
    pub fn start_command(&mut self) {
        self.showing = false;
    }

    /// End the line of the current command, if it was shown.
    pub fn end_command(&mut self) -> std::io::Result<()> {
        if self.showing {
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// Start the line of the command at the given offset.
    fn show(&mut self, offset: u64, args: std::fmt::Arguments) -> std::io::Result<()> {
        self.flush_text()?;
        self.showing = true;
        write!(self.out, "{offset}: {args}")
    }

    /// Show a major command.
    pub fn major(&mut self, offset: u64, args: std::fmt::Arguments) -> std::io::Result<()> {
        if self.mode > OutMode::ErrorsOnly {
            self.show(offset, args)?;
        }
        Ok(())
    }

    /// Show a minor command.
    pub fn minor(&mut self, offset: u64, args: std::fmt::Arguments) -> std::io::Result<()> {
        if self.mode > OutMode::Terse {
            self.showing = true;
            write!(self.out, "{offset}: {args}")?;
        }
        Ok(())
    }

    /// Report a warning about the command at the given offset.
    ///
    /// If the command has not been shown, it is shown now with the warning as its text.
    pub fn error(&mut self, offset: u64, warning: Warning) -> std::io::Result<()> {
        if self.showing {
            write!(self.out, " {warning}")?;
        } else {
            self.show(offset, format_args!("{warning}"))?;
        }
        self.warnings.push(warning);
        Ok(())
    }

    /// Report a problem that stops interpretation of the page, and end the line.
    pub fn fault(&mut self, offset: u64, fault: &PageFault) -> std::io::Result<()> {
        if self.showing {
            write!(self.out, " {fault}")?;
        } else {
            self.show(offset, format_args!("{fault}"))?;
        }
        writeln!(self.out)
    }

    /// Print more information about a shown command.
    pub fn shown(&mut self, args: std::fmt::Arguments) -> std::io::Result<()> {
        if self.showing {
            self.out.write_fmt(args)?;
        }
        Ok(())
    }

    /// Print the raw bytes of a special, if the command is shown.
    pub fn shown_bytes(&mut self, b: &[u8]) -> std::io::Result<()> {
        if self.showing {
            self.out.write_all(b)?;
        }
        Ok(())
    }

    /// Print details of a shown command at [`OutMode::Verbose`] and above.
    pub fn detail(&mut self, args: std::fmt::Arguments) -> std::io::Result<()> {
        if self.showing && self.mode > OutMode::Mnemonics {
            self.out.write_fmt(args)?;
        }
        Ok(())
    }

    /// Unconditionally print text.
    pub fn print(&mut self, args: std::fmt::Arguments) -> std::io::Result<()> {
        self.out.write_fmt(args)
    }

    /// Unconditionally print a line.
    pub fn line(&mut self, args: std::fmt::Arguments) -> std::io::Result<()> {
        self.out.write_fmt(args)?;
        writeln!(self.out)
    }

    /// Print a warning on its own line.
    pub fn warn(&mut self, warning: Warning) -> std::io::Result<()> {
        writeln!(self.out, "{warning}")?;
        self.warnings.push(warning);
        Ok(())
    }

    /// Print a warning inline, without ending the line.
    pub fn warn_inline(&mut self, warning: Warning) -> std::io::Result<()> {
        write!(self.out, "{warning}")?;
        self.warnings.push(warning);
        Ok(())
    }

    /// Add a character to the text buffer.
    pub fn out_text(&mut self, c: u8) -> std::io::Result<()> {
        if self.text.len() == LINE_LENGTH - 2 {
            self.flush_text()?;
        }
        self.text.push(c);
        Ok(())
    }

    /// Print and clear the text buffer.
    pub fn flush_text(&mut self) -> std::io::Result<()> {
        if !self.text.is_empty() {
            if self.mode > OutMode::ErrorsOnly {
                self.out.write_all(b"[")?;
                self.out.write_all(&self.text)?;
                self.out.write_all(b"]\n")?;
            }
            self.text.clear();
        }
        Ok(())
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    pub fn into_inner(self) -> (W, Vec<Warning>) {
        (self.out, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(mode: OutMode, f: impl FnOnce(&mut Trace<&mut Vec<u8>>)) -> String {
        let mut out = vec![];
        let mut trace = Trace::new(&mut out, mode);
        f(&mut trace);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn major_flushes_text() {
        let got = run(OutMode::Terse, |t| {
            t.out_text(b'A').unwrap();
            t.out_text(b'b').unwrap();
            t.start_command();
            t.major(42, format_args!("push")).unwrap();
            t.end_command().unwrap();
        });
        assert_eq!(got, "[Ab]\n42: push\n");
    }

    #[test]
    fn minor_hidden_when_terse() {
        let got = run(OutMode::Terse, |t| {
            t.start_command();
            t.minor(3, format_args!("nop")).unwrap();
            t.end_command().unwrap();
        });
        assert_eq!(got, "");
    }

    #[test]
    fn minor_does_not_flush_text() {
        let got = run(OutMode::Mnemonics, |t| {
            t.out_text(b'x').unwrap();
            t.start_command();
            t.minor(3, format_args!("setchar120")).unwrap();
            t.end_command().unwrap();
        });
        assert_eq!(got, "3: setchar120\n");
    }

    #[test]
    fn errors_only_hides_commands_but_not_warnings() {
        let mut out = vec![];
        let mut trace = Trace::new(&mut out, OutMode::ErrorsOnly);
        trace.out_text(b'x').unwrap();
        trace.start_command();
        trace.major(10, format_args!("pop")).unwrap();
        trace.error(10, Warning::StackUnderflow).unwrap();
        trace.end_command().unwrap();
        assert_eq!(trace.warnings(), &[Warning::StackUnderflow]);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "10: (illegal at level zero)!\n"
        );
    }

    #[test]
    fn error_appended_to_shown_command() {
        let got = run(OutMode::Terse, |t| {
            t.start_command();
            t.major(10, format_args!("pop")).unwrap();
            t.error(10, Warning::StackUnderflow).unwrap();
            t.end_command().unwrap();
        });
        assert_eq!(got, "10: pop (illegal at level zero)!\n");
    }

    #[test]
    fn detail_needs_verbose() {
        for (mode, want) in [
            (OutMode::Mnemonics, "1: right1 5\n"),
            (OutMode::Verbose, "1: right1 5 h:=0+5=5\n"),
        ] {
            let got = run(mode, |t| {
                t.start_command();
                t.minor(1, format_args!("right1 5")).unwrap();
                t.detail(format_args!(" h:=0+5=5")).unwrap();
                t.end_command().unwrap();
            });
            assert_eq!(got, want);
        }
    }

    #[test]
    fn long_text_is_split() {
        let got = run(OutMode::Terse, |t| {
            for _ in 0..80 {
                t.out_text(b'a').unwrap();
            }
            t.flush_text().unwrap();
        });
        let want = format!("[{}]\n[{}]\n", "a".repeat(77), "a".repeat(3));
        assert_eq!(got, want);
    }
}
