use clap::Parser;
use std::io::Write;

fn main() {
    if let Err(err) = Cli::parse().run() {
        if !err.is_empty() {
            eprintln!("{err}");
        }
        std::process::exit(1);
    }
}

/// Validate a DVI file and print a trace of its contents.
///
/// This is an alternative implementation of Knuth's DVItype.
/// It checks that a DVI file is well formed and prints the commands of each page,
///     together with the positions they produce on a device with the given resolution.
#[derive(Debug, clap::Parser)]
#[command(
    name = "DVItype",
    version = "0.1",
    about,
    long_about,
    max_term_width(100)
)]
struct Cli {
    /// Path to the DVI file.
    ///
    /// A file extension is optional, and will be set to .dvi if missing.
    dvi_file_path: std::path::PathBuf,

    /// Resolution of the output device, in pixels per inch.
    #[arg(long, default_value_t = 300.0)]
    resolution: f64,

    /// The first page to print, for example `2` or `5.*.-2`.
    ///
    /// Pages are matched against their \count0 to \count9 values.
    /// An asterisk matches any value.
    #[arg(long, default_value = "*")]
    page_start: dvitype::PageSelector,

    /// Maximum number of pages to print.
    #[arg(long, default_value_t = 1000000)]
    max_pages: usize,

    /// Override the magnification in the DVI file.
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..))]
    magnification: Option<i32>,

    /// Verbosity of the trace, from 0 (errors and fonts only) to 4 (everything).
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=4))]
    output_level: u8,

    /// Read the postamble first and find the starting page by following page backpointers.
    ///
    /// This checks the structure of the whole file before printing any pages.
    #[arg(long)]
    random_access: bool,

    /// Directory that is searched, recursively, for .tfm files.
    #[arg(long, default_value = ".")]
    font_dir: std::path::PathBuf,

    /// Log filter for diagnostic messages written to standard error, for example `debug`.
    ///
    /// If not set, the RUST_LOG environment variable is used.
    #[arg(long)]
    log: Option<String>,
}

impl Cli {
    fn run(mut self) -> Result<(), String> {
        init_logging(self.log.as_deref())?;
        if self.dvi_file_path.extension().is_none() {
            self.dvi_file_path.set_extension("dvi");
        }
        let data = match std::fs::read(&self.dvi_file_path) {
            Ok(data) => data,
            Err(err) => {
                return Err(format!(
                    "failed to read `{}`: {}",
                    self.dvi_file_path.display(),
                    err
                ))
            }
        };
        let out_mode = dvitype::OutMode::try_from(self.output_level)
            .map_err(|level| format!("invalid output level {level}"))?;
        let options = dvitype::Options {
            resolution: self.resolution,
            page_start: self.page_start,
            max_pages: self.max_pages,
            new_mag: self.magnification,
            out_mode,
            random_access: self.random_access,
            capacities: Default::default(),
        };
        let locator = dvitype::DirectoryLocator::new(self.font_dir);

        let stdout = std::io::stdout();
        let mut out = std::io::BufWriter::new(stdout.lock());
        let result = dvitype::run(&data, options, locator, &mut out);
        if let Err(err) = &result {
            tracing::debug!(?err, "fatal error");
            writeln!(out, "{err}").map_err(|err| err.to_string())?;
        }
        out.flush().map_err(|err| err.to_string())?;
        match result {
            Ok(summary) => {
                tracing::debug!(
                    pages = summary.page_count,
                    rendered = summary.pages_rendered,
                    warnings = summary.warnings.len(),
                    "finished"
                );
                Ok(())
            }
            // The diagnostic has been written at the end of the trace.
            Err(_) => Err(String::new()),
        }
    }
}

fn init_logging(filter: Option<&str>) -> Result<(), String> {
    let filter = match filter {
        Some(filter) => tracing_subscriber::EnvFilter::try_new(filter)
            .map_err(|err| format!("invalid log filter `{filter}`: {err}"))?,
        None => tracing_subscriber::EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
