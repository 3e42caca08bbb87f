//! The table of fonts defined in a DVI file.

use crate::convert::Conversions;
use crate::error::{Capacity, Error, Warning};
use crate::options::Capacities;
use crate::trace::Trace;
use std::collections::HashMap;
use std::io::Write;

/// Scaled sizes and design sizes must be less than this value.
const MAX_SIZE: i32 = 1 << 30;

/// Finds the .tfm data for a font.
pub trait FontLocator {
    /// Returns the .tfm data for the font with the given area and name,
    ///     or [`None`] if the font cannot be found.
    fn locate(&mut self, area: &[u8], name: &[u8]) -> Option<Vec<u8>>;
}

/// Fonts in memory, keyed by name without the `.tfm` extension.
impl FontLocator for HashMap<String, Vec<u8>> {
    fn locate(&mut self, _: &[u8], name: &[u8]) -> Option<Vec<u8>> {
        self.get(String::from_utf8_lossy(name).as_ref()).cloned()
    }
}

impl<L: FontLocator + ?Sized> FontLocator for &mut L {
    fn locate(&mut self, area: &[u8], name: &[u8]) -> Option<Vec<u8>> {
        (**self).locate(area, name)
    }
}

/// How the file is being read.
///
/// Together with [`DefinitionContext`] this determines whether a font
///     definition is expected to be the first one for its font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// The file is read from the start; fonts are first defined in the pages.
    Sequential,
    /// The postamble is read first; fonts are first defined there.
    RandomAccess,
}

/// Where a font definition appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionContext {
    Page,
    Postamble,
}

/// The fields of a `fnt_def` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontDef {
    pub number: i32,
    pub checksum: u32,
    pub scaled_size: i32,
    pub design_size: i32,
    pub area: Vec<u8>,
    pub name: Vec<u8>,
}

impl FontDef {
    /// Returns the font definition in an op, if the op is a font definition.
    pub fn from_op(op: dvi::Op) -> Option<FontDef> {
        match op {
            dvi::Op::DefineFont {
                number,
                checksum,
                at_size,
                design_size,
                area,
                name,
            } => Some(FontDef {
                number,
                checksum,
                scaled_size: at_size,
                design_size,
                area,
                name,
            }),
            _ => None,
        }
    }

    fn full_name(&self) -> Vec<u8> {
        let mut full_name = self.area.clone();
        full_name.extend_from_slice(&self.name);
        full_name
    }
}

/// A font in the table.
#[derive(Debug, Clone)]
pub struct Font {
    pub number: i32,
    pub checksum: u32,
    pub scaled_size: i32,
    pub design_size: i32,
    /// The area followed by the name.
    pub name: Vec<u8>,
    /// The widths of the characters, or [`None`] if the font could not be loaded.
    pub metrics: Option<tfm::FontMetrics>,
    /// The threshold between small and large movements, in DVI units.
    ///
    /// This is 0 for fonts that could not be loaded.
    pub space: i32,
}

impl Font {
    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Whether the metrics of the font were loaded.
    pub fn is_usable(&self) -> bool {
        self.metrics.is_some()
    }

    /// The width of a character, or [`None`] if the character is not in the font.
    pub fn width(&self, c: i32) -> Option<tfm::CharWidth> {
        self.metrics.as_ref().and_then(|m| m.width(c))
    }
}

/// Handle to a font in a [`FontTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontHandle(usize);

pub struct FontTable {
    fonts: Vec<Font>,
    numbers: HashMap<i32, FontHandle>,
    name_bytes: usize,
    num_widths: usize,
    capacities: Capacities,
    mode: ReadMode,
}

impl FontTable {
    pub fn new(capacities: Capacities, mode: ReadMode) -> FontTable {
        FontTable {
            fonts: vec![],
            numbers: Default::default(),
            name_bytes: 0,
            num_widths: 0,
            capacities,
            mode,
        }
    }

    /// Returns the handle of the font with the given number, if it has been defined.
    pub fn get(&self, number: i32) -> Option<FontHandle> {
        self.numbers.get(&number).copied()
    }

    pub fn font(&self, handle: FontHandle) -> &Font {
        &self.fonts[handle.0]
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Process a font definition.
    ///
    /// The first definition of a font registers it in the table and loads its metrics.
    /// Later definitions of the same number are checked against the first;
    ///     each field that differs produces one warning.
    ///
    /// The diagnostics for the definition are printed without a final newline.
    pub fn define<W: Write, L: FontLocator>(
        &mut self,
        def: &FontDef,
        context: DefinitionContext,
        conversions: &Conversions,
        locator: &mut L,
        trace: &mut Trace<W>,
    ) -> Result<FontHandle, Error> {
        let existing = self.get(def.number);
        let full_name = def.full_name();
        if existing.is_none() {
            if self.fonts.len() == self.capacities.max_fonts {
                return Err(Error::CapacityExceeded(Capacity::Fonts(
                    self.capacities.max_fonts,
                )));
            }
            if self.name_bytes + full_name.len() > self.capacities.name_size {
                return Err(Error::CapacityExceeded(Capacity::Names(
                    self.capacities.name_size,
                )));
            }
        }

        let (q, d) = (def.scaled_size, def.design_size);
        let m = if q <= 0 || d <= 0 {
            1000
        } else {
            conversions.font_ratio(1000.0, q, d)
        };
        if trace.showing() {
            trace.print(format_args!(": "))?;
        } else {
            trace.print(format_args!("Font {}: ", def.number))?;
        }
        if full_name.is_empty() {
            trace.print(format_args!("null font name!"))?;
        } else {
            trace.print(format_args!("{}", String::from_utf8_lossy(&full_name)))?;
        }
        if !trace.showing() && m != 1000 {
            trace.print(format_args!(" scaled {m}"))?;
        }

        let expect_new = matches!(
            (self.mode, context),
            (ReadMode::RandomAccess, DefinitionContext::Postamble)
                | (ReadMode::Sequential, DefinitionContext::Page)
        );
        match (expect_new, existing) {
            (true, Some(_)) => trace.line(format_args!("---this font was already defined!"))?,
            (false, None) => trace.line(format_args!("---this font wasn't loaded before!"))?,
            _ => {}
        }

        if let Some(handle) = existing {
            let font = &self.fonts[handle.0];
            let mut warnings = vec![];
            if font.checksum != def.checksum {
                warnings.push(Warning::ChecksumMismatch { font: def.number });
            }
            if font.scaled_size != q {
                warnings.push(Warning::ScaledSizeMismatch { font: def.number });
            }
            if font.design_size != d {
                warnings.push(Warning::DesignSizeMismatch { font: def.number });
            }
            if font.name != full_name {
                warnings.push(Warning::NameMismatch { font: def.number });
            }
            for warning in warnings {
                trace.warn(warning)?;
            }
            return Ok(handle);
        }

        let metrics = self.load(def, conversions, locator, trace)?;
        let space = if metrics.is_some() { q / 6 } else { 0 };
        self.name_bytes += full_name.len();
        let handle = FontHandle(self.fonts.len());
        self.fonts.push(Font {
            number: def.number,
            checksum: def.checksum,
            scaled_size: q,
            design_size: d,
            name: full_name,
            metrics,
            space,
        });
        self.numbers.insert(def.number, handle);
        Ok(handle)
    }

    /// Load the metrics of a newly defined font.
    ///
    /// Returns [`None`] if the font is registered without metrics.
    fn load<W: Write, L: FontLocator>(
        &mut self,
        def: &FontDef,
        conversions: &Conversions,
        locator: &mut L,
        trace: &mut Trace<W>,
    ) -> Result<Option<tfm::FontMetrics>, Error> {
        let (q, d) = (def.scaled_size, def.design_size);
        if q <= 0 || q >= MAX_SIZE {
            trace.print(format_args!("---not loaded, bad scale ({q})!"))?;
            return Ok(None);
        }
        if d <= 0 || d >= MAX_SIZE {
            trace.print(format_args!("---not loaded, bad design size ({d})!"))?;
            return Ok(None);
        }
        let Some(data) = locator.locate(&def.area, &def.name) else {
            tracing::debug!(
                font = def.number,
                name = %String::from_utf8_lossy(&def.name),
                "no .tfm file found"
            );
            trace.print(format_args!("---not loaded, TFM file can't be opened!"))?;
            return Ok(None);
        };
        let metrics = tfm::FontMetrics::load(&data, conversions.tfm_scale(q)).map_err(|err| {
            Error::BadFontFile {
                font: String::from_utf8_lossy(&def.name).into_owned(),
                err,
            }
        })?;
        if self.num_widths + metrics.num_chars() > self.capacities.max_widths {
            return Err(Error::CapacityExceeded(Capacity::Widths(
                self.capacities.max_widths,
            )));
        }
        self.num_widths += metrics.num_chars();
        tracing::debug!(
            font = def.number,
            name = %String::from_utf8_lossy(&def.name),
            num_chars = metrics.num_chars(),
            "loaded font metrics"
        );

        if def.checksum != 0 && metrics.checksum != 0 && def.checksum != metrics.checksum {
            trace.warn_inline(Warning::TfmChecksumMismatch {
                font: def.number,
                dvi: def.checksum,
                tfm: metrics.checksum,
            })?;
        }
        if (metrics.design_size - d).abs() > 2 {
            trace.warn_inline(Warning::TfmDesignSizeMismatch {
                font: def.number,
                dvi: d,
                tfm: metrics.design_size,
            })?;
        }
        trace.print(format_args!("---loaded at size {q} DVI units"))?;
        let percent = conversions.font_ratio(100.0, q, d);
        if percent != 100 {
            trace.print(format_args!("\n (this font is magnified {percent}%)"))?;
        }
        Ok(Some(metrics))
    }
}

/// Finds .tfm files under a directory.
///
/// The directory is scanned recursively the first time a font is requested;
///     later requests are served from the cache.
#[derive(Debug)]
pub struct DirectoryLocator {
    root: std::path::PathBuf,
    files: Option<HashMap<Vec<u8>, std::path::PathBuf>>,
}

impl DirectoryLocator {
    pub fn new<P: Into<std::path::PathBuf>>(root: P) -> DirectoryLocator {
        DirectoryLocator {
            root: root.into(),
            files: None,
        }
    }

    fn scan(&self) -> HashMap<Vec<u8>, std::path::PathBuf> {
        let mut files = HashMap::new();
        let mut dirs = vec![self.root.clone()];
        while let Some(dir) = dirs.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::debug!(dir = %dir.display(), %err, "skipping unreadable directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("tfm") {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    files
                        .entry(stem.as_bytes().to_vec())
                        .or_insert_with(|| path.clone());
                }
            }
        }
        tracing::debug!(root = %self.root.display(), num_files = files.len(), "scanned for .tfm files");
        files
    }
}

impl FontLocator for DirectoryLocator {
    fn locate(&mut self, area: &[u8], name: &[u8]) -> Option<Vec<u8>> {
        if !area.is_empty() {
            let mut path = String::from_utf8_lossy(area).into_owned();
            path.push_str(&String::from_utf8_lossy(name));
            path.push_str(".tfm");
            if let Ok(data) = std::fs::read(&path) {
                return Some(data);
            }
        }
        if self.files.is_none() {
            self.files = Some(self.scan());
        }
        let path = self.files.as_ref()?.get(name)?;
        match std::fs::read(path) {
            Ok(data) => Some(data),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "failed to read .tfm file");
                None
            }
        }
    }
}
