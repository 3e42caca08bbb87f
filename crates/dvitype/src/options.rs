//! Options that control a run.

use std::str::FromStr;

/// How much detail the trace contains.
///
/// Each level includes everything printed at the lower levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum OutMode {
    /// Page starts, font definitions and error messages only.
    ErrorsOnly = 0,
    /// Additionally, every command with its parameters.
    Terse = 1,
    /// Additionally, nops and short movements, one per line.
    Mnemonics = 2,
    /// Additionally, the effect of each command on the positions.
    Verbose = 3,
    /// Everything.
    #[default]
    TheWorks = 4,
}

impl OutMode {
    /// The description printed in the options banner.
    pub fn description(&self) -> &'static str {
        match self {
            OutMode::ErrorsOnly => "showing bops, fonts, and error messages only",
            OutMode::Terse => "terse",
            OutMode::Mnemonics => "mnemonics",
            OutMode::Verbose => "verbose",
            OutMode::TheWorks => "the works",
        }
    }
}

impl TryFrom<u8> for OutMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => OutMode::ErrorsOnly,
            1 => OutMode::Terse,
            2 => OutMode::Mnemonics,
            3 => OutMode::Verbose,
            4 => OutMode::TheWorks,
            _ => return Err(value),
        })
    }
}

/// Maximum number of components in a page selector; TeX writes 10 counters per page.
pub const MAX_SELECTOR_COMPONENTS: usize = 10;

/// Selects the first page to print by its counters.
///
/// Written as integers and asterisks separated by periods, for example `2.*.-2`.
/// An asterisk matches any value.
/// Only the first `len` counters of a page are compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelector {
    components: Vec<Option<i32>>,
}

impl PageSelector {
    /// A selector that matches every page.
    pub fn any() -> PageSelector {
        PageSelector {
            components: vec![None],
        }
    }

    /// Number of components in the selector.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the selector has no components.
    ///
    /// Selectors built by parsing always have at least one component.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Whether the counters of a page match the selector.
    pub fn matches(&self, counts: &[i32; 10]) -> bool {
        self.components
            .iter()
            .zip(counts.iter())
            .all(|(component, count)| match component {
                None => true,
                Some(value) => value == count,
            })
    }
}

impl Default for PageSelector {
    fn default() -> Self {
        PageSelector::any()
    }
}

/// Error returned when parsing an invalid page selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPageSelector(String);

impl std::error::Error for InvalidPageSelector {}

impl std::fmt::Display for InvalidPageSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' is not a valid page selector; \
             expected up to {MAX_SELECTOR_COMPONENTS} integers or asterisks separated by periods",
            self.0
        )
    }
}

impl FromStr for PageSelector {
    type Err = InvalidPageSelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidPageSelector(s.to_string());
        let mut components = vec![];
        for raw in s.trim().split('.') {
            if components.len() == MAX_SELECTOR_COMPONENTS {
                return Err(err());
            }
            let component = match raw {
                "*" => None,
                _ => Some(raw.parse::<i32>().map_err(|_| err())?),
            };
            components.push(component);
        }
        Ok(PageSelector { components })
    }
}

impl std::fmt::Display for PageSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match component {
                None => write!(f, "*")?,
                Some(value) => write!(f, "{value}")?,
            }
        }
        Ok(())
    }
}

/// Fixed limits on the size of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacities {
    /// Maximum number of distinct fonts.
    pub max_fonts: usize,
    /// Maximum number of character widths over all loaded fonts.
    pub max_widths: usize,
    /// Maximum number of bytes over all font names.
    pub name_size: usize,
    /// Maximum depth of the position stack.
    pub stack_size: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Capacities {
            max_fonts: 100,
            max_widths: 10000,
            name_size: 1000,
            stack_size: 100,
        }
    }
}

/// Options for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Pixels per inch of the target device.
    pub resolution: f64,
    /// The first page to print.
    pub page_start: PageSelector,
    /// Maximum number of pages to print.
    pub max_pages: usize,
    /// If set, replaces the magnification in the preamble.
    pub new_mag: Option<i32>,
    pub out_mode: OutMode,
    /// Locate the start page by following the backpointers from the postamble,
    ///     instead of reading the file from the start.
    pub random_access: bool,
    pub capacities: Capacities,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            resolution: 300.0,
            page_start: PageSelector::any(),
            max_pages: 1000000,
            new_mag: None,
            out_mode: OutMode::TheWorks,
            random_access: false,
            capacities: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! selector_tests {
        ( $( ($name: ident, $input: expr, $counts: expr, $want: expr), )+ ) => {
            $(
                #[test]
                fn $name() {
                    let selector: PageSelector = $input.parse().unwrap();
                    let mut counts = [0_i32; 10];
                    for (i, count) in $counts.into_iter().enumerate() {
                        counts[i] = count;
                    }
                    assert_eq!(selector.matches(&counts), $want);
                }
            )+
        };
    }

    selector_tests!(
        (wildcard_matches_page, "*", [7], true),
        (single_matches, "3", [3], true),
        (single_does_not_match, "3", [4], false),
        (only_first_component_compared, "3", [3, 9, 9], true),
        (wildcard_in_middle_matches, "2.*.-2", [2, 17, -2], true),
        (wildcard_in_middle_last_differs, "2.*.-2", [2, 17, 2], false),
        (wildcard_in_middle_first_differs, "2.*.-2", [1, 17, -2], false),
        (trailing_counts_ignored, "2.*.-2", [2, 0, -2, 5, 5], true),
    );

    #[test]
    fn parse_and_display() {
        let selector: PageSelector = "2.*.-2".parse().unwrap();
        assert_eq!(selector.len(), 3);
        assert_eq!(selector.to_string(), "2.*.-2");
    }

    #[test]
    fn parse_ten_components() {
        let selector: PageSelector = "1.2.3.4.5.6.7.8.9.10".parse().unwrap();
        assert_eq!(selector.len(), 10);
    }

    #[test]
    fn parse_errors() {
        for input in ["", "1..2", "a", "1.2.3.4.5.6.7.8.9.10.11", "*3"] {
            assert!(input.parse::<PageSelector>().is_err(), "{input}");
        }
    }

    #[test]
    fn out_mode_levels() {
        assert_eq!(OutMode::try_from(0), Ok(OutMode::ErrorsOnly));
        assert_eq!(OutMode::try_from(4), Ok(OutMode::TheWorks));
        assert_eq!(OutMode::try_from(5), Err(5));
        assert!(OutMode::Terse > OutMode::ErrorsOnly);
    }
}
