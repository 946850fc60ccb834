//! Parsers for dynamic linker and package database output.
//!
//! Each parser is isolated from command invocation so it can be checked
//! against captured tool output.

use crate::bundler::error::Result;
use regex::Regex;
use std::collections::BTreeSet;

/// Extracts sonames from `ldd` output.
#[derive(Debug, Clone)]
pub struct LddParser {
    line: Regex,
}

impl LddParser {
    /// Compile the line pattern.
    pub fn new() -> Result<Self> {
        Ok(Self {
            line: Regex::new(r"^\s*(?P<soname>.*)\s=>")?,
        })
    }

    /// Every `name => ...` entry in `output`.
    ///
    /// Lines without `=>` (the vDSO, the dynamic loader, error text from
    /// non-ELF files) contribute nothing.
    pub fn sonames(&self, output: &str) -> BTreeSet<String> {
        output
            .lines()
            .filter_map(|line| self.line.captures(line.trim_end()))
            .filter_map(|caps| caps.name("soname"))
            .map(|m| m.as_str().trim().to_string())
            .filter(|soname| !soname.is_empty())
            .collect()
    }
}

/// Package database used to map a library to the package that ships it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderQuery {
    /// Debian and derivatives: `dpkg -S`
    Dpkg,
    /// Arch Linux: `pacman -F`
    Pacman,
    /// RPM distributions: `rpm -q --whatprovides`
    Rpm {
        /// Query the `()(64bit)` capability rather than the bare soname
        sixty_four_bit: bool,
    },
}

impl ProviderQuery {
    /// Tool name used in diagnostics.
    pub fn tool(&self) -> &'static str {
        match self {
            ProviderQuery::Dpkg => "dpkg",
            ProviderQuery::Pacman => "pacman",
            ProviderQuery::Rpm { .. } => "rpm",
        }
    }

    /// Command line asking which package provides `library`.
    pub fn command(&self, library: &str) -> String {
        match self {
            ProviderQuery::Dpkg => format!("dpkg -S {library}"),
            ProviderQuery::Pacman => format!("pacman -F {library}"),
            ProviderQuery::Rpm { sixty_four_bit } => {
                let capability = if *sixty_four_bit {
                    format!("{library}()(64bit)")
                } else {
                    library.to_string()
                };
                format!("rpm -q --queryformat '%{{NAME}}\\n' --whatprovides '{capability}'")
            }
        }
    }
}

/// Extracts the providing package name from a [`ProviderQuery`]'s output.
#[derive(Debug, Clone)]
pub struct ProviderParser {
    query: ProviderQuery,
    pattern: Option<Regex>,
}

impl ProviderParser {
    /// Compile the pattern for `query`.
    pub fn new(query: ProviderQuery) -> Result<Self> {
        let pattern = match query {
            ProviderQuery::Dpkg => Some(Regex::new(
                r"^(?P<pkg>[^:\s]+):(?P<arch>[^:\s]+):\s(?P<lib>.+)$",
            )?),
            ProviderQuery::Pacman => Some(Regex::new(r".*/(?P<pkg>\S*)\s.*\[installed\]")?),
            ProviderQuery::Rpm { .. } => None,
        };
        Ok(Self { query, pattern })
    }

    /// The query this parser understands.
    pub fn query(&self) -> ProviderQuery {
        self.query
    }

    /// Package named by the first matching line, if any.
    pub fn provider(&self, output: &str) -> Option<String> {
        match &self.pattern {
            Some(pattern) => output
                .lines()
                .filter_map(|line| pattern.captures(line.trim_end()))
                .filter_map(|caps| caps.name("pkg"))
                .map(|m| m.as_str().to_string())
                .find(|pkg| !pkg.is_empty()),
            None => output
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .filter(|line| !line.contains(char::is_whitespace))
                .map(str::to_string),
        }
    }
}
