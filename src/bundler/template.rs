//! Package metadata templates.
//!
//! Control files, RPM spec files and PKGBUILDs are shipped as `*.in`
//! templates using `$name` / `${name}` placeholders, with `$$` standing for a
//! literal dollar sign. Rendering is strict: every placeholder must be given a
//! value.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::{collections::BTreeSet, path::Path};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed placeholder template.
#[derive(Debug, Clone)]
pub struct PackageTemplate {
    name: String,
    segments: Vec<Segment>,
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

impl PackageTemplate {
    /// Parse template `text`; `name` is only used in error messages.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        let invalid = |offset: usize| {
            let line = text[..offset].matches('\n').count() + 1;
            let column = offset - text[..offset].rfind('\n').map_or(0, |i| i + 1) + 1;
            Error::Template {
                template: name.clone(),
                reason: format!("invalid placeholder at line {line}, column {column}"),
            }
        };

        while let Some((offset, c)) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }

            match chars.peek().copied() {
                Some((_, '$')) => {
                    chars.next();
                    literal.push('$');
                }
                Some((_, '{')) => {
                    chars.next();
                    let mut ident = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, c)) if ident.is_empty() && is_ident_start(c) => ident.push(c),
                            Some((_, c)) if !ident.is_empty() && is_ident_char(c) => ident.push(c),
                            _ => return Err(invalid(offset)),
                        }
                    }
                    if ident.is_empty() {
                        return Err(invalid(offset));
                    }
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    segments.push(Segment::Placeholder(ident));
                }
                Some((_, c)) if is_ident_start(c) => {
                    let mut ident = String::new();
                    while let Some(&(_, c)) = chars.peek() {
                        if !is_ident_char(c) {
                            break;
                        }
                        ident.push(c);
                        chars.next();
                    }
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    segments.push(Segment::Placeholder(ident));
                }
                _ => return Err(invalid(offset)),
            }
        }

        segments.push(Segment::Literal(literal));
        segments.retain(|segment| !matches!(segment, Segment::Literal(text) if text.is_empty()));

        Ok(Self { name, segments })
    }

    /// Read and parse the template at `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .fs_context("reading template", path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse(name, &text)
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every placeholder name referenced by the template.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute `values` into the template.
    ///
    /// Extra values are ignored. A placeholder without a value is an error
    /// naming the missing key.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(key) => {
                    let value = values
                        .iter()
                        .find(|(name, _)| name == key)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| Error::Template {
                            template: self.name.clone(),
                            reason: format!("no value supplied for placeholder '{key}'"),
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
