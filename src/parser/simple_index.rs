//! Parser for PEP 503 "simple" index pages served by the private registry.
//!
//! Artifactory renders one anchor per project. Some anchors carry a
//! `data-requires-python` attribute, and the registry has a rendering
//! defect that leaks the attribute value into the anchor text. Those
//! anchors are dropped instead of being mis-read as package names.

use crate::types::PackageName;
use regex::Regex;
use tracing::{debug, trace};

/// Attribute carrying the interpreter constraint on simple-index anchors.
pub const REQUIRES_PYTHON_ATTR: &str = "data-requires-python";

/// One anchor element from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Visible text with inner tags stripped and entities decoded.
    pub text: String,
    /// Decoded `data-requires-python` value, if present.
    pub requires_python: Option<String>,
}

/// Whether an anchor's text is a usable package name.
///
/// Accepted when the constraint attribute is absent, or when the text does
/// not contain the attribute value minus its first character.
pub fn is_intact_anchor(text: &str, requires_python: Option<&str>) -> bool {
    let requires = match requires_python {
        Some(value) if !value.is_empty() => value,
        _ => return true,
    };

    let mut chars = requires.chars();
    chars.next();
    !text.contains(chars.as_str())
}

/// Extracts anchors and package names from listing markup.
#[derive(Clone)]
pub struct SimpleIndexParser {
    anchor: Regex,
    requires_attr: Regex,
    tag: Regex,
    entity: Regex,
}

impl SimpleIndexParser {
    pub fn new() -> Self {
        Self {
            // a quoted attribute value may itself hold `>`
            anchor: Regex::new(r#"(?is)<a\b((?:[^>"']|"[^"]*"|'[^']*')*)>(.*?)</a\s*>"#)
                .expect("static regex"),
            requires_attr: Regex::new(
                r#"(?i)\bdata-requires-python\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#,
            )
            .expect("static regex"),
            tag: Regex::new(r"(?s)<[^>]*>").expect("static regex"),
            entity: Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("static regex"),
        }
    }

    /// Parse every anchor element in `markup`.
    pub fn anchors(&self, markup: &str) -> Vec<Anchor> {
        self.anchor
            .captures_iter(markup)
            .map(|caps| {
                let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let inner = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

                let text = self.decode_entities(&self.tag.replace_all(inner, ""));
                let requires_python = self.requires_attr.captures(attrs).and_then(|attr| {
                    attr.get(1)
                        .or_else(|| attr.get(2))
                        .or_else(|| attr.get(3))
                        .map(|m| self.decode_entities(m.as_str()))
                });

                Anchor {
                    text: text.trim().to_string(),
                    requires_python,
                }
            })
            .collect()
    }

    /// Package names from `markup`, with corrupted anchors filtered out.
    pub fn package_names(&self, markup: &str) -> Vec<PackageName> {
        let mut names = Vec::new();

        for anchor in self.anchors(markup) {
            if !is_intact_anchor(&anchor.text, anchor.requires_python.as_deref()) {
                debug!(
                    "Dropping corrupted anchor {:?} ({}={:?})",
                    anchor.text, REQUIRES_PYTHON_ATTR, anchor.requires_python
                );
                continue;
            }

            match PackageName::parse(&anchor.text) {
                Some(name) => names.push(name),
                None => trace!("Skipping anchor with no usable name: {:?}", anchor.text),
            }
        }

        names
    }

    fn decode_entities(&self, raw: &str) -> String {
        self.entity
            .replace_all(raw, |caps: &regex::Captures| {
                let entity = &caps[1];
                let decoded = match entity {
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "amp" => Some('&'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                        u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                    }
                    _ if entity.starts_with('#') => {
                        entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                    }
                    _ => None,
                };
                decoded
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

impl Default for SimpleIndexParser {
    fn default() -> Self {
        Self::new()
    }
}
