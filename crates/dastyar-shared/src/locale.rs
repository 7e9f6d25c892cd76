//! Request locale negotiation.
//!
//! An explicit `?locale=` query parameter decides alone: when it names an
//! unsupported language the result is `None` and the headers are not read.
//! Without one, the headers are consulted in order and the first naming a
//! supported [`Language`] wins:
//!
//! 1. `X-User-Language` header
//! 2. primary tag of the first `Accept-Language` entry
//!
//! Callers supply their own fallback.

use crate::types::Language;

/// Raw locale hints collected from a request.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocaleHints<'a> {
    pub query: Option<&'a str>,
    pub user_language: Option<&'a str>,
    pub accept_language: Option<&'a str>,
}

type Source = for<'a> fn(&LocaleHints<'a>) -> Option<Language>;

const HEADER_SOURCES: &[Source] = &[
    |h| h.user_language.and_then(parse_tag),
    |h| h.accept_language.and_then(primary_accept_language),
];

impl LocaleHints<'_> {
    /// The query's language if one was given, else the first supported
    /// language named by a header.
    pub fn negotiate(&self) -> Option<Language> {
        match self.query {
            Some(query) => parse_tag(query),
            None => HEADER_SOURCES.iter().find_map(|source| source(self)),
        }
    }

    pub fn negotiate_or(&self, fallback: Language) -> Language {
        self.negotiate().unwrap_or(fallback)
    }
}

fn parse_tag(tag: &str) -> Option<Language> {
    tag.trim().to_ascii_lowercase().parse().ok()
}

/// `"ar-IQ,en;q=0.9"` -> `ar`. Only the first entry is considered.
fn primary_accept_language(header: &str) -> Option<Language> {
    let first = header.split(',').next()?;
    let tag = first.split(';').next()?;
    let primary = tag.split('-').next()?;
    parse_tag(primary)
}
