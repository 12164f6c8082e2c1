// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment extraction failures into miette diagnostics.
//!
//! Every figment error carries the dotted path of the offending key
//! (`["routing", "conflict_admin"]`). The path is used to point a label at the
//! key inside whichever `lifeline.toml` supplied it, and, for misspelled keys,
//! sections and policy names, to offer the closest valid spelling.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a candidate must beat to be suggested.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, ready for `lifeline config check` to render.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key or section that no Lifeline config struct declares.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(lifeline::config::unknown_key),
        help("{}", choice_help(suggestion.as_deref(), valid))
    )]
    UnknownKey {
        /// Dotted path, e.g. `delivery.sesion_buffer`.
        key: String,
        suggestion: Option<String>,
        /// Keys accepted at that level, comma separated.
        valid: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key whose value has the wrong type or is out of its allowed set.
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(
        code(lifeline::config::invalid_value),
        help("{}", choice_help(suggestion.as_deref(), expected))
    )]
    InvalidValue {
        key: String,
        detail: String,
        suggestion: Option<String>,
        /// What the key accepts.
        expected: String,
        #[label("this value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A semantically invalid setting found after deserialization.
    #[error("validation error: {message}")]
    #[diagnostic(code(lifeline::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(lifeline::config::other))]
    Other(String),
}

fn choice_help(suggestion: Option<&str>, valid: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? expected one of: {valid}"),
        None => format!("expected one of: {valid}"),
    }
}

/// Where a diagnostic label should point.
type Located = (Option<SourceSpan>, Option<NamedSource<String>>);

/// Convert a `figment::Error` (which may hold several errors) into diagnostics.
///
/// `toml_sources` pairs a display path with the file content; they are only
/// used to attach source spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let key = error.path.join(".");
            match &error.kind {
                Kind::UnknownField(field, valid) => {
                    let (span, src) = locate_in_sources(&error, toml_sources);
                    ConfigError::UnknownKey {
                        key: if key.is_empty() { field.clone() } else { key },
                        suggestion: suggest_key(field, valid),
                        valid: valid.join(", "),
                        span,
                        src,
                    }
                }
                Kind::UnknownVariant(actual, valid) => {
                    let (span, src) = locate_in_sources(&error, toml_sources);
                    ConfigError::InvalidValue {
                        key,
                        detail: format!("`{actual}` is not a known option"),
                        suggestion: suggest_key(actual, valid),
                        expected: valid.join(", "),
                        span,
                        src,
                    }
                }
                Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
                    let (span, src) = locate_in_sources(&error, toml_sources);
                    ConfigError::InvalidValue {
                        key,
                        detail: format!("found {actual}"),
                        suggestion: None,
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Find the offending key in the file figment says it came from, falling back
/// to any supplied source that contains it (inline strings carry no path).
fn locate_in_sources(error: &figment::Error, toml_sources: &[(String, String)]) -> Located {
    let Some((key, section)) = error.path.split_last() else {
        return (None, None);
    };

    let origin = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    let preferred = toml_sources
        .iter()
        .filter(|(path, _)| origin.as_deref() == Some(path.as_str()));
    let others = toml_sources
        .iter()
        .filter(|(path, _)| origin.as_deref() != Some(path.as_str()));

    for (path, content) in preferred.chain(others) {
        if let Some(offset) = locate_key(content, section, key) {
            let span = SourceSpan::new(offset.into(), key.len());
            return (Some(span), Some(NamedSource::new(path, content.clone())));
        }
    }
    (None, None)
}

/// Byte offset of `key` inside `content`.
///
/// With an empty `section` the key is a top-level table name and the header
/// `[key]` is searched for. Otherwise the search starts after `[section]` and
/// stops at the next table header.
pub fn locate_key(content: &str, section: &[String], key: &str) -> Option<usize> {
    if section.is_empty() {
        let header = format!("[{key}]");
        return content.find(&header).map(|pos| pos + 1);
    }

    let header = format!("[{}]", section.join("."));
    let mut offset = content.find(&header)? + header.len();
    for line in content[offset..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            return None;
        }
        if let Some(rest) = trimmed.strip_prefix(key) {
            if rest.trim_start().starts_with('=') {
                return Some(offset + (line.len() - trimmed.len()));
            }
        }
        offset += line.len();
    }
    None
}

/// Closest valid spelling of `unknown` by Jaro-Winkler similarity.
pub fn suggest_key(unknown: &str, valid: &[&str]) -> Option<String> {
    valid
        .iter()
        .map(|&candidate| (strsim::jaro_winkler(unknown, candidate), candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

fn render(error: &ConfigError) -> String {
    let handler = miette::GraphicalReportHandler::new_themed(miette::GraphicalTheme::unicode_nocolor());
    let mut buf = String::new();
    match handler.render_report(&mut buf, error as &dyn Diagnostic) {
        Ok(()) => buf,
        Err(_) => format!("Error: {error}\n"),
    }
}

/// Render every error to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    for error in errors {
        eprint!("{}", render(error));
    }
}
