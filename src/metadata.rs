//! Parses the YAML front matter at the top of content files into [`PageMeta`]
//! and [`ArticleMeta`]. A content file looks like this:
//!
//! ```md
//! ---
//! title: Hello, world!
//! date: 2021-04-16
//! tags: [greet]
//! ---
//! # Hello
//!
//! World
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fmt;

const FENCE: &str = "---";

/// Splits `input` into its YAML front matter and its body. The input must
/// begin with `---`; the front matter ends at the next `---`.
pub fn split(input: &str) -> Result<(&str, &str)> {
    if !input.starts_with(FENCE) {
        return Err(Error::FrontmatterMissingStartFence);
    }
    match input[FENCE.len()..].find(FENCE) {
        None => Err(Error::FrontmatterMissingEndFence),
        Some(offset) => {
            let yaml_stop = FENCE.len() + offset;
            let body_start = yaml_stop + FENCE.len();
            Ok((&input[FENCE.len()..yaml_stop], &input[body_start..]))
        }
    }
}

/// The front matter of a page or of the index.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PageMeta {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl PageMeta {
    /// Parses a page. Pages may omit front matter entirely, in which case the
    /// whole input is the body.
    pub fn parse(input: &str) -> Result<(PageMeta, &str)> {
        if !input.starts_with(FENCE) {
            return Ok((PageMeta::default(), input));
        }
        let (yaml, body) = split(input)?;
        Ok((from_yaml(yaml)?, body))
    }
}

/// The front matter of an article.
#[derive(Clone, Debug, PartialEq)]
pub struct ArticleMeta {
    pub title: String,
    pub description: Option<String>,
    pub synopsis: Option<String>,
    pub date: NaiveDateTime,

    /// Slugified so that `Rust` and `rust` are the same tag.
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
struct RawArticleMeta {
    title: String,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    synopsis: Option<String>,

    date: String,

    #[serde(default)]
    tags: Vec<String>,
}

impl ArticleMeta {
    /// Parses an article. Unlike pages, articles must carry front matter with
    /// at least a `title` and a `date`.
    pub fn parse(input: &str) -> Result<(ArticleMeta, &str)> {
        let (yaml, body) = split(input)?;
        let raw: RawArticleMeta = from_yaml(yaml)?;
        let mut tags: Vec<String> =
            raw.tags.iter().map(|t| slug::slugify(t)).collect();
        tags.sort();
        tags.dedup();
        Ok((
            ArticleMeta {
                title: raw.title,
                description: raw.description,
                synopsis: raw.synopsis,
                date: parse_date(&raw.date)?,
                tags,
            },
            body,
        ))
    }
}

/// Parses `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`. Bare dates are midnight.
pub fn parse_date(input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();
    if let Ok(date_time) =
        NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S")
    {
        return Ok(date_time);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::InvalidDate(input.to_owned()))
}

// An empty front matter block deserializes as YAML null, which serde_yaml
// rejects for structs, so treat it as an empty mapping.
fn from_yaml<T: serde::de::DeserializeOwned>(yaml: &str) -> Result<T> {
    if yaml.trim().is_empty() {
        return Ok(serde_yaml::from_str("{}")?);
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Represents the result of a front matter parse.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing front matter.
#[derive(Debug)]
pub enum Error {
    /// Returned when a source file is missing its starting fence (`---`).
    FrontmatterMissingStartFence,

    /// Returned when the starting fence was found but the ending one was
    /// missing.
    FrontmatterMissingEndFence,

    /// Returned when the front matter isn't valid YAML for the document kind.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when an article's `date` isn't in a supported format.
    InvalidDate(String),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingStartFence => {
                write!(f, "Document must begin with `---`")
            }
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::InvalidDate(date) => write!(
                f,
                "invalid date `{}` (expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)",
                date
            ),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontmatterMissingStartFence => None,
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::InvalidDate(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}
