//! Defines [`Article`] and the loading of articles from the source tree. See
//! [`Article::to_value`] and [`Article::summarize`] for how articles are
//! exposed to templates.

use crate::markdown;
use crate::metadata::ArticleMeta;
use crate::pipeline::{list_files, Error, Result};
use crate::resolver::{is_markdown, Resolver, Source};
use crate::template::{object, optional, string, strings};
use gtmpl::Value;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A parsed and rendered article.
#[derive(Clone, Debug, PartialEq)]
pub struct Article {
    /// The source file the article was read from.
    pub source: PathBuf,

    /// The server-facing link, from [`Resolver::server_link`].
    pub link: String,

    pub meta: ArticleMeta,

    /// The rendered HTML body.
    pub body: String,
}

impl Article {
    /// Reads the article at `source` and renders its body.
    pub fn load(resolver: &Resolver, source: &Path) -> Result<Article> {
        let input = std::fs::read_to_string(source).map_err(|err| {
            Error::Io {
                path: source.to_owned(),
                err,
            }
        })?;
        Article::parse(resolver, source, &input)
    }

    /// Parses an article from `input`, the contents of `source`.
    pub fn parse(
        resolver: &Resolver,
        source: &Path,
        input: &str,
    ) -> Result<Article> {
        let (meta, body) = ArticleMeta::parse(input).map_err(|err| {
            Error::from(err)
                .annotate(format!("parsing article `{}`", source.display()))
        })?;
        Ok(Article {
            source: source.to_owned(),
            link: resolver.server_link(source),
            meta,
            body: markdown::to_html(body),
        })
    }

    /// Converts the article into a template value with the fields `title`,
    /// `description`, `synopsis`, `date`, `tags`, `link` and `content`.
    pub fn to_value(&self) -> Value {
        object(vec![
            ("title", string(self.meta.title.as_str())),
            ("description", optional(&self.meta.description)),
            ("synopsis", optional(&self.meta.synopsis)),
            ("date", string(self.meta.date.format(DATE_FORMAT).to_string())),
            ("tags", strings(&self.meta.tags)),
            ("link", string(self.link.as_str())),
            ("content", string(self.body.as_str())),
        ])
    }

    /// Like [`Article::to_value`] without the body, for listings.
    pub fn summarize(&self) -> Value {
        object(vec![
            ("title", string(self.meta.title.as_str())),
            ("description", optional(&self.meta.description)),
            ("synopsis", optional(&self.meta.synopsis)),
            ("date", string(self.meta.date.format(DATE_FORMAT).to_string())),
            ("tags", strings(&self.meta.tags)),
            ("link", string(self.link.as_str())),
        ])
    }
}

/// Returns the article source files, sorted by path.
pub fn sources(resolver: &Resolver) -> Result<Vec<PathBuf>> {
    list_files(&resolver.source_path(Source::Articles), is_markdown)
}

/// Loads every article in `sources`, newest first. Articles with the same
/// date are ordered by title.
pub fn load_all(
    resolver: &Resolver,
    sources: &[PathBuf],
) -> Result<Vec<Article>> {
    let mut articles = sources
        .iter()
        .map(|source| Article::load(resolver, source))
        .collect::<Result<Vec<Article>>>()?;
    articles.sort_by(|a, b| {
        b.meta
            .date
            .cmp(&a.meta.date)
            .then_with(|| a.meta.title.cmp(&b.meta.title))
    });
    Ok(articles)
}
