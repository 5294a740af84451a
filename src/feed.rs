//! Support for creating Atom feeds from a list of articles.

use crate::article::Article;
use crate::config::{Author, Site};
use crate::resolver::Resolver;
use atom_syndication::{
    Category, Entry, Error as AtomError, Feed, FixedDateTime, Link, Person,
    Text,
};
use chrono::{NaiveDateTime, TimeZone, Utc};
use std::fmt;

/// The name of the feed under the server root.
pub const FEED_FILE: &str = "atom.xml";

/// Creates a feed for `site` from `articles` (newest first) and serializes it.
/// The feed's own links are made absolute from the site URL and `resolver`'s
/// server root.
pub fn feed_xml(
    site: &Site,
    resolver: &Resolver,
    articles: &[Article],
) -> Result<String> {
    let out = feed(site, resolver, articles)?.write_to(Vec::new())?;
    String::from_utf8(out).map_err(|_| Error::NotUtf8)
}

fn feed(
    site: &Site,
    resolver: &Resolver,
    articles: &[Article],
) -> Result<Feed> {
    let home = site.url.join(&resolver.server_root_link(""))?.to_string();
    let this = site.url.join(&resolver.server_root_link(FEED_FILE))?;

    let mut feed = Feed::default();
    feed.set_title(site.title.as_str());
    feed.set_id(home.as_str());
    feed.set_updated(match articles.iter().map(|a| a.meta.date).max() {
        Some(date) => utc(date),
        None => Utc::now().into(),
    });
    feed.set_authors(author_to_people(&site.author));
    feed.set_links(vec![
        link(home, "alternate"),
        link(this.to_string(), "self"),
    ]);
    if let Some(description) = &site.description {
        feed.set_subtitle(Text::plain(description.as_str()));
    }
    feed.set_entries(
        articles
            .iter()
            .map(|article| feed_entry(site, article))
            .collect::<Result<Vec<Entry>>>()?,
    );
    Ok(feed)
}

fn feed_entry(site: &Site, article: &Article) -> Result<Entry> {
    let url = site.url.join(&article.link)?.to_string();
    let date = utc(article.meta.date);

    let mut entry = Entry::default();
    entry.set_id(url.as_str());
    entry.set_title(article.meta.title.as_str());
    entry.set_updated(date);
    entry.set_published(Some(date));
    entry.set_authors(author_to_people(&site.author));
    entry.set_links(vec![link(url, "alternate")]);
    if let Some(summary) =
        article.meta.synopsis.as_ref().or(article.meta.description.as_ref())
    {
        entry.set_summary(Text::plain(summary.as_str()));
    }
    entry.set_categories(
        article
            .meta
            .tags
            .iter()
            .map(|tag| {
                let mut category = Category::default();
                category.set_term(tag.as_str());
                category
            })
            .collect::<Vec<Category>>(),
    );
    Ok(entry)
}

// Article dates carry no timezone; they're taken to be UTC.
fn utc(date: NaiveDateTime) -> FixedDateTime {
    Utc.from_utc_datetime(&date).into()
}

fn link(href: String, rel: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel(rel);
    link
}

fn author_to_people(author: &Option<Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.as_str());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants inlude Atom serialization
/// and URL issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is an Atom-related error.
    Atom(AtomError),

    /// Returned when a link can't be joined onto the site URL.
    UrlParse(url::ParseError),

    /// Returned when the serialized feed isn't UTF-8.
    NotUtf8,
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Atom(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
            Error::NotUtf8 => write!(f, "feed is not valid UTF-8"),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Atom(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::NotUtf8 => None,
        }
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts [`url::ParseError`]s into [`Error`]. This allows us to use the
    /// `?` operator when joining links onto the site URL.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}
