//! Defines the [`Resolver`], which maps the three roots of a build (source
//! content, build output, and the URL base the site is served under) to
//! concrete file locations and links.
//!
//! The target root and the server root are deliberately separate: the former
//! is where files land on disk, the latter is what gets prepended to links in
//! the generated markup. A site deployed under a subpath (e.g.,
//! `https://user.github.io/blog/`) is built into `_www` but links to
//! `/blog/articles/...`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const MARKDOWN_EXTENSION: &str = "md";
pub const HTML_EXTENSION: &str = "html";

/// A content category under the source root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Assets,
    Images,
    Css,
    Templates,
    Content,
    Pages,
    Articles,
    Index,
}

/// An artifact under the target root. Fixed artifacts have a single location;
/// [`Target::Page`] and [`Target::Article`] are derived from a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    Cache,
    Images,
    Stylesheet,
    Index,
    Feed,
    Page(&'a Path),
    Article(&'a Path),
}

/// Holds the source, target and server roots. See the module documentation
/// for how they relate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolver {
    source: PathBuf,
    target: PathBuf,
    server_root: String,
}

impl Default for Resolver {
    /// The resolver used when nothing is configured: sources in the working
    /// directory, output in `_www`, links rooted at `/`.
    fn default() -> Self {
        Resolver::new("", "_www", "")
    }
}

impl Resolver {
    /// Constructs a new [`Resolver`].
    pub fn new<S, T>(source: S, target: T, server_root: &str) -> Resolver
    where
        S: Into<PathBuf>,
        T: Into<PathBuf>,
    {
        Resolver {
            source: source.into(),
            target: target.into(),
            server_root: server_root.to_owned(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn server_root(&self) -> &str {
        &self.server_root
    }

    /// Returns the same resolver with a different target root.
    pub fn with_target<T: Into<PathBuf>>(self, target: T) -> Resolver {
        Resolver {
            target: target.into(),
            ..self
        }
    }

    /// Returns the same resolver with a different server root.
    pub fn with_server_root(self, server_root: &str) -> Resolver {
        Resolver {
            server_root: server_root.to_owned(),
            ..self
        }
    }

    /// Returns the location of a content category under the source root.
    pub fn source_path(&self, kind: Source) -> PathBuf {
        match kind {
            Source::Assets => self.source.join("assets"),
            Source::Images => self.source_path(Source::Assets).join("images"),
            Source::Css => self.source_path(Source::Assets).join("css"),
            Source::Templates => {
                self.source_path(Source::Assets).join("templates")
            }
            Source::Content => self.source.join("content"),
            Source::Pages => self.source_path(Source::Content).join("pages"),
            Source::Articles => {
                self.source_path(Source::Content).join("articles")
            }
            Source::Index => self.source_path(Source::Content).join("index.md"),
        }
    }

    /// Returns the location of the template file `name`.
    pub fn template(&self, name: &str) -> PathBuf {
        self.source_path(Source::Templates).join(name)
    }

    /// Returns where a build artifact is written. For pages and articles the
    /// source file is relocated under the target root (or its `articles`
    /// directory) with an `html` extension.
    pub fn target_path(&self, kind: Target) -> PathBuf {
        match kind {
            Target::Cache => self.target.join(".cache"),
            Target::Images => self.target.join("images"),
            Target::Stylesheet => self.target.join("style.css"),
            Target::Index => self.target.join("index.html"),
            Target::Feed => self.target.join("atom.xml"),
            Target::Page(source) => {
                relocate(source, &self.target, HTML_EXTENSION)
            }
            Target::Article(source) => relocate(
                source,
                &self.target.join("articles"),
                HTML_EXTENSION,
            ),
        }
    }

    /// Returns the link emitted into generated markup for the article whose
    /// source file is `source`, e.g. `/blog/articles/hello.html`.
    ///
    /// This is derived from the source path itself. Deriving it from
    /// [`Resolver::target_path`] would leak the target root into the URL.
    pub fn server_link(&self, source: &Path) -> String {
        let name = relocate(source, Path::new(""), HTML_EXTENSION);
        self.link(&["articles", &name.to_string_lossy()])
    }

    /// Returns the link to a root-level artifact such as `style.css`. An empty
    /// `name` links to the site root itself.
    pub fn server_root_link(&self, name: &str) -> String {
        self.link(&[name])
    }

    fn link(&self, segments: &[&str]) -> String {
        let mut link = String::new();
        for segment in self
            .server_root
            .split('/')
            .chain(segments.iter().copied())
            .filter(|s| !s.is_empty())
        {
            link.push('/');
            link.push_str(segment);
        }
        if link.is_empty() || segments.last() == Some(&"") {
            link.push('/');
        }
        link
    }
}

/// Drops the directory component of `path`, re-parents its file stem under
/// `into`, and gives it the extension `extension`. Dots inside the stem are
/// preserved: `notes/a.b.md` relocated into `out` becomes `out/a.b.html`.
pub fn relocate(path: &Path, into: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.file_stem().unwrap_or_default());
    name.push(".");
    name.push(extension);
    into.join(name)
}

/// Returns true if `path` names a markdown file.
pub fn is_markdown(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == MARKDOWN_EXTENSION)
}
