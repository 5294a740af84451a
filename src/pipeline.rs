//! The primitives the site build is composed from: copying files, copying
//! directories, and generating targets from their dependencies. Generation
//! goes through the [`Cache`] so unchanged targets are neither rebuilt nor
//! rewritten, and targets left over from sources that no longer exist are
//! removed.

use crate::cache::{self, Cache, Entry};
use log::{debug, info};
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a pipeline step did to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// The target didn't exist and was written.
    Created,

    /// The target existed and was rewritten with new content.
    Updated,

    /// The target was regenerated but its content didn't change, so it wasn't
    /// rewritten.
    Unchanged,

    /// The target was up to date and wasn't regenerated at all.
    Skipped,

    /// The target was generated by an earlier build but nothing produces it
    /// anymore, so it was deleted.
    Removed,
}

/// Counts the [`Status`]es of the steps of a build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub removed: usize,
}

impl Summary {
    pub fn record(&mut self, status: Status) {
        match status {
            Status::Created => self.created += 1,
            Status::Updated => self.updated += 1,
            Status::Unchanged => self.unchanged += 1,
            Status::Skipped => self.skipped += 1,
            Status::Removed => self.removed += 1,
        }
    }

    /// The number of targets written to disk.
    pub fn written(&self) -> usize {
        self.created + self.updated
    }

    /// True if the build changed anything on disk.
    pub fn changed(&self) -> bool {
        self.written() + self.removed > 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} up to date, {} removed",
            self.created, self.updated, self.unchanged, self.skipped, self.removed
        )
    }
}

/// Runs build steps against a [`Cache`].
pub struct Pipeline {
    cache: Cache,
    cache_path: PathBuf,

    /// Dependencies of every generated target, typically the build binary.
    implicit: Vec<PathBuf>,

    /// Set when the cache was built with other settings; every generated
    /// target is then out of date.
    stale: bool,

    /// The generated targets this build has produced or found up to date.
    visited: BTreeSet<PathBuf>,

    summary: Summary,
}

impl Pipeline {
    /// Creates a pipeline whose cache lives at `cache_path`, loading any cache
    /// left by a previous build.
    pub fn new(cache_path: PathBuf, implicit: Vec<PathBuf>) -> Pipeline {
        Pipeline {
            cache: Cache::load(&cache_path),
            cache_path,
            implicit,
            stale: false,
            visited: BTreeSet::new(),
            summary: Summary::default(),
        }
        .with_fingerprint(String::new())
    }

    /// Sets the fingerprint of the settings targets are rendered with (the
    /// server root and site metadata, say). If the cache was written under a
    /// different fingerprint, every generated target is rendered again.
    pub fn with_fingerprint(mut self, fingerprint: String) -> Pipeline {
        self.stale = self.cache.fingerprint() != fingerprint;
        if self.stale && !self.cache.is_empty() {
            info!("Build settings changed; regenerating every target");
        }
        self.cache.set_fingerprint(fingerprint);
        self
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Deletes the generated targets this build didn't visit, persists the
    /// cache and returns the build summary. Only call it once every step has
    /// run, or targets of the skipped steps are deleted.
    pub fn finish(mut self) -> Result<Summary> {
        for target in self.cache.retain(&self.visited) {
            match std::fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&target, e)),
            }
            self.report(&target, Status::Removed);
        }
        self.cache.save(&self.cache_path).map_err(|err| Error::Io {
            path: self.cache_path.clone(),
            err,
        })?;
        Ok(self.summary)
    }

    /// Copies `src` to `dst` if `dst` is missing or older than `src`.
    pub fn copy_file(&mut self, src: &Path, dst: &Path) -> Result<Status> {
        let status = if !dst.exists() {
            Status::Created
        } else if is_newer(src, dst).map_err(|err| Error::io(src, err))? {
            Status::Updated
        } else {
            Status::Skipped
        };
        if status != Status::Skipped {
            create_parent(dst)?;
            std::fs::copy(src, dst).map_err(|err| Error::io(dst, err))?;
        }
        self.report(dst, status);
        Ok(status)
    }

    /// Copies every file under `src` to the same relative location under
    /// `dst`.
    pub fn copy_directory(&mut self, src: &Path, dst: &Path) -> Result<()> {
        let walker = WalkDir::new(src)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));
        for result in walker {
            let entry = result?;
            if !entry.file_type().is_file() {
                continue;
            }
            // strip_prefix shouldn't fail since `src` is always an ancestor
            // of the walked entries
            let relative = match entry.path().strip_prefix(src) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            self.copy_file(entry.path(), &dst.join(relative))?;
        }
        Ok(())
    }

    /// Generates `target` from `dependencies`. `render` is only called when
    /// the cache says the target is out of date, and the result is only
    /// written when it differs from what was last written.
    pub fn write_target<F, E>(
        &mut self,
        target: &Path,
        dependencies: &[PathBuf],
        render: F,
    ) -> Result<Status>
    where
        F: FnOnce() -> std::result::Result<String, E>,
        E: Into<Error>,
    {
        let dependencies: BTreeSet<PathBuf> = dependencies
            .iter()
            .chain(self.implicit.iter())
            .cloned()
            .collect();
        self.visited.insert(target.to_owned());

        if !self.stale && !self.cache.needs_update(target, &dependencies) {
            self.report(target, Status::Skipped);
            return Ok(Status::Skipped);
        }

        let content = render().map_err(|err| {
            Error::Annotated(
                format!("building `{}`", target.display()),
                Box::new(err.into()),
            )
        })?;
        let hash = cache::hash(content.as_bytes());
        let exists = target.exists();
        let status = match self.cache.get(target) {
            Some(entry) if exists && entry.hash == hash => Status::Unchanged,
            _ if exists => Status::Updated,
            _ => Status::Created,
        };

        if status != Status::Unchanged {
            create_parent(target)?;
            std::fs::write(target, &content)
                .map_err(|err| Error::io(target, err))?;
        }
        self.cache.insert(
            target.to_owned(),
            Entry {
                hash,
                dependencies,
                last_build: cache::now_millis(),
            },
        );
        self.report(target, status);
        Ok(status)
    }

    fn report(&mut self, target: &Path, status: Status) {
        match status {
            Status::Created => info!("Created `{}`", target.display()),
            Status::Updated => info!("Updated `{}`", target.display()),
            Status::Unchanged => debug!("Unchanged `{}`", target.display()),
            Status::Skipped => debug!("Up to date `{}`", target.display()),
            Status::Removed => info!("Removed `{}`", target.display()),
        }
        self.summary.record(status);
    }
}

/// Returns the files directly inside `dir` that satisfy `filter`, sorted by
/// name. A missing directory has no files.
pub fn list_files<F>(dir: &Path, filter: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut files = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Skipping missing directory `{}`", dir.display());
            return Ok(files);
        }
        Err(e) => return Err(Error::io(dir, e)),
    };
    for result in entries {
        let entry = result.map_err(|err| Error::io(dir, err))?;
        let path = entry.path();
        if path.is_file() && filter(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_newer(src: &Path, dst: &Path) -> io::Result<bool> {
    Ok(std::fs::metadata(src)?.modified()? > std::fs::metadata(dst)?.modified()?)
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|err| Error::io(dir, err))
        }
        _ => Ok(()),
    }
}

/// The result of a fallible pipeline step.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a pipeline step.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O errors reading or writing `path`.
    Io { path: PathBuf, err: io::Error },

    /// Returned for errors walking a directory.
    WalkDir(walkdir::Error),

    /// Returned when parsing a document's front matter fails.
    Metadata(crate::metadata::Error),

    /// Returned when loading or applying a template fails.
    Template(crate::template::Error),

    /// Returned when generating the feed fails.
    Feed(crate::feed::Error),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl Error {
    fn io(path: &Path, err: io::Error) -> Error {
        Error::Io {
            path: path.to_owned(),
            err,
        }
    }

    /// Wraps the error with a description of what was being done.
    pub fn annotate<S: Into<String>>(self, annotation: S) -> Error {
        Error::Annotated(annotation.into(), Box::new(self))
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io { path, err } => write!(f, "`{}`: {}", path.display(), err),
            Error::WalkDir(err) => err.fmt(f),
            Error::Metadata(err) => err.fmt(f),
            Error::Template(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { path: _, err } => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::Metadata(err) => Some(err),
            Error::Template(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator while walking directories.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

impl From<crate::metadata::Error> for Error {
    fn from(err: crate::metadata::Error) -> Error {
        Error::Metadata(err)
    }
}

impl From<crate::template::Error> for Error {
    fn from(err: crate::template::Error) -> Error {
        Error::Template(err)
    }
}

impl From<crate::feed::Error> for Error {
    fn from(err: crate::feed::Error) -> Error {
        Error::Feed(err)
    }
}
