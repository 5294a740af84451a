use crate::resolver::Resolver;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "blog.yaml";

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

fn default_target() -> PathBuf {
    PathBuf::from("_www")
}

#[derive(Deserialize)]
struct Project {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub author: Option<Author>,

    pub url: Url,

    #[serde(default)]
    pub source: PathBuf,

    #[serde(default = "default_target")]
    pub target: PathBuf,

    #[serde(default)]
    pub server_root: String,
}

/// Site-wide metadata made available to every template and to the feed.
#[derive(Clone, Debug, PartialEq)]
pub struct Site {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<Author>,

    /// Where the site is published, e.g. `https://example.github.io/`. Feed
    /// ids and links are made absolute against it.
    pub url: Url,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub site: Site,
    pub resolver: Resolver,

    /// Files every generated target depends on: the project file and the
    /// running binary, so that changing either rebuilds the site.
    pub implicit_dependencies: Vec<PathBuf>,
}

impl Config {
    /// Searches `dir` and its ancestors for [`PROJECT_FILE`] and loads the
    /// first one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        match find_project_file(dir.ancestors()) {
            Some(path) => Config::from_project_file(&path)
                .context("Loading configuration"),
            None => Err(anyhow!(
                "Could not find `{}` in `{}` or any parent directory",
                PROJECT_FILE,
                dir.display()
            )),
        }
    }

    /// Loads a project file. Its `source` and `target` directories are
    /// relative to the directory containing it.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let file = File::open(path).with_context(|| {
            format!("Opening project file `{}`", path.display())
        })?;
        let project: Project = serde_yaml::from_reader(file)
            .with_context(|| format!("Parsing `{}`", path.display()))?;
        let project_root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )
        })?;

        Ok(Config {
            site: Site {
                title: project.title,
                description: project.description,
                author: project.author,
                url: project.url,
            },
            resolver: Resolver::new(
                project_root.join(&project.source),
                project_root.join(&project.target),
                &project.server_root,
            ),
            implicit_dependencies: std::iter::once(path.to_owned())
                .chain(std::env::current_exe().ok())
                .collect(),
        })
    }

    /// Overrides the target root. Unlike the project file's `target`, a
    /// relative `target` is taken relative to `working_dir`, as paths given
    /// on the command line are.
    pub fn with_target(self, target: &Path, working_dir: &Path) -> Config {
        Config {
            resolver: self.resolver.with_target(working_dir.join(target)),
            ..self
        }
    }
}

// Returns the first of `dirs` holding a project file.
fn find_project_file<'a, I>(dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = &'a Path>,
{
    dirs.into_iter()
        .map(|dir| dir.join(PROJECT_FILE))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    const PROJECT: &str = "
title: My blog
url: https://example.github.io/
author:
  name: Jane
server_root: /my-blog
";

    #[test]
    fn test_from_project_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(PROJECT_FILE);
        fs::write(&path, PROJECT)?;

        let config = Config::from_project_file(&path)?;
        assert_eq!("My blog", config.site.title);
        assert_eq!(None, config.site.description);
        assert_eq!(
            Some(Author {
                name: "Jane".to_owned(),
                email: None
            }),
            config.site.author
        );
        assert_eq!(dir.path().join("_www"), config.resolver.target());
        assert_eq!("/my-blog", config.resolver.server_root());
        assert_eq!(
            dir.path().join("content/articles"),
            config
                .resolver
                .source_path(crate::resolver::Source::Articles)
        );
        Ok(())
    }

    #[test]
    fn test_from_directory_searches_ancestors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), PROJECT)?;
        let nested = dir.path().join("content/articles");
        fs::create_dir_all(&nested)?;

        let config = Config::from_directory(&nested)?;
        assert_eq!(dir.path().join("_www"), config.resolver.target());
        Ok(())
    }

    #[test]
    fn test_find_project_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("content/articles");
        fs::create_dir_all(&nested)?;
        // Only search within the temp dir; its real ancestors are unknown.
        let within: Vec<&Path> = nested
            .ancestors()
            .take_while(|ancestor| ancestor.starts_with(dir.path()))
            .collect();
        assert_eq!(3, within.len());

        assert_eq!(None, find_project_file(within.iter().copied()));

        fs::write(dir.path().join(PROJECT_FILE), PROJECT)?;
        assert_eq!(
            Some(dir.path().join(PROJECT_FILE)),
            find_project_file(within.iter().copied())
        );

        fs::write(nested.join(PROJECT_FILE), PROJECT)?;
        assert_eq!(
            Some(nested.join(PROJECT_FILE)),
            find_project_file(within.iter().copied())
        );
        Ok(())
    }

    #[test]
    fn test_with_target() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(PROJECT_FILE);
        fs::write(&path, PROJECT)?;
        let config = Config::from_project_file(&path)?;

        let config = config.with_target(Path::new("out"), Path::new("/work"));
        assert_eq!(Path::new("/work/out"), config.resolver.target());
        assert_eq!("/my-blog", config.resolver.server_root());

        let config =
            config.with_target(Path::new("/srv/www"), Path::new("/work"));
        assert_eq!(Path::new("/srv/www"), config.resolver.target());
        Ok(())
    }

    #[test]
    fn test_invalid_project_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(PROJECT_FILE);
        fs::write(&path, "title: [unterminated")?;
        assert!(Config::from_project_file(&path).is_err());
        Ok(())
    }
}
