//! Exports the [`build_site`] function which stitches together the steps of
//! building the site: copying images, bundling stylesheets, rendering pages
//! and articles, rendering the index, and generating the Atom feed. Each step
//! goes through a [`Pipeline`] so that only out-of-date targets are rebuilt.

use crate::article::{self, Article};
use crate::cache;
use crate::config::Config;
use crate::feed;
use crate::markdown;
use crate::metadata::PageMeta;
use crate::pipeline::{list_files, Error, Pipeline, Result, Summary};
use crate::resolver::{is_markdown, Resolver, Source, Target};
use crate::template::{object, optional, string, strings, Template};
use gtmpl::Value;
use log::debug;
use std::path::{Path, PathBuf};

/// Every generated page is `layout.html` wrapped around one of these.
const LAYOUT_TEMPLATE: &str = "layout.html";
const PAGE_TEMPLATE: &str = "page.html";
const ARTICLE_TEMPLATE: &str = "article.html";
const INDEX_TEMPLATE: &str = "index.html";

/// Builds the site described by `config` into its target directory and
/// returns what was done.
pub fn build_site(config: &Config) -> Result<Summary> {
    let resolver = &config.resolver;
    debug!(
        "Building `{}` into `{}`",
        resolver.source().display(),
        resolver.target().display()
    );
    let mut pipeline = Pipeline::new(
        resolver.target_path(Target::Cache),
        config.implicit_dependencies.clone(),
    )
    .with_fingerprint(fingerprint(config));
    let site = site_value(config);

    copy_images(&mut pipeline, resolver)?;
    write_stylesheet(&mut pipeline, resolver)?;
    write_pages(&mut pipeline, resolver, &site)?;

    let sources = article::sources(resolver)?;
    let articles = article::load_all(resolver, &sources)?;
    write_articles(&mut pipeline, resolver, &site, &articles)?;
    write_index(&mut pipeline, resolver, &site, &sources, &articles)?;
    pipeline.write_target(
        &resolver.target_path(Target::Feed),
        &sources,
        || feed::feed_xml(&config.site, resolver, &articles),
    )?;

    let summary = pipeline.finish()?;
    debug!("Built site: {}", summary);
    Ok(summary)
}

fn copy_images(pipeline: &mut Pipeline, resolver: &Resolver) -> Result<()> {
    let images = resolver.source_path(Source::Images);
    if !images.is_dir() {
        debug!("No images in `{}`", images.display());
        return Ok(());
    }
    pipeline.copy_directory(&images, &resolver.target_path(Target::Images))
}

// Concatenates every stylesheet, in name order, into a single `style.css`.
fn write_stylesheet(pipeline: &mut Pipeline, resolver: &Resolver) -> Result<()> {
    let sheets = list_files(&resolver.source_path(Source::Css), |path| {
        path.extension().map_or(false, |ext| ext == "css")
    })?;
    if sheets.is_empty() {
        debug!("No stylesheets to bundle");
        return Ok(());
    }
    pipeline.write_target(
        &resolver.target_path(Target::Stylesheet),
        &sheets,
        || -> Result<String> {
            let mut css = String::new();
            for sheet in &sheets {
                css.push_str(&read(sheet)?);
                if !css.ends_with('\n') {
                    css.push('\n');
                }
            }
            Ok(css)
        },
    )?;
    Ok(())
}

fn write_pages(
    pipeline: &mut Pipeline,
    resolver: &Resolver,
    site: &Value,
) -> Result<()> {
    let pages = list_files(&resolver.source_path(Source::Pages), is_markdown)?;
    if pages.is_empty() {
        debug!("No pages to render");
        return Ok(());
    }
    let template = load_template(resolver, PAGE_TEMPLATE)?;
    for source in &pages {
        pipeline.write_target(
            &resolver.target_path(Target::Page(source)),
            &dependencies(&template, &[source.as_path()]),
            || render_page(&template, site, source, None),
        )?;
    }
    Ok(())
}

fn write_articles(
    pipeline: &mut Pipeline,
    resolver: &Resolver,
    site: &Value,
    articles: &[Article],
) -> Result<()> {
    if articles.is_empty() {
        debug!("No articles to render");
        return Ok(());
    }
    let template = load_template(resolver, ARTICLE_TEMPLATE)?;
    for article in articles {
        pipeline.write_target(
            &resolver.target_path(Target::Article(&article.source)),
            &dependencies(&template, &[article.source.as_path()]),
            || -> Result<String> {
                Ok(template.render(object(vec![
                    ("site", site.clone()),
                    ("title", string(article.meta.title.as_str())),
                    ("description", optional(&article.meta.description)),
                    ("article", article.to_value()),
                    ("content", string(article.body.as_str())),
                ]))?)
            },
        )?;
    }
    Ok(())
}

// The index depends on every article source in addition to its own, so adding
// or removing an article changes its dependency set and forces a rebuild.
fn write_index(
    pipeline: &mut Pipeline,
    resolver: &Resolver,
    site: &Value,
    sources: &[PathBuf],
    articles: &[Article],
) -> Result<()> {
    let template = load_template(resolver, INDEX_TEMPLATE)?;
    let index = resolver.source_path(Source::Index);
    let mut deps: Vec<&Path> = sources.iter().map(|p| p.as_path()).collect();
    let source = if index.is_file() {
        deps.push(&index);
        Some(index.as_path())
    } else {
        debug!("No `{}`; the index will only list articles", index.display());
        None
    };
    let listing =
        Value::Array(articles.iter().map(|a| a.summarize()).collect());
    pipeline.write_target(
        &resolver.target_path(Target::Index),
        &dependencies(&template, &deps),
        || -> Result<String> {
            match source {
                Some(source) => {
                    render_page(&template, site, source, Some(listing))
                }
                None => Ok(template.render(object(vec![
                    ("site", site.clone()),
                    ("title", title(site, &None)),
                    ("description", Value::Nil),
                    ("page", page_value(&PageMeta::default())),
                    ("content", string("")),
                    ("articles", listing),
                ]))?),
            }
        },
    )?;
    Ok(())
}

// Renders a markdown page (or the index, when `articles` is given) through
// `template`.
fn render_page(
    template: &Template,
    site: &Value,
    source: &Path,
    articles: Option<Value>,
) -> Result<String> {
    let input = read(source)?;
    let (meta, body) = PageMeta::parse(&input).map_err(|err| {
        Error::from(err).annotate(format!("parsing page `{}`", source.display()))
    })?;
    let mut fields = vec![
        ("site", site.clone()),
        ("title", title(site, &meta.title)),
        ("description", optional(&meta.description)),
        ("page", page_value(&meta)),
        ("content", string(markdown::to_html(body))),
    ];
    if let Some(articles) = articles {
        fields.push(("articles", articles));
    }
    Ok(template.render(object(fields))?)
}

fn page_value(meta: &PageMeta) -> Value {
    object(vec![
        ("title", optional(&meta.title)),
        ("description", optional(&meta.description)),
        ("tags", strings(&meta.tags)),
    ])
}

// A page's title, falling back to the site's.
fn title(site: &Value, title: &Option<String>) -> Value {
    match (title, site) {
        (Some(title), _) => string(title.as_str()),
        (None, Value::Object(site)) => {
            site.get("title").cloned().unwrap_or(Value::Nil)
        }
        (None, _) => Value::Nil,
    }
}

/// The values every template can reach under `.site`.
pub fn site_value(config: &Config) -> Value {
    let resolver = &config.resolver;
    object(vec![
        ("title", string(config.site.title.as_str())),
        ("description", optional(&config.site.description)),
        (
            "author",
            optional(&config.site.author.as_ref().map(|a| a.name.clone())),
        ),
        ("url", string(config.site.url.as_str())),
        ("home", string(resolver.server_root_link(""))),
        ("stylesheet", string(resolver.server_root_link("style.css"))),
        ("feed", string(resolver.server_root_link(feed::FEED_FILE))),
    ])
}

// Hashes everything that shapes rendered output without being a file the
// targets depend on: the site metadata and the server root links are built
// from.
fn fingerprint(config: &Config) -> String {
    let site = &config.site;
    let author = site.author.as_ref();
    let fields = [
        config.resolver.server_root(),
        site.title.as_str(),
        site.description.as_deref().unwrap_or_default(),
        author.map_or("", |a| a.name.as_str()),
        author.and_then(|a| a.email.as_deref()).unwrap_or_default(),
        site.url.as_str(),
    ];
    cache::hash(fields.join("\n").as_bytes())
}

fn load_template(resolver: &Resolver, name: &str) -> Result<Template> {
    Ok(Template::load(&[
        resolver.template(LAYOUT_TEMPLATE),
        resolver.template(name),
    ])?)
}

fn dependencies(template: &Template, sources: &[&Path]) -> Vec<PathBuf> {
    template
        .files()
        .iter()
        .cloned()
        .chain(sources.iter().map(|p| p.to_path_buf()))
        .collect()
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| Error::Io {
        path: path.to_owned(),
        err,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Site;
    use std::fs;
    use url::Url;

    const LAYOUT: &str = r#"<html><head><title>{{.title}}</title><link rel="stylesheet" href="{{.site.stylesheet}}"></head><body>{{template "content" .}}</body></html>"#;
    const PAGE: &str = r#"{{define "content"}}{{.content}}{{end}}"#;
    const ARTICLE: &str =
        r#"{{define "content"}}<h1>{{.article.title}}</h1><time>{{.article.date}}</time>{{.content}}{{end}}"#;
    const INDEX: &str = r#"{{define "content"}}{{.content}}<ul>{{range .articles}}<li><a href="{{.link}}">{{.title}}</a></li>{{end}}</ul>{{end}}"#;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project(root: &Path) -> Config {
        let resolver = Resolver::new(root, root.join("_www"), "/yocaml_blog");
        write(&resolver.template(LAYOUT_TEMPLATE), LAYOUT);
        write(&resolver.template(PAGE_TEMPLATE), PAGE);
        write(&resolver.template(ARTICLE_TEMPLATE), ARTICLE);
        write(&resolver.template(INDEX_TEMPLATE), INDEX);
        write(
            &resolver.source_path(Source::Css).join("a.css"),
            "body { margin: 0 }",
        );
        write(
            &resolver.source_path(Source::Css).join("b.css"),
            "h1 { color: red }\n",
        );
        write(&resolver.source_path(Source::Images).join("logo.png"), "png");
        write(
            &resolver.source_path(Source::Index),
            "---\ntitle: Home\n---\nWelcome!",
        );
        write(
            &resolver.source_path(Source::Pages).join("about.md"),
            "---\ntitle: About\n---\nAbout me.",
        );
        write(
            &resolver
                .source_path(Source::Articles)
                .join("my-first-post.md"),
            "---\ntitle: My first post\ndate: 2021-10-01\nsynopsis: Hello\n---\nFirst!",
        );
        Config {
            site: Site {
                title: "A blog".to_owned(),
                description: None,
                author: None,
                url: Url::parse("https://example.github.io/").unwrap(),
            },
            resolver,
            implicit_dependencies: Vec::new(),
        }
    }

    fn read_target(config: &Config, target: Target) -> String {
        fs::read_to_string(config.resolver.target_path(target)).unwrap()
    }

    #[test]
    fn test_build_site() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let summary = build_site(&config)?;
        // image, stylesheet, page, article, index, feed
        assert_eq!(6, summary.created);

        let article_source = config
            .resolver
            .source_path(Source::Articles)
            .join("my-first-post.md");
        let article = read_target(&config, Target::Article(&article_source));
        assert!(article.contains("<h1>My first post</h1>"));
        assert!(article.contains("<time>2021-10-01</time>"));
        assert!(article.contains("<p>First!</p>"));
        assert!(article.contains(r#"href="/yocaml_blog/style.css""#));
        assert!(dir.path().join("_www/articles/my-first-post.html").is_file());

        let index = read_target(&config, Target::Index);
        assert!(index.contains("<title>Home</title>"));
        assert!(index.contains("<p>Welcome!</p>"));
        assert!(index.contains(
            r#"<a href="/yocaml_blog/articles/my-first-post.html">My first post</a>"#
        ));

        let about = read_target(
            &config,
            Target::Page(
                &config.resolver.source_path(Source::Pages).join("about.md"),
            ),
        );
        assert!(about.contains("<title>About</title>"));
        assert!(dir.path().join("_www/about.html").is_file());

        assert_eq!(
            "body { margin: 0 }\nh1 { color: red }\n",
            read_target(&config, Target::Stylesheet)
        );
        assert!(dir.path().join("_www/images/logo.png").is_file());

        let feed = read_target(&config, Target::Feed);
        assert!(feed.contains(
            "https://example.github.io/yocaml_blog/articles/my-first-post.html"
        ));
        assert!(config.resolver.target_path(Target::Cache).is_file());
        Ok(())
    }

    #[test]
    fn test_rebuild_is_incremental() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        build_site(&config)?;

        let summary = build_site(&config)?;
        assert_eq!(0, summary.written());
        assert_eq!(6, summary.skipped);

        write(
            &config
                .resolver
                .source_path(Source::Articles)
                .join("second.md"),
            "---\ntitle: Second\ndate: 2021-11-01\n---\nSecond!",
        );
        let summary = build_site(&config)?;
        // the new article, plus the index and feed that list it
        assert_eq!(1, summary.created);
        assert_eq!(2, summary.updated);
        assert!(read_target(&config, Target::Index).contains("Second"));
        Ok(())
    }

    #[test]
    fn test_server_root_change_rebuilds() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let mut config = project(dir.path());
        config.resolver = config.resolver.clone().with_server_root("/old");
        build_site(&config)?;

        config.resolver = config.resolver.clone().with_server_root("/new");
        let summary = build_site(&config)?;
        // page, article, index and feed; the stylesheet holds no links
        assert_eq!(4, summary.updated);
        assert_eq!(1, summary.unchanged);

        let article_source = config
            .resolver
            .source_path(Source::Articles)
            .join("my-first-post.md");
        let article = read_target(&config, Target::Article(&article_source));
        assert!(article.contains(r#"href="/new/style.css""#));
        assert!(!article.contains("/old/"));
        assert!(read_target(&config, Target::Index)
            .contains(r#"<a href="/new/articles/my-first-post.html">"#));
        let feed = read_target(&config, Target::Feed);
        assert!(feed
            .contains("https://example.github.io/new/articles/my-first-post.html"));
        assert!(!feed.contains("/old/"));

        let summary = build_site(&config)?;
        assert_eq!(0, summary.written());
        Ok(())
    }

    #[test]
    fn test_removed_article_is_deleted() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let source = config
            .resolver
            .source_path(Source::Articles)
            .join("second.md");
        write(&source, "---\ntitle: Second\ndate: 2021-11-01\n---\nSecond!");
        build_site(&config)?;
        let target = config.resolver.target_path(Target::Article(&source));
        assert!(target.is_file());

        fs::remove_file(&source).unwrap();
        let summary = build_site(&config)?;
        assert_eq!(1, summary.removed);
        assert!(!target.exists());
        assert!(!read_target(&config, Target::Index).contains("Second"));
        assert!(!read_target(&config, Target::Feed).contains("second.html"));
        Ok(())
    }

    #[test]
    fn test_build_without_index_source() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        fs::remove_file(config.resolver.source_path(Source::Index)).unwrap();
        build_site(&config)?;
        let index = read_target(&config, Target::Index);
        assert!(index.contains("<title>A blog</title>"));
        assert!(index.contains("My first post"));
        Ok(())
    }

    #[test]
    fn test_broken_article_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        write(
            &config.resolver.source_path(Source::Articles).join("broken.md"),
            "---\ntitle: Broken\n",
        );
        let err = build_site(&config).unwrap_err();
        assert!(err.to_string().contains("broken.md"));
    }
}
