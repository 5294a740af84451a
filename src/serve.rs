//! A development server for the built site. It serves the target directory
//! and rebuilds the site before every page request, so edits show up on
//! reload. Links in the generated pages carry the server root; the server
//! strips it so the site works locally as it would deployed.

use crate::build::build_site;
use crate::config::Config;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{anyhow, Result};
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_PORT: u16 = 8000;

struct State {
    config: Config,

    /// Serializes rebuilds; concurrent builds would race on the cache.
    building: Mutex<()>,
}

/// Builds the site, then serves it on `127.0.0.1:{port}` until interrupted.
pub fn serve(config: Config, port: u16) -> Result<()> {
    let summary =
        build_site(&config).map_err(|e| anyhow!("Building site: {}", e))?;
    info!("Built site: {}", summary);
    info!(
        "Serving `{}` on http://127.0.0.1:{}{}",
        config.resolver.target().display(),
        port,
        config.resolver.server_root_link(""),
    );
    let state = web::Data::new(State {
        config,
        building: Mutex::new(()),
    });
    actix_web::rt::System::new().block_on(run(state, port))?;
    Ok(())
}

async fn run(state: web::Data<State>, port: u16) -> std::io::Result<()> {
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .default_service(web::to(handle))
    })
    .bind(("127.0.0.1", port))?
    .run()
    .await
}

async fn handle(req: HttpRequest, state: web::Data<State>) -> HttpResponse {
    let prefix = state.config.resolver.server_root_link("");
    let relative = match request_path(&prefix, req.path()) {
        Some(relative) => relative,
        None => return HttpResponse::NotFound().finish(),
    };

    if is_page(&relative) {
        let state = state.clone();
        let rebuilt = web::block(move || rebuild(&state)).await;
        match rebuilt {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Rebuilding site: {}", e),
            Err(e) => error!("Rebuilding site: {}", e),
        }
    }

    let path = match resolve(state.config.resolver.target(), &relative) {
        Some(path) => path,
        None => {
            debug!("404 `{}`", req.path());
            return HttpResponse::NotFound().finish();
        }
    };
    let content_type = content_type(&path);
    match web::block(move || std::fs::read(&path)).await {
        Ok(Ok(bytes)) => {
            HttpResponse::Ok().content_type(content_type).body(bytes)
        }
        Ok(Err(e)) => {
            error!("Reading `{}`: {}", req.path(), e);
            HttpResponse::InternalServerError().finish()
        }
        Err(e) => {
            error!("Reading `{}`: {}", req.path(), e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

fn rebuild(state: &State) -> std::result::Result<(), String> {
    let _guard = state
        .building
        .lock()
        .map_err(|_| "a previous build panicked".to_owned())?;
    build_site(&state.config)
        .map(|summary| {
            if summary.changed() {
                info!("Rebuilt site: {}", summary);
            }
        })
        .map_err(|e| e.to_string())
}

/// Turns a request path into a path relative to the target directory. The
/// server root prefix is stripped when present. Returns `None` for paths
/// that try to leave the target directory or reach hidden files such as the
/// build cache.
fn request_path(prefix: &str, path: &str) -> Option<PathBuf> {
    let path = if path == prefix.trim_end_matches('/') {
        ""
    } else {
        path.strip_prefix(prefix).unwrap_or(path)
    };
    let mut relative = PathBuf::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            segment if segment.starts_with('.') => return None,
            segment if segment.contains('\\') => return None,
            segment => relative.push(segment),
        }
    }
    Some(relative)
}

// Directories and extensionless paths are treated as pages.
fn is_page(relative: &Path) -> bool {
    match relative.extension() {
        None => true,
        Some(ext) => ext == "html",
    }
}

// Finds the file to serve: the path itself, `index.html` in a directory, or
// the path with an `.html` extension.
fn resolve(target: &Path, relative: &Path) -> Option<PathBuf> {
    let path = target.join(relative);
    if path.is_dir() {
        let index = path.join("index.html");
        return if index.is_file() { Some(index) } else { None };
    }
    if path.is_file() {
        return Some(path);
    }
    if relative.extension().is_none() {
        let html = path.with_extension("html");
        if html.is_file() {
            return Some(html);
        }
    }
    None
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("xml") => "application/atom+xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_request_path() {
        assert_eq!(Some(PathBuf::new()), request_path("/", "/"));
        assert_eq!(
            Some(PathBuf::from("articles/a.html")),
            request_path("/", "/articles/a.html")
        );
        assert_eq!(
            Some(PathBuf::from("articles/a.html")),
            request_path("/blog/", "/blog/articles/a.html")
        );
        assert_eq!(Some(PathBuf::new()), request_path("/blog/", "/blog"));
        assert_eq!(
            Some(PathBuf::from("style.css")),
            request_path("/blog/", "/style.css")
        );
        assert_eq!(None, request_path("/", "/../etc/passwd"));
        assert_eq!(None, request_path("/", "/images/../../secret"));
        assert_eq!(None, request_path("/", "/.cache"));
        assert_eq!(None, request_path("/blog/", "/blog/.cache"));
        assert_eq!(None, request_path("/", "/images/.hidden/a.png"));
        assert_eq!(
            Some(PathBuf::from("blogging/x.html")),
            request_path("/blog/", "/blogging/x.html")
        );
    }

    #[test]
    fn test_resolve() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("articles"))?;
        fs::write(dir.path().join("index.html"), "")?;
        fs::write(dir.path().join("about.html"), "")?;

        assert_eq!(
            Some(dir.path().join("index.html")),
            resolve(dir.path(), Path::new(""))
        );
        assert_eq!(
            Some(dir.path().join("about.html")),
            resolve(dir.path(), Path::new("about"))
        );
        assert_eq!(None, resolve(dir.path(), Path::new("articles")));
        assert_eq!(None, resolve(dir.path(), Path::new("missing.css")));
        Ok(())
    }

    #[test]
    fn test_is_page() {
        assert!(is_page(Path::new("")));
        assert!(is_page(Path::new("articles/a.html")));
        assert!(!is_page(Path::new("style.css")));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(
            "text/css; charset=utf-8",
            content_type(Path::new("style.css"))
        );
        assert_eq!("application/atom+xml", content_type(Path::new("atom.xml")));
        assert_eq!(
            "application/octet-stream",
            content_type(Path::new("archive.tar"))
        );
    }
}
