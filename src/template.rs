//! Loads and applies [`gtmpl`] templates. A template is assembled from several
//! files (typically `layout.html` followed by a kind-specific file such as
//! `article.html`) which are concatenated and parsed as one, so the specific
//! file can `{{define "content"}}` what the layout invokes with
//! `{{template "content" .}}`.

use gtmpl::{Context, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A parsed template plus the files it was built from.
pub struct Template {
    template: gtmpl::Template,
    files: Vec<PathBuf>,
}

impl Template {
    /// Loads the template files' contents, appends them to one another, and
    /// parses the result into a template.
    pub fn load<P: AsRef<Path>>(files: &[P]) -> Result<Template> {
        let mut contents = String::new();
        for file in files {
            use std::io::Read;
            let file = file.as_ref();
            File::open(file)
                .and_then(|mut f| f.read_to_string(&mut contents))
                .map_err(|err| Error::Open {
                    path: file.to_owned(),
                    err,
                })?;
            contents.push(' ');
        }

        let mut template = gtmpl::Template::default();
        template.parse(&contents).map_err(Error::Parse)?;
        Ok(Template {
            template,
            files: files.iter().map(|f| f.as_ref().to_owned()).collect(),
        })
    }

    /// The files this template was assembled from. A page rendered with this
    /// template depends on all of them.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Applies the template to `value`.
    pub fn render(&self, value: Value) -> Result<String> {
        let mut out: Vec<u8> = Vec::new();
        let context = Context::from(value).map_err(Error::Render)?;
        self.template
            .execute(&mut out, &context)
            .map_err(Error::Render)?;
        String::from_utf8(out).map_err(|_| Error::NotUtf8)
    }
}

/// Builds a [`Value::Object`] from key/value pairs.
pub fn object<I>(fields: I) -> Value
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    let mut m: HashMap<String, Value> = HashMap::new();
    for (k, v) in fields {
        m.insert(k.to_owned(), v);
    }
    Value::Object(m)
}

/// Converts a string into a template value.
pub fn string<S: Into<String>>(s: S) -> Value {
    Value::String(s.into())
}

/// Converts an optional string into a template value; `None` becomes
/// [`Value::Nil`] so templates can test it with `{{if}}`.
pub fn optional(s: &Option<String>) -> Value {
    match s {
        Some(s) => Value::String(s.clone()),
        None => Value::Nil,
    }
}

/// Converts a list of strings into a template value.
pub fn strings(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

/// The result of a template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or applying a template.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    Parse(String),

    /// Returned for errors while applying a template.
    Render(String),

    /// Returned when a template renders bytes that aren't UTF-8.
    NotUtf8,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::Parse(err) => write!(f, "Parsing template: {}", err),
            Error::Render(err) => write!(f, "Applying template: {}", err),
            Error::NotUtf8 => write!(f, "Template output is not valid UTF-8"),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Parse(_) => None,
            Error::Render(_) => None,
            Error::NotUtf8 => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_layout_and_content() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let layout = dir.path().join("layout.html");
        let page = dir.path().join("page.html");
        fs::write(
            &layout,
            r#"<title>{{.site.title}}</title>{{template "content" .}}"#,
        )?;
        fs::write(
            &page,
            r#"{{define "content"}}<main>{{.content}}</main>{{end}}"#,
        )?;

        let template = Template::load(&[&layout, &page])?;
        assert_eq!(vec![layout.clone(), page.clone()], template.files());

        let html = template.render(object(vec![
            ("site", object(vec![("title", string("Blog"))])),
            ("content", string("<p>hi</p>")),
        ]))?;
        assert_eq!("<title>Blog</title><main><p>hi</p></main>", html.trim());
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = Template::load(&[Path::new("/nonexistent/layout.html")]);
        assert!(matches!(result, Err(Error::Open { .. })));
    }

    #[test]
    fn test_optional() {
        assert!(matches!(optional(&None), Value::Nil));
        assert!(matches!(optional(&Some("x".to_owned())), Value::String(_)));
    }
}
