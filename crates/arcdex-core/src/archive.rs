use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{ArchiveSource, DocumentStream};
use crate::types::{ArchiveIdentity, Document};

const ARTICLE_EXTENSIONS: &[&str] = &["txt", "md", "html", "htm"];
const REDIRECT_MARKER: &str = "#REDIRECT";

/// An archive packaged as a directory tree of article files.
///
/// Articles are `.txt`, `.md`, `.html` and `.htm` files, visited in sorted
/// path order. Files whose first line starts with `#REDIRECT` are aliases
/// and are not yielded as documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryArchive;

impl DirectoryArchive {
    pub fn new() -> Self {
        Self
    }

    fn list_articles(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(Error::ArchiveOpen { path: root.to_path_buf(), reason: "not a directory".into() });
        }
        let mut articles = Vec::new();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::ArchiveOpen { path: root.to_path_buf(), reason: e.to_string() })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_article = entry
                .path()
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ARTICLE_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)));
            if is_article {
                articles.push(entry.into_path());
            }
        }
        Ok(articles)
    }

    fn articles(&self, root: &Path) -> Result<impl Iterator<Item = Result<(PathBuf, String)>>> {
        let root = root.to_path_buf();
        let files = self.list_articles(&root)?;
        Ok(files.into_iter().filter_map(move |path| match read_file_content(&path) {
            Ok(content) if is_redirect(&content) => None,
            Ok(content) => Some(Ok((path, content))),
            Err(e) => Some(Err(Error::indexing(format!("{}: {}", path.display(), e)))),
        }))
    }
}

impl ArchiveSource for DirectoryArchive {
    fn resolve_identity(&self, archive: &Path) -> Result<ArchiveIdentity> {
        let mut hasher = blake3::Hasher::new();
        for path in self.list_articles(archive)? {
            let bytes = fs::read(&path)
                .map_err(|e| Error::ArchiveOpen { path: path.clone(), reason: e.to_string() })?;
            hasher.update(article_url(archive, &path).as_bytes());
            hasher.update(&[0]);
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
        let identity = ArchiveIdentity::from_hash(hasher.finalize());
        debug!(archive = %archive.display(), %identity, "resolved archive identity");
        Ok(identity)
    }

    /// Only the first line of each article is read.
    fn document_count(&self, archive: &Path) -> Result<usize> {
        let mut count = 0;
        for path in self.list_articles(archive)? {
            let first = read_first_line(&path)
                .map_err(|e| Error::ArchiveOpen { path: path.clone(), reason: e.to_string() })?;
            if !is_redirect(&first) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Paths, sizes and modification times of all article files.
    fn revision(&self, archive: &Path) -> Result<Option<String>> {
        let mut hasher = blake3::Hasher::new();
        for path in self.list_articles(archive)? {
            let meta = fs::metadata(&path)
                .map_err(|e| Error::ArchiveOpen { path: path.clone(), reason: e.to_string() })?;
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_nanos());
            hasher.update(article_url(archive, &path).as_bytes());
            hasher.update(&[0]);
            hasher.update(&meta.len().to_le_bytes());
            hasher.update(&modified.to_le_bytes());
        }
        Ok(Some(hasher.finalize().to_hex().to_string()))
    }

    fn documents(&self, archive: &Path) -> Result<DocumentStream> {
        let root = archive.to_path_buf();
        let docs = self.articles(archive)?.map(move |article| {
            let (path, content) = article?;
            Ok(Document { url: article_url(&root, &path), title: extract_title(&path, &content), body: content })
        });
        Ok(Box::new(docs))
    }
}

fn read_file_content(file_path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(file_path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn read_first_line(file_path: &Path) -> std::io::Result<String> {
    let mut line = Vec::new();
    BufReader::new(File::open(file_path)?).read_until(b'\n', &mut line)?;
    Ok(String::from_utf8_lossy(&line).into_owned())
}

fn is_redirect(content: &str) -> bool {
    content
        .lines()
        .next()
        .is_some_and(|line| line.trim_start().starts_with(REDIRECT_MARKER))
}

fn article_url(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn extract_title(path: &Path, content: &str) -> String {
    if let Some(title) = html_title(content) {
        return title;
    }
    let is_markup = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
    if !is_markup {
        if let Some(line) = content.lines().map(str::trim).find(|l| !l.is_empty()) {
            return line.trim_start_matches('#').trim().to_string();
        }
    }
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

fn html_title(content: &str) -> Option<String> {
    let lower = content.to_ascii_lowercase();
    let start = lower.find("<title>")? + "<title>".len();
    let end = start + lower[start..].find("</title>")?;
    let title = content[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_html_title_tag() {
        let html = "<html><head><TITLE> Water Filters </TITLE></head><body>x</body></html>";
        assert_eq!(extract_title(Path::new("a/b.html"), html), "Water Filters");
    }

    #[test]
    fn title_falls_back_to_first_line_then_stem() {
        assert_eq!(extract_title(Path::new("fire.md"), "\n# Making Fire\nbody"), "Making Fire");
        assert_eq!(extract_title(Path::new("empty.txt"), "   \n"), "empty");
        assert_eq!(extract_title(Path::new("page.html"), "<p>no title</p>"), "page");
    }

    #[test]
    fn redirect_detection_only_checks_first_line() {
        assert!(is_redirect("#REDIRECT Fire\n"));
        assert!(!is_redirect("Fire\n#REDIRECT elsewhere"));
    }
}
