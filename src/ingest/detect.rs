//! File type detection from file extensions.
//!
//! Table-driven detection. No heuristics, no content sniffing. Unknown
//! extensions return None and the file is skipped by discovery.

use std::path::Path;

/// File types claimed by the front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Python (.py, .pyw, .pyi)
    Python,
    /// TypeScript (.ts, .tsx)
    TypeScript,
    /// JavaScript (.js, .jsx, .mjs, .cjs)
    JavaScript,
    /// HTML template (.html, .htm)
    Html,
    /// Stylesheet (.css, .scss, .sass)
    Css,
}

impl FileType {
    /// String identifier for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Python => "python",
            FileType::TypeScript => "typescript",
            FileType::JavaScript => "javascript",
            FileType::Html => "html",
            FileType::Css => "css",
        }
    }
}

/// Detect the file type from a path.
///
/// Uses table-driven extension mapping. Returns None for unknown
/// extensions; never infers from content.
///
/// # Examples
///
/// ```
/// # use codegraph::ingest::detect::{detect_file_type, FileType};
/// # use std::path::Path;
/// assert_eq!(detect_file_type(Path::new("app.py")), Some(FileType::Python));
/// assert_eq!(detect_file_type(Path::new("x.component.ts")), Some(FileType::TypeScript));
/// assert_eq!(detect_file_type(Path::new("notes.txt")), None);
/// ```
pub fn detect_file_type(path: &Path) -> Option<FileType> {
    let extension = path.extension()?.to_str()?;
    match extension {
        "py" | "pyw" | "pyi" => Some(FileType::Python),
        "ts" | "tsx" => Some(FileType::TypeScript),
        "js" | "jsx" | "mjs" | "cjs" => Some(FileType::JavaScript),
        "html" | "htm" => Some(FileType::Html),
        "css" | "scss" | "sass" => Some(FileType::Css),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_extensions() {
        assert_eq!(detect_file_type(Path::new("a.py")), Some(FileType::Python));
        assert_eq!(detect_file_type(Path::new("a.pyi")), Some(FileType::Python));
        assert_eq!(detect_file_type(Path::new("a.ts")), Some(FileType::TypeScript));
        assert_eq!(detect_file_type(Path::new("a.tsx")), Some(FileType::TypeScript));
        assert_eq!(detect_file_type(Path::new("a.mjs")), Some(FileType::JavaScript));
        assert_eq!(detect_file_type(Path::new("a.htm")), Some(FileType::Html));
        assert_eq!(detect_file_type(Path::new("a.scss")), Some(FileType::Css));
    }

    #[test]
    fn rejects_unknown_extensions() {
        assert_eq!(detect_file_type(Path::new("a.txt")), None);
        assert_eq!(detect_file_type(Path::new("Dockerfile")), None);
        assert_eq!(detect_file_type(Path::new("a")), None);
    }
}
