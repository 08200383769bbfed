//! Plain-text export/import of site exclusion lists, one domain per line.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use adgui_core::exclusions::{SiteExclusions, normalize_domain};
use adgui_core::platform::AppPaths;
use log::{debug, info};

pub const DEFAULT_EXPORT_NAME: &str = "exclusions";

pub fn exclusions_dir(paths: &dyn AppPaths) -> PathBuf {
    paths.data_dir().join("site-exclusions")
}

fn file_name(name: &str) -> io::Result<String> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid export name {name:?}"),
        ));
    }
    if Path::new(name).extension().is_some() {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}.txt"))
    }
}

/// Writes `domains` to `dir/name`, replacing the file or appending to it.
pub fn export(dir: &Path, name: &str, domains: &[String], append: bool) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name(name)?);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(&path)?;
    for domain in domains {
        writeln!(file, "{domain}")?;
    }

    info!("Exported {} domains to {:?}", domains.len(), path);
    Ok(path)
}

/// Reads domains from a file, skipping blank lines and `#` comments.
pub fn read_domains(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(normalize_domain)
        .collect())
}

/// Every `.txt` file in `dir`, sorted by name.
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    debug!("found {} exclusion files in {:?}", files.len(), dir);
    Ok(files)
}

/// Candidates not already listed, compared case-insensitively, in order.
pub fn new_domains(existing: &SiteExclusions, candidates: Vec<String>) -> Vec<String> {
    let mut fresh: Vec<String> = Vec::new();
    for domain in candidates {
        let repeated = fresh.iter().any(|d| d.eq_ignore_ascii_case(&domain));
        if !repeated && !existing.contains(&domain) {
            fresh.push(domain);
        }
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn export_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = export(dir.path(), "work", &domains(&["a.com", "b.org"]), false).unwrap();
        assert_eq!(path.file_name().unwrap(), "work.txt");
        assert_eq!(read_domains(&path).unwrap(), domains(&["a.com", "b.org"]));
    }

    #[test]
    fn append_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        export(dir.path(), "list.txt", &domains(&["a.com"]), false).unwrap();
        let path = export(dir.path(), "list.txt", &domains(&["b.com"]), true).unwrap();
        assert_eq!(read_domains(&path).unwrap(), domains(&["a.com", "b.com"]));

        let path = export(dir.path(), "list.txt", &domains(&["c.com"]), false).unwrap();
        assert_eq!(read_domains(&path).unwrap(), domains(&["c.com"]));
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        assert!(export(dir.path(), "../escape", &[], false).is_err());
        assert!(export(dir.path(), "  ", &[], false).is_err());
    }

    #[test]
    fn read_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        fs::write(&path, "# work sites\n\n  a.com  \nnot a domain\nb.com\n").unwrap();
        assert_eq!(read_domains(&path).unwrap(), domains(&["a.com", "b.com"]));
    }

    #[test]
    fn lists_only_text_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();

        let files = list_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert!(list_files(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn new_domains_ignores_case_duplicates() {
        let existing = SiteExclusions {
            domains: domains(&["Example.com"]),
            ..Default::default()
        };
        let fresh = new_domains(&existing, domains(&["example.COM", "b.com", "B.com"]));
        assert_eq!(fresh, domains(&["b.com"]));
    }
}
