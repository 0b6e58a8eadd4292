//! Playlist expansion.
//!
//! `.m3u` (one path per line, `#` comments) and `.pls` (`FileN=` keys).
//! Entries inherit the format options surrounding the playlist on the
//! command line; relative entries are resolved against the playlist's
//! directory unless absolute or a URI.

use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// Whether a filename names a playlist.
pub fn is_playlist(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".m3u") || lower.ends_with(".pls")
}

/// Expand a playlist into its entries.
pub fn expand_playlist(path: &str) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let base = Path::new(path).parent().unwrap_or_else(|| Path::new(""));
    let lower = path.to_ascii_lowercase();

    let entries = if lower.ends_with(".pls") {
        parse_pls(path, &text)?
    } else {
        parse_m3u(&text)
    };

    Ok(entries.into_iter().map(|e| resolve(base, &e)).collect())
}

fn parse_m3u(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn parse_pls(path: &str, text: &str) -> Result<Vec<String>> {
    let mut numbered: Vec<(u32, String)> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('[') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if let Some(index) = key.strip_prefix("File") {
            let index: u32 = index.parse().map_err(|_| Error::Playlist {
                path: path.to_string(),
                message: format!("bad entry key '{key}'"),
            })?;
            numbered.push((index, value.trim().to_string()));
        }
    }
    numbered.sort_by_key(|(i, _)| *i);
    Ok(numbered.into_iter().map(|(_, e)| e).collect())
}

fn resolve(base: &Path, entry: &str) -> String {
    let is_uri = entry.contains("://");
    if is_uri || Path::new(entry).is_absolute() {
        entry.to_string()
    } else {
        base.join(entry).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn recognizes_playlist_extensions() {
        assert!(is_playlist("a.m3u"));
        assert!(is_playlist("A.PLS"));
        assert!(!is_playlist("a.wav"));
    }

    #[test]
    fn m3u_entries_resolve_against_the_playlist_dir() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "list.m3u",
            "# a comment\nsong1.wav\n\n/abs/song2.wav\nhttp://host/song3.wav\n",
        );
        let entries = expand_playlist(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            dir.path().join("song1.wav").to_string_lossy().into_owned()
        );
        assert_eq!(entries[1], "/abs/song2.wav");
        assert_eq!(entries[2], "http://host/song3.wav");
    }

    #[test]
    fn pls_entries_come_back_in_numbered_order() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "list.pls",
            "[playlist]\nFile2=b.wav\nFile1=a.wav\nTitle1=ignored\nNumberOfEntries=2\n",
        );
        let entries = expand_playlist(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("a.wav"));
        assert!(entries[1].ends_with("b.wav"));
    }

    #[test]
    fn pls_rejects_malformed_keys() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.pls", "Filex=a.wav\n");
        assert!(expand_playlist(&path).is_err());
    }

    #[test]
    fn missing_playlist_is_an_io_error() {
        assert!(matches!(
            expand_playlist("/no/such/list.m3u"),
            Err(Error::Io(_))
        ));
    }
}
