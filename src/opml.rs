//! OPML files on the local side of import and export.
//!
//! The server does the real parsing on import; this module only checks
//! that a file is a sane OPML document before uploading it, and writes
//! the exported document to disk.

use crate::settings::storage::atomic_write;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Outline nesting deeper than this is rejected.
const MAX_OPML_DEPTH: usize = 50;

/// Largest file accepted for import (10 MB).
const MAX_OPML_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum OpmlError {
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
    #[error("XML parse error: {0}")]
    XmlParse(String),
    #[error("Not an OPML document (root element is <{0}>)")]
    NotOpml(String),
    #[error("OPML document has no <body>")]
    MissingBody,
    #[error("OPML file too large (max {} MB)", MAX_OPML_FILE_SIZE / 1024 / 1024)]
    TooLarge,
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What an OPML document contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpmlSummary {
    /// Outlines with an `xmlUrl`.
    pub feeds: usize,
    /// Outlines without one (folders).
    pub folders: usize,
}

/// Checks that `content` is an OPML document and counts its outlines.
pub fn inspect(content: &str) -> Result<OpmlSummary, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut summary = OpmlSummary::default();
    let mut saw_root = false;
    let mut saw_body = false;
    let mut depth: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                check_root(&e, &mut saw_root)?;
                match e.name().as_ref() {
                    b"body" => saw_body = true,
                    b"outline" => {
                        depth += 1;
                        if depth > MAX_OPML_DEPTH {
                            return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                        }
                        count_outline(&e, &mut summary);
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                check_root(&e, &mut saw_root)?;
                match e.name().as_ref() {
                    b"body" => saw_body = true,
                    b"outline" => count_outline(&e, &mut summary),
                    _ => {}
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
    }

    if !saw_root {
        return Err(OpmlError::XmlParse("empty document".to_string()));
    }
    if !saw_body {
        return Err(OpmlError::MissingBody);
    }
    Ok(summary)
}

fn check_root(e: &BytesStart<'_>, saw_root: &mut bool) -> Result<(), OpmlError> {
    if *saw_root {
        return Ok(());
    }
    *saw_root = true;
    let name = e.name();
    if name.as_ref().eq_ignore_ascii_case(b"opml") {
        Ok(())
    } else {
        Err(OpmlError::NotOpml(
            String::from_utf8_lossy(name.as_ref()).into_owned(),
        ))
    }
}

fn count_outline(e: &BytesStart<'_>, summary: &mut OpmlSummary) {
    let has_feed_url = e
        .attributes()
        .flatten()
        .any(|attr| attr.key.as_ref() == b"xmlUrl" && !attr.value.is_empty());
    if has_feed_url {
        summary.feeds += 1;
    } else {
        summary.folders += 1;
    }
}

/// Reads and validates a file for import.
pub async fn read_import_file(path: &Path) -> Result<(String, OpmlSummary), OpmlError> {
    let io_err = |source| OpmlError::Io {
        path: path.to_path_buf(),
        source,
    };
    let meta = tokio::fs::metadata(path).await.map_err(io_err)?;
    if meta.len() > MAX_OPML_FILE_SIZE {
        return Err(OpmlError::TooLarge);
    }
    let content = tokio::fs::read_to_string(path).await.map_err(io_err)?;
    let summary = inspect(&content)?;
    tracing::info!(path = %path.display(), feeds = summary.feeds, folders = summary.folders, "OPML file validated");
    Ok((content, summary))
}

/// Writes an exported document to `path` atomically.
pub fn write_export(path: &Path, content: &str) -> Result<(), OpmlError> {
    atomic_write(path, content.as_bytes()).map_err(|source| OpmlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), bytes = content.len(), "OPML export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Subscriptions</title></head>
  <body>
    <outline text="Tech">
      <outline type="rss" text="Rust" xmlUrl="https://blog.rust-lang.org/feed.xml"/>
      <outline type="rss" text="LWN" xmlUrl="https://lwn.net/headlines/rss"></outline>
    </outline>
    <outline type="rss" text="Loose" xmlUrl="https://example.com/feed"/>
  </body>
</opml>"#;

    #[test]
    fn test_counts_feeds_and_folders() {
        assert_eq!(
            inspect(SAMPLE).unwrap(),
            OpmlSummary {
                feeds: 3,
                folders: 1
            }
        );
    }

    #[test]
    fn test_rejects_other_documents() {
        assert!(matches!(
            inspect("<rss><channel/></rss>"),
            Err(OpmlError::NotOpml(name)) if name == "rss"
        ));
        assert!(matches!(
            inspect("<opml version=\"2.0\"><head/></opml>"),
            Err(OpmlError::MissingBody)
        ));
        assert!(matches!(inspect("<opml><body></opml>"), Err(OpmlError::XmlParse(_))));
        assert!(matches!(inspect(""), Err(OpmlError::XmlParse(_))));
    }

    #[test]
    fn test_depth_limit() {
        let mut doc = String::from("<opml><body>");
        for _ in 0..=MAX_OPML_DEPTH {
            doc.push_str("<outline text=\"x\">");
        }
        for _ in 0..=MAX_OPML_DEPTH {
            doc.push_str("</outline>");
        }
        doc.push_str("</body></opml>");
        assert!(matches!(inspect(&doc), Err(OpmlError::MaxDepthExceeded(_))));
    }

    #[tokio::test]
    async fn test_export_then_import_file() {
        let dir = std::env::temp_dir().join("fluxread_opml_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("export.opml");

        write_export(&path, SAMPLE).unwrap();
        let (content, summary) = read_import_file(&path).await.unwrap();
        assert_eq!(content, SAMPLE);
        assert_eq!(summary.feeds, 3);

        std::fs::remove_dir_all(&dir).ok();
    }
}
