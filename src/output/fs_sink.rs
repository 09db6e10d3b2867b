//! Filesystem sink
//!
//! Writes the on-disk layout consumed by the offline renderer: a
//! `revisions-1.txt` stream with `--page--` headers, JSON files for site
//! metadata, edits, redirects and the run summary, and raw image files
//! under `images/`.

use crate::output::{HarvestSummary, Sink, SinkError, SinkResult};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sink that persists harvest records under one target directory
pub struct FsSink {
    root: PathBuf,
    revfile: File,
    /// Revision ids already streamed out; overlapping batches are written
    /// once
    seen_revisions: HashSet<u64>,
}

impl FsSink {
    /// Creates the output directory tree. Fails if the target already
    /// exists, so a harvest never overwrites an earlier one.
    pub fn create(root: &Path) -> SinkResult<Self> {
        if root.exists() {
            return Err(SinkError::Write(format!(
                "target directory {} already exists",
                root.display()
            )));
        }
        fs::create_dir_all(root.join("images"))?;

        let mut revfile = File::create(root.join("revisions-1.txt"))?;
        revfile.write_all(b"\n -*- mode: wikipedia -*-\n")?;

        Ok(Self {
            root: root.to_path_buf(),
            revfile,
            seen_revisions: HashSet::new(),
        })
    }

    fn dump_json(&self, name: &str, value: &Value) -> SinkResult<()> {
        let path = self.root.join(format!("{name}.json"));
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, value)?;
        Ok(())
    }

    /// Escapes a title into a filesystem-safe image file name.
    fn escape_title(title: &str) -> String {
        title
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '.' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl Sink for FsSink {
    fn write_siteinfo(&mut self, siteinfo: &Value) -> SinkResult<()> {
        self.dump_json("siteinfo", siteinfo)
    }

    fn write_pages(&mut self, data: &Value) -> SinkResult<u64> {
        let Some(pages) = data.get("pages").and_then(Value::as_object) else {
            return Ok(0);
        };

        let mut written = 0;
        for page in pages.values() {
            let title = page.get("title").and_then(Value::as_str).unwrap_or_default();
            let ns = page.get("ns").cloned().unwrap_or(Value::Null);
            let Some(revisions) = page.get("revisions").and_then(Value::as_array) else {
                tracing::warn!(title, "page record without revisions");
                continue;
            };

            for revision in revisions {
                let Some(revid) = revision.get("revid").and_then(Value::as_u64) else {
                    continue;
                };
                let Some(text) = revision.get("*").and_then(Value::as_str) else {
                    continue;
                };
                if !self.seen_revisions.insert(revid) {
                    continue;
                }

                let header = json!({ "title": title, "ns": ns, "revid": revid });
                writeln!(self.revfile, "\n --page-- {header}")?;
                self.revfile.write_all(text.as_bytes())?;
                written += 1;
            }
        }
        Ok(written)
    }

    fn write_edits(&mut self, edits: &[Value]) -> SinkResult<()> {
        self.dump_json("edits", &Value::Array(edits.to_vec()))
    }

    fn write_redirects(&mut self, redirects: &BTreeMap<String, String>) -> SinkResult<()> {
        let value = serde_json::to_value(redirects)?;
        self.dump_json("redirects", &value)
    }

    fn write_image(&mut self, title: &str, bytes: &[u8]) -> SinkResult<PathBuf> {
        let path = self.root.join("images").join(Self::escape_title(title));
        fs::write(&path, bytes)?;
        Ok(path)
    }

    fn write_summary(&mut self, summary: &HarvestSummary) -> SinkResult<()> {
        let value = serde_json::to_value(summary)?;
        self.dump_json("harvest", &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_sink(dir: &Path) -> FsSink {
        FsSink::create(&dir.join("out")).unwrap()
    }

    #[test]
    fn test_create_refuses_existing_target() {
        let dir = tempdir().unwrap();
        let _sink = new_sink(dir.path());
        assert!(FsSink::create(&dir.path().join("out")).is_err());
    }

    #[test]
    fn test_write_pages_streams_revisions_once() {
        let dir = tempdir().unwrap();
        let mut sink = new_sink(dir.path());

        let data = json!({
            "pages": {
                "1": {
                    "title": "Alpha",
                    "ns": 0,
                    "revisions": [{"revid": 100, "*": "Alpha content"}]
                }
            }
        });
        assert_eq!(sink.write_pages(&data).unwrap(), 1);
        // The same revision arriving again in another batch is skipped.
        assert_eq!(sink.write_pages(&data).unwrap(), 0);

        let text = fs::read_to_string(dir.path().join("out/revisions-1.txt")).unwrap();
        assert_eq!(text.matches("--page--").count(), 1);
        assert!(text.contains("Alpha content"));
        assert!(text.contains("\"revid\":100"));
    }

    #[test]
    fn test_write_pages_skips_records_without_revisions() {
        let dir = tempdir().unwrap();
        let mut sink = new_sink(dir.path());

        let data = json!({"pages": {"1": {"title": "Missing", "ns": 0}}});
        assert_eq!(sink.write_pages(&data).unwrap(), 0);
    }

    #[test]
    fn test_write_image_escapes_title() {
        let dir = tempdir().unwrap();
        let mut sink = new_sink(dir.path());

        let path = sink.write_image("File:Some Pic.png", b"bytes").unwrap();
        assert_eq!(path.file_name().unwrap(), "File_Some_Pic.png");
        assert_eq!(fs::read(path).unwrap(), b"bytes");
    }

    #[test]
    fn test_json_records_land_in_target_dir() {
        let dir = tempdir().unwrap();
        let mut sink = new_sink(dir.path());

        sink.write_siteinfo(&json!({"general": {"sitename": "Testwiki"}}))
            .unwrap();
        sink.write_edits(&[json!({"title": "Alpha"})]).unwrap();
        let mut redirects = BTreeMap::new();
        redirects.insert("Alias".to_string(), "Alpha".to_string());
        sink.write_redirects(&redirects).unwrap();
        sink.write_summary(&HarvestSummary::default()).unwrap();

        for name in ["siteinfo", "edits", "redirects", "harvest"] {
            assert!(dir.path().join(format!("out/{name}.json")).exists());
        }
    }
}
