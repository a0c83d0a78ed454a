//! Per-item persistence: `<root>/<endpoint>/<index>.json`.

use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::DirBuilder;
use tracing::warn;

/// Outcome of writing one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub failed: usize,
}

/// Writes items of one backup run under its dated root
#[derive(Debug, Clone)]
pub struct ItemWriter {
    root: PathBuf,
}

impl ItemWriter {
    /// Root becomes `<output_dir>/<YYYY-MM-DD>`
    pub fn for_date(output_dir: impl AsRef<Path>, date: NaiveDate) -> Self {
        Self {
            root: output_dir.as_ref().join(date.format("%Y-%m-%d").to_string()),
        }
    }

    /// Dated root for a run starting now (local time)
    pub fn for_today(output_dir: impl AsRef<Path>) -> Self {
        Self::for_date(output_dir, chrono::Local::now().date_naive())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn endpoint_dir(&self, endpoint: &str) -> PathBuf {
        self.root.join(endpoint)
    }

    pub fn item_path(&self, endpoint: &str, index: u64) -> PathBuf {
        self.endpoint_dir(endpoint).join(format!("{}.json", index))
    }

    /// Write `items` in order, the first one at index `start`.
    /// Failures are logged and counted; they never stop the remaining items.
    pub async fn write_page(&self, endpoint: &str, start: u64, items: &[Value]) -> WriteSummary {
        let mut summary = WriteSummary::default();
        let dir = self.endpoint_dir(endpoint);

        if let Err(e) = create_dir(&dir).await {
            warn!(endpoint, "Failed to create {}: {}", dir.display(), e);
            summary.failed = items.len();
            return summary;
        }

        for (position, item) in items.iter().enumerate() {
            let Some(index) = start.checked_add(position as u64) else {
                warn!(endpoint, "Item {} past offset {} has no valid index", position, start);
                summary.failed += 1;
                continue;
            };
            let path = self.item_path(endpoint, index);

            let json = match serde_json::to_vec(item) {
                Ok(json) => json,
                Err(e) => {
                    warn!(endpoint, "Failed to serialize item for {}: {}", path.display(), e);
                    summary.failed += 1;
                    continue;
                }
            };

            match tokio::fs::write(&path, json).await {
                Ok(()) => summary.written += 1,
                Err(e) => {
                    warn!(endpoint, "Failed writing {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

/// Recursive and race-safe: concurrent pages of one endpoint may call this together.
async fn create_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn writer(dir: &tempfile::TempDir) -> ItemWriter {
        ItemWriter::for_date(dir.path(), NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
    }

    #[test]
    fn test_layout() {
        let writer = ItemWriter::for_date(
            "hubspot-backup",
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        );
        assert_eq!(writer.root(), Path::new("hubspot-backup/2024-03-09"));
        assert_eq!(
            writer.item_path("blog-posts", 251),
            Path::new("hubspot-backup/2024-03-09/blog-posts/251.json")
        );
    }

    #[tokio::test]
    async fn test_write_page_at_offset_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = writer(&tmp);
        let items = vec![
            json!({"id": 7, "properties": {"name": "Acme", "tags": ["a", "b"]}}),
            json!([1, 2, 3]),
            json!("plain"),
        ];

        let summary = writer.write_page("companies", 250, &items).await;
        assert_eq!(summary, WriteSummary { written: 3, failed: 0 });

        for (position, item) in items.iter().enumerate() {
            let path = writer.item_path("companies", 250 + position as u64);
            let content = std::fs::read(&path).unwrap();
            let decoded: Value = serde_json::from_slice(&content).unwrap();
            assert_eq!(&decoded, item);
        }
        assert!(!writer.item_path("companies", 0).exists());
    }

    #[tokio::test]
    async fn test_failed_item_does_not_stop_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = writer(&tmp);

        // A directory squatting on 1.json makes that single write fail
        std::fs::create_dir_all(writer.item_path("deals", 1)).unwrap();

        let items = vec![json!({"id": 0}), json!({"id": 1}), json!({"id": 2})];
        let summary = writer.write_page("deals", 0, &items).await;

        assert_eq!(summary, WriteSummary { written: 2, failed: 1 });
        assert!(writer.item_path("deals", 0).is_file());
        assert!(writer.item_path("deals", 2).is_file());
    }

    #[tokio::test]
    async fn test_indices_past_u64_max_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = writer(&tmp);

        let items = vec![json!({"id": "last"}), json!({"id": "overflow"})];
        let summary = writer.write_page("contacts", u64::MAX, &items).await;

        assert_eq!(summary, WriteSummary { written: 1, failed: 1 });
        assert_eq!(
            std::fs::read_to_string(writer.item_path("contacts", u64::MAX)).unwrap(),
            r#"{"id":"last"}"#
        );
    }

    #[tokio::test]
    async fn test_concurrent_pages_share_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = writer(&tmp);

        let mut handles = Vec::new();
        for page in 0..8u64 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                writer.write_page("pages", page * 2, &[json!(page), json!(page)]).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().written, 2);
        }

        let count = std::fs::read_dir(writer.endpoint_dir("pages")).unwrap().count();
        assert_eq!(count, 16);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_endpoint_dir_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let writer = writer(&tmp);
        writer.write_page("workflows", 0, &[json!({})]).await;

        let mode = std::fs::metadata(writer.endpoint_dir("workflows"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
