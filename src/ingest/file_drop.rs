/// File-drop collector.
///
/// Vendor-specific fetchers run out-of-process and drop reading batches
/// as JSON files (`Vec<Reading>`) into a spool directory; this collector
/// picks them up each cycle. Ingested files are renamed to `.done` so a
/// batch is consumed once; the store's duplicate rejection covers any
/// re-read after a crash between parse and rename. Malformed files are
/// renamed to `.rejected` and left for operator inspection instead of
/// wedging the cycle.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

use crate::ingest::collector::Collector;
use crate::model::{CollectError, Reading};

pub struct FileDropCollector {
    name: String,
    dir: PathBuf,
}

impl FileDropCollector {
    pub fn new(name: &str, dir: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            dir,
        }
    }
}

impl Collector for FileDropCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, _now: DateTime<Utc>) -> Result<Vec<Reading>, CollectError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| CollectError::Upstream(format!("{}: {}", self.dir.display(), e)))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        // Deterministic pickup order regardless of directory iteration.
        paths.sort();

        let mut readings = Vec::new();
        for path in paths {
            let contents = fs::read_to_string(&path)
                .map_err(|e| CollectError::Upstream(format!("{}: {}", path.display(), e)))?;

            match serde_json::from_str::<Vec<Reading>>(&contents) {
                Ok(batch) => {
                    readings.extend(batch);
                    let _ = fs::rename(&path, path.with_extension("done"));
                }
                Err(_) => {
                    let _ = fs::rename(&path, path.with_extension("rejected"));
                }
            }
        }

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures;

    fn temp_spool(tag: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("geomon_spool_{}_{}", std::process::id(), tag));
        fs::create_dir_all(&dir).expect("create spool dir");
        dir
    }

    #[test]
    fn test_fetch_consumes_json_batches() {
        let dir = temp_spool("consume");
        let batch = vec![fixtures::rainfall_reading(
            "EST-01",
            fixtures::base_time(),
            Some(1.5),
        )];
        fs::write(
            dir.join("batch-0001.json"),
            serde_json::to_string(&batch).expect("serialize"),
        )
        .expect("write batch");

        let collector = FileDropCollector::new("spool", dir.clone());
        let readings = collector.fetch(Utc::now()).expect("fetch");
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].station_id, "EST-01");

        // Consumed file is renamed, so the next fetch is empty.
        let again = collector.fetch(Utc::now()).expect("second fetch");
        assert!(again.is_empty());
        assert!(dir.join("batch-0001.done").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_file_is_set_aside() {
        let dir = temp_spool("malformed");
        fs::write(dir.join("bad.json"), "{not json").expect("write bad file");

        let collector = FileDropCollector::new("spool", dir.clone());
        let readings = collector.fetch(Utc::now()).expect("fetch");
        assert!(readings.is_empty());
        assert!(dir.join("bad.rejected").exists(), "malformed file set aside");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory_is_upstream_error() {
        let collector =
            FileDropCollector::new("spool", PathBuf::from("/nonexistent/geomon_spool"));
        assert!(matches!(
            collector.fetch(Utc::now()),
            Err(CollectError::Upstream(_))
        ));
    }
}
