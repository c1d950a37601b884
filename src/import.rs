/// Log directory import
///
/// Samples are expected as `<logdir>/<run>/<tag...>/<step>.<ext>`: the first
/// directory names the run, the remaining directories form the tag, and the
/// file stem is the training step.
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ImportError;
use crate::state::catalog::{Catalog, NewSample};
use crate::state::data::Session;

/// File extensions recognized as samples (compared lowercase)
const SAMPLE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Result of a log directory import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Already in the catalog
    pub skipped: usize,
    /// Files that do not look like samples
    pub ignored: usize,
}

/// Import a log directory in a background thread
pub async fn import_logdir(logdir: PathBuf, db_path: PathBuf) -> Result<ImportSummary, ImportError> {
    tokio::task::spawn_blocking(move || -> Result<ImportSummary, ImportError> {
        // Open a new connection for this thread; rusqlite::Connection is not Send
        let catalog = Catalog::open(&db_path)?;
        import_into(&catalog, &logdir)
    })
    .await
    .map_err(|e| ImportError::Join(e.to_string()))?
}

/// Walk `logdir` and register every sample file in `catalog`
pub fn import_into(catalog: &Catalog, logdir: &Path) -> Result<ImportSummary, ImportError> {
    if !logdir.is_dir() {
        return Err(ImportError::MissingLogdir(logdir.to_path_buf()));
    }
    tracing::info!(logdir = %logdir.display(), "🔍 scanning log directory");

    let mut summary = ImportSummary::default();
    for entry in WalkDir::new(logdir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some((session, step)) = parse_sample_path(logdir, entry.path()) else {
            summary.ignored += 1;
            continue;
        };

        let wall_time = entry
            .metadata()
            .ok()
            .and_then(|meta| meta.modified().ok())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);

        let sample = NewSample {
            session,
            step,
            wall_time: wall_time.timestamp_millis() as f64 / 1000.0,
            path: entry.path().to_path_buf(),
        };
        if catalog.insert_sample(&sample)? {
            summary.imported += 1;
            if summary.imported % 100 == 0 {
                tracing::info!(imported = summary.imported, "⏳ importing samples");
            }
        } else {
            summary.skipped += 1;
        }
    }

    tracing::info!(
        imported = summary.imported,
        skipped = summary.skipped,
        ignored = summary.ignored,
        "✅ import complete"
    );
    Ok(summary)
}

/// Split a sample path below `logdir` into its session and step
pub fn parse_sample_path(logdir: &Path, path: &Path) -> Option<(Session, u64)> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if !SAMPLE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    let parts = path
        .strip_prefix(logdir)
        .ok()?
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<&str>>>()?;

    let [run, tag @ .., file] = parts.as_slice() else {
        return None;
    };
    if tag.is_empty() {
        return None;
    }
    let step = Path::new(file).file_stem()?.to_str()?.parse().ok()?;
    Some((Session::new(*run, tag.join("/")), step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_sample_path() {
        let logdir = Path::new("/logs");
        assert_eq!(
            parse_sample_path(logdir, Path::new("/logs/r1/loss/10.png")),
            Some((Session::new("r1", "loss"), 10))
        );
        assert_eq!(
            parse_sample_path(logdir, Path::new("/logs/r1/images/input/7.JPG")),
            Some((Session::new("r1", "images/input"), 7))
        );
        // no tag directory
        assert_eq!(parse_sample_path(logdir, Path::new("/logs/r1/10.png")), None);
        // not a step
        assert_eq!(parse_sample_path(logdir, Path::new("/logs/r1/loss/final.png")), None);
        // not an image
        assert_eq!(parse_sample_path(logdir, Path::new("/logs/r1/loss/10.txt")), None);
    }

    #[test]
    fn test_import_into_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let tag_dir = dir.path().join("r1").join("loss");
        fs::create_dir_all(&tag_dir).unwrap();
        for step in [0, 10, 20] {
            fs::write(tag_dir.join(format!("{step}.png")), b"png").unwrap();
        }
        fs::write(tag_dir.join("notes.txt"), b"hello").unwrap();

        let catalog = Catalog::open_in_memory().unwrap();
        let summary = import_into(&catalog, dir.path()).unwrap();
        assert_eq!(summary, ImportSummary { imported: 3, skipped: 0, ignored: 1 });

        let steps = catalog.step_list(&Session::new("r1", "loss")).unwrap();
        assert_eq!(steps.iter().map(|s| s.step).collect::<Vec<_>>(), vec![0, 10, 20]);
        assert!(steps.iter().all(|s| s.wall_time > 0.0));

        // importing again only skips
        let again = import_into(&catalog, dir.path()).unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.skipped, 3);
    }

    #[test]
    fn test_import_missing_logdir() {
        let catalog = Catalog::open_in_memory().unwrap();
        let err = import_into(&catalog, Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ImportError::MissingLogdir(_)));
    }

    #[tokio::test]
    async fn test_import_logdir_async() {
        let dir = tempfile::tempdir().unwrap();
        let logdir = dir.path().join("logs");
        fs::create_dir_all(logdir.join("r2").join("samples")).unwrap();
        fs::write(logdir.join("r2").join("samples").join("3.jpg"), b"jpg").unwrap();

        let db_path = dir.path().join("samples.db");
        let summary = import_logdir(logdir, db_path.clone()).await.unwrap();
        assert_eq!(summary.imported, 1);

        let catalog = Catalog::open(&db_path).unwrap();
        assert_eq!(catalog.sessions().unwrap(), vec![Session::new("r2", "samples")]);
    }
}
