use crate::config::Settings;
use crate::error::{Result, SyncError};
use crate::geocode::{EnrichmentReport, Enricher};
use crate::identity::{dedupe_batch, partition, IdentitySnapshot};
use crate::index::{browse_brevets, identity_snapshot, SearchIndex};
use crate::metrics::PipelineMetrics;
use crate::types::{Brevet, BrevetSource};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Switches for one export run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Drop events whose identity is already indexed
    pub filter: bool,
    pub geocode: bool,
    /// Write already-indexed events to the staging file unchanged
    pub keep_existing: bool,
    pub staging_path: PathBuf,
}

impl From<&Settings> for PipelineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            filter: settings.filter,
            geocode: settings.geocode,
            keep_existing: settings.keep_existing,
            staging_path: settings.staging_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceCount {
    pub source: String,
    pub events: usize,
}

/// Result of a complete export run
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub sources: Vec<SourceCount>,
    pub total_events: usize,
    pub duplicates_dropped: usize,
    pub fresh: usize,
    pub existing: usize,
    pub enrichment: Option<EnrichmentReport>,
    pub written: usize,
    pub output_file: String,
}

/// Result of rewriting the staging file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReformatReport {
    pub before: usize,
    pub after: usize,
}

/// Fetch, deduplicate, enrich and stage brevets from every enabled source.
pub struct Pipeline {
    sources: Vec<Box<dyn BrevetSource>>,
    index: Box<dyn SearchIndex>,
    enricher: Option<Enricher>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        sources: Vec<Box<dyn BrevetSource>>,
        index: Box<dyn SearchIndex>,
        enricher: Option<Enricher>,
        options: PipelineOptions,
    ) -> Result<Self> {
        if options.geocode && enricher.is_none() {
            return Err(SyncError::Config("geocoding is enabled but no geocoder was configured".into()));
        }
        Ok(Self {
            sources,
            index,
            enricher,
            options,
        })
    }

    /// Run the export. The staging file is only written once every step succeeded.
    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn run(&self) -> Result<PipelineReport> {
        let t_run = Instant::now();

        // Step 1: identity snapshot of the destination index
        let snapshot = if self.options.filter {
            identity_snapshot(self.index.as_ref()).await?
        } else {
            info!("Index filtering disabled, every event is treated as new");
            IdentitySnapshot::new()
        };

        // Step 2: adapters, sequentially and in order
        let mut counts = Vec::with_capacity(self.sources.len());
        let mut events = Vec::new();
        for source in &self.sources {
            let t_fetch = Instant::now();
            let fetched = source.fetch().await.map_err(|e| {
                error!(source = source.name(), "Source failed, aborting run: {}", e);
                e
            })?;
            info!(
                source = source.name(),
                events = fetched.len(),
                elapsed_secs = t_fetch.elapsed().as_secs_f64(),
                "Fetched source"
            );
            PipelineMetrics::record_source_fetched(source.name(), fetched.len());
            counts.push(SourceCount {
                source: source.name().to_string(),
                events: fetched.len(),
            });
            events.extend(fetched);
        }
        let total_events = events.len();

        // Step 3: one event per identity
        let events = dedupe_batch(events);
        let duplicates_dropped = total_events - events.len();
        if duplicates_dropped > 0 {
            warn!("Dropped {} events with duplicate identities", duplicates_dropped);
            PipelineMetrics::record_batch_duplicates(duplicates_dropped);
        }

        // Step 4: split against the index
        let split = partition(events, &snapshot);
        let (mut fresh, existing) = (split.fresh, split.existing);
        info!(fresh = fresh.len(), existing = existing.len(), "Partitioned events");
        PipelineMetrics::record_partition(fresh.len(), existing.len());
        let (fresh_count, existing_count) = (fresh.len(), existing.len());

        // Step 5: coordinates for the new events only
        let enrichment = match (&self.enricher, self.options.geocode) {
            (Some(enricher), true) => Some(enricher.enrich(&mut fresh).await?),
            _ => None,
        };

        // Step 6: recombine
        let mut output = fresh;
        if self.options.keep_existing {
            output.extend(existing);
        }

        // Step 7: staging artifact
        write_staging(&self.options.staging_path, &output)?;
        let output_file = self.options.staging_path.to_string_lossy().to_string();
        info!("Exported {} brevets to {}", output.len(), output_file);
        PipelineMetrics::record_run_duration("export", t_run.elapsed().as_secs_f64());

        Ok(PipelineReport {
            sources: counts,
            total_events,
            duplicates_dropped,
            fresh: fresh_count,
            existing: existing_count,
            enrichment,
            written: output.len(),
            output_file,
        })
    }
}

/// Write `brevets` as a pretty JSON array, through a sibling temp file and a rename.
pub fn write_staging(path: &Path, brevets: &[Brevet]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json_content = serde_json::to_string_pretty(brevets)?;

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, json_content)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_staging(path: &Path) -> Result<Vec<Brevet>> {
    let content = fs::read_to_string(path).map_err(|e| {
        SyncError::Config(format!("Failed to read staging file '{}': {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Upload the staging file to the index, then note the count in the CI step summary.
#[instrument(skip(index, summary_path))]
pub async fn publish(index: &dyn SearchIndex, staging_path: &Path, summary_path: Option<&Path>) -> Result<usize> {
    let t_publish = Instant::now();
    let brevets = read_staging(staging_path)?;
    let written = index.save_objects(&brevets).await?;
    PipelineMetrics::record_published(written);
    PipelineMetrics::record_run_duration("publish", t_publish.elapsed().as_secs_f64());

    let line = format!("Indexed {} brevets", written);
    info!("{}", line);
    if let Some(summary) = summary_path {
        let mut file = fs::OpenOptions::new().create(true).append(true).open(summary)?;
        writeln!(file, "{}", line)?;
    }
    Ok(written)
}

/// Re-read and rewrite the staging file with one event per identity.
///
/// With `from_index` the current index contents replace the staging file's.
#[instrument(skip(from_index))]
pub async fn reformat(staging_path: &Path, from_index: Option<&dyn SearchIndex>) -> Result<ReformatReport> {
    let brevets = match from_index {
        Some(index) => browse_brevets(index).await?,
        None => read_staging(staging_path)?,
    };
    let before = brevets.len();
    let cleaned = dedupe_batch(brevets);
    write_staging(staging_path, &cleaned)?;
    info!("Cleaned {} brevets into {} brevets", before, cleaned.len());
    Ok(ReformatReport {
        before,
        after: cleaned.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_staging_is_pretty_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("brevets.json");

        write_staging(&path, &[Brevet::new("a".into(), 20250101, json!({}))]).unwrap();
        write_staging(&path, &[Brevet::new("b".into(), 20250102, json!({}))]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[\n"));
        let back = read_staging(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].object_id, "b");
        assert!(!dir.path().join("nested").join("brevets.json.tmp").exists());
    }

    #[test]
    fn test_missing_staging_file() {
        assert!(read_staging(Path::new("/nonexistent/brevets.json")).is_err());
    }

    #[tokio::test]
    async fn test_reformat_drops_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brevets.json");
        let events = vec![
            Brevet::new("a".into(), 20250101, json!({})),
            Brevet::new("a".into(), 20250101, json!({"second": true})),
            Brevet::new("b".into(), 20250102, json!({})),
        ];
        write_staging(&path, &events).unwrap();

        let report = reformat(&path, None).await.unwrap();

        assert_eq!(report, ReformatReport { before: 3, after: 2 });
        assert_eq!(read_staging(&path).unwrap()[0].meta, json!({}));
    }
}
