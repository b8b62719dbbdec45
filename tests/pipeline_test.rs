use anyhow::Result;
use async_trait::async_trait;
use brevet_sync::error::SyncError;
use brevet_sync::geocode::{Enricher, GeocodingOracle, NoThrottle};
use brevet_sync::identity::identity_key;
use brevet_sync::index::{InMemoryIndex, SearchIndex};
use brevet_sync::pipeline::{publish, read_staging, Pipeline, PipelineOptions};
use brevet_sync::progress::SilentProgress;
use brevet_sync::types::{Brevet, BrevetSource, GeoPoint};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

struct StubSource {
    name: &'static str,
    events: Vec<Brevet>,
}

#[async_trait]
impl BrevetSource for StubSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self) -> brevet_sync::error::Result<Vec<Brevet>> {
        Ok(self.events.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl BrevetSource for BrokenSource {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn fetch(&self) -> brevet_sync::error::Result<Vec<Brevet>> {
        Err(SyncError::Transport {
            source_name: "broken".into(),
            url: "https://example.org/calendar".into(),
            status: 503,
        })
    }
}

struct CountingOracle {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl GeocodingOracle for CountingOracle {
    async fn resolve(&self, _address: &str) -> brevet_sync::error::Result<Option<GeoPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(GeoPoint { lat: 45.76, lng: 4.83 }))
    }
}

fn event(date_number: u32, date: &str, city: &str) -> Brevet {
    let mut brevet = Brevet::new(
        identity_key(date, Some(200), "France", city),
        date_number,
        json!({ "Ville": city }),
    );
    brevet.distance = Some(200);
    brevet.country = Some("France".into());
    brevet.city = Some(city.into());
    brevet
}

fn options(path: PathBuf, keep_existing: bool) -> PipelineOptions {
    PipelineOptions {
        filter: true,
        geocode: true,
        keep_existing,
        staging_path: path,
    }
}

fn enricher(calls: Arc<AtomicUsize>) -> Enricher {
    Enricher::new(
        Box::new(CountingOracle { calls }),
        Box::new(NoThrottle),
        Box::new(SilentProgress),
    )
}

#[tokio::test]
async fn test_export_filters_dedupes_and_geocodes() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("brevets.json");

    let paris = event(20240315, "15/03/2024", "Paris");
    let index = InMemoryIndex::with_brevets(&[paris.clone()])?;

    let mut located = event(20240316, "16/03/2024", "Grenoble");
    located.set_coordinates(GeoPoint { lat: 45.19, lng: 5.72 });
    let lyon = event(20240317, "17/03/2024", "Lyon");

    let sources: Vec<Box<dyn BrevetSource>> = vec![
        Box::new(StubSource {
            name: "first",
            events: vec![paris.clone(), lyon.clone()],
        }),
        Box::new(StubSource {
            name: "second",
            events: vec![lyon.clone(), located.clone()],
        }),
    ];
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new(
        sources,
        Box::new(index.clone()),
        Some(enricher(calls.clone())),
        options(path.clone(), false),
    )?;

    let report = pipeline.run().await?;

    assert_eq!(report.total_events, 4);
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(report.fresh, 2);
    assert_eq!(report.existing, 1);
    assert_eq!(report.written, 2);
    // Grenoble already had coordinates
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let staged = read_staging(&path)?;
    let ids: Vec<_> = staged.iter().map(|b| b.object_id.as_str()).collect();
    assert_eq!(ids, vec!["17/03/2024__200__France__Lyon", "16/03/2024__200__France__Grenoble"]);
    assert_eq!(staged[0].coordinates(), Some(GeoPoint { lat: 45.76, lng: 4.83 }));
    assert_eq!(staged[1].coordinates(), Some(GeoPoint { lat: 45.19, lng: 5.72 }));
    Ok(())
}

#[tokio::test]
async fn test_keep_existing_passes_indexed_events_through() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("brevets.json");
    let paris = event(20240315, "15/03/2024", "Paris");
    let index = InMemoryIndex::with_brevets(&[paris.clone()])?;
    let calls = Arc::new(AtomicUsize::new(0));

    let sources: Vec<Box<dyn BrevetSource>> = vec![Box::new(StubSource {
        name: "only",
        events: vec![paris],
    })];
    let pipeline = Pipeline::new(
        sources,
        Box::new(index),
        Some(enricher(calls.clone())),
        options(path.clone(), true),
    )?;
    let report = pipeline.run().await?;

    assert_eq!(report.fresh, 0);
    assert_eq!(report.written, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!read_staging(&path)?[0].has_coordinates());
    Ok(())
}

#[tokio::test]
async fn test_failing_source_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("brevets.json");
    let sources: Vec<Box<dyn BrevetSource>> = vec![
        Box::new(StubSource {
            name: "ok",
            events: vec![event(20240317, "17/03/2024", "Lyon")],
        }),
        Box::new(BrokenSource),
    ];
    let pipeline = Pipeline::new(
        sources,
        Box::new(InMemoryIndex::new()),
        None,
        PipelineOptions {
            filter: false,
            geocode: false,
            keep_existing: false,
            staging_path: path.clone(),
        },
    )?;

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, SyncError::Transport { status: 503, .. }));
    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_geocode_requires_enricher() {
    let result = Pipeline::new(
        Vec::new(),
        Box::new(InMemoryIndex::new()),
        None,
        options(PathBuf::from("unused.json"), false),
    );
    assert!(matches!(result, Err(SyncError::Config(_))));
}

#[tokio::test]
async fn test_publish_upserts_and_writes_summary() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("brevets.json");
    let summary = dir.path().join("summary.md");
    let events = vec![
        event(20240315, "15/03/2024", "Paris"),
        event(20240317, "17/03/2024", "Lyon"),
    ];
    brevet_sync::pipeline::write_staging(&path, &events)?;

    let index = InMemoryIndex::with_brevets(&[event(20240315, "15/03/2024", "Paris")])?;
    let written = publish(&index, &path, Some(summary.as_path())).await?;

    assert_eq!(written, 2);
    assert_eq!(index.len(), 2);
    assert_eq!(std::fs::read_to_string(&summary)?, "Indexed 2 brevets\n");

    let mut ids = Vec::new();
    let mut collect = |page: Vec<serde_json::Value>| {
        ids.extend(page.into_iter().filter_map(|o| o["objectID"].as_str().map(str::to_string)))
    };
    index.browse_all(&["objectID"], &mut collect).await?;
    assert!(ids.contains(&"17/03/2024__200__France__Lyon".to_string()));
    Ok(())
}
