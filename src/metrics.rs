//! Pipeline step counters.
//!
//! No exporter is installed here; the counters reach whatever recorder the
//! embedding process sets up and are no-ops otherwise.

/// Counters for the export and publish steps
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_source_fetched(_source: &str, events: usize) {
        ::metrics::counter!("brevet_sync_source_events_total").increment(events as u64);
        ::metrics::counter!("brevet_sync_source_fetches_total").increment(1);
    }

    pub fn record_batch_duplicates(dropped: usize) {
        ::metrics::counter!("brevet_sync_batch_duplicates_total").increment(dropped as u64);
    }

    pub fn record_partition(fresh: usize, existing: usize) {
        ::metrics::counter!("brevet_sync_fresh_events_total").increment(fresh as u64);
        ::metrics::counter!("brevet_sync_existing_events_total").increment(existing as u64);
    }

    pub fn record_geocoding(resolved: usize, missed: usize) {
        ::metrics::counter!("brevet_sync_geocode_resolved_total").increment(resolved as u64);
        ::metrics::counter!("brevet_sync_geocode_missed_total").increment(missed as u64);
    }

    pub fn record_published(objects: usize) {
        ::metrics::counter!("brevet_sync_published_objects_total").increment(objects as u64);
    }

    pub fn record_run_duration(step: &'static str, duration_secs: f64) {
        ::metrics::histogram!("brevet_sync_step_duration_seconds", "step" => step).record(duration_secs);
    }
}
