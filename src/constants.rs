/// Source name constants used by the CLI, the config file and the logs.
pub const ACP_SOURCE: &str = "acp";
pub const MAP_SOURCE: &str = "map";
pub const LRM_SOURCE: &str = "lrm";
pub const USA_SOURCE: &str = "usa";
pub const AUK_SOURCE: &str = "auk";
pub const BELGIUM_SOURCE: &str = "belgium";
pub const NETHERLANDS_SOURCE: &str = "netherlands";
pub const IRELAND_SOURCE: &str = "ireland";
pub const ITALY_SOURCE: &str = "italy";

// Provider endpoints
pub const ACP_CALENDAR_URL: &str =
    "https://brevets.audax-club-parisien.com/controleur/api/brm_calendar.php";
pub const ACP_REFERER: &str = "https://www.audax-club-parisien.com/";
pub const MAP_SUPABASE_URL: &str =
    "https://svbtqggtspnhpbfbgswf.supabase.co/rest/v1/brevets?select=%2A";
pub const MAP_REFERER: &str = "https://map.audax-club-parisien.com/";
// Published from https://www.randonneursmondiaux.org/59-Calendrier.html
pub const LRM_SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vRU8adejamxip0ue6pMMGgRjPDNrboJp6SWYlf_k7HmhLyXSjEIMqOetBS5MSiRHZ96r9K7nzgtU9uc/pubhtml?gid=1480200001&single=true";
pub const USA_SEARCH_URL: &str = "https://rusa.org/cgi-bin/eventsearch_PF.pl";
pub const AUK_SEARCH_URL: &str =
    "https://www.audax.uk/umbraco/surface/Events/Search?DurationNights=360&pageSize=300";
pub const AUK_EVENT_BASE_URL: &str = "https://www.audax.uk/event-details/";
pub const BELGIUM_EVENTS_URL: &str = "https://randonneurs.be/nl/wp-json/tribe/events/v1/events/";
pub const NETHERLANDS_EVENTS_URL: &str =
    "https://www.randonneurs.nl/wp-json/tribe/events/v1/events/";
pub const IRELAND_CALENDAR_URL: &str = "https://www.audaxireland.org/events-calendar/";
pub const ITALY_XLSX_URL: &str =
    "https://www.audaxitalia.it/brevetti_richieste_esporta_calendario.php";
pub const ITALY_SITE_URL: &str = "https://www.audaxitalia.it/index.php?pg=manifestazioni";

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Default destination index name
pub const DEFAULT_INDEX_NAME: &str = "brevets";

/// Default staging artifact written by `export` and read by `publish`
pub const DEFAULT_STAGING_PATH: &str = "brevets.json";

/// Separator between identity key segments
pub const IDENTITY_SEPARATOR: &str = "__";

/// Get all supported source names, in run order
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![
        ACP_SOURCE,
        MAP_SOURCE,
        LRM_SOURCE,
        USA_SOURCE,
        AUK_SOURCE,
        BELGIUM_SOURCE,
        NETHERLANDS_SOURCE,
        IRELAND_SOURCE,
        ITALY_SOURCE,
    ]
}

/// Sources run when the config file does not say otherwise
pub fn get_default_sources() -> Vec<&'static str> {
    vec![ACP_SOURCE, MAP_SOURCE, LRM_SOURCE, USA_SOURCE]
}
