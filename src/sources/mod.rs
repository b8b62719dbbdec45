pub mod acp;
pub mod auk;
pub mod belgium;
pub mod fields;
pub mod ireland;
pub mod italy;
pub mod lrm;
pub mod map;
pub mod netherlands;
pub mod spreadsheet;
pub mod tribe;
pub mod usa;

use crate::config::{Credentials, Settings};
use crate::constants::*;
use crate::error::{Result, SyncError};
use crate::types::BrevetSource;

/// Build one adapter by name.
pub fn create_source(
    name: &str,
    settings: &Settings,
    credentials: Option<&Credentials>,
    client: &reqwest::Client,
) -> Result<Box<dyn BrevetSource>> {
    let client = client.clone();
    let source: Box<dyn BrevetSource> = match name {
        ACP_SOURCE => Box::new(acp::AcpSource::new(client, settings.acp.clone())),
        MAP_SOURCE => {
            let key = credentials
                .ok_or(SyncError::MissingCredential("SUPABASE"))?
                .supabase_key()?;
            Box::new(map::MapSource::new(client, key.to_string()))
        }
        LRM_SOURCE => Box::new(lrm::LrmSource::new(client)),
        USA_SOURCE => Box::new(usa::UsaSource::new(client)),
        AUK_SOURCE => Box::new(auk::AukSource::new(client)),
        BELGIUM_SOURCE => Box::new(belgium::BelgiumSource::new(client, settings.tribe.clone())),
        NETHERLANDS_SOURCE => {
            Box::new(netherlands::NetherlandsSource::new(client, settings.tribe.clone()))
        }
        IRELAND_SOURCE => Box::new(ireland::IrelandSource::new(client)),
        ITALY_SOURCE => Box::new(italy::ItalySource::new(client)),
        other => {
            return Err(SyncError::Config(format!(
                "Unknown source '{}'. Supported sources: {}",
                other,
                get_supported_sources().join(", ")
            )))
        }
    };
    Ok(source)
}

/// Adapters for every enabled source, in configured order.
pub fn create_sources(
    settings: &Settings,
    credentials: Option<&Credentials>,
    client: &reqwest::Client,
) -> Result<Vec<Box<dyn BrevetSource>>> {
    settings
        .sources
        .iter()
        .map(|name| create_source(name, settings, credentials, client))
        .collect()
}
