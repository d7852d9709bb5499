//! CLI command implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use feelme::config::{ArchiveBackend, Config, LiveBackend};
use feelme::store::{
    ArchiveStore, BookingStore, MemoryArchiveStore, MemoryBookingStore, MongoBookingStore,
    MySqlArchiveStore,
};

pub mod reconcile;
pub mod serve;

/// Open the live and archive stores named by the config.
pub async fn open_stores(config: &Config) -> Result<(Arc<dyn BookingStore>, Arc<dyn ArchiveStore>)> {
    let bookings: Arc<dyn BookingStore> = match config.live_store.backend {
        LiveBackend::Mongo => {
            let live = &config.live_store;
            let store = MongoBookingStore::connect(&live.uri, &live.database, &live.collection)
                .await
                .with_context(|| format!("Failed to connect to live store at {}", live.uri))?;
            if let Err(e) = store.ensure_indexes().await {
                warn!(error = %e, "Could not create live store indexes, continuing");
            }
            info!(database = %live.database, collection = %live.collection, "Live store: MongoDB");
            Arc::new(store)
        }
        LiveBackend::Memory => {
            info!("Live store: in-memory");
            Arc::new(MemoryBookingStore::new())
        }
    };

    let archive: Arc<dyn ArchiveStore> = match config.archive_store.backend {
        ArchiveBackend::Mysql => {
            let sql = &config.archive_store;
            info!(host = %sql.host, database = %sql.database, "Archive store: MySQL");
            Arc::new(MySqlArchiveStore::new(
                sql.connect_options(),
                sql.max_connections,
            ))
        }
        ArchiveBackend::Memory => {
            info!("Archive store: in-memory");
            Arc::new(MemoryArchiveStore::new())
        }
    };

    Ok((bookings, archive))
}
