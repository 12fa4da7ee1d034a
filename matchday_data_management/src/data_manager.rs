use std::sync::Arc;

use matchday_lib::{location::LocationObservation, place::{Place, PlaceDraft}};

use crate::{database::{db::MatchdayDatabase, DatabaseConfig}, memory::MemoryStore, DataManagerError, LocationStore, PlaceStore};

#[derive(Clone)]
pub struct DataManager {
    pub(crate) places: Arc<dyn PlaceStore>,
    pub(crate) locations: Arc<dyn LocationStore>,
}

/// The public interface for all place and location data.
impl DataManager {
    /// Connects to MySQL, or falls back to an in-memory store when no database is configured.
    pub async fn start(config: Option<&DatabaseConfig>) -> Result<Self, DataManagerError> {
        let Some(config) = config else {
            tracing::warn!("No database configured, using the in-memory store");
            return Ok(Self::from_store(Arc::new(MemoryStore::new())));
        };

        tracing::info!(host = %config.host, database = %config.database, tls = config.ssl || config.ssl_ca.is_some(), "Connecting to database");
        let database = Arc::new(MatchdayDatabase::connect(config).await?);

        Ok(Self::from_store(database))
    }

    pub fn from_store<S: PlaceStore + LocationStore + 'static>(store: Arc<S>) -> Self {
        Self {
            places: store.clone(),
            locations: store,
        }
    }

    pub async fn create_place(&self, draft: PlaceDraft) -> Result<Place, DataManagerError> {
        let place = self.places.insert_place(draft).await?;
        tracing::debug!(place_id = place.id, "Created place");
        Ok(place)
    }

    pub async fn get_places(&self) -> Result<Vec<Place>, DataManagerError> {
        self.places.get_places().await
    }

    pub async fn get_place(&self, place_id: i64) -> Result<Place, DataManagerError> {
        self.places.get_place(place_id).await
    }

    pub async fn get_places_in_category(&self, category: &str) -> Result<Vec<Place>, DataManagerError> {
        self.places.get_places_in_category(category).await
    }

    pub async fn update_place(&self, place_id: i64, draft: PlaceDraft) -> Result<Place, DataManagerError> {
        self.places.update_place(place_id, draft).await
    }

    pub async fn delete_place(&self, place_id: i64) -> Result<(), DataManagerError> {
        self.places.delete_place(place_id).await?;
        tracing::debug!(place_id, "Deleted place");
        Ok(())
    }

    pub async fn get_locations(&self) -> Result<Vec<LocationObservation>, DataManagerError> {
        self.locations.get_locations().await
    }

    pub async fn get_recent_locations(&self, club_labels: &[String], limit: usize) -> Result<Vec<LocationObservation>, DataManagerError> {
        self.locations.get_recent_locations(club_labels, limit).await
    }
}

#[tokio::test]
async fn test() {
    let manager = DataManager::start(None).await.unwrap();
    assert!(manager.get_places().await.unwrap().is_empty());
    assert!(manager.get_locations().await.unwrap().is_empty());
}
