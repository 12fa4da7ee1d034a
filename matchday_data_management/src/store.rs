use async_trait::async_trait;
use matchday_lib::{location::LocationObservation, place::{Place, PlaceDraft}};

use crate::DataManagerError;

/// CRUD over the places table.
#[async_trait]
pub trait PlaceStore: Send + Sync {
    async fn insert_place(&self, draft: PlaceDraft) -> Result<Place, DataManagerError>;

    async fn get_places(&self) -> Result<Vec<Place>, DataManagerError>;

    async fn get_place(&self, place_id: i64) -> Result<Place, DataManagerError>;

    /// Exact, case sensitive match on the category.
    async fn get_places_in_category(&self, category: &str) -> Result<Vec<Place>, DataManagerError>;

    /// Replaces every field but the id. Fails with `NotFound` and changes nothing if the id is absent.
    async fn update_place(&self, place_id: i64, draft: PlaceDraft) -> Result<Place, DataManagerError>;

    async fn delete_place(&self, place_id: i64) -> Result<(), DataManagerError>;
}

/// Read access to the historical location observations.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// All observations, newest first.
    async fn get_locations(&self) -> Result<Vec<LocationObservation>, DataManagerError>;

    /// The newest `limit` observations whose favorite club is one of `club_labels`, newest first.
    async fn get_recent_locations(&self, club_labels: &[String], limit: usize) -> Result<Vec<LocationObservation>, DataManagerError>;
}
