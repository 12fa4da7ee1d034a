use std::collections::BTreeMap;

use async_trait::async_trait;
use matchday_lib::{location::LocationObservation, place::{Place, PlaceDraft}};
use tokio::sync::RwLock;

use crate::{DataManagerError, LocationStore, PlaceStore};

/// Process-local store used when no database is configured, and by tests.
/// Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    last_id: i64,
    places: BTreeMap<i64, Place>,
    locations: Vec<LocationObservation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locations(locations: Vec<LocationObservation>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                locations,
                ..Default::default()
            }),
        }
    }
}

fn newest_first(locations: &mut [LocationObservation]) {
    locations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[async_trait]
impl PlaceStore for MemoryStore {
    async fn insert_place(&self, draft: PlaceDraft) -> Result<Place, DataManagerError> {
        let mut state = self.state.write().await;
        state.last_id += 1;
        let place = draft.into_place(state.last_id);
        state.places.insert(place.id, place.clone());
        Ok(place)
    }

    async fn get_places(&self) -> Result<Vec<Place>, DataManagerError> {
        Ok(self.state.read().await.places.values().cloned().collect())
    }

    async fn get_place(&self, place_id: i64) -> Result<Place, DataManagerError> {
        self.state.read().await.places.get(&place_id).cloned()
            .ok_or_else(|| DataManagerError::NotFound(format!("Place {place_id} not found")))
    }

    async fn get_places_in_category(&self, category: &str) -> Result<Vec<Place>, DataManagerError> {
        Ok(self.state.read().await.places.values()
            .filter(|place| place.category == category)
            .cloned()
            .collect())
    }

    async fn update_place(&self, place_id: i64, draft: PlaceDraft) -> Result<Place, DataManagerError> {
        let mut state = self.state.write().await;
        let Some(slot) = state.places.get_mut(&place_id) else {
            return Err(DataManagerError::NotFound(format!("Place {place_id} not found")));
        };
        *slot = draft.into_place(place_id);
        Ok(slot.clone())
    }

    async fn delete_place(&self, place_id: i64) -> Result<(), DataManagerError> {
        self.state.write().await.places.remove(&place_id)
            .map(|_| ())
            .ok_or_else(|| DataManagerError::NotFound(format!("Place {place_id} not found")))
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn get_locations(&self) -> Result<Vec<LocationObservation>, DataManagerError> {
        let mut locations = self.state.read().await.locations.clone();
        newest_first(&mut locations);
        Ok(locations)
    }

    async fn get_recent_locations(&self, club_labels: &[String], limit: usize) -> Result<Vec<LocationObservation>, DataManagerError> {
        let mut locations: Vec<LocationObservation> = self.state.read().await.locations.iter()
            .filter(|location| club_labels.contains(&location.favorite_club))
            .cloned()
            .collect();
        newest_first(&mut locations);
        locations.truncate(limit);
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn observation(club: &str, minute: u32) -> LocationObservation {
        LocationObservation {
            j_league_id: format!("member-{minute}"),
            latitude: 35.59,
            longitude: 139.44,
            accuracy: 10.0,
            timestamp: NaiveDate::from_ymd_opt(2024, 11, 9).unwrap().and_hms_opt(12, minute, 0).unwrap(),
            favorite_club: club.into(),
        }
    }

    fn draft(name: &str, category: &str) -> PlaceDraft {
        PlaceDraft {
            placename: name.into(),
            description: String::new(),
            latitude: 35.0,
            longitude: 139.0,
            category: category.into(),
            url: String::new(),
            has_coupon: None,
            image_url: None,
            coupon_url: None,
            cover_image_url: None,
        }
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = MemoryStore::new();
        let first = store.insert_place(draft("a", "park")).await.unwrap();
        store.delete_place(first.id).await.unwrap();
        let second = store.insert_place(draft("b", "park")).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn category_match_is_case_sensitive() {
        let store = MemoryStore::new();
        store.insert_place(draft("a", "park")).await.unwrap();
        store.insert_place(draft("b", "Park")).await.unwrap();
        store.insert_place(draft("c", "stadium")).await.unwrap();

        let parks = store.get_places_in_category("park").await.unwrap();
        assert_eq!(parks.len(), 1);
        assert_eq!(parks[0].placename, "a");
    }

    #[tokio::test]
    async fn recent_locations_are_filtered_limited_and_newest_first() {
        let store = MemoryStore::with_locations(vec![
            observation("FC町田ゼルビア", 1),
            observation("浦和レッズ", 2),
            observation("FC町田ゼルビア", 5),
            observation("FC町田ゼルビア", 3),
            observation("FC町田ゼルビア", 4),
        ]);

        let recent = store.get_recent_locations(&["FC町田ゼルビア".to_string()], 3).await.unwrap();
        let minutes: Vec<String> = recent.iter().map(|l| l.j_league_id.clone()).collect();
        assert_eq!(minutes, ["member-5", "member-4", "member-3"]);

        let both = store
            .get_recent_locations(&["FC町田ゼルビア".to_string(), "浦和レッズ".to_string()], 10)
            .await
            .unwrap();
        assert_eq!(both.len(), 5);

        assert!(store.get_recent_locations(&[], 3).await.unwrap().is_empty());
    }
}
