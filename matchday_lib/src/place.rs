use serde::{Deserialize, Serialize};

/// A point of interest shown on the map around the stadium.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Place {
    pub id: i64,
    pub placename: String,
    #[serde(default)]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: String,
    #[serde(default)]
    pub url: String,

    // Promotional fields, absent on older rows
    #[serde(default)]
    pub has_coupon: Option<bool>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub coupon_url: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
}

/// Payload for creating or replacing a place. The id is always chosen by the store,
/// so any `id` sent by a client is ignored.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlaceDraft {
    pub placename: String,
    #[serde(default)]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub has_coupon: Option<bool>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub coupon_url: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
}

impl PlaceDraft {
    pub fn into_place(self, id: i64) -> Place {
        Place {
            id,
            placename: self.placename,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            category: self.category,
            url: self.url,
            has_coupon: self.has_coupon,
            image_url: self.image_url,
            coupon_url: self.coupon_url,
            cover_image_url: self.cover_image_url,
        }
    }
}

impl From<Place> for PlaceDraft {
    fn from(place: Place) -> Self {
        Self {
            placename: place.placename,
            description: place.description,
            latitude: place.latitude,
            longitude: place.longitude,
            category: place.category,
            url: place.url,
            has_coupon: place.has_coupon,
            image_url: place.image_url,
            coupon_url: place.coupon_url,
            cover_image_url: place.cover_image_url,
        }
    }
}
