use const_format::concatcp;

pub const PLACES_TABLE_NAME: &str = "places";
pub const PLACE_ID: &str = "id";
pub const PLACENAME: &str = "placename";
pub const DESCRIPTION: &str = "description";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const CATEGORY: &str = "category";
pub const URL: &str = "url";
pub const HAS_COUPON: &str = "has_coupon";
pub const IMAGE_URL: &str = "image_url";
pub const COUPON_URL: &str = "coupon_url";
pub const COVER_IMAGE_URL: &str = "cover_image_url";

pub const LOCATION_TABLE_NAME: &str = "d_location_data";
pub const J_LEAGUE_ID: &str = "J_league_id";
// Latitude, longitude
pub const ACCURACY: &str = "accuracy";
pub const TIMESTAMP: &str = "timestamp";
pub const FAVORITE_CLUB: &str = "favorite_club";

pub const PLACE_COLUMNS: &str = concatcp!(
    PLACE_ID, ", ", PLACENAME, ", ", DESCRIPTION, ", ", LATITUDE, ", ", LONGITUDE, ", ",
    CATEGORY, ", ", URL, ", ", HAS_COUPON, ", ", IMAGE_URL, ", ", COUPON_URL, ", ", COVER_IMAGE_URL
);

pub const LOCATION_COLUMNS: &str = concatcp!(
    J_LEAGUE_ID, ", ", LATITUDE, ", ", LONGITUDE, ", ", ACCURACY, ", ", TIMESTAMP, ", ", FAVORITE_CLUB
);
