use async_trait::async_trait;
use const_format::concatcp;
use matchday_lib::{location::LocationObservation, place::{Place, PlaceDraft}};
use sqlx::{pool::PoolConnection, query, query_as, Executor, MySql, MySqlPool, Pool, QueryBuilder};

use crate::{DataManagerError, LocationStore, PlaceStore};

use super::{constants::*, DatabaseConfig};

#[derive(Clone)]
pub struct MatchdayDatabase {
    pool: Pool<MySql>,
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> DataManagerError {
    move |err| DataManagerError::Database(format!("{context}: {err}"))
}

fn place_not_found(place_id: i64) -> DataManagerError {
    DataManagerError::NotFound(format!("Place {place_id} not found"))
}

impl MatchdayDatabase {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DataManagerError> {
        let pool = MySqlPool::connect_with(config.connect_options())
            .await
            .map_err(db_error("Failed to connect to database"))?;

        let db = Self {
            pool
        };

        if config.create_tables {
            db.init().await?;
        }

        Ok(db)
    }

    /// Creates the tables on an empty database. Existing tables are left untouched.
    pub async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", PLACES_TABLE_NAME, "(",
                PLACE_ID,        " BIGINT PRIMARY KEY AUTO_INCREMENT,",
                PLACENAME,       " VARCHAR(255) NOT NULL,",
                DESCRIPTION,     " TEXT NOT NULL,",
                LATITUDE,        " DOUBLE NOT NULL,",
                LONGITUDE,       " DOUBLE NOT NULL,",
                CATEGORY,        " VARCHAR(64) NOT NULL,",
                URL,             " TEXT NOT NULL,",
                HAS_COUPON,      " BOOLEAN,",
                IMAGE_URL,       " TEXT,",
                COUPON_URL,      " TEXT,",
                COVER_IMAGE_URL, " TEXT,
                INDEX (", CATEGORY, ")
            ) DEFAULT CHARSET = utf8mb4")).await
            .map_err(db_error("Failed to create places table"))?;

        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", LOCATION_TABLE_NAME, "(",
                J_LEAGUE_ID,   " VARCHAR(64) NOT NULL,",
                LATITUDE,      " DOUBLE NOT NULL,",
                LONGITUDE,     " DOUBLE NOT NULL,",
                ACCURACY,      " DOUBLE NOT NULL,",
                TIMESTAMP,     " DATETIME NOT NULL,",
                FAVORITE_CLUB, " VARCHAR(255) NOT NULL,
                INDEX (", FAVORITE_CLUB, ", ", TIMESTAMP, ")
            ) DEFAULT CHARSET = utf8mb4")).await
            .map_err(db_error("Failed to create location table"))?;

        Ok(())
    }

    /// One connection per operation, returned to the pool when the guard drops.
    async fn acquire(&self) -> Result<PoolConnection<MySql>, DataManagerError> {
        self.pool.acquire().await.map_err(db_error("Failed to acquire database connection"))
    }

    async fn fetch_place(conn: &mut PoolConnection<MySql>, place_id: i64) -> Result<Option<Place>, DataManagerError> {
        query_as::<_, Place>(concatcp!("SELECT ", PLACE_COLUMNS, " FROM ", PLACES_TABLE_NAME, " WHERE ", PLACE_ID, " = ?"))
            .bind(place_id)
            .fetch_optional(&mut **conn).await
            .map_err(db_error("Failed to get place"))
    }
}

#[async_trait]
impl PlaceStore for MatchdayDatabase {
    async fn insert_place(&self, draft: PlaceDraft) -> Result<Place, DataManagerError> {
        let mut conn = self.acquire().await?;

        let id = query(concatcp!("
            INSERT INTO ", PLACES_TABLE_NAME, "(",
            PLACENAME, ", ", DESCRIPTION, ", ", LATITUDE, ", ", LONGITUDE, ", ", CATEGORY, ", ", URL, ", ",
            HAS_COUPON, ", ", IMAGE_URL, ", ", COUPON_URL, ", ", COVER_IMAGE_URL, ")
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"))
                .bind(&draft.placename)
                .bind(&draft.description)
                .bind(draft.latitude)
                .bind(draft.longitude)
                .bind(&draft.category)
                .bind(&draft.url)
                .bind(draft.has_coupon)
                .bind(&draft.image_url)
                .bind(&draft.coupon_url)
                .bind(&draft.cover_image_url)
                .execute(&mut *conn).await
                .map_err(db_error("Failed to insert place"))?
                .last_insert_id();

        Ok(draft.into_place(id as i64))
    }

    async fn get_places(&self) -> Result<Vec<Place>, DataManagerError> {
        let mut conn = self.acquire().await?;

        query_as::<_, Place>(concatcp!("SELECT ", PLACE_COLUMNS, " FROM ", PLACES_TABLE_NAME, " ORDER BY ", PLACE_ID))
            .fetch_all(&mut *conn).await
            .map_err(db_error("Failed to get places"))
    }

    async fn get_place(&self, place_id: i64) -> Result<Place, DataManagerError> {
        let mut conn = self.acquire().await?;

        Self::fetch_place(&mut conn, place_id).await?
            .ok_or_else(|| place_not_found(place_id))
    }

    async fn get_places_in_category(&self, category: &str) -> Result<Vec<Place>, DataManagerError> {
        let mut conn = self.acquire().await?;

        // The binary collation keeps the match case sensitive whatever the column collation is
        query_as::<_, Place>(concatcp!("SELECT ", PLACE_COLUMNS, " FROM ", PLACES_TABLE_NAME, " WHERE ", CATEGORY, " = ? COLLATE utf8mb4_bin ORDER BY ", PLACE_ID))
            .bind(category)
            .fetch_all(&mut *conn).await
            .map_err(db_error("Failed to get places by category"))
    }

    async fn update_place(&self, place_id: i64, draft: PlaceDraft) -> Result<Place, DataManagerError> {
        let mut conn = self.acquire().await?;

        let result = query(concatcp!("
            UPDATE ", PLACES_TABLE_NAME, " SET ",
                PLACENAME, " = ?, ", DESCRIPTION, " = ?, ", LATITUDE, " = ?, ", LONGITUDE, " = ?, ",
                CATEGORY, " = ?, ", URL, " = ?, ", HAS_COUPON, " = ?, ", IMAGE_URL, " = ?, ",
                COUPON_URL, " = ?, ", COVER_IMAGE_URL, " = ?
            WHERE ", PLACE_ID, " = ?"))
                .bind(&draft.placename)
                .bind(&draft.description)
                .bind(draft.latitude)
                .bind(draft.longitude)
                .bind(&draft.category)
                .bind(&draft.url)
                .bind(draft.has_coupon)
                .bind(&draft.image_url)
                .bind(&draft.coupon_url)
                .bind(&draft.cover_image_url)
                .bind(place_id)
                .execute(&mut *conn).await
                .map_err(db_error("Failed to update place"))?;

        // MySQL reports zero affected rows when nothing changed, so check existence explicitly
        if result.rows_affected() == 0 && Self::fetch_place(&mut conn, place_id).await?.is_none() {
            return Err(place_not_found(place_id));
        }

        Ok(draft.into_place(place_id))
    }

    async fn delete_place(&self, place_id: i64) -> Result<(), DataManagerError> {
        let mut conn = self.acquire().await?;

        let result = query(concatcp!("DELETE FROM ", PLACES_TABLE_NAME, " WHERE ", PLACE_ID, " = ?"))
            .bind(place_id)
            .execute(&mut *conn).await
            .map_err(db_error("Failed to delete place"))?;

        if result.rows_affected() == 0 {
            return Err(place_not_found(place_id));
        }

        Ok(())
    }
}

#[async_trait]
impl LocationStore for MatchdayDatabase {
    async fn get_locations(&self) -> Result<Vec<LocationObservation>, DataManagerError> {
        let mut conn = self.acquire().await?;

        query_as::<_, LocationObservation>(concatcp!("SELECT ", LOCATION_COLUMNS, " FROM ", LOCATION_TABLE_NAME, " ORDER BY ", TIMESTAMP, " DESC"))
            .fetch_all(&mut *conn).await
            .map_err(db_error("Failed to get locations"))
    }

    async fn get_recent_locations(&self, club_labels: &[String], limit: usize) -> Result<Vec<LocationObservation>, DataManagerError> {
        if club_labels.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.acquire().await?;

        let mut builder = QueryBuilder::<MySql>::new(concatcp!(
            "SELECT ", LOCATION_COLUMNS, " FROM ", LOCATION_TABLE_NAME, " WHERE ", FAVORITE_CLUB, " IN ("
        ));
        let mut labels = builder.separated(", ");
        for label in club_labels {
            labels.push_bind(label.clone());
        }
        labels.push_unseparated(concatcp!(") ORDER BY ", TIMESTAMP, " DESC LIMIT "));
        builder.push_bind(limit as u64);

        builder.build_query_as::<LocationObservation>()
            .fetch_all(&mut *conn).await
            .map_err(db_error("Failed to get recent locations"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Run with `--ignored` against a scratch database
    fn test_config() -> DatabaseConfig {
        let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
        DatabaseConfig {
            host: var("MATCHDAY_TEST_DB_HOST", "127.0.0.1"),
            port: var("MATCHDAY_TEST_DB_PORT", "3306").parse().unwrap(),
            username: var("MATCHDAY_TEST_DB_USER", "root"),
            password: var("MATCHDAY_TEST_DB_PASSWORD", ""),
            database: var("MATCHDAY_TEST_DB_NAME", "matchday_test"),
            ssl: false,
            ssl_ca: None,
            create_tables: true,
        }
    }

    fn draft(category: &str) -> PlaceDraft {
        PlaceDraft {
            placename: "小野路宿里山交流館".into(),
            description: "旧角屋を改修した施設".into(),
            latitude: 35.6013,
            longitude: 139.4380,
            category: category.into(),
            url: "https://www.city.machida.tokyo.jp/".into(),
            has_coupon: Some(false),
            image_url: None,
            coupon_url: None,
            cover_image_url: None,
        }
    }

    #[tokio::test]
    #[ignore]
    async fn place_crud_against_mysql() {
        let db = MatchdayDatabase::connect(&test_config()).await.unwrap();

        let place = db.insert_place(draft("sightseeing")).await.unwrap();
        assert_eq!(db.get_place(place.id).await.unwrap(), place);

        // Same values again, zero rows changed, still found
        let same = db.update_place(place.id, draft("sightseeing")).await.unwrap();
        assert_eq!(same, place);

        let in_category = db.get_places_in_category("sightseeing").await.unwrap();
        assert!(in_category.iter().any(|p| p.id == place.id));
        assert!(db.get_places_in_category("Sightseeing").await.unwrap().iter().all(|p| p.id != place.id));

        db.delete_place(place.id).await.unwrap();
        assert!(matches!(db.delete_place(place.id).await, Err(DataManagerError::NotFound(_))));
        assert!(matches!(db.update_place(place.id, draft("park")).await, Err(DataManagerError::NotFound(_))));
    }

    #[tokio::test]
    #[ignore]
    async fn recent_locations_against_mysql() {
        let db = MatchdayDatabase::connect(&test_config()).await.unwrap();

        let none = db.get_recent_locations(&["no such club".to_string()], 3).await.unwrap();
        assert!(none.is_empty());

        let recent = db.get_recent_locations(&["FC町田ゼルビア".to_string()], 3).await.unwrap();
        assert!(recent.len() <= 3);
        assert!(recent.windows(2).all(|pair| pair[0].timestamp >= pair[1].timestamp));
    }
}
