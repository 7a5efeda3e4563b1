use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "old_heck";
const APP_NAME: &str = "old-heck-back";
const URI_ENV: &str = "MONGO_URI";
const DB_ENV: &str = "MONGO_DB";

/// Parsed connection settings for the MongoDB document store.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri`; the database defaults to `old_heck`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());

        Ok(Self {
            options,
            database_name: db_name
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_DB)
                .to_owned(),
        })
    }

    /// Read `MONGO_URI` and the optional `MONGO_DB`.
    pub async fn from_env() -> MongoResult<Self> {
        let uri =
            std::env::var(URI_ENV).map_err(|_| MongoDaoError::MissingEnvVar { var: URI_ENV })?;
        let db = std::env::var(DB_ENV).ok();
        Self::from_uri(&uri, db.as_deref()).await
    }
}
