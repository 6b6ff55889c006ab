//! Mongo-backed [`crate::HistoryStore`], grounded on the source's
//! `MongoMapper` (connect once, `InsertOneNoCache`-equivalent insert).

use crate::{History, HistoryStore};
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use psych_core::CoreError;

const COLLECTION_NAME: &str = "history";

pub struct MongoHistoryStore {
    collection: Collection<History>,
}

impl MongoHistoryStore {
    pub async fn connect(url: &str, db: &str) -> Result<Self, CoreError> {
        let client = Client::with_uri_str(url)
            .await
            .map_err(|e| CoreError::StoreError(e.to_string()))?;
        let collection = client.database(db).collection::<History>(COLLECTION_NAME);

        let index = IndexModel::builder()
            .keys(doc! { "session_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection
            .create_index(index)
            .await
            .map_err(|e| CoreError::StoreError(e.to_string()))?;

        Ok(Self { collection })
    }
}

#[async_trait]
impl HistoryStore for MongoHistoryStore {
    async fn insert(&self, history: &mut History) -> Result<(), CoreError> {
        let result = self
            .collection
            .insert_one(&*history)
            .await
            .map_err(|e| CoreError::StoreError(e.to_string()))?;
        history.id = result.inserted_id.as_object_id();
        Ok(())
    }
}
