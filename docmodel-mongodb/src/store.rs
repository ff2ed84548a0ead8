use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use bson::{Document, Bson};
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions as MongoFindOptions},
};
use docmodel_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    document::{ID_KEY, identity_spec, new_identity},
    error::{DocumentStoreError, DocumentStoreResult},
    query::FindOptions,
};


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    fn find_options(options: &FindOptions) -> MongoFindOptions {
        let mut find_options = MongoFindOptions::default();

        find_options.sort = options.sort_document();
        find_options.limit = options.limit.map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));
        find_options.skip = options.skip.map(|skip| u64::try_from(skip).unwrap_or(u64::MAX));

        find_options
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find(&self, collection: &str, spec: Document, options: FindOptions) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .find(spec)
            .with_options(Self::find_options(&options))
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn stream(&self, collection: &str, spec: Document, options: FindOptions, batch_size: usize) -> DocumentStoreResult<DocumentStream> {
        let mut find_options = Self::find_options(&options);
        find_options.batch_size = u32::try_from(batch_size).ok();

        let cursor = self.get_collection(collection)
            .find(spec)
            .with_options(find_options)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(
            cursor
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))
                .boxed()
        )
    }

    async fn find_one(&self, collection: &str, spec: Document) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(spec)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn count(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(spec)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn save(&self, collection: &str, mut document: Document) -> DocumentStoreResult<Bson> {
        let id = match document.get(ID_KEY).cloned() {
            None | Some(Bson::Null) => {
                let id = new_identity();
                document.insert(ID_KEY, id.clone());
                id
            }
            Some(id) => id,
        };

        self.get_collection(collection)
            .replace_one(identity_spec(id.clone()), document)
            .upsert(true)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(id)
    }

    async fn remove(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(spec)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn update(&self, collection: &str, spec: Document, modifier: Document, multi: bool) -> DocumentStoreResult<u64> {
        let collection = self.get_collection(collection);
        let is_replacement = modifier.keys().all(|key| !key.starts_with('$'));

        let result = match (is_replacement, multi) {
            (true, true) => {
                return Err(DocumentStoreError::InvalidDocument(
                    "a replacement document can only update a single document".to_string(),
                ));
            }
            (true, false) => collection.replace_one(spec, modifier).await,
            (false, true) => collection.update_many(spec, modifier).await,
            (false, false) => collection.update_one(spec, modifier).await,
        };

        Ok(
            result
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .matched_count
        )
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        log::debug!("connecting to mongodb database {}", self.database);

        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
