//! Vector collection backed by Qdrant
//!
//! One `QdrantIndex` per collection. The embedding dimension is declared at
//! init and must match the embedder; a mismatch surfaces as a backend error
//! on the first upsert.

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        value::Kind, Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance,
        FieldCondition, Filter, Match, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
        UpsertPointsBuilder, VectorParamsBuilder,
    },
    Qdrant,
};
use std::collections::HashMap;

use mnemo_core::{Error, Result, VectorFilter, VectorHit, VectorIndex, VectorPoint};

/// Configuration for one Qdrant collection
#[derive(Debug, Clone)]
pub struct QdrantIndexConfig {
    pub endpoint: String,
    pub collection: String,
    pub vector_dim: usize,
    pub api_key: Option<String>,
}

/// Qdrant-backed vector index
pub struct QdrantIndex {
    client: Qdrant,
    config: QdrantIndexConfig,
}

impl QdrantIndex {
    /// Connect and ensure the collection exists
    pub async fn connect(config: QdrantIndexConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| Error::BackendUnavailable(format!("qdrant connect: {}", e)))?;

        let index = Self { client, config };
        index.ensure_collection().await?;
        Ok(index)
    }

    /// Create the collection if it does not exist
    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("qdrant: {}", e)))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                        VectorParamsBuilder::new(self.config.vector_dim as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| Error::BackendUnavailable(format!("qdrant: {}", e)))?;

            tracing::debug!(
                collection = %self.config.collection,
                dim = self.config.vector_dim,
                "Created vector collection"
            );
        }

        Ok(())
    }

    fn to_qdrant_filter(filter: VectorFilter) -> Filter {
        let conditions: Vec<Condition> = filter
            .equals
            .into_iter()
            .map(|(key, value)| Condition {
                condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
                    FieldCondition {
                        key,
                        r#match: Some(Match {
                            match_value: Some(
                                qdrant_client::qdrant::r#match::MatchValue::Keyword(value),
                            ),
                        }),
                        ..Default::default()
                    },
                )),
            })
            .collect();

        Filter {
            must: conditions,
            ..Default::default()
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()> {
        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let payload: HashMap<String, qdrant_client::qdrant::Value> = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, v.into()))
                    .collect();
                PointStruct::new(p.id, p.vector, payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points))
            .await
            .map_err(|e| Error::BackendUnavailable(format!("qdrant upsert: {}", e)))?;

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<VectorFilter>,
    ) -> Result<Vec<VectorHit>> {
        let mut search_builder = SearchPointsBuilder::new(
            &self.config.collection,
            vector.to_vec(),
            top_k as u64,
        )
        .with_payload(true);

        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            search_builder = search_builder.filter(Self::to_qdrant_filter(f));
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("qdrant search: {}", e)))?;

        let hits = results
            .result
            .into_iter()
            .map(|point| {
                let mut payload = HashMap::new();
                for (k, v) in point.payload {
                    if let Some(Kind::StringValue(s)) = v.kind {
                        payload.insert(k, s);
                    }
                }

                let id = point
                    .id
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        },
                        None => String::new(),
                    })
                    .unwrap_or_default();

                VectorHit {
                    id,
                    score: point.score,
                    payload,
                }
            })
            .collect();

        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let points: Vec<PointId> = ids.iter().map(|id| PointId::from(id.clone())).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.config.collection)
                    .points(PointsIdsList { ids: points }),
            )
            .await
            .map_err(|e| Error::BackendUnavailable(format!("qdrant delete: {}", e)))?;

        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let info = self
            .client
            .collection_info(&self.config.collection)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("qdrant: {}", e)))?;

        Ok(info
            .result
            .map(|r| r.points_count.unwrap_or(0))
            .unwrap_or(0))
    }
}
