//! Sink for collected entities and relationships.

use crate::{Entity, Relationship};
use qualys_error::{JobStateError, JobStateErrorKind, QualysResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Trait for collection sinks.
///
/// Steps add what they collect and read back what earlier steps produced.
/// Keys are unique across entities and relationships; adding a key twice
/// is an error.
#[async_trait::async_trait]
pub trait JobState: Send + Sync {
    /// Add a batch of entities. Fails without adding anything on a duplicate key.
    async fn add_entities(&self, entities: Vec<Entity>) -> QualysResult<()>;

    /// Add a batch of relationships. Fails without adding anything on a duplicate key.
    async fn add_relationships(&self, relationships: Vec<Relationship>) -> QualysResult<()>;

    /// True when an entity or relationship with `key` was added.
    async fn has_key(&self, key: &str) -> bool;

    /// Entity with `key`, if added.
    async fn get_entity(&self, key: &str) -> Option<Entity>;

    /// All entities of one type, in insertion order.
    async fn entities_of_type(&self, entity_type: &str) -> Vec<Entity>;

    /// Store a value for later steps.
    async fn set_data(&self, key: &str, value: Value);

    /// Value stored by an earlier step.
    async fn get_data(&self, key: &str) -> Option<Value>;

    /// Number of entities added.
    async fn entity_count(&self) -> usize;

    /// Number of relationships added.
    async fn relationship_count(&self) -> usize;
}

#[derive(Default)]
struct Collected {
    entities: Vec<Entity>,
    entity_index: HashMap<String, usize>,
    relationships: Vec<Relationship>,
    relationship_keys: HashSet<String>,
    data: HashMap<String, Value>,
}

impl Collected {
    fn contains(&self, key: &str) -> bool {
        self.entity_index.contains_key(key) || self.relationship_keys.contains(key)
    }

    /// Reject keys already present or repeated within the batch.
    fn check_new<'a>(&self, keys: impl Iterator<Item = &'a String>) -> QualysResult<()> {
        let mut batch = HashSet::new();
        for key in keys {
            if self.contains(key) || !batch.insert(key.as_str()) {
                return Err(JobStateError::new(JobStateErrorKind::DuplicateKey(key.clone())).into());
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EntitiesFile<'a> {
    entities: &'a [Entity],
}

#[derive(Serialize)]
struct RelationshipsFile<'a> {
    relationships: &'a [Relationship],
}

/// Job state held in memory, written out as JSON when the run ends.
#[derive(Default)]
pub struct InMemoryJobState {
    collected: RwLock<Collected>,
}

impl InMemoryJobState {
    /// Empty job state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `entities.json` and `relationships.json` into `dir`.
    ///
    /// Creates the directory if it doesn't exist.
    #[instrument(skip_all)]
    pub async fn write_to_dir(&self, dir: impl AsRef<Path>) -> QualysResult<()> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| write_error(dir.to_path_buf(), e))?;

        let collected = self.collected.read().await;
        write_json(
            dir.join("entities.json"),
            &EntitiesFile {
                entities: &collected.entities,
            },
        )
        .await?;
        write_json(
            dir.join("relationships.json"),
            &RelationshipsFile {
                relationships: &collected.relationships,
            },
        )
        .await?;

        info!(
            dir = %dir.display(),
            entities = collected.entities.len(),
            relationships = collected.relationships.len(),
            "Wrote collected graph"
        );
        Ok(())
    }
}

async fn write_json<T: Serialize>(path: PathBuf, document: &T) -> QualysResult<()> {
    let json = serde_json::to_vec_pretty(document)
        .map_err(|e| JobStateError::new(JobStateErrorKind::Serialize(e.to_string())))?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| write_error(path, e))?;
    Ok(())
}

fn write_error(path: PathBuf, error: std::io::Error) -> JobStateError {
    JobStateError::new(JobStateErrorKind::Write {
        path: path.display().to_string(),
        message: error.to_string(),
    })
}

#[async_trait::async_trait]
impl JobState for InMemoryJobState {
    async fn add_entities(&self, entities: Vec<Entity>) -> QualysResult<()> {
        let mut collected = self.collected.write().await;
        collected.check_new(entities.iter().map(|entity| entity.key()))?;

        debug!(count = entities.len(), "Adding entities");
        for entity in entities {
            let index = collected.entities.len();
            collected.entity_index.insert(entity.key().clone(), index);
            collected.entities.push(entity);
        }
        Ok(())
    }

    async fn add_relationships(&self, relationships: Vec<Relationship>) -> QualysResult<()> {
        let mut collected = self.collected.write().await;
        collected.check_new(relationships.iter().map(|relationship| relationship.key()))?;

        debug!(count = relationships.len(), "Adding relationships");
        for relationship in relationships {
            collected.relationship_keys.insert(relationship.key().clone());
            collected.relationships.push(relationship);
        }
        Ok(())
    }

    async fn has_key(&self, key: &str) -> bool {
        self.collected.read().await.contains(key)
    }

    async fn get_entity(&self, key: &str) -> Option<Entity> {
        let collected = self.collected.read().await;
        let index = *collected.entity_index.get(key)?;
        collected.entities.get(index).cloned()
    }

    async fn entities_of_type(&self, entity_type: &str) -> Vec<Entity> {
        self.collected
            .read()
            .await
            .entities
            .iter()
            .filter(|entity| entity.entity_type() == entity_type)
            .cloned()
            .collect()
    }

    async fn set_data(&self, key: &str, value: Value) {
        self.collected
            .write()
            .await
            .data
            .insert(key.to_string(), value);
    }

    async fn get_data(&self, key: &str) -> Option<Value> {
        self.collected.read().await.data.get(key).cloned()
    }

    async fn entity_count(&self) -> usize {
        self.collected.read().await.entities.len()
    }

    async fn relationship_count(&self) -> usize {
        self.collected.read().await.relationships.len()
    }
}
