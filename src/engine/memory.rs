//! In-Memory Entity Source
//!
//! Holds descriptors and fully hydrated records in memory. Useful for embedding
//! Tabulum as a library and for exercising the list command without a database.

use std::collections::{BTreeMap, BTreeSet};

use crate::engine::{EntityDescriptor, EntitySource, PageRequest, Record};
use crate::error::{Result, TabulumError};

/// In-memory entity source
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entities: BTreeMap<String, (EntityDescriptor, Vec<Record>)>,
    other_types: BTreeSet<String>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity with its stored records (in fetch order)
    #[must_use]
    pub fn with_entity(mut self, descriptor: EntityDescriptor, records: Vec<Record>) -> Self {
        self.entities.insert(descriptor.name.clone(), (descriptor, records));
        self
    }

    /// Register a type name that exists but is not an entity
    #[must_use]
    pub fn with_type(mut self, name: impl Into<String>) -> Self {
        self.other_types.insert(name.into());
        self
    }

    fn entity(&self, name: &str) -> Result<&(EntityDescriptor, Vec<Record>)> {
        self.entities.get(name).ok_or_else(|| TabulumError::not_an_entity(name))
    }
}

impl EntitySource for MemorySource {
    type Metadata = EntityDescriptor;

    fn engine_name(&self) -> &'static str {
        "memory"
    }

    async fn type_exists(&self, name: &str) -> Result<bool> {
        Ok(self.entities.contains_key(name) || self.other_types.contains(name))
    }

    async fn is_entity(&self, name: &str) -> Result<bool> {
        Ok(self.entities.contains_key(name))
    }

    async fn metadata(&self, name: &str) -> Result<EntityDescriptor> {
        Ok(self.entity(name)?.0.clone())
    }

    async fn fetch(&self, request: &PageRequest) -> Result<Vec<Record>> {
        let (_, records) = self.entity(&request.entity)?;
        Ok(records.iter().skip(request.offset).take(request.limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(count: i64) -> MemorySource {
        let descriptor = EntityDescriptor::new("User", vec!["id".into()], vec![]);
        let records = (1..=count).map(|id| Record::new().with_value("id", id)).collect();
        MemorySource::new().with_entity(descriptor, records).with_type("Money")
    }

    fn page(limit: usize, offset: usize) -> PageRequest {
        PageRequest { entity: "User".into(), limit, offset, with_associations: false }
    }

    #[tokio::test]
    async fn test_type_resolution() {
        let source = source(1);
        assert!(source.type_exists("User").await.unwrap());
        assert!(source.type_exists("Money").await.unwrap());
        assert!(!source.type_exists("Nope").await.unwrap());

        assert!(source.is_entity("User").await.unwrap());
        assert!(!source.is_entity("Money").await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_pages() {
        let source = source(5);
        assert_eq!(source.fetch(&page(10, 0)).await.unwrap().len(), 5);
        assert_eq!(source.fetch(&page(2, 0)).await.unwrap().len(), 2);
        assert_eq!(source.fetch(&page(10, 3)).await.unwrap().len(), 2);
        assert!(source.fetch(&page(10, 5)).await.unwrap().is_empty());
        assert!(source.fetch(&page(0, 0)).await.unwrap().is_empty());

        let second = source.fetch(&page(1, 1)).await.unwrap();
        assert_eq!(second[0].get("id"), Some(&crate::metadata::Value::Integer(2)));
    }
}
