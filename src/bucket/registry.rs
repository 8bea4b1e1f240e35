//! In-memory collection of bucket records
//!
//! Records keep their insertion order (the registry document is an ordered
//! array) while a name index gives constant-time lookup.

use std::collections::HashMap;

use super::record::BucketRecord;
use crate::error::{ResenError, Result};

#[derive(Debug, Default)]
pub struct BucketRegistry {
    records: Vec<BucketRecord>,
    index: HashMap<String, usize>,
}

impl BucketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from loaded records, rejecting duplicate names.
    pub fn from_records(records: Vec<BucketRecord>) -> Result<Self> {
        let mut registry = Self::new();
        for record in records {
            registry.insert(record)?;
        }
        Ok(registry)
    }

    /// Create a fresh, empty bucket
    pub fn create(&mut self, name: &str) -> Result<&mut BucketRecord> {
        if name.trim().is_empty() {
            return Err(ResenError::Validation("Bucket name cannot be empty".to_string()));
        }
        self.insert(BucketRecord::new(name))
    }

    /// Add a fully built record
    pub fn insert(&mut self, record: BucketRecord) -> Result<&mut BucketRecord> {
        if self.index.contains_key(&record.name) {
            return Err(ResenError::Conflict(format!(
                "Bucket with name '{}' already exists",
                record.name
            )));
        }
        let pos = self.records.len();
        self.index.insert(record.name.clone(), pos);
        self.records.push(record);
        Ok(&mut self.records[pos])
    }

    /// Put a record back at `pos`, shifting later records down.
    pub fn insert_at(&mut self, pos: usize, record: BucketRecord) -> Result<&mut BucketRecord> {
        if self.index.contains_key(&record.name) {
            return Err(ResenError::Conflict(format!(
                "Bucket with name '{}' already exists",
                record.name
            )));
        }
        let pos = pos.min(self.records.len());
        for slot in self.index.values_mut() {
            if *slot >= pos {
                *slot += 1;
            }
        }
        self.index.insert(record.name.clone(), pos);
        self.records.insert(pos, record);
        Ok(&mut self.records[pos])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Result<&BucketRecord> {
        self.index
            .get(name)
            .map(|&i| &self.records[i])
            .ok_or_else(|| ResenError::no_bucket(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut BucketRecord> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.records[i]),
            None => Err(ResenError::no_bucket(name)),
        }
    }

    /// Delete a bucket. The caller is responsible for removing its container first.
    pub fn delete(&mut self, name: &str) -> Result<BucketRecord> {
        let pos = self.index.remove(name).ok_or_else(|| ResenError::no_bucket(name))?;
        let record = self.records.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Ok(record)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn records(&self) -> &[BucketRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut BucketRecord> {
        self.records.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
