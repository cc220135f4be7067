//! In-memory domain inventory keyed by domain name.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::{domain::DomainRecord, Error, Result};

/// Mapping of domain name to [`DomainRecord`], iterated in insertion order.
///
/// Keys are case-sensitive. Writing an existing name overwrites the record in
/// place, so its position in the display order is stable across reloads.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    records: Vec<DomainRecord>,
    index: HashMap<String, usize>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `name`.
    pub fn add_domain(
        &mut self,
        name: &str,
        expiration_date: Option<NaiveDate>,
        provider: Option<String>,
        link: Option<String>,
    ) -> Result<()> {
        let mut record = DomainRecord::new(name);
        record.expiration_date = expiration_date;
        record.provider = provider;
        record.management_link = link;
        self.upsert(record)
    }

    /// Insert or overwrite a complete record (last write wins).
    pub fn upsert(&mut self, record: DomainRecord) -> Result<()> {
        if record.name.trim().is_empty() {
            return Err(Error::InvalidRecord(
                "domain name must not be empty".to_string(),
            ));
        }

        match self.index.get(&record.name) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.index.insert(record.name.clone(), self.records.len());
                self.records.push(record);
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&DomainRecord> {
        self.index
            .get(name)
            .map(|&pos| &self.records[pos])
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Remove a record. Absent names are a no-op.
    pub fn remove(&mut self, name: &str) {
        let Some(pos) = self.index.remove(name) else {
            return;
        };
        self.records.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
    }

    /// All `(name, record)` pairs in insertion order.
    ///
    /// The iterator borrows the inventory; call again to restart.
    pub fn all(&self) -> impl Iterator<Item = (&str, &DomainRecord)> + Clone + '_ {
        self.records.iter().map(|r| (r.name.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records that carry an expiration date.
    pub fn dated_len(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.expiration_date.is_some())
            .count()
    }
}
