//! per-role TTL cache for forwarded answers

use std::collections::BTreeMap;

use chrono::prelude::*;
use chrono::Duration;

use crate::dns::protocol::{QueryType, ResourceRecord};

#[derive(Clone)]
pub struct CacheEntry {
    pub records: Vec<ResourceRecord>,
    pub expires_at: DateTime<Local>,
}

/// Maps (domain, query type) to a record set with an absolute expiry.
/// Entries disappear only when a lookup finds them expired; there is no
/// background sweep and no capacity bound, so memory grows with the number
/// of distinct keys actually queried.
pub struct ResponseCache {
    entries: BTreeMap<(String, QueryType), CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> ResponseCache {
        ResponseCache {
            entries: BTreeMap::new(),
        }
    }

    pub fn lookup(&mut self, domain: &str, qtype: QueryType) -> Option<Vec<ResourceRecord>> {
        self.lookup_at(domain, qtype, Local::now())
    }

    fn lookup_at(
        &mut self,
        domain: &str,
        qtype: QueryType,
        now: DateTime<Local>,
    ) -> Option<Vec<ResourceRecord>> {
        let key = (domain.to_string(), qtype);

        match self.entries.get(&key) {
            Some(entry) if now < entry.expires_at => Some(entry.records.clone()),
            Some(_) => {
                // Expired, evict on the way out
                self.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Overwrites any existing entry for the key. The whole set expires
    /// when the first record's TTL does; per-record TTLs are not tracked
    /// beyond that.
    pub fn store(&mut self, domain: &str, qtype: QueryType, records: &[ResourceRecord]) {
        self.store_at(domain, qtype, records, Local::now())
    }

    fn store_at(
        &mut self,
        domain: &str,
        qtype: QueryType,
        records: &[ResourceRecord],
        now: DateTime<Local>,
    ) {
        let ttl = match records.first() {
            Some(rec) => rec.ttl(),
            None => return,
        };

        self.entries.insert(
            (domain.to_string(), qtype),
            CacheEntry {
                records: records.to_vec(),
                expires_at: now + Duration::seconds(ttl as i64),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
