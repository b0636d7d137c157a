//! static per-role zone data: answerable records and delegations

use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::dns::protocol::{QueryType, ResourceRecord};

/// Where resolution of a suffix continues. The optional NS record is what
/// a role answers with when forwarding to `next_hop` fails.
#[derive(Clone, Debug)]
pub struct Delegation {
    pub next_hop: SocketAddr,
    pub nameserver: Option<ResourceRecord>,
}

/// Read-only authority data for one role, built once at startup and never
/// mutated afterwards.
pub struct ZoneTable {
    records: BTreeMap<String, Vec<ResourceRecord>>,
    delegations: BTreeMap<String, Delegation>,
}

impl ZoneTable {
    pub fn new() -> ZoneTable {
        ZoneTable {
            records: BTreeMap::new(),
            delegations: BTreeMap::new(),
        }
    }

    pub fn add_record(&mut self, domain: &str, record: ResourceRecord) {
        self.records
            .entry(domain.to_string())
            .or_insert_with(Vec::new)
            .push(record);
    }

    pub fn add_delegation(&mut self, key: &str, delegation: Delegation) {
        self.delegations.insert(key.to_string(), delegation);
    }

    /// Records for an exact domain match, filtered to the requested type.
    pub fn lookup_records(&self, domain: &str, qtype: QueryType) -> Vec<ResourceRecord> {
        match self.records.get(domain) {
            Some(records) => records
                .iter()
                .filter(|rec| rec.query_type() == qtype)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn delegation(&self, key: &str) -> Option<&Delegation> {
        self.delegations.get(key)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_lookup_filters_by_type() {
        let mut zones = ZoneTable::new();
        zones.add_record(
            "google.com",
            ResourceRecord::A {
                addr: "142.250.190.46".parse().unwrap(),
                ttl: 300,
            },
        );
        zones.add_record(
            "google.com",
            ResourceRecord::MX {
                preference: 10,
                host: "mail.google.com".to_string(),
                ttl: 300,
            },
        );

        let a = zones.lookup_records("google.com", QueryType::A);
        assert_eq!(1, a.len());
        assert_eq!(QueryType::A, a[0].query_type());

        assert!(zones.lookup_records("google.com", QueryType::AAAA).is_empty());
        assert!(zones.lookup_records("facebook.com", QueryType::A).is_empty());
    }

    #[test]
    fn test_delegation_lookup() {
        let mut zones = ZoneTable::new();
        zones.add_delegation(
            "com",
            Delegation {
                next_hop: "127.0.0.1:5301".parse().unwrap(),
                nameserver: None,
            },
        );

        assert!(zones.delegation("com").is_some());
        assert!(zones.delegation("org").is_none());
    }
}
