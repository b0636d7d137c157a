//! per-role resolution: zone table, cache, or forward down the hierarchy

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use rand::random;

use crate::dns::authority::ZoneTable;
use crate::dns::cache::ResponseCache;
use crate::dns::client::DnsClient;
use crate::dns::protocol::{QueryType, ResourceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Root,
    Tld,
    Authoritative,
    Authorization,
}

impl Role {
    /// The suffix under which this role delegates a domain, if it delegates
    /// at all. Names with fewer than two labels are unresolvable everywhere.
    pub fn delegation_key(&self, domain: &str) -> Option<String> {
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 {
            return None;
        }

        match *self {
            Role::Root => Some(labels[labels.len() - 1].to_string()),
            Role::Tld => Some(labels[labels.len() - 2..].join(".")),
            // Leaf roles answer from their own records only
            Role::Authoritative | Role::Authorization => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Role::Root => "root",
            Role::Tld => "tld",
            Role::Authoritative => "authoritative",
            Role::Authorization => "authorization",
        };

        write!(f, "{}", name)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Role, String> {
        match s {
            "root" => Ok(Role::Root),
            "tld" => Ok(Role::Tld),
            "authoritative" => Ok(Role::Authoritative),
            "authorization" => Ok(Role::Authorization),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// Where an answer came from, carried alongside the records so the server
/// loop can log the decision.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    #[display(fmt = "zone data")]
    Zone,
    #[display(fmt = "cache")]
    Cache,
    #[display(fmt = "downstream")]
    Downstream,
    #[display(fmt = "delegation fallback")]
    Fallback,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Answer {
        records: Vec<ResourceRecord>,
        source: Source,
    },
    NxDomain,
}

/// The per-role decision procedure. Same shape at every role; only the
/// zone table and the delegation key derivation differ.
pub struct Resolver<'a> {
    role: Role,
    zones: &'a ZoneTable,
    cache: &'a mut ResponseCache,
    client: &'a dyn DnsClient,
}

impl<'a> Resolver<'a> {
    pub fn new(
        role: Role,
        zones: &'a ZoneTable,
        cache: &'a mut ResponseCache,
        client: &'a dyn DnsClient,
    ) -> Resolver<'a> {
        Resolver {
            role,
            zones,
            cache,
            client,
        }
    }

    pub fn resolve(&mut self, domain: &str, qtype: QueryType) -> Resolution {
        // Cache hits are returned as-is, without revalidating against the
        // zone table.
        if let Some(records) = self.cache.lookup(domain, qtype) {
            return Resolution::Answer {
                records,
                source: Source::Cache,
            };
        }

        let direct = self.zones.lookup_records(domain, qtype);
        if !direct.is_empty() {
            return Resolution::Answer {
                records: direct,
                source: Source::Zone,
            };
        }

        let key = match self.role.delegation_key(domain) {
            Some(key) => key,
            None => return Resolution::NxDomain,
        };

        let delegation = match self.zones.delegation(&key) {
            Some(delegation) => delegation,
            None => return Resolution::NxDomain,
        };

        match self.client.send_query(domain, qtype, delegation.next_hop, random::<u16>()) {
            Ok(records) => {
                if records.is_empty() {
                    // Downstream NXDOMAIN propagates back unchanged
                    return Resolution::NxDomain;
                }

                self.cache.store(domain, qtype, &records);

                Resolution::Answer {
                    records,
                    source: Source::Downstream,
                }
            }
            Err(_) => {
                // A failed forward degrades to "here is who to ask", at the
                // cost of caching a delegation record under a data key.
                match &delegation.nameserver {
                    Some(ns) => {
                        let records = vec![ns.clone()];
                        self.cache.store(domain, qtype, &records);

                        Resolution::Answer {
                            records,
                            source: Source::Fallback,
                        }
                    }
                    None => Resolution::NxDomain,
                }
            }
        }
    }
}
