//! JSON topology configuration and the built-in local default

use std::collections::BTreeMap;
use std::fs::File;
use std::net::SocketAddr;

use serde_derive::{Deserialize, Serialize};

use crate::dns::authority::{Delegation, ZoneTable};
use crate::dns::protocol::{validate_name, ResourceRecord};
use crate::dns::resolve::Role;
use crate::dns::{DnsError, Result};

#[derive(Serialize, Deserialize, Clone)]
pub struct Config {
    pub root: RoleConfig,
    pub tld: RoleConfig,
    pub authoritative: RoleConfig,
    pub authorization: RoleConfig,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct RoleConfig {
    pub listen: SocketAddr,
    #[serde(default)]
    pub zones: ZoneData,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct ZoneData {
    #[serde(default)]
    pub records: BTreeMap<String, Vec<RecordData>>,
    #[serde(default)]
    pub delegations: BTreeMap<String, DelegationData>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct RecordData {
    #[serde(rename = "type")]
    pub rtype: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    pub value: String,
    #[serde(default)]
    pub preference: Option<u16>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct DelegationData {
    pub next_hop: SocketAddr,
    #[serde(default)]
    pub nameserver: Option<RecordData>,
}

fn default_ttl() -> u32 {
    300
}

impl Config {
    pub fn from_file(path: &str) -> Result<Config> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(file)?;

        Ok(config)
    }

    pub fn role(&self, role: Role) -> &RoleConfig {
        match role {
            Role::Root => &self.root,
            Role::Tld => &self.tld,
            Role::Authoritative => &self.authoritative,
            Role::Authorization => &self.authorization,
        }
    }

    /// The built-in loopback topology: root on 5300 delegating TLDs to the
    /// TLD server on 5301, which delegates domains to the authoritative
    /// server on 5302 and example.com to the authorization leaf on 5303.
    pub fn default_local() -> Config {
        let auth: SocketAddr = "127.0.0.1:5302".parse().unwrap();
        let leaf: SocketAddr = "127.0.0.1:5303".parse().unwrap();
        let tld: SocketAddr = "127.0.0.1:5301".parse().unwrap();

        let mut root_delegations = BTreeMap::new();
        root_delegations.insert(
            "com".to_string(),
            delegation(tld, Some(rec("NS", 3600, "a.gtld-servers.net"))),
        );
        root_delegations.insert(
            "org".to_string(),
            delegation(tld, Some(rec("NS", 3600, "a0.org.afilias-nst.info"))),
        );
        root_delegations.insert(
            "arpa".to_string(),
            delegation(tld, Some(rec("NS", 3600, "a.root-servers.net"))),
        );

        let mut tld_delegations = BTreeMap::new();
        tld_delegations.insert(
            "google.com".to_string(),
            delegation(auth, Some(rec("NS", 300, "ns.google.com"))),
        );
        tld_delegations.insert(
            "facebook.com".to_string(),
            delegation(auth, Some(rec("NS", 300, "ns.facebook.com"))),
        );
        tld_delegations.insert(
            "wikipedia.org".to_string(),
            delegation(auth, Some(rec("NS", 300, "ns1.wikimedia.org"))),
        );
        tld_delegations.insert("in-addr.arpa".to_string(), delegation(auth, None));
        tld_delegations.insert(
            "example.com".to_string(),
            delegation(leaf, Some(rec("NS", 60, "ns.example.com"))),
        );

        let mut auth_records = BTreeMap::new();
        auth_records.insert(
            "google.com".to_string(),
            vec![
                rec("A", 300, "142.250.190.46"),
                rec("AAAA", 300, "2607:f8b0:4005:805::200e"),
                mx(300, "mail.google.com", 10),
                rec("NS", 300, "ns.google.com"),
            ],
        );
        auth_records.insert(
            "facebook.com".to_string(),
            vec![
                rec("A", 300, "157.240.221.35"),
                mx(300, "mail.facebook.com", 20),
                rec("NS", 300, "ns.facebook.com"),
            ],
        );
        auth_records.insert(
            "wikipedia.org".to_string(),
            vec![
                rec("A", 300, "91.198.174.192"),
                rec("AAAA", 300, "2620:0:862:ed1a::1"),
                rec("NS", 300, "ns1.wikimedia.org"),
            ],
        );
        auth_records.insert(
            "46.190.250.142.in-addr.arpa".to_string(),
            vec![rec("PTR", 300, "google.com")],
        );

        let mut leaf_records = BTreeMap::new();
        leaf_records.insert("example.com".to_string(), vec![rec("A", 60, "93.184.216.34")]);
        leaf_records.insert(
            "www.example.com".to_string(),
            vec![rec("CNAME", 60, "example.com")],
        );

        Config {
            root: RoleConfig {
                listen: "127.0.0.1:5300".parse().unwrap(),
                zones: ZoneData {
                    records: BTreeMap::new(),
                    delegations: root_delegations,
                },
            },
            tld: RoleConfig {
                listen: tld,
                zones: ZoneData {
                    records: BTreeMap::new(),
                    delegations: tld_delegations,
                },
            },
            authoritative: RoleConfig {
                listen: auth,
                zones: ZoneData {
                    records: auth_records,
                    delegations: BTreeMap::new(),
                },
            },
            authorization: RoleConfig {
                listen: leaf,
                zones: ZoneData {
                    records: leaf_records,
                    delegations: BTreeMap::new(),
                },
            },
        }
    }
}

fn rec(rtype: &str, ttl: u32, value: &str) -> RecordData {
    RecordData {
        rtype: rtype.to_string(),
        ttl,
        value: value.to_string(),
        preference: None,
    }
}

fn mx(ttl: u32, value: &str, preference: u16) -> RecordData {
    RecordData {
        rtype: "MX".to_string(),
        ttl,
        value: value.to_string(),
        preference: Some(preference),
    }
}

fn delegation(next_hop: SocketAddr, nameserver: Option<RecordData>) -> DelegationData {
    DelegationData {
        next_hop,
        nameserver,
    }
}

impl RecordData {
    /// Convert to a typed record, rejecting bad addresses, bad names and
    /// unsupported types at startup rather than at serialization time.
    pub fn build(&self) -> Result<ResourceRecord> {
        let record = match self.rtype.as_str() {
            "A" => ResourceRecord::A {
                addr: self
                    .value
                    .parse()
                    .map_err(|_| DnsError::BadRecord(format!("bad IPv4 address {}", self.value)))?,
                ttl: self.ttl,
            },
            "AAAA" => ResourceRecord::AAAA {
                addr: self
                    .value
                    .parse()
                    .map_err(|_| DnsError::BadRecord(format!("bad IPv6 address {}", self.value)))?,
                ttl: self.ttl,
            },
            "NS" => ResourceRecord::NS {
                host: self.host()?,
                ttl: self.ttl,
            },
            "CNAME" => ResourceRecord::CNAME {
                host: self.host()?,
                ttl: self.ttl,
            },
            "PTR" => ResourceRecord::PTR {
                host: self.host()?,
                ttl: self.ttl,
            },
            "MX" => ResourceRecord::MX {
                preference: self.preference.unwrap_or(10),
                host: self.host()?,
                ttl: self.ttl,
            },
            other => {
                return Err(DnsError::BadRecord(format!(
                    "unsupported record type {}",
                    other
                )))
            }
        };

        Ok(record)
    }

    fn host(&self) -> Result<String> {
        validate_name(&self.value)
            .map_err(|_| DnsError::BadRecord(format!("bad domain name {}", self.value)))?;

        Ok(self.value.to_lowercase())
    }
}

impl ZoneData {
    pub fn build(&self) -> Result<ZoneTable> {
        let mut table = ZoneTable::new();

        for (domain, records) in &self.records {
            validate_name(domain)
                .map_err(|_| DnsError::BadRecord(format!("bad zone domain {}", domain)))?;

            for record in records {
                table.add_record(&domain.to_lowercase(), record.build()?);
            }
        }

        for (key, data) in &self.delegations {
            validate_name(key)
                .map_err(|_| DnsError::BadRecord(format!("bad delegation key {}", key)))?;

            let nameserver = match &data.nameserver {
                Some(record) => Some(record.build()?),
                None => None,
            };

            table.add_delegation(
                &key.to_lowercase(),
                Delegation {
                    next_hop: data.next_hop,
                    nameserver,
                },
            );
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dns::protocol::QueryType;

    #[test]
    fn test_default_topology_builds() {
        let config = Config::default_local();

        for role in &[
            Role::Root,
            Role::Tld,
            Role::Authoritative,
            Role::Authorization,
        ] {
            assert!(config.role(*role).zones.build().is_ok());
        }

        let auth = config.authoritative.zones.build().unwrap();
        assert_eq!(1, auth.lookup_records("google.com", QueryType::A).len());
        assert_eq!(
            1,
            auth.lookup_records("46.190.250.142.in-addr.arpa", QueryType::PTR)
                .len()
        );

        let root = config.root.zones.build().unwrap();
        assert!(root.delegation("com").is_some());
        assert!(root.delegation("com").unwrap().nameserver.is_some());
    }

    #[test]
    fn test_record_validation() {
        assert!(rec("A", 300, "not-an-ip").build().is_err());
        assert!(rec("AAAA", 300, "142.250.190.46").build().is_err());
        assert!(rec("NS", 300, "bad_host.com").build().is_err());
        assert!(rec("TXT", 300, "hello").build().is_err());

        match rec("MX", 300, "mail.google.com").build().unwrap() {
            ResourceRecord::MX { preference, .. } => assert_eq!(10, preference),
            other => panic!("expected MX, got {:?}", other),
        }
    }

    #[test]
    fn test_zone_domains_are_normalized() {
        let mut records = BTreeMap::new();
        records.insert("Example.COM".to_string(), vec![rec("A", 60, "93.184.216.34")]);
        let zones = ZoneData {
            records,
            delegations: BTreeMap::new(),
        }
        .build()
        .unwrap();

        assert_eq!(1, zones.lookup_records("example.com", QueryType::A).len());
    }

    #[test]
    fn test_parse_from_json() {
        let config: RoleConfig = serde_json::from_str(
            r#"{
                "listen": "127.0.0.1:5302",
                "zones": {
                    "records": {
                        "google.com": [
                            {"type": "A", "ttl": 300, "value": "142.250.190.46"},
                            {"type": "MX", "value": "mail.google.com", "preference": 10}
                        ]
                    },
                    "delegations": {
                        "com": {"next_hop": "127.0.0.1:5301"}
                    }
                }
            }"#,
        )
        .unwrap();

        let zones = config.zones.build().unwrap();
        assert_eq!(1, zones.lookup_records("google.com", QueryType::A).len());
        assert_eq!(1, zones.lookup_records("google.com", QueryType::MX).len());
        assert!(zones.delegation("com").is_some());
    }
}
