//! everything one server instance owns

use std::net::SocketAddr;

use crate::dns::authority::ZoneTable;
use crate::dns::cache::ResponseCache;
use crate::dns::log::EventLog;
use crate::dns::resolve::Role;

/// State exclusively owned by a single server role: its zone table, its
/// response cache and its log. Nothing here is shared across roles; the
/// wire protocol is the only coupling between them.
pub struct ServerContext {
    pub role: Role,
    pub listen: SocketAddr,
    pub zones: ZoneTable,
    pub cache: ResponseCache,
    pub log: EventLog,
}

impl ServerContext {
    pub fn new(role: Role, listen: SocketAddr, zones: ZoneTable, log: EventLog) -> ServerContext {
        ServerContext {
            role,
            listen,
            zones,
            cache: ResponseCache::new(),
            log,
        }
    }
}
