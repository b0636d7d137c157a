//! the per-role UDP serve loop

use std::net::{SocketAddr, UdpSocket};

use crate::dns::client::UdpClient;
use crate::dns::context::ServerContext;
use crate::dns::protocol::{self, QueryError};
use crate::dns::resolve::{Resolution, Resolver};
use crate::dns::Result;

pub trait DnsServer {
    fn run(&mut self);
}

/// One server role: a single-threaded blocking receive loop. A datagram is
/// fully processed, including any synchronous downstream forward, before
/// the next one is read; the loop is the sole serialization point, which
/// also keeps the cache race-free.
pub struct UdpServer {
    context: ServerContext,
    socket: UdpSocket,
    client: UdpClient,
}

impl UdpServer {
    pub fn new(context: ServerContext) -> Result<UdpServer> {
        let socket = UdpSocket::bind(context.listen)?;

        Ok(UdpServer {
            context,
            socket,
            client: UdpClient::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn handle_datagram(&mut self, data: &[u8], peer: SocketAddr) -> Result<()> {
        let role = self.context.role;

        match protocol::parse_query(data) {
            Ok(query) => {
                self.context.log.write(&format!(
                    "{}: query {} {} from {}",
                    role, query.qtype, query.domain, peer
                ));

                let resolution = {
                    let context = &mut self.context;
                    let mut resolver = Resolver::new(
                        context.role,
                        &context.zones,
                        &mut context.cache,
                        &self.client,
                    );

                    resolver.resolve(&query.domain, query.qtype)
                };

                let reply = match &resolution {
                    Resolution::Answer { records, source } => {
                        self.context.log.write(&format!(
                            "{}: answering {} {} from {} ({} records)",
                            role,
                            query.qtype,
                            query.domain,
                            source,
                            records.len()
                        ));

                        protocol::response_bytes(&query, records)?
                    }
                    Resolution::NxDomain => {
                        self.context.log.write(&format!(
                            "{}: no records for {} {}, replying NXDOMAIN",
                            role, query.qtype, query.domain
                        ));

                        protocol::nxdomain_bytes(&query)?
                    }
                };

                self.socket.send_to(&reply, peer)?;
            }
            Err(QueryError::Malformed(malformed)) => {
                self.context.log.write(&format!(
                    "{}: malformed query from {} ({}), replying format error",
                    role, peer, malformed.kind
                ));

                let reply = protocol::format_error(&malformed)?;
                self.socket.send_to(&reply, peer)?;
            }
            Err(QueryError::Unsalvageable) => {
                // Not even a transaction id to echo, nothing to reply to
                self.context.log.write(&format!(
                    "{}: dropping undersized datagram from {}",
                    role, peer
                ));
            }
        }

        Ok(())
    }
}

impl DnsServer for UdpServer {
    fn run(&mut self) {
        loop {
            let mut buf = [0u8; 512];
            let (len, peer) = match self.socket.recv_from(&mut buf) {
                Ok(x) => x,
                Err(err) => {
                    self.context
                        .log
                        .write(&format!("{}: receive failed: {}", self.context.role, err));
                    continue;
                }
            };

            if let Err(err) = self.handle_datagram(&buf[..len], peer) {
                self.context.log.write(&format!(
                    "{}: failed to handle datagram from {}: {}",
                    self.context.role, peer, err
                ));
            }
        }
    }
}
