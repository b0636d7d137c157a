//! the Client trait describing an interface for sending DNS queries, and
//! the blocking UDP implementation used for downstream forwards

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::dns::buffer::BytePacketBuffer;
use crate::dns::protocol::{DnsPacket, QueryType, ResourceRecord};
use crate::dns::{DnsError, Result};

pub trait DnsClient {
    /// Send one query and return the answer records. An empty set means the
    /// server replied NXDOMAIN; an error means the exchange itself failed
    /// (timeout, undecodable reply, transaction id mismatch).
    fn send_query(
        &self,
        domain: &str,
        qtype: QueryType,
        server: SocketAddr,
        id: u16,
    ) -> Result<Vec<ResourceRecord>>;
}

/// Blocking UDP client: fresh socket per request, single bounded wait, no
/// retry. Once the query is out we are committed to waiting out the timeout.
pub struct UdpClient {
    timeout: Duration,
}

impl UdpClient {
    pub fn new() -> UdpClient {
        UdpClient {
            timeout: Duration::from_secs(2),
        }
    }

    pub fn with_timeout(timeout: Duration) -> UdpClient {
        UdpClient { timeout }
    }

    /// One query/reply exchange, returning the decoded packet with the
    /// transaction id already validated.
    pub fn exchange(
        &self,
        domain: &str,
        qtype: QueryType,
        server: SocketAddr,
        id: u16,
    ) -> Result<DnsPacket> {
        let (_, packet) = self.exchange_raw(domain, qtype, server, id)?;

        Ok(packet)
    }

    /// Like `exchange`, but also hands back the reply datagram as received,
    /// before any decoding touched it.
    pub fn exchange_raw(
        &self,
        domain: &str,
        qtype: QueryType,
        server: SocketAddr,
        id: u16,
    ) -> Result<(Vec<u8>, DnsPacket)> {
        let data = DnsPacket::query(id, domain, qtype).to_bytes()?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_read_timeout(Some(self.timeout))?;
        socket.send_to(&data, server)?;

        let mut buf = [0u8; 512];
        let (len, _) = socket.recv_from(&mut buf)?;

        let raw = buf[..len].to_vec();
        let packet = decode_reply(id, &raw)?;

        Ok((raw, packet))
    }
}

impl DnsClient for UdpClient {
    fn send_query(
        &self,
        domain: &str,
        qtype: QueryType,
        server: SocketAddr,
        id: u16,
    ) -> Result<Vec<ResourceRecord>> {
        let packet = self.exchange(domain, qtype, server, id)?;

        reply_records(packet)
    }
}

/// Decode a reply and enforce transaction correlation: a reply carrying a
/// different id than the outstanding request is discarded as untrusted.
pub fn decode_reply(expected_id: u16, data: &[u8]) -> Result<DnsPacket> {
    let mut buffer = BytePacketBuffer::from_slice(data);
    let packet = DnsPacket::from_buffer(&mut buffer)?;

    if packet.header.id != expected_id {
        return Err(DnsError::IdMismatch {
            expected: expected_id,
            got: packet.header.id,
        });
    }

    Ok(packet)
}

/// Lowercase hex rendering of a datagram, used by the client mode to dump
/// the raw reply alongside the decoded records.
pub fn hex_dump(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

/// NXDOMAIN propagates as an empty record set; any other failure rcode is
/// a forwarding failure.
fn reply_records(packet: DnsPacket) -> Result<Vec<ResourceRecord>> {
    match packet.header.rescode {
        0 => Ok(packet.answers),
        3 => Ok(Vec::new()),
        code => Err(DnsError::UpstreamFailure(code)),
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dns::protocol::Query;

    fn sample_query(id: u16) -> Query {
        Query {
            id,
            domain: "google.com".to_string(),
            qtype: QueryType::A,
            recursion_desired: true,
            raw_question: Vec::new(),
        }
    }

    fn a_record() -> ResourceRecord {
        ResourceRecord::A {
            addr: "142.250.190.46".parse().unwrap(),
            ttl: 300,
        }
    }

    #[test]
    fn test_matching_id_is_accepted() {
        let bytes = DnsPacket::response(&sample_query(0x1234), &[a_record()])
            .to_bytes()
            .unwrap();

        let packet = decode_reply(0x1234, &bytes).unwrap();
        assert_eq!(vec![a_record()], packet.answers);
    }

    #[test]
    fn test_mismatched_id_is_discarded() {
        let bytes = DnsPacket::response(&sample_query(0xBEEF), &[a_record()])
            .to_bytes()
            .unwrap();

        match decode_reply(0x1234, &bytes) {
            Err(DnsError::IdMismatch { expected, got }) => {
                assert_eq!(0x1234, expected);
                assert_eq!(0xBEEF, got);
            }
            other => panic!("expected id mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_reply_is_an_error() {
        let bytes = DnsPacket::response(&sample_query(0x1234), &[a_record()])
            .to_bytes()
            .unwrap();

        assert!(decode_reply(0x1234, &bytes[..bytes.len() - 4]).is_err());
    }

    #[test]
    fn test_nxdomain_reply_yields_empty_set() {
        let packet = {
            let bytes = DnsPacket::nxdomain(&sample_query(0x1234)).to_bytes().unwrap();
            decode_reply(0x1234, &bytes).unwrap()
        };

        assert_eq!(Vec::<ResourceRecord>::new(), reply_records(packet).unwrap());
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!("", hex_dump(&[]));
        assert_eq!("12ab00ff", hex_dump(&[0x12, 0xAB, 0x00, 0xFF]));

        let bytes = DnsPacket::query(0x1234, "example.com", QueryType::A)
            .to_bytes()
            .unwrap();
        assert!(hex_dump(&bytes).starts_with("12340100"));
    }

    #[test]
    fn test_failure_rcode_is_an_error() {
        let mut bytes = DnsPacket::nxdomain(&sample_query(0x1234)).to_bytes().unwrap();
        bytes[3] = (bytes[3] & 0xF0) | 0x02; // SERVFAIL

        let packet = decode_reply(0x1234, &bytes).unwrap();
        match reply_records(packet) {
            Err(DnsError::UpstreamFailure(2)) => {}
            other => panic!("expected upstream failure, got {:?}", other),
        }
    }
}
