//! DNS wire format: header, question, typed resource records and the
//! query/response builders used by every server role.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::dns::buffer::{DecodeError, PacketBuffer, Result, VectorPacketBuffer};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum QueryType {
    UNKNOWN(u16),
    A,     // 1
    NS,    // 2
    CNAME, // 5
    PTR,   // 12
    MX,    // 15
    AAAA,  // 28
}

impl QueryType {
    pub fn to_num(&self) -> u16 {
        match *self {
            QueryType::UNKNOWN(x) => x,
            QueryType::A => 1,
            QueryType::NS => 2,
            QueryType::CNAME => 5,
            QueryType::PTR => 12,
            QueryType::MX => 15,
            QueryType::AAAA => 28,
        }
    }

    pub fn from_num(num: u16) -> QueryType {
        match num {
            1 => QueryType::A,
            2 => QueryType::NS,
            5 => QueryType::CNAME,
            12 => QueryType::PTR,
            15 => QueryType::MX,
            28 => QueryType::AAAA,
            _ => QueryType::UNKNOWN(num),
        }
    }
}

impl std::str::FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<QueryType, String> {
        match s.to_uppercase().as_str() {
            "A" => Ok(QueryType::A),
            "NS" => Ok(QueryType::NS),
            "CNAME" => Ok(QueryType::CNAME),
            "PTR" => Ok(QueryType::PTR),
            "MX" => Ok(QueryType::MX),
            "AAAA" => Ok(QueryType::AAAA),
            _ => Err(format!("unknown record type: {}", s)),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            QueryType::UNKNOWN(x) => write!(f, "TYPE{}", x),
            QueryType::A => write!(f, "A"),
            QueryType::NS => write!(f, "NS"),
            QueryType::CNAME => write!(f, "CNAME"),
            QueryType::PTR => write!(f, "PTR"),
            QueryType::MX => write!(f, "MX"),
            QueryType::AAAA => write!(f, "AAAA"),
        }
    }
}

/// A single answer record. Answers in this system always describe the
/// queried name itself, so no owner name is carried; on the wire the name
/// field is a compression pointer back at the question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceRecord {
    A { addr: Ipv4Addr, ttl: u32 },
    AAAA { addr: Ipv6Addr, ttl: u32 },
    NS { host: String, ttl: u32 },
    CNAME { host: String, ttl: u32 },
    PTR { host: String, ttl: u32 },
    MX { preference: u16, host: String, ttl: u32 },
}

impl ResourceRecord {
    pub fn query_type(&self) -> QueryType {
        match *self {
            ResourceRecord::A { .. } => QueryType::A,
            ResourceRecord::AAAA { .. } => QueryType::AAAA,
            ResourceRecord::NS { .. } => QueryType::NS,
            ResourceRecord::CNAME { .. } => QueryType::CNAME,
            ResourceRecord::PTR { .. } => QueryType::PTR,
            ResourceRecord::MX { .. } => QueryType::MX,
        }
    }

    pub fn ttl(&self) -> u32 {
        match *self {
            ResourceRecord::A { ttl, .. } => ttl,
            ResourceRecord::AAAA { ttl, .. } => ttl,
            ResourceRecord::NS { ttl, .. } => ttl,
            ResourceRecord::CNAME { ttl, .. } => ttl,
            ResourceRecord::PTR { ttl, .. } => ttl,
            ResourceRecord::MX { ttl, .. } => ttl,
        }
    }

    /// Read one answer record. The owner name is consumed and discarded,
    /// following pointers where present. Records of unsupported types are
    /// skipped over and yield `None`.
    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<Option<ResourceRecord>> {
        let mut owner = String::new();
        buffer.read_qname(&mut owner)?;

        let qtype = QueryType::from_num(buffer.read_u16()?);
        let _ = buffer.read_u16()?; // class
        let ttl = buffer.read_u32()?;
        let data_len = buffer.read_u16()?;
        let rdata_end = buffer.pos() + data_len as usize;

        let record = match qtype {
            QueryType::A => {
                let raw_addr = buffer.read_u32()?;
                let addr = Ipv4Addr::new(
                    ((raw_addr >> 24) & 0xFF) as u8,
                    ((raw_addr >> 16) & 0xFF) as u8,
                    ((raw_addr >> 8) & 0xFF) as u8,
                    (raw_addr & 0xFF) as u8,
                );

                Some(ResourceRecord::A { addr, ttl })
            }
            QueryType::AAAA => {
                let raw_addr1 = buffer.read_u32()?;
                let raw_addr2 = buffer.read_u32()?;
                let raw_addr3 = buffer.read_u32()?;
                let raw_addr4 = buffer.read_u32()?;
                let addr = Ipv6Addr::new(
                    ((raw_addr1 >> 16) & 0xFFFF) as u16,
                    (raw_addr1 & 0xFFFF) as u16,
                    ((raw_addr2 >> 16) & 0xFFFF) as u16,
                    (raw_addr2 & 0xFFFF) as u16,
                    ((raw_addr3 >> 16) & 0xFFFF) as u16,
                    (raw_addr3 & 0xFFFF) as u16,
                    ((raw_addr4 >> 16) & 0xFFFF) as u16,
                    (raw_addr4 & 0xFFFF) as u16,
                );

                Some(ResourceRecord::AAAA { addr, ttl })
            }
            QueryType::NS => {
                let mut host = String::new();
                buffer.read_qname(&mut host)?;

                Some(ResourceRecord::NS { host, ttl })
            }
            QueryType::CNAME => {
                let mut host = String::new();
                buffer.read_qname(&mut host)?;

                Some(ResourceRecord::CNAME { host, ttl })
            }
            QueryType::PTR => {
                let mut host = String::new();
                buffer.read_qname(&mut host)?;

                Some(ResourceRecord::PTR { host, ttl })
            }
            QueryType::MX => {
                let preference = buffer.read_u16()?;
                let mut host = String::new();
                buffer.read_qname(&mut host)?;

                Some(ResourceRecord::MX {
                    preference,
                    host,
                    ttl,
                })
            }
            QueryType::UNKNOWN(_) => None,
        };

        buffer.seek(rdata_end)?;

        Ok(record)
    }

    /// Write one answer record. The name field is the fixed pointer 0xC00C,
    /// valid because exactly one question precedes the answer section in
    /// every reply this system emits. RDATA names are written as plain
    /// label sequences, never compressed.
    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_u16(0xC00C)?;
        buffer.write_u16(self.query_type().to_num())?;
        buffer.write_u16(1)?; // class IN
        buffer.write_u32(self.ttl())?;

        match *self {
            ResourceRecord::A { ref addr, .. } => {
                buffer.write_u16(4)?;

                for octet in addr.octets().iter() {
                    buffer.write_u8(*octet)?;
                }
            }
            ResourceRecord::AAAA { ref addr, .. } => {
                buffer.write_u16(16)?;

                for segment in addr.segments().iter() {
                    buffer.write_u16(*segment)?;
                }
            }
            ResourceRecord::NS { ref host, .. }
            | ResourceRecord::CNAME { ref host, .. }
            | ResourceRecord::PTR { ref host, .. } => {
                let rdlen = buffer.qname_len(host) as u16;
                buffer.write_u16(rdlen)?;
                buffer.write_qname(host)?;
            }
            ResourceRecord::MX {
                preference,
                ref host,
                ..
            } => {
                let rdlen = buffer.qname_len(host) as u16 + 2;
                buffer.write_u16(rdlen)?;
                buffer.write_u16(preference)?;
                buffer.write_qname(host)?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ResourceRecord::A { ref addr, ttl } => write!(f, "A {} ttl={}", addr, ttl),
            ResourceRecord::AAAA { ref addr, ttl } => write!(f, "AAAA {} ttl={}", addr, ttl),
            ResourceRecord::NS { ref host, ttl } => write!(f, "NS {} ttl={}", host, ttl),
            ResourceRecord::CNAME { ref host, ttl } => write!(f, "CNAME {} ttl={}", host, ttl),
            ResourceRecord::PTR { ref host, ttl } => write!(f, "PTR {} ttl={}", host, ttl),
            ResourceRecord::MX {
                preference,
                ref host,
                ttl,
            } => write!(f, "MX {} {} ttl={}", preference, host, ttl),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DnsHeader {
    pub id: u16, // 16 bits

    pub recursion_desired: bool,    // 1 bit
    pub truncated_message: bool,    // 1 bit
    pub authoritative_answer: bool, // 1 bit
    pub opcode: u8,                 // 4 bits
    pub response: bool,             // 1 bit

    pub rescode: u8,              // 4 bits
    pub checking_disabled: bool,  // 1 bit
    pub authed_data: bool,        // 1 bit
    pub z: bool,                  // 1 bit
    pub recursion_available: bool, // 1 bit

    pub questions: u16,             // 16 bits
    pub answers: u16,               // 16 bits
    pub authoritative_entries: u16, // 16 bits
    pub resource_entries: u16,      // 16 bits
}

impl DnsHeader {
    pub fn new() -> DnsHeader {
        DnsHeader {
            id: 0,

            recursion_desired: false,
            truncated_message: false,
            authoritative_answer: false,
            opcode: 0,
            response: false,

            rescode: 0,
            checking_disabled: false,
            authed_data: false,
            z: false,
            recursion_available: false,

            questions: 0,
            answers: 0,
            authoritative_entries: 0,
            resource_entries: 0,
        }
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_u16(self.id)?;

        buffer.write_u8(
            (self.recursion_desired as u8)
                | ((self.truncated_message as u8) << 1)
                | ((self.authoritative_answer as u8) << 2)
                | (self.opcode << 3)
                | ((self.response as u8) << 7),
        )?;

        buffer.write_u8(
            self.rescode
                | ((self.checking_disabled as u8) << 4)
                | ((self.authed_data as u8) << 5)
                | ((self.z as u8) << 6)
                | ((self.recursion_available as u8) << 7),
        )?;

        buffer.write_u16(self.questions)?;
        buffer.write_u16(self.answers)?;
        buffer.write_u16(self.authoritative_entries)?;
        buffer.write_u16(self.resource_entries)?;

        Ok(())
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        self.id = buffer.read_u16()?;

        let flags = buffer.read_u16()?;
        let a = (flags >> 8) as u8;
        let b = (flags & 0xFF) as u8;
        self.recursion_desired = (a & (1 << 0)) > 0;
        self.truncated_message = (a & (1 << 1)) > 0;
        self.authoritative_answer = (a & (1 << 2)) > 0;
        self.opcode = (a >> 3) & 0x0F;
        self.response = (a & (1 << 7)) > 0;

        self.rescode = b & 0x0F;
        self.checking_disabled = (b & (1 << 4)) > 0;
        self.authed_data = (b & (1 << 5)) > 0;
        self.z = (b & (1 << 6)) > 0;
        self.recursion_available = (b & (1 << 7)) > 0;

        self.questions = buffer.read_u16()?;
        self.answers = buffer.read_u16()?;
        self.authoritative_entries = buffer.read_u16()?;
        self.resource_entries = buffer.read_u16()?;

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: QueryType,
}

impl DnsQuestion {
    pub fn new(name: &str, qtype: QueryType) -> DnsQuestion {
        DnsQuestion {
            name: name.to_string(),
            qtype,
        }
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_qname(&self.name)?;
        buffer.write_u16(self.qtype.to_num())?;
        buffer.write_u16(1)?; // class IN

        Ok(())
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        buffer.read_qname(&mut self.name)?;
        self.qtype = QueryType::from_num(buffer.read_u16()?);
        let _ = buffer.read_u16()?; // class

        Ok(())
    }
}

/// One wire message: header, single question, answers. Constructed per
/// datagram and discarded once the reply is sent.
#[derive(Clone, Debug)]
pub struct DnsPacket {
    pub header: DnsHeader,
    pub question: DnsQuestion,
    pub answers: Vec<ResourceRecord>,
}

impl DnsPacket {
    /// A client/forwarder query: flags 0x0100 (RD set, all else zero).
    pub fn query(id: u16, domain: &str, qtype: QueryType) -> DnsPacket {
        let mut header = DnsHeader::new();
        header.id = id;
        header.recursion_desired = true;
        header.questions = 1;

        DnsPacket {
            header,
            question: DnsQuestion::new(domain, qtype),
            answers: Vec::new(),
        }
    }

    /// A successful reply: flags 0x8180, question echoed, one answer per
    /// record.
    pub fn response(query: &Query, records: &[ResourceRecord]) -> DnsPacket {
        let mut header = DnsHeader::new();
        header.id = query.id;
        header.response = true;
        header.recursion_desired = true;
        header.recursion_available = true;
        header.questions = 1;
        header.answers = records.len() as u16;

        DnsPacket {
            header,
            question: DnsQuestion::new(&query.domain, query.qtype),
            answers: records.to_vec(),
        }
    }

    /// A name error reply: flags 0x8183, question echoed, no answers.
    pub fn nxdomain(query: &Query) -> DnsPacket {
        let mut header = DnsHeader::new();
        header.id = query.id;
        header.response = true;
        header.recursion_desired = true;
        header.recursion_available = true;
        header.rescode = 3;
        header.questions = 1;

        DnsPacket {
            header,
            question: DnsQuestion::new(&query.domain, query.qtype),
            answers: Vec::new(),
        }
    }

    pub fn from_buffer<T: PacketBuffer>(buffer: &mut T) -> Result<DnsPacket> {
        let mut header = DnsHeader::new();
        header.read(buffer)?;

        if header.questions != 1 {
            return Err(DecodeError::UnsupportedQuery);
        }

        let mut question = DnsQuestion::new("", QueryType::UNKNOWN(0));
        question.read(buffer)?;

        let mut answers = Vec::new();
        for _ in 0..header.answers {
            if let Some(rec) = ResourceRecord::read(buffer)? {
                answers.push(rec);
            }
        }

        Ok(DnsPacket {
            header,
            question,
            answers,
        })
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        self.header.write(buffer)?;
        self.question.write(buffer)?;

        for answer in &self.answers {
            answer.write(buffer)?;
        }

        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = VectorPacketBuffer::new();
        self.write(&mut buffer)?;

        Ok(buffer.buffer)
    }
}

/// A decoded inbound query, domain lowercased and label-validated. The raw
/// question section is retained verbatim so a format error reply can echo
/// it even when parsing failed further along.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: u16,
    pub domain: String,
    pub qtype: QueryType,
    pub recursion_desired: bool,
    pub raw_question: Vec<u8>,
}

/// Salvaged pieces of a query that failed to decode, enough to send a
/// format error reply back.
#[derive(Debug, Clone)]
pub struct MalformedQuery {
    pub kind: DecodeError,
    pub id: u16,
    pub recursion_desired: bool,
    pub question: Vec<u8>,
}

#[derive(Debug)]
pub enum QueryError {
    /// Under two bytes: not even a transaction ID to reply with.
    Unsalvageable,
    Malformed(MalformedQuery),
}

/// Reject a name whose labels fall outside 1..=63 bytes of letters, digits
/// and hyphens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DecodeError::InvalidLabel);
    }

    for label in name.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(DecodeError::InvalidLabel);
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(DecodeError::InvalidLabel);
        }
    }

    Ok(())
}

/// The question section bytes as received, from offset 12 through QCLASS
/// (or to the end of the datagram if the terminator never shows up).
fn raw_question_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() <= 12 {
        return Vec::new();
    }

    match data[12..].iter().position(|&b| b == 0) {
        Some(i) => {
            let end = (12 + i + 5).min(data.len());
            data[12..end].to_vec()
        }
        None => data[12..].to_vec(),
    }
}

/// Server-side decode of an inbound datagram. Only standard queries with a
/// single IN-class question are accepted; anything else fails with a tag,
/// keeping whatever could be salvaged for the format error reply.
pub fn parse_query(data: &[u8]) -> std::result::Result<Query, QueryError> {
    if data.len() < 2 {
        return Err(QueryError::Unsalvageable);
    }

    let id = ((data[0] as u16) << 8) | (data[1] as u16);
    let flags = if data.len() >= 4 {
        ((data[2] as u16) << 8) | (data[3] as u16)
    } else {
        0
    };
    let recursion_desired = (flags & 0x0100) > 0;
    let raw_question = raw_question_bytes(data);

    let malformed = |kind| {
        QueryError::Malformed(MalformedQuery {
            kind,
            id,
            recursion_desired,
            question: raw_question_bytes(data),
        })
    };

    if data.len() < 12 {
        return Err(malformed(DecodeError::BufferTooShort));
    }

    let opcode = ((flags >> 11) & 0x0F) as u8;
    if opcode != 0 {
        return Err(malformed(DecodeError::UnsupportedQuery));
    }

    let qdcount = ((data[4] as u16) << 8) | (data[5] as u16);
    if qdcount != 1 {
        return Err(malformed(DecodeError::UnsupportedQuery));
    }

    let mut domain = String::new();
    let mut pos = 12;
    loop {
        let len = match data.get(pos) {
            Some(&len) => len as usize,
            None => return Err(malformed(DecodeError::BufferTooShort)),
        };

        if len == 0 {
            pos += 1;
            break;
        }
        if len > 63 {
            return Err(malformed(DecodeError::InvalidLabel));
        }

        let end = pos + 1 + len;
        if end > data.len() {
            return Err(malformed(DecodeError::BufferTooShort));
        }

        if !domain.is_empty() {
            domain.push('.');
        }
        for &b in &data[pos + 1..end] {
            if !(b.is_ascii_alphanumeric() || b == b'-') {
                return Err(malformed(DecodeError::InvalidLabel));
            }
            domain.push(b.to_ascii_lowercase() as char);
        }

        pos = end;
    }

    if domain.is_empty() {
        return Err(malformed(DecodeError::InvalidLabel));
    }

    if pos + 4 > data.len() {
        return Err(malformed(DecodeError::BufferTooShort));
    }
    let qtype = ((data[pos] as u16) << 8) | (data[pos + 1] as u16);
    let qclass = ((data[pos + 2] as u16) << 8) | (data[pos + 3] as u16);
    if qclass != 1 {
        return Err(malformed(DecodeError::UnsupportedQuery));
    }

    Ok(Query {
        id,
        domain,
        qtype: QueryType::from_num(qtype),
        recursion_desired,
        raw_question,
    })
}

fn reply_bytes(packet: &DnsPacket, raw_question: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = VectorPacketBuffer::new();
    packet.header.write(&mut buffer)?;

    if raw_question.is_empty() {
        packet.question.write(&mut buffer)?;
    } else {
        for &b in raw_question {
            buffer.write_u8(b)?;
        }
    }

    for answer in &packet.answers {
        answer.write(&mut buffer)?;
    }

    Ok(buffer.buffer)
}

/// Encode a successful reply, echoing the question section byte for byte
/// as it arrived, so a mixed-case query gets its own spelling back even
/// though resolution ran on the lowercased name. The answer pointer at
/// 0xC00C stays valid because the echoed bytes sit at offset 12 exactly
/// like a re-encoded question would.
pub fn response_bytes(query: &Query, records: &[ResourceRecord]) -> Result<Vec<u8>> {
    reply_bytes(&DnsPacket::response(query, records), &query.raw_question)
}

/// Encode a name error reply, question echoed byte for byte.
pub fn nxdomain_bytes(query: &Query) -> Result<Vec<u8>> {
    reply_bytes(&DnsPacket::nxdomain(query), &query.raw_question)
}

/// A format error reply: QR set, RD echoed, RCODE 1. The body is the raw
/// question section captured during the failed decode, not re-encoded.
pub fn format_error(malformed: &MalformedQuery) -> Result<Vec<u8>> {
    let mut header = DnsHeader::new();
    header.id = malformed.id;
    header.response = true;
    header.recursion_desired = malformed.recursion_desired;
    header.rescode = 1;
    header.questions = 1;

    let mut buffer = VectorPacketBuffer::new();
    header.write(&mut buffer)?;

    let mut bytes = buffer.buffer;
    bytes.extend_from_slice(&malformed.question);

    Ok(bytes)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dns::buffer::BytePacketBuffer;

    fn sample_query(domain: &str, qtype: QueryType) -> Query {
        Query {
            id: 0xAAAA,
            domain: domain.to_string(),
            qtype,
            recursion_desired: true,
            raw_question: Vec::new(),
        }
    }

    fn roundtrip(records: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
        let query = sample_query("google.com", records[0].query_type());
        let bytes = DnsPacket::response(&query, &records).to_bytes().unwrap();

        let mut buffer = BytePacketBuffer::from_slice(&bytes);
        let packet = DnsPacket::from_buffer(&mut buffer).unwrap();

        assert_eq!("google.com", packet.question.name);
        assert_eq!(records.len() as u16, packet.header.answers);

        packet.answers
    }

    #[test]
    fn test_roundtrip_a() {
        let records = vec![ResourceRecord::A {
            addr: "142.250.190.46".parse().unwrap(),
            ttl: 300,
        }];
        assert_eq!(records, roundtrip(records.clone()));
    }

    #[test]
    fn test_roundtrip_aaaa() {
        let records = vec![ResourceRecord::AAAA {
            addr: "2607:f8b0:4005:805::200e".parse().unwrap(),
            ttl: 300,
        }];
        assert_eq!(records, roundtrip(records.clone()));
    }

    #[test]
    fn test_roundtrip_ns() {
        let records = vec![ResourceRecord::NS {
            host: "ns.google.com".to_string(),
            ttl: 300,
        }];
        assert_eq!(records, roundtrip(records.clone()));
    }

    #[test]
    fn test_roundtrip_cname() {
        let records = vec![ResourceRecord::CNAME {
            host: "example.com".to_string(),
            ttl: 60,
        }];
        assert_eq!(records, roundtrip(records.clone()));
    }

    #[test]
    fn test_roundtrip_ptr() {
        let records = vec![ResourceRecord::PTR {
            host: "google.com".to_string(),
            ttl: 300,
        }];
        assert_eq!(records, roundtrip(records.clone()));
    }

    #[test]
    fn test_roundtrip_mx() {
        let records = vec![ResourceRecord::MX {
            preference: 10,
            host: "mail.google.com".to_string(),
            ttl: 300,
        }];
        assert_eq!(records, roundtrip(records.clone()));
    }

    #[test]
    fn test_rdlength_covers_encoded_name() {
        let query = sample_query("google.com", QueryType::NS);
        let records = vec![ResourceRecord::NS {
            host: "ns.google.com".to_string(),
            ttl: 300,
        }];
        let bytes = DnsPacket::response(&query, &records).to_bytes().unwrap();

        // header 12 + question 16, then pointer/type/class/ttl before
        // RDLENGTH at offset 38; "ns.google.com" encodes to 15 bytes
        assert_eq!([0x00, 0x0F], [bytes[38], bytes[39]]);
        assert_eq!(40 + 15, bytes.len());
    }

    #[test]
    fn test_success_flags() {
        let query = sample_query("google.com", QueryType::A);
        let records = vec![ResourceRecord::A {
            addr: "142.250.190.46".parse().unwrap(),
            ttl: 300,
        }];
        let bytes = DnsPacket::response(&query, &records).to_bytes().unwrap();

        assert_eq!([0x81, 0x80], [bytes[2], bytes[3]]);
        assert_eq!([0x00, 0x01], [bytes[4], bytes[5]]); // QDCOUNT
        assert_eq!([0x00, 0x01], [bytes[6], bytes[7]]); // ANCOUNT
    }

    #[test]
    fn test_nxdomain_shape() {
        let query = sample_query("nowhere.xyz", QueryType::A);
        let bytes = DnsPacket::nxdomain(&query).to_bytes().unwrap();

        assert_eq!([0x81, 0x83], [bytes[2], bytes[3]]);
        assert_eq!([0x00, 0x01], [bytes[4], bytes[5]]); // QDCOUNT
        assert_eq!([0x00, 0x00], [bytes[6], bytes[7]]); // ANCOUNT
        assert_eq!([0x00, 0x00], [bytes[8], bytes[9]]); // NSCOUNT
        assert_eq!([0x00, 0x00], [bytes[10], bytes[11]]); // ARCOUNT

        // The question section is identical to the one in the query
        let query_bytes = DnsPacket::query(0xAAAA, "nowhere.xyz", QueryType::A)
            .to_bytes()
            .unwrap();
        assert_eq!(query_bytes[12..], bytes[12..]);
    }

    #[test]
    fn test_reply_echoes_question_spelling() {
        let bytes = DnsPacket::query(0x1234, "GooGle.Com", QueryType::A)
            .to_bytes()
            .unwrap();

        let query = parse_query(&bytes).unwrap();
        assert_eq!("google.com", query.domain);

        // The reply carries the question exactly as queried, mixed case
        // and all, with the answer following right after
        let records = vec![ResourceRecord::A {
            addr: "142.250.190.46".parse().unwrap(),
            ttl: 300,
        }];
        let reply = response_bytes(&query, &records).unwrap();
        let qend = 12 + query.raw_question.len();
        assert_eq!(bytes[12..], reply[12..qend]);
        assert_eq!([0xC0, 0x0C], [reply[qend], reply[qend + 1]]);

        let nx = nxdomain_bytes(&query).unwrap();
        assert_eq!(bytes[12..], nx[12..]);
    }

    #[test]
    fn test_query_flags() {
        let bytes = DnsPacket::query(0x1234, "example.com", QueryType::A)
            .to_bytes()
            .unwrap();
        assert_eq!([0x12, 0x34], [bytes[0], bytes[1]]);
        assert_eq!([0x01, 0x00], [bytes[2], bytes[3]]);
    }

    #[test]
    fn test_parse_query_success() {
        let bytes = DnsPacket::query(0x1234, "GooGle.Com", QueryType::MX)
            .to_bytes()
            .unwrap();

        let query = parse_query(&bytes).unwrap();
        assert_eq!(0x1234, query.id);
        assert_eq!("google.com", query.domain);
        assert_eq!(QueryType::MX, query.qtype);
        assert!(query.recursion_desired);
        assert_eq!(bytes[12..].to_vec(), query.raw_question);
    }

    #[test]
    fn test_parse_query_tiny_buffer_is_unsalvageable() {
        match parse_query(&[0xAA]) {
            Err(QueryError::Unsalvageable) => {}
            other => panic!("expected unsalvageable, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_short_header_salvages_id() {
        let data = [0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        match parse_query(&data) {
            Err(QueryError::Malformed(m)) => {
                assert_eq!(DecodeError::BufferTooShort, m.kind);
                assert_eq!(0x1234, m.id);
                assert!(m.recursion_desired);
                assert!(m.question.is_empty());
            }
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_rejects_nonzero_opcode() {
        let mut bytes = DnsPacket::query(1, "example.com", QueryType::A)
            .to_bytes()
            .unwrap();
        bytes[2] |= 0x08; // opcode 1, inverse query

        match parse_query(&bytes) {
            Err(QueryError::Malformed(m)) => {
                assert_eq!(DecodeError::UnsupportedQuery, m.kind)
            }
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_rejects_multiple_questions() {
        let mut bytes = DnsPacket::query(1, "example.com", QueryType::A)
            .to_bytes()
            .unwrap();
        bytes[5] = 2;

        match parse_query(&bytes) {
            Err(QueryError::Malformed(m)) => {
                assert_eq!(DecodeError::UnsupportedQuery, m.kind)
            }
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_rejects_non_in_class() {
        let mut bytes = DnsPacket::query(1, "example.com", QueryType::A)
            .to_bytes()
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] = 3; // CHAOS

        match parse_query(&bytes) {
            Err(QueryError::Malformed(m)) => {
                assert_eq!(DecodeError::UnsupportedQuery, m.kind)
            }
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_rejects_bad_label_but_keeps_question() {
        // "bad_host.com" carries an underscore, outside the allowed set
        let mut buffer = VectorPacketBuffer::new();
        let mut header = DnsHeader::new();
        header.id = 0x0703;
        header.recursion_desired = true;
        header.questions = 1;
        header.write(&mut buffer).unwrap();
        buffer.write_u8(8).unwrap();
        for b in b"bad_host" {
            buffer.write_u8(*b).unwrap();
        }
        buffer.write_u8(3).unwrap();
        for b in b"com" {
            buffer.write_u8(*b).unwrap();
        }
        buffer.write_u8(0).unwrap();
        buffer.write_u16(1).unwrap();
        buffer.write_u16(1).unwrap();

        match parse_query(&buffer.buffer) {
            Err(QueryError::Malformed(m)) => {
                assert_eq!(DecodeError::InvalidLabel, m.kind);
                assert_eq!(0x0703, m.id);
                assert_eq!(buffer.buffer[12..].to_vec(), m.question);
            }
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_format_error_echoes_rd_and_question() {
        let malformed = MalformedQuery {
            kind: DecodeError::InvalidLabel,
            id: 0x0703,
            recursion_desired: true,
            question: vec![0x03, b'f', b'o', b'o', 0x00, 0x00, 0x01, 0x00, 0x01],
        };

        let bytes = format_error(&malformed).unwrap();
        assert_eq!([0x07, 0x03], [bytes[0], bytes[1]]);
        assert_eq!([0x81, 0x01], [bytes[2], bytes[3]]);
        assert_eq!([0x00, 0x01], [bytes[4], bytes[5]]); // QDCOUNT
        assert_eq!([0x00, 0x00], [bytes[6], bytes[7]]); // ANCOUNT
        assert_eq!(malformed.question[..], bytes[12..]);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("in-addr.arpa").is_ok());
        assert!(validate_name("ns1.wikimedia.org").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("double..dot").is_err());
        assert!(validate_name("under_score.com").is_err());
        assert!(validate_name(&format!("{}.com", "a".repeat(64))).is_err());
    }
}
