//! Resource records: the answer/authority/additional section entry, and
//! per-type RDATA. Grounded on the teacher's tagged-enum approach to
//! `InternalResourceRecord`, generalized from a DNS zone server's record
//! set down to the handful of types mDNS/DNS-SD actually exchange.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::codec::name::DomainName;
use crate::enums::RecordType;
use crate::error::{GenerateErrorKind, MdnsError, ParseErrorKind};

/// The cache-flush bit, RFC 6762 §10.2: the top bit of the RR's CLASS
/// field. OPT records repurpose the class field entirely as a UDP
/// payload size and never carry this bit.
const FLUSH_BIT: u16 = 0x8000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(DomainName),
    Ptr(DomainName),
    /// Key/value pairs in on-wire order, already deduplicated so the
    /// first occurrence of a key wins (SPEC_FULL.md §C.2).
    Txt(Vec<(String, Option<String>)>),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: DomainName,
    },
    /// Parsed for passthrough only — never cached, never generated
    /// (SPEC_FULL.md §B).
    Opt {
        udp_payload_size: u16,
        extended_rcode: u8,
        version: u8,
        flags: u16,
    },
    Nsec {
        next_domain: DomainName,
        type_bitmap: Vec<u8>,
    },
}

impl RData {
    pub fn record_type(&self) -> RecordType {
        match self {
            RData::A(_) => RecordType::A,
            RData::Aaaa(_) => RecordType::AAAA,
            RData::Cname(_) => RecordType::CNAME,
            RData::Ptr(_) => RecordType::PTR,
            RData::Txt(_) => RecordType::TXT,
            RData::Srv { .. } => RecordType::SRV,
            RData::Opt { .. } => RecordType::OPT,
            RData::Nsec { .. } => RecordType::NSEC,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: DomainName,
    pub ttl: u32,
    /// RFC 6762 §10.2 cache-flush bit; never set on an OPT record.
    pub cache_flush: bool,
    pub rdata: RData,
}

impl ResourceRecord {
    pub fn new(name: DomainName, ttl: u32, cache_flush: bool, rdata: RData) -> Self {
        ResourceRecord {
            name,
            ttl,
            cache_flush,
            rdata,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.rdata.record_type()
    }

    /// Whether this NSEC record asserts that `rtype` exists at its owner
    /// name — i.e. `rtype`'s bit is set in the type bitmap (RFC 4034
    /// §4.1). Only meaningful when `self.rdata` is `Nsec`.
    pub fn covers(&self, rtype: RecordType) -> bool {
        let RData::Nsec { type_bitmap, .. } = &self.rdata else {
            return false;
        };
        let wire = u16::from(rtype);
        let window = (wire / 256) as u8;
        let bit = wire % 256;
        let mut pos = 0usize;
        while pos + 2 <= type_bitmap.len() {
            let block = type_bitmap[pos];
            let len = type_bitmap[pos + 1] as usize;
            let bitmap_start = pos + 2;
            let bitmap_end = bitmap_start + len;
            if block == window && bitmap_end <= type_bitmap.len() {
                let byte_idx = (bit / 8) as usize;
                let bit_idx = 7 - (bit % 8);
                if byte_idx < len {
                    return type_bitmap[bitmap_start + byte_idx] & (1 << bit_idx) != 0;
                }
                return false;
            }
            pos = bitmap_end;
        }
        false
    }

    pub fn parse(buf: &[u8], offset: usize) -> Result<(ResourceRecord, usize), MdnsError> {
        let (name, name_len) = DomainName::parse(buf, offset)?;
        let mut cursor = Cursor::new(buf);
        cursor.set_position((offset + name_len) as u64);

        let raw_type = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| MdnsError::Parse(ParseErrorKind::Truncated))?;
        let raw_class = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| MdnsError::Parse(ParseErrorKind::Truncated))?;
        let ttl = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| MdnsError::Parse(ParseErrorKind::Truncated))?;
        let rdlength = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| MdnsError::Parse(ParseErrorKind::Truncated))?;

        let rdata_start = cursor.position() as usize;
        let rdata_end = rdata_start + rdlength as usize;
        let rdata_bytes = buf
            .get(rdata_start..rdata_end)
            .ok_or(MdnsError::Parse(ParseErrorKind::Truncated))?;

        let record_type = RecordType::from(raw_type);
        let cache_flush = raw_class & FLUSH_BIT != 0;

        let rdata = match record_type {
            RecordType::A => {
                if rdata_bytes.len() != 4 {
                    return Err(MdnsError::Parse(ParseErrorKind::BadRdata));
                }
                RData::A(Ipv4Addr::new(
                    rdata_bytes[0],
                    rdata_bytes[1],
                    rdata_bytes[2],
                    rdata_bytes[3],
                ))
            }
            RecordType::AAAA => {
                let octets: [u8; 16] = rdata_bytes
                    .try_into()
                    .map_err(|_| MdnsError::Parse(ParseErrorKind::BadRdata))?;
                RData::Aaaa(Ipv6Addr::from(octets))
            }
            RecordType::CNAME => {
                let (target, _) = DomainName::parse(buf, rdata_start)?;
                RData::Cname(target)
            }
            RecordType::PTR => {
                let (target, _) = DomainName::parse(buf, rdata_start)?;
                RData::Ptr(target)
            }
            RecordType::TXT => RData::Txt(parse_txt(rdata_bytes)?),
            RecordType::SRV => {
                if rdata_bytes.len() < 6 {
                    return Err(MdnsError::Parse(ParseErrorKind::BadRdata));
                }
                let mut srv_cursor = Cursor::new(rdata_bytes);
                let priority = srv_cursor.read_u16::<BigEndian>().unwrap();
                let weight = srv_cursor.read_u16::<BigEndian>().unwrap();
                let port = srv_cursor.read_u16::<BigEndian>().unwrap();
                let (target, _) = DomainName::parse(buf, rdata_start + 6)?;
                RData::Srv {
                    priority,
                    weight,
                    port,
                    target,
                }
            }
            RecordType::OPT => {
                let mut opt_cursor = Cursor::new(rdata_bytes);
                // Consume and discard any options; this crate never acts
                // on EDNS0 option content.
                while opt_cursor.position() < rdata_bytes.len() as u64 {
                    if opt_cursor.read_u16::<BigEndian>().is_err() {
                        break;
                    }
                    let Ok(opt_len) = opt_cursor.read_u16::<BigEndian>() else {
                        break;
                    };
                    let new_pos = opt_cursor.position() + opt_len as u64;
                    if new_pos > rdata_bytes.len() as u64 {
                        break;
                    }
                    opt_cursor.set_position(new_pos);
                }
                RData::Opt {
                    udp_payload_size: raw_class,
                    extended_rcode: ((ttl >> 24) & 0xff) as u8,
                    version: ((ttl >> 16) & 0xff) as u8,
                    flags: (ttl & 0xffff) as u16,
                }
            }
            RecordType::NSEC => {
                let (next_domain, consumed) = DomainName::parse(buf, rdata_start)?;
                let bitmap_start = rdata_start + consumed;
                let type_bitmap = buf
                    .get(bitmap_start..rdata_end)
                    .ok_or(MdnsError::Parse(ParseErrorKind::Truncated))?
                    .to_vec();
                RData::Nsec {
                    next_domain,
                    type_bitmap,
                }
            }
            RecordType::ANY | RecordType::NS | RecordType::InvalidType => {
                return Err(MdnsError::Parse(ParseErrorKind::BadRdata));
            }
        };

        Ok((
            ResourceRecord {
                name,
                ttl,
                cache_flush,
                rdata,
            },
            rdata_end - offset,
        ))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MdnsError> {
        let mut out = self.name.to_bytes()?;
        let mut rdata = Vec::new();
        let raw_type: u16 = self.record_type().into();

        let raw_class = match &self.rdata {
            RData::Opt {
                udp_payload_size, ..
            } => *udp_payload_size,
            _ => {
                1u16 | if self.cache_flush { FLUSH_BIT } else { 0 }
            }
        };

        let ttl = match &self.rdata {
            RData::Opt {
                extended_rcode,
                version,
                flags,
                ..
            } => ((*extended_rcode as u32) << 24) | ((*version as u32) << 16) | (*flags as u32),
            _ => self.ttl,
        };

        match &self.rdata {
            RData::A(addr) => rdata.extend_from_slice(&addr.octets()),
            RData::Aaaa(addr) => rdata.extend_from_slice(&addr.octets()),
            RData::Cname(name) => rdata.extend_from_slice(&name.to_bytes()?),
            RData::Ptr(name) => rdata.extend_from_slice(&name.to_bytes()?),
            RData::Txt(pairs) => rdata.extend_from_slice(&encode_txt(pairs)?),
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                rdata.write_u16::<BigEndian>(*priority).unwrap();
                rdata.write_u16::<BigEndian>(*weight).unwrap();
                rdata.write_u16::<BigEndian>(*port).unwrap();
                rdata.extend_from_slice(&target.to_bytes()?);
            }
            RData::Opt { .. } => {
                // No options emitted; this crate never generates EDNS0.
            }
            RData::Nsec {
                next_domain,
                type_bitmap,
            } => {
                rdata.extend_from_slice(&next_domain.to_bytes()?);
                rdata.extend_from_slice(type_bitmap);
            }
        }

        if rdata.len() > u16::MAX as usize {
            return Err(MdnsError::Generate(GenerateErrorKind::LabelTooLong));
        }

        let mut header = Vec::new();
        header.write_u16::<BigEndian>(raw_type).unwrap();
        header.write_u16::<BigEndian>(raw_class).unwrap();
        header.write_u32::<BigEndian>(ttl).unwrap();
        header.write_u16::<BigEndian>(rdata.len() as u16).unwrap();

        out.extend_from_slice(&header);
        out.extend_from_slice(&rdata);
        Ok(out)
    }
}

fn parse_txt(bytes: &[u8]) -> Result<Vec<(String, Option<String>)>, MdnsError> {
    let mut pairs = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let len = bytes[pos] as usize;
        pos += 1;
        let entry = bytes
            .get(pos..pos + len)
            .ok_or(MdnsError::Parse(ParseErrorKind::Truncated))?;
        pos += len;
        if entry.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(entry);
        let (key, value) = match text.split_once('=') {
            Some((k, v)) => (k.to_string(), Some(v.to_string())),
            None => (text.to_string(), None),
        };
        // First occurrence of a key wins (SPEC_FULL.md §C.2).
        if seen.insert(key.clone()) {
            pairs.push((key, value));
        }
    }
    Ok(pairs)
}

fn encode_txt(pairs: &[(String, Option<String>)]) -> Result<Vec<u8>, MdnsError> {
    if pairs.is_empty() {
        // A TXT record with no pairs is still required to carry one zero
        // byte (RFC 6763 §6.1).
        return Ok(vec![0]);
    }
    let mut out = Vec::new();
    for (key, value) in pairs {
        if key.is_empty() || key.contains('=') {
            return Err(MdnsError::Generate(GenerateErrorKind::TxtKeyInvalid));
        }
        let entry = match value {
            Some(v) => format!("{key}={v}"),
            None => key.clone(),
        };
        if entry.len() > 255 {
            return Err(MdnsError::Generate(GenerateErrorKind::TxtKeyInvalid));
        }
        out.push(entry.len() as u8);
        out.extend_from_slice(entry.as_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_record_round_trip() {
        let rr = ResourceRecord::new(
            DomainName::new("host.local"),
            120,
            true,
            RData::A(Ipv4Addr::new(192, 168, 1, 5)),
        );
        let bytes = rr.to_bytes().unwrap();
        let (parsed, consumed) = ResourceRecord::parse(&bytes, 0).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, rr);
    }

    #[test]
    fn srv_record_round_trip() {
        let rr = ResourceRecord::new(
            DomainName::new("_http._tcp.local"),
            120,
            true,
            RData::Srv {
                priority: 0,
                weight: 0,
                port: 8080,
                target: DomainName::new("host.local"),
            },
        );
        let bytes = rr.to_bytes().unwrap();
        let (parsed, _) = ResourceRecord::parse(&bytes, 0).unwrap();
        assert_eq!(parsed, rr);
    }

    #[test]
    fn txt_first_wins_on_duplicate_keys() {
        let mut bytes = Vec::new();
        for entry in ["a=1", "a=2", "b"] {
            bytes.push(entry.len() as u8);
            bytes.extend_from_slice(entry.as_bytes());
        }
        let pairs = parse_txt(&bytes).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), Some("1".to_string())),
                ("b".to_string(), None),
            ]
        );
    }

    #[test]
    fn empty_txt_encodes_single_zero_byte() {
        assert_eq!(encode_txt(&[]).unwrap(), vec![0]);
    }

    #[test]
    fn nsec_covers_reports_present_types() {
        // Window 0, length 1 byte, bit for A (1) set, bit for TXT (16,
        // window 0 bit 16) not representable in a 1-byte bitmap so it's
        // implicitly absent.
        let rr = ResourceRecord::new(
            DomainName::new("host.local"),
            120,
            true,
            RData::Nsec {
                next_domain: DomainName::new("host.local"),
                type_bitmap: vec![0, 1, 0b0100_0000], // window 0, len 1, bit 1 (A) set
            },
        );
        assert!(rr.covers(RecordType::A));
        assert!(!rr.covers(RecordType::TXT));
    }
}
