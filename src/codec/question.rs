//! A single entry in the question section. mDNS overloads the top bit of
//! QCLASS as the "QU" (unicast-response-requested) bit (RFC 6762 §5.4),
//! the same way a resource record overloads its class top bit as the
//! cache-flush bit.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::codec::name::DomainName;
use crate::enums::RecordType;
use crate::error::{MdnsError, ParseErrorKind};

const QU_BIT: u16 = 0x8000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    pub qname: DomainName,
    pub qtype: RecordType,
    pub qclass: u16,
    /// Set when the querier asked for a unicast reply. This crate only
    /// multicasts its answers but tracks the bit for observability
    /// (SPEC_FULL.md §B).
    pub unicast_response: bool,
}

impl Question {
    pub fn new(qname: DomainName, qtype: RecordType) -> Self {
        Question {
            qname,
            qtype,
            qclass: 1, // IN
            unicast_response: false,
        }
    }

    pub fn parse(buf: &[u8], offset: usize) -> Result<(Question, usize), MdnsError> {
        let (qname, name_len) = DomainName::parse(buf, offset)?;
        let mut cursor = Cursor::new(buf);
        cursor.set_position((offset + name_len) as u64);
        let qtype = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| MdnsError::Parse(ParseErrorKind::Truncated))?;
        let raw_class = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| MdnsError::Parse(ParseErrorKind::Truncated))?;

        Ok((
            Question {
                qname,
                qtype: RecordType::from(qtype),
                qclass: raw_class & !QU_BIT,
                unicast_response: raw_class & QU_BIT != 0,
            },
            name_len + 4,
        ))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MdnsError> {
        let mut out = self.qname.to_bytes()?;
        let mut writer = Vec::new();
        writer.write_u16::<BigEndian>(self.qtype.into()).unwrap();
        let raw_class = self.qclass | if self.unicast_response { QU_BIT } else { 0 };
        writer.write_u16::<BigEndian>(raw_class).unwrap();
        out.extend_from_slice(&writer);
        Ok(out)
    }
}
