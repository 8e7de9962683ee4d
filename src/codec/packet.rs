//! Full message: header, question section, and the three resource record
//! sections. Grounded on the teacher's `Reply::as_bytes` (pack header,
//! concatenate section bytes) generalized to also parse.

use packed_struct::PackedStruct;

use crate::codec::header::Header;
use crate::codec::question::Question;
use crate::codec::record::ResourceRecord;
use crate::enums::{OpCode, PacketType};
use crate::error::{MdnsError, ParseErrorKind};

const HEADER_LEN: usize = 12;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Packet {
    pub id: u16,
    pub packet_type: PacketType,
    pub truncated: bool,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Packet {
    pub fn query(id: u16, questions: Vec<Question>) -> Self {
        Packet {
            id,
            packet_type: PacketType::Query,
            truncated: false,
            questions,
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    pub fn response(answers: Vec<ResourceRecord>, additionals: Vec<ResourceRecord>) -> Self {
        Packet {
            id: 0,
            packet_type: PacketType::Response,
            truncated: false,
            questions: Vec::new(),
            answers,
            authorities: Vec::new(),
            additionals,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(self.packet_type, PacketType::Response)
    }

    pub fn parse(buf: &[u8]) -> Result<Packet, MdnsError> {
        if buf.len() < HEADER_LEN {
            return Err(MdnsError::Parse(ParseErrorKind::Truncated));
        }
        let header_bytes: [u8; HEADER_LEN] = buf[..HEADER_LEN].try_into().unwrap();
        let header = Header::unpack(&header_bytes)
            .map_err(|_| MdnsError::Parse(ParseErrorKind::Truncated))?;

        if header.opcode != OpCode::Query {
            return Err(MdnsError::Parse(ParseErrorKind::BadRdata));
        }

        let mut offset = HEADER_LEN;
        let mut questions = Vec::with_capacity(header.qdcount as usize);
        for _ in 0..header.qdcount {
            let (question, consumed) = Question::parse(buf, offset)?;
            offset += consumed;
            questions.push(question);
        }

        let mut parse_records = |count: u16, offset: &mut usize| -> Result<Vec<ResourceRecord>, MdnsError> {
            let mut records = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (record, consumed) = ResourceRecord::parse(buf, *offset)?;
                *offset += consumed;
                records.push(record);
            }
            Ok(records)
        };

        let answers = parse_records(header.ancount, &mut offset)?;
        let authorities = parse_records(header.nscount, &mut offset)?;
        let additionals = parse_records(header.arcount, &mut offset)?;

        Ok(Packet {
            id: header.id,
            packet_type: PacketType::from(header.is_response()),
            truncated: header.tc,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MdnsError> {
        let mut header = if self.is_response() {
            Header::response(self.answers.len() as u16, self.additionals.len() as u16)
        } else {
            Header::query(self.id, self.questions.len() as u16)
        };
        header.tc = self.truncated;
        header.nscount = self.authorities.len() as u16;

        let mut out = header.pack().map_err(|_| {
            MdnsError::Generate(crate::error::GenerateErrorKind::LabelTooLong)
        })?.to_vec();

        for question in &self.questions {
            out.extend_from_slice(&question.to_bytes()?);
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            out.extend_from_slice(&record.to_bytes()?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::name::DomainName;
    use crate::codec::record::RData;
    use crate::enums::RecordType;
    use std::net::Ipv4Addr;

    #[test]
    fn query_round_trip() {
        let packet = Packet::query(
            0,
            vec![Question::new(
                DomainName::new("_http._tcp.local"),
                RecordType::PTR,
            )],
        );
        let bytes = packet.to_bytes().unwrap();
        let parsed = Packet::parse(&bytes).unwrap();
        assert_eq!(parsed, packet);
        assert!(!parsed.is_response());
    }

    #[test]
    fn response_round_trip_with_additionals() {
        let answer = crate::codec::record::ResourceRecord::new(
            DomainName::new("host.local"),
            120,
            true,
            RData::A(Ipv4Addr::new(10, 0, 0, 1)),
        );
        let packet = Packet::response(vec![answer.clone()], vec![answer]);
        let bytes = packet.to_bytes().unwrap();
        let parsed = Packet::parse(&bytes).unwrap();
        assert!(parsed.is_response());
        assert_eq!(parsed.answers.len(), 1);
        assert_eq!(parsed.additionals.len(), 1);
    }

    #[test]
    fn truncated_packet_rejected() {
        let bytes = vec![0u8; 5];
        assert!(Packet::parse(&bytes).is_err());
    }
}
