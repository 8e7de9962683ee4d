//! The 12-byte message header (RFC 1035 §4.1.1), bit-packed the same way
//! across a query and a response. mDNS (RFC 6762 §18) reuses the field
//! layout verbatim and only restricts which combinations are legal.

use packed_struct::prelude::*;

use crate::enums::{OpCode, PacketType, Rcode};

/// Raw 12-byte wire header. `#[packed_struct(bit_numbering = "msb0")]`
/// lays bits out most-significant-bit-first within each byte, matching
/// the RFC 1035 diagram directly.
#[derive(PackedStruct, Debug, Clone, Copy, PartialEq, Eq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "12")]
pub struct Header {
    #[packed_field(bits = "0..=15", endian = "msb")]
    pub id: u16,
    #[packed_field(bits = "16")]
    pub qr: bool,
    #[packed_field(bits = "17..=20", ty = "enum")]
    pub opcode: OpCode,
    #[packed_field(bits = "21")]
    pub aa: bool,
    #[packed_field(bits = "22")]
    pub tc: bool,
    #[packed_field(bits = "23")]
    pub rd: bool,
    #[packed_field(bits = "24")]
    pub ra: bool,
    #[packed_field(bits = "25")]
    pub z: bool,
    #[packed_field(bits = "26")]
    pub ad: bool,
    #[packed_field(bits = "27")]
    pub cd: bool,
    #[packed_field(bits = "28..=31", ty = "enum")]
    pub rcode: Rcode,
    #[packed_field(bits = "32..=47", endian = "msb")]
    pub qdcount: u16,
    #[packed_field(bits = "48..=63", endian = "msb")]
    pub ancount: u16,
    #[packed_field(bits = "64..=79", endian = "msb")]
    pub nscount: u16,
    #[packed_field(bits = "80..=95", endian = "msb")]
    pub arcount: u16,
}

impl Header {
    /// A query header with the given counts, all other flags clear —
    /// mDNS queries never set AA/RA/RD/AD/CD (RFC 6762 §18.3-18.11).
    pub fn query(id: u16, qdcount: u16) -> Self {
        Header {
            id,
            qr: PacketType::Query.into(),
            opcode: OpCode::Query,
            aa: false,
            tc: false,
            rd: false,
            ra: false,
            z: false,
            ad: false,
            cd: false,
            rcode: Rcode::NoError,
            qdcount,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        }
    }

    /// A response header. mDNS responses always set AA (RFC 6762 §18.4)
    /// since a peer only ever answers for records it owns or has cached
    /// as a shared resource on its own behalf.
    pub fn response(ancount: u16, arcount: u16) -> Self {
        Header {
            id: 0,
            qr: PacketType::Response.into(),
            opcode: OpCode::Query,
            aa: true,
            tc: false,
            rd: false,
            ra: false,
            z: false,
            ad: false,
            cd: false,
            rcode: Rcode::NoError,
            qdcount: 0,
            ancount,
            nscount: 0,
            arcount,
        }
    }

    pub fn is_response(&self) -> bool {
        self.qr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_and_unpacks_query() {
        let header = Header::query(0x1234, 2);
        let bytes = header.pack().unwrap();
        assert_eq!(bytes.len(), 12);
        let unpacked = Header::unpack(&bytes).unwrap();
        assert_eq!(unpacked, header);
        assert!(!unpacked.is_response());
    }

    #[test]
    fn response_sets_authoritative_answer() {
        let header = Header::response(3, 1);
        let bytes = header.pack().unwrap();
        let unpacked = Header::unpack(&bytes).unwrap();
        assert!(unpacked.aa);
        assert!(unpacked.is_response());
        assert_eq!(unpacked.ancount, 3);
        assert_eq!(unpacked.arcount, 1);
    }
}
