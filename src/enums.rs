//! Small wire-adjacent enumerations shared by the codec and the engine.

use enum_iterator::Sequence;
use packed_struct::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Which internal task a lifecycle transition is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Agent {
    Cache,
    LocalStore,
    Socket,
    QueryEngine,
    Advertiser,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentState {
    Started { agent: Agent },
    Stopped { agent: Agent },
}

/// A four bit field specifying the kind of query. mDNS only ever uses
/// `QUERY`; the others are parsed for completeness and rejected.
#[derive(Debug, Eq, PartialEq, PrimitiveEnum_u8, Copy, Clone)]
pub enum OpCode {
    Query = 0,
    Status = 2,
    Reserved = 15,
}

impl From<u8> for OpCode {
    fn from(input: u8) -> Self {
        match input {
            0 => Self::Query,
            2 => Self::Status,
            _ => Self::Reserved,
        }
    }
}

/// Response code. mDNS responses always carry `NoError`; the others are
/// parse-supported so that unicast-capable peers' unusual replies don't
/// trip `BAD_RDATA`.
#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum Rcode {
    #[default]
    NoError = 0,
    FormatError = 1,
    ServFail = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,
}

impl From<u8> for Rcode {
    fn from(input: u8) -> Self {
        match input {
            0 => Self::NoError,
            1 => Self::FormatError,
            2 => Self::ServFail,
            3 => Self::NameError,
            4 => Self::NotImplemented,
            5 => Self::Refused,
            _ => Self::ServFail,
        }
    }
}

/// QR bit: is this message a query or a response.
#[derive(Debug, PrimitiveEnum_u8, Clone, Copy, Eq, PartialEq, Default)]
pub enum PacketType {
    #[default]
    Query = 0,
    Response = 1,
}

impl From<bool> for PacketType {
    fn from(input: bool) -> Self {
        match input {
            false => Self::Query,
            true => Self::Response,
        }
    }
}

impl From<PacketType> for bool {
    fn from(input: PacketType) -> bool {
        matches!(input, PacketType::Response)
    }
}

/// RR/QTYPE values this node knows how to parse, generate, or ask about.
/// Values match their RFC-assigned wire numbers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Sequence)]
pub enum RecordType {
    A = 1,
    NS = 2,
    CNAME = 5,
    PTR = 12,
    TXT = 16,
    AAAA = 28,
    SRV = 33,
    OPT = 41,
    NSEC = 47,
    /// QTYPE=255, "ANY" — never a stored record type, only a question
    /// wildcard.
    ANY = 255,
    InvalidType,
}

impl From<u16> for RecordType {
    fn from(input: u16) -> Self {
        match input {
            1 => Self::A,
            2 => Self::NS,
            5 => Self::CNAME,
            12 => Self::PTR,
            16 => Self::TXT,
            28 => Self::AAAA,
            33 => Self::SRV,
            41 => Self::OPT,
            47 => Self::NSEC,
            255 => Self::ANY,
            _ => Self::InvalidType,
        }
    }
}

impl From<RecordType> for u16 {
    fn from(input: RecordType) -> u16 {
        match input {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::PTR => 12,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
            RecordType::OPT => 41,
            RecordType::NSEC => 47,
            RecordType::ANY => 255,
            RecordType::InvalidType => 0,
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordType::A => "A",
            RecordType::NS => "NS",
            RecordType::CNAME => "CNAME",
            RecordType::PTR => "PTR",
            RecordType::TXT => "TXT",
            RecordType::AAAA => "AAAA",
            RecordType::SRV => "SRV",
            RecordType::OPT => "OPT",
            RecordType::NSEC => "NSEC",
            RecordType::ANY => "ANY",
            RecordType::InvalidType => "INVALID",
        };
        f.write_str(name)
    }
}

/// CLASS / QCLASS, with the top bit already stripped off by the caller
/// (flush bit for RR class, QU bit for question class — see
/// `codec::record`/`codec::question`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RClass {
    #[default]
    Internet,
    /// QCLASS=255, "ANY" — only valid in a question.
    Any,
    Chaos,
    InvalidClass,
}

impl From<u16> for RClass {
    fn from(input: u16) -> Self {
        match input {
            1 => Self::Internet,
            3 => Self::Chaos,
            255 => Self::Any,
            _ => Self::InvalidClass,
        }
    }
}

impl From<RClass> for u16 {
    fn from(input: RClass) -> u16 {
        match input {
            RClass::Internet => 1,
            RClass::Chaos => 3,
            RClass::Any => 255,
            RClass::InvalidClass => 0,
        }
    }
}

impl Display for RClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RClass::Internet => "IN",
            RClass::Chaos => "CH",
            RClass::Any => "ANY",
            RClass::InvalidClass => "INVALID",
        };
        f.write_str(name)
    }
}

/// Transport protocol a service is advertised over; appears in the service
/// type label, e.g. `_http._tcp.local`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        })
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(format!("unknown protocol {other:?}, expected tcp or udp")),
        }
    }
}
