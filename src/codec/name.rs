//! Domain name encode/decode with RFC 1035 §4.1.4 compression pointers.
//!
//! Parsing tracks `{data, bytes_consumed}` separately from the pointer
//! chase so that following a pointer never inflates the count of bytes the
//! caller should advance past in the enclosing record. Pointer chains must
//! be acyclic: this is enforced by requiring every pointer target to be
//! strictly less than the offset it was read from, which guarantees
//! termination without an allocation per packet.

use crate::error::{MdnsError, ParseErrorKind};

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;
/// Top two bits set marks a compression pointer (RFC 1035 §4.1.4).
const POINTER_TAG: u8 = 0xC0;

/// A dot-separated domain name. UTF-8 is preserved through encode/decode;
/// labels are treated as opaque byte strings on the wire but this crate
/// only ever produces/accepts valid UTF-8 ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct DomainName {
    pub name: String,
}

impl DomainName {
    pub fn new(name: impl Into<String>) -> Self {
        DomainName { name: name.into() }
    }

    /// Normalizes the mDNS meta-service PTR name, which implementations
    /// inconsistently emit with or without a trailing dot (spec Open
    /// Question #1): strip exactly one trailing `.`.
    pub fn normalized(&self) -> DomainName {
        DomainName::new(self.name.strip_suffix('.').unwrap_or(&self.name))
    }

    pub fn labels(&self) -> Vec<&str> {
        if self.name.is_empty() {
            Vec::new()
        } else {
            self.name.split('.').collect()
        }
    }

    /// Parses a name starting at `offset` in `buf`. Returns the name and
    /// the number of bytes consumed from `offset` in the *enclosing*
    /// record — i.e. not counting any bytes read by following a pointer.
    pub fn parse(buf: &[u8], offset: usize) -> Result<(DomainName, usize), MdnsError> {
        let mut labels: Vec<String> = Vec::new();
        let mut cursor = offset;
        // Bytes consumed in the caller's frame; frozen the first time we
        // follow a pointer.
        let mut consumed: Option<usize> = None;
        let mut total_len = 0usize;
        // A pointer must strictly decrease, so the number of hops is
        // bounded by the packet size; this loop always terminates.
        loop {
            let len_byte = *buf
                .get(cursor)
                .ok_or(MdnsError::Parse(ParseErrorKind::Truncated))?;

            if len_byte == 0 {
                cursor += 1;
                if consumed.is_none() {
                    consumed = Some(cursor - offset);
                }
                break;
            }

            if len_byte & POINTER_TAG == POINTER_TAG {
                let second = *buf
                    .get(cursor + 1)
                    .ok_or(MdnsError::Parse(ParseErrorKind::Truncated))?;
                let pointer = (((len_byte & !POINTER_TAG) as usize) << 8) | second as usize;
                if consumed.is_none() {
                    consumed = Some(cursor + 2 - offset);
                }
                if pointer >= cursor {
                    // Not a strict decrease: would not guarantee
                    // termination, so reject as a cycle outright.
                    return Err(MdnsError::Parse(ParseErrorKind::PointerCycle));
                }
                cursor = pointer;
                continue;
            }

            if len_byte as usize > MAX_LABEL_LEN {
                return Err(MdnsError::Parse(ParseErrorKind::LabelTooLong));
            }

            let label_start = cursor + 1;
            let label_end = label_start + len_byte as usize;
            let label_bytes = buf
                .get(label_start..label_end)
                .ok_or(MdnsError::Parse(ParseErrorKind::Truncated))?;
            let label = std::str::from_utf8(label_bytes)
                .map_err(|_| MdnsError::Parse(ParseErrorKind::BadRdata))?;
            labels.push(label.to_string());
            total_len += label.len() + 1;
            if total_len > MAX_NAME_LEN {
                return Err(MdnsError::Parse(ParseErrorKind::LabelTooLong));
            }
            cursor = label_end;
        }

        Ok((
            DomainName::new(labels.join(".")),
            consumed.unwrap_or(cursor - offset),
        ))
    }

    /// Encodes as plain length-prefixed labels terminated by a zero byte.
    /// Compression on generation is optional per spec; this always emits
    /// uncompressed names, which is a compliant minimal generator.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MdnsError> {
        let mut out = Vec::new();
        if self.name.is_empty() {
            out.push(0);
            return Ok(out);
        }
        let mut total_len = 0usize;
        for label in self.name.split('.') {
            let bytes = label.as_bytes();
            if bytes.len() > MAX_LABEL_LEN {
                return Err(MdnsError::Generate(
                    crate::error::GenerateErrorKind::LabelTooLong,
                ));
            }
            total_len += bytes.len() + 1;
            if total_len > MAX_NAME_LEN {
                return Err(MdnsError::Generate(
                    crate::error::GenerateErrorKind::LabelTooLong,
                ));
            }
            out.push(bytes.len() as u8);
            out.extend_from_slice(bytes);
        }
        out.push(0);
        Ok(out)
    }
}

impl From<&str> for DomainName {
    fn from(input: &str) -> Self {
        DomainName::new(input)
    }
}

impl From<String> for DomainName {
    fn from(input: String) -> Self {
        DomainName { name: input }
    }
}

impl std::fmt::Display for DomainName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
