//! Turns an incoming query into the answer/additional records this node
//! should send back, RFC 6762 §6 + RFC 6763 §12. Pure function over the
//! local record store and the inbound packet — no I/O, so `socket.rs`
//! and `node.rs` are the only places that actually send anything.

use std::time::Instant;

use crate::codec::{DomainName, Packet, RData, ResourceRecord};
use crate::enums::RecordType;
use crate::local_store::LocalStore;

/// What to send in reply to one inbound query, or `None` if nothing in
/// `store` answers any of its questions.
pub struct Reply {
    pub answers: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

/// Builds the reply to `query` from `store`'s authoritative records.
///
/// Algorithm (RFC 6763 §12):
/// 1. For each question, collect every stored record whose name/type
///    matches (RecordType::ANY in the question expands to every stored
///    type at that name).
/// 2. For every SRV answer, pull in its target's address records and the
///    instance's TXT record as additionals; for every PTR answer, pull
///    in the SRV/TXT/address chain the same way; for every A/AAAA
///    answer, pull in the complementary address family at the same name.
/// 3. Deduplicate: nothing appears in both answers and additionals, and
///    nothing appears twice in either.
pub fn build_reply(store: &mut LocalStore, query: &Packet, now: Instant) -> Option<Reply> {
    let records = store.records().to_vec();

    let mut answers: Vec<ResourceRecord> = Vec::new();
    for question in &query.questions {
        for record in &records {
            let name_matches = record.name == question.qname;
            let type_matches =
                question.qtype == RecordType::ANY || record.record_type() == question.qtype;
            if name_matches && type_matches && !answers.contains(record) {
                answers.push(record.clone());
            }
        }
    }

    if answers.is_empty() {
        return None;
    }

    let mut additionals = Vec::new();
    for answer in &answers {
        collect_additionals(&records, answer, &mut additionals, &answers);
    }

    let _ = now;
    Some(Reply {
        answers,
        additionals,
    })
}

fn collect_additionals(
    records: &[ResourceRecord],
    answer: &ResourceRecord,
    additionals: &mut Vec<ResourceRecord>,
    answers: &[ResourceRecord],
) {
    let mut push_related = |name: &DomainName, rtype: RecordType| {
        for record in records {
            if record.name == *name
                && record.record_type() == rtype
                && !answers.contains(record)
                && !additionals.contains(record)
            {
                additionals.push(record.clone());
            }
        }
    };

    match &answer.rdata {
        RData::Ptr(target) => {
            push_related(target, RecordType::SRV);
            push_related(target, RecordType::TXT);
            for record in records {
                if record.name == *target && record.record_type() == RecordType::SRV {
                    if let RData::Srv { target: host, .. } = &record.rdata {
                        push_related(host, RecordType::A);
                        push_related(host, RecordType::AAAA);
                    }
                }
            }
        }
        RData::Srv { target, .. } => {
            push_related(target, RecordType::A);
            push_related(target, RecordType::AAAA);
        }
        RData::A(_) => push_related(&answer.name, RecordType::AAAA),
        RData::Aaaa(_) => push_related(&answer.name, RecordType::A),
        _ => {}
    }
}
