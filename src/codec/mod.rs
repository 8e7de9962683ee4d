//! Wire format: header, question, resource record, and the full packet
//! they assemble into.

pub mod header;
pub mod name;
pub mod packet;
pub mod question;
pub mod record;

pub use header::Header;
pub use name::DomainName;
pub use packet::Packet;
pub use question::Question;
pub use record::{RData, ResourceRecord};
