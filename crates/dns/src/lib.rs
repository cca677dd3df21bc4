pub mod builder;
pub mod domain_name;
pub mod edns;
pub mod helpers;
pub mod macros;
pub mod message;
pub mod reader;
pub mod record;
pub mod writer;

pub use builder::DnsMessageBuilder;
pub use domain_name::DomainName;
pub use edns::Edns;
pub use message::{DnsFlags, DnsMessage, DnsOpcode, DnsQuestion, DnsResponseCode};
pub use record::{ClassType, DnsRecord, DnsRecordData, RecordType};

pub use reader::DnsMessageReader;
pub use writer::DnsMessageWriter;
