use std::{
    fmt::{self, Display, Formatter},
    net::{Ipv4Addr, Ipv6Addr},
};

use anyhow::ensure;

use crate::{
    domain_name::DomainName,
    reader::{DnsMessageReader, DnsReadable},
    writer::{DnsMessageWriter, DnsWritable},
};

crate::u16_enum_with_unknown! {
    /// DNS record types.
    ///
    /// Based on: https://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-4
    pub enum RecordType {
        A = 1,
        NS = 2,
        CNAME = 5,
        SOA = 6,
        PTR = 12,
        HINFO = 13,
        MX = 15,
        TXT = 16,
        AAAA = 28,
        SRV = 33,
        NAPTR = 35,
        DNAME = 39,
        OPT = 41,
        DS = 43,
        SSHFP = 44,
        RRSIG = 46,
        NSEC = 47,
        DNSKEY = 48,
        NSEC3 = 50,
        TLSA = 52,
        SVCB = 64,
        HTTPS = 65,
        SPF = 99,
        AXFR = 252,
        ANY = 255,
        CAA = 257,
    }
}

crate::u16_enum_with_unknown! {
    /// DNS classes.
    pub enum ClassType {
        IN = 1,
        CH = 3,
        HS = 4,
        NONE = 254,
        ANY = 255,
    }
}

/// Associated data for a DNS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsRecordData {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    /// CNAME, NS, PTR and DNAME targets.
    DomainName(DomainName),
    MX {
        priority: u16,
        host: DomainName,
    },
    SOA {
        mname: DomainName,
        rname: DomainName,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: DomainName,
    },
    /// TXT character strings.
    Text(Vec<String>),
    Raw(Vec<u8>),
}

impl DnsRecordData {
    pub fn read(reader: &mut DnsMessageReader, record_type: RecordType, length: usize) -> anyhow::Result<Self> {
        let end = reader.position() + length;

        let data = match record_type {
            RecordType::A => {
                ensure!(length == 4, "invalid A record length: {}", length);
                let b = reader.read_bytes(4)?;
                Self::Ipv4(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            RecordType::AAAA => {
                ensure!(length == 16, "invalid AAAA record length: {}", length);
                let b = reader.read_bytes(16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(b);
                Self::Ipv6(Ipv6Addr::from(octets))
            }
            RecordType::CNAME | RecordType::NS | RecordType::PTR | RecordType::DNAME => {
                Self::DomainName(reader.read_qname()?)
            }
            RecordType::MX => Self::MX {
                priority: reader.read_u16()?,
                host: reader.read_qname()?,
            },
            RecordType::SOA => Self::SOA {
                mname: reader.read_qname()?,
                rname: reader.read_qname()?,
                serial: reader.read_u32()?,
                refresh: reader.read_u32()?,
                retry: reader.read_u32()?,
                expire: reader.read_u32()?,
                minimum: reader.read_u32()?,
            },
            RecordType::SRV => Self::SRV {
                priority: reader.read_u16()?,
                weight: reader.read_u16()?,
                port: reader.read_u16()?,
                target: reader.read_qname()?,
            },
            RecordType::TXT | RecordType::SPF => {
                let mut strings = Vec::new();
                while reader.position() < end {
                    let len = reader.read_u8()? as usize;
                    let text = reader.read_bytes(len)?;
                    strings.push(String::from_utf8_lossy(text).into_owned());
                }
                Self::Text(strings)
            }
            _ => Self::Raw(reader.read_bytes(length)?.to_vec()),
        };

        ensure!(
            reader.position() == end,
            "record data length mismatch for {}: expected end {}, got {}",
            record_type,
            end,
            reader.position()
        );

        Ok(data)
    }

    pub fn write(&self, writer: &mut DnsMessageWriter) -> anyhow::Result<()> {
        match self {
            Self::Ipv4(addr) => writer.write_bytes(&addr.octets()),
            Self::Ipv6(addr) => writer.write_bytes(&addr.octets()),
            Self::DomainName(name) => writer.write_qname(name),
            Self::MX { priority, host } => {
                writer.write_u16(*priority)?;
                writer.write_qname(host)
            }
            Self::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                writer.write_qname(mname)?;
                writer.write_qname(rname)?;
                writer.write_u32(*serial)?;
                writer.write_u32(*refresh)?;
                writer.write_u32(*retry)?;
                writer.write_u32(*expire)?;
                writer.write_u32(*minimum)
            }
            Self::SRV {
                priority,
                weight,
                port,
                target,
            } => {
                writer.write_u16(*priority)?;
                writer.write_u16(*weight)?;
                writer.write_u16(*port)?;
                writer.write_qname(target)
            }
            Self::Text(strings) => {
                for s in strings {
                    ensure!(s.len() <= 255, "TXT string exceeds 255 bytes");
                    writer.write_u8(s.len() as u8)?;
                    writer.write_bytes(s.as_bytes())?;
                }
                Ok(())
            }
            Self::Raw(data) => writer.write_bytes(data),
        }
    }
}

impl Display for DnsRecordData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4(addr) => write!(f, "{addr}"),
            Self::Ipv6(addr) => write!(f, "{addr}"),
            Self::DomainName(name) => write!(f, "{name}."),
            Self::MX { priority, host } => write!(f, "{priority} {host}."),
            Self::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{mname}. {rname}. {serial} {refresh} {retry} {expire} {minimum}"
            ),
            Self::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{priority} {weight} {port} {target}."),
            Self::Text(strings) => {
                let quoted: Vec<String> = strings.iter().map(|s| format!("{s:?}")).collect();
                f.write_str(&quoted.join(" "))
            }
            Self::Raw(data) => write!(f, "\\# {}", data.len()),
        }
    }
}

/// A resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub name: DomainName,
    pub record_type: RecordType,
    pub class: ClassType,
    pub ttl: u32,
    pub data: DnsRecordData,
}

impl DnsRecord {
    pub fn new(name: DomainName, record_type: RecordType, ttl: u32, data: DnsRecordData) -> Self {
        Self {
            name,
            record_type,
            class: ClassType::IN,
            ttl,
            data,
        }
    }
}

/// Renders the record the way the query API reports answers, e.g. `A (1.2.3.4)`.
impl Display for DnsRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.record_type, self.data)
    }
}

impl DnsReadable for DnsRecord {
    fn read_from(reader: &mut DnsMessageReader) -> anyhow::Result<Self> {
        let name = reader.read_qname()?;
        let record_type = RecordType::from(reader.read_u16()?);
        let class = ClassType::from(reader.read_u16()?);
        let ttl = reader.read_u32()?;
        let length = reader.read_u16()? as usize;

        let data = DnsRecordData::read(reader, record_type, length)?;

        Ok(Self {
            name,
            record_type,
            class,
            ttl,
            data,
        })
    }
}

impl DnsWritable for DnsRecord {
    fn write_to(&self, writer: &mut DnsMessageWriter) -> anyhow::Result<()> {
        writer.write_qname(&self.name)?;
        writer.write_u16(self.record_type.to_u16())?;
        writer.write_u16(self.class.to_u16())?;
        writer.write_u32(self.ttl)?;

        // rdlength is patched once the data is written.
        let rdlen_pos = writer.position();
        writer.write_u16(0)?;

        let before = writer.position();
        self.data.write(writer)?;
        let rdlen = (writer.position() - before) as u16;

        writer.overwrite_bytes(rdlen_pos, &rdlen.to_be_bytes())
    }
}
