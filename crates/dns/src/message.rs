use std::fmt::{self, Display, Formatter};

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    domain_name::DomainName,
    edns::Edns,
    reader::{DnsMessageReader, DnsReadable},
    record::{ClassType, DnsRecord, RecordType},
    writer::{DnsMessageWriter, DnsWritable},
};

/// A decoded DNS message.
#[derive(Debug, Clone, PartialEq)]
pub struct DnsMessage {
    /// Transaction id
    pub id: u16,
    pub flags: DnsFlags,
    questions: Vec<DnsQuestion>,
    answers: Vec<DnsRecord>,
    authority_records: Vec<DnsRecord>,
    additional_records: Vec<DnsRecord>,
    edns: Option<Edns>,
}

impl DnsMessage {
    pub fn new(
        id: u16,
        flags: DnsFlags,
        questions: Vec<DnsQuestion>,
        answers: Vec<DnsRecord>,
        authority_records: Vec<DnsRecord>,
        additional_records: Vec<DnsRecord>,
    ) -> Self {
        Self {
            id,
            flags,
            questions,
            answers,
            authority_records,
            additional_records,
            edns: None,
        }
    }

    pub fn decode(data: &[u8]) -> anyhow::Result<Self> {
        let mut reader = DnsMessageReader::new(data);

        let id = reader.read_u16()?;
        let flags = DnsFlags::read_from(&mut reader)?;

        let qdcount = reader.read_u16()?;
        let ancount = reader.read_u16()?;
        let nscount = reader.read_u16()?;
        let arcount = reader.read_u16()?;

        let questions = (0..qdcount)
            .map(|_| DnsQuestion::read_from(&mut reader))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let answers = (0..ancount)
            .map(|_| DnsRecord::read_from(&mut reader))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let authority_records = (0..nscount)
            .map(|_| DnsRecord::read_from(&mut reader))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut additional_records = Vec::with_capacity(arcount as usize);
        let mut edns = None;

        for _ in 0..arcount {
            let start = reader.position();
            let name = reader.read_qname()?;
            let rtype = RecordType::from(reader.read_u16()?);

            if rtype == RecordType::OPT {
                anyhow::ensure!(name.is_root(), "OPT record with non-root owner name");
                anyhow::ensure!(edns.is_none(), "message contains more than one OPT record");
                edns = Some(Edns::read_body(&mut reader)?);
            } else {
                reader.seek(start)?;
                additional_records.push(DnsRecord::read_from(&mut reader)?);
            }
        }

        Ok(Self {
            id,
            flags,
            questions,
            answers,
            authority_records,
            additional_records,
            edns,
        })
    }

    pub fn encode(&self) -> anyhow::Result<Bytes> {
        let mut writer = DnsMessageWriter::new();

        let arcount = self.additional_records.len() + usize::from(self.edns.is_some());

        writer.write_u16(self.id)?;
        self.flags.write_to(&mut writer)?;
        writer.write_u16(self.questions.len() as u16)?;
        writer.write_u16(self.answers.len() as u16)?;
        writer.write_u16(self.authority_records.len() as u16)?;
        writer.write_u16(arcount as u16)?;

        for question in &self.questions {
            question.write_to(&mut writer)?;
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authority_records)
            .chain(&self.additional_records)
        {
            record.write_to(&mut writer)?;
        }
        if let Some(edns) = &self.edns {
            edns.write_to(&mut writer)?;
        }

        Ok(writer.into_bytes())
    }

    pub fn questions(&self) -> &[DnsQuestion] {
        &self.questions
    }

    pub fn answers(&self) -> &[DnsRecord] {
        &self.answers
    }

    pub fn authority_records(&self) -> &[DnsRecord] {
        &self.authority_records
    }

    pub fn additional_records(&self) -> &[DnsRecord] {
        &self.additional_records
    }

    pub fn edns(&self) -> Option<&Edns> {
        self.edns.as_ref()
    }

    pub fn set_edns(&mut self, edns: Option<Edns>) {
        self.edns = edns;
    }

    /// Drop every record section, used when a UDP answer has to be truncated.
    pub fn clear_records(&mut self) {
        self.answers.clear();
        self.authority_records.clear();
        self.additional_records.clear();
    }

    pub fn set_response_code(&mut self, response_code: DnsResponseCode) {
        let full: u16 = response_code.into();
        self.flags.rcode_low = (full & 0x0F) as u8;

        if full > 0x0F {
            let edns = self.edns.get_or_insert_with(Edns::default);
            edns.extended_rcode = (full >> 4) as u8;
        } else if let Some(edns) = self.edns.as_mut() {
            edns.extended_rcode = 0;
        }
    }

    pub fn response_code(&self) -> anyhow::Result<DnsResponseCode> {
        let low = self.flags.rcode_low as u16;
        let high = self.edns.as_ref().map(|e| e.extended_rcode).unwrap_or(0) as u16;
        Ok(DnsResponseCode::try_from((high << 4) | low)?)
    }
}

/// Header flags.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DnsFlags {
    /// Query (false) or response (true)
    pub response: bool,
    pub opcode: DnsOpcode,
    pub authorative_answer: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    /// Reserved, must be zero
    pub(crate) z: bool,
    pub authentic_data: bool,
    pub checking_disabled: bool,
    /// Lower four bits of the response code.
    pub(crate) rcode_low: u8,
}

impl DnsFlags {
    /// Flags for a query with recursion desired.
    pub fn query() -> Self {
        Self {
            recursion_desired: true,
            ..Default::default()
        }
    }

    /// Flags answering `request`: QR and RA set, RD and CD copied over.
    pub fn answering(request: &DnsFlags) -> Self {
        Self {
            response: true,
            opcode: request.opcode,
            recursion_desired: request.recursion_desired,
            recursion_available: true,
            checking_disabled: request.checking_disabled,
            ..Default::default()
        }
    }
}

impl DnsReadable for DnsFlags {
    fn read_from(reader: &mut DnsMessageReader) -> anyhow::Result<Self> {
        let bits = reader.read_u16()?;
        Ok(Self {
            response: (bits >> 15) & 0x1 != 0,
            opcode: DnsOpcode::try_from(((bits >> 11) & 0xF) as u8)?,
            authorative_answer: (bits >> 10) & 0x1 != 0,
            truncated: (bits >> 9) & 0x1 != 0,
            recursion_desired: (bits >> 8) & 0x1 != 0,
            recursion_available: (bits >> 7) & 0x1 != 0,
            z: (bits >> 6) & 0x1 != 0,
            authentic_data: (bits >> 5) & 0x1 != 0,
            checking_disabled: (bits >> 4) & 0x1 != 0,
            rcode_low: (bits & 0x0F) as u8,
        })
    }
}

impl DnsWritable for DnsFlags {
    fn write_to(&self, writer: &mut DnsMessageWriter) -> anyhow::Result<()> {
        let opcode: u8 = self.opcode.into();
        writer.write_u16(
            ((self.response as u16) << 15)
                | ((opcode as u16) << 11)
                | ((self.authorative_answer as u16) << 10)
                | ((self.truncated as u16) << 9)
                | ((self.recursion_desired as u16) << 8)
                | ((self.recursion_available as u16) << 7)
                | ((self.z as u16) << 6)
                | ((self.authentic_data as u16) << 5)
                | ((self.checking_disabled as u16) << 4)
                | (self.rcode_low & 0x0F) as u16,
        )
    }
}

/// Dns response code
///
/// Based on: https://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-6
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum DnsResponseCode {
    #[default]
    NoError = 0,
    FormatError = 1,
    ServerFailure = 2,
    NxDomain = 3,
    NotImp = 4,
    Refused = 5,
    YXDomain = 6,
    YXRRSet = 7,
    NXRRSet = 8,
    NotAuth = 9,
    NotZone = 10,
    BadVers = 16,
}

impl DnsResponseCode {
    /// Mnemonic as used by zone files and dig.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::NoError => "NOERROR",
            Self::FormatError => "FORMERR",
            Self::ServerFailure => "SERVFAIL",
            Self::NxDomain => "NXDOMAIN",
            Self::NotImp => "NOTIMP",
            Self::Refused => "REFUSED",
            Self::YXDomain => "YXDOMAIN",
            Self::YXRRSet => "YXRRSET",
            Self::NXRRSet => "NXRRSET",
            Self::NotAuth => "NOTAUTH",
            Self::NotZone => "NOTZONE",
            Self::BadVers => "BADVERS",
        }
    }
}

impl Display for DnsResponseCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DnsOpcode {
    #[default]
    Query = 0,
    /// Inverse query, obsolete
    IQuery = 1,
    Status = 2,
    Notify = 4,
    Update = 5,
}

/// A question in a DNS message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnsQuestion {
    pub qname: DomainName,
    pub qtype: RecordType,
    pub qclass: ClassType,
}

impl DnsQuestion {
    pub fn new(qname: DomainName, qtype: RecordType, qclass: ClassType) -> Self {
        Self { qname, qtype, qclass }
    }
}

impl DnsReadable for DnsQuestion {
    fn read_from(reader: &mut DnsMessageReader) -> anyhow::Result<Self> {
        Ok(Self {
            qname: reader.read_qname()?,
            qtype: RecordType::from(reader.read_u16()?),
            qclass: ClassType::from(reader.read_u16()?),
        })
    }
}

impl DnsWritable for DnsQuestion {
    fn write_to(&self, writer: &mut DnsMessageWriter) -> anyhow::Result<()> {
        writer.write_qname(&self.qname)?;
        writer.write_u16(self.qtype.to_u16())?;
        writer.write_u16(self.qclass.to_u16())
    }
}
