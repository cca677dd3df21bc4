use crate::{
    reader::DnsMessageReader,
    record::RecordType,
    writer::{DnsMessageWriter, DnsWritable},
};

/// EDNS(0) information carried by the OPT pseudo record.
#[derive(Debug, Clone, PartialEq)]
pub struct Edns {
    pub udp_payload_size: u16,
    pub(crate) extended_rcode: u8,
    pub version: u8,
    z_flags: u16,
    pub options: Vec<EdnsOption>,
}

/// A single EDNS option, kept opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct EdnsOption {
    pub code: u16,
    pub data: Vec<u8>,
}

impl Default for Edns {
    fn default() -> Self {
        Self {
            udp_payload_size: 1232,
            extended_rcode: 0,
            version: 0,
            z_flags: 0,
            options: vec![],
        }
    }
}

impl Edns {
    /// Read the OPT record body. The owner name and type have already been consumed.
    pub(crate) fn read_body(reader: &mut DnsMessageReader) -> anyhow::Result<Self> {
        let udp_payload_size = reader.read_u16()?;

        // TTL packs ext_rcode | version | z_flags
        let ttl = reader.read_u32()?;

        let rdlen = reader.read_u16()? as usize;
        let end = reader.position() + rdlen;

        let mut options = Vec::new();
        while reader.position() < end {
            let code = reader.read_u16()?;
            let len = reader.read_u16()? as usize;
            options.push(EdnsOption {
                code,
                data: reader.read_bytes(len)?.to_vec(),
            });
        }
        anyhow::ensure!(reader.position() == end, "EDNS options overrun OPT record");

        Ok(Self {
            udp_payload_size,
            extended_rcode: (ttl >> 24) as u8,
            version: (ttl >> 16) as u8,
            z_flags: ttl as u16,
            options,
        })
    }
}

impl DnsWritable for Edns {
    fn write_to(&self, writer: &mut DnsMessageWriter) -> anyhow::Result<()> {
        writer.write_u8(0)?;
        writer.write_u16(RecordType::OPT.to_u16())?;
        writer.write_u16(self.udp_payload_size)?;
        writer.write_u32(((self.extended_rcode as u32) << 24) | ((self.version as u32) << 16) | self.z_flags as u32)?;

        let rdlen: usize = self.options.iter().map(|o| 4 + o.data.len()).sum();
        anyhow::ensure!(rdlen <= u16::MAX as usize, "EDNS options too large");
        writer.write_u16(rdlen as u16)?;

        for option in &self.options {
            writer.write_u16(option.code)?;
            writer.write_u16(option.data.len() as u16)?;
            writer.write_bytes(&option.data)?;
        }
        Ok(())
    }
}
