use anyhow::{bail, ensure};

use crate::domain_name::DomainName;

/// Maximum number of compression pointers followed while reading one name.
const MAX_POINTER_HOPS: usize = 64;

/// A cursor over a wire-format DNS message.
pub struct DnsMessageReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> DnsMessageReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Move the cursor to an absolute position.
    pub fn seek(&mut self, pos: usize) -> anyhow::Result<()> {
        ensure!(
            pos <= self.buffer.len(),
            "seek out of bounds: pos={} len={}",
            pos,
            self.buffer.len()
        );
        self.position = pos;
        Ok(())
    }

    #[inline]
    fn need(&self, need: usize, what: &str) -> anyhow::Result<()> {
        ensure!(
            need <= self.remaining(),
            "buffer underflow at pos {} while reading {}: need {} bytes, have {}",
            self.position,
            what,
            need,
            self.remaining()
        );
        Ok(())
    }

    pub fn read_u8(&mut self) -> anyhow::Result<u8> {
        self.need(1, "u8")?;
        let byte = self.buffer[self.position];
        self.position += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> anyhow::Result<u16> {
        self.need(2, "u16")?;
        let b = &self.buffer[self.position..self.position + 2];
        self.position += 2;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> anyhow::Result<u32> {
        self.need(4, "u32")?;
        let b = &self.buffer[self.position..self.position + 4];
        self.position += 4;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read `length` raw bytes.
    pub fn read_bytes(&mut self, length: usize) -> anyhow::Result<&'a [u8]> {
        self.need(length, "raw bytes")?;
        let data = &self.buffer[self.position..self.position + length];
        self.position += length;
        Ok(data)
    }

    /// Read a possibly compressed domain name.
    pub fn read_qname(&mut self) -> anyhow::Result<DomainName> {
        let mut pos = self.position;
        let mut hops = 0;
        let mut jumped = false;
        let mut name = String::new();

        loop {
            let Some(&length) = self.buffer.get(pos) else {
                bail!("qname out of bounds at pos {} (buf len {})", pos, self.buffer.len());
            };

            match length & 0xC0 {
                0xC0 => {
                    let Some(&low) = self.buffer.get(pos + 1) else {
                        bail!("truncated compression pointer at pos {}", pos);
                    };
                    let offset = (((length & 0x3F) as usize) << 8) | low as usize;

                    hops += 1;
                    ensure!(
                        hops <= MAX_POINTER_HOPS && offset < pos,
                        "invalid compression pointer to {} at pos {}",
                        offset,
                        pos
                    );

                    if !jumped {
                        self.position = pos + 2;
                        jumped = true;
                    }
                    pos = offset;
                }
                0x00 if length == 0 => {
                    if !jumped {
                        self.position = pos + 1;
                    }
                    break;
                }
                0x00 => {
                    let start = pos + 1;
                    let end = start + length as usize;
                    ensure!(
                        end <= self.buffer.len(),
                        "label overruns buffer at pos {}: need {} bytes, have {}",
                        start,
                        length,
                        self.buffer.len().saturating_sub(start)
                    );

                    if !name.is_empty() {
                        name.push('.');
                    }
                    name.push_str(&String::from_utf8_lossy(&self.buffer[start..end]));
                    pos = end;
                }
                other => bail!("unsupported label type 0x{:02x} at pos {}", other, pos),
            }
        }

        if name.is_empty() {
            return Ok(DomainName::root());
        }

        DomainName::from_ascii(name)
    }

    /// Current position in the buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of unread bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }
}

/// Types that can be parsed directly from a DNS message.
pub trait DnsReadable: Sized {
    fn read_from(reader: &mut DnsMessageReader) -> anyhow::Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::DnsMessageReader;
    use crate::domain_name::DomainName;

    #[test]
    fn test_read_integers() {
        let data = [42u8, 0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF];
        let mut reader = DnsMessageReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 42);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_underflow_keeps_position() {
        let data = [1, 2];
        let mut reader = DnsMessageReader::new(&data);

        assert!(reader.read_u32().is_err());
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
    }

    #[test]
    fn test_seek_and_remaining() {
        let data = [1, 2, 3, 4, 5];
        let mut reader = DnsMessageReader::new(&data);

        reader.seek(3).unwrap();
        assert_eq!(reader.remaining(), 2);
        assert_eq!(reader.read_u8().unwrap(), 4);
        assert!(reader.seek(6).is_err());
    }

    #[test]
    fn test_read_qname_root() {
        let data = [0];
        let mut reader = DnsMessageReader::new(&data);
        assert_eq!(reader.read_qname().unwrap(), DomainName::root());
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_read_qname_with_compression() {
        let mut data = vec![7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0];
        data.extend_from_slice(&[3, b'w', b'w', b'w', 0xC0, 0x00]);

        let mut reader = DnsMessageReader::new(&data);

        assert_eq!(reader.read_qname().unwrap().as_str(), "example.com");
        assert_eq!(reader.read_qname().unwrap().as_str(), "www.example.com");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_qname_rejects_pointer_loop() {
        let data = [0xC0, 0x00];
        let mut reader = DnsMessageReader::new(&data);
        assert!(reader.read_qname().is_err());
    }

    #[test]
    fn test_read_qname_label_overrun() {
        let data = [10, b'a', b'b', b'c'];
        let mut reader = DnsMessageReader::new(&data);
        assert!(reader.read_qname().is_err());
    }
}
