/// Size of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// Extracts the transaction ID from a DNS message.
pub fn extract_transaction_id(data: &[u8]) -> Option<u16> {
    if data.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([data[0], data[1]]))
}

/// Whether the TC bit is set, `None` if the buffer is too short to tell.
pub fn is_truncated(data: &[u8]) -> Option<bool> {
    if data.len() < HEADER_LEN {
        return None;
    }
    Some(data[2] & 0x02 != 0)
}

/// Whether the QR bit is set.
pub fn is_response(data: &[u8]) -> bool {
    data.len() >= HEADER_LEN && data[2] & 0x80 != 0
}
