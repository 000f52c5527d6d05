//! Frame synchronization and decoding
//!
//! A capture file is a raw byte stream that may begin mid-datagram and may
//! contain corrupted stretches. Synchronization scans for the marker byte
//! and validates the cascading checksums before trusting an offset; a marker
//! that appears inside field data fails at least one checksum and the scan
//! resumes one byte later. Once locked, decoding walks the buffer in fixed
//! strides without re-validating each frame.

use crate::decoder::descriptor::{FrameDescriptor, META_LEN};
use crate::decoder::record::ImuRecord;

/// Result of locating the first valid datagram in a buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncDescriptor {
    /// Byte offset of the first valid marker
    pub offset: usize,
    /// Fixed datagram stride from that offset onward
    pub stride: usize,
    /// Field layout for payload and metadata decode
    pub layout: FrameDescriptor,
}

/// Sum of `bytes` modulo 256
#[inline]
fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Locate the first double-checksum-validated datagram in `buf`
///
/// Scans byte by byte for `desc.marker`. At each candidate offset `m` the
/// payload checksum (`sum(buf[m+1..m+1+L1]) mod 256`, stored right after the
/// payload block) is verified first; on a match the frame checksum
/// (`sum` from the marker through the metadata block, stored in the final
/// stride byte) is verified as well. Either mismatch means the marker was
/// coincidental and the scan advances one byte.
///
/// Returns `None` when the buffer is exhausted without a match. That is the
/// normal outcome for an empty or pre-corrupted capture, not an error.
pub fn synchronize(buf: &[u8], desc: &FrameDescriptor) -> Option<SyncDescriptor> {
    let stride = desc.stride();
    let mut m = 0;
    while m + stride <= buf.len() {
        if buf[m] != desc.marker {
            m += 1;
            continue;
        }

        let ck1_pos = m + 1 + desc.payload_len;
        if checksum(&buf[m + 1..ck1_pos]) != buf[ck1_pos] {
            m += 1;
            continue;
        }

        // The frame checksum covers marker, payload, payload checksum and
        // metadata; it sits in the last byte of the stride.
        let ck2_pos = m + stride - 1;
        if checksum(&buf[m..ck2_pos]) != buf[ck2_pos] {
            log::trace!("frame checksum mismatch at offset {}", m);
            m += 1;
            continue;
        }

        return Some(SyncDescriptor {
            offset: m,
            stride,
            layout: *desc,
        });
    }
    None
}

/// Decode every complete datagram in `buf`
///
/// Synchronizes once, then yields one [`ImuRecord`] per stride until fewer
/// than one stride's worth of bytes remain. A truncated trailing frame ends
/// the sequence early without error. The iterator holds no state beyond a
/// cursor; calling `decode_all` again restarts from the beginning of `buf`.
pub fn decode_all<'a>(buf: &'a [u8], desc: &'a FrameDescriptor) -> RecordIter<'a> {
    let cursor = synchronize(buf, desc).map(|sync| sync.offset);
    RecordIter { buf, desc, cursor }
}

/// Iterator over the decoded records of one buffer
pub struct RecordIter<'a> {
    buf: &'a [u8],
    desc: &'a FrameDescriptor,
    cursor: Option<usize>,
}

impl Iterator for RecordIter<'_> {
    type Item = ImuRecord;

    fn next(&mut self) -> Option<ImuRecord> {
        let offset = self.cursor?;
        let stride = self.desc.stride();
        if offset + stride > self.buf.len() {
            self.cursor = None;
            return None;
        }
        self.cursor = Some(offset + stride);
        Some(decode_frame(&self.buf[offset..offset + stride], self.desc))
    }
}

/// Decode one complete frame into a record
///
/// `frame` must be exactly one stride long.
fn decode_frame(frame: &[u8], desc: &FrameDescriptor) -> ImuRecord {
    let payload = &frame[1..1 + desc.payload_len];
    let meta = &frame[desc.payload_len + 2..desc.payload_len + 2 + META_LEN];

    let timestamp = read_u64_le(meta, 0) as f64 / 1e6;
    // Fixed 12-byte id field, each byte mapped to a char as-is; device
    // firmware pads with NULs which the record keeps.
    let device_id: String = meta[8..20].iter().map(|&b| b as char).collect();
    let exponents = meta[20];
    let start_timestamp = read_u64_le(meta, 21) as f64 / 1e6;
    let uart_buffer_len = u32::from_le_bytes([meta[29], meta[30], meta[31], meta[32]]);

    let fields = desc.decode_payload(payload, exponents);

    ImuRecord {
        device_id,
        timestamp,
        accel: fields.accel,
        gyro: fields.gyro,
        mag: fields.mag,
        orientation: fields.orientation,
        start_timestamp,
        uart_buffer_len,
    }
}

#[inline]
fn read_u64_le(b: &[u8], off: usize) -> u64 {
    u64::from_le_bytes([
        b[off],
        b[off + 1],
        b[off + 2],
        b[off + 3],
        b[off + 4],
        b[off + 5],
        b[off + 6],
        b[off + 7],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x01, 0x02]), 0x03);
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
    }

    #[test]
    fn test_synchronize_empty_and_short() {
        let desc = FrameDescriptor::hi229();
        assert_eq!(synchronize(&[], &desc), None);
        assert_eq!(synchronize(&[0xE5; 50], &desc), None);
    }

    #[test]
    fn test_synchronize_no_marker() {
        let desc = FrameDescriptor::hi229();
        let buf = vec![0x00u8; 4096];
        assert_eq!(synchronize(&buf, &desc), None);
        assert_eq!(decode_all(&buf, &desc).count(), 0);
    }
}
