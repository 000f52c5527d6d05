//! Decoder properties over synthetic datagrams
//!
//! Builds wire-exact buffers and checks the synchronization and decoding
//! guarantees: field-faithful decode of a valid datagram, resynchronization
//! past arbitrary prefixes, rejection of corrupted checksums with recovery
//! at the next valid datagram, and graceful handling of empty, markerless
//! and truncated buffers.

mod common;

use approx::assert_relative_eq;
use common::{encode_hi229, encode_legacy, Hi229Frame, LegacyFrame};
use dhara_io::decoder::{decode_all, synchronize, FrameDescriptor, Orientation};

#[test]
fn test_single_datagram_decodes_field_faithfully() {
    let frame = Hi229Frame::default();
    let buf = encode_hi229(&frame);
    let desc = FrameDescriptor::hi229();

    let records: Vec<_> = decode_all(&buf, &desc).collect();
    assert_eq!(records.len(), 1);

    let rec = &records[0];
    assert_eq!(rec.device_id, "imu-node-a01");
    assert_eq!(rec.timestamp, 1.0);
    assert_eq!(rec.accel, frame.accel);
    assert_eq!(rec.gyro, frame.gyro);
    assert_eq!(rec.mag, frame.mag);
    assert_eq!(
        rec.orientation,
        Orientation::Quaternion {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0
        }
    );
    assert_eq!(rec.start_timestamp, 0.5);
    assert_eq!(rec.uart_buffer_len, 64);
}

#[test]
fn test_concatenated_datagrams_decode_in_stream_order() {
    let desc = FrameDescriptor::hi229();
    let mut buf = Vec::new();
    for k in 0..5u64 {
        let frame = Hi229Frame {
            timestamp_us: (k + 1) * 1_000_000,
            ..Hi229Frame::default()
        };
        buf.extend_from_slice(&encode_hi229(&frame));
    }

    let records: Vec<_> = decode_all(&buf, &desc).collect();
    assert_eq!(records.len(), 5);
    for (k, rec) in records.iter().enumerate() {
        assert_eq!(rec.timestamp, (k + 1) as f64);
    }
}

#[test]
fn test_resynchronization_past_leading_junk() {
    let desc = FrameDescriptor::hi229();
    let valid = encode_hi229(&Hi229Frame::default());

    for junk_len in [1usize, 7, 64, 300] {
        // Junk deliberately free of the marker byte
        let mut buf: Vec<u8> = (0..junk_len).map(|i| (i % 0x7F) as u8).collect();
        buf.extend_from_slice(&valid);
        buf.extend_from_slice(&valid);

        let sync = synchronize(&buf, &desc).unwrap();
        assert_eq!(sync.offset, junk_len);
        assert_eq!(sync.stride, 112);
        assert_eq!(decode_all(&buf, &desc).count(), 2);
    }
}

#[test]
fn test_coincidental_marker_rejected_by_frame_checksum() {
    // A marker followed by zeros passes the payload checksum (sum 0, stored
    // byte 0) but fails the frame checksum, which includes the marker byte
    // itself. The scan must advance and lock on the real datagram.
    let desc = FrameDescriptor::hi229();
    let mut buf = vec![0u8; 112];
    buf[0] = 0xE5;
    buf.extend_from_slice(&encode_hi229(&Hi229Frame::default()));

    let sync = synchronize(&buf, &desc).unwrap();
    assert_eq!(sync.offset, 112);
    assert_eq!(decode_all(&buf, &desc).count(), 1);
}

#[test]
fn test_corrupted_checksum_rejected_then_recovers() {
    let desc = FrameDescriptor::hi229();
    let mut first = encode_hi229(&Hi229Frame::default());
    // Flip the payload checksum byte of the first datagram
    first[77] ^= 0xFF;

    let second = Hi229Frame {
        timestamp_us: 9_000_000,
        ..Hi229Frame::default()
    };

    let mut buf = first;
    buf.extend_from_slice(&encode_hi229(&second));

    let records: Vec<_> = decode_all(&buf, &desc).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, 9.0);
}

#[test]
fn test_corrupted_datagram_alone_yields_nothing() {
    let desc = FrameDescriptor::hi229();
    let mut buf = encode_hi229(&Hi229Frame::default());
    buf[77] ^= 0xFF;

    assert_eq!(synchronize(&buf, &desc), None);
    assert_eq!(decode_all(&buf, &desc).count(), 0);
}

#[test]
fn test_empty_and_markerless_buffers() {
    let desc = FrameDescriptor::hi229();
    assert_eq!(synchronize(&[], &desc), None);
    assert_eq!(decode_all(&[], &desc).count(), 0);

    let no_marker = vec![0x42u8; 1024];
    assert_eq!(synchronize(&no_marker, &desc), None);
    assert_eq!(decode_all(&no_marker, &desc).count(), 0);
}

#[test]
fn test_truncated_trailing_frame_ends_sequence_early() {
    let desc = FrameDescriptor::hi229();
    let valid = encode_hi229(&Hi229Frame::default());
    let mut buf = Vec::new();
    buf.extend_from_slice(&valid);
    buf.extend_from_slice(&valid);
    buf.extend_from_slice(&valid[..56]); // half a datagram

    assert_eq!(decode_all(&buf, &desc).count(), 2);
}

#[test]
fn test_decode_is_restartable() {
    let desc = FrameDescriptor::hi229();
    let buf = encode_hi229(&Hi229Frame::default());

    let first: Vec<_> = decode_all(&buf, &desc).collect();
    let second: Vec<_> = decode_all(&buf, &desc).collect();
    assert_eq!(first, second);
}

#[test]
fn test_legacy_datagram_decodes_with_scale_table() {
    let frame = LegacyFrame {
        // gyro exp = 1, accel exp = 2, mag exp = 0
        exponents: 0b00_10_01,
        ..LegacyFrame::default()
    };
    let buf = encode_legacy(&frame);
    let desc = FrameDescriptor::legacy();

    let records: Vec<_> = decode_all(&buf, &desc).collect();
    assert_eq!(records.len(), 1);

    let rec = &records[0];
    assert_eq!(rec.device_id, "imu-node-l07");
    assert_eq!(rec.timestamp, 2.0);
    assert_eq!(rec.start_timestamp, 1.0);
    assert_eq!(rec.uart_buffer_len, 32);

    // accel divider 4/65536 with exponent 2^2
    assert_relative_eq!(rec.accel[0], 16384.0 * (4.0 / 65536.0) * 4.0, epsilon = 1e-5);
    assert_relative_eq!(rec.accel[1], -8192.0 * (4.0 / 65536.0) * 4.0, epsilon = 1e-5);
    // gyro divider 500/65536 with exponent 2^1
    assert_relative_eq!(rec.gyro[2], 1024.0 * (500.0 / 65536.0) * 2.0, epsilon = 1e-4);
    // mag divider 4/65536, no exponent
    assert_relative_eq!(rec.mag[0], 100.0 * (4.0 / 65536.0), epsilon = 1e-6);

    // Euler angles in centidegrees, no exponent
    let (roll, pitch, yaw) = rec.orientation.as_euler().unwrap();
    assert_relative_eq!(roll, 45.0, epsilon = 1e-4);
    assert_relative_eq!(pitch, -30.0, epsilon = 1e-4);
    assert_relative_eq!(yaw, 90.0, epsilon = 1e-4);
}

#[test]
fn test_legacy_and_current_strides_differ() {
    // A legacy buffer holds no valid current-generation frames and vice versa
    let legacy_buf = encode_legacy(&LegacyFrame::default());
    assert_eq!(
        decode_all(&legacy_buf, &FrameDescriptor::hi229()).count(),
        0
    );
    let current_buf = encode_hi229(&Hi229Frame::default());
    assert_eq!(
        decode_all(&current_buf, &FrameDescriptor::legacy()).count(),
        0
    );
}
