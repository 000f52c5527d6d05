//! Shared helpers for integration tests: synthetic datagram encoders
//!
//! Builds wire-exact datagrams for both protocol generations so tests can
//! exercise the decoder against buffers with known field values.

#![allow(dead_code)]

/// Sum of `bytes` modulo 256, as the devices compute it
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Field values for one current-generation (HI229) datagram
pub struct Hi229Frame {
    pub device_id: [u8; 12],
    pub timestamp_us: u64,
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub mag: [f32; 3],
    pub euler: [f32; 3],
    pub quat: [f32; 4],
    pub pressure: f32,
    pub exponents: u8,
    pub start_us: u64,
    pub uart_len: u32,
}

impl Default for Hi229Frame {
    fn default() -> Self {
        Self {
            device_id: *b"imu-node-a01",
            timestamp_us: 1_000_000,
            accel: [0.5, -1.0, 2.0],
            gyro: [4.0, -0.25, 1.5],
            mag: [0.125, 0.25, -0.5],
            euler: [10.0, 20.0, 30.0],
            quat: [1.0, 0.0, 0.0, 0.0],
            pressure: 100.0,
            exponents: 0,
            start_us: 500_000,
            uart_len: 64,
        }
    }
}

/// Field values for one legacy fixed-point datagram
pub struct LegacyFrame {
    pub device_id: [u8; 12],
    pub timestamp_us: u64,
    pub accel_raw: [i16; 3],
    pub gyro_raw: [i16; 3],
    pub euler_raw: [i16; 3],
    pub mag_raw: [i16; 3],
    pub exponents: u8,
    pub start_us: u64,
    pub uart_len: u32,
}

impl Default for LegacyFrame {
    fn default() -> Self {
        Self {
            device_id: *b"imu-node-l07",
            timestamp_us: 2_000_000,
            accel_raw: [16384, -8192, 4096],
            gyro_raw: [256, -512, 1024],
            euler_raw: [4500, -3000, 9000],
            mag_raw: [100, -200, 300],
            exponents: 0,
            start_us: 1_000_000,
            uart_len: 32,
        }
    }
}

fn encode_meta(
    device_id: &[u8; 12],
    timestamp_us: u64,
    exponents: u8,
    start_us: u64,
    uart_len: u32,
) -> Vec<u8> {
    let mut meta = Vec::with_capacity(33);
    meta.extend_from_slice(&timestamp_us.to_le_bytes());
    meta.extend_from_slice(device_id);
    meta.push(exponents);
    meta.extend_from_slice(&start_us.to_le_bytes());
    meta.extend_from_slice(&uart_len.to_le_bytes());
    assert_eq!(meta.len(), 33);
    meta
}

/// Assemble marker + payload + ck1 + meta + ck2
fn assemble(marker: u8, payload: &[u8], meta: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + meta.len() + 3);
    frame.push(marker);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame.extend_from_slice(meta);
    let ck2 = checksum(&frame);
    frame.push(ck2);
    frame
}

/// Encode one current-generation datagram (112 bytes)
pub fn encode_hi229(f: &Hi229Frame) -> Vec<u8> {
    let mut payload = Vec::with_capacity(76);
    payload.extend_from_slice(&1u32.to_le_bytes()); // sample tag
    for v in f.accel.iter().chain(&f.gyro).chain(&f.mag).chain(&f.euler).chain(&f.quat) {
        payload.extend_from_slice(&v.to_le_bytes());
    }
    payload.extend_from_slice(&f.pressure.to_le_bytes());
    payload.extend_from_slice(&7u32.to_le_bytes()); // device tick
    assert_eq!(payload.len(), 76);

    let meta = encode_meta(
        &f.device_id,
        f.timestamp_us,
        f.exponents,
        f.start_us,
        f.uart_len,
    );
    let frame = assemble(0xE5, &payload, &meta);
    assert_eq!(frame.len(), 112);
    frame
}

/// Encode one legacy fixed-point datagram (67 bytes)
pub fn encode_legacy(f: &LegacyFrame) -> Vec<u8> {
    let mut payload = vec![0u8; 31];
    payload[0] = 0x03; // register read op
    payload[1] = 0x14; // start register
    payload[2] = 0x1B; // sample length

    let mut put = |off: usize, raw: i16| {
        payload[off..off + 2].copy_from_slice(&raw.to_le_bytes());
    };
    put(3, f.accel_raw[0]);
    put(5, f.accel_raw[1]);
    put(7, f.accel_raw[2]);
    put(9, f.gyro_raw[0]);
    put(11, f.gyro_raw[1]);
    put(13, f.gyro_raw[2]);
    put(15, f.euler_raw[0]);
    put(17, f.euler_raw[1]);
    put(19, f.euler_raw[2]);
    put(24, f.mag_raw[0]);
    put(26, f.mag_raw[1]);
    put(28, f.mag_raw[2]);

    let meta = encode_meta(
        &f.device_id,
        f.timestamp_us,
        f.exponents,
        f.start_us,
        f.uart_len,
    );
    let frame = assemble(0xA4, &payload, &meta);
    assert_eq!(frame.len(), 67);
    frame
}
