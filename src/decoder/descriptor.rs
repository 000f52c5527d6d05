//! Frame descriptors for the supported wire-protocol generations
//!
//! Both generations share the same framing: a one-byte marker, a fixed-size
//! payload block followed by a mod-256 checksum of the payload, then a
//! fixed-size metadata block followed by a mod-256 checksum covering
//! everything from the marker through the metadata. What differs per
//! generation is the marker value, the payload size and encoding, and the
//! fixed-point scale table. The descriptor captures all of it so the decoder
//! never branches on generation at field level.

use crate::decoder::record::Orientation;
use serde::{Deserialize, Serialize};

/// Metadata block length, identical across generations
///
/// Layout (little-endian, packed):
/// - `[0..8)`   sample timestamp, microseconds
/// - `[8..20)`  device id, 12 bytes
/// - `[20]`     dynamic-range exponent byte
/// - `[21..29)` session start timestamp, microseconds
/// - `[29..33)` UART buffer occupancy
pub const META_LEN: usize = 33;

/// Protocol generation selector (config-facing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// Current generation: native little-endian f32 fields, marker 0xE5
    #[default]
    Hi229,
    /// Legacy generation: i16 fixed-point fields with scale table, marker 0xA4
    Legacy,
}

impl Generation {
    /// Build the frame descriptor for this generation
    pub fn descriptor(&self) -> FrameDescriptor {
        match self {
            Generation::Hi229 => FrameDescriptor::hi229(),
            Generation::Legacy => FrameDescriptor::legacy(),
        }
    }
}

/// Per-axis fixed-point scale dividers for the legacy generation
///
/// Raw i16 values are multiplied by the divider, then by `2^exp` where the
/// exponent is unpacked per sensor family from the metadata exponent byte
/// (gyro in bits 0-1, accel in bits 2-3, mag in bits 4-5). Euler angles take
/// no exponent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleTable {
    pub accel: f32,
    pub gyro: f32,
    pub euler: f32,
    pub mag: f32,
}

/// Payload block encoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadLayout {
    /// Native little-endian 32-bit floats (current generation)
    Float32,
    /// Little-endian signed 16-bit fixed point with scale table (legacy)
    FixedPoint(ScaleTable),
}

/// Complete description of one protocol generation's datagram
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDescriptor {
    /// Marker byte opening every datagram
    pub marker: u8,
    /// Payload block length in bytes
    pub payload_len: usize,
    /// Payload field encoding
    pub layout: PayloadLayout,
}

// Float32 payload field offsets. The leading u32 is a device-side sample tag
// and the trailing f32/u32 are barometric pressure and a device tick counter;
// none of the three survive into the record.
const F32_ACCEL: usize = 4;
const F32_GYRO: usize = 16;
const F32_MAG: usize = 28;
const F32_QUAT: usize = 52;

// FixedPoint payload field offsets. Bytes 0-2 are the device's register-read
// preamble and byte 21-23 carry the die temperature, which the record does
// not keep.
const FP_ACCEL: usize = 3;
const FP_GYRO: usize = 9;
const FP_EULER: usize = 15;
const FP_MAG: usize = 24;

/// Motion fields extracted from one payload block
pub(crate) struct PayloadFields {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub mag: [f32; 3],
    pub orientation: Orientation,
}

impl FrameDescriptor {
    /// Descriptor for the current (HI229-class) generation: 112-byte stride
    pub fn hi229() -> Self {
        Self {
            marker: 0xE5,
            payload_len: 76,
            layout: PayloadLayout::Float32,
        }
    }

    /// Descriptor for the legacy fixed-point generation: 67-byte stride
    pub fn legacy() -> Self {
        Self {
            marker: 0xA4,
            payload_len: 31,
            layout: PayloadLayout::FixedPoint(ScaleTable {
                accel: 4.0 / 65536.0,
                gyro: 500.0 / 65536.0,
                euler: 1.0 / 100.0,
                mag: 4.0 / 65536.0,
            }),
        }
    }

    /// Total datagram stride: marker + payload + ck1 + metadata + ck2
    pub fn stride(&self) -> usize {
        self.payload_len + META_LEN + 3
    }

    /// Decode the motion fields of one payload block
    ///
    /// `exponents` is the metadata dynamic-range byte; it is ignored by the
    /// Float32 layout, which is already in physical units.
    pub(crate) fn decode_payload(&self, payload: &[u8], exponents: u8) -> PayloadFields {
        match self.layout {
            PayloadLayout::Float32 => PayloadFields {
                accel: read_vec3_f32(payload, F32_ACCEL),
                gyro: read_vec3_f32(payload, F32_GYRO),
                mag: read_vec3_f32(payload, F32_MAG),
                orientation: Orientation::Quaternion {
                    w: read_f32(payload, F32_QUAT),
                    x: read_f32(payload, F32_QUAT + 4),
                    y: read_f32(payload, F32_QUAT + 8),
                    z: read_f32(payload, F32_QUAT + 12),
                },
            },
            PayloadLayout::FixedPoint(scale) => {
                let gyro_exp = exponents & 0b11;
                let accel_exp = (exponents >> 2) & 0b11;
                let mag_exp = (exponents >> 4) & 0b11;
                PayloadFields {
                    accel: read_vec3_fixed(payload, FP_ACCEL, scale.accel, accel_exp),
                    gyro: read_vec3_fixed(payload, FP_GYRO, scale.gyro, gyro_exp),
                    mag: read_vec3_fixed(payload, FP_MAG, scale.mag, mag_exp),
                    orientation: Orientation::Euler {
                        roll: read_fixed(payload, FP_EULER, scale.euler, 0),
                        pitch: read_fixed(payload, FP_EULER + 2, scale.euler, 0),
                        yaw: read_fixed(payload, FP_EULER + 4, scale.euler, 0),
                    },
                }
            }
        }
    }
}

#[inline]
fn read_f32(b: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

#[inline]
fn read_vec3_f32(b: &[u8], off: usize) -> [f32; 3] {
    [
        read_f32(b, off),
        read_f32(b, off + 4),
        read_f32(b, off + 8),
    ]
}

#[inline]
fn read_fixed(b: &[u8], off: usize, divider: f32, exp: u8) -> f32 {
    let raw = i16::from_le_bytes([b[off], b[off + 1]]);
    raw as f32 * divider * (1u16 << exp) as f32
}

#[inline]
fn read_vec3_fixed(b: &[u8], off: usize, divider: f32, exp: u8) -> [f32; 3] {
    [
        read_fixed(b, off, divider, exp),
        read_fixed(b, off + 2, divider, exp),
        read_fixed(b, off + 4, divider, exp),
    ]
}
