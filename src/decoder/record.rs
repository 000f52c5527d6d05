//! Decoded measurement record types

/// Device orientation estimate
///
/// The current protocol generation reports a unit quaternion; the legacy
/// fixed-point generation reports Euler angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    /// Euler angles in degrees
    Euler { roll: f32, pitch: f32, yaw: f32 },
    /// Unit quaternion (w, x, y, z)
    Quaternion { w: f32, x: f32, y: f32, z: f32 },
}

impl Orientation {
    /// Euler angles, if this orientation carries them
    pub fn as_euler(&self) -> Option<(f32, f32, f32)> {
        match *self {
            Orientation::Euler { roll, pitch, yaw } => Some((roll, pitch, yaw)),
            Orientation::Quaternion { .. } => None,
        }
    }

    /// Quaternion components, if this orientation carries them
    pub fn as_quaternion(&self) -> Option<(f32, f32, f32, f32)> {
        match *self {
            Orientation::Quaternion { w, x, y, z } => Some((w, x, y, z)),
            Orientation::Euler { .. } => None,
        }
    }
}

/// One fully decoded measurement sample
///
/// Produced by the frame decoder; immutable once built, ownership transfers
/// to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ImuRecord {
    /// Device identifier (fixed 12-byte field, mapped byte-for-byte)
    pub device_id: String,
    /// Sample timestamp in seconds (device clock)
    pub timestamp: f64,
    /// Accelerometer vector (g)
    pub accel: [f32; 3],
    /// Angular-rate vector (deg/s)
    pub gyro: [f32; 3],
    /// Magnetic-field vector (gauss)
    pub mag: [f32; 3],
    /// Orientation estimate
    pub orientation: Orientation,
    /// Device-reported session start timestamp in seconds
    pub start_timestamp: f64,
    /// On-device UART buffer occupancy at sample time
    pub uart_buffer_len: u32,
}
