//! Binary frame decoder for captured device streams
//!
//! Capture files contain the exact bytes a device sent, with no added
//! framing. The decoder re-synchronizes on the wire protocol's marker byte,
//! validates the cascading checksums, and walks the stream in fixed strides,
//! producing one [`ImuRecord`] per datagram. It is a pure reader: the only
//! I/O lives in [`decode_file`], so everything else is directly testable on
//! in-memory buffers.

mod descriptor;
mod frame;
mod record;

pub use descriptor::{FrameDescriptor, Generation, PayloadLayout, ScaleTable, META_LEN};
pub use frame::{decode_all, synchronize, RecordIter, SyncDescriptor};
pub use record::{ImuRecord, Orientation};

use crate::error::Result;
use std::path::Path;

/// Decode every complete datagram in a capture file
///
/// Reads the file fully into memory and decodes it. An unreadable file is an
/// I/O error; a file with no valid datagrams decodes to an empty vector,
/// which is a normal outcome for an empty or pre-corrupted capture. The file
/// must no longer be actively appended to.
pub fn decode_file<P: AsRef<Path>>(path: P, desc: &FrameDescriptor) -> Result<Vec<ImuRecord>> {
    let buf = std::fs::read(path)?;
    Ok(decode_all(&buf, desc).collect())
}
