mod classify;
mod dispatch;
mod error;
mod ext;
mod flags;
mod index;
mod resolve;
mod transform;

pub use {classify::*, dispatch::*, error::*, flags::*, index::*, resolve::*, transform::*};

/// Leading bytes of a DFAS deflated container
pub const DEFLATED_MAGIC: [u8; 4] = *b"DFAS";
/// Leading bytes of a gzip member as written for the switch ports
pub const GZIP_MAGIC: [u8; 3] = [0x1F, 0x8B, 0x08];
pub const PAC_MAGIC: [u8; 4] = *b"FPAC";
pub const HIP_MAGIC: [u8; 4] = *b"HIP\0";
pub const HPL_MAGIC: [u8; 4] = *b"HPAL";

/// Extension carried by files that are already switch-compressed
pub const SWITCH_COMPRESSED_EXTENSION: &str = ".pacgz";
