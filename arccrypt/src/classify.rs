use std::path::Path;

use crate::ext::{PathExt, ReadExt};
use crate::{DEFLATED_MAGIC, GZIP_MAGIC, HIP_MAGIC, HPL_MAGIC, PAC_MAGIC};

const HEADER_SIZE: usize = 0x20;

#[derive(Clone, Copy, PartialEq, Eq, Debug, strum::Display)]
pub enum ContainerKind {
    #[strum(serialize = "PAC")]
    Pac,
    #[strum(serialize = "HIP")]
    Hip,
    #[strum(serialize = "HPL")]
    Hpl,
    Unknown,
}

impl ContainerKind {
    pub fn is_known(self) -> bool {
        self != ContainerKind::Unknown
    }
}

/// Structural check deciding whether a buffer holds a given container
pub type Validator = fn(&[u8]) -> bool;

/// What could be learned about a file without transforming it
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FileSignature {
    pub extension: String,
    /// First four bytes, zero padded for short files
    pub magic: [u8; 4],
    pub container: ContainerKind,
    pub md5_name: bool,
    pub md5_prefixed_name: bool,
}

impl FileSignature {
    pub fn is_deflated(&self) -> bool {
        self.magic == DEFLATED_MAGIC
    }

    pub fn is_gzip(&self) -> bool {
        self.magic[..3] == GZIP_MAGIC
    }
}

/// Exactly 32 hex digits, either case
pub fn looks_like_md5(name: &str) -> bool {
    name.len() == 32 && name.bytes().all(|b| b.is_ascii_hexdigit())
}

/// An MD5 name followed by anything, e.g. a disambiguation suffix
pub fn looks_like_md5_prefixed(name: &str) -> bool {
    name.len() > 32 && name.is_char_boundary(32) && looks_like_md5(&name[..32])
}

#[derive(Clone)]
pub struct Classifier {
    validators: Vec<(ContainerKind, Validator)>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(vec![
            (ContainerKind::Pac, validate_pac as Validator),
            (ContainerKind::Hip, validate_hip as Validator),
            (ContainerKind::Hpl, validate_hpl as Validator),
        ])
    }
}

impl Classifier {
    /// Validators are tried in order and the first to accept decides the container kind.
    pub fn new(validators: Vec<(ContainerKind, Validator)>) -> Self {
        Self { validators }
    }

    pub fn classify(&self, path: &Path, data: &[u8]) -> FileSignature {
        let name = path.file_name_lossy();
        let mut magic = [0; 4];
        let len = data.len().min(4);
        magic[..len].copy_from_slice(&data[..len]);

        let container = self
            .validators
            .iter()
            .find(|(_, validate)| validate(data))
            .map(|(kind, _)| *kind)
            .unwrap_or(ContainerKind::Unknown);

        FileSignature {
            extension: path.extension_lower(),
            magic,
            container,
            md5_name: looks_like_md5(&name),
            md5_prefixed_name: looks_like_md5_prefixed(&name),
        }
    }
}

fn validate_pac(data: &[u8]) -> bool {
    if data.len() < HEADER_SIZE {
        return false;
    }
    let mut header = data;
    match (header.read_magic(), header.read_header::<3>()) {
        (Ok(magic), Ok([data_start, total_size, _file_count])) => {
            magic == PAC_MAGIC
                && (HEADER_SIZE..=data.len()).contains(&(data_start as usize))
                && total_size as usize <= data.len()
        }
        _ => false,
    }
}

fn validate_hip(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE && data.starts_with(&HIP_MAGIC)
}

fn validate_hpl(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE && data.starts_with(&HPL_MAGIC)
}
