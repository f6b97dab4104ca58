use crate::{Error, Md5Digest, Step};

type Result<T, E = Error> = std::result::Result<T, E>;

/// What a step may be keyed by
#[derive(Clone, Copy, Debug)]
pub struct StepKey<'a> {
    /// Name of the file as found on disk
    pub name: &'a str,
    /// Digest keying the MD5 steps
    pub digest: Option<Md5Digest>,
}

/// A byte level transformation. The engine only decides which steps run; implementations
/// do the actual work and reject input they cannot handle with [`Error::Transform`].
pub trait Transform {
    fn apply(&self, step: Step, input: &[u8], key: &StepKey) -> Result<Vec<u8>>;
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn apply(&self, step: Step, input: &[u8], key: &StepKey) -> Result<Vec<u8>> {
        (**self).apply(step, input, key)
    }
}

impl<T: Transform + ?Sized> Transform for &T {
    fn apply(&self, step: Step, input: &[u8], key: &StepKey) -> Result<Vec<u8>> {
        (**self).apply(step, input, key)
    }
}

/// Compression steps implemented in-crate, encryption steps delegated to an optional cipher.
#[derive(Default)]
pub struct Builtin {
    cipher: Option<Box<dyn Transform>>,
}

impl Builtin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cipher(mut self, cipher: impl Transform + 'static) -> Self {
        self.cipher = Some(Box::new(cipher));
        self
    }
}

impl Transform for Builtin {
    fn apply(&self, step: Step, input: &[u8], key: &StepKey) -> Result<Vec<u8>> {
        match step {
            #[cfg(feature = "compression")]
            Step::Deflate => dfas::deflate(input),
            #[cfg(feature = "compression")]
            Step::Inflate => dfas::inflate(input),
            #[cfg(feature = "compression")]
            Step::SwitchDeflate => gzip::compress(input),
            #[cfg(feature = "compression")]
            Step::SwitchInflate => gzip::decompress(input),
            Step::Encrypt | Step::Decrypt | Step::Md5Encrypt | Step::Md5Decrypt => self
                .cipher
                .as_ref()
                .ok_or(Error::Unsupported(step))?
                .apply(step, input, key),
            #[allow(unreachable_patterns)]
            _ => Err(Error::Unsupported(step)),
        }
    }
}

fn rejected(step: Step, reason: impl std::fmt::Display) -> Error {
    Error::Transform {
        step,
        reason: reason.to_string(),
    }
}

#[cfg(feature = "compression")]
mod dfas {
    use std::io::{Read, Write};

    use byteorder::{WriteBytesExt, LE};
    use flate2::{read::DeflateDecoder, write::DeflateEncoder};

    use super::{rejected, Result};
    use crate::ext::ReadExt;
    use crate::Step;

    const MAGIC: &[u8; 8] = b"DFASFPAC";

    pub(super) fn deflate(input: &[u8]) -> Result<Vec<u8>> {
        let size = u32::try_from(input.len()).map_err(|_| rejected(Step::Deflate, "input too large"))?;
        let mut encoder = DeflateEncoder::new(vec![], flate2::Compression::default());
        encoder.write_all(input)?;
        let compressed = encoder.finish()?;
        let compressed_size = u32::try_from(compressed.len())
            .map_err(|_| rejected(Step::Deflate, "output too large"))?;

        let mut output = Vec::with_capacity(MAGIC.len() + 8 + compressed.len());
        output.extend_from_slice(MAGIC);
        output.write_u32::<LE>(size)?;
        output.write_u32::<LE>(compressed_size)?;
        output.extend_from_slice(&compressed);
        Ok(output)
    }

    pub(super) fn inflate(input: &[u8]) -> Result<Vec<u8>> {
        let mut header = input
            .strip_prefix(MAGIC.as_slice())
            .ok_or_else(|| rejected(Step::Inflate, "missing DFASFPAC header"))?;
        let [size, compressed_size] = header
            .read_header::<2>()
            .map_err(|_| rejected(Step::Inflate, "truncated DFASFPAC header"))?;
        let payload = header
            .get(..compressed_size as usize)
            .ok_or_else(|| rejected(Step::Inflate, "truncated payload"))?;

        let mut output = vec![];
        DeflateDecoder::new(payload)
            .take(size as u64 + 1)
            .read_to_end(&mut output)
            .map_err(|e| rejected(Step::Inflate, e))?;
        if output.len() != size as usize {
            return Err(rejected(
                Step::Inflate,
                format!("expected {size} bytes, got {}", output.len()),
            ));
        }
        Ok(output)
    }
}

#[cfg(feature = "compression")]
mod gzip {
    use std::io::{Read, Write};

    use flate2::{read::GzDecoder, write::GzEncoder};

    use super::{rejected, Result};
    use crate::Step;

    pub(super) fn compress(input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(vec![], flate2::Compression::default());
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }

    pub(super) fn decompress(input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![];
        GzDecoder::new(input)
            .read_to_end(&mut output)
            .map_err(|e| rejected(Step::SwitchInflate, e))?;
        Ok(output)
    }
}
