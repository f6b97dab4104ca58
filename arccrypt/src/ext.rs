use byteorder::{ReadBytesExt, LE};
use std::path::Path;

pub trait ReadExt {
    fn read_magic(&mut self) -> std::io::Result<[u8; 4]>;
    fn read_header<const N: usize>(&mut self) -> std::io::Result<[u32; N]>;
}

pub trait PathExt {
    /// Lowercase extension with its leading dot, or empty
    fn extension_lower(&self) -> String;
    fn file_name_lossy(&self) -> String;
}

impl<R: std::io::Read> ReadExt for R {
    fn read_magic(&mut self) -> std::io::Result<[u8; 4]> {
        let mut magic = [0; 4];
        self.read_exact(&mut magic)?;
        Ok(magic)
    }

    fn read_header<const N: usize>(&mut self) -> std::io::Result<[u32; N]> {
        let mut fields = [0; N];
        for field in &mut fields {
            *field = self.read_u32::<LE>()?;
        }
        Ok(fields)
    }
}

impl PathExt for Path {
    fn extension_lower(&self) -> String {
        self.extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }

    fn file_name_lossy(&self) -> String {
        self.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
