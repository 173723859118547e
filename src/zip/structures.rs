use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use super::ZipError;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: [u8; 4] = *b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Signatures that mark the end of the entry section of an archive.
pub const CDFH_SIGNATURE: [u8; 4] = *b"PK\x01\x02";
pub const EOCD_SIGNATURE: [u8; 4] = *b"PK\x05\x06";
pub const ZIP64_EOCD_SIGNATURE: [u8; 4] = *b"PK\x06\x06";
pub const ZIP64_LOCATOR_SIGNATURE: [u8; 4] = *b"PK\x06\x07";

/// Optional signature in front of a data descriptor.
pub const DATA_DESCRIPTOR_SIGNATURE: [u8; 4] = *b"PK\x07\x08";

/// ZIP64 extended information extra field
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Header value meaning "the real size lives in the ZIP64 extra field".
pub const ZIP64_SIZE_MARKER: u32 = 0xFFFF_FFFF;

/// General purpose bit flags
pub const FLAG_ENCRYPTED: u16 = 1 << 0;
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// What a 4-byte signature at an entry boundary announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    LocalFile,
    /// Central directory or end records; no more entries follow.
    End,
    Unknown(u32),
}

impl Boundary {
    pub fn classify(sig: [u8; 4]) -> Self {
        match sig {
            LFH_SIGNATURE => Boundary::LocalFile,
            CDFH_SIGNATURE | EOCD_SIGNATURE | ZIP64_EOCD_SIGNATURE | ZIP64_LOCATOR_SIGNATURE => {
                Boundary::End
            }
            _ => Boundary::Unknown(u32::from_le_bytes(sig)),
        }
    }
}

/// Fixed part of a Local File Header, after the signature.
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    /// Set once a ZIP64 extra field has been applied.
    pub zip64: bool,
}

impl LocalFileHeader {
    /// Size of the fixed header fields without the leading signature.
    pub const FIXED_SIZE: usize = LFH_SIZE - 4;

    pub fn from_bytes(data: &[u8]) -> Result<Self, ZipError> {
        if data.len() < Self::FIXED_SIZE {
            return Err(ZipError::Truncated("local file header"));
        }

        let mut cursor = Cursor::new(data);

        Ok(Self {
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>()?),
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()? as u64,
            uncompressed_size: cursor.read_u32::<LittleEndian>()? as u64,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
            zip64: false,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Sizes and CRC follow the data instead of living in the header.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Apply the ZIP64 extended information extra field, if present.
    ///
    /// In a local header both 64-bit sizes are present when either 32-bit
    /// field holds the marker, uncompressed size first.
    pub fn apply_extra_field(&mut self, extra: &[u8]) -> Result<(), ZipError> {
        let mut cursor = Cursor::new(extra);
        let end = extra.len() as u64;

        while cursor.position() + 4 <= end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()? as u64;
            let field_end = (cursor.position() + field_size).min(end);

            if header_id == ZIP64_EXTRA_ID {
                self.zip64 = true;
                let uncompressed_marked = self.uncompressed_size == ZIP64_SIZE_MARKER as u64;
                let compressed_marked = self.compressed_size == ZIP64_SIZE_MARKER as u64;

                if (uncompressed_marked || compressed_marked) && cursor.position() + 16 <= field_end
                {
                    let uncompressed = cursor.read_u64::<LittleEndian>()?;
                    let compressed = cursor.read_u64::<LittleEndian>()?;
                    if uncompressed_marked {
                        self.uncompressed_size = uncompressed;
                    }
                    if compressed_marked {
                        self.compressed_size = compressed;
                    }
                } else if uncompressed_marked && cursor.position() + 8 <= field_end {
                    // Short record written by some tools: only the uncompressed size
                    self.uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
            }

            cursor.set_position(field_end);
        }

        Ok(())
    }
}

/// Sizes recorded in a data descriptor trailing the entry data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}
