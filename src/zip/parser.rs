//! Sequential ZIP entry decoder.
//!
//! This module decodes entries one after another from any [`Read`]
//! implementation, without ever seeking.
//!
//! ## Parsing Strategy
//!
//! For every entry:
//! 1. Read the 4-byte signature; stop at the central directory or EOF
//! 2. Read the Local File Header, file name and extra field
//! 3. Decode the entry data fully into memory
//! 4. If the header announced a data descriptor, consume it and check the
//!    recorded sizes against what was decoded
//!
//! The cursor therefore always rests on the next entry boundary between
//! calls, and no byte of the stream is ever read twice.

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Bytes;
use flate2::bufread::DeflateDecoder;
use std::io::{self, BufReader, Read};

use super::ZipError;
use super::structures::*;

/// Upper bound on buffer preallocation, whatever a header claims.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// One fully decoded entry.
#[derive(Debug, Clone)]
pub struct StreamedEntry {
    /// Name exactly as stored in the archive.
    pub name: String,
    pub compression_method: CompressionMethod,
    /// Decompressed content.
    pub data: Bytes,
}

/// Forward-only cursor over the entries of a ZIP stream.
///
/// Owns the underlying reader. It is not `Clone`: there is
/// exactly one position in the stream.
pub struct EntryStream<R: Read> {
    inner: BufReader<R>,
    entries_read: u64,
}

impl<R: Read> EntryStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            entries_read: 0,
        }
    }

    /// Number of entries decoded so far.
    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    /// Decode the next entry.
    ///
    /// Returns `Ok(None)` once the entry section of the archive is over,
    /// either because the central directory starts or the stream ends
    /// cleanly on an entry boundary.
    pub fn next_entry(&mut self) -> Result<Option<StreamedEntry>, ZipError> {
        let Some(sig) = self.read_signature()? else {
            return Ok(None);
        };

        match Boundary::classify(sig) {
            Boundary::LocalFile => {}
            Boundary::End => return Ok(None),
            Boundary::Unknown(sig) => return Err(ZipError::InvalidSignature(sig)),
        }

        let mut fixed = [0u8; LocalFileHeader::FIXED_SIZE];
        self.inner
            .read_exact(&mut fixed)
            .map_err(truncated("local file header"))?;
        let mut header = LocalFileHeader::from_bytes(&fixed)?;

        let mut name_bytes = vec![0u8; header.file_name_length as usize];
        self.inner
            .read_exact(&mut name_bytes)
            .map_err(truncated("file name"))?;
        // Non-UTF8 (CP437) names are decoded lossily
        let name = String::from_utf8_lossy(&name_bytes).into_owned();

        let mut extra = vec![0u8; header.extra_field_length as usize];
        self.inner
            .read_exact(&mut extra)
            .map_err(truncated("extra field"))?;
        header.apply_extra_field(&extra)?;

        if header.is_encrypted() {
            return Err(ZipError::Encrypted(name));
        }

        let data = match header.compression_method {
            CompressionMethod::Stored => self.read_stored(&header, &name)?,
            CompressionMethod::Deflate => self.read_deflated(&header, &name)?,
            CompressionMethod::Unknown(method) => {
                return Err(ZipError::UnsupportedCompression { name, method });
            }
        };

        self.entries_read += 1;

        Ok(Some(StreamedEntry {
            name,
            compression_method: header.compression_method,
            data: Bytes::from(data),
        }))
    }

    /// Read a 4-byte signature, or `None` on a clean EOF.
    fn read_signature(&mut self) -> Result<Option<[u8; 4]>, ZipError> {
        let mut sig = [0u8; 4];
        let mut filled = 0;

        while filled < sig.len() {
            match self.inner.read(&mut sig[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(ZipError::Truncated("signature")),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Some(sig))
    }

    fn read_stored(&mut self, header: &LocalFileHeader, name: &str) -> Result<Vec<u8>, ZipError> {
        if header.has_data_descriptor() && header.compressed_size == 0 {
            // Without a length there is no way to find the end of stored data
            return Err(ZipError::UnknownLength(name.to_string()));
        }

        let expected = header.compressed_size;
        let mut data = Vec::with_capacity(expected.min(MAX_PREALLOC) as usize);
        (&mut self.inner).take(expected).read_to_end(&mut data)?;
        if (data.len() as u64) < expected {
            return Err(ZipError::Truncated("entry data"));
        }

        if header.has_data_descriptor() {
            let descriptor = self.read_data_descriptor(header.zip64)?;
            check_size(name, "compressed", descriptor.compressed_size, expected)?;
            check_size(name, "uncompressed", descriptor.uncompressed_size, expected)?;
        } else {
            check_size(name, "uncompressed", header.uncompressed_size, expected)?;
        }

        Ok(data)
    }

    fn read_deflated(
        &mut self,
        header: &LocalFileHeader,
        name: &str,
    ) -> Result<Vec<u8>, ZipError> {
        if header.has_data_descriptor() {
            // The deflate stream is self-terminating; the buffered decoder
            // only consumes what it needs from `inner`.
            let mut decoder = DeflateDecoder::new(&mut self.inner);
            let mut data = Vec::new();
            decoder.read_to_end(&mut data).map_err(|source| ZipError::Inflate {
                name: name.to_string(),
                source,
            })?;
            let consumed = decoder.total_in();
            drop(decoder);

            let descriptor = self.read_data_descriptor(header.zip64)?;
            check_size(name, "compressed", descriptor.compressed_size, consumed)?;
            check_size(
                name,
                "uncompressed",
                descriptor.uncompressed_size,
                data.len() as u64,
            )?;
            return Ok(data);
        }

        let mut window = (&mut self.inner).take(header.compressed_size);
        let mut data = Vec::with_capacity(header.uncompressed_size.min(MAX_PREALLOC) as usize);
        {
            let mut decoder = DeflateDecoder::new(&mut window);
            decoder.read_to_end(&mut data).map_err(|source| ZipError::Inflate {
                name: name.to_string(),
                source,
            })?;
        }

        // Skip whatever the compressor left after the end of the deflate
        // stream so the cursor lands on the next header
        io::copy(&mut window, &mut io::sink())?;
        if window.limit() > 0 {
            return Err(ZipError::Truncated("entry data"));
        }

        check_size(name, "uncompressed", header.uncompressed_size, data.len() as u64)?;
        Ok(data)
    }

    fn read_data_descriptor(&mut self, zip64: bool) -> Result<DataDescriptor, ZipError> {
        let mut first = [0u8; 4];
        self.inner
            .read_exact(&mut first)
            .map_err(truncated("data descriptor"))?;

        // The signature is optional; without it the first word is the CRC
        let crc32 = if first == DATA_DESCRIPTOR_SIGNATURE {
            self.inner
                .read_u32::<LittleEndian>()
                .map_err(truncated("data descriptor"))?
        } else {
            u32::from_le_bytes(first)
        };

        let (compressed_size, uncompressed_size) = if zip64 {
            (
                self.inner
                    .read_u64::<LittleEndian>()
                    .map_err(truncated("data descriptor"))?,
                self.inner
                    .read_u64::<LittleEndian>()
                    .map_err(truncated("data descriptor"))?,
            )
        } else {
            (
                self.inner
                    .read_u32::<LittleEndian>()
                    .map_err(truncated("data descriptor"))? as u64,
                self.inner
                    .read_u32::<LittleEndian>()
                    .map_err(truncated("data descriptor"))? as u64,
            )
        };

        Ok(DataDescriptor {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }
}

impl<R: Read> Iterator for EntryStream<R> {
    type Item = Result<StreamedEntry, ZipError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

fn truncated(what: &'static str) -> impl Fn(io::Error) -> ZipError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ZipError::Truncated(what)
        } else {
            ZipError::Io(e)
        }
    }
}

fn check_size(name: &str, what: &'static str, expected: u64, actual: u64) -> Result<(), ZipError> {
    if expected != actual {
        return Err(ZipError::SizeMismatch {
            name: name.to_string(),
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::build_zip;
    use byteorder::WriteBytesExt;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn local_header(
        name: &str,
        method: u16,
        flags: u16,
        sizes: (u32, u32),
        extra: &[u8],
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&LFH_SIGNATURE);
        buf.write_u16::<LittleEndian>(20).unwrap();
        buf.write_u16::<LittleEndian>(flags).unwrap();
        buf.write_u16::<LittleEndian>(method).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap(); // time + date
        buf.write_u32::<LittleEndian>(0).unwrap(); // crc
        buf.write_u32::<LittleEndian>(sizes.0).unwrap();
        buf.write_u32::<LittleEndian>(sizes.1).unwrap();
        buf.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        buf.write_u16::<LittleEndian>(extra.len() as u16).unwrap();
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(extra);
        buf
    }

    fn descriptor(buf: &mut Vec<u8>, with_signature: bool, zip64: bool, sizes: (u64, u64)) {
        if with_signature {
            buf.extend_from_slice(&DATA_DESCRIPTOR_SIGNATURE);
        }
        buf.write_u32::<LittleEndian>(0x1234_5678).unwrap();
        if zip64 {
            buf.write_u64::<LittleEndian>(sizes.0).unwrap();
            buf.write_u64::<LittleEndian>(sizes.1).unwrap();
        } else {
            buf.write_u32::<LittleEndian>(sizes.0 as u32).unwrap();
            buf.write_u32::<LittleEndian>(sizes.1 as u32).unwrap();
        }
    }

    /// Hand-assembled streamed entry: sizes are zero in the header and
    /// follow the data in a descriptor.
    fn streamed_entry(name: &str, data: &[u8], with_signature: bool) -> Vec<u8> {
        let compressed = deflate(data);
        let mut buf = local_header(name, 8, FLAG_DATA_DESCRIPTOR, (0, 0), &[]);
        buf.extend_from_slice(&compressed);
        let sizes = (compressed.len() as u64, data.len() as u64);
        descriptor(&mut buf, with_signature, false, sizes);
        buf
    }

    /// Payload that deflates to a few hundred bytes.
    fn noisy(len: u32) -> Vec<u8> {
        (0..len).map(|i| (i.wrapping_mul(7919) % 251) as u8).collect()
    }

    fn names<R: Read>(stream: EntryStream<R>) -> Vec<String> {
        stream.map(|e| e.unwrap().name).collect()
    }

    #[test]
    fn reads_entries_in_stream_order() {
        let archive = build_zip(&[
            ("a.txt", b"alpha", ::zip::CompressionMethod::Stored),
            ("dir/b.txt", b"bravo bravo bravo", ::zip::CompressionMethod::Deflated),
            ("c.bin", &[0u8; 4096], ::zip::CompressionMethod::Deflated),
        ]);

        let mut stream = EntryStream::new(Cursor::new(archive));
        let a = stream.next_entry().unwrap().unwrap();
        assert_eq!(a.name, "a.txt");
        assert_eq!(a.compression_method, CompressionMethod::Stored);
        assert_eq!(&a.data[..], b"alpha");

        let b = stream.next_entry().unwrap().unwrap();
        assert_eq!(b.name, "dir/b.txt");
        assert_eq!(b.compression_method, CompressionMethod::Deflate);
        assert_eq!(&b.data[..], b"bravo bravo bravo");

        let c = stream.next_entry().unwrap().unwrap();
        assert_eq!(c.data.len(), 4096);

        // central directory follows
        assert!(stream.next_entry().unwrap().is_none());
        assert_eq!(stream.entries_read(), 3);
    }

    #[test]
    fn empty_stream_has_no_entries() {
        let mut stream = EntryStream::new(io::empty());
        assert!(stream.next_entry().unwrap().is_none());
    }

    #[test]
    fn data_descriptor_entries_are_consumed_exactly() {
        let mut archive = streamed_entry("first.txt", b"streamed content, no sizes", true);
        archive.extend(streamed_entry("second.txt", b"second one", false));

        let mut stream = EntryStream::new(Cursor::new(archive));
        let first = stream.next_entry().unwrap().unwrap();
        assert_eq!(&first.data[..], b"streamed content, no sizes");
        let second = stream.next_entry().unwrap().unwrap();
        assert_eq!(second.name, "second.txt");
        assert_eq!(&second.data[..], b"second one");
        assert!(stream.next_entry().unwrap().is_none());
    }

    #[test]
    fn truncated_entry_is_an_error() {
        let archive = build_zip(&[("big.txt", &[7u8; 1000], ::zip::CompressionMethod::Stored)]);
        let cut = archive[..200].to_vec();

        let mut stream = EntryStream::new(Cursor::new(cut));
        let err = stream.next_entry().unwrap_err();
        assert!(matches!(err, ZipError::Truncated(_)), "{err:?}");
    }

    #[test]
    fn truncated_descriptor_is_an_error() {
        let mut archive = streamed_entry("x.txt", b"payload", true);
        archive.truncate(archive.len() - 3);

        let mut stream = EntryStream::new(Cursor::new(archive));
        let err = stream.next_entry().unwrap_err();
        assert!(matches!(err, ZipError::Truncated("data descriptor")), "{err:?}");
    }

    #[test]
    fn garbage_signature_is_rejected() {
        let mut stream = EntryStream::new(Cursor::new(b"NOPE and more".to_vec()));
        let err = stream.next_entry().unwrap_err();
        assert!(matches!(err, ZipError::InvalidSignature(_)), "{err:?}");
    }

    #[test]
    fn encrypted_entries_are_rejected() {
        let mut archive = build_zip(&[("secret", b"hidden", ::zip::CompressionMethod::Stored)]);
        // flags live right after the version field
        archive[6] |= FLAG_ENCRYPTED as u8;

        let mut stream = EntryStream::new(Cursor::new(archive));
        let err = stream.next_entry().unwrap_err();
        assert!(matches!(err, ZipError::Encrypted(ref n) if n == "secret"), "{err:?}");
    }

    #[test]
    fn unsupported_method_is_rejected() {
        let mut archive = build_zip(&[("x", b"data", ::zip::CompressionMethod::Stored)]);
        archive[8] = 12; // bzip2

        let mut stream = EntryStream::new(Cursor::new(archive));
        let err = stream.next_entry().unwrap_err();
        assert!(
            matches!(err, ZipError::UnsupportedCompression { method: 12, .. }),
            "{err:?}"
        );
    }

    #[test]
    fn iterator_yields_all_names() {
        let archive = build_zip(&[
            ("one", b"1", ::zip::CompressionMethod::Stored),
            ("two", b"2", ::zip::CompressionMethod::Deflated),
        ]);
        assert_eq!(names(EntryStream::new(Cursor::new(archive))), vec!["one", "two"]);
    }

    #[test]
    fn zip64_data_descriptor_has_wide_sizes() {
        let data = b"zip64 streamed payload".as_slice();
        let compressed = deflate(data);

        let mut extra = Vec::new();
        extra.write_u16::<LittleEndian>(ZIP64_EXTRA_ID).unwrap();
        extra.write_u16::<LittleEndian>(16).unwrap();
        extra.write_u64::<LittleEndian>(0).unwrap();
        extra.write_u64::<LittleEndian>(0).unwrap();

        let mut archive = local_header("big.bin", 8, FLAG_DATA_DESCRIPTOR, (0, 0), &extra);
        archive.extend_from_slice(&compressed);
        descriptor(&mut archive, true, true, (compressed.len() as u64, data.len() as u64));
        archive.extend(local_header("next", 0, 0, (2, 2), &[]));
        archive.extend_from_slice(b"ok");

        let mut stream = EntryStream::new(Cursor::new(archive));
        let first = stream.next_entry().unwrap().unwrap();
        assert_eq!(&first.data[..], data);
        // the cursor landed exactly on the next header
        let next = stream.next_entry().unwrap().unwrap();
        assert_eq!(next.name, "next");
        assert_eq!(&next.data[..], b"ok");
        assert!(stream.next_entry().unwrap().is_none());
    }

    #[test]
    fn stored_entry_without_length_is_rejected() {
        let mut archive = local_header("raw", 0, FLAG_DATA_DESCRIPTOR, (0, 0), &[]);
        archive.extend_from_slice(b"some stored bytes");

        let mut stream = EntryStream::new(Cursor::new(archive));
        let err = stream.next_entry().unwrap_err();
        assert!(matches!(err, ZipError::UnknownLength(ref n) if n == "raw"), "{err:?}");
    }

    #[test]
    fn descriptor_size_mismatch_is_an_error() {
        let data = b"the real content";
        let compressed = deflate(data);
        let mut archive = local_header("x", 8, FLAG_DATA_DESCRIPTOR, (0, 0), &[]);
        archive.extend_from_slice(&compressed);
        descriptor(&mut archive, true, false, (compressed.len() as u64, 99));

        let mut stream = EntryStream::new(Cursor::new(archive));
        let err = stream.next_entry().unwrap_err();
        assert!(
            matches!(
                err,
                ZipError::SizeMismatch { what: "uncompressed", expected: 99, actual, .. }
                    if actual == data.len() as u64
            ),
            "{err:?}"
        );
    }

    #[test]
    fn header_size_mismatch_is_an_error() {
        // stored: 4 bytes of data but the header claims 5 uncompressed
        let mut archive = local_header("s", 0, 0, (4, 5), &[]);
        archive.extend_from_slice(b"abcd");

        let mut stream = EntryStream::new(Cursor::new(archive));
        let err = stream.next_entry().unwrap_err();
        assert!(
            matches!(err, ZipError::SizeMismatch { expected: 5, actual: 4, .. }),
            "{err:?}"
        );
    }

    #[test]
    fn truncated_deflate_entry_is_an_error() {
        let data = noisy(4000);
        let compressed = deflate(&data);
        let sizes = (compressed.len() as u32, data.len() as u32);
        let mut archive = local_header("cut.bin", 8, 0, sizes, &[]);
        archive.extend_from_slice(&compressed[..compressed.len() / 2]);

        let mut stream = EntryStream::new(Cursor::new(archive));
        let err = stream.next_entry().unwrap_err();
        assert!(matches!(err, ZipError::Truncated("entry data")), "{err:?}");
    }
}
