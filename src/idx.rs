use crate::error::{Error, Result, Stream};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const ROWS: usize = 28;
pub const COLS: usize = 28;
pub const PIXELS: usize = ROWS * COLS;

pub const IMAGE_HEADER_LEN: usize = 16;
pub const LABEL_HEADER_LEN: usize = 8;

/// unsigned byte, 3 dimensions
pub const IMAGE_MAGIC: u32 = 0x0000_0803;
/// unsigned byte, 1 dimension
pub const LABEL_MAGIC: u32 = 0x0000_0801;

fn read_header<R: Read>(reader: &mut R, header: &mut [u8], stream: Stream) -> Result<()> {
    reader.read_exact(header).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::TruncatedHeader { stream }
        } else {
            Error::Io(e)
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub magic: u32,
    pub count: u32,
    pub rows: u32,
    pub cols: u32,
}

impl ImageHeader {
    pub fn new(count: u32) -> Self {
        ImageHeader {
            magic: IMAGE_MAGIC,
            count,
            rows: ROWS as u32,
            cols: COLS as u32,
        }
    }
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; IMAGE_HEADER_LEN];
        read_header(reader, &mut header, Stream::Images)?;
        let mut fields = &header[..];
        Ok(ImageHeader {
            magic: fields.read_u32::<BigEndian>()?,
            count: fields.read_u32::<BigEndian>()?,
            rows: fields.read_u32::<BigEndian>()?,
            cols: fields.read_u32::<BigEndian>()?,
        })
    }
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<BigEndian>(self.magic)?;
        writer.write_u32::<BigEndian>(self.count)?;
        writer.write_u32::<BigEndian>(self.rows)?;
        writer.write_u32::<BigEndian>(self.cols)
    }
    /// Check that the file holds 28x28 unsigned byte images and declares at least `n` of them.
    pub fn validate(&self, n: usize) -> Result<()> {
        if self.magic != IMAGE_MAGIC {
            return Err(Error::BadMagic {
                stream: Stream::Images,
                expected: IMAGE_MAGIC,
                found: self.magic,
            });
        }
        if self.rows as usize != ROWS || self.cols as usize != COLS {
            return Err(Error::BadDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if (self.count as usize) < n {
            return Err(Error::CountTooSmall {
                stream: Stream::Images,
                declared: self.count,
                requested: n,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelHeader {
    pub magic: u32,
    pub count: u32,
}

impl LabelHeader {
    pub fn new(count: u32) -> Self {
        LabelHeader {
            magic: LABEL_MAGIC,
            count,
        }
    }
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; LABEL_HEADER_LEN];
        read_header(reader, &mut header, Stream::Labels)?;
        let mut fields = &header[..];
        Ok(LabelHeader {
            magic: fields.read_u32::<BigEndian>()?,
            count: fields.read_u32::<BigEndian>()?,
        })
    }
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<BigEndian>(self.magic)?;
        writer.write_u32::<BigEndian>(self.count)
    }
    pub fn validate(&self, n: usize) -> Result<()> {
        if self.magic != LABEL_MAGIC {
            return Err(Error::BadMagic {
                stream: Stream::Labels,
                expected: LABEL_MAGIC,
                found: self.magic,
            });
        }
        if (self.count as usize) < n {
            return Err(Error::CountTooSmall {
                stream: Stream::Labels,
                declared: self.count,
                requested: n,
            });
        }
        Ok(())
    }
}

/// Consume a header of `len` bytes without looking at it.
pub fn skip_header<R: Read>(reader: &mut R, len: usize, stream: Stream) -> Result<()> {
    let skipped = io::copy(&mut reader.take(len as u64), &mut io::sink())?;
    if skipped < len as u64 {
        return Err(Error::TruncatedHeader { stream });
    }
    Ok(())
}

/// Fill `buf` with whole records of `record_len` bytes.
/// `first` is the index of the first record in `buf`, so that a short stream reports the record it broke off in.
pub fn read_records<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    record_len: usize,
    first: usize,
    stream: Stream,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Error::UnexpectedEof {
                    stream,
                    record: first + filled / record_len,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
