use crate::error::{Error, Result};
use crate::idx::{COLS, PIXELS, ROWS};
use csv::{ReaderBuilder, StringRecord};
use image::{GrayImage, ImageBuffer, Luma};
use std::io::{self, Read, Write};

/// Upper bound of a formatted line: 785 fields of at most 3 digits, each followed by ',' or '\n'.
pub const MAX_LINE_LEN: usize = (PIXELS + 1) * 4;

/// One labeled image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub label: u8,
    pub pixels: [u8; PIXELS],
}

fn push_u8(x: u8, out: &mut Vec<u8>) {
    if x >= 100 {
        out.push(b'0' + x / 100);
    }
    if x >= 10 {
        out.push(b'0' + (x / 10) % 10);
    }
    out.push(b'0' + x % 10);
}

/// Append `label,p0,...,p783\n` to `out`.
pub fn push_csv_line(label: u8, pixels: &[u8], out: &mut Vec<u8>) {
    push_u8(label, out);
    for &pixel in pixels {
        out.push(b',');
        push_u8(pixel, out);
    }
    out.push(b'\n');
}

fn parse_field(field: &str, line: usize) -> Result<u8> {
    let canonical = !field.is_empty()
        && field.bytes().all(|b| b.is_ascii_digit())
        && !(field.len() > 1 && field.starts_with('0'));
    if !canonical {
        return Err(Error::Parse {
            line,
            reason: format!("{:?} is not a decimal byte", field),
        });
    }
    field.parse::<u8>().map_err(|_| Error::Parse {
        line,
        reason: format!("{} is out of range", field),
    })
}

impl Record {
    pub fn new(label: u8, pixels: [u8; PIXELS]) -> Self {
        Record { label, pixels }
    }
    pub fn write_csv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut line = Vec::with_capacity(MAX_LINE_LEN);
        push_csv_line(self.label, &self.pixels, &mut line);
        out.write_all(&line)
    }
    pub fn to_csv_line(&self) -> String {
        let mut line = Vec::with_capacity(MAX_LINE_LEN);
        push_csv_line(self.label, &self.pixels, &mut line);
        // only ascii digits, commas and a newline were pushed
        String::from_utf8_lossy(&line).into_owned()
    }
    /// Check a parsed CSV row: a label and 784 pixels, all canonical decimal bytes.
    /// `line` is only used in error messages.
    pub fn from_string_record(row: &StringRecord, line: usize) -> Result<Self> {
        if row.len() != PIXELS + 1 {
            return Err(Error::Parse {
                line,
                reason: format!("{} fields, expected {}", row.len(), PIXELS + 1),
            });
        }
        let label = parse_field(&row[0], line)?;
        let mut pixels = [0u8; PIXELS];
        for (pixel, field) in pixels.iter_mut().zip(row.iter().skip(1)) {
            *pixel = parse_field(field, line)?;
        }
        Ok(Record { label, pixels })
    }
    /// Parse one line as produced by `to_csv_line`.
    /// Fields must be canonical decimals so that re-serializing gives back the same text.
    pub fn from_csv_line(text: &str, line: usize) -> Result<Self> {
        let mut row = StringRecord::new();
        if !csv_reader(text.as_bytes()).read_record(&mut row)? {
            return Err(Error::Parse {
                line,
                reason: "empty line".to_owned(),
            });
        }
        Record::from_string_record(&row, line)
    }
    pub fn to_image(&self) -> GrayImage {
        ImageBuffer::from_fn(COLS as u32, ROWS as u32, |x, y| {
            Luma([self.pixels[y as usize * COLS + x as usize]])
        })
    }
}

/// Headerless, unquoted rows of varying length; the field count is checked per record.
fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader)
}

fn line_of(row: &StringRecord, fallback: usize) -> usize {
    row.position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback)
}

/// Read every record of a CSV file. Blank lines are skipped.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Record>> {
    csv_reader(reader)
        .records()
        .enumerate()
        .map(|(i, row)| {
            let row = row?;
            Record::from_string_record(&row, line_of(&row, i + 1))
        })
        .collect()
}

/// Parse only the record at `index`, skipping over the rows before it.
pub fn read_record_at<R: Read>(reader: R, index: usize) -> Result<Record> {
    let mut records = 0;
    for row in csv_reader(reader).records() {
        let row = row?;
        if records == index {
            return Record::from_string_record(&row, line_of(&row, index + 1));
        }
        records += 1;
    }
    Err(Error::NoSuchRecord { index, records })
}
