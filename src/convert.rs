use crate::error::{Result, Stream};
use crate::idx::{
    read_records, skip_header, ImageHeader, LabelHeader, IMAGE_HEADER_LEN, LABEL_HEADER_LEN,
    PIXELS,
};
use crate::partial_path;
use crate::record::{push_csv_line, MAX_LINE_LEN};
use log::{debug, info};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

pub const DEFAULT_BLOCK_RECORDS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Check magic numbers, image size and declared counts instead of skipping the headers blind.
    pub validate_headers: bool,
    /// Records read and formatted per block.
    pub block_records: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            validate_headers: true,
            block_records: DEFAULT_BLOCK_RECORDS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConvertStats {
    pub records: usize,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

/// Format one block of records as CSV lines, in input order.
/// `pixels` must hold `labels.len()` images.
pub fn format_block(labels: &[u8], pixels: &[u8]) -> Vec<u8> {
    debug_assert_eq!(labels.len() * PIXELS, pixels.len());
    let lines: Vec<Vec<u8>> = labels
        .par_iter()
        .zip(pixels.par_chunks(PIXELS))
        .map(|(&label, image)| {
            let mut line = Vec::with_capacity(MAX_LINE_LEN);
            push_csv_line(label, image, &mut line);
            line
        })
        .collect();
    lines.concat()
}

/// Read `n` records from the image and label streams in lock step and write them to `out` as CSV.
/// Earlier blocks have already been written when a short stream is detected.
pub fn convert<I: Read, L: Read, W: Write>(
    images: &mut I,
    labels: &mut L,
    out: &mut W,
    n: usize,
    opts: &ConvertOptions,
) -> Result<ConvertStats> {
    let start = Instant::now();
    if opts.validate_headers {
        ImageHeader::read(images)?.validate(n)?;
        LabelHeader::read(labels)?.validate(n)?;
    } else {
        skip_header(images, IMAGE_HEADER_LEN, Stream::Images)?;
        skip_header(labels, LABEL_HEADER_LEN, Stream::Labels)?;
    }

    let block = opts.block_records.max(1).min(n.max(1));
    let mut label_buf = vec![0u8; block];
    let mut image_buf = vec![0u8; block * PIXELS];
    let mut bytes_written = 0u64;
    let mut done = 0;
    while done < n {
        let len = block.min(n - done);
        read_records(labels, &mut label_buf[..len], 1, done, Stream::Labels)?;
        read_records(
            images,
            &mut image_buf[..len * PIXELS],
            PIXELS,
            done,
            Stream::Images,
        )?;
        let text = format_block(&label_buf[..len], &image_buf[..len * PIXELS]);
        out.write_all(&text)?;
        bytes_written += text.len() as u64;
        done += len;
        debug!("{}/{} records", done, n);
    }
    out.flush()?;

    Ok(ConvertStats {
        records: n,
        bytes_written,
        elapsed: start.elapsed(),
    })
}

fn convert_into(
    images: &Path,
    labels: &Path,
    output: &Path,
    n: usize,
    opts: &ConvertOptions,
) -> Result<ConvertStats> {
    let mut image_file = BufReader::new(File::open(images)?);
    let mut label_file = BufReader::new(File::open(labels)?);
    let mut out = BufWriter::new(File::create(output)?);
    let stats = convert(&mut image_file, &mut label_file, &mut out, n, opts)?;
    out.into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()?;
    Ok(stats)
}

/// Convert a pair of IDX files into `output`.
/// The CSV is written next to `output` and only moved into place once complete,
/// so a failed conversion leaves nothing at `output`.
pub fn convert_files(
    images: &Path,
    labels: &Path,
    output: &Path,
    n: usize,
    opts: &ConvertOptions,
) -> Result<ConvertStats> {
    info!(
        "converting {} + {} -> {} ({} records)",
        images.display(),
        labels.display(),
        output.display(),
        n
    );
    let partial = partial_path(output);
    match convert_into(images, labels, &partial, n, opts) {
        Ok(stats) => {
            fs::rename(&partial, output)?;
            info!(
                "wrote {} records ({} bytes) to {} in {:?}",
                stats.records,
                stats.bytes_written,
                output.display(),
                stats.elapsed
            );
            Ok(stats)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::record::Record;
    use rand::{Rng, SeedableRng};
    use rand_hc::Hc128Rng;
    use std::env;
    use std::path::PathBuf;
    use std::process;

    fn idx_streams(labels: &[u8], pixels: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut image_bytes = vec![];
        ImageHeader::new(labels.len() as u32)
            .write(&mut image_bytes)
            .unwrap();
        image_bytes.extend_from_slice(pixels);
        let mut label_bytes = vec![];
        LabelHeader::new(labels.len() as u32)
            .write(&mut label_bytes)
            .unwrap();
        label_bytes.extend_from_slice(labels);
        (image_bytes, label_bytes)
    }

    fn rand_streams(seed: u64, n: usize) -> (Vec<u8>, Vec<u8>) {
        let mut rng = Hc128Rng::seed_from_u64(seed);
        let labels: Vec<u8> = (0..n).map(|_| rng.gen_range(0..10)).collect();
        let mut pixels = vec![0u8; n * PIXELS];
        rng.fill(&mut pixels[..]);
        idx_streams(&labels, &pixels)
    }

    fn convert_bytes(
        images: &[u8],
        labels: &[u8],
        n: usize,
        opts: &ConvertOptions,
    ) -> Result<String> {
        let mut out = vec![];
        convert(&mut &images[..], &mut &labels[..], &mut out, n, opts)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("mnist_csv_{}_{}", name, process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn first_record_of_zeros() {
        let mut pixels = vec![0u8; 2 * PIXELS];
        pixels[PIXELS] = 9;
        let (images, labels) = idx_streams(&[5, 7], &pixels);
        let text = convert_bytes(&images, &labels, 2, &ConvertOptions::default()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("5{}", ",0".repeat(PIXELS)));
        assert!(lines[1].starts_with("7,9,0,"));
    }

    #[test]
    fn lines_and_fields() {
        let (images, labels) = rand_streams(0, 37);
        let text = convert_bytes(&images, &labels, 37, &ConvertOptions::default()).unwrap();
        assert!(text.ends_with('\n'));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 37);
        for line in lines {
            let fields: Vec<u32> = line.split(',').map(|f| f.parse().unwrap()).collect();
            assert_eq!(fields.len(), PIXELS + 1);
            assert!(fields.iter().all(|&f| f <= 255));
        }
    }

    #[test]
    fn records_follow_stream_offsets() {
        let n = 12;
        let (images, labels) = rand_streams(1, n);
        let text = convert_bytes(&images, &labels, n, &ConvertOptions::default()).unwrap();
        for (i, line) in text.lines().enumerate() {
            let record = Record::from_csv_line(line, i).unwrap();
            assert_eq!(record.label, labels[LABEL_HEADER_LEN + i]);
            let start = IMAGE_HEADER_LEN + PIXELS * i;
            assert_eq!(&record.pixels[..], &images[start..start + PIXELS]);
        }
    }

    #[test]
    fn fewer_records_than_available() {
        let (images, labels) = rand_streams(2, 10);
        let text = convert_bytes(&images, &labels, 4, &ConvertOptions::default()).unwrap();
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn block_size_does_not_change_output() {
        let (images, labels) = rand_streams(3, 23);
        let whole = convert_bytes(&images, &labels, 23, &ConvertOptions::default()).unwrap();
        for &block_records in &[0, 1, 4, 7, 23, 100] {
            let opts = ConvertOptions {
                block_records,
                ..ConvertOptions::default()
            };
            assert_eq!(
                convert_bytes(&images, &labels, 23, &opts).unwrap(),
                whole,
                "block {}",
                block_records
            );
        }
    }

    #[test]
    fn zero_records() {
        let (images, labels) = idx_streams(&[], &[]);
        let text = convert_bytes(&images, &labels, 0, &ConvertOptions::default()).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn zero_records_still_need_headers() {
        let unchecked = ConvertOptions {
            validate_headers: false,
            ..ConvertOptions::default()
        };
        for opts in &[ConvertOptions::default(), unchecked] {
            assert!(matches!(
                convert_bytes(&[], &[], 0, opts),
                Err(Error::TruncatedHeader {
                    stream: Stream::Images
                })
            ));
            let (images, _) = idx_streams(&[], &[]);
            assert!(matches!(
                convert_bytes(&images, &[0u8; 3], 0, opts),
                Err(Error::TruncatedHeader {
                    stream: Stream::Labels
                })
            ));
        }
    }

    #[test]
    fn short_label_stream() {
        let (images, mut labels) = rand_streams(4, 10);
        labels.truncate(LABEL_HEADER_LEN + 6);
        let opts = ConvertOptions {
            validate_headers: false,
            block_records: 4,
        };
        match convert_bytes(&images, &labels, 10, &opts) {
            Err(Error::UnexpectedEof {
                stream: Stream::Labels,
                record: 6,
            }) => {}
            other => panic!("unexpected {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn short_image_stream() {
        let (mut images, labels) = rand_streams(5, 3);
        images.truncate(IMAGE_HEADER_LEN + 2 * PIXELS + 100);
        let opts = ConvertOptions {
            validate_headers: false,
            ..ConvertOptions::default()
        };
        assert!(matches!(
            convert_bytes(&images, &labels, 3, &opts),
            Err(Error::UnexpectedEof {
                stream: Stream::Images,
                record: 2
            })
        ));
    }

    #[test]
    fn headers_are_ignored_without_validation() {
        let (mut images, mut labels) = rand_streams(6, 3);
        images[..IMAGE_HEADER_LEN].iter_mut().for_each(|b| *b = 0xff);
        labels[..LABEL_HEADER_LEN].iter_mut().for_each(|b| *b = 0);
        let checked = convert_bytes(&images, &labels, 3, &ConvertOptions::default());
        assert!(matches!(checked, Err(Error::BadMagic { .. })));

        let opts = ConvertOptions {
            validate_headers: false,
            ..ConvertOptions::default()
        };
        let text = convert_bytes(&images, &labels, 3, &opts).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn declared_count_is_checked() {
        let (images, labels) = rand_streams(7, 3);
        assert!(matches!(
            convert_bytes(&images, &labels, 4, &ConvertOptions::default()),
            Err(Error::CountTooSmall {
                stream: Stream::Images,
                declared: 3,
                requested: 4
            })
        ));
    }

    #[test]
    fn files_round_trip() {
        let dir = scratch_dir("files_round_trip");
        let (images, labels) = rand_streams(8, 30);
        let image_path = dir.join("images-idx3-ubyte");
        let label_path = dir.join("labels-idx1-ubyte");
        let output = dir.join("out.csv");
        fs::write(&image_path, &images).unwrap();
        fs::write(&label_path, &labels).unwrap();

        let stats = convert_files(
            &image_path,
            &label_path,
            &output,
            30,
            &ConvertOptions::default(),
        )
        .unwrap();
        assert_eq!(stats.records, 30);
        let text = fs::read(&output).unwrap();
        assert_eq!(stats.bytes_written, text.len() as u64);
        assert!(!partial_path(&output).exists());
        let records = crate::record::read_csv(&text[..]).unwrap();
        assert_eq!(records.len(), 30);
        assert_eq!(records[29].label, labels[LABEL_HEADER_LEN + 29]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_conversion_leaves_no_output() {
        let dir = scratch_dir("failed_conversion");
        let (images, mut labels) = rand_streams(9, 5);
        labels.truncate(LABEL_HEADER_LEN + 2);
        let image_path = dir.join("images-idx3-ubyte");
        let label_path = dir.join("labels-idx1-ubyte");
        let output = dir.join("out.csv");
        fs::write(&image_path, &images).unwrap();
        fs::write(&label_path, &labels).unwrap();

        let opts = ConvertOptions {
            validate_headers: false,
            block_records: 1,
        };
        let result = convert_files(&image_path, &label_path, &output, 5, &opts);
        assert!(matches!(
            result,
            Err(Error::UnexpectedEof {
                stream: Stream::Labels,
                record: 2
            })
        ));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_input_file() {
        let dir = scratch_dir("missing_input");
        let output = dir.join("out.csv");
        let result = convert_files(
            &dir.join("nope"),
            &dir.join("nope either"),
            &output,
            1,
            &ConvertOptions::default(),
        );
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!output.exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
