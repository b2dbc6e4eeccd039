use crate::error::{Error, Result};
use crate::partial_path;
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Name of the decompressed file for `url`: its last path segment without the `.gz` suffix.
pub fn file_name_for(url: &str) -> Result<String> {
    let bad_url = || Error::BadUrl(url.to_owned());
    let without_query = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    // with a scheme the first segment is the host, without one the whole string is a path
    let path = match without_query.find("://") {
        Some(i) => {
            let (_host, path) = without_query[i + 3..]
                .split_once('/')
                .ok_or_else(bad_url)?;
            path
        }
        None => without_query,
    };
    let last = path.rsplit('/').next().unwrap_or("");
    let name = last.strip_suffix(".gz").unwrap_or(last);
    if name.is_empty() {
        return Err(bad_url());
    }
    Ok(name.to_owned())
}

/// Decompress a gzip stream into `out`, returning the number of decompressed bytes.
pub fn gunzip<R: Read, W: Write>(compressed: R, out: &mut W) -> Result<u64> {
    let mut decoder = GzDecoder::new(compressed);
    Ok(io::copy(&mut decoder, out)?)
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::blocking::get(url)?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }
    let bar = match response.content_length() {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?,
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };
    let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    bar.wrap_read(response).read_to_end(&mut bytes)?;
    bar.finish_and_clear();
    Ok(bytes)
}

/// Fetch the gzip file at `url` and decompress it into `dest_dir`.
/// Returns the path of the decompressed file.
pub fn download_extract(url: &str, dest_dir: &Path, skip_existing: bool) -> Result<PathBuf> {
    let dest = dest_dir.join(file_name_for(url)?);
    if skip_existing && dest.exists() {
        info!("{} already exists", dest.display());
        return Ok(dest);
    }
    fs::create_dir_all(dest_dir)?;

    info!("downloading {}", url);
    let compressed = fetch(url)?;

    let n = extract_to(&compressed, &dest)?;
    info!(
        "extracted {} ({} -> {} bytes)",
        dest.display(),
        compressed.len(),
        n
    );
    Ok(dest)
}

/// Decompress `compressed` into `dest` through a partial file renamed on success.
/// Nothing is left at `dest` or next to it when decompression fails.
fn extract_to(compressed: &[u8], dest: &Path) -> Result<u64> {
    let partial = partial_path(dest);
    let extracted = File::create(&partial)
        .map_err(Error::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            let n = gunzip(compressed, &mut out)?;
            out.flush()?;
            Ok(n)
        });
    match extracted {
        Ok(n) => {
            fs::rename(&partial, dest)?;
            Ok(n)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}
