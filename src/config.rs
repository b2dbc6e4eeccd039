use crate::convert::{ConvertOptions, DEFAULT_BLOCK_RECORDS};
use crate::error::Result;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://yann.lecun.com/exdb/mnist/";

/// One dataset partition: two decompressed IDX files and the CSV made from them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Split {
    pub name: String,
    pub images: String,
    pub labels: String,
    pub output: String,
    pub count: usize,
}

impl Split {
    pub fn train() -> Self {
        Split {
            name: "train".to_owned(),
            images: "train-images-idx3-ubyte".to_owned(),
            labels: "train-labels-idx1-ubyte".to_owned(),
            output: "mnist_train.csv".to_owned(),
            count: 60_000,
        }
    }
    pub fn test() -> Self {
        Split {
            name: "test".to_owned(),
            images: "t10k-images-idx3-ubyte".to_owned(),
            labels: "t10k-labels-idx1-ubyte".to_owned(),
            output: "mnist_test.csv".to_owned(),
            count: 10_000,
        }
    }
    /// The gzip URLs of the image and label files.
    pub fn urls(&self, base_url: &str) -> [String; 2] {
        let base = base_url.trim_end_matches('/');
        [
            format!("{}/{}.gz", base, self.images),
            format!("{}/{}.gz", base, self.labels),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPaths {
    pub images: PathBuf,
    pub labels: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base_url: String,
    /// where the IDX files are downloaded to and read from
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
    pub skip_existing: bool,
    pub validate_headers: bool,
    /// 0: one per physical core
    pub threads: usize,
    pub block_records: usize,
    pub splits: Vec<Split>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_owned(),
            data_dir: PathBuf::from("."),
            out_dir: PathBuf::from("."),
            skip_existing: true,
            validate_headers: true,
            threads: 0,
            block_records: DEFAULT_BLOCK_RECORDS,
            splits: vec![Split::train(), Split::test()],
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
    pub fn from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            validate_headers: self.validate_headers,
            block_records: self.block_records,
        }
    }
    pub fn paths(&self, split: &Split) -> SplitPaths {
        SplitPaths {
            images: self.data_dir.join(&split.images),
            labels: self.data_dir.join(&split.labels),
            output: self.out_dir.join(&split.output),
        }
    }
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get_physical()
        } else {
            self.threads
        }
    }
    /// Size the global rayon pool used to format records. Can only be done once per process.
    pub fn build_thread_pool(&self) -> Result<()> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads())
            .build_global()?;
        Ok(())
    }
}
