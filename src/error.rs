use std::fmt;
use std::io;
use thiserror::Error;

/// One of the two input streams of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Images,
    Labels,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stream::Images => write!(f, "image"),
            Stream::Labels => write!(f, "label"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GET {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("can't derive a file name from url {0:?}")]
    BadUrl(String),
    #[error("{stream} stream is shorter than its header")]
    TruncatedHeader { stream: Stream },
    #[error("{stream} stream ended before record {record} was complete")]
    UnexpectedEof { stream: Stream, record: usize },
    #[error("{stream} header has magic {found:#010x}, expected {expected:#010x}")]
    BadMagic {
        stream: Stream,
        expected: u32,
        found: u32,
    },
    #[error("images are {rows}x{cols}, expected 28x28")]
    BadDimensions { rows: u32, cols: u32 },
    #[error("{stream} header declares {declared} items but {requested} were requested")]
    CountTooSmall {
        stream: Stream,
        declared: u32,
        requested: usize,
    },
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("no record {index}, the file has {records}")]
    NoSuchRecord { index: usize, records: usize },
    #[error("bad config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("can't build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("bad progress template: {0}")]
    Progress(#[from] indicatif::style::TemplateError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("can't init logging: {0}")]
    Logger(String),
}

pub type Result<T> = std::result::Result<T, Error>;
