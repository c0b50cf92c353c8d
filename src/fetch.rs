use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

use camino::Utf8Path;
use flate2::read::MultiGzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::domain::{DataKind, TaxonId};
use crate::error::KiraError;
use crate::store::Store;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub trait Downloader {
    fn download(&self, url: &str, destination: &Utf8Path) -> Result<(), KiraError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchAction {
    AlreadyPresent,
    Decompressed,
    Downloaded,
}

#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-proteome/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| KiraError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn normalize_url(url: &str) -> String {
        let url = url.trim();
        if let Some(rest) = url.strip_prefix("ftp://ftp.ncbi.nlm.nih.gov/") {
            return format!("https://ftp.ncbi.nlm.nih.gov/{rest}");
        }
        url.to_string()
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, destination: &Utf8Path) -> Result<(), KiraError> {
        let url = Self::normalize_url(url);
        let mut temp = Store::staging_file(destination)?;

        if let Some(local) = local_source(&url) {
            let mut source = File::open(local)
                .map_err(|err| KiraError::Filesystem(format!("open {local}: {err}")))?;
            io::copy(&mut source, &mut temp)
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            return Store::persist(temp, destination);
        }

        let mut response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| KiraError::Http(err.to_string()))?;
        if !response.status().is_success() {
            return Err(KiraError::HttpStatus {
                status: response.status().as_u16(),
                url,
            });
        }
        copy_body(&mut response, &mut temp)?;
        Store::persist(temp, destination)
    }
}

fn copy_body<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<u64, KiraError> {
    let mut buffer = vec![0u8; 64 * 1024];
    let mut written = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(written),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(KiraError::Http(err.to_string())),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|err| KiraError::Filesystem(format!("write download: {err}")))?;
        written += read as u64;
    }
}

fn local_source(url: &str) -> Option<&str> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(path);
    }
    if url.contains("://") {
        return None;
    }
    Some(url)
}

pub fn decompress(source: &Utf8Path, destination: &Utf8Path) -> Result<(), KiraError> {
    let file = File::open(source.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open {source}: {err}")))?;
    let mut reader = BufReader::new(file);
    let is_gzip = reader
        .fill_buf()
        .map(|head| head.starts_with(&GZIP_MAGIC))
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;

    let mut input: Box<dyn Read> = if is_gzip {
        Box::new(MultiGzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    let mut temp = Store::staging_file(destination)?;
    io::copy(&mut input, &mut temp)
        .map_err(|err| KiraError::Filesystem(format!("decompress {source}: {err}")))?;
    Store::persist(temp, destination)
}

/// Makes sure `<taxon>.<kind>` exists decompressed, running only the missing steps.
/// `report` hears which branch was chosen before any work starts.
pub fn ensure_local<D, F>(
    store: &Store,
    downloader: &D,
    taxon: &TaxonId,
    kind: DataKind,
    url: &str,
    report: F,
) -> Result<FetchAction, KiraError>
where
    D: Downloader + ?Sized,
    F: FnOnce(FetchAction),
{
    let path = store.data_path(taxon, kind);
    let compressed = store.compressed_path(taxon, kind);

    if Store::exists(&path) {
        tracing::debug!(%taxon, %kind, %path, "decompressed file present");
        report(FetchAction::AlreadyPresent);
        return Ok(FetchAction::AlreadyPresent);
    }

    if Store::exists(&compressed) {
        tracing::debug!(%taxon, %kind, %compressed, "decompressing cached download");
        report(FetchAction::Decompressed);
        decompress(&compressed, &path)?;
        return Ok(FetchAction::Decompressed);
    }

    tracing::info!(%taxon, %kind, url, "downloading");
    report(FetchAction::Downloaded);
    downloader.download(url, &compressed)?;
    decompress(&compressed, &path)?;
    Ok(FetchAction::Downloaded)
}
