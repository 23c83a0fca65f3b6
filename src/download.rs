use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tar::Archive;
use url::Url;
use walkdir::WalkDir;
use xz2::read::XzDecoder;
use zip::ZipArchive;

use crate::plan::ArtifactKind;

const DEFAULT_USER_AGENT: &str = concat!("edenv/", env!("CARGO_PKG_VERSION"));

/// Retrieves a remote artifact into a local file
pub trait Fetch {
    /// Write `url` to `dest` and return the SHA-256 of what was written
    fn fetch(&self, url: &Url, dest: &Path) -> Result<[u8; 32]>;
}

/// Blocking HTTP(S) fetcher; a failed request aborts the run
#[derive(Clone)]
pub struct HttpFetcher {
    http: Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let user_agent = std::env::var("EDENV_USER_AGENT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        Ok(Self { http, user_agent })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url, dest: &Path) -> Result<[u8; 32]> {
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Unsupported download scheme '{}' in {url}", url.scheme());
        }

        let mut response = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .with_context(|| format!("Failed to download {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            bail!("Download of {url} returned {status}");
        }

        write_stream(&mut response, dest).with_context(|| format!("Failed to save {url}"))
    }
}

/// Stream `reader` into `dest` via a temporary sibling, hashing as it goes
pub fn write_stream(reader: &mut impl Read, dest: &Path) -> Result<[u8; 32]> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = temp_path_for(dest);
    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temporary file {:?}", temp_path))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = reader
            .read(&mut buffer)
            .context("Failed while reading download stream")?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .with_context(|| format!("Failed while writing {:?}", temp_path))?;
        hasher.update(&buffer[..read]);
    }

    file.flush()
        .with_context(|| format!("Failed to flush {:?}", temp_path))?;

    fs::rename(&temp_path, dest)
        .with_context(|| format!("Failed to move {:?} to {:?}", temp_path, dest))?;

    Ok(hasher.finalize().into())
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".download");
    dest.with_file_name(name)
}

/// Name of the last url path segment, used for archive type detection
pub fn file_name_from_url(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a file name from {url}"))
}

pub fn parse_sha256(value: &str) -> Result<[u8; 32]> {
    let trimmed = value.trim();
    let digest = trimmed
        .strip_prefix("sha256:")
        .context("Checksum must use `sha256:<hex>` format")?;

    if digest.len() != 64 {
        bail!("SHA256 checksum must be exactly 64 hex characters");
    }

    let bytes = hex::decode(digest).context("Failed to decode SHA256 checksum")?;
    let mut array = [0u8; 32];
    array.copy_from_slice(&bytes);
    Ok(array)
}

pub fn format_digest(bytes: &[u8; 32]) -> String {
    hex::encode(bytes)
}

pub fn verify_checksum(expected: Option<&str>, actual: &[u8; 32], what: &str) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let expected = parse_sha256(expected)?;
    if &expected != actual {
        bail!(
            "Checksum mismatch for {what}: expected {}, got {}",
            format_digest(&expected),
            format_digest(actual)
        );
    }
    Ok(())
}

/// Fetched and installed artifact
#[derive(Debug, Clone)]
pub struct InstalledArtifact {
    pub dest: PathBuf,
    pub sha256: [u8; 32],
    pub files: usize,
}

/// Fetch `url` and place it at `dest` according to `kind`
///
/// Archives are staged in `staging_dir` and extracted into `dest`; plain
/// files land at `dest` directly.
pub fn install_artifact(
    fetcher: &dyn Fetch,
    url: &Url,
    dest: &Path,
    kind: ArtifactKind,
    checksum: Option<&str>,
    executable: bool,
    staging_dir: &Path,
) -> Result<InstalledArtifact> {
    match kind {
        ArtifactKind::File => {
            let sha256 = fetcher.fetch(url, dest)?;
            if let Err(err) = verify_checksum(checksum, &sha256, url.as_str()) {
                let _ = fs::remove_file(dest);
                return Err(err);
            }
            if executable {
                set_executable(dest)?;
            }
            Ok(InstalledArtifact {
                dest: dest.to_path_buf(),
                sha256,
                files: 1,
            })
        }
        ArtifactKind::Archive => {
            let staged = staging_dir.join(file_name_from_url(url)?);
            let sha256 = fetcher.fetch(url, &staged)?;
            verify_checksum(checksum, &sha256, url.as_str())?;

            fs::create_dir_all(dest)
                .with_context(|| format!("Failed to create directory {:?}", dest))?;
            extract_archive(&staged, dest)?;
            fs::remove_file(&staged)
                .with_context(|| format!("Failed to remove staged archive {:?}", staged))?;

            let files = WalkDir::new(dest)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .count();

            Ok(InstalledArtifact {
                dest: dest.to_path_buf(),
                sha256,
                files,
            })
        }
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to set permissions on {:?}", path))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    let filename = archive_path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let open = || {
        File::open(archive_path).with_context(|| format!("Failed to open archive {:?}", archive_path))
    };

    if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        Archive::new(GzDecoder::new(open()?))
            .unpack(dest)
            .with_context(|| format!("Failed to unpack tar.gz archive {:?}", archive_path))?;
    } else if filename.ends_with(".tar.xz") || filename.ends_with(".txz") {
        Archive::new(XzDecoder::new(open()?))
            .unpack(dest)
            .with_context(|| format!("Failed to unpack tar.xz archive {:?}", archive_path))?;
    } else if filename.ends_with(".tar") {
        Archive::new(open()?)
            .unpack(dest)
            .with_context(|| format!("Failed to unpack tar archive {:?}", archive_path))?;
    } else if filename.ends_with(".zip") {
        extract_zip(archive_path, dest)?;
    } else {
        bail!("Unsupported archive format {:?}", archive_path);
    }

    Ok(())
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open zip archive {:?}", archive_path))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive {:?}", archive_path))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).with_context(|| {
            format!("Failed to read zip entry #{index} from {:?}", archive_path)
        })?;

        let Some(enclosed) = entry.enclosed_name().map(|path| dest.join(path)) else {
            continue;
        };

        if entry.name().ends_with('/') {
            fs::create_dir_all(&enclosed)
                .with_context(|| format!("Failed to create directory {:?}", enclosed))?;
            continue;
        }

        if let Some(parent) = enclosed.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directory {:?}", parent))?;
        }

        let mut outfile = File::create(&enclosed)
            .with_context(|| format!("Failed to create file {:?}", enclosed))?;
        io::copy(&mut entry, &mut outfile)
            .with_context(|| format!("Failed to extract zip entry {:?}", enclosed))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&enclosed, fs::Permissions::from_mode(mode))
                    .with_context(|| format!("Failed to set permissions on {:?}", enclosed))?;
            }
        }
    }

    Ok(())
}
