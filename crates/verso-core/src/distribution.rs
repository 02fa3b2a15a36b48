use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use log::{debug, info};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use verso_backend::{EngineError, NodeVersion};

use crate::config::Config;

/// Where releases come from: the release index and per-release artifacts.
#[async_trait]
pub trait Distribution: Send + Sync {
    /// The raw tab-separated release index.
    async fn fetch_index(&self) -> Result<String, EngineError>;

    /// Stream the artifact `slug` of `version` to `dest`, validating the
    /// transfer before returning.
    async fn download_artifact(
        &self,
        version: &NodeVersion,
        slug: &str,
        dest: &Path,
    ) -> Result<(), EngineError>;
}

/// The public distribution server (or a mirror of it) over HTTPS.
pub struct HttpDistribution {
    client: reqwest::Client,
    base_url: String,
    verify_checksums: bool,
}

impl HttpDistribution {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(format!("verso/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| EngineError::network_request_from("build http client", error))?;

        Ok(Self {
            client,
            base_url: config.dist_base().to_string(),
            verify_checksums: config.verify_checksums,
        })
    }

    fn index_url(&self) -> String {
        format!("{}/index.tab", self.base_url)
    }

    fn artifact_url(&self, version: &NodeVersion, slug: &str) -> String {
        format!("{}/{version}/{slug}", self.base_url)
    }

    fn checksums_url(&self, version: &NodeVersion) -> String {
        format!("{}/{version}/SHASUMS256.txt", self.base_url)
    }

    async fn get(
        &self,
        operation: &'static str,
        url: &str,
    ) -> Result<reqwest::Response, EngineError> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| EngineError::network_request_from(operation, error))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(EngineError::HttpStatus {
                operation,
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn get_text(&self, operation: &'static str, url: &str) -> Result<String, EngineError> {
        self.get(operation, url)
            .await?
            .text()
            .await
            .map_err(|error| EngineError::network_parse_from(operation, error))
    }

    async fn verify_checksum(
        &self,
        version: &NodeVersion,
        slug: &str,
        downloaded: &Path,
    ) -> Result<(), EngineError> {
        let checksums = self
            .get_text("fetch checksums", &self.checksums_url(version))
            .await?;
        let expected =
            parse_expected_checksum(&checksums, slug).ok_or_else(|| EngineError::ChecksumMismatch {
                asset: slug.to_string(),
                details: "no entry in SHASUMS256.txt".to_string(),
            })?;
        let actual = hash_artifact(downloaded).await?;

        if actual == expected {
            info!("Checksum verified for {slug}");
            Ok(())
        } else {
            Err(EngineError::ChecksumMismatch {
                asset: slug.to_string(),
                details: format!("expected {expected}, got {actual}"),
            })
        }
    }
}

#[async_trait]
impl Distribution for HttpDistribution {
    async fn fetch_index(&self) -> Result<String, EngineError> {
        self.get_text("fetch release index", &self.index_url()).await
    }

    async fn download_artifact(
        &self,
        version: &NodeVersion,
        slug: &str,
        dest: &Path,
    ) -> Result<(), EngineError> {
        use futures_util::StreamExt;

        let url = self.artifact_url(version, slug);
        info!("Downloading {url}");
        let response = self.get("download artifact", &url).await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|error| EngineError::io_at("failed to create", dest, &error))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|error| EngineError::network_request_from("download artifact", error))?;
            file.write_all(&chunk)
                .await
                .map_err(|error| EngineError::io_at("failed to write", dest, &error))?;
            downloaded += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|error| EngineError::io_at("failed to flush", dest, &error))?;
        debug!("Downloaded {downloaded} bytes to {}", dest.display());

        if self.verify_checksums {
            self.verify_checksum(version, slug, dest).await?;
        }
        Ok(())
    }
}

fn parse_expected_checksum(checksums: &str, asset_name: &str) -> Option<String> {
    checksums.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let hash = parts.next()?;
        let name = parts.next()?.trim_start_matches('*').trim_start_matches("./");
        (name == asset_name).then(|| hash.to_ascii_lowercase())
    })
}

/// Hashes on the blocking pool; artifacts run to tens of megabytes.
async fn hash_artifact(path: &Path) -> Result<String, EngineError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || sha256_file(&path))
        .await
        .map_err(|error| EngineError::internal(format!("checksum task failed: {error}")))?
}

fn sha256_file(path: &Path) -> Result<String, EngineError> {
    let mut file = std::fs::File::open(path)
        .map_err(|error| EngineError::io_at("failed to open for checksum", path, &error))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|error| EngineError::io_at("failed to read for checksum", path, &error))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
