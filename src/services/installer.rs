//! Download and unpack the latest AssettoServer release.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Latest-release endpoint of the AssettoServer repository.
pub const RELEASES_API: &str = "https://api.github.com/repos/compujuckel/AssettoServer/releases/latest";

/// Stock server executable shipped with the game.
pub const LEGACY_SERVER_EXE: &str = "acServer.exe";

const USER_AGENT: &str = concat!("acsm/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Set both the game folder and the server folder first")]
    MissingPaths,

    #[error("{0} is not empty; use --clean to replace its contents")]
    DestinationNotEmpty(Utf8PathBuf),

    #[error("Release {tag} has no asset for platform '{platform}'")]
    NoMatchingAsset { tag: String, platform: &'static str },

    #[error("Download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction failed: {0}")]
    Extraction(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// What an installation put in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSummary {
    pub release: String,
    pub asset: String,
    pub legacy_exe: Option<Utf8PathBuf>,
}

/// Platform tag used in release asset names.
pub fn platform_tag() -> &'static str {
    if cfg!(target_os = "windows") {
        "win-x64"
    } else {
        "linux-x64"
    }
}

pub fn select_asset<'a>(release: &'a Release, platform: &str) -> Option<&'a ReleaseAsset> {
    release.assets.iter().find(|asset| asset.name.contains(platform))
}

/// Make sure `dest` exists and is empty.
///
/// Existing content is only removed when `clean` is set.
pub fn prepare_destination(dest: &Utf8Path, clean: bool) -> Result<(), InstallError> {
    fs::create_dir_all(dest)?;

    let entries: Vec<_> = fs::read_dir(dest)?.collect::<Result<_, _>>()?;
    if entries.is_empty() {
        return Ok(());
    }
    if !clean {
        return Err(InstallError::DestinationNotEmpty(dest.to_owned()));
    }

    tracing::info!("Clearing {} entries from {}", entries.len(), dest);
    for entry in entries {
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Copy the game's stock `acServer.exe` (from `server/` or the game root) into `dest`.
pub fn copy_legacy_server_exe(game_dir: &Utf8Path, dest: &Utf8Path) -> Result<Option<Utf8PathBuf>, InstallError> {
    let candidates = [
        game_dir.join("server").join(LEGACY_SERVER_EXE),
        game_dir.join(LEGACY_SERVER_EXE),
    ];
    let Some(source) = candidates.iter().find(|path| path.is_file()) else {
        tracing::debug!("No {} found under {}", LEGACY_SERVER_EXE, game_dir);
        return Ok(None);
    };

    let target = dest.join(LEGACY_SERVER_EXE);
    fs::copy(source, &target)?;
    tracing::info!("Copied {} to {}", source, target);
    Ok(Some(target))
}

/// Unpack `archive` into `dest` with the system `tar` (bsdtar on Windows reads zip too).
pub async fn extract_archive(archive: &Utf8Path, dest: &Utf8Path) -> Result<(), InstallError> {
    let output = Command::new("tar")
        .arg("-xf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InstallError::Extraction(format!(
            "tar exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Extract `archive` into `dest`, then delete the archive whether or not extraction worked.
pub async fn unpack_archive(archive: &Utf8Path, dest: &Utf8Path) -> Result<(), InstallError> {
    let result = extract_archive(archive, dest).await;
    discard_archive(archive);
    result
}

fn discard_archive(archive: &Utf8Path) {
    if let Err(e) = fs::remove_file(archive)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("Could not remove {}: {}", archive, e);
    }
}

/// Fetches releases over HTTPS.
pub struct Installer {
    client: reqwest::Client,
    api_url: String,
}

impl Installer {
    pub fn new() -> Result<Self, InstallError> {
        Self::with_api_url(RELEASES_API)
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Result<Self, InstallError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    pub async fn fetch_latest(&self) -> Result<Release, InstallError> {
        tracing::info!("Fetching release metadata from {}", self.api_url);
        let release = self
            .client
            .get(&self.api_url)
            .send()
            .await?
            .error_for_status()?
            .json::<Release>()
            .await?;
        Ok(release)
    }

    /// Stream `url` into the file at `target`, returning the byte count.
    pub async fn download(&self, url: &str, target: &Utf8Path) -> Result<u64, InstallError> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        let mut file = tokio::fs::File::create(target).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!("Downloaded {} bytes to {}", written, target);
        Ok(written)
    }

    /// Download the archive at `url` to `archive` and unpack it into `dest`.
    ///
    /// No partial archive is left behind when the download or extraction fails.
    pub async fn fetch_archive(&self, url: &str, archive: &Utf8Path, dest: &Utf8Path) -> Result<(), InstallError> {
        if let Err(e) = self.download(url, archive).await {
            discard_archive(archive);
            return Err(e);
        }
        unpack_archive(archive, dest).await
    }

    /// Install the latest release into `dest`.
    ///
    /// # Arguments
    /// * `dest` - Server directory
    /// * `game_dir` - Game installation, source of the stock server executable
    /// * `clean` - Remove existing content of `dest` first
    pub async fn install(&self, dest: &Utf8Path, game_dir: &Utf8Path, clean: bool) -> Result<InstallSummary, InstallError> {
        if dest.as_str().is_empty() || game_dir.as_str().is_empty() {
            return Err(InstallError::MissingPaths);
        }
        prepare_destination(dest, clean)?;

        let release = self.fetch_latest().await?;
        let platform = platform_tag();
        let asset = select_asset(&release, platform).ok_or_else(|| InstallError::NoMatchingAsset {
            tag: release.tag_name.clone(),
            platform,
        })?;

        let archive = dest.join(&asset.name);
        self.fetch_archive(&asset.browser_download_url, &archive, dest).await?;

        let legacy_exe = copy_legacy_server_exe(game_dir, dest)?;
        tracing::info!("Installed AssettoServer {} into {}", release.tag_name, dest);

        Ok(InstallSummary {
            release: release.tag_name.clone(),
            asset: asset.name.clone(),
            legacy_exe,
        })
    }
}
