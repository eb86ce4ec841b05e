// davbackup/src/backup/job.rs
use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use url::Url;

use crate::backup::archive::{ArchiveHandle, ArchiveType};
use crate::backup::db_dump::{self, DatabaseConnection, DumpSource};
use crate::backup::webdav::{Credentials, WebDavClient};
use crate::config::provider::Preset;
use crate::errors::{BackupError, BackupResult};
use crate::utils::{self, remove_quietly};

pub const DEFAULT_REMOTE_DIR: &str = "backup";

static PROPFIND: LazyLock<Method> = LazyLock::new(|| Method::from_bytes(b"PROPFIND").expect("valid method"));
static MKCOL: LazyLock<Method> = LazyLock::new(|| Method::from_bytes(b"MKCOL").expect("valid method"));

/// Where a job is in its single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Configured,
    DirectoryEnsured,
    Archived,
    DatabaseAttached,
    Finalized,
    Uploaded,
    CleanedUp,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One backup run: archive a directory and/or a database dump and publish
/// it to a WebDAV collection.
///
/// Setters validate immediately. `execute` may only be called once.
pub struct BackupJob<S = DatabaseConnection> {
    client: WebDavClient,
    base_url: Url,
    archive_type: ArchiveType,
    compression: bool,
    remove_local_file: bool,
    timestamp: i64,
    prefix: String,
    source_path: Option<PathBuf>,
    database: Option<S>,
    remote_dir: String,
    temp_dir: PathBuf,
    stage: Stage,
    executed: bool,
}

impl BackupJob<DatabaseConnection> {
    /// Creates a job against `preset` using the temp directory beside the executable.
    pub fn new(preset: Preset, credentials: Credentials) -> BackupResult<Self> {
        Self::with_temp_dir(preset, credentials, utils::default_temp_dir()?)
    }

    pub fn with_temp_dir(preset: Preset, credentials: Credentials, temp_dir: PathBuf) -> BackupResult<Self> {
        let base_url = parse_base_url(&preset.base_url)?;
        let client = WebDavClient::new(credentials, preset.auth)?;
        utils::ensure_temp_dir(&temp_dir)?;
        let timestamp = Utc::now().timestamp();

        Ok(BackupJob {
            client,
            base_url,
            archive_type: ArchiveType::Tar,
            compression: true,
            remove_local_file: true,
            timestamp,
            prefix: utils::derive_prefix(timestamp, None),
            source_path: None,
            database: None,
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            temp_dir,
            stage: Stage::Configured,
            executed: false,
        })
    }
}

impl<S: DumpSource> BackupJob<S> {
    pub fn archive_type(mut self, archive_type: ArchiveType) -> BackupResult<Self> {
        archive_type.ensure_available()?;
        self.archive_type = archive_type;
        Ok(self)
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn remove_local_file_after_upload(mut self, enabled: bool) -> Self {
        self.remove_local_file = enabled;
        self
    }

    /// Appends a normalized `label` to the timestamp prefix.
    pub fn prefix(mut self, label: &str) -> BackupResult<Self> {
        if label.trim().is_empty() {
            return Err(BackupError::config("prefix label must not be empty"));
        }
        self.prefix = utils::derive_prefix(self.timestamp, Some(label));
        Ok(self)
    }

    pub fn source_path(mut self, path: impl AsRef<Path>) -> BackupResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(BackupError::config(format!(
                "source path {} does not exist or is not a directory",
                path.display()
            )));
        }
        let canonical = path
            .canonicalize()
            .map_err(|e| BackupError::config(format!("cannot resolve {}: {}", path.display(), e)))?;
        self.source_path = Some(canonical);
        Ok(self)
    }

    /// Attaches a database whose dump is stored in the archive under `sql/`.
    pub fn database<D: DumpSource>(self, database: D) -> BackupJob<D> {
        BackupJob {
            client: self.client,
            base_url: self.base_url,
            archive_type: self.archive_type,
            compression: self.compression,
            remove_local_file: self.remove_local_file,
            timestamp: self.timestamp,
            prefix: self.prefix,
            source_path: self.source_path,
            database: Some(database),
            remote_dir: self.remote_dir,
            temp_dir: self.temp_dir,
            stage: self.stage,
            executed: self.executed,
        }
    }

    /// Remote collection under the base URL; may be nested (`site/db`).
    pub fn remote_dir(mut self, name: &str) -> BackupResult<Self> {
        let name = name.trim().trim_matches('/');
        if name.is_empty() {
            return Err(BackupError::config("remote directory name must not be empty"));
        }
        if name.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
            return Err(BackupError::config(format!("invalid remote directory '{}'", name)));
        }
        self.remote_dir = name.to_string();
        Ok(self)
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn name_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn artifact_name(&self) -> String {
        self.archive_type.artifact_name(&self.prefix, self.compression)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.temp_dir.join(self.artifact_name())
    }

    pub fn dump_path(&self) -> PathBuf {
        self.temp_dir.join(format!("{}.sql", self.prefix))
    }

    /// Runs the whole pipeline once. The dump file is removed whatever the
    /// outcome; the artifact stays on disk unless the upload was accepted.
    pub async fn execute(&mut self) -> BackupResult<&Self> {
        if self.executed {
            return Err(BackupError::config(format!(
                "backup job {} has already been executed",
                self.prefix
            )));
        }
        self.executed = true;

        let result = self.run().await;
        remove_quietly(&self.dump_path());
        if let Err(e) = &result {
            if self.stage >= Stage::DirectoryEnsured && self.stage < Stage::Finalized {
                self.discard_partial_archive();
            }
            log::error!("Backup {} stopped after stage {}: {}", self.prefix, self.stage, e);
        }
        result?;
        Ok(&*self)
    }

    /// Removes whatever an interrupted archive step left in the temp directory.
    fn discard_partial_archive(&self) {
        remove_quietly(&self.temp_dir.join(format!("{}.{}", self.prefix, self.archive_type.extension())));
        remove_quietly(&self.artifact_path());
    }

    async fn run(&mut self) -> BackupResult<()> {
        log::info!("Starting backup {} ({} archive)", self.prefix, self.archive_type);

        self.ensure_remote_directory().await?;
        self.stage = Stage::DirectoryEnsured;

        let mut archive = ArchiveHandle::open(&self.temp_dir, &self.prefix, self.archive_type, self.compression)?;
        if let Some(source) = &self.source_path {
            archive.add_directory_tree(source)?;
        }
        self.stage = Stage::Archived;

        if let Some(database) = self.database.as_mut() {
            let dump_path = self.temp_dir.join(format!("{}.sql", self.prefix));
            db_dump::dump_database(database, &dump_path).await?;
            if dump_path.exists() {
                archive.add_file(&dump_path, &format!("sql/{}.sql", self.prefix))?;
            }
            self.stage = Stage::DatabaseAttached;
        }

        let artifact = archive.finalize()?;
        self.stage = Stage::Finalized;
        log::info!("Archive ready at {}", artifact.display());

        self.upload(&artifact).await?;
        self.stage = Stage::Uploaded;

        remove_quietly(&self.dump_path());
        if self.remove_local_file {
            remove_quietly(&artifact);
        }
        self.stage = Stage::CleanedUp;
        Ok(())
    }

    /// Makes sure `<base>/<remote_dir>` exists, creating it when the server
    /// reports it missing. Safe to call repeatedly.
    pub async fn ensure_remote_directory(&mut self) -> BackupResult<()> {
        let url = self.remote_url(None)?;
        let mut headers = HeaderMap::new();
        headers.insert("Depth", HeaderValue::from_static("0"));

        let mut result = self.client.request(&url, PROPFIND.clone(), headers, None).await?;
        if result.status == StatusCode::NOT_FOUND {
            log::info!("Remote directory {} not found, creating it", url);
            result = self
                .client
                .request(&url, MKCOL.clone(), HeaderMap::new(), None)
                .await?;
        }

        if result.status != StatusCode::CREATED && result.status != StatusCode::MULTI_STATUS {
            log::debug!("Response body: {}", String::from_utf8_lossy(&result.body));
            return Err(BackupError::RemoteProtocol {
                operation: "creating the remote directory",
                status: result.status,
            });
        }
        Ok(())
    }

    async fn upload(&mut self, artifact: &Path) -> BackupResult<()> {
        if !artifact.is_file() {
            return Err(BackupError::archive(
                "nothing to upload",
                format!("{} was not produced", artifact.display()),
            ));
        }
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.artifact_name());
        let url = self.remote_url(Some(&name))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));

        log::info!("Uploading {} to {}", artifact.display(), url);
        let result = self.client.request(&url, Method::PUT, headers, Some(artifact)).await?;
        if result.status != StatusCode::CREATED {
            log::debug!("Response body: {}", String::from_utf8_lossy(&result.body));
            return Err(BackupError::RemoteProtocol {
                operation: "uploading the archive",
                status: result.status,
            });
        }
        log::info!("Upload of {} accepted", name);
        Ok(())
    }

    /// `<base>/<remote_dir>[/<name>]`, every segment percent-encoded.
    fn remote_url(&self, name: Option<&str>) -> BackupResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BackupError::config(format!("base URL {} cannot carry a path", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(self.remote_dir.split('/'));
            if let Some(name) = name {
                segments.push(name);
            }
        }
        Ok(url)
    }
}

/// Parses the endpoint URL, making sure relative joins land inside it.
fn parse_base_url(raw: &str) -> BackupResult<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| BackupError::config(format!("invalid base URL '{}': {}", raw, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(BackupError::config(format!("base URL '{}' must use http or https", raw)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
