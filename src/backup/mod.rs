pub(crate) mod archive;
pub(crate) mod db_dump;
pub(crate) mod job;
pub(crate) mod webdav;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use db_dump::{DatabaseConnection, DumpSource};
use job::BackupJob;

/// Public entry point for the backup process.
/// Builds a job from the configuration and runs it once.
///
/// Returns the name of the uploaded artifact.
pub async fn run_backup_flow(app_config: &AppConfig) -> Result<String> {
    let preset = app_config
        .provider
        .preset(&app_config.credentials.login)
        .with_context(|| format!("Cannot use provider {}", app_config.provider))?;
    log::info!("Backing up to {} at {}", app_config.provider, preset.base_url);

    let credentials = app_config.credentials.clone();
    let job = match &app_config.temp_dir {
        Some(dir) => BackupJob::with_temp_dir(preset, credentials, dir.clone())?,
        None => BackupJob::new(preset, credentials)?,
    };
    let job = configure(job, app_config)?;

    match &app_config.database_url {
        Some(url) => {
            let connection = DatabaseConnection::connect(url)
                .await
                .context("Failed to connect to the database")?;
            execute(job.database(connection)).await
        }
        None => execute(job).await,
    }
}

fn configure<S: DumpSource>(mut job: BackupJob<S>, app_config: &AppConfig) -> Result<BackupJob<S>> {
    job = job
        .archive_type(app_config.archive_type)?
        .compression(app_config.compression)
        .remove_local_file_after_upload(app_config.remove_local_file_after_upload);
    if let Some(label) = &app_config.prefix {
        job = job.prefix(label)?;
    }
    if let Some(path) = &app_config.source_path {
        job = job.source_path(path)?;
    }
    if let Some(dir) = &app_config.remote_dir {
        job = job.remote_dir(dir)?;
    }
    Ok(job)
}

async fn execute<S: DumpSource>(mut job: BackupJob<S>) -> Result<String> {
    log::info!("Backup prefix {} (started at {})", job.name_prefix(), job.timestamp());
    match job.execute().await {
        Ok(done) => Ok(done.artifact_name()),
        Err(e) => {
            if let Some(status) = e.status() {
                log::error!("Server answered {}; check credentials and the remote directory", status);
            }
            Err(e).context("Backup process failed")
        }
    }
}
