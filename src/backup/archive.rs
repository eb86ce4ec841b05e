// davbackup/src/backup/archive.rs
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use walkdir::WalkDir;
use which::which;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::errors::{BackupError, BackupResult};

/// Archive formats the backup can be packed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Tar,
    Zip,
    Rar,
}

impl ArchiveType {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveType::Tar => "tar",
            ArchiveType::Zip => "zip",
            ArchiveType::Rar => "rar",
        }
    }

    /// File name of the finished artifact for `prefix`.
    pub fn artifact_name(self, prefix: &str, compression: bool) -> String {
        match self {
            ArchiveType::Tar if compression => format!("{}.tar.gz", prefix),
            other => format!("{}.{}", prefix, other.extension()),
        }
    }

    /// Whether this host can write the format. Tar and zip are built in;
    /// rar needs the `rar` executable on `PATH`.
    pub fn is_available(self) -> bool {
        match self {
            ArchiveType::Tar | ArchiveType::Zip => true,
            ArchiveType::Rar => find_rar_executable().is_ok(),
        }
    }

    pub fn ensure_available(self) -> BackupResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            let available: Vec<String> = ArchiveType::available().iter().map(|t| t.to_string()).collect();
            Err(BackupError::config(format!(
                "archive type '{}' is not supported on this host (available: {})",
                self,
                available.join(", ")
            )))
        }
    }

    pub fn available() -> Vec<ArchiveType> {
        [ArchiveType::Tar, ArchiveType::Zip, ArchiveType::Rar]
            .into_iter()
            .filter(|t| t.is_available())
            .collect()
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveType {
    type Err = BackupError;

    fn from_str(s: &str) -> BackupResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tar" => Ok(ArchiveType::Tar),
            "zip" => Ok(ArchiveType::Zip),
            "rar" => Ok(ArchiveType::Rar),
            other => Err(BackupError::config(format!("unknown archive type '{}'", other))),
        }
    }
}

fn find_rar_executable() -> BackupResult<PathBuf> {
    which("rar").map_err(|e| BackupError::config(format!("rar executable not found in PATH: {}", e)))
}

enum Writer {
    Tar(tar::Builder<BufWriter<File>>),
    Zip(zip::ZipWriter<File>),
    Rar(RarStaging),
}

/// Entries collected for a single `rar a` run at finalization.
struct RarStaging {
    executable: PathBuf,
    dir: tempfile::TempDir,
    entries: Vec<String>,
}

/// An archive being written to `<dir>/<prefix>.<ext>`.
pub struct ArchiveHandle {
    kind: ArchiveType,
    compression: bool,
    path: PathBuf,
    writer: Writer,
}

impl ArchiveHandle {
    /// Opens a new archive of `kind` in `dir`, named after `prefix`.
    ///
    /// # Arguments
    /// * `dir` - Directory the archive file is created in.
    /// * `prefix` - Job prefix used as the file stem.
    /// * `kind` - Archive format.
    /// * `compression` - gzip for tar, deflate for zip, default method for rar.
    pub fn open(dir: &Path, prefix: &str, kind: ArchiveType, compression: bool) -> BackupResult<Self> {
        let path = dir.join(format!("{}.{}", prefix, kind.extension()));
        let writer = match kind {
            ArchiveType::Tar => {
                let file = create_file(&path)?;
                Writer::Tar(tar::Builder::new(BufWriter::new(file)))
            }
            ArchiveType::Zip => Writer::Zip(zip::ZipWriter::new(create_file(&path)?)),
            ArchiveType::Rar => {
                let executable = find_rar_executable()
                    .map_err(|e| BackupError::archive("cannot open rar archive", e))?;
                let staging = tempfile::Builder::new()
                    .prefix(&format!(".{}-rar-", prefix))
                    .tempdir_in(dir)
                    .map_err(|e| BackupError::archive("failed to create rar staging directory", e))?;
                Writer::Rar(RarStaging {
                    executable,
                    dir: staging,
                    entries: Vec::new(),
                })
            }
        };
        log::debug!("Opened {} archive at {}", kind, path.display());
        Ok(ArchiveHandle {
            kind,
            compression,
            path,
            writer,
        })
    }

    /// Adds one file under `entry_name` (forward-slash separated).
    pub fn add_file(&mut self, source: &Path, entry_name: &str) -> BackupResult<()> {
        let context = || format!("failed to add {} as {}", source.display(), entry_name);
        match &mut self.writer {
            Writer::Tar(builder) => builder
                .append_path_with_name(source, entry_name)
                .map_err(|e| BackupError::archive(context(), e)),
            Writer::Zip(zip) => {
                let method = if self.compression {
                    CompressionMethod::Deflated
                } else {
                    CompressionMethod::Stored
                };
                let size = fs::metadata(source)
                    .map_err(|e| BackupError::archive(context(), e))?
                    .len();
                let options = SimpleFileOptions::default()
                    .compression_method(method)
                    .unix_permissions(0o644)
                    .large_file(needs_zip64(size));
                zip.start_file(entry_name, options)
                    .map_err(|e| BackupError::archive(context(), e))?;
                let mut input = File::open(source).map_err(|e| BackupError::archive(context(), e))?;
                io::copy(&mut input, zip).map_err(|e| BackupError::archive(context(), e))?;
                Ok(())
            }
            Writer::Rar(staging) => {
                let target = staging.dir.path().join(entry_name);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| BackupError::archive(context(), e))?;
                }
                if fs::hard_link(source, &target).is_err() {
                    fs::copy(source, &target).map_err(|e| BackupError::archive(context(), e))?;
                }
                staging.entries.push(entry_name.to_string());
                Ok(())
            }
        }
    }

    /// Adds every regular file below `root`, named relative to it.
    ///
    /// Returns the number of files added.
    pub fn add_directory_tree(&mut self, root: &Path) -> BackupResult<usize> {
        let mut added = 0;
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                BackupError::archive(format!("failed to walk directory {}", root.display()), e)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry_name(root, entry.path())?;
            self.add_file(entry.path(), &name)?;
            added += 1;
        }
        log::info!("Added {} files from {} to the archive", added, root.display());
        Ok(added)
    }

    /// Flushes the container and returns the path of the finished artifact.
    ///
    /// A compressed tar is rewritten as `.tar.gz` and the plain `.tar` removed.
    pub fn finalize(self) -> BackupResult<PathBuf> {
        let ArchiveHandle {
            kind,
            compression,
            path,
            writer,
        } = self;
        let context = || format!("failed to finalize {}", path.display());

        match writer {
            Writer::Tar(builder) => {
                let mut out = builder.into_inner().map_err(|e| BackupError::archive(context(), e))?;
                out.flush().map_err(|e| BackupError::archive(context(), e))?;
                drop(out);
                if compression {
                    let gz_path = path.with_file_name(kind.artifact_name(&file_stem(&path), true));
                    gzip_file(&path, &gz_path)?;
                    fs::remove_file(&path).map_err(|e| BackupError::archive(context(), e))?;
                    return Ok(gz_path);
                }
            }
            Writer::Zip(zip) => {
                zip.finish().map_err(|e| BackupError::archive(context(), e))?;
            }
            Writer::Rar(staging) => run_rar(&staging, &path, compression)?,
        }
        Ok(path)
    }
}

/// Entry name of `path` relative to `root`, joined with `/`.
pub fn entry_name(root: &Path, path: &Path) -> BackupResult<String> {
    let relative = path.strip_prefix(root).map_err(|e| {
        BackupError::archive(
            format!("{} is outside of {}", path.display(), root.display()),
            e,
        )
    })?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    BackupError::archive(
                        format!("cannot archive {}", path.display()),
                        "file name is not valid UTF-8",
                    )
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(BackupError::archive(
                    format!("cannot archive {}", path.display()),
                    "unexpected path component",
                ));
            }
        }
    }
    Ok(parts.join("/"))
}

/// Entries of 4 GiB and more need ZIP64 headers, which must be chosen
/// before the entry is written.
fn needs_zip64(size: u64) -> bool {
    size >= u64::from(u32::MAX)
}

fn create_file(path: &Path) -> BackupResult<File> {
    File::create(path)
        .map_err(|e| BackupError::archive(format!("failed to create archive file {}", path.display()), e))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn gzip_file(source: &Path, dest: &Path) -> BackupResult<()> {
    let context = || format!("failed to compress {} into {}", source.display(), dest.display());
    let mut input = File::open(source).map_err(|e| BackupError::archive(context(), e))?;
    let mut encoder = GzEncoder::new(create_file(dest)?, Compression::default());
    io::copy(&mut input, &mut encoder).map_err(|e| BackupError::archive(context(), e))?;
    encoder.finish().map_err(|e| BackupError::archive(context(), e))?;
    log::debug!("Compressed {} into {}", source.display(), dest.display());
    Ok(())
}

fn run_rar(staging: &RarStaging, archive: &Path, compression: bool) -> BackupResult<()> {
    let context = || format!("failed to build rar archive {}", archive.display());

    let list_path = staging.dir.path().with_extension("lst");
    fs::write(&list_path, staging.entries.join("\n")).map_err(|e| BackupError::archive(context(), e))?;

    let output = Command::new(&staging.executable)
        .current_dir(staging.dir.path())
        .arg("a")
        .arg("-idq")
        .arg("-y")
        .arg(if compression { "-m3" } else { "-m0" })
        .arg(archive)
        .arg(format!("@{}", list_path.display()))
        .output();
    let _ = fs::remove_file(&list_path);
    let output = output.map_err(|e| BackupError::archive(context(), e))?;

    if !output.status.success() {
        return Err(BackupError::archive(
            context(),
            format!(
                "rar exited with {}\nStdout: {}\nStderr: {}",
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
        ));
    }
    Ok(())
}
