use crate::simulation::error::{Result, SimError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

/// Resolves `file_path` relative to the directory of `context_path`, which is usually the config
/// or scenario file the path was read from. Absolute paths and paths starting with `./` are
/// returned unchanged.
pub fn resolve_path(context_path: &Option<PathBuf>, file_path: &PathBuf) -> PathBuf {
    if file_path.is_absolute() || file_path.starts_with("./") {
        return file_path.clone();
    }

    if let Some(path) = context_path.as_ref().and_then(|c| c.parent()) {
        path.join(file_path)
    } else {
        file_path.clone()
    }
}

/// Reads a yaml file. Parse errors carry the path of the offending key.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|source| SimError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let deserializer = serde_yaml::Deserializer::from_reader(BufReader::new(file));
    serde_path_to_error::deserialize(deserializer).map_err(|source| SimError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `value` as yaml, creating missing parent directories.
pub fn write_yaml<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SimError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| SimError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Writing {path:?}");
    serde_yaml::to_writer(BufWriter::new(file), value).map_err(|source| SimError::Write {
        path: path.to_path_buf(),
        source,
    })
}
