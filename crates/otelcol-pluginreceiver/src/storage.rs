//! Per-receiver storage directories
//!
//! Two plugin receivers rendering the same plugin would otherwise share the
//! directory of its `file_storage` extension. Each receiver gets a
//! sub-directory named after its id, with `/` replaced by `_`:
//!
//! ```text
//! file_storage: { directory: /var/lib/otelcol }
//!   └── plugin/nginx  →  /var/lib/otelcol/plugin_nginx
//! ```

use crate::error::{PluginError, PluginResult};
use crate::rendered::ComponentMap;
use otelcol_core::ComponentId;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Type of the storage extension whose directory is scoped
pub const FILE_STORAGE_TYPE: &str = "file_storage";

#[cfg(unix)]
const DIRECTORY_MODE: u32 = 0o750;

#[derive(Debug, Default, Deserialize)]
struct FileStorageSettings {
    #[serde(default)]
    directory: PathBuf,
}

/// Directory name used for receiver `id`
pub fn scoped_name(id: &ComponentId) -> String {
    id.to_string().replace('/', "_")
}

fn create_directory(path: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIRECTORY_MODE);
    }
    builder.create(path)
}

/// Point every `file_storage` extension at a directory of its own for `id`
///
/// The directory is created. Other extension settings are kept.
pub fn scope_file_storage(extensions: &mut ComponentMap, id: &ComponentId) -> PluginResult<()> {
    for (key, settings) in extensions.iter_mut() {
        let extension_id = key.parse::<ComponentId>().map_err(|e| {
            PluginError::InvalidComponentId {
                id: key.clone(),
                reason: e.to_string(),
            }
        })?;
        if extension_id.component_type().as_str() != FILE_STORAGE_TYPE {
            continue;
        }

        let parsed: FileStorageSettings = match &*settings {
            Value::Null => FileStorageSettings::default(),
            other => serde_yaml::from_value(other.clone())
                .map_err(|e| PluginError::storage(key.as_str(), e))?,
        };
        let directory = parsed.directory.join(scoped_name(id));
        create_directory(&directory).map_err(|e| PluginError::storage(key.as_str(), e))?;
        debug!(extension = %key, directory = %directory.display(), "Scoped storage directory");

        let mut mapping = match std::mem::take(settings) {
            Value::Mapping(mapping) => mapping,
            _ => Mapping::new(),
        };
        mapping.insert(
            Value::from("directory"),
            Value::from(directory.to_string_lossy().into_owned()),
        );
        *settings = Value::Mapping(mapping);
    }
    Ok(())
}
