use anyhow::Context;
use dewrangle::JsonMap;
use patharg::InputArg;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub(crate) static DEFAULT_OUTPUT_DIR: &str = "data/dewrangle";

/// Write `value` as pretty JSON to `<dir>/<name>.json`, replacing any
/// existing file, and return the path written
pub(crate) fn write_json<T: Serialize>(
    dir: &Path,
    name: &str,
    value: &T,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let path = dir.join(format!("{name}.json"));
    let fp = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(fp);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("failed to dump JSON to {}", path.display()))?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .with_context(|| format!("failed to write to {}", path.display()))?;
    tracing::info!(path = %path.display(), "Wrote {name} output");
    Ok(path)
}

/// Read a JSON object of mutation input fields
pub(crate) fn read_json_input(infile: &InputArg) -> anyhow::Result<JsonMap> {
    let reader = infile
        .open()
        .with_context(|| format!("failed to open {infile:#}"))?;
    serde_json::from_reader::<_, JsonMap>(reader)
        .with_context(|| format!("failed to parse JSON object from {infile:#}"))
}

/// Builder for mutation input where explicit options override fields read
/// from a file
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct InputFields(JsonMap);

impl InputFields {
    pub(crate) fn load(infile: Option<&InputArg>) -> anyhow::Result<InputFields> {
        match infile {
            Some(infile) => read_json_input(infile).map(InputFields),
            None => Ok(InputFields::default()),
        }
    }

    /// Set `key` to `value` if `value` is given
    pub(crate) fn set<V: Into<serde_json::Value>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.0.insert(key.to_owned(), v.into());
        }
        self
    }

    pub(crate) fn into_inner(self) -> JsonMap {
        self.0
    }
}
