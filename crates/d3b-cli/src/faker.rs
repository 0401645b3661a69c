//! Fake global descriptor files for exercising the Dewrangle global ID
//! endpoints
use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub(crate) static DEFAULT_FAKE_DATA_DIR: &str = "data/fake_data";

pub(crate) static FAKE_DESCRIPTORS_FILENAME: &str = "fake_global_descriptors.csv";

/// Number of digits in the numeric part of a fake global ID
const GLOBAL_ID_DIGITS: usize = 10;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, clap::ValueEnum)]
#[value(rename_all = "PascalCase")]
pub(crate) enum FhirResourceType {
    #[default]
    DocumentReference,
    Patient,
    Specimen,
    Observation,
    Condition,
}

impl FhirResourceType {
    pub(crate) fn resource_type(self) -> &'static str {
        match self {
            FhirResourceType::DocumentReference => "DocumentReference",
            FhirResourceType::Patient => "Patient",
            FhirResourceType::Specimen => "Specimen",
            FhirResourceType::Observation => "Observation",
            FhirResourceType::Condition => "Condition",
        }
    }

    pub(crate) fn id_prefix(self) -> &'static str {
        match self {
            FhirResourceType::DocumentReference => "dr",
            FhirResourceType::Patient => "pt",
            FhirResourceType::Specimen => "sp",
            FhirResourceType::Observation => "ob",
            FhirResourceType::Condition => "co",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("fake global ID index {index} has more than {} digits", GLOBAL_ID_DIGITS)]
pub(crate) struct IndexTooLong {
    index: u64,
}

/// Build a fake global ID of the form `<prefix>-<index>` where the index is
/// right-padded with zeros to ten digits, e.g. `dr-2500000000` for index 25.
pub(crate) fn fake_global_id(prefix: &str, index: u64) -> Result<String, IndexTooLong> {
    let digits = index.to_string();
    if digits.len() > GLOBAL_ID_DIGITS {
        return Err(IndexTooLong { index });
    }
    Ok(format!("{prefix}-{digits:0<GLOBAL_ID_DIGITS$}"))
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorRow {
    fhir_resource_type: &'static str,
    descriptor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    global_id: Option<String>,
}

fn descriptor_rows(
    resource: FhirResourceType,
    with_global_ids: bool,
    total_rows: u64,
    starting_index: u64,
) -> Result<Vec<DescriptorRow>, IndexTooLong> {
    (0..total_rows)
        .map(|i| -> Result<DescriptorRow, IndexTooLong> {
            let index = starting_index.checked_add(i).ok_or(IndexTooLong { index: u64::MAX })?;
            let global_id = fake_global_id(resource.id_prefix(), index)?;
            let suffix = global_id
                .rsplit_once('-')
                .map_or(global_id.as_str(), |(_, s)| s);
            let descriptor = format!("{}-{suffix}", resource.resource_type());
            Ok(DescriptorRow {
                fhir_resource_type: resource.resource_type(),
                descriptor,
                global_id: with_global_ids.then_some(global_id),
            })
        })
        .collect()
}

/// Write `total_rows` fake descriptors for `resource` to
/// `<output_dir>/fake_global_descriptors.csv` and return the file's path.
///
/// Row `i` uses index `starting_index + i`, so that successive files can
/// replace or extend the descriptors of earlier ones.
pub(crate) fn generate_global_id_file(
    resource: FhirResourceType,
    with_global_ids: bool,
    total_rows: u64,
    starting_index: u64,
    output_dir: &Path,
) -> anyhow::Result<PathBuf> {
    tracing::info!("Generating {total_rows} rows for fake global ID descriptors file");
    let rows = descriptor_rows(resource, with_global_ids, total_rows, starting_index)?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create directory {}", output_dir.display()))?;
    let path = output_dir.join(FAKE_DESCRIPTORS_FILENAME);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to open {} for writing", path.display()))?;
    if rows.is_empty() {
        let mut header = vec!["fhirResourceType", "descriptor"];
        if with_global_ids {
            header.push("globalId");
        }
        writer.write_record(header)?;
    }
    for row in &rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write row to {}", path.display()))?;
        tracing::debug!(descriptor = %row.descriptor, "Wrote fake descriptor");
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    tracing::info!(path = %path.display(), "Completed writing global ID descriptors");
    Ok(path)
}
