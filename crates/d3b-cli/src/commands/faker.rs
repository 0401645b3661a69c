use crate::faker::{DEFAULT_FAKE_DATA_DIR, FhirResourceType, generate_global_id_file};
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Clone, Debug, Eq, PartialEq, Subcommand)]
pub(super) enum FakerCommand {
    /// Generate a CSV of fake global descriptors for upserting into Dewrangle
    ///
    /// The file has the columns `fhirResourceType` and `descriptor`, plus
    /// `globalId` when `--with-global-ids` is given.  Without global IDs,
    /// Dewrangle mints new ones when the file is upserted.
    GenerateGlobalIdFile {
        /// Directory in which to write `fake_global_descriptors.csv`
        #[arg(short, long, default_value = DEFAULT_FAKE_DATA_DIR)]
        output_dir: PathBuf,

        /// FHIR resource type of the descriptors
        #[arg(long, value_enum, default_value_t)]
        fhir_resource_type: FhirResourceType,

        /// Include a column of fake global IDs
        #[arg(long)]
        with_global_ids: bool,

        /// Index of the first row, so that later files can replace or extend
        /// the descriptors of earlier ones
        #[arg(long, default_value_t = 0)]
        starting_index: u64,

        /// Number of rows to generate
        #[arg(long, default_value_t = 10)]
        total_rows: u64,
    },
}

impl FakerCommand {
    pub(super) fn run(self) -> anyhow::Result<()> {
        match self {
            FakerCommand::GenerateGlobalIdFile {
                output_dir,
                fhir_resource_type,
                with_global_ids,
                starting_index,
                total_rows,
            } => {
                let path = generate_global_id_file(
                    fhir_resource_type,
                    with_global_ids,
                    total_rows,
                    starting_index,
                    &output_dir,
                )?;
                println!("{}", path.display());
                Ok(())
            }
        }
    }
}
