use clap::{Args, ValueEnum};
use kotor_common::ResourceId;
use kotor_erf::{ContainerType, ContainerWriter, ContainerWriterOptions};
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{collections::BTreeMap, fs::File, path::PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    #[default]
    Erf,
    Mod,
    Sav,
    Hak,
    Rim,
}

impl From<Format> for ContainerType {
    fn from(format: Format) -> Self {
        match format {
            Format::Erf => ContainerType::Erf,
            Format::Mod => ContainerType::Mod,
            Format::Sav => ContainerType::Sav,
            Format::Hak => ContainerType::Hak,
            Format::Rim => ContainerType::Rim,
        }
    }
}

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target container file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Container flavour; guessed from the target's extension when omitted
    #[arg(short = 't', long, value_enum)]
    format: Option<Format>,

    /// English description stored in the header
    #[arg(long)]
    description: Option<String>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    fn container_type(&self) -> ContainerType {
        if let Some(format) = self.format {
            return format.into();
        }
        self.file
            .extension()
            .and_then(|ext| kotor_common::ResourceKind::from_extension(&ext.to_string_lossy()))
            .and_then(ContainerType::from_kind)
            .unwrap_or_default()
    }

    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(&self.directory)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy();
            match ResourceId::from_filename(&name) {
                Ok(id) => {
                    if let Some(previous) = files.insert(id, entry.into_path()) {
                        warn!("{} shadowed by a file with the same id", previous.display());
                    }
                }
                Err(e) => warn!("skipping {name}: {e}"),
            }
        }

        if files.is_empty() {
            return Err(miette!("directory holds no resource files"));
        }

        let out = if !self.overwrite {
            File::create_new(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        } else {
            File::create(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        };

        let mut options = ContainerWriterOptions::builder()
            .container_type(self.container_type())
            .build();
        if let Some(description) = &self.description {
            options.localized_strings.insert(0, description.clone());
        }
        let mut container = ContainerWriter::new(out, options);

        for (id, path) in files {
            info!("packing {}", id);
            container
                .start_entry(id.clone())
                .context(format!("starting entry for {id}"))?;

            let mut f = File::open(&path)
                .into_diagnostic()
                .context(format!("opening {}", path.display()))?;

            std::io::copy(&mut f, &mut container)
                .into_diagnostic()
                .context(format!("copying {}", path.display()))?;
        }

        container.finish().context("finalizing container")?;

        Ok(())
    }
}
