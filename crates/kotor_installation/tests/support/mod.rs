#![allow(dead_code)]

use std::{collections::BTreeMap, fs, path::Path};

use kotor_common::ResourceId;
use kotor_erf::{write_container, ContainerType, ContainerWriterOptions};
use kotor_installation::error::Result;
use kotor_key::{CatalogWriter, CatalogWriterOptions};

pub fn id(filename: &str) -> ResourceId {
    filename.parse().expect("valid resource file name")
}

/// `chitin.key` plus one `data/base.bif` holding `entries`
pub fn catalog(root: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
    let mut writer = CatalogWriter::new(CatalogWriterOptions::default());
    let base = writer.add_archive("data/base.bif")?;
    for (name, data) in entries {
        writer.insert(base, id(name), data.to_vec())?;
    }
    writer.finish()?.write_to(root, "chitin.key")?;
    Ok(())
}

pub fn container_bytes(container_type: ContainerType, entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let entries: BTreeMap<ResourceId, Vec<u8>> = entries
        .iter()
        .map(|(name, data)| (id(name), data.to_vec()))
        .collect();
    Ok(write_container(
        &entries,
        ContainerWriterOptions::builder()
            .container_type(container_type)
            .build(),
    )?)
}

/// Write a container at `root/relative`, creating parent directories
pub fn container(
    root: &Path,
    relative: &str,
    container_type: ContainerType,
    entries: &[(&str, &[u8])],
) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, container_bytes(container_type, entries)?)?;
    Ok(())
}

/// Write a loose file at `root/relative`, creating parent directories
pub fn loose(root: &Path, relative: &str, data: &[u8]) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    Ok(())
}
