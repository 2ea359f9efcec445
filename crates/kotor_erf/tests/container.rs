use std::collections::BTreeMap;
use std::io::{Read, Write};

use kotor_common::{ResourceId, ResourceKind};
use kotor_erf::error::{Error, Result};
use kotor_erf::{
    write_container, ContainerArchive, ContainerType, ContainerWriter, ContainerWriterOptions,
};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

/// Small deterministic generator so failures reproduce from the seed alone
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn sample_entries(seed: u64, count: usize) -> Result<BTreeMap<ResourceId, Vec<u8>>> {
    const KINDS: &[ResourceKind] = &[
        ResourceKind::Utc,
        ResourceKind::Utd,
        ResourceKind::Dlg,
        ResourceKind::Ncs,
        ResourceKind::TwoDa,
        ResourceKind::Tga,
    ];

    let mut rng = XorShift(seed);
    let mut entries = BTreeMap::new();
    for i in 0..count {
        let kind = KINDS[rng.below(KINDS.len() as u64) as usize];
        let id = ResourceId::new(format!("res_{i:04}"), kind)?;
        let data = (0..rng.below(300)).map(|_| rng.next() as u8).collect();
        entries.insert(id, data);
    }
    Ok(entries)
}

fn all_types() -> [ContainerType; 5] {
    [
        ContainerType::Erf,
        ContainerType::Mod,
        ContainerType::Sav,
        ContainerType::Hak,
        ContainerType::Rim,
    ]
}

#[traced_test]
#[test]
fn write_then_read_identity() -> Result<()> {
    let entries = sample_entries(0xC0FFEE, 40)?;

    for container_type in all_types() {
        let bytes = write_container(
            &entries,
            ContainerWriterOptions::builder()
                .container_type(container_type)
                .build(),
        )?;
        let mut archive = ContainerArchive::from_bytes(bytes)?;

        assert_eq!(archive.container_type(), container_type);
        assert_eq!(archive.len(), entries.len());
        for (id, data) in &entries {
            assert_eq!(&archive.fetch(id)?, data, "{container_type} {id}");
        }
        assert!(archive
            .ids()
            .zip(entries.keys())
            .all(|(actual, expected)| actual == expected));
    }
    Ok(())
}

#[test]
fn output_ignores_insertion_order() -> Result<()> {
    let entries = sample_entries(7, 25)?;

    for container_type in all_types() {
        let options = ContainerWriterOptions::builder()
            .container_type(container_type)
            .build();

        let mut forward = ContainerWriter::new(Vec::new(), options.clone());
        for (id, data) in &entries {
            forward.insert(id.clone(), data.clone());
        }

        let mut backward = ContainerWriter::new(Vec::new(), options);
        for (id, data) in entries.iter().rev() {
            backward.start_entry(id.clone())?;
            backward.write_all(data)?;
        }

        assert_eq!(forward.finish()?, backward.finish()?, "{container_type}");
    }
    Ok(())
}

#[test]
fn description_survives() -> Result<()> {
    let strings: BTreeMap<u32, String> =
        [(0, "Endar Spire".to_string()), (2, "Endar Spire (FR)".to_string())].into();
    let bytes = ContainerWriter::new(
        Vec::new(),
        ContainerWriterOptions::builder()
            .container_type(ContainerType::Mod)
            .localized_strings(strings.clone())
            .description_strref(42)
            .build_year(103)
            .build_day(160)
            .build(),
    )
    .finish()?;

    let archive = ContainerArchive::from_bytes(bytes)?;
    let index = archive.index();
    assert_eq!(index.localized_strings(), &strings);
    assert_eq!(index.description_strref(), 42);
    assert_eq!(index.build_year(), 103);
    assert_eq!(index.build_day(), 160);
    assert!(archive.is_empty());
    Ok(())
}

#[test]
fn stream_entry_through_reader() -> Result<()> {
    let entries = sample_entries(99, 5)?;
    let bytes = write_container(&entries, ContainerWriterOptions::default())?;
    let mut archive = ContainerArchive::from_bytes(bytes)?;

    let (id, expected) = entries.iter().nth(2).expect("five entries");
    let mut file = archive.by_id(id)?;
    assert_eq!(file.size(), expected.len() as u64);

    let mut actual = Vec::new();
    file.read_to_end(&mut actual)?;
    assert_eq!(&actual, expected);

    let first = archive.by_index(0)?.id().clone();
    assert_eq!(Some(&first), entries.keys().next());
    Ok(())
}

#[test]
fn open_from_disk() -> Result<()> {
    let entries = sample_entries(3, 10)?;
    let bytes = write_container(
        &entries,
        ContainerWriterOptions::builder()
            .container_type(ContainerType::Rim)
            .build(),
    )?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("danm13.rim");
    std::fs::write(&path, bytes)?;

    let mut archive = ContainerArchive::open(&path)?;
    for (id, data) in &entries {
        assert_eq!(&archive.fetch(id)?, data);
    }
    Ok(())
}

#[traced_test]
#[test]
fn mutated_archives_never_panic() -> Result<()> {
    let mut rng = XorShift(0xBADC0DE);

    for container_type in all_types() {
        let valid = write_container(
            &sample_entries(rng.next(), 12)?,
            ContainerWriterOptions::builder()
                .container_type(container_type)
                .localized_strings([(0, "desc".to_string())].into())
                .build(),
        )?;

        for _ in 0..300 {
            let mut bytes = valid.clone();
            if rng.below(2) == 0 {
                bytes.truncate(rng.below(bytes.len() as u64) as usize);
            } else {
                // the header and tables hold every offset
                let limit = bytes.len().min(600) as u64;
                let at = rng.below(limit - 4) as usize;
                bytes[at..at + 4].copy_from_slice(&(rng.next() as u32).to_le_bytes());
            }

            let mut archive = match ContainerArchive::from_bytes(bytes) {
                Ok(archive) => archive,
                Err(Error::CorruptArchive { .. } | Error::TruncatedData { .. }) => continue,
                Err(Error::BinRWError(_) | Error::IOError(_)) => continue,
                Err(other) => panic!("unexpected error kind: {other}"),
            };
            let ids: Vec<_> = archive.ids().cloned().collect();
            for id in ids {
                archive.fetch(&id)?;
            }
        }
    }
    Ok(())
}
