mod support;

use std::collections::HashSet;
use std::fs;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use kotor_common::{ResourceId, ResourceKind};
use kotor_erf::ContainerType;
use kotor_installation::error::{Error, Result};
use kotor_installation::{
    Installation, InstallationOptions, LoadState, Provenance, RefreshReport,
};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

use support::{catalog, container, id, loose};

fn ready(root: &std::path::Path) -> Result<Installation> {
    let installation = Installation::new(root, InstallationOptions::default());
    installation.load(|_| ControlFlow::Continue(()))?;
    Ok(installation)
}

#[traced_test]
#[test]
fn container_shadows_catalog() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("door01.utd", &[0x00, 0x01, 0x02])])?;
    container(root, "modules/danm13.mod", ContainerType::Mod, &[("door01.utd", &[0xFF, 0xFE])])?;

    let installation = ready(root)?;
    let door = installation.resolve(&ResourceId::new("DOOR01", ResourceKind::Utd)?)?;
    assert_eq!(door.data, vec![0xFF, 0xFE]);
    assert_eq!(
        door.provenance,
        Provenance::Container {
            path: root.join("modules/danm13.mod")
        }
    );

    assert_eq!(
        installation.resolve_all(&id("door01.utd"))?,
        vec![
            Provenance::Container {
                path: root.join("modules/danm13.mod")
            },
            Provenance::BaseArchive {
                archive: root.join("data/base.bif")
            },
        ]
    );
    Ok(())
}

#[traced_test]
#[test]
fn override_wins_until_removed() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("p_bastila.utc", b"catalog")])?;
    container(root, "modules/end_m01aa.mod", ContainerType::Mod, &[("p_bastila.utc", b"container")])?;
    loose(root, "override/npc/p_bastila.utc", b"override")?;

    let installation = ready(root)?;
    let bastila = id("p_bastila.utc");
    assert_eq!(installation.resolve(&bastila)?.data, b"override");
    assert_eq!(
        installation.locate(&bastila)?,
        Some(Provenance::LooseFile {
            path: root.join("override/npc/p_bastila.utc")
        })
    );
    assert_eq!(installation.resolve_all(&bastila)?.len(), 3);

    fs::remove_file(root.join("override/npc/p_bastila.utc"))?;
    // still listed by the snapshot taken at load, but reads fall through to the container
    assert!(installation.locate(&bastila)?.is_some());
    let stale = installation.resolve(&bastila)?;
    assert_eq!(stale.data, b"container");
    assert_eq!(
        stale.provenance,
        Provenance::Container {
            path: root.join("modules/end_m01aa.mod")
        }
    );

    let generation = installation.generation();
    let report = installation.refresh()?;
    assert_eq!(
        report,
        RefreshReport {
            unchanged: 1,
            ..Default::default()
        }
    );
    assert_eq!(installation.generation(), generation + 1);
    assert_eq!(installation.resolve(&bastila)?.data, b"container");
    Ok(())
}

#[test]
fn missing_resource() -> Result<()> {
    let dir = tempfile::tempdir()?;
    catalog(dir.path(), &[("a.utc", b"a")])?;
    let installation = ready(dir.path())?;

    let missing = id("nothing.dlg");
    let err = installation.resolve(&missing).unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert_eq!(installation.locate(&missing)?, None);
    assert!(installation.resolve_all(&missing)?.is_empty());
    assert!(!installation.contains(&missing)?);
    assert!(installation.contains(&id("A.UTC"))?);
    Ok(())
}

#[traced_test]
#[test]
fn enumerate_lists_each_id_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("a.utc", b"1"), ("shared.2da", b"1"), ("b.dlg", b"1")])?;
    container(root, "modules/aaa.mod", ContainerType::Mod, &[("shared.2da", b"2"), ("b.dlg", b"2")])?;
    container(
        root,
        "modules/Bbb.rim",
        ContainerType::Rim,
        &[("shared.2da", b"3"), ("b.dlg", b"3"), ("c.ncs", b"3")],
    )?;
    loose(root, "override/shared.2da", b"4")?;

    let installation = ready(root)?;
    let all: Vec<ResourceId> = installation.enumerate(None)?.collect();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0], id("shared.2da"));
    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(unique.len(), all.len());

    assert_eq!(
        installation.enumerate(Some(ResourceKind::Utc))?.collect::<Vec<_>>(),
        vec![id("a.utc")]
    );

    let provenance: Vec<(ResourceId, Provenance)> =
        installation.enumerate(None)?.with_provenance().collect();
    let dialog = provenance
        .iter()
        .find(|(id, _)| id.kind == ResourceKind::Dlg)
        .map(|(_, p)| p.clone());
    // `aaa.mod` sorts before `Bbb.rim`
    assert_eq!(
        dialog,
        Some(Provenance::Container {
            path: root.join("modules/aaa.mod")
        })
    );
    assert_eq!(installation.resolve(&id("b.dlg"))?.data, b"2");
    assert_eq!(installation.resolve(&id("c.ncs"))?.data, b"3");

    // stopping early is fine
    assert_eq!(installation.enumerate(None)?.take(1).count(), 1);
    Ok(())
}

#[test]
fn load_reports_progress_and_can_be_cancelled() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("a.utc", b"a")])?;
    container(root, "modules/one.mod", ContainerType::Mod, &[("b.utc", b"b")])?;
    container(root, "rims/two.rim", ContainerType::Rim, &[("c.utc", b"c")])?;

    let installation = Installation::new(root, InstallationOptions::default());
    let err = installation
        .load(|progress| {
            if progress.done == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(installation.state(), LoadState::Unloaded);
    assert!(matches!(installation.providers(), Err(Error::NotReady)));

    let mut updates = Vec::new();
    installation.load(|progress| {
        updates.push((progress.done, progress.total));
        ControlFlow::Continue(())
    })?;
    assert_eq!(updates, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    assert_eq!(installation.state(), LoadState::Ready);
    assert_eq!(installation.providers()?.len(), 4);
    Ok(())
}

#[traced_test]
#[test]
fn broken_container_is_skipped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("a.utc", b"a")])?;
    loose(root, "modules/broken.mod", b"MOD V1.0 but nothing after")?;
    container(root, "modules/fine.mod", ContainerType::Mod, &[("b.utc", b"b")])?;

    let installation = ready(root)?;
    let warnings = installation.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, root.join("modules/broken.mod"));
    assert_eq!(installation.resolve(&id("b.utc"))?.data, b"b");
    assert!(logs_contain("skipping container"));
    Ok(())
}

#[test]
fn options_rename_providers() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let mut writer = kotor_key::CatalogWriter::default();
    let base = writer.add_archive("data/base.bif")?;
    writer.insert(base, id("a.utc"), b"catalog".to_vec())?;
    writer.finish()?.write_to(root, "CHITIN.KEY")?;
    loose(root, "Override/a.utc", b"override")?;
    container(root, "saves/000001/savegame.sav", ContainerType::Sav, &[("a.utc", b"save")])?;

    let options = InstallationOptions::builder()
        .catalog_name("chitin.key")
        .override_dir("mods")
        .container_dirs(Vec::new())
        .extra_containers(vec![root.join("saves/000001/savegame.sav")])
        .build();
    let installation = Installation::new(root, options);
    installation.load(|_| ControlFlow::Continue(()))?;

    // `Override` is no longer the loose directory
    assert_eq!(installation.resolve(&id("a.utc"))?.data, b"save");
    Ok(())
}

#[traced_test]
#[test]
fn refresh_counts_containers() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("a.utc", b"a")])?;
    container(root, "modules/one.mod", ContainerType::Mod, &[("one.utc", b"1")])?;
    container(root, "modules/two.mod", ContainerType::Mod, &[("two.utc", b"2")])?;
    container(root, "modules/three.mod", ContainerType::Mod, &[("three.utc", b"3")])?;

    let installation = ready(root)?;
    assert_eq!(installation.resolve(&id("two.utc"))?.data, b"2");

    container(
        root,
        "modules/two.mod",
        ContainerType::Mod,
        &[("two.utc", b"two, longer"), ("extra.utc", b"x")],
    )?;
    fs::remove_file(root.join("modules/three.mod"))?;
    container(root, "modules/four.erf", ContainerType::Erf, &[("four.utc", b"4")])?;

    let report = installation.refresh()?;
    assert_eq!(
        report,
        RefreshReport {
            added: 1,
            removed: 1,
            reopened: 1,
            unchanged: 1,
        }
    );
    assert_eq!(installation.resolve(&id("two.utc"))?.data, b"two, longer");
    assert_eq!(installation.resolve(&id("four.utc"))?.data, b"4");
    assert!(installation.resolve(&id("three.utc")).unwrap_err().is_not_found());
    assert_eq!(installation.resolve(&id("a.utc"))?.data, b"a");
    Ok(())
}

#[test]
fn resolve_while_refreshing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("base.utc", b"base")])?;
    container(root, "modules/m.mod", ContainerType::Mod, &[("mod.utc", b"mod")])?;
    loose(root, "override/loose.utc", b"loose")?;
    let installation = Arc::new(ready(root)?);

    thread::scope(|scope| {
        for _ in 0..4 {
            let installation = Arc::clone(&installation);
            scope.spawn(move || {
                for _ in 0..200 {
                    for (name, data) in [
                        ("base.utc", &b"base"[..]),
                        ("mod.utc", &b"mod"[..]),
                        ("loose.utc", &b"loose"[..]),
                    ] {
                        let resource = installation.resolve(&id(name)).expect("resolves");
                        assert_eq!(resource.data, data);
                    }
                }
            });
        }
        for _ in 0..20 {
            installation.refresh().expect("refresh");
        }
    });

    assert_eq!(installation.generation(), 21);
    Ok(())
}

/// Make `path` unreadable. `false` when the current user reads through mode 000 anyway.
#[cfg(unix)]
fn lock(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o000))?;
    Ok(fs::read_dir(path).is_err())
}

#[cfg(unix)]
fn unlock(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// Load and refresh with `locked` unreadable, restoring it before returning.
#[cfg(unix)]
fn load_locked(
    root: &Path,
    locked: &Path,
) -> Result<Option<(Installation, Result<()>, Result<RefreshReport>)>> {
    if !lock(locked)? {
        unlock(locked)?;
        return Ok(None);
    }
    let installation = Installation::new(root, InstallationOptions::default());
    let loaded = installation.load(|_| ControlFlow::Continue(()));
    let refreshed = installation.refresh();
    unlock(locked)?;
    Ok(Some((installation, loaded, refreshed)))
}

#[cfg(unix)]
#[traced_test]
#[test]
fn unreadable_override_directory_is_skipped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("a.utc", b"catalog")])?;
    container(root, "modules/m.mod", ContainerType::Mod, &[("b.utc", b"b")])?;
    loose(root, "override/ok.utc", b"ok")?;
    loose(root, "override/locked/hidden.utc", b"hidden")?;

    let locked = root.join("override/locked");
    let Some((installation, loaded, refreshed)) = load_locked(root, &locked)? else {
        return Ok(());
    };
    loaded?;
    assert_eq!(
        refreshed?,
        RefreshReport {
            unchanged: 1,
            ..Default::default()
        }
    );
    assert_eq!(installation.state(), LoadState::Ready);

    let warnings = installation.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, locked);
    assert!(logs_contain("skipping unreadable override entry"));

    assert_eq!(installation.resolve(&id("ok.utc"))?.data, b"ok");
    assert_eq!(installation.resolve(&id("b.utc"))?.data, b"b");
    assert_eq!(installation.resolve(&id("a.utc"))?.data, b"catalog");
    assert!(installation.resolve(&id("hidden.utc")).unwrap_err().is_not_found());
    Ok(())
}

#[cfg(unix)]
#[test]
fn unreadable_override_root_is_empty() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("a.utc", b"catalog")])?;
    loose(root, "override/a.utc", b"override")?;

    let locked = root.join("override");
    let Some((installation, loaded, refreshed)) = load_locked(root, &locked)? else {
        return Ok(());
    };
    loaded?;
    refreshed?;

    let warnings = installation.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, locked);
    assert_eq!(installation.resolve(&id("a.utc"))?.data, b"catalog");
    Ok(())
}

#[cfg(unix)]
#[traced_test]
#[test]
fn unreadable_container_directory_is_recorded() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    catalog(root, &[("a.utc", b"catalog")])?;
    container(root, "modules/m.mod", ContainerType::Mod, &[("b.utc", b"b")])?;
    container(root, "rims/r.rim", ContainerType::Rim, &[("c.utc", b"c")])?;

    let locked = root.join("modules");
    let Some((installation, loaded, refreshed)) = load_locked(root, &locked)? else {
        return Ok(());
    };
    loaded?;
    assert_eq!(
        refreshed?,
        RefreshReport {
            unchanged: 1,
            ..Default::default()
        }
    );
    assert_eq!(installation.state(), LoadState::Ready);

    let warnings = installation.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, locked);
    assert!(logs_contain("skipping unreadable container directory"));

    assert!(installation.resolve(&id("b.utc")).unwrap_err().is_not_found());
    assert_eq!(installation.resolve(&id("c.utc"))?.data, b"c");
    assert_eq!(installation.resolve(&id("a.utc"))?.data, b"catalog");
    Ok(())
}
