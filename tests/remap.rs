//! Public-surface integration tests for the remapping pipeline.
//!
//! Class-level behaviour is covered in depth by the unit tests inside the
//! crate, which can assemble classfile fixtures directly. These tests exercise
//! what an embedding caller sees: configuration defaults, archive handling for
//! entries that carry no classes, and the hash-mapping side outputs.

use std::fs;

use jarremap::prelude::*;
use tempfile::TempDir;

/// Writes the two mapping feeds and returns a config pointing at them.
fn config_in(dir: &TempDir, class_lines: &str, member_lines: &str) -> RemapConfig {
    let classes = dir.path().join("classes.txt");
    let members = dir.path().join("members.txt");
    fs::write(&classes, class_lines).unwrap();
    fs::write(&members, member_lines).unwrap();
    RemapConfig::new(
        dir.path().join("input.jar"),
        dir.path().join("output.jar"),
        classes,
        members,
    )
}

fn write_resource_jar(config: &RemapConfig, entries: &[(&str, &[u8])]) {
    let mut writer = JarWriter::create(&config.input).unwrap();
    for (name, data) in entries {
        writer.write_resource(name, data).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn config_defaults() {
    let config = RemapConfig::new("in.jar", "out.jar", "classes.txt", "members.txt");
    assert_eq!(config.root_namespace, "net/minecraft/server/");
    assert!(!config.check_hashes);
    assert!(!config.generate_hash_mappings);
    assert!(!config.regenerate_from_hashes);
}

#[test]
fn missing_mapping_feed_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = RemapConfig::new(
        dir.path().join("input.jar"),
        dir.path().join("output.jar"),
        dir.path().join("no-such-classes.txt"),
        dir.path().join("no-such-members.txt"),
    );
    assert!(matches!(Remapper::new(config), Err(Error::FileError(_))));
}

#[test]
fn resources_pass_through_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, "aa Test\n", "");
    write_resource_jar(
        &config,
        &[
            ("META-INF/", b""),
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ("assets/lang/en.json", b"{}"),
        ],
    );

    let summary = Remapper::new(config.clone()).unwrap().run().unwrap();
    assert_eq!(summary.class_mappings, 1);
    assert_eq!(summary.member_mappings, 0);
    assert_eq!(summary.entries_written, 3);

    let reader = JarReader::open(&config.output).unwrap();
    assert_eq!(reader.len(), 3);
    let mut manifest = None;
    for entry in reader.entries() {
        if let ArchiveEntry::Resource { name, data } = entry.unwrap() {
            if name == "META-INF/MANIFEST.MF" {
                manifest = Some(data);
            }
        }
    }
    assert_eq!(manifest.unwrap(), b"Manifest-Version: 1.0\n");
}

#[test]
fn loaded_table_is_queryable_through_the_remapper() {
    let dir = TempDir::new().unwrap();
    let config = config_in(
        &dir,
        "aa Test\nbb Other\n",
        "aa someField newField\naa a ()V run\n",
    );
    write_resource_jar(&config, &[("readme.txt", b"hello")]);

    let remapper = Remapper::new(config).unwrap();
    let table = remapper.table();
    assert_eq!(table.class_count(), 2);
    assert_eq!(table.member_count(), 2);
    assert_eq!(
        table.map_class("aa").as_deref(),
        Some("net/minecraft/server/Test")
    );
    assert_eq!(
        table.field_name("net/minecraft/server/aa", "someField"),
        Some("newField")
    );
}

#[test]
fn hash_mappings_land_next_to_the_class_feed() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir, "aa Test\n", "");
    config.generate_hash_mappings = true;
    write_resource_jar(&config, &[("readme.txt", b"hello")]);

    Remapper::new(config.clone()).unwrap().run().unwrap();

    // No mapped class is present in the archive, so the file exists but
    // carries no lines.
    let hashes = dir.path().join("classes-hashes.txt");
    assert_eq!(fs::read_to_string(hashes).unwrap(), "");
}

#[test]
fn regeneration_stops_before_the_member_pass() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(
        &dir,
        "aa Test d41d8cd98f00b204e9800998ecf8427e\n",
        "",
    );
    config.regenerate_from_hashes = true;
    write_resource_jar(&config, &[("readme.txt", b"hello")]);

    let summary = Remapper::new(config.clone()).unwrap().run().unwrap();
    assert_eq!(summary.entries_written, 1);

    // The run ends after regeneration; no final archive is produced.
    assert!(!config.output.exists());
    let regenerated = dir.path().join("classes-from-hashes.txt");
    assert_eq!(fs::read_to_string(regenerated).unwrap(), "");
}
