//! The two-pass remapping pipeline.
//!
//! Pass one renames classes and rewrites every embedded type name, producing
//! an intermediate archive in a temporary file next to the output. Pass two
//! reads that intermediate back (so hierarchy walks see final class names),
//! renames members and local variables, and writes the final archive. The
//! optional hash features run between the passes against the intermediate:
//! hash-mapping generation records a content hash per mapped class, and
//! hash-based regeneration matches recorded hashes against a changed archive
//! and stops without running pass two. The intermediate is removed on every
//! exit path, including errors.

use std::{
    fmt::Write as _,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use log::{debug, info};
use md5::{Digest, Md5};
use tempfile::NamedTempFile;

use crate::{
    archive::{ArchiveEntry, JarReader, JarWriter},
    classfile::ClassFile,
    graph::{ClassGraph, DEFAULT_CACHE_LIMIT},
    mappings::{MappingOptions, SymbolTable},
    resolve::MemberResolver,
    rewrite::{classes, members},
    Result,
};

/// Configuration for one remapping run.
///
/// Carried explicitly into every component rather than read from process-wide
/// state, so runs are independently constructable in tests.
#[derive(Debug, Clone)]
pub struct RemapConfig {
    /// The obfuscated input archive.
    pub input: PathBuf,
    /// Destination of the remapped archive.
    pub output: PathBuf,
    /// The class mapping feed.
    pub class_mappings: PathBuf,
    /// The member mapping feed.
    pub member_mappings: PathBuf,
    /// Root namespace prefix enforced on mapped names, with trailing `/`.
    pub root_namespace: String,
    /// Require and ingest the hash column of the class mapping feed.
    pub check_hashes: bool,
    /// Emit a sibling class-mapping file augmented with content hashes.
    pub generate_hash_mappings: bool,
    /// Match recorded hashes against the archive and emit regenerated
    /// mappings instead of running the member pass.
    pub regenerate_from_hashes: bool,
    /// Parsed-class cache bound for hierarchy walks.
    pub class_cache_limit: usize,
}

impl RemapConfig {
    /// A config with default options for the given paths.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        class_mappings: impl Into<PathBuf>,
        member_mappings: impl Into<PathBuf>,
    ) -> Self {
        RemapConfig {
            input: input.into(),
            output: output.into(),
            class_mappings: class_mappings.into(),
            member_mappings: member_mappings.into(),
            root_namespace: MappingOptions::default().root_namespace,
            check_hashes: false,
            generate_hash_mappings: false,
            regenerate_from_hashes: false,
            class_cache_limit: DEFAULT_CACHE_LIMIT,
        }
    }
}

/// What a completed run did.
#[derive(Debug)]
pub struct RemapSummary {
    /// Class mappings loaded from the feed.
    pub class_mappings: usize,
    /// Member mappings loaded from the feed.
    pub member_mappings: usize,
    /// Archive entries written to the final (or intermediate, when
    /// regeneration stopped the run) archive.
    pub entries_written: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Drives a full remapping run over one archive.
pub struct Remapper {
    config: RemapConfig,
    table: SymbolTable,
}

impl Remapper {
    /// Loads the mapping feeds and prepares a run.
    pub fn new(config: RemapConfig) -> Result<Self> {
        let options = MappingOptions {
            root_namespace: config.root_namespace.clone(),
            // Regeneration is meaningless without the hash column.
            check_hashes: config.check_hashes || config.regenerate_from_hashes,
        };
        let table =
            SymbolTable::from_files(&config.class_mappings, &config.member_mappings, &options)?;
        Ok(Remapper { config, table })
    }

    /// The loaded symbol table.
    #[must_use]
    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    /// Runs the pipeline to completion.
    pub fn run(&self) -> Result<RemapSummary> {
        let started = Instant::now();
        let intermediate = match self
            .config
            .output
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
        {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        info!("Deobfuscating classes...");
        self.remap_classes(&self.config.input, intermediate.path())?;

        if self.config.generate_hash_mappings {
            info!("Generating hashes...");
            self.write_hash_mappings(intermediate.path())?;
        }
        if self.config.regenerate_from_hashes {
            info!("Generating mappings from hashes...");
            let entries_written = self.regenerate_mappings(intermediate.path())?;
            return Ok(self.summary(entries_written, started));
        }

        info!("Remapping members...");
        let entries_written = self.remap_members(intermediate.path(), &self.config.output)?;
        let summary = self.summary(entries_written, started);
        info!(
            "Deobfuscated {} classes and {} member mappings in {}ms!",
            summary.class_mappings,
            summary.member_mappings,
            summary.elapsed.as_millis()
        );
        Ok(summary)
    }

    /// Pass one. Classes already packaged under a foreign namespace are
    /// copied verbatim; everything else goes through the class rewrite and is
    /// stored under its new name.
    fn remap_classes(&self, input: &Path, output: &Path) -> Result<()> {
        let reader = JarReader::open(input)?;
        let mut writer = JarWriter::create(output)?;
        for entry in reader.entries() {
            match entry? {
                ArchiveEntry::Resource { name, data } => writer.write_resource(&name, &data)?,
                ArchiveEntry::Class { name, data } => {
                    if name.contains('/') && !name.starts_with(self.table.root_namespace()) {
                        writer.write_class(&name, &data)?;
                        continue;
                    }
                    let rewritten = classes::rewrite(ClassFile::parse(&data)?, &self.table)?;
                    let new_name = rewritten.this_class_name()?.to_string();
                    writer.write_class(&new_name, &rewritten.to_bytes()?)?;
                    if new_name != name {
                        debug!("Remapped {name} to {new_name}");
                    }
                }
            }
        }
        writer.finish()
    }

    /// Pass two. Only classes under the root namespace are rewritten; the
    /// rest of the intermediate is copied through.
    fn remap_members(&self, input: &Path, output: &Path) -> Result<usize> {
        let reader = JarReader::open(input)?;
        let graph = ClassGraph::with_limit(&reader, self.config.class_cache_limit);
        let resolver = MemberResolver::new(&self.table, &graph);
        let mut writer = JarWriter::create(output)?;
        let mut entries_written = 0;
        for entry in reader.entries() {
            match entry? {
                ArchiveEntry::Resource { name, data } => writer.write_resource(&name, &data)?,
                ArchiveEntry::Class { name, data } => {
                    if !name.starts_with(self.table.root_namespace()) {
                        writer.write_class(&name, &data)?;
                    } else {
                        let rewritten = members::rewrite(ClassFile::parse(&data)?, &resolver)?;
                        writer.write_class(&name, &rewritten.to_bytes()?)?;
                    }
                }
            }
            entries_written += 1;
        }
        writer.finish()?;
        Ok(entries_written)
    }

    /// Emits `<class-mappings-stem>-hashes.<ext>`: the class mapping plus a
    /// content hash of each mapped class's intermediate bytes. Classes the
    /// archive does not contain are omitted.
    fn write_hash_mappings(&self, intermediate: &Path) -> Result<()> {
        let reader = JarReader::open(intermediate)?;
        let path = sibling_path(&self.config.class_mappings, "-hashes");
        let mut out = BufWriter::new(File::create(&path)?);
        let mut mappings: Vec<(&str, &str)> = self.table.class_mappings().collect();
        mappings.sort_unstable();
        for (old, new) in mappings {
            if let Some(data) = reader.read_class(new)? {
                writeln!(out, "{} {} {}", old, new, hex_digest(&data))?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Emits `<class-mappings-stem>-from-hashes.<ext>`: for every class in
    /// the intermediate whose content hash matches a recorded one, a mapping
    /// line reconnecting the class's current name to the recorded new name.
    fn regenerate_mappings(&self, intermediate: &Path) -> Result<usize> {
        let reader = JarReader::open(intermediate)?;
        let path = sibling_path(&self.config.class_mappings, "-from-hashes");
        let mut out = BufWriter::new(File::create(&path)?);
        let mut entries_seen = 0;
        for entry in reader.entries() {
            let entry = entry?;
            entries_seen += 1;
            let ArchiveEntry::Class { name, data } = entry else {
                continue;
            };
            let digest = hex_digest(&data);
            let Some(recorded_old) = self.table.class_for_hash(&digest) else {
                continue;
            };
            let Some(new_name) = self.table.map_class(recorded_old) else {
                continue;
            };
            // The class may have kept its (new) obfuscated name through pass
            // one; recover the original-space name for the emitted key.
            let current = self.table.unmap_class(&name).unwrap_or(name);
            writeln!(out, "{} {} {}", current, new_name, digest)?;
        }
        out.flush()?;
        Ok(entries_seen)
    }

    fn summary(&self, entries_written: usize, started: Instant) -> RemapSummary {
        RemapSummary {
            class_mappings: self.table.class_count(),
            member_mappings: self.table.member_count(),
            entries_written,
            elapsed: started.elapsed(),
        }
    }
}

/// `mappings.txt` + `-hashes` -> `mappings-hashes.txt`.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mappings");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(extension) => format!("{stem}{suffix}.{extension}"),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

fn hex_digest(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    let mut out = String::with_capacity(32);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::build::ClassBuilder;
    use std::fs;
    use tempfile::TempDir;

    const NS: &str = "net/minecraft/server/";

    struct Fixture {
        dir: TempDir,
        config: RemapConfig,
    }

    fn fixture(class_lines: &str, member_lines: &str, classes: &[(&str, Vec<u8>)]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.jar");
        let output = dir.path().join("output.jar");
        let class_mappings = dir.path().join("classes.txt");
        let member_mappings = dir.path().join("members.txt");
        fs::write(&class_mappings, class_lines).unwrap();
        fs::write(&member_mappings, member_lines).unwrap();
        let mut writer = JarWriter::create(&input).unwrap();
        writer.write_resource("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n").unwrap();
        for (name, data) in classes {
            writer.write_class(name, data).unwrap();
        }
        writer.finish().unwrap();
        Fixture {
            dir,
            config: RemapConfig::new(input, output, class_mappings, member_mappings),
        }
    }

    fn read_class(path: &Path, name: &str) -> Option<ClassFile> {
        let reader = JarReader::open(path).unwrap();
        reader
            .read_class(name)
            .unwrap()
            .map(|data| ClassFile::parse(&data).unwrap())
    }

    #[test]
    fn full_pipeline_renames_classes_and_members() {
        // aa -> Test declares someField; aa$1 is anonymous and references it.
        let mut outer = ClassBuilder::new("aa", Some("java/lang/Object"));
        outer.add_field(0x0001, "someField", "I");
        let mut anonymous = ClassBuilder::new("aa$1", Some("aa"));
        let field_ref = anonymous.field_ref("aa", "someField", "I");
        let fixture = fixture(
            "aa Test\naa$a Test$InnerClass\n",
            "aa someField newField\n",
            &[
                ("aa", outer.bytes()),
                ("aa$a", ClassBuilder::new("aa$a", Some("aa")).bytes()),
                ("aa$1", anonymous.bytes()),
            ],
        );
        let summary = Remapper::new(fixture.config.clone()).unwrap().run().unwrap();
        assert_eq!(summary.class_mappings, 2);
        assert_eq!(summary.member_mappings, 1);
        assert_eq!(summary.entries_written, 4);

        let output = &fixture.config.output;
        let outer = read_class(output, &format!("{NS}Test")).unwrap();
        assert_eq!(outer.fields[0].name(&outer.pool).unwrap(), "newField");
        assert!(read_class(output, &format!("{NS}Test$InnerClass")).is_some());
        // The anonymous class keeps its numeric suffix on the mapped outer
        // name, and its field reference follows the rename.
        let anonymous = read_class(output, &format!("{NS}Test$1")).unwrap();
        assert_eq!(
            anonymous.pool.member_ref(field_ref).unwrap(),
            (format!("{NS}Test").as_str(), "newField", "I")
        );
        assert_eq!(
            anonymous.super_class_name().unwrap().unwrap(),
            format!("{NS}Test")
        );
    }

    #[test]
    fn class_pass_is_idempotent_over_its_own_output() {
        let mut outer = ClassBuilder::new("aa", Some("java/lang/Object"));
        outer.add_field(0x0001, "someField", "Laa;");
        let fixture = fixture(
            "aa Test\naa$a Test$InnerClass\n",
            "",
            &[
                ("aa", outer.bytes()),
                ("aa$a", ClassBuilder::new("aa$a", Some("aa")).bytes()),
                ("aa$1", ClassBuilder::new("aa$1", Some("aa")).bytes()),
            ],
        );
        let remapper = Remapper::new(fixture.config.clone()).unwrap();
        let first = fixture.dir.path().join("first.jar");
        let second = fixture.dir.path().join("second.jar");
        remapper
            .remap_classes(&fixture.config.input, &first)
            .unwrap();
        // Mapped values must not re-trigger as mapping keys: a second pass
        // over the first pass's output has to leave every entry untouched.
        remapper.remap_classes(&first, &second).unwrap();
        let once = JarReader::open(&first).unwrap();
        let twice = JarReader::open(&second).unwrap();
        assert_eq!(once.len(), twice.len());
        for position in 0..once.len() {
            match (once.entry(position).unwrap(), twice.entry(position).unwrap()) {
                (
                    ArchiveEntry::Class {
                        name: first_name,
                        data: first_data,
                    },
                    ArchiveEntry::Class {
                        name: second_name,
                        data: second_data,
                    },
                ) => {
                    assert_eq!(first_name, second_name);
                    assert_eq!(first_data, second_data);
                }
                (
                    ArchiveEntry::Resource {
                        name: first_name,
                        data: first_data,
                    },
                    ArchiveEntry::Resource {
                        name: second_name,
                        data: second_data,
                    },
                ) => {
                    assert_eq!(first_name, second_name);
                    assert_eq!(first_data, second_data);
                }
                _ => panic!("entry kind changed between passes"),
            }
        }
    }

    #[test]
    fn inherited_member_reference_resolves_through_hierarchy() {
        let mut parent = ClassBuilder::new("aa", Some("java/lang/Object"));
        parent.add_field(0x0004, "someField", "I"); // protected
        let child = ClassBuilder::new("ab", Some("aa"));
        let mut user = ClassBuilder::new("ac", Some("java/lang/Object"));
        // Reference through the subclass; the field lives on the parent.
        let child_ref = user.field_ref("ab", "someField", "I");
        let fixture = fixture(
            "aa Parent\nab Child\nac User\n",
            "aa someField newField\n",
            &[
                ("aa", parent.bytes()),
                ("ab", child.bytes()),
                ("ac", user.bytes()),
            ],
        );
        Remapper::new(fixture.config.clone()).unwrap().run().unwrap();
        let user = read_class(&fixture.config.output, &format!("{NS}User")).unwrap();
        assert_eq!(
            user.pool.member_ref(child_ref).unwrap(),
            (format!("{NS}Child").as_str(), "newField", "I")
        );
    }

    #[test]
    fn foreign_namespace_classes_pass_through() {
        let foreign = ClassBuilder::new("com/example/Lib", Some("java/lang/Object"));
        let bytes = foreign.bytes();
        let fixture = fixture("aa Test\n", "", &[("com/example/Lib", bytes.clone())]);
        Remapper::new(fixture.config.clone()).unwrap().run().unwrap();
        let reader = JarReader::open(&fixture.config.output).unwrap();
        assert_eq!(
            reader.read_class("com/example/Lib").unwrap().unwrap(),
            bytes
        );
    }

    #[test]
    fn hash_mappings_are_emitted_for_mapped_classes() {
        let outer = ClassBuilder::new("aa", Some("java/lang/Object"));
        let mut fixture = fixture("aa Test\nbb Missing\n", "", &[("aa", outer.bytes())]);
        fixture.config.generate_hash_mappings = true;
        Remapper::new(fixture.config.clone()).unwrap().run().unwrap();
        let hashes =
            fs::read_to_string(fixture.dir.path().join("classes-hashes.txt")).unwrap();
        let lines: Vec<&str> = hashes.lines().collect();
        // bb is not in the archive, so only aa gets a hash line.
        assert_eq!(lines.len(), 1);
        let fields: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(fields[0], "aa");
        assert_eq!(fields[1], format!("{NS}Test"));
        assert_eq!(fields[2].len(), 32);
    }

    #[test]
    fn regeneration_matches_hashes_and_skips_the_member_pass() {
        let outer = ClassBuilder::new("aa", Some("java/lang/Object"));
        // Learn the post-pass-one hash first.
        let mut first = fixture("aa Test\n", "", &[("aa", outer.bytes())]);
        first.config.generate_hash_mappings = true;
        Remapper::new(first.config.clone()).unwrap().run().unwrap();
        let hashes = fs::read_to_string(first.dir.path().join("classes-hashes.txt")).unwrap();

        // Re-run in regeneration mode against the same archive, feeding the
        // hash-augmented mapping back in.
        let mut second = fixture("", "", &[("aa", outer.bytes())]);
        fs::write(&second.config.class_mappings, &hashes).unwrap();
        second.config.regenerate_from_hashes = true;
        Remapper::new(second.config.clone()).unwrap().run().unwrap();
        let regenerated =
            fs::read_to_string(second.dir.path().join("classes-from-hashes.txt")).unwrap();
        let fields: Vec<&str> = regenerated.split_whitespace().collect();
        assert_eq!(fields[0], "aa");
        assert_eq!(fields[1], format!("{NS}Test"));
        // The member pass never ran.
        assert!(!second.config.output.exists());
    }

    #[test]
    fn intermediate_archive_is_removed() {
        let fixture = fixture("aa Test\n", "", &[]);
        Remapper::new(fixture.config.clone()).unwrap().run().unwrap();
        let leftovers: Vec<_> = fs::read_dir(fixture.dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().into_string().unwrap())
            .filter(|name| !matches!(
                name.as_str(),
                "input.jar" | "output.jar" | "classes.txt" | "members.txt"
            ))
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    }
}
