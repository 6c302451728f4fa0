use std::collections::BTreeMap;
use std::fs::{self, File};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::*;
use memmap2::Mmap;
use rayon::prelude::*;

use zipset::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// New entries all get the same timestamp, so builds are byte-for-byte repeatable.
fn fixed_options() -> WriteOptions {
    WriteOptions {
        last_modified: NaiveDate::from_ymd_opt(2019, 4, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
        ..WriteOptions::default()
    }
}

/// Entry names, in stored order
fn names(zip: &[u8]) -> Result<Vec<String>> {
    let archive = ZipArchive::new(zip)?;
    Ok(archive
        .entries()
        .iter()
        .map(|e| e.name().to_owned())
        .collect())
}

/// Entry names mapped to their (decompressed) contents
fn contents(zip: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let archive = ZipArchive::new(zip)?;
    let mut map = BTreeMap::new();
    for entry in archive.entries() {
        let data = if entry.is_dir() {
            Vec::new()
        } else {
            archive
                .read_to_vec(entry)
                .with_context(|| format!("Couldn't read {}", entry.path))?
        };
        map.insert(entry.name().to_owned(), data);
    }
    Ok(map)
}

/// Like `contents()`, but entries ending in `.zip` are opened up
/// and their own entries listed as `outer.zip!inner`.
/// Nested archives carry their entries' timestamps, so this is how to compare
/// builds made at different times.
fn contents_deep(zip: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut map = BTreeMap::new();
    for (name, data) in contents(zip)? {
        if name.ends_with(".zip") {
            for (inner_name, inner_data) in contents_deep(&data)? {
                map.insert(format!("{name}!{inner_name}"), inner_data);
            }
        } else {
            map.insert(name, data);
        }
    }
    Ok(map)
}

fn read_entry(zip: &[u8], name: &str) -> Result<Vec<u8>> {
    let archive = ZipArchive::new(zip)?;
    let entry = archive
        .by_name(name)
        .with_context(|| format!("No entry {name}"))?;
    Ok(archive.read_to_vec(entry)?)
}

/// A base archive with a little of everything
fn sample_base() -> Result<Vec<u8>> {
    let mut inner = ZipSet::new();
    inner
        .add_bytes("a.txt", "inner a")?
        .add_bytes("b.txt", "inner b")?;

    let mut zip = ZipSet::new();
    zip.add_bytes("keep.txt", "keep me")?
        .add_bytes("replace.txt", "old contents")?
        .add_bytes("delete.txt", "delete me")?
        .add_directory("docs")?
        .add_bytes("docs/readme.md", "# Hi")?
        .add_set("inner.zip", inner)?;
    Ok(zip.build_with(Vec::new(), &fixed_options())?)
}

#[test]
fn empty_set_is_an_empty_archive() -> Result<()> {
    init();
    let zip = ZipSet::new().build_to_vec()?;
    assert!(names(&zip)?.is_empty());
    Ok(())
}

#[test]
fn overwrites_win() -> Result<()> {
    init();
    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_bytes("replace.txt", "new contents")?;
    let built = zip.build_to_vec()?;

    assert_eq!(read_entry(&built, "replace.txt")?, b"new contents");
    // Overwriting doesn't duplicate the entry.
    let names = names(&built)?;
    assert_eq!(names.iter().filter(|n| *n == "replace.txt").count(), 1);
    Ok(())
}

#[test]
fn removals_remove() -> Result<()> {
    init();
    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.remove("delete.txt")?.remove("docs/")?;
    let built = contents(&zip.build_to_vec()?)?;

    assert!(!built.contains_key("delete.txt"));
    assert!(!built.contains_key("docs/"));
    // Removing a directory entry doesn't remove what's "in" it.
    assert_eq!(built["docs/readme.md"], b"# Hi");
    Ok(())
}

#[test]
fn last_change_wins() -> Result<()> {
    init();
    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_bytes("keep.txt", "changed")?.remove("keep.txt")?;
    assert!(!contents(&zip.build_to_vec()?)?.contains_key("keep.txt"));

    zip.add_bytes("keep.txt", "back again")?;
    assert_eq!(read_entry(&zip.build_to_vec()?, "keep.txt")?, b"back again");
    Ok(())
}

#[test]
fn untouched_entries_pass_through_verbatim() -> Result<()> {
    init();
    let base = sample_base()?;
    let mut zip = ZipSet::with_base_bytes(base.clone());
    zip.add_bytes("new.txt", "new")?;
    let built = zip.build_to_vec()?;

    let before = ZipArchive::new(&base)?;
    let after = ZipArchive::new(&built)?;
    for name in ["keep.txt", "docs/", "docs/readme.md", "inner.zip"] {
        let (old, new) = (
            before.by_name(name).unwrap(),
            after.by_name(name).unwrap(),
        );
        assert_eq!(before.raw(old)?, after.raw(new)?, "{name} changed");
        assert_eq!(old.crc32, new.crc32);
        assert_eq!(old.compression_method, new.compression_method);
        assert_eq!(old.last_modified, new.last_modified);
    }
    Ok(())
}

#[test]
fn base_order_comes_first() -> Result<()> {
    init();
    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_bytes("aaa.txt", "sorts first, lands last")?
        .add_bytes("replace.txt", "in place")?;
    assert_eq!(
        names(&zip.build_to_vec()?)?,
        [
            "delete.txt",
            "docs/",
            "docs/readme.md",
            "inner.zip",
            "keep.txt",
            "replace.txt",
            "aaa.txt"
        ]
    );
    Ok(())
}

#[test]
fn nested_paths_build_nested_archives() -> Result<()> {
    init();
    let mut zip = ZipSet::new();
    zip.add_bytes("a!b", "X")?;
    let built = zip.build_to_vec()?;

    assert_eq!(names(&built)?, ["a"]);
    let a = read_entry(&built, "a")?;
    assert_eq!(read_entry(&a, "b")?, b"X");
    Ok(())
}

#[test]
fn nested_changes_merge_with_nested_base() -> Result<()> {
    init();
    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_bytes("inner.zip!c.txt", "inner c")?
        .add_bytes("inner.zip!/b.txt", "inner b, revised")?
        .remove("inner.zip!a.txt")?;
    let built = zip.build_to_vec()?;

    let inner = contents(&read_entry(&built, "inner.zip")?)?;
    let expected: BTreeMap<String, Vec<u8>> = [
        ("b.txt".to_owned(), b"inner b, revised".to_vec()),
        ("c.txt".to_owned(), b"inner c".to_vec()),
    ]
    .into_iter()
    .collect();
    assert_eq!(inner, expected);

    // The outer archive is otherwise unchanged.
    assert_eq!(read_entry(&built, "keep.txt")?, b"keep me");
    Ok(())
}

#[test]
fn deeply_nested_changes() -> Result<()> {
    init();
    let mut base = ZipSet::new();
    base.add_bytes("a.zip!b.zip!c.txt", "c")?
        .add_bytes("a.zip!b.zip!d.txt", "d")?
        .add_bytes("a.zip!top.txt", "top")?;
    let base = base.build_to_vec()?;

    let mut zip = ZipSet::with_base_bytes(base);
    zip.add_bytes("a.zip!b.zip!e.txt", "e")?
        .remove("a.zip!b.zip!c.txt")?;
    let built = zip.build_to_vec()?;

    let a = read_entry(&built, "a.zip")?;
    assert_eq!(read_entry(&a, "top.txt")?, b"top");
    let b = contents(&read_entry(&a, "b.zip")?)?;
    assert_eq!(b.keys().collect::<Vec<_>>(), ["d.txt", "e.txt"]);
    assert_eq!(b["e.txt"], b"e");
    Ok(())
}

#[test]
fn nested_entry_that_is_not_an_archive() -> Result<()> {
    init();
    let mut base = ZipSet::new();
    base.add_bytes("fake.zip", "just text")?;
    let mut zip = ZipSet::with_base_bytes(base.build_to_vec()?);
    zip.add_bytes("fake.zip!x", "x")?;

    let err = zip.build_to_vec().unwrap_err();
    assert!(err.is_format_error(), "{err:?}");
    Ok(())
}

#[test]
fn flat_values_replace_nested_archives_wholesale() -> Result<()> {
    init();
    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_bytes("inner.zip", "not an archive anymore")?;
    let built = zip.build_to_vec()?;
    assert_eq!(read_entry(&built, "inner.zip")?, b"not an archive anymore");
    Ok(())
}

#[test]
fn builds_are_repeatable() -> Result<()> {
    init();
    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_bytes("inner.zip!z.txt", "z")?
        .add_directory("empty")?
        .remove("delete.txt")?;

    let options = fixed_options();
    let first = zip.build_with(Vec::new(), &options)?;
    let second = zip.build_with(Vec::new(), &options)?;
    assert_eq!(first, second);

    // Even with fresh timestamps, the contents match, all the way down.
    let fresh = contents_deep(&zip.build_to_vec()?)?;
    assert_eq!(fresh, contents_deep(&first)?);
    assert_eq!(fresh["inner.zip!z.txt"], b"z");
    assert_eq!(fresh["inner.zip!a.txt"], b"inner a");
    Ok(())
}

#[test]
fn archive_on_disk_replaces_nested_base() -> Result<()> {
    init();
    let temp = tempfile::tempdir()?;
    let replacement = temp.path().join("replacement.zip");
    let mut replacement_set = ZipSet::new();
    replacement_set.add_bytes("x.txt", "from disk")?;
    replacement_set.build_to_path(&replacement)?;

    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_path("inner.zip", &replacement)?
        .add_bytes("inner.zip!y.txt", "added")?;
    let built = zip.build_to_vec()?;

    // The file on disk is the nested archive's base, not the old inner.zip.
    let inner = contents(&read_entry(&built, "inner.zip")?)?;
    assert_eq!(inner.keys().collect::<Vec<_>>(), ["x.txt", "y.txt"]);
    assert_eq!(inner["x.txt"], b"from disk");
    assert_eq!(
        names(&built)?.iter().filter(|n| *n == "inner.zip").count(),
        1
    );
    Ok(())
}

#[test]
fn archive_bytes_replace_nested_base() -> Result<()> {
    init();
    let mut replacement = ZipSet::new();
    replacement.add_bytes("x.txt", "from memory")?;
    let replacement = replacement.build_to_vec()?;

    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_bytes("inner.zip", replacement)?
        .add_bytes("inner.zip!y.txt", "added")?;
    let built = contents_deep(&zip.build_to_vec()?)?;

    assert_eq!(built["inner.zip!x.txt"], b"from memory");
    assert_eq!(built["inner.zip!y.txt"], b"added");
    assert!(!built.contains_key("inner.zip!a.txt"));
    assert!(!built.contains_key("inner.zip!b.txt"));
    Ok(())
}

#[test]
fn added_sets_merge_with_nested_base() -> Result<()> {
    init();
    let mut changes = ZipSet::new();
    changes.add_bytes("c.txt", "inner c")?.remove("a.txt")?;

    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_set("inner.zip", changes)?;
    let built = zip.build_to_vec()?;

    let inner = read_entry(&built, "inner.zip")?;
    // Base entries first, in their stored order; then what was added.
    assert_eq!(names(&inner)?, ["b.txt", "c.txt"]);
    assert_eq!(read_entry(&inner, "b.txt")?, b"inner b");
    Ok(())
}

#[test]
fn files_on_disk_overwrite_base_entries() -> Result<()> {
    init();
    let temp = tempfile::tempdir()?;
    let file = temp.path().join("replace.txt");
    fs::write(&file, "from disk")?;
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs)?;
    fs::write(docs.join("new.txt"), "new doc")?;

    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_path("replace.txt", &file)?.add_path("docs/", &docs)?;
    let built = zip.build_to_vec()?;

    assert_eq!(
        names(&built)?,
        [
            "delete.txt",
            "docs/",
            "docs/new.txt",
            "docs/readme.md",
            "inner.zip",
            "keep.txt",
            "replace.txt",
        ]
    );
    assert_eq!(read_entry(&built, "replace.txt")?, b"from disk");
    assert_eq!(read_entry(&built, "docs/new.txt")?, b"new doc");
    // The rest of the base directory's contents pass through.
    assert_eq!(read_entry(&built, "docs/readme.md")?, b"# Hi");
    Ok(())
}

#[test]
fn concurrent_builds_agree() -> Result<()> {
    init();
    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_bytes("inner.zip!z.txt", "z")?
        .add_bytes("big.bin", vec![7u8; 1 << 16])?;

    let options = fixed_options();
    let builds = (0..8)
        .into_par_iter()
        .map(|_| zip.build_with(Vec::new(), &options))
        .collect::<ZipResult<Vec<_>>>()?;
    assert!(builds.windows(2).all(|pair| pair[0] == pair[1]));
    Ok(())
}

#[test]
fn directories_are_empty_entries() -> Result<()> {
    init();
    let mut zip = ZipSet::new();
    zip.add_directory("dir/")?;
    let built = zip.build_to_vec()?;

    let archive = ZipArchive::new(&built)?;
    assert_eq!(archive.entries().len(), 1);
    let dir = &archive.entries()[0];
    assert_eq!(dir.name(), "dir/");
    assert!(dir.is_dir());
    assert_eq!(dir.size, 0);
    Ok(())
}

#[test]
fn stored_compression_option() -> Result<()> {
    init();
    let mut zip = ZipSet::new();
    zip.add_bytes("plain.txt", "stored, not deflated")?;
    let options = WriteOptions {
        compression: CompressionMethod::None,
        ..fixed_options()
    };
    let built = zip.build_with(Vec::new(), &options)?;

    let archive = ZipArchive::new(&built)?;
    let plain = archive.by_name("plain.txt").unwrap();
    assert_eq!(plain.compression_method, CompressionMethod::None);
    assert_eq!(archive.raw(plain)?, b"stored, not deflated");
    assert_eq!(plain.last_modified, options.last_modified);
    Ok(())
}

#[test]
fn files_on_disk_match_bytes() -> Result<()> {
    init();
    let temp = tempfile::tempdir()?;
    let bin: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let on_disk = temp.path().join("random.bin");
    fs::write(&on_disk, &bin)?;

    let mut from_bytes = ZipSet::new();
    from_bytes.add_bytes("random.bin", bin.clone())?;
    let mut from_disk = ZipSet::new();
    from_disk.add_path("random.bin", &on_disk)?;

    let options = fixed_options();
    assert_eq!(
        from_bytes.build_with(Vec::new(), &options)?,
        from_disk.build_with(Vec::new(), &options)?
    );
    assert_eq!(read_entry(&from_disk.build_to_vec()?, "random.bin")?, bin);
    Ok(())
}

#[test]
fn directories_on_disk_expand() -> Result<()> {
    init();
    let temp = tempfile::tempdir()?;
    let tree = temp.path().join("tree");
    fs::create_dir_all(tree.join("a/b/c"))?;
    fs::create_dir_all(tree.join("empty"))?;
    fs::write(tree.join("a/file1.txt"), "one")?;
    fs::write(tree.join("top.txt"), "top")?;

    let mut zip = ZipSet::new();
    zip.add_path("tree", &tree)?;
    let built = zip.build_to_vec()?;

    assert_eq!(
        names(&built)?,
        [
            "tree/",
            "tree/a/",
            "tree/a/b/",
            "tree/a/b/c/",
            "tree/a/file1.txt",
            "tree/empty/",
            "tree/top.txt",
        ]
    );
    assert_eq!(read_entry(&built, "tree/a/file1.txt")?, b"one");
    Ok(())
}

#[test]
fn only_directories() -> Result<()> {
    init();
    let temp = tempfile::tempdir()?;
    fs::create_dir_all(temp.path().join("empty1/empty2/empty3"))?;
    fs::create_dir_all(temp.path().join("empty4"))?;

    let mut zip = ZipSet::new();
    zip.add_path("empty1/", temp.path().join("empty1"))?
        .add_path("empty4/", temp.path().join("empty4"))?;
    let built = ZipArchive::new(&zip.build_to_vec()?)?
        .entries()
        .iter()
        .map(|e| (e.name().to_owned(), e.is_dir()))
        .collect::<Vec<_>>();

    assert_eq!(
        built,
        [
            ("empty1/".to_owned(), true),
            ("empty1/empty2/".to_owned(), true),
            ("empty1/empty2/empty3/".to_owned(), true),
            ("empty4/".to_owned(), true),
        ]
    );
    Ok(())
}

#[test]
fn many_files_and_directories() -> Result<()> {
    init();
    let deep = "test/1/2/3/5/34/5/6/3/3/7/9/4/2/7/9/5/3/4/3/7/9/2/3/4/6/8/4/3/6/8/6/3/5/2/23";
    let mut zip = ZipSet::new();
    zip.add_bytes(format!("{deep}/test.bin"), "one")?
        .add_bytes(format!("{deep}/test3.bin"), "three")?
        .add_bytes("test2/test4.bin", "four")?
        .add_directory(format!("{deep}/45/34/345/878/45/577/9"))?
        .add_bytes("test2/test4.1.bin", "four point one")?;
    let built = contents(&zip.build_to_vec()?)?;

    assert_eq!(built.len(), 5);
    assert_eq!(built[&format!("{deep}/test3.bin")], b"three");
    assert_eq!(built[&format!("{deep}/45/34/345/878/45/577/9/")], b"");
    assert_eq!(built["test2/test4.1.bin"], b"four point one");
    Ok(())
}

#[test]
fn archive_on_disk_as_an_entry() -> Result<()> {
    init();
    let temp = tempfile::tempdir()?;
    let inner = temp.path().join("test2.zip");
    let mut inner_set = ZipSet::new();
    inner_set.add_bytes("random.bin", "random")?;
    inner_set.build_to_path(&inner)?;

    let mut zip = ZipSet::new();
    zip.add_path("test2.zip", &inner)?;
    let built = zip.build_to_vec()?;
    assert_eq!(read_entry(&built, "test2.zip")?, fs::read(&inner)?);

    // Reaching into it makes the file the nested archive's base.
    zip.add_bytes("test2.zip!extra.txt", "extra")?;
    let built = zip.build_to_vec()?;
    let nested = contents(&read_entry(&built, "test2.zip")?)?;
    assert_eq!(nested.keys().collect::<Vec<_>>(), ["extra.txt", "random.bin"]);
    Ok(())
}

#[test]
fn base_on_disk_with_prepended_data() -> Result<()> {
    init();
    let temp = tempfile::tempdir()?;
    let base_path = temp.path().join("sfx.zip");
    let mut stubbed = b"#!/bin/sh\nexit 0\n".to_vec();
    stubbed.extend(sample_base()?);
    fs::write(&base_path, stubbed)?;

    let mut zip = ZipSet::with_base(&base_path);
    zip.remove("delete.txt")?;
    let built = contents(&zip.build_to_vec()?)?;
    assert_eq!(built["keep.txt"], b"keep me");
    assert!(!built.contains_key("delete.txt"));
    Ok(())
}

#[test]
fn build_to_path_then_map() -> Result<()> {
    init();
    let temp = tempfile::tempdir()?;
    let out = temp.path().join("out.zip");

    let mut zip = ZipSet::with_base_bytes(sample_base()?);
    zip.add_bytes("inner.zip!c.txt", "c")?;
    zip.build_to_path(&out)?;

    info!("Memory mapping {}", out.display());
    let file = File::open(&out).context("Couldn't open built archive")?;
    let mapping = unsafe { Mmap::map(&file).context("Couldn't mmap built archive")? };
    let archive = ZipArchive::new(&mapping)?;
    assert_eq!(archive.entries().len(), 6);
    let inner = archive.read_to_vec(archive.by_name("inner.zip").unwrap())?;
    assert_eq!(names(&inner)?, ["a.txt", "b.txt", "c.txt"]);
    Ok(())
}

#[test]
fn invalid_paths_fail_early() {
    init();
    let mut zip = ZipSet::new();
    for bad in ["", "a!!b", "/"] {
        match zip.add_bytes(bad, "x") {
            Err(ZipError::InvalidPath(_)) => {}
            other => panic!("Expected an invalid path error for {bad:?}, got {other:?}"),
        }
    }
    assert!(zip.is_empty());
}
