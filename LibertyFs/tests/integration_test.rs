use libertyfs::formats::gxt::write_gxt;
use libertyfs::prelude::*;
use libertyfs::rpf::RpfArchive;
use libertyfs::utils::jenkins_one_at_a_time;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn touch(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

#[test]
fn test_overlay_priority_across_probe_folders() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    touch(&root.join("update/common/data/handling.dat"), b"update");
    touch(&root.join("mods/update/common/data/handling.dat"), b"mods/update");
    touch(&root.join("update/common/data/gta.dat"), b"only in update");

    let overlay = ModOverlay::new().with_texture_cache_dir(root.join("cache"));
    overlay.initialize(root);

    let winner = overlay.resolve("game:\\COMMON\\data\\handling.dat").unwrap();
    assert_eq!(fs::read(winner).unwrap(), b"mods/update");
    let fallback = overlay.resolve("common/data/gta.dat").unwrap();
    assert_eq!(fs::read(fallback).unwrap(), b"only in update");
    assert!(overlay.resolve("common/data/missing.dat").is_none());

    let stats = overlay.stats();
    assert_eq!(stats.override_hits, 2);
    assert_eq!(stats.override_misses, 1);
}

#[test]
fn test_img_merge_keeps_original_casing() {
    let dir = tempdir().unwrap();
    let img_path = dir.path().join("vehicles.img");
    let image = create_img(&[
        ImgFile::new("Banshee.wft", b"stock banshee".to_vec()),
        ImgFile::new("infernus.wft", b"stock infernus".to_vec()),
    ])
    .unwrap();
    fs::write(&img_path, image).unwrap();

    let folder = dir.path().join("vehicles.img.d");
    touch(&folder.join("BANSHEE.WFT"), b"tuned");
    touch(&folder.join("sultan.wft"), b"new car");

    let merger = ImgMerger::new();
    merger.initialize();
    let merged = merger.merge_img_with_folder(&img_path, &folder).unwrap();

    let names: Vec<&str> = merged.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["Banshee.wft", "infernus.wft", "sultan.wft"]);
    assert_eq!(merged.find("banshee.wft").unwrap().data, b"tuned");

    let reparsed = parse_img(&merged.data).unwrap();
    assert_eq!(reparsed[2].data, b"new car");

    let stats = merger.stats();
    assert_eq!(stats.files_replaced, 1);
    assert_eq!(stats.files_added, 1);
    assert_eq!(stats.imgs_merged, 1);
}

#[test]
fn test_extract_file_is_cached() {
    let dir = tempdir().unwrap();
    let rpf = dir.path().join("common.rpf");
    let mut writer = RpfWriter::new().with_compression(true);
    writer.add_file("common/data/handling.dat", vec![b'h'; 4096]);
    writer.write(&rpf).unwrap();

    let container = ArchiveContainer::new();
    container.initialize();
    assert!(container.load_rpf(&rpf));

    let first = container.extract_file("Common\\Data\\Handling.dat").unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.data.len(), 4096);

    let second = container.extract_file("common/data/handling.dat").unwrap();
    assert!(second.from_cache);
    assert_eq!(first.data, second.data);

    let stats = container.stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.files_extracted, 1);
}

#[test]
fn test_encrypted_archive_with_right_and_wrong_key() {
    let dir = tempdir().unwrap();
    let rpf = dir.path().join("xbox360.rpf");
    let key = AesKey::from_bytes(&[0x5A; 32]).unwrap();
    let mut writer = RpfWriter::new().with_encryption(key.clone());
    writer.add_file("data/secret.dat", b"liberty".to_vec());
    writer.write(&rpf).unwrap();

    let right = ArchiveContainer::new();
    right.initialize();
    right.set_aes_key(key);
    assert!(right.load_rpf(&rpf));
    assert_eq!(right.extract_file("data/secret.dat").unwrap().data.as_slice(), b"liberty");

    // Garbage TOC must not take anything down
    let wrong = ArchiveContainer::new();
    wrong.initialize();
    wrong.set_aes_key(AesKey::from_bytes(&[0x11; 32]).unwrap());
    let _ = wrong.load_rpf(&rpf);
    let _ = wrong.extract_file("data/secret.dat");

    let keyless = ArchiveContainer::new();
    keyless.initialize();
    let _ = keyless.load_rpf(&rpf);
    assert!(keyless.extract_file("data/secret.dat").is_none_or(|f| f.data.as_slice() != b"liberty"));
}

#[test]
fn test_bulk_extraction_survives_corrupt_deflate() {
    let dir = tempdir().unwrap();
    let rpf = dir.path().join("audio.rpf");
    let mut writer = RpfWriter::new().with_compression(true);
    for i in 0..6 {
        writer.add_file(format!("sfx/bank{i}.dat"), vec![b'a' + i as u8; 8192]);
    }
    writer.write(&rpf).unwrap();

    let archive = RpfArchive::open(&rpf, None).unwrap();
    let mut bytes = fs::read(&rpf).unwrap();
    let mut corrupted = 0;
    for entry in archive.files().take(3) {
        let info = entry.file_info().unwrap();
        assert!(info.needs_inflate());
        let start = info.offset as usize;
        let end = start + info.compressed_size as usize;
        bytes[start..end].fill(0xFF);
        corrupted += 1;
    }
    assert_eq!(corrupted, 3);
    fs::write(&rpf, bytes).unwrap();

    let out = dir.path().join("out");
    let extractor = BulkExtractor::new(BulkOptions {
        num_threads: 2,
        memory_budget_mb: 1,
        ..BulkOptions::default()
    });
    let result = extractor.extract(&rpf, &out, None);

    assert!(result.success);
    assert_eq!(result.files_extracted, 6);
    assert_eq!(result.errors, 0);
    assert_eq!(fs::read(out.join("sfx/bank5.dat")).unwrap(), vec![b'f'; 8192]);
    assert!(out.join("sfx/bank0.dat").is_file());
}

#[test]
fn test_vfs_falls_through_missing_mapping() {
    let dir = tempdir().unwrap();
    let extracted = dir.path();
    touch(&extracted.join("common/data/handling.dat"), b"mapped");
    touch(&extracted.join("xbox360/textures/radar.xtd"), b"radar");
    touch(&extracted.join("stray/Loose.DAT"), b"indexed");

    let vfs = VirtualFileSystem::new();
    vfs.initialize(extracted);

    assert_eq!(
        vfs.resolve("game:\\data\\handling.dat").unwrap(),
        extracted.join("common/data/handling.dat")
    );
    assert_eq!(
        vfs.resolve("platform:/textures/radar").unwrap(),
        extracted.join("xbox360/textures/radar.xtd")
    );
    assert_eq!(fs::read(vfs.resolve("game:/STRAY/loose.dat").unwrap()).unwrap(), b"indexed");
    assert!(vfs.resolve("game:\\data\\missing.dat").is_none());
}

#[test]
fn test_morton_round_trip() {
    for (x, y) in [(0, 0), (1, 0), (0, 1), (7, 3), (255, 128), (1023, 511), (0xFFFF, 0xFFFF)] {
        assert_eq!(morton_decode(morton_encode(x, y)), (x, y));
    }
    assert_eq!(morton_encode(1, 0), 1);
    assert_eq!(morton_encode(0, 1), 2);
    assert_eq!(morton_encode(3, 3), 15);
}

#[test]
fn test_normalize_is_idempotent() {
    for path in [
        "game:\\Common\\Data\\Handling.dat",
        "/PC/Models/CDImages/",
        "platform:/textures/radar.xtd",
        "game:c:x",
        "",
    ] {
        let once = normalize(path);
        assert_eq!(normalize(&once), once);
    }
    assert_eq!(normalize("game:\\Common\\Data\\Handling.dat"), "common/data/handling.dat");
}

#[test]
fn test_game_file_system_chain() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("GTAIV");
    touch(&root.join("update/common/data/handling.dat"), b"overlay");
    touch(&root.join("extracted/common/data/handling.dat"), b"extracted");
    touch(&root.join("extracted/common/data/carcols.dat"), b"extracted carcols");
    touch(
        &root.join("update/common/text/american_FF.gxt"),
        &write_gxt(&[(jenkins_one_at_a_time("CUSTOM_LABEL"), "Hello Liberty")]),
    );

    let mut writer = RpfWriter::new();
    writer.add_file("common/data/timecyc.dat", b"archived".to_vec());
    writer.write(root.join("common.rpf")).unwrap();

    let config = LibertyConfig {
        game_root: Some(root.clone()),
        texture_cache_dir: Some(dir.path().join("cache")),
        ..LibertyConfig::default()
    };
    let gfs = GameFileSystem::new(config);
    gfs.initialize();

    assert_eq!(gfs.read("game:\\common\\data\\handling.dat").unwrap(), b"overlay");
    assert_eq!(gfs.read("game:\\common\\data\\carcols.dat").unwrap(), b"extracted carcols");
    assert_eq!(gfs.read("game:\\common\\data\\timecyc.dat").unwrap(), b"archived");
    assert!(gfs.read("game:\\common\\data\\nothing.dat").is_none());
    assert_eq!(
        gfs.text(jenkins_one_at_a_time("CUSTOM_LABEL")).as_deref(),
        Some("Hello Liberty")
    );

    gfs.shutdown();
    assert!(gfs.read("game:\\common\\data\\handling.dat").is_none());
}
