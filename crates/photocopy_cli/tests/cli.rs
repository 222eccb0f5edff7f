use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::cargo_bin("photocopy").unwrap()
}

/// JPEG with an IFD0 `DateTime` tag and `payload` after the end-of-image marker.
fn exif_jpeg(c_timestamp: &str, payload: &[u8]) -> Vec<u8> {
    let mut raw_ascii = c_timestamp.as_bytes().to_vec();
    raw_ascii.push(0);

    let mut raw_tiff = Vec::new();
    raw_tiff.extend_from_slice(b"MM\x00\x2a");
    raw_tiff.extend_from_slice(&8_u32.to_be_bytes());
    raw_tiff.extend_from_slice(&1_u16.to_be_bytes());
    raw_tiff.extend_from_slice(&0x0132_u16.to_be_bytes());
    raw_tiff.extend_from_slice(&2_u16.to_be_bytes());
    raw_tiff.extend_from_slice(&(raw_ascii.len() as u32).to_be_bytes());
    raw_tiff.extend_from_slice(&26_u32.to_be_bytes());
    raw_tiff.extend_from_slice(&0_u32.to_be_bytes());
    raw_tiff.extend_from_slice(&raw_ascii);

    let mut raw_jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    raw_jpeg.extend_from_slice(&((8 + raw_tiff.len()) as u16).to_be_bytes());
    raw_jpeg.extend_from_slice(b"Exif\x00\x00");
    raw_jpeg.extend_from_slice(&raw_tiff);
    raw_jpeg.extend_from_slice(&[0xFF, 0xD9]);
    raw_jpeg.extend_from_slice(payload);
    raw_jpeg
}

fn write(path: &Path, raw: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, raw).unwrap();
}

fn source_tree(tmp: &TempDir) -> std::path::PathBuf {
    let src = tmp.path().join("src");
    write(&src.join("a.jpg"), &exif_jpeg("2023:05:14 10:00:00", b"a"));
    write(&src.join("nested/b.jpg"), &exif_jpeg("2023:05:14 23:10:00", b"b"));
    write(&src.join("notes.txt"), b"no metadata");
    src
}

#[test]
fn sorts_into_every_destination() {
    let tmp = TempDir::new().unwrap();
    let src = source_tree(&tmp);
    let d1 = tmp.path().join("D1");
    let d2 = tmp.path().join("D2");

    cmd()
        .arg("-s")
        .arg(&src)
        .arg("-d")
        .arg(&d1)
        .arg(&d2)
        .assert()
        .success()
        .stdout(contains("[RUN]"))
        .stdout(contains("unclassifiable=1"))
        .stdout(contains("verified=2"));

    for dst in [&d1, &d2] {
        assert_eq!(
            fs::read(dst.join("2023/5/14/jpg/a.jpg")).unwrap(),
            fs::read(src.join("a.jpg")).unwrap()
        );
        assert!(dst.join("2023/5/14/jpg/b.jpg").is_file());
        assert!(!dst.join("notes.txt").exists());
    }
}

#[test]
fn ignore_flag_drops_extensions() {
    let tmp = TempDir::new().unwrap();
    let src = source_tree(&tmp);
    let d1 = tmp.path().join("D1");

    cmd()
        .arg("-s")
        .arg(&src)
        .arg("-d")
        .arg(&d1)
        .args(["-i", "TXT"])
        .assert()
        .success()
        .stdout(contains("ignored=1"))
        .stdout(contains("unclassifiable=0"));
}

#[test]
fn unwritable_destination_is_partial_failure() {
    let tmp = TempDir::new().unwrap();
    let src = source_tree(&tmp);
    let blocker = tmp.path().join("blocker");
    write(&blocker, b"file, not a directory");
    let d_ok = tmp.path().join("D2");

    cmd()
        .arg("-s")
        .arg(&src)
        .arg("-d")
        .arg(blocker.join("D1"))
        .arg(&d_ok)
        .assert()
        .code(3)
        .stdout(contains("FAILED"));

    assert!(d_ok.join("2023/5/14/jpg/a.jpg").is_file());
}

#[test]
fn missing_source_is_fatal() {
    let tmp = TempDir::new().unwrap();

    cmd()
        .arg("-s")
        .arg(tmp.path().join("nope"))
        .arg("-d")
        .arg(tmp.path().join("D1"))
        .assert()
        .code(1)
        .stderr(contains("error"));

    assert!(!tmp.path().join("D1").exists());
}

#[test]
fn missing_destinations_is_usage_error() {
    let tmp = TempDir::new().unwrap();

    cmd()
        .arg("-s")
        .arg(tmp.path())
        .assert()
        .code(2)
        .stderr(contains("--destinations"));
}

#[test]
fn dry_run_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let src = source_tree(&tmp);
    let d1 = tmp.path().join("D1");

    cmd()
        .arg("-s")
        .arg(&src)
        .arg("-d")
        .arg(&d1)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(contains("skipped=2"));

    assert!(!d1.exists());
}
