use std::{io::Cursor, path::PathBuf};

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_certforge")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "certforge.exe"
            } else {
                "certforge"
            });
            p
        })
}

fn write_png(path: &std::path::Path, w: u32, h: u32, px: [u8; 4]) {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(w, h, image::Rgba(px)))
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(path, buf).unwrap();
}

fn write_fixture(dir: &std::path::Path, font: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    write_png(&dir.join("template.png"), 600, 420, [255, 252, 240, 255]);
    write_png(&dir.join("dean.png"), 60, 20, [0, 0, 0, 255]);

    let config = serde_json::json!({
        "template": "template.png",
        "font": font,
        "font_sizes": {
            "title": 40.0, "name": 30.0, "header": 14.0, "details": 12.0,
            "signature": 10.0, "prize": 18.0, "speaker": 10.0
        },
        "style": { "signature_offset_from_bottom": 120.0, "signature_width": 80 },
        "kind": "Excellence",
        "event": { "name": "HackFest", "date": "2024-03-09", "venue": "VIT Chennai" },
        "signers": [ { "name": "Dr. Rao", "post": "Dean", "signature": "dean.png" } ],
        "roster": ["Ada Lovelace", "Alan Turing", "  "],
        "prizes": { "first": ["Ada Lovelace"] }
    });
    let path = dir.join("batch.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn cli_render_writes_archive_and_manifest() {
    let dir = PathBuf::from("target").join("cli_smoke").join("render");
    let _ = std::fs::remove_dir_all(&dir);
    let font = std::fs::canonicalize("tests/data/fonts/DejaVuSans.ttf").unwrap();
    let config = write_fixture(&dir, font.to_str().unwrap());
    let out_dir = dir.join("out");

    let status = std::process::Command::new(exe())
        .args(["render", "--config"])
        .arg(&config)
        .arg("--out-dir")
        .arg(&out_dir)
        .status()
        .unwrap();
    assert!(status.success());

    let mut zips = Vec::new();
    let mut manifests = Vec::new();
    for entry in std::fs::read_dir(&out_dir).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        if name.ends_with(".manifest.json") {
            manifests.push(path);
        } else if name.ends_with(".zip") {
            zips.push(path);
        }
    }
    assert_eq!(zips.len(), 1);
    assert_eq!(manifests.len(), 1);

    let zip = zip::ZipArchive::new(std::fs::File::open(&zips[0]).unwrap()).unwrap();
    let names: Vec<_> = zip.file_names().collect();
    assert_eq!(names, vec!["ada_lovelace_excellence_first_certificate.pdf"]);

    let manifest: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&manifests[0]).unwrap()).unwrap();
    assert_eq!(manifest["succeeded"], 1);
    assert_eq!(manifest["skipped"], 2);
    assert_eq!(manifest["failed"], 0);
}

#[test]
fn cli_preview_writes_pdf() {
    let dir = PathBuf::from("target").join("cli_smoke").join("preview");
    let _ = std::fs::remove_dir_all(&dir);
    let font = std::fs::canonicalize("tests/data/fonts/DejaVuSans.ttf").unwrap();
    let config = write_fixture(&dir, font.to_str().unwrap());
    let out = dir.join("ada.pdf");

    let status = std::process::Command::new(exe())
        .args(["preview", "--config"])
        .arg(&config)
        .args(["--name", "Ada Lovelace", "--out"])
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[test]
fn cli_reports_unusable_font_as_failure() {
    let dir = PathBuf::from("target").join("cli_smoke").join("bad_font");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("broken.ttf"), b"not a font").unwrap();
    let config = write_fixture(&dir, "broken.ttf");

    let output = std::process::Command::new(exe())
        .args(["render", "--config"])
        .arg(&config)
        .arg("--out-dir")
        .arg(dir.join("out"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("resource error"));
    assert!(!dir.join("out").exists());
}
