// Windows resources: VERSIONINFO plus a small generated icon.
//
// Every Windows build embeds them so the DLL carries its own version and the
// installer can point the ProgID's DefaultIcon at `<dll>,0`. With TEXVIEW_INSTALLER
// set the names describe the installer executable instead.
// Progress goes to TEXVIEW_BUILD_REPORT (default OUT_DIR/build-report.txt);
// a missing resource compiler is reported there and does not fail the build.

use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ico::{IconDir, IconDirEntry, IconImage, ResourceType};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

const ICON_SIZES: [u32; 6] = [16, 24, 32, 48, 64, 256];

struct Report(PathBuf);

impl Report {
    fn line(&self, msg: impl AsRef<str>) {
        if let Some(parent) = self.0.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.0)
            .and_then(|mut f| writeln!(f, "{}", msg.as_ref()));
    }
}

/// "1.2.3-beta" -> "1.2.3.0".
fn version_quad(v: &str) -> String {
    let mut parts = v
        .split(['.', '-', '+'])
        .map(|seg| seg.parse::<u16>().unwrap_or(0));
    let mut quad = [0u16; 4];
    for slot in &mut quad {
        *slot = parts.next().unwrap_or(0);
    }
    format!("{}.{}.{}.{}", quad[0], quad[1], quad[2], quad[3])
}

/// A 4x4 checkerboard tile with a transparent margin.
fn render_icon(size: u32) -> RgbaImage {
    let margin = size / 16;
    let cell = (size - 2 * margin).div_ceil(4).max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        let inside = x >= margin && y >= margin && x < size - margin && y < size - margin;
        if !inside {
            return Rgba([0, 0, 0, 0]);
        }
        let (cx, cy) = ((x - margin) / cell, (y - margin) / cell);
        if (cx + cy) % 2 == 0 { Rgba([0x3A, 0x6E, 0xA5, 0xFF]) } else { Rgba([0xE8, 0xEC, 0xF1, 0xFF]) }
    })
}

fn write_icon(out: &Path) -> io::Result<()> {
    let master = render_icon(256);
    let mut dir = IconDir::new(ResourceType::Icon);
    for size in ICON_SIZES {
        let img = if size == master.width() { master.clone() } else { imageops::resize(&master, size, size, FilterType::Triangle) };
        let entry = IconDirEntry::encode(&IconImage::from_rgba_data(size, size, img.into_raw()))?;
        dir.add_entry(entry);
    }
    dir.write(fs::File::create(out)?)
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=TEXVIEW_INSTALLER");
    println!("cargo:rerun-if-env-changed=TEXVIEW_BUILD_REPORT");

    if env::var("CARGO_CFG_TARGET_OS").ok().as_deref() != Some("windows") {
        return;
    }

    let out_dir = env::var_os("OUT_DIR").map(PathBuf::from).unwrap_or_default();
    let report = Report(env::var_os("TEXVIEW_BUILD_REPORT").map(PathBuf::from).unwrap_or_else(|| out_dir.join("build-report.txt")));
    let installer = env::var_os("TEXVIEW_INSTALLER").is_some();

    let icon = out_dir.join("texview.ico");
    let icon = match write_icon(&icon) {
        Ok(()) => Some(icon),
        Err(e) => {
            report.line(format!("icon generation failed: {e}"));
            None
        }
    };

    let name = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "texview-thumb-win".into());
    let description = env::var("CARGO_PKG_DESCRIPTION").unwrap_or_else(|_| name.clone());
    let version = version_quad(&env::var("CARGO_PKG_VERSION").unwrap_or_default());
    let (internal, file_name) = if installer {
        ("texview-thumb-installer", "texview-thumb-installer.exe")
    } else {
        ("texview_thumb_win", "texview_thumb_win.dll")
    };

    let mut res = winresource::WindowsResource::new();
    if let Some(path) = icon.as_deref().and_then(Path::to_str) {
        res.set_icon(path);
    }
    res.set("FileDescription", &description)
        .set("ProductName", "TexView Thumbnail Provider")
        .set("CompanyName", "TexView")
        .set("InternalName", internal)
        .set("OriginalFilename", file_name)
        .set("FileVersion", &version)
        .set("ProductVersion", &version)
        .set_language(0x0409);

    match res.compile() {
        Ok(()) => report.line(format!("embedded VERSIONINFO {version} for {file_name}, icon={}", icon.is_some())),
        Err(e) => report.line(format!("resource compile failed: {e}")),
    }
}
