//! Decoding of icon files into RGBA bitmaps.
//!
//! Vector icons are rasterized at the requested edge length; raster formats
//! keep their native resolution.

use icns::{IconFamily, IconType};
use image::RgbaImage;
use rs_apply::Apply;
use std::error::Error;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// A decoded application icon.
pub type IconImage = RgbaImage;

// Largest first, but 512 only as a last resort: decoding it is slow and
// callers rarely draw icons that big.
const ICNS_PREFERENCE: [IconType; 6] = [
    IconType::RGBA32_256x256,
    IconType::RGBA32_128x128,
    IconType::RGBA32_64x64,
    IconType::RGB24_48x48,
    IconType::RGB24_32x32,
    IconType::RGBA32_512x512,
];

pub fn decode_icon_file(path: &Path, size: u32) -> Result<IconImage, Box<dyn Error>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "svg" | "svgz" => fs::read(path)?.apply(|data| rasterize_svg(&data, size)),
        "icns" => decode_icns(path),
        _ => image::open(path)?.to_rgba8().apply(Ok),
    }
}

pub fn rasterize_svg(data: &[u8], size: u32) -> Result<IconImage, Box<dyn Error>> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())?;
    let mut pixmap = tiny_skia::Pixmap::new(size, size).ok_or("Invalid icon size")?;

    let svg_size = tree.size();
    let scale = size as f32 / svg_size.width().max(svg_size.height());
    let offset_x = (size as f32 - svg_size.width() * scale) / 2.0;
    let offset_y = (size as f32 - svg_size.height() * scale) / 2.0;
    let transform = tiny_skia::Transform::from_scale(scale, scale).post_translate(offset_x, offset_y);

    resvg::render(&tree, transform, &mut pixmap.as_mut());

    // encode_png un-premultiplies alpha for us
    pixmap
        .encode_png()?
        .apply(|png| image::load_from_memory(&png))?
        .to_rgba8()
        .apply(Ok)
}

/// Preferred sizes first, then whatever the family holds, largest first.
fn pick_icns_icon(family: &IconFamily) -> Option<icns::Image> {
    let mut available = family.available_icons();
    available.sort_by_key(|icon_type| std::cmp::Reverse(icon_type.pixel_width()));

    ICNS_PREFERENCE
        .iter()
        .chain(available.iter())
        .find_map(|&icon_type| family.get_icon_with_type(icon_type).ok())
}

pub fn decode_icns(path: &Path) -> Result<IconImage, Box<dyn Error>> {
    let family = File::open(path)?.apply(BufReader::new).apply(IconFamily::read)?;
    let icon = pick_icns_icon(&family).ok_or("No suitable icon found")?;

    let mut png_data = Vec::new();
    icon.write_png(&mut png_data)?;
    image::load_from_memory(&png_data)?.to_rgba8().apply(Ok)
}

/// True when [`decode_icns`] would find an icon in the file.
pub fn is_readable_icns(path: &Path) -> bool {
    path.metadata().map(|m| m.len() > 0).unwrap_or(false)
        && File::open(path)
            .ok()
            .and_then(|f| IconFamily::read(BufReader::new(f)).ok())
            .and_then(|family| pick_icns_icon(&family))
            .is_some()
}
