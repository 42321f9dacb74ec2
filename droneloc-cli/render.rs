use std::path::{Path, PathBuf};

use droneloc_core::{DetectorConfig, Image};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::engine::Localization;
use crate::error::{HarnessError, HarnessResult};

const MATCH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const POINT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const POINT_RADIUS: i32 = 4;

/// Decode any supported image file to 8-bit grayscale
pub fn load_grayscale<P: AsRef<Path>>(path: P) -> HarnessResult<Image> {
    let gray = image::open(path.as_ref())?.to_luma8();
    from_gray(gray)
}

pub fn from_gray(gray: GrayImage) -> HarnessResult<Image> {
    let (w, h) = gray.dimensions();
    Ok(Image::new(w as usize, h as usize, gray.into_raw())?)
}

fn to_gray(image: &Image) -> Option<GrayImage> {
    GrayImage::from_raw(image.width() as u32, image.height() as u32, image.data().to_vec())
}

/// Reference on the left, query on the right, the first `limit` matches drawn
/// as green segments between blue keypoint circles.
pub fn render_matches(reference: &Image, query: &Image, localization: &Localization, limit: usize) -> RgbImage {
    let (rw, rh) = reference.dimensions();
    let (qw, qh) = query.dimensions();
    let mut canvas = RgbImage::new((rw + qw) as u32, rh.max(qh) as u32);

    for (image, x_offset) in [(reference, 0), (query, rw)] {
        if let Some(gray) = to_gray(image) {
            for (x, y, p) in gray.enumerate_pixels() {
                canvas.put_pixel(x + x_offset as u32, y, Rgb([p[0], p[0], p[0]]));
            }
        }
    }

    let shift = rw as f32;
    for m in localization.matches.iter().take(limit) {
        let (Some(r), Some(q)) = (
            localization.reference_keypoints.get(m.source_idx),
            localization.query_keypoints.get(m.target_idx),
        ) else {
            continue;
        };
        let start = (r.x, r.y);
        let end = (q.x + shift, q.y);
        draw_line_segment_mut(&mut canvas, start, end, MATCH_COLOR);
        draw_hollow_circle_mut(&mut canvas, (start.0 as i32, start.1 as i32), POINT_RADIUS, POINT_COLOR);
        draw_hollow_circle_mut(&mut canvas, (end.0 as i32, end.1 as i32), POINT_RADIUS, POINT_COLOR);
    }
    canvas
}

/// `<dir>/matches_<label>.png`
pub fn render_path(dir: &Path, detector: DetectorConfig) -> PathBuf {
    dir.join(format!("matches_{}.png", detector.label()))
}

pub fn save_render(canvas: &RgbImage, path: &Path) -> HarnessResult<()> {
    canvas.save(path).map_err(HarnessError::from)
}
