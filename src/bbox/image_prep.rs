use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::errors::{BoxLensError, BoxLensResult};

/// Target size for an image so that neither side exceeds `max_size`,
/// keeping the aspect ratio. The longer side snaps to `max_size`.
pub fn fit_dimensions(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    let (w, h) = (width as u64, height as u64);
    let max = max_size as u64;
    let (w, h) = if w > h {
        if w > max { (max, h * max / w) } else { (w, h) }
    } else if h > max {
        (w * max / h, max)
    } else {
        (w, h)
    };
    ((w as u32).max(1), (h as u32).max(1))
}

/// Downscale `image` to fit inside `max_size` × `max_size`.
pub fn resize_to_fit(image: DynamicImage, max_size: u32) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    let (nw, nh) = fit_dimensions(w, h, max_size);
    if (nw, nh) == (w, h) {
        return image;
    }
    tracing::debug!(from = ?(w, h), to = ?(nw, nh), "resizing image");
    image.resize_exact(nw, nh, FilterType::Lanczos3)
}

pub fn encode_png(image: &DynamicImage) -> BoxLensResult<Vec<u8>> {
    let mut out = Vec::new();
    image.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}

/// Open a JPEG/PNG file, reporting a readable error for anything else.
pub fn load_image(path: &Path) -> BoxLensResult<DynamicImage> {
    let bytes = std::fs::read(path)?;
    image::load_from_memory(&bytes).map_err(|e| BoxLensError::InvalidImage {
        path: path.display().to_string(),
        reason: format!("not a valid JPG, JPEG or PNG image ({e})"),
    })
}
