use std::collections::VecDeque;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgba, RgbaImage, imageops};
use thiserror::Error;

use crate::config::Configuration;

/// Icon edge length of the classic 15-key deck, used when no device is
/// around to report its own.
pub const DEFAULT_ICON_SIZE: u32 = 72;

// Overlay geometry in the 72px coordinate space the deck icons were
// designed in; the SVG viewBox scales it to other icon sizes.
const OVERLAY_VIEWBOX: u32 = 72;
const OVERLAY_TEXT_X: u32 = 10;
const OVERLAY_TEXT_Y: u32 = 60;
const OVERLAY_FONT_SIZE: u32 = 18;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ImageJobError {
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("overlay text rendering failed: {0}")]
    Overlay(String),
    #[error("cannot encode button image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One pending composite: source icon, text to draw over it, cache file
/// to write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationJob {
    pub source: PathBuf,
    pub overlay_text: String,
    pub output: PathBuf,
}

/// Cache path for a (folder, button) pair. Distinct pairs always map to
/// distinct paths because both ids appear with their own separator.
pub fn cache_file_name(cache_dir: &Path, folder_id: u8, button_id: u8) -> PathBuf {
    cache_dir.join(format!("button_{folder_id}_{button_id}.png"))
}

pub struct CacheBuilder {
    cache_dir: PathBuf,
    default_icon: PathBuf,
    icon_size: u32,
    fontdb: usvg::fontdb::Database,
}

impl CacheBuilder {
    pub fn new(cache_dir: PathBuf, default_icon: PathBuf, icon_size: u32) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        Self {
            cache_dir,
            default_icon,
            icon_size,
            fontdb,
        }
    }

    /// Rebuild the whole cache for `config`. Individual job failures are
    /// logged and skipped; only a missing cache directory aborts.
    pub fn build(&self, config: &Configuration) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir).map_err(|source| CacheError::CreateDir {
            path: self.cache_dir.clone(),
            source,
        })?;
        let queue = self.collect_jobs(config);
        log::info!("generating {} button images", queue.len());
        self.process_queue(queue);
        Ok(())
    }

    /// One job per configured button, in folder order then key order.
    /// Buttons whose icon file is missing fall back to the template.
    pub fn collect_jobs(&self, config: &Configuration) -> VecDeque<GenerationJob> {
        let mut queue = VecDeque::new();
        for (folder_id, folder) in &config.folders {
            for (button_id, spec) in &folder.buttons {
                let source = if spec.image.is_file() {
                    spec.image.clone()
                } else {
                    log::debug!(
                        "{} not found, using template icon",
                        spec.image.display()
                    );
                    self.default_icon.clone()
                };
                queue.push_back(GenerationJob {
                    source,
                    overlay_text: spec.text.clone(),
                    output: cache_file_name(&self.cache_dir, *folder_id, *button_id),
                });
            }
        }
        queue
    }

    /// Drain the queue strictly one job at a time. The compositing path
    /// shares raster state (the font database), so the next job must not
    /// start before the previous write has finished.
    pub fn process_queue(&self, mut queue: VecDeque<GenerationJob>) {
        while let Some(job) = queue.pop_front() {
            match self.run_job(&job) {
                Ok(()) => log::info!(
                    "wrote {} using {}",
                    job.output.display(),
                    job.source.display()
                ),
                Err(err) => log::error!("image job for {} failed: {err}", job.output.display()),
            }
        }
    }

    fn run_job(&self, job: &GenerationJob) -> Result<(), ImageJobError> {
        let decoded = image::open(&job.source).map_err(|source| ImageJobError::Decode {
            path: job.source.clone(),
            source,
        })?;
        // Scale down to the key size, cropping if necessary, then drop
        // transparency so the deck never sees an alpha channel.
        let resized = decoded
            .resize_to_fill(self.icon_size, self.icon_size, imageops::FilterType::Lanczos3)
            .to_rgba8();
        let mut composite = flatten_onto_black(&resized);
        if !job.overlay_text.is_empty() {
            let overlay = self.render_text_overlay(&job.overlay_text)?;
            blend_overlay(&mut composite, &overlay);
        }

        let mut encoded = Vec::new();
        image::DynamicImage::ImageRgba8(composite)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(ImageJobError::Encode)?;
        write_atomic(&job.output, &encoded).map_err(|source| ImageJobError::Write {
            path: job.output.clone(),
            source,
        })
    }

    /// Rasterize the overlay text through an SVG text layer, the same
    /// way the deck icons themselves are produced.
    fn render_text_overlay(&self, text: &str) -> Result<tiny_skia::Pixmap, ImageJobError> {
        let svg = overlay_svg(text, self.icon_size);
        let options = usvg::Options::default();
        let tree = usvg::Tree::from_data(svg.as_bytes(), &options, &self.fontdb)
            .map_err(|err| ImageJobError::Overlay(err.to_string()))?;
        let mut pixmap = tiny_skia::Pixmap::new(self.icon_size, self.icon_size)
            .ok_or_else(|| ImageJobError::Overlay("zero-sized overlay pixmap".into()))?;
        let mut pixmap_mut = pixmap.as_mut();
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap_mut);
        Ok(pixmap)
    }
}

fn overlay_svg(text: &str, icon_size: u32) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" \
         width=\"{icon_size}px\" height=\"{icon_size}px\" \
         viewBox=\"0 0 {OVERLAY_VIEWBOX} {OVERLAY_VIEWBOX}\">\
         <text x=\"{OVERLAY_TEXT_X}\" y=\"{OVERLAY_TEXT_Y}\" \
         style=\"font-family:Arial,Helvetica,sans-serif;\
         font-size:{OVERLAY_FONT_SIZE}px;fill:red;stroke:red;stroke-width:1\">{}</text></svg>",
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn flatten_onto_black(rgba: &RgbaImage) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba([0, 0, 0, 255]));
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = px[3] as u32;
        let dst = out.get_pixel_mut(x, y);
        for channel in 0..3 {
            dst[channel] = ((px[channel] as u32 * alpha
                + dst[channel] as u32 * (255 - alpha))
                / 255) as u8;
        }
    }
    out
}

// Pixmap pixels are premultiplied, so src-over is src + dst * (1 - a).
fn blend_overlay(base: &mut RgbaImage, overlay: &tiny_skia::Pixmap) {
    let width = overlay.width().min(base.width());
    let height = overlay.height().min(base.height());
    for y in 0..height {
        for x in 0..width {
            let Some(px) = overlay.pixel(x, y) else {
                continue;
            };
            let alpha = px.alpha() as u32;
            if alpha == 0 {
                continue;
            }
            let dst = base.get_pixel_mut(x, y);
            let src = [px.red() as u32, px.green() as u32, px.blue() as u32];
            for channel in 0..3 {
                let blended = src[channel] + dst[channel] as u32 * (255 - alpha) / 255;
                dst[channel] = blended.min(255) as u8;
            }
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let tmp = path.with_extension("png.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
