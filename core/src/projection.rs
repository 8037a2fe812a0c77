use std::path::Path;

use image::RgbImage;
use thiserror::Error;

use crate::cache::cache_file_name;
use crate::config::Folder;

#[derive(Debug, Error)]
#[error("device i/o error: {0}")]
pub struct DeviceIoError(pub String);

/// Per-key image sink on the physical deck.
pub trait ImageSink {
    fn push_image(&mut self, button_id: u8, image: &RgbImage) -> Result<(), DeviceIoError>;
}

/// Push every cached image for `folder_id` to its key. Keys without a
/// cache entry are left as the deck last drew them; a failed push only
/// costs that one key its image.
pub fn render_folder(
    cache_dir: &Path,
    folder_id: u8,
    folder: &Folder,
    sink: &mut impl ImageSink,
) {
    for button_id in folder.buttons.keys() {
        let path = cache_file_name(cache_dir, folder_id, *button_id);
        if !path.is_file() {
            log::warn!("no cache entry for folder {folder_id} key {button_id}");
            continue;
        }
        let image = match image::open(&path) {
            Ok(image) => image.into_rgb8(),
            Err(err) => {
                log::error!("cannot decode cache entry {}: {err}", path.display());
                continue;
            }
        };
        log::debug!(
            "displaying folder {folder_id} key {button_id} from {}",
            path.display()
        );
        if let Err(err) = sink.push_image(*button_id, &image) {
            log::error!("image push for key {button_id} failed: {err}");
        }
    }
}
