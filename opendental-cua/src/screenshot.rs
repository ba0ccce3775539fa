//! Decides which image represents "the current screen" after a step.
//!
//! The agent's event stream is preferred; when it carried no screenshot the
//! session's trajectory directory is scanned for the newest image artifact.

use crate::image::{ImageRef, MediaType};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Normalises an inline image reference observed on the event stream.
pub fn normalize_streamed(image_url: &str) -> ImageRef {
    ImageRef::from_data_url(image_url)
}

/// Resolves the step's screenshot.
///
/// Returns the streamed candidate when there is one, otherwise the most
/// recently modified image under `storage_root`. `None` means neither source
/// had an image; that is for the caller to judge.
pub fn resolve(streamed: Option<ImageRef>, storage_root: &Path) -> Option<ImageRef> {
    if let Some(image) = streamed {
        return Some(image);
    }

    let latest = latest_artifact(storage_root)?;
    debug!("Found screenshot: {}", latest.display());

    match std::fs::read(&latest) {
        Ok(bytes) => Some(ImageRef::from_bytes(&bytes, MediaType::from_path(&latest))),
        Err(e) => {
            warn!("Failed to read screenshot {}: {}", latest.display(), e);
            None
        }
    }
}

/// Recursively finds the image artifact with the greatest modification time.
pub fn latest_artifact(storage_root: &Path) -> Option<PathBuf> {
    if !storage_root.is_dir() {
        return None;
    }

    let root = glob::Pattern::escape(&storage_root.to_string_lossy());
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for ext in IMAGE_EXTENSIONS {
        let pattern = format!("{root}/**/*.{ext}");
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Invalid screenshot pattern {}: {}", pattern, e);
                continue;
            }
        };

        for path in paths.flatten() {
            let Ok(modified) = std::fs::metadata(&path).and_then(|m| m.modified()) else {
                continue;
            };
            if newest.as_ref().map_or(true, |(best, _)| modified > *best) {
                newest = Some((modified, path));
            }
        }
    }

    newest.map(|(_, path)| path)
}
