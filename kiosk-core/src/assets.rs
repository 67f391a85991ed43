//! Video asset resolution: index `n` maps to `<n>.mp4` under the
//! assets root. Decoding and rendering are the player's business.

use std::path::{Path, PathBuf};

/// Resolve the filesystem path for asset `index`.
pub fn video_path(root: &Path, index: u32) -> PathBuf {
    root.join(format!("{index}.mp4"))
}
