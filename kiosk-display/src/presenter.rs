//! Headless presenter stand-in.
//!
//! The real station swaps this for a renderer that runs fades and an
//! actual media player. This one logs the would-be side effects and
//! reports media-ready after a short simulated load, which is enough
//! to drive the full protocol end to end.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use kiosk_core::assets;
use kiosk_core::playback::{Presenter, ReadyNotifier};

/// Simulated asset load time.
const LOAD_DELAY: Duration = Duration::from_millis(200);

pub struct LoggingPresenter {
    assets_dir: PathBuf,
    ready: ReadyNotifier,
}

impl LoggingPresenter {
    pub fn new(assets_dir: PathBuf, ready: ReadyNotifier) -> Self {
        Self { assets_dir, ready }
    }
}

#[async_trait]
impl Presenter for LoggingPresenter {
    async fn prepare_video(&mut self, index: u32) {
        let path = assets::video_path(&self.assets_dir, index);
        info!("fade out; loading {}", path.display());

        let ready = self.ready.clone();
        tokio::spawn(async move {
            tokio::time::sleep(LOAD_DELAY).await;
            ready.media_ready().await;
        });
    }

    async fn start_playback(&mut self, index: u32) {
        info!("fade in; playing video {index}");
    }

    async fn show_idle(&mut self) {
        info!("stopping playback; showing static screen");
    }
}
