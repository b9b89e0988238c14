// Screen capture service: decodes device screenshots and keeps a short history.
use super::error::{AdbError, AdbResult};
use super::types::AdbClient;
use image::GrayImage;
use log::debug;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Screenshots retained for debugging.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub index: u64,
    pub png: Vec<u8>,
    pub duration_ms: u128,
}

pub struct CaptureService<D> {
    device: D,
    history: Mutex<VecDeque<CaptureRecord>>,
    history_limit: usize,
    counter: AtomicU64,
}

impl<D: AdbClient> CaptureService<D> {
    pub fn new(device: D) -> Self {
        Self::with_history_limit(device, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(device: D, history_limit: usize) -> Self {
        CaptureService {
            device,
            history: Mutex::new(VecDeque::with_capacity(history_limit)),
            history_limit,
            counter: AtomicU64::new(0),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Grab a fresh screenshot as grayscale pixels.
    pub async fn capture(&self) -> AdbResult<GrayImage> {
        let cap = self.device.screen_capture().await?;
        let index = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let image = image::load_from_memory(&cap.bytes)
            .map_err(|e| AdbError::CaptureDecodeFailed {
                description: e.to_string(),
            })?
            .into_luma8();
        debug!(
            "capture #{index}: {}x{} in {}ms",
            image.width(),
            image.height(),
            cap.duration_ms
        );
        self.remember(CaptureRecord {
            index,
            png: cap.bytes,
            duration_ms: cap.duration_ms,
        });
        Ok(image)
    }

    fn remember(&self, record: CaptureRecord) {
        if self.history_limit == 0 {
            return;
        }
        // A poisoned lock only means another capture panicked mid-push.
        let mut history = match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<CaptureRecord> {
        match self.history.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn captures_taken(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Luma};
    use std::io::Cursor;

    struct StaticScreen {
        png: Vec<u8>,
    }

    impl StaticScreen {
        fn new(shade: u8) -> Self {
            let img = GrayImage::from_pixel(8, 6, Luma([shade]));
            let mut png = Vec::new();
            DynamicImage::ImageLuma8(img)
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .unwrap();
            StaticScreen { png }
        }
    }

    impl AdbClient for StaticScreen {
        async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
            Ok(self.png.clone())
        }
        async fn tap(&self, _x: u32, _y: u32) -> AdbResult<()> {
            Ok(())
        }
        async fn swipe(&self, _: u32, _: u32, _: u32, _: u32, _: Option<u32>) -> AdbResult<()> {
            Ok(())
        }
        fn screen_dimensions(&self) -> (u32, u32) {
            (8, 6)
        }
        fn device_name(&self) -> &str {
            "static"
        }
    }

    #[tokio::test]
    async fn capture_decodes_to_grayscale() {
        let service = CaptureService::new(StaticScreen::new(200));
        let img = service.capture().await.unwrap();
        assert_eq!(img.dimensions(), (8, 6));
        assert_eq!(img.get_pixel(3, 3)[0], 200);
        assert_eq!(service.captures_taken(), 1);
    }

    #[tokio::test]
    async fn history_keeps_only_latest_captures() {
        let service = CaptureService::with_history_limit(StaticScreen::new(10), 3);
        for _ in 0..5 {
            service.capture().await.unwrap();
        }
        let indices: Vec<u64> = service.history().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn undecodable_capture_is_an_error() {
        let service = CaptureService::new(StaticScreen {
            png: b"not a png".to_vec(),
        });
        let err = service.capture().await.unwrap_err();
        assert!(matches!(err, AdbError::CaptureDecodeFailed { .. }));
        assert!(service.history().is_empty());
    }
}
