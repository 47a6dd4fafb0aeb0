use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::capture::{self, Grabber};
use crate::recognition::Recognizer;
use crate::selection::Region;

/// Grabs `region` into a timestamped PNG under `dir`. The pixel grab is
/// synchronous, so it runs on a blocking task.
pub async fn capture_to_file(
    grabber: Arc<dyn Grabber>,
    region: Region,
    dir: &Path,
) -> Result<PathBuf> {
    let path = capture::capture_path(dir);
    let task_path = path.clone();

    tokio::task::spawn_blocking(move || grabber.grab_to(region, &task_path))
        .await
        .context("Capture task failed")??;

    Ok(path)
}

/// Reads the capture, hands it to the recognizer, and deletes the file.
/// Deletion is best-effort and also runs on the failure path.
pub async fn recognize_file<R: Recognizer>(recognizer: &R, path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read capture {}", path.display()));

    let result = match bytes {
        Ok(bytes) => recognizer.recognize(&bytes).await,
        Err(e) => Err(e),
    };

    if let Err(e) = tokio::fs::remove_file(path).await {
        log::warn!("Failed to remove capture {}: {}", path.display(), e);
    }

    result
}

pub async fn capture_and_recognize<R: Recognizer>(
    grabber: Arc<dyn Grabber>,
    recognizer: &R,
    region: Region,
    dir: &Path,
) -> Result<String> {
    let path = capture_to_file(grabber, region, dir).await?;
    recognize_file(recognizer, &path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ResultBuffer;

    /// Writes a blank PNG with the region's dimensions, standing in for a
    /// real screen grab.
    struct PngGrabber;

    impl Grabber for PngGrabber {
        fn grab_to(&self, region: Region, path: &Path) -> Result<()> {
            image::RgbaImage::new(region.width(), region.height()).save(path)?;
            Ok(())
        }
    }

    struct FixedRecognizer(&'static str);

    impl Recognizer for FixedRecognizer {
        async fn recognize(&self, png: &[u8]) -> Result<String> {
            assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
            Ok(self.0.to_string())
        }
    }

    struct FailingRecognizer;

    impl Recognizer for FailingRecognizer {
        async fn recognize(&self, _png: &[u8]) -> Result<String> {
            anyhow::bail!("recognizer offline")
        }
    }

    #[tokio::test]
    async fn drag_capture_recognize_updates_buffer() {
        let dir = tempfile::tempdir().unwrap();

        // Drag from (300,200) to (100,50) selects (100,50)-(300,200).
        let region = Region::from_points(300, 200, 100, 50);
        assert_eq!(
            region,
            Region {
                left: 100,
                top: 50,
                right: 300,
                bottom: 200
            }
        );

        let text = capture_and_recognize(
            Arc::new(PngGrabber),
            &FixedRecognizer("Hello"),
            region,
            dir.path(),
        )
        .await
        .unwrap();

        let mut buffer = ResultBuffer::default();
        buffer.set(text);
        assert_eq!(buffer.text(), "Hello");

        // The capture file is gone once its contents were encoded.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn capture_file_removed_when_recognition_fails() {
        let dir = tempfile::tempdir().unwrap();
        let region = Region::from_points(0, 0, 10, 10);

        let err = capture_and_recognize(
            Arc::new(PngGrabber),
            &FailingRecognizer,
            region,
            dir.path(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("recognizer offline"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_capture_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = recognize_file(&FixedRecognizer("unused"), &dir.path().join("gone.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read capture"));
    }

    #[tokio::test]
    async fn capture_to_file_writes_a_timestamped_png() {
        let dir = tempfile::tempdir().unwrap();
        let region = Region::from_points(0, 0, 4, 4);

        let path = capture_to_file(Arc::new(PngGrabber), region, dir.path())
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("capture_"));
        assert!(name.ends_with(".png"));
        assert!(path.exists());
    }
}
