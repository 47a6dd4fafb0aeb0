use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use xcap::Monitor;

use crate::selection::Region;

/// Produces a PNG file covering a screen region.
pub trait Grabber: Send + Sync {
    fn grab_to(&self, region: Region, path: &Path) -> Result<()>;
}

/// In-process pixel grab: captures the primary monitor with xcap and crops
/// the frame down to the requested region.
pub struct MonitorGrabber;

impl Grabber for MonitorGrabber {
    fn grab_to(&self, region: Region, path: &Path) -> Result<()> {
        let monitors = Monitor::all().context("Failed to get monitors")?;

        // Use the primary monitor (or first available)
        let monitor = monitors
            .into_iter()
            .next()
            .context("No monitors found")?;

        let frame = monitor
            .capture_image()
            .context("Failed to capture screenshot")?;

        let (left, top, width, height) = crop_bounds(region, frame.width(), frame.height())
            .context("Selected region lies outside the screen")?;

        let cropped = image::imageops::crop_imm(&frame, left, top, width, height).to_image();
        cropped
            .save(path)
            .with_context(|| format!("Failed to write capture to {}", path.display()))?;

        Ok(())
    }
}

/// Shells out to the OS screen-capture utility instead of grabbing pixels
/// in-process. Only macOS ships one that accepts a region.
pub struct OsToolGrabber;

impl Grabber for OsToolGrabber {
    fn grab_to(&self, region: Region, path: &Path) -> Result<()> {
        if !cfg!(target_os = "macos") {
            bail!("The ostool capture strategy requires the macOS screencapture utility");
        }

        let rect = format!(
            "{},{},{},{}",
            region.left,
            region.top,
            region.width(),
            region.height()
        );
        let status = Command::new("screencapture")
            .arg("-x")
            .arg("-R")
            .arg(&rect)
            .arg(path)
            .status()
            .context("Failed to run screencapture")?;

        if !status.success() {
            bail!("screencapture exited with {}", status);
        }

        Ok(())
    }
}

/// One capture file per gesture, named by timestamp, in `dir`.
pub fn capture_path(dir: &Path) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    dir.join(format!("capture_{}.png", now.as_millis()))
}

/// Intersects the region with the captured frame. A drag that starts or ends
/// past the monitor edge is clipped; a region entirely off-screen is `None`.
fn crop_bounds(region: Region, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
    let left = region.left.clamp(0, frame_width as i32) as u32;
    let top = region.top.clamp(0, frame_height as i32) as u32;
    let right = region.right.clamp(0, frame_width as i32) as u32;
    let bottom = region.bottom.clamp(0, frame_height as i32) as u32;

    let width = right - left;
    let height = bottom - top;
    if width == 0 || height == 0 {
        return None;
    }

    Some((left, top, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_paths_are_timestamped_pngs() {
        let path = capture_path(Path::new("/tmp"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("capture_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn crop_bounds_clamps_to_frame() {
        let region = Region::from_points(-10, -10, 50, 40);
        assert_eq!(crop_bounds(region, 100, 100), Some((0, 0, 50, 40)));

        let region = Region::from_points(80, 90, 200, 300);
        assert_eq!(crop_bounds(region, 100, 100), Some((80, 90, 20, 10)));
    }

    #[test]
    fn crop_bounds_rejects_offscreen_regions() {
        let region = Region::from_points(150, 150, 200, 200);
        assert_eq!(crop_bounds(region, 100, 100), None);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn ostool_strategy_requires_macos() {
        let dir = tempfile::tempdir().unwrap();
        let err = OsToolGrabber
            .grab_to(Region::from_points(0, 0, 10, 10), &dir.path().join("shot.png"))
            .unwrap_err();
        assert!(err.to_string().contains("screencapture"));
    }
}
