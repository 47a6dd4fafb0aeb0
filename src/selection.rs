use serde::{Deserialize, Serialize};
use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindow, WebviewWindowBuilder};

pub const OVERLAY_LABEL: &str = "overlay";

/// Screen rectangle in pixels. `left <= right` and `top <= bottom` hold for
/// every constructed value regardless of drag direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Region {
    /// Builds a normalized region from the anchor and release points of a
    /// drag gesture.
    pub fn from_points(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            left: x1.min(x2),
            top: y1.min(y2),
            right: x1.max(x2),
            bottom: y1.max(y2),
        }
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top) as u32
    }

    /// A click without a drag selects nothing.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Opens the selection overlay: a borderless transparent window covering the
/// primary monitor, always on top, capturing pointer input until the drag
/// finishes or Escape cancels it.
pub fn open_overlay(app: &AppHandle) -> tauri::Result<WebviewWindow> {
    if let Some(window) = app.get_webview_window(OVERLAY_LABEL) {
        window.show()?;
        window.set_focus()?;
        return Ok(window);
    }

    let mut builder = WebviewWindowBuilder::new(
        app,
        OVERLAY_LABEL,
        WebviewUrl::App("overlay.html".into()),
    )
    .title("Select region")
    .decorations(false)
    .transparent(true)
    .always_on_top(true)
    .skip_taskbar(true)
    .resizable(false)
    .position(0.0, 0.0);

    if let Some(monitor) = app.primary_monitor()? {
        let size = monitor.size();
        builder = builder.inner_size(size.width as f64, size.height as f64);
    }

    let overlay = builder.build()?;
    overlay.show()?;
    overlay.set_focus()?;

    Ok(overlay)
}

pub fn close_overlay(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(OVERLAY_LABEL) {
        let _ = window.close();
    }
}
