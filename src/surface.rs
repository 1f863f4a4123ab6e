use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::path::Path;
use tiny_skia::{BlendMode, IntSize, Pixmap, PixmapPaint, Transform};

use crate::{capture::Frame, present::Overlay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// camera feed shown
    #[default]
    Live,
    /// last snapshot with overlay shown
    Frozen,
}

/// A fixed-size drawing surface that can be hidden.
pub struct Surface {
    pixmap: Pixmap,
    hidden: bool,
    overlays: Vec<Overlay>,
}

impl Surface {
    pub fn new(width: u32, height: u32, hidden: bool) -> Option<Self> {
        Some(Self {
            pixmap: Pixmap::new(width, height)?,
            hidden,
            overlays: Vec::new(),
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }
    #[inline]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
    #[inline]
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }
    #[inline]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
    #[inline]
    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }
    #[cfg(test)]
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn push_overlay(&mut self, overlay: Overlay) {
        self.overlays.push(overlay);
    }

    /// Copy `frame` at its native size onto the top-left corner, clipping
    /// whatever falls outside the surface. Previous content and overlays are
    /// discarded.
    pub fn draw_frame(&mut self, frame: &Frame) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
        self.overlays.clear();
        let Some(src) = frame_pixmap(frame) else {
            return;
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            src.as_ref(),
            &PixmapPaint {
                blend_mode: BlendMode::Source,
                ..PixmapPaint::default()
            },
            Transform::identity(),
            None,
        );
    }

    /// RGBA pixels of the whole surface, the fixed decode buffer.
    pub fn image_data(&self) -> Vec<u8> {
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        let img = RgbaImage::from_vec(self.width(), self.height(), self.image_data())
            .ok_or_else(|| anyhow!("surface buffer does not match its size"))?;
        img.save(path)?;
        Ok(())
    }
}

fn frame_pixmap(frame: &Frame) -> Option<Pixmap> {
    let size = IntSize::from_wh(frame.width, frame.height)?;
    // frames are opaque so straight RGBA is already premultiplied
    Pixmap::from_vec(frame.buf.clone(), size)
}

/// Plain-text result container.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ResultText(String);

impl ResultText {
    pub fn set(&mut self, text: &str) {
        self.0.clear();
        self.0.push_str(text);
    }
    pub fn clear(&mut self) {
        self.0.clear();
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The reset affordance. Starts disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetControl {
    disabled: bool,
}

impl Default for ResetControl {
    fn default() -> Self {
        Self { disabled: true }
    }
}

impl ResetControl {
    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
    #[inline]
    pub fn enable(&mut self) {
        self.disabled = false;
    }
    #[inline]
    pub fn disable(&mut self) {
        self.disabled = true;
    }
}

/// Full-screen busy overlay that also swallows keyboard input while shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingIndicator {
    hidden: bool,
    keyboard_blocked: bool,
}

impl Default for LoadingIndicator {
    fn default() -> Self {
        Self {
            hidden: true,
            keyboard_blocked: false,
        }
    }
}

// not driven by the scan flow yet, only consulted for keyboard blocking
#[allow(dead_code)]
impl LoadingIndicator {
    pub fn start_loading(&mut self) {
        self.hidden = false;
        self.keyboard_blocked = true;
    }
    pub fn end_loading(&mut self) {
        self.hidden = true;
        self.keyboard_blocked = false;
    }
    #[inline]
    pub fn is_visible(&self) -> bool {
        !self.hidden
    }
    #[inline]
    pub fn blocks_keyboard(&self) -> bool {
        self.keyboard_blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Frame {
        let buf = (0..width * height).flat_map(|_| rgba).collect();
        Frame::new(width, height, buf)
    }

    #[test]
    fn draw_frame_clips_larger_frame() {
        let mut surface = Surface::new(4, 2, false).unwrap();
        surface.draw_frame(&solid(8, 8, [10, 20, 30, 255]));
        let data = surface.image_data();
        assert_eq!(data.len(), 4 * 2 * 4);
        assert!(data.chunks_exact(4).all(|p| p == &[10, 20, 30, 255]));
    }

    #[test]
    fn draw_frame_leaves_uncovered_area_transparent() {
        let mut surface = Surface::new(4, 2, false).unwrap();
        surface.draw_frame(&solid(2, 1, [255, 0, 0, 255]));
        let data = surface.image_data();
        assert_eq!(&data[0..4], &[255, 0, 0, 255]);
        assert_eq!(&data[8..12], &[0, 0, 0, 0]);
        assert_eq!(&data[16..20], &[0, 0, 0, 0]);
    }

    #[test]
    fn degenerate_frame_draws_nothing() {
        let mut surface = Surface::new(2, 2, false).unwrap();
        surface.draw_frame(&Frame::new(0, 0, Vec::new()));
        assert!(surface.image_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn snapshot_saves_as_png() {
        let mut surface = Surface::new(6, 3, false).unwrap();
        surface.draw_frame(&solid(6, 3, [0, 0xff, 0, 0xff]));
        let path = std::env::temp_dir().join(format!("qrcam-{}.png", std::process::id()));
        surface.save_png(&path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        let _ = std::fs::remove_file(&path);
        assert_eq!(img.dimensions(), (6, 3));
        assert_eq!(img.get_pixel(5, 2).0, [0, 0xff, 0, 0xff]);
    }

    #[test]
    fn result_text_replaces_content() {
        let mut text = ResultText::default();
        text.set("first");
        text.set("second");
        assert_eq!(text.as_str(), "second");
        text.clear();
        assert_eq!(text.as_str(), "");
    }

    #[test]
    fn reset_control_starts_disabled() {
        let mut control = ResetControl::default();
        assert!(control.is_disabled());
        control.enable();
        assert!(!control.is_disabled());
    }

    #[test]
    fn loading_indicator_blocks_keyboard_while_shown() {
        let mut loader = LoadingIndicator::default();
        assert!(!loader.is_visible());
        assert!(!loader.blocks_keyboard());
        loader.start_loading();
        assert!(loader.is_visible());
        assert!(loader.blocks_keyboard());
        loader.end_loading();
        assert!(!loader.is_visible());
        assert!(!loader.blocks_keyboard());
    }
}
