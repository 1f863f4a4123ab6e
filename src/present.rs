use itertools::Itertools;
use log::debug;
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::decode::Corner;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: Color::from_rgba8(0xff, 0x00, 0x00, 0xff), // red
            width: 3.,
        }
    }
}

/// Closed outline drawn around a detected code.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    /// corners in drawing order, the first repeated at the end
    pub points: [Corner; 5],
    pub style: StrokeStyle,
}

impl Overlay {
    pub fn new(corners: &[Corner; 4], style: StrokeStyle) -> Self {
        let [tl, tr, br, bl] = *corners;
        Self {
            points: [tl, tr, br, bl, tl],
            style,
        }
    }

    pub fn segments(&self) -> Vec<(Corner, Corner)> {
        self.points.iter().copied().tuple_windows().collect()
    }
}

/// Stroke the outline through `corners` onto `pixmap`, in the order given.
pub fn draw_outline(pixmap: &mut Pixmap, corners: &[Corner; 4], style: StrokeStyle) -> Overlay {
    let overlay = Overlay::new(corners, style);

    let mut pb = PathBuilder::new();
    let first = overlay.points[0];
    pb.move_to(first.x, first.y);
    for (_, to) in overlay.segments() {
        pb.line_to(to.x, to.y);
    }

    match pb.finish() {
        Some(path) => {
            let mut paint = Paint::default();
            paint.set_color(overlay.style.color);
            paint.anti_alias = true;
            let stroke = Stroke {
                width: overlay.style.width,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
        None => debug!("degenerate outline {:?}", overlay.points),
    }
    overlay
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> [Corner; 4] {
        [
            Corner::new(10., 10.),
            Corner::new(50., 10.),
            Corner::new(50., 40.),
            Corner::new(10., 40.),
        ]
    }

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let c = pixmap.pixel(x, y).unwrap().demultiply();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    #[test]
    fn outline_is_closed_in_corner_order() {
        let overlay = Overlay::new(&square(), StrokeStyle::default());
        let segments = overlay.segments();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], (Corner::new(10., 10.), Corner::new(50., 10.)));
        assert_eq!(segments[1], (Corner::new(50., 10.), Corner::new(50., 40.)));
        assert_eq!(segments[2], (Corner::new(50., 40.), Corner::new(10., 40.)));
        assert_eq!(segments[3], (Corner::new(10., 40.), Corner::new(10., 10.)));
    }

    #[test]
    fn corners_are_not_reordered() {
        let shuffled = [
            Corner::new(50., 40.),
            Corner::new(10., 10.),
            Corner::new(10., 40.),
            Corner::new(50., 10.),
        ];
        let overlay = Overlay::new(&shuffled, StrokeStyle::default());
        assert_eq!(&overlay.points[..4], &shuffled[..]);
        assert_eq!(overlay.points[4], shuffled[0]);
    }

    #[test]
    fn outline_is_stroked_red() {
        let mut pixmap = Pixmap::new(64, 64).unwrap();
        draw_outline(&mut pixmap, &square(), StrokeStyle::default());

        // on the top edge
        assert_eq!(pixel(&pixmap, 30, 10), [0xff, 0, 0, 0xff]);
        // on the left edge
        assert_eq!(pixel(&pixmap, 10, 25), [0xff, 0, 0, 0xff]);
        // inside and outside stay untouched
        assert_eq!(pixel(&pixmap, 30, 25)[3], 0);
        assert_eq!(pixel(&pixmap, 60, 60)[3], 0);
    }

    #[test]
    fn default_style_is_red_width_three() {
        let style = StrokeStyle::default();
        assert_eq!(style.width, 3.);
        assert_eq!(style.color, Color::from_rgba8(255, 0, 0, 255));
    }
}
