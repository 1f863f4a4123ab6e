use log::debug;

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub x: f32,
    pub y: f32,
}

impl Corner {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Decoded payload plus the code's outline in source-image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub text: String,
    /// top-left, top-right, bottom-right, bottom-left
    pub corners: [Corner; 4],
}

pub trait Decoder {
    /// `pixels` is tightly packed RGBA, `width * height * 4` bytes.
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<DecodeResult>;
}

#[derive(Default, Debug, Clone, Copy)]
pub struct RqrrDecoder;

impl Decoder for RqrrDecoder {
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<DecodeResult> {
        let (w, h) = (width as usize, height as usize);
        if w == 0 || h == 0 || pixels.len() != w * h * 4 {
            debug!(
                "skip decode: {} bytes for {}x{}",
                pixels.len(),
                width,
                height
            );
            return None;
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| {
            let i = (y * w + x) * 4;
            luma(pixels[i], pixels[i + 1], pixels[i + 2])
        });

        prepared.detect_grids().into_iter().find_map(|grid| {
            match grid.decode() {
                Ok((_meta, text)) => {
                    let corners = grid
                        .bounds
                        .map(|p| Corner::new(p.x as f32, p.y as f32));
                    Some(DecodeResult { text, corners })
                }
                Err(e) => {
                    debug!("grid decode failed: {e:?}");
                    None
                }
            }
        })
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 0, 0), 76);
    }

    #[test]
    fn blank_frame_has_no_code() {
        let pixels = vec![0xff; 300 * 150 * 4];
        assert_eq!(RqrrDecoder.decode(&pixels, 300, 150), None);
    }

    const WIDTH: usize = 300;
    const HEIGHT: usize = 150;
    const SCALE: usize = 4;

    /// Paint `text` as a QR code into a 300x150 RGBA buffer with its top-left
    /// module at `origin`. Returns the buffer and the code's side in pixels.
    fn render(
        text: &str,
        origin: (usize, usize),
        dark: [u8; 4],
        light: [u8; 4],
    ) -> (Vec<u8>, f32) {
        let code = qrcode::QrCode::new(text.as_bytes()).unwrap();
        let modules = code.width();
        let mut pixels: Vec<u8> = (0..WIDTH * HEIGHT).flat_map(|_| light).collect();
        for my in 0..modules {
            for mx in 0..modules {
                if code[(mx, my)] != qrcode::Color::Dark {
                    continue;
                }
                for dy in 0..SCALE {
                    for dx in 0..SCALE {
                        let x = origin.0 + mx * SCALE + dx;
                        let y = origin.1 + my * SCALE + dy;
                        let i = (y * WIDTH + x) * 4;
                        pixels[i..i + 4].copy_from_slice(&dark);
                    }
                }
            }
        }
        (pixels, (modules * SCALE) as f32)
    }

    fn assert_near(corner: Corner, x: f32, y: f32) {
        // within one and a half modules of the code's edge
        let slack = SCALE as f32 * 1.5;
        assert!(
            (corner.x - x).abs() <= slack && (corner.y - y).abs() <= slack,
            "corner {corner:?} not near ({x}, {y})"
        );
    }

    #[test]
    fn decodes_text_and_clockwise_corners() {
        let (pixels, side) = render("HELLO", (100, 33), [0, 0, 0, 0xff], [0xff; 4]);
        let result = RqrrDecoder
            .decode(&pixels, WIDTH as u32, HEIGHT as u32)
            .expect("code should decode");

        assert_eq!(result.text, "HELLO");
        let [tl, tr, br, bl] = result.corners;
        assert_near(tl, 100., 33.);
        assert_near(tr, 100. + side, 33.);
        assert_near(br, 100. + side, 33. + side);
        assert_near(bl, 100., 33. + side);
    }

    #[test]
    fn coloured_code_decodes_through_luma() {
        let dark_blue = [0x10, 0x10, 0x80, 0xff];
        let pale_yellow = [0xff, 0xff, 0xa0, 0xff];
        let (pixels, _) = render("qrcam", (20, 20), dark_blue, pale_yellow);
        let result = RqrrDecoder.decode(&pixels, WIDTH as u32, HEIGHT as u32);
        assert_eq!(result.map(|r| r.text).as_deref(), Some("qrcam"));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        assert_eq!(RqrrDecoder.decode(&[0; 12], 2, 2), None);
        assert_eq!(RqrrDecoder.decode(&[], 0, 0), None);
    }
}
