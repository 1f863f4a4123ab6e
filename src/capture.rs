use log::{debug, info, warn};
use std::{io, time::Duration};
use v4l::{
    buffer::Type,
    io::{
        mmap::Stream,
        traits::{CaptureStream, Stream as _},
    },
    video::Capture,
    Device, Format, FourCC,
};
use zbus::{proxy, Connection};

use crate::{
    config::{Constraints, Facing},
    error::FrameSourceError,
};

/// One RGBA frame at the stream's native size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub buf: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, buf: Vec<u8>) -> Self {
        Self { width, height, buf }
    }
}

#[allow(async_fn_in_trait)]
pub trait FrameSource {
    type Stream: VideoStream;

    /// Request a stream matching `constraints`. Every call reopens the
    /// device, so a revoked permission surfaces as `PermissionDenied`.
    async fn start(&mut self, constraints: &Constraints) -> Result<Self::Stream, FrameSourceError>;
}

pub trait VideoStream {
    /// Native frame size, `None` until the stream knows it.
    fn dimensions(&self) -> Option<(u32, u32)>;
    fn play(&mut self) -> Result<(), FrameSourceError>;
    /// Stop delivering frames. Buffers stay allocated.
    fn pause(&mut self) -> Result<(), FrameSourceError>;
    fn is_playing(&self) -> bool;
    fn current_frame(&mut self) -> Result<Frame, FrameSourceError>;
}

#[proxy(
    interface = "org.freedesktop.portal.Camera",
    default_service = "org.freedesktop.portal.Desktop",
    default_path = "/org/freedesktop/portal/desktop"
)]
trait Camera {
    #[zbus(property)]
    fn is_camera_present(&self) -> zbus::Result<bool>;
}

async fn portal_camera_present() -> zbus::Result<bool> {
    let conn = Connection::session().await?;
    let proxy = CameraProxy::new(&conn).await?;
    proxy.is_camera_present().await
}

const YUYV: &[u8; 4] = b"YUYV";
const FRAME_TIMEOUT: Duration = Duration::from_millis(500);

/// Webcam behind `/dev/video<index>`.
pub struct V4lCamera {
    index: usize,
}

impl V4lCamera {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl FrameSource for V4lCamera {
    type Stream = V4lStream;

    async fn start(&mut self, constraints: &Constraints) -> Result<V4lStream, FrameSourceError> {
        match portal_camera_present().await {
            Ok(false) => {
                return Err(FrameSourceError::unavailable(
                    "camera portal reports no camera",
                ))
            }
            Ok(true) => {}
            Err(e) => debug!("camera portal not reachable: {e}"),
        }
        if constraints.audio {
            warn!("audio capture is not supported, ignoring");
        }
        if constraints.facing != Facing::User {
            debug!("facing {:?} is advisory for v4l2 devices", constraints.facing);
        }

        let device = Device::new(self.index)?;
        let wanted = Format::new(constraints.width, constraints.height, FourCC::new(YUYV));
        let format = device
            .set_format(&wanted)
            .map_err(|e| FrameSourceError::constraint(format!("set format: {e}")))?;
        if format.fourcc != FourCC::new(YUYV) {
            return Err(FrameSourceError::constraint(format!(
                "device offers {} instead of YUYV",
                format.fourcc
            )));
        }
        info!(
            "/dev/video{} streaming {}x{} {}",
            self.index, format.width, format.height, format.fourcc
        );

        let mut stream = Stream::with_buffers(&device, Type::VideoCapture, 4)?;
        stream.set_timeout(FRAME_TIMEOUT);
        Ok(V4lStream {
            _device: device,
            stream,
            width: format.width,
            height: format.height,
            playback: Playback::default(),
        })
    }
}

pub struct V4lStream {
    _device: Device,
    stream: Stream<'static>,
    width: u32,
    height: u32,
    playback: Playback,
}

/// Whether frames are wanted and whether the driver may be streaming.
/// Streaming is only ever switched on by the first `next()` after `play`,
/// which queues every mmap buffer before STREAMON.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Playback {
    playing: bool,
    streaming: bool,
}

impl Playback {
    fn play(&mut self) {
        self.playing = true;
    }

    /// Returns true when the driver has to be told to stop.
    fn pause(&mut self) -> bool {
        self.playing = false;
        std::mem::take(&mut self.streaming)
    }

    fn capture_attempted(&mut self) {
        self.streaming = true;
    }
}

fn frame_error(err: io::Error) -> FrameSourceError {
    match err.kind() {
        io::ErrorKind::TimedOut => {
            FrameSourceError::backend(format!("no frame within {FRAME_TIMEOUT:?}"))
        }
        _ => err.into(),
    }
}

impl VideoStream for V4lStream {
    fn dimensions(&self) -> Option<(u32, u32)> {
        (self.width > 0 && self.height > 0).then_some((self.width, self.height))
    }

    fn play(&mut self) -> Result<(), FrameSourceError> {
        self.playback.play();
        Ok(())
    }

    fn pause(&mut self) -> Result<(), FrameSourceError> {
        if self.playback.pause() {
            self.stream.stop()?;
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playback.playing
    }

    fn current_frame(&mut self) -> Result<Frame, FrameSourceError> {
        if !self.playback.playing {
            return Err(FrameSourceError::backend("stream is paused"));
        }
        self.playback.capture_attempted();
        let (buf, _meta) = self.stream.next().map_err(frame_error)?;
        Ok(Frame::new(
            self.width,
            self.height,
            yuyv_to_rgba(buf, self.width, self.height),
        ))
    }
}

/// Packed YUYV 4:2:2 to RGBA using BT.601 full-range coefficients.
pub fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixels = (width * height) as usize;
    let mut out = Vec::with_capacity(pixels * 4);

    for chunk in data.chunks_exact(4).take(pixels / 2) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        for y in [y0, y1] {
            out.extend_from_slice(&yuv_to_rgba(y, u, v));
        }
    }
    // short buffers are padded with black
    out.resize(pixels * 4, 0);
    out
}

fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let y = y as i32;
    let u = u as i32 - 128;
    let v = v as i32 - 128;
    let r = y + ((359 * v) >> 8);
    let g = y - ((88 * u + 183 * v) >> 8);
    let b = y + ((454 * u) >> 8);
    [
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
        0xff,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameSourceErrorKind;

    #[test]
    fn play_leaves_streamon_to_first_capture() {
        let mut playback = Playback::default();
        playback.play();
        assert!(playback.playing);
        assert!(!playback.streaming);
        // nothing was captured, so there is nothing to stop
        assert!(!playback.pause());
    }

    #[test]
    fn pause_stops_only_an_active_stream() {
        let mut playback = Playback::default();
        playback.play();
        playback.capture_attempted();
        assert!(playback.pause());
        assert!(!playback.playing);
        assert!(!playback.pause());

        playback.play();
        assert!(!playback.streaming);
    }

    #[test]
    fn frame_timeout_is_a_backend_error() {
        let err = frame_error(io::Error::new(io::ErrorKind::TimedOut, "VIDIOC_DQBUF"));
        assert_eq!(err.kind, FrameSourceErrorKind::Backend);
        assert!(err.message.contains("500ms"), "{}", err.message);

        let denied = frame_error(io::Error::new(io::ErrorKind::PermissionDenied, "DQBUF"));
        assert_eq!(denied.kind, FrameSourceErrorKind::PermissionDenied);
    }

    #[test]
    fn neutral_chroma_is_grey() {
        let data = [0, 128, 255, 128, 100, 128, 200, 128];
        let rgba = yuyv_to_rgba(&data, 4, 1);
        assert_eq!(
            rgba,
            vec![
                0, 0, 0, 0xff, //
                255, 255, 255, 0xff, //
                100, 100, 100, 0xff, //
                200, 200, 200, 0xff,
            ]
        );
    }

    #[test]
    fn strong_red_chroma() {
        let rgba = yuyv_to_rgba(&[76, 85, 76, 255], 2, 1);
        assert!(rgba[0] > 200, "red channel {}", rgba[0]);
        assert!(rgba[1] < 40, "green channel {}", rgba[1]);
        assert!(rgba[2] < 40, "blue channel {}", rgba[2]);
        assert_eq!(&rgba[0..4], &rgba[4..8]);
    }

    #[test]
    fn short_buffer_is_padded() {
        let rgba = yuyv_to_rgba(&[255, 128, 255, 128], 2, 2);
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[8..], &[0; 8]);
    }
}
