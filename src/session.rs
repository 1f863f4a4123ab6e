use log::{debug, error, info, trace, warn};
use std::time::Instant;

use crate::{
    capture::{FrameSource, VideoStream},
    config::ScanConfig,
    decode::{DecodeResult, Decoder},
    error::FrameSourceError,
    present::{draw_outline, StrokeStyle},
    scan::{PollTicket, ScanLoop},
    surface::{LoadingIndicator, ResetControl, ResultText, Surface, Visibility},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// ticket belonged to a cancelled scan
    Stale,
    Missed,
    Detected,
}

/// Everything one scanning session owns: the camera stream, both display
/// surfaces, the result panel and the reset affordance.
pub struct Session<S: FrameSource, D: Decoder> {
    source: S,
    decoder: D,
    config: ScanConfig,

    stream: Option<S::Stream>,
    awaiting_metadata: bool,
    scan: ScanLoop,

    live: Surface,
    snapshot: Surface,
    visibility: Visibility,
    result: ResultText,
    reset_control: ResetControl,
    loader: LoadingIndicator,

    last_result: Option<DecodeResult>,
    last_error: Option<FrameSourceError>,
}

impl<S: FrameSource, D: Decoder> Session<S, D> {
    pub fn new(source: S, decoder: D, config: ScanConfig) -> Result<Self, FrameSourceError> {
        let (width, height) = (config.constraints.width, config.constraints.height);
        let surface = |hidden| {
            Surface::new(width, height, hidden)
                .ok_or_else(|| FrameSourceError::constraint(format!("surface {width}x{height}")))
        };
        Ok(Self {
            live: surface(false)?,
            snapshot: surface(true)?,
            scan: ScanLoop::new(config.interval),
            source,
            decoder,
            config,
            stream: None,
            awaiting_metadata: false,
            visibility: Visibility::Live,
            result: Default::default(),
            reset_control: Default::default(),
            loader: Default::default(),
            last_result: None,
            last_error: None,
        })
    }

    /// Acquire a camera stream and, once its size is known, start playback
    /// and arm the scan loop. A failure is logged and leaves the session idle.
    pub async fn start(&mut self, now: Instant) -> Result<(), FrameSourceError> {
        self.scan.cancel();
        if self.stream.take().is_some() {
            debug!("released previous stream");
        }
        self.awaiting_metadata = false;

        match self.source.start(&self.config.constraints).await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.awaiting_metadata = true;
                self.last_error = None;
                self.stream_ready(now)?;
                Ok(())
            }
            Err(e) => {
                error!("{}: {}", e.kind, e.message);
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Start playback and the first poll if stream metadata has arrived.
    fn stream_ready(&mut self, now: Instant) -> Result<bool, FrameSourceError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };
        let Some((width, height)) = stream.dimensions() else {
            return Ok(false);
        };
        self.awaiting_metadata = false;
        if let Err(e) = stream.play() {
            error!("{}: {}", e.kind, e.message);
            self.last_error = Some(e.clone());
            return Err(e);
        }
        debug!("stream ready at {width}x{height}, scanning");
        self.scan.arm(now);
        Ok(true)
    }

    /// Drive pending work: late stream metadata and due polls.
    pub fn tick(&mut self, now: Instant) -> Option<PollOutcome> {
        if self.awaiting_metadata && self.stream_ready(now).is_err() {
            return None;
        }
        let ticket = self.scan.take_due(now)?;
        Some(self.poll(ticket, now))
    }

    /// One scan attempt: snapshot the current frame, decode the fixed-size
    /// buffer, then either present the result or schedule the next attempt.
    pub fn poll(&mut self, ticket: PollTicket, now: Instant) -> PollOutcome {
        if !self.scan.is_current(ticket) {
            debug!("dropping stale poll");
            return PollOutcome::Stale;
        }
        let Some(stream) = self.stream.as_mut() else {
            return PollOutcome::Stale;
        };

        match stream.current_frame() {
            Ok(frame) => {
                self.live.draw_frame(&frame);
                self.snapshot.draw_frame(&frame);
            }
            Err(e) => {
                warn!("frame grab failed: {e}");
                self.scan.reschedule(now);
                return PollOutcome::Missed;
            }
        }

        let pixels = self.snapshot.image_data();
        match self
            .decoder
            .decode(&pixels, self.snapshot.width(), self.snapshot.height())
        {
            Some(result) => {
                self.scan.stop();
                self.present(result);
                PollOutcome::Detected
            }
            None => {
                self.scan.reschedule(now);
                trace!("no code, retry #{}", self.scan.reschedules());
                PollOutcome::Missed
            }
        }
    }

    /// Show the decoded text and outline, freeze the display on the
    /// snapshot and pause the camera.
    pub fn present(&mut self, result: DecodeResult) {
        info!("decoded: {}", result.text);
        self.result.set(&result.text);

        let overlay = draw_outline(
            self.snapshot.pixmap_mut(),
            &result.corners,
            StrokeStyle::default(),
        );
        self.snapshot.push_overlay(overlay);

        self.live.set_hidden(true);
        self.snapshot.set_hidden(false);
        self.visibility = Visibility::Frozen;

        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.pause() {
                warn!("pause failed: {e}");
            }
        }

        self.reset_control.enable();
        self.last_result = Some(result);
    }

    /// Return to the live feed and scan again. Does nothing while the reset
    /// control is disabled.
    pub async fn reset(&mut self, now: Instant) -> Result<bool, FrameSourceError> {
        if self.reset_control.is_disabled() {
            debug!("reset ignored, control disabled");
            return Ok(false);
        }
        self.result.clear();
        self.snapshot.set_hidden(true);
        self.live.set_hidden(false);
        self.visibility = Visibility::Live;
        self.reset_control.disable();

        self.start(now).await?;
        Ok(true)
    }

    /// Redraw the live surface from the stream between polls.
    pub fn refresh_live(&mut self) {
        if self.visibility != Visibility::Live {
            return;
        }
        let Some(stream) = self.stream.as_mut().filter(|s| s.is_playing()) else {
            return;
        };
        match stream.current_frame() {
            Ok(frame) => self.live.draw_frame(&frame),
            Err(e) => debug!("live refresh skipped: {e}"),
        }
    }

    /// The surface currently shown.
    pub fn visible_surface(&self) -> &Surface {
        let surface = match self.visibility {
            Visibility::Live => &self.live,
            Visibility::Frozen => &self.snapshot,
        };
        debug_assert!(!surface.is_hidden());
        surface
    }

    #[inline]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scan.next_deadline()
    }
    #[cfg(test)]
    pub fn scan(&self) -> &ScanLoop {
        &self.scan
    }
    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
    #[inline]
    pub fn result_text(&self) -> &str {
        self.result.as_str()
    }
    #[inline]
    pub fn reset_control(&self) -> &ResetControl {
        &self.reset_control
    }
    #[cfg(test)]
    pub fn live(&self) -> &Surface {
        &self.live
    }
    #[inline]
    pub fn snapshot(&self) -> &Surface {
        &self.snapshot
    }
    #[inline]
    pub fn stream(&self) -> Option<&S::Stream> {
        self.stream.as_ref()
    }
    #[cfg(test)]
    pub fn source(&self) -> &S {
        &self.source
    }
    #[inline]
    pub fn loader(&self) -> &LoadingIndicator {
        &self.loader
    }
    #[inline]
    pub fn last_result(&self) -> Option<&DecodeResult> {
        self.last_result.as_ref()
    }
    #[inline]
    pub fn last_error(&self) -> Option<&FrameSourceError> {
        self.last_error.as_ref()
    }
}
