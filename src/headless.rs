use anyhow::Result;
use futures::executor::block_on;
use log::{debug, info};
use std::{
    io::{self, BufRead},
    thread,
    time::Instant,
};

use crate::{
    capture::V4lCamera,
    config::{Args, ScanConfig},
    decode::RqrrDecoder,
    report_detection,
    session::{PollOutcome, Session},
    surface::Visibility,
};

/// Terminal driver: sleep until the next poll is due, print each result and
/// wait for Enter before scanning again.
pub fn run(args: &Args) -> Result<()> {
    let config = ScanConfig::from(args);
    let interval = config.interval;
    let mut session = Session::new(V4lCamera::new(args.device), RqrrDecoder, config)?;

    if block_on(session.start(Instant::now())).is_err() {
        info!("no camera stream, nothing to scan");
        return Ok(());
    }

    let mut lines = io::stdin().lock().lines();
    loop {
        if let Some(due) = session.next_deadline() {
            thread::sleep(due.saturating_duration_since(Instant::now()));
            if session.tick(Instant::now()) == Some(PollOutcome::Detected) {
                report_detection(&session, args.snapshot.as_deref());
            }
            continue;
        }

        match session.visibility() {
            Visibility::Frozen => {
                eprintln!("press Enter to scan again");
                match lines.next() {
                    Some(line) => {
                        line?;
                    }
                    None => break,
                }
                if block_on(session.reset(Instant::now())).is_err() {
                    break;
                }
            }
            Visibility::Live if session.stream().is_some() => {
                debug!("waiting for stream metadata");
                thread::sleep(interval);
                session.tick(Instant::now());
            }
            Visibility::Live => {
                if let Some(e) = session.last_error() {
                    info!("camera stream lost: {e}");
                }
                break;
            }
        }
    }
    Ok(())
}
