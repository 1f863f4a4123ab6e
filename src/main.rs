mod app;
mod capture;
mod config;
mod decode;
mod error;
mod headless;
mod logger;
mod present;
mod scan;
mod session;
mod surface;

use anyhow::Result;
use clap::Parser;
use log::{debug, error, info};
use std::path::Path;

use crate::{
    capture::FrameSource,
    config::Args,
    decode::Decoder,
    session::Session,
};

/// Print the decoded text and optionally keep the annotated snapshot.
pub(crate) fn report_detection<S: FrameSource, D: Decoder>(
    session: &Session<S, D>,
    snapshot: Option<&Path>,
) {
    println!("{}", session.result_text());
    if let Some(result) = session.last_result() {
        debug!("code outline {:?}", result.corners);
    }
    if let Some(path) = snapshot {
        match session.snapshot().save_png(path) {
            Ok(()) => info!("snapshot written to {}", path.display()),
            Err(e) => error!("snapshot: {e}"),
        }
    }
}

fn main() -> Result<()> {
    logger::init_logger();
    let args = Args::parse();
    if args.headless {
        headless::run(&args)
    } else {
        app::run(&args)
    }
}
