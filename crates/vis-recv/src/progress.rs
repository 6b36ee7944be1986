//! Human-readable progress line.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use vis_engine::{Phase, Progress};

pub struct Reporter {
    start: Instant,
    /// One line per update instead of rewriting the current one.
    line_per_update: bool,
    dirty: bool,
}

impl Reporter {
    pub fn new(verbosity: u8) -> Self {
        Self {
            start: Instant::now(),
            line_per_update: verbosity > 0,
            dirty: false,
        }
    }

    pub fn report(&mut self, progress: &Progress) {
        let line = render(progress, self.start.elapsed());
        let mut out = io::stdout().lock();
        let written = if self.line_per_update {
            writeln!(out, "{line}")
        } else {
            self.dirty = true;
            write!(out, "\r{line}").and_then(|_| out.flush())
        };
        if let Err(e) = written {
            tracing::debug!(error = %e, "failed to write progress");
        }
    }

    /// Terminate a `\r`-rewritten line so later output starts clean.
    pub fn finish(&mut self) {
        if self.dirty {
            println!();
            self.dirty = false;
        }
    }
}

pub fn render(progress: &Progress, elapsed: Duration) -> String {
    let frame = frame(progress.frame, progress.frame_count);
    let fps = fps(progress.frame, elapsed);
    let remaining = remaining(progress.frame, progress.frame_count, elapsed);
    match progress.phase {
        Phase::SeekingHeader => format!("{frame}, looking for header, {fps}, {remaining}"),
        Phase::Receiving | Phase::Complete => {
            let packet = packet(progress.packet, progress.packet_count);
            format!("{frame}, {packet}, {fps}, {remaining}")
        }
    }
}

fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * done as f64 / total as f64
    }
}

fn frame(frame: u64, frame_count: Option<u64>) -> String {
    match frame_count {
        Some(n) => format!("frame {frame}/{n} ({:05.2}%)", percent(frame, n)),
        None => format!("frame {frame}/?"),
    }
}

fn packet(packet: u64, packet_count: u64) -> String {
    format!(
        "packet {packet}/{packet_count} ({:05.2}%)",
        percent(packet, packet_count)
    )
}

fn fps(frame: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let fps = if secs > 0.0 { frame as f64 / secs } else { 0.0 };
    format!("{fps:.2} fps")
}

fn remaining(frame: u64, frame_count: Option<u64>, elapsed: Duration) -> String {
    let Some(total) = frame_count.filter(|&n| n > 0 && frame > 0) else {
        return "--:--:-- remaining".to_string();
    };
    let fraction = (frame as f64 / total as f64).min(1.0);
    let secs = (elapsed.as_secs_f64() / fraction - elapsed.as_secs_f64()).max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02} remaining",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}
