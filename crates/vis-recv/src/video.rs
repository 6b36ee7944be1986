//! GStreamer-backed frame source.
//!
//! ```text
//! filesrc ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink
//! ```
//!
//! The appsink holds a single buffer and does not sync to the clock, so the
//! decoder runs exactly as fast as frames are pulled.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use gst::prelude::*;
use vis_core::Frame;
use vis_engine::FrameSource;

pub struct GstFrameSource {
    pipeline: gst::Pipeline,
    sink: gst_app::AppSink,
    frame_count: Option<u64>,
}

impl GstFrameSource {
    pub fn open(path: &Path) -> Result<Self> {
        gst::init().context("failed to initialise gstreamer")?;

        let location = path
            .to_str()
            .ok_or_else(|| anyhow!("input path {} is not valid UTF-8", path.display()))?;
        let description = format!(
            "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=sink sync=false max-buffers=1 drop=false",
            location.replace('"', "\\\"")
        );
        tracing::debug!(pipeline = %description, "building video pipeline");

        let pipeline = gst::parse::launch(&description)
            .context("failed to build video pipeline")?
            .downcast::<gst::Pipeline>()
            .map_err(|_| anyhow!("video pipeline is not a gst::Pipeline"))?;
        let sink = pipeline
            .by_name("sink")
            .ok_or_else(|| anyhow!("appsink missing from video pipeline"))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| anyhow!("sink element is not an appsink"))?;

        let mut source = Self {
            pipeline,
            sink,
            frame_count: None,
        };

        // Preroll so duration and caps are known before the first pull.
        source
            .pipeline
            .set_state(gst::State::Paused)
            .context("failed to open video")?;
        let (prerolled, _, _) = source.pipeline.state(gst::ClockTime::NONE);
        if prerolled.is_err() {
            return Err(source.bus_error().unwrap_or_else(|| anyhow!("failed to open video")));
        }
        source.frame_count = source.estimate_frame_count();

        source
            .pipeline
            .set_state(gst::State::Playing)
            .context("failed to start video playback")?;
        tracing::debug!(frame_count = ?source.frame_count, "video opened");
        Ok(source)
    }

    /// Duration × framerate. Containers rarely store an exact frame count.
    fn estimate_frame_count(&self) -> Option<u64> {
        let duration = self.pipeline.query_duration::<gst::ClockTime>()?;
        let caps = self.sink.static_pad("sink")?.current_caps()?;
        let framerate = caps.structure(0)?.get::<gst::Fraction>("framerate").ok()?;
        let (numer, denom) = (framerate.numer(), framerate.denom());
        if numer <= 0 || denom <= 0 {
            return None;
        }
        let frames = u128::from(duration.nseconds()) * numer as u128
            / (denom as u128 * 1_000_000_000);
        u64::try_from(frames).ok()
    }

    fn bus_error(&self) -> Option<anyhow::Error> {
        let bus = self.pipeline.bus()?;
        let message = bus.pop_filtered(&[gst::MessageType::Error])?;
        match message.view() {
            gst::MessageView::Error(err) => Some(anyhow!(
                "{} ({})",
                err.error(),
                err.debug().map(|d| d.to_string()).unwrap_or_default()
            )),
            _ => None,
        }
    }
}

impl FrameSource for GstFrameSource {
    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let sample = match self.sink.pull_sample() {
            Ok(sample) => sample,
            Err(_) if self.sink.is_eos() => return Ok(None),
            Err(e) => {
                return Err(self
                    .bus_error()
                    .unwrap_or_else(|| anyhow!("failed to read frame: {e}")))
            }
        };

        let caps = sample.caps().context("frame without caps")?;
        let structure = caps.structure(0).context("frame caps are empty")?;
        let width = structure.get::<i32>("width").context("frame caps lack a width")?;
        let height = structure.get::<i32>("height").context("frame caps lack a height")?;
        let (width, height) = (u32::try_from(width)?, u32::try_from(height)?);
        if height == 0 {
            bail!("frame has zero height");
        }

        let buffer = sample.buffer().context("frame without buffer")?;
        let map = buffer
            .map_readable()
            .map_err(|e| anyhow!("failed to map frame: {e}"))?;
        let data = map.as_slice().to_vec();
        let stride = rgb_stride(width, height, data.len())?;

        Ok(Some(Frame::new(width, height, stride, data)?))
    }
}

/// Row stride of a packed RGB buffer of `len` bytes. GStreamer pads rows to
/// four bytes; tightly packed rows are accepted as well.
fn rgb_stride(width: u32, height: u32, len: usize) -> Result<usize> {
    let row = width as usize * 3;
    let padded = (row + 3) & !3;
    let rows = height as usize;
    if len == padded * rows {
        Ok(padded)
    } else if len == row * rows {
        Ok(row)
    } else {
        bail!("frame buffer of {len} bytes does not match {width}x{height} RGB")
    }
}

impl Drop for GstFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = %e, "failed to stop video pipeline");
        }
    }
}
