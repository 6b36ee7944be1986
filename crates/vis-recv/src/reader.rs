//! Barcode symbol decoders backed by `rxing`.

use std::collections::{HashMap, HashSet};

use rxing::{BarcodeFormat, DecodeHintType, DecodeHintValue, DecodingHintDictionary, Exceptions};
use vis_core::config::{DecodeConfig, Symbology};
use vis_core::ddm::{ChannelView, DecodeResult, DecoderChain};
use vis_core::{DecodeError, SymbolDecoder};

/// Plain `rxing` read of a single channel, restricted to one symbology.
pub struct BarcodeReader {
    format: BarcodeFormat,
    try_harder: bool,
}

impl BarcodeReader {
    pub fn new(symbology: Symbology, try_harder: bool) -> Self {
        let format = match symbology {
            Symbology::DataMatrix => BarcodeFormat::DATA_MATRIX,
            Symbology::QrCode => BarcodeFormat::QR_CODE,
        };
        Self { format, try_harder }
    }

    fn hints(&self) -> DecodingHintDictionary {
        let mut hints: DecodingHintDictionary = HashMap::new();
        hints.insert(
            DecodeHintType::POSSIBLE_FORMATS,
            DecodeHintValue::PossibleFormats(HashSet::from([self.format])),
        );
        if self.try_harder {
            hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));
        }
        hints
    }
}

impl SymbolDecoder for BarcodeReader {
    fn decode(&self, view: &ChannelView<'_>) -> DecodeResult {
        let mut hints = self.hints();
        let found = rxing::helpers::detect_multiple_in_luma_with_hints(
            view.to_luma(),
            view.width(),
            view.height(),
            &mut hints,
        );
        match found {
            Ok(results) => results
                .iter()
                .map(|result| latin1_bytes(result.getText()))
                .collect(),
            Err(Exceptions::NotFoundException(_)) => Ok(Vec::new()),
            Err(e) => Err(DecodeError::Reader(e.to_string())),
        }
    }
}

/// Binary payloads come back as ISO-8859-1 text, one char per byte.
fn latin1_bytes(text: &str) -> Result<Vec<u8>, DecodeError> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                DecodeError::Reader(format!("symbol text holds non latin-1 character {c:?}"))
            })
        })
        .collect()
}

/// Retries `inner` on a Gaussian-blurred copy of the channel. Softens
/// compression blocking that breaks module edges.
pub struct Blurred<D> {
    inner: D,
    sigma: f32,
}

impl<D> Blurred<D> {
    pub fn new(inner: D, sigma: f32) -> Self {
        Self { inner, sigma }
    }
}

impl<D: SymbolDecoder> SymbolDecoder for Blurred<D> {
    fn decode(&self, view: &ChannelView<'_>) -> DecodeResult {
        let (width, height) = (view.width(), view.height());
        let plane = image::GrayImage::from_raw(width, height, view.to_luma())
            .ok_or_else(|| DecodeError::Reader("channel plane has the wrong size".into()))?;
        let blurred = image::imageops::blur(&plane, self.sigma).into_raw();
        let view = ChannelView::from_plane(&blurred, width, height)
            .map_err(|e| DecodeError::Reader(e.to_string()))?;
        self.inner.decode(&view)
    }
}

/// The decoder chain described by `config`: a plain read, then optionally a
/// blurred retry.
pub fn from_config(config: &DecodeConfig) -> DecoderChain<'static> {
    let chain = DecoderChain::new().then(BarcodeReader::new(config.symbology, config.try_harder));
    if config.blur_retry {
        chain.then(Blurred::new(
            BarcodeReader::new(config.symbology, config.try_harder),
            config.blur_sigma,
        ))
    } else {
        chain
    }
}
