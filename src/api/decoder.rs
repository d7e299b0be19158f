//! Purpose: Capability contract implemented by concrete tile decoder strategies.
//! Exports: `TileDecoder`, `ConfigurableDecoder`, `DecoderStrategy`, `DecoderInfo`, request types.
//! Role: Seam between the plugin facade and pixel-decoding algorithms.
//! Invariants: Requests borrow host buffers for one call only; strategies cannot retain them.
//! Invariants: The configurable capability is resolved once when the strategy is wrapped.
use crate::core::config::PluginOption;
use crate::core::error::Error;
use crate::core::geometry::{Pixel, TileConfiguration, TileFormat, TilePosition};
use crate::core::log::LogChannel;

#[derive(Clone, Copy, Debug)]
pub struct OpenRequest<'a> {
    pub plugin_name: &'a str,
    pub source_name: &'a str,
}

#[derive(Clone, Copy, Debug)]
pub struct CloseRequest<'a> {
    pub plugin_name: &'a str,
}

#[derive(Clone, Copy, Debug)]
pub struct DecodeOneRequest<'a> {
    pub plugin_name: &'a str,
    pub data: &'a [u8],
    pub format: TileFormat,
    pub position: TilePosition,
    pub keep_index: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct DecodeAllRequest<'a> {
    pub plugin_name: &'a str,
    pub data: &'a [u8],
    pub format: TileFormat,
    pub keep_index: bool,
}

/// Input to the pre/post hooks. Hooks may rewrite `configuration`; the caller
/// hands the result back to the host.
#[derive(Clone, Copy, Debug)]
pub struct PipelineRequest<'a> {
    pub plugin_name: &'a str,
    pub raw: &'a [u8],
    pub configuration: TileConfiguration,
}

pub trait TileDecoder: Send {
    fn supports_decode_all(&self) -> bool;

    fn open(&mut self, request: &OpenRequest<'_>) -> Result<(), Error>;

    fn close(&mut self, request: &CloseRequest<'_>) -> Result<(), Error>;

    fn decode_one(&mut self, request: &DecodeOneRequest<'_>) -> Result<Pixel, Error>;

    /// Fills `out`, which holds `floor(data.len() * 8 / bpp)` pixels.
    fn decode_all(&mut self, request: &DecodeAllRequest<'_>, out: &mut [Pixel]) -> Result<(), Error>;

    fn preprocess(&mut self, _request: &mut PipelineRequest<'_>) -> Result<(), Error> {
        Ok(())
    }

    fn postprocess(&mut self, _request: &mut PipelineRequest<'_>) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecoderInfo {
    pub default_name: String,
    pub description: String,
    pub display_version: String,
    pub required_host_version: u32,
}

/// Strategies that describe themselves and accept user options.
pub trait ConfigurableDecoder: TileDecoder {
    fn info(&self) -> DecoderInfo;

    /// Current option values, in declaration order.
    fn options(&self) -> Vec<PluginOption>;

    /// Unknown option names are ignored.
    fn apply_options(&mut self, options: &[PluginOption], log: &mut LogChannel);
}

pub enum DecoderStrategy {
    Plain(Box<dyn TileDecoder>),
    Configurable(Box<dyn ConfigurableDecoder>),
}

impl DecoderStrategy {
    pub fn plain(decoder: impl TileDecoder + 'static) -> Self {
        DecoderStrategy::Plain(Box::new(decoder))
    }

    pub fn configurable(decoder: impl ConfigurableDecoder + 'static) -> Self {
        DecoderStrategy::Configurable(Box::new(decoder))
    }

    pub fn as_configurable(&self) -> Option<&dyn ConfigurableDecoder> {
        match self {
            DecoderStrategy::Plain(_) => None,
            DecoderStrategy::Configurable(decoder) => Some(decoder.as_ref()),
        }
    }

    pub fn as_configurable_mut(&mut self) -> Option<&mut dyn ConfigurableDecoder> {
        match self {
            DecoderStrategy::Plain(_) => None,
            DecoderStrategy::Configurable(decoder) => Some(decoder.as_mut()),
        }
    }

    pub fn supports_decode_all(&self) -> bool {
        match self {
            DecoderStrategy::Plain(decoder) => decoder.supports_decode_all(),
            DecoderStrategy::Configurable(decoder) => decoder.supports_decode_all(),
        }
    }

    pub fn open(&mut self, request: &OpenRequest<'_>) -> Result<(), Error> {
        match self {
            DecoderStrategy::Plain(decoder) => decoder.open(request),
            DecoderStrategy::Configurable(decoder) => decoder.open(request),
        }
    }

    pub fn close(&mut self, request: &CloseRequest<'_>) -> Result<(), Error> {
        match self {
            DecoderStrategy::Plain(decoder) => decoder.close(request),
            DecoderStrategy::Configurable(decoder) => decoder.close(request),
        }
    }

    pub fn decode_one(&mut self, request: &DecodeOneRequest<'_>) -> Result<Pixel, Error> {
        match self {
            DecoderStrategy::Plain(decoder) => decoder.decode_one(request),
            DecoderStrategy::Configurable(decoder) => decoder.decode_one(request),
        }
    }

    pub fn decode_all(
        &mut self,
        request: &DecodeAllRequest<'_>,
        out: &mut [Pixel],
    ) -> Result<(), Error> {
        match self {
            DecoderStrategy::Plain(decoder) => decoder.decode_all(request, out),
            DecoderStrategy::Configurable(decoder) => decoder.decode_all(request, out),
        }
    }

    pub fn preprocess(&mut self, request: &mut PipelineRequest<'_>) -> Result<(), Error> {
        match self {
            DecoderStrategy::Plain(decoder) => decoder.preprocess(request),
            DecoderStrategy::Configurable(decoder) => decoder.preprocess(request),
        }
    }

    pub fn postprocess(&mut self, request: &mut PipelineRequest<'_>) -> Result<(), Error> {
        match self {
            DecoderStrategy::Plain(decoder) => decoder.postprocess(request),
            DecoderStrategy::Configurable(decoder) => decoder.postprocess(request),
        }
    }
}

impl std::fmt::Debug for DecoderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderStrategy::Plain(_) => f.write_str("DecoderStrategy::Plain"),
            DecoderStrategy::Configurable(decoder) => f
                .debug_tuple("DecoderStrategy::Configurable")
                .field(&decoder.info().default_name)
                .finish(),
        }
    }
}
