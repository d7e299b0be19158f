//! Purpose: Plugin facade wrapping one decoder strategy plus its diagnostic log channel.
//! Exports: `TilePlugin`, `GENERIC_PLUGIN_NAME`, `GENERIC_DESCRIPTION`.
//! Role: Safe request/response API used by sessions; knows nothing about raw pointers.
//! Invariants: The display name is never blank; renaming always queues a log entry.
//! Invariants: Decode and pipeline calls forward to the strategy without reinterpretation.
use crate::api::decoder::{
    CloseRequest, DecodeAllRequest, DecodeOneRequest, DecoderStrategy, OpenRequest,
    PipelineRequest,
};
use crate::core::config::{
    DEFAULT_DISPLAY_VERSION, DEFAULT_HOST_VERSION, PluginConfiguration, PluginOption,
    encode_configuration,
};
use crate::core::error::{Error, ErrorKind};
use crate::core::geometry::{Pixel, TileConfiguration, TileFormat, TilePosition};
use crate::core::log::LogChannel;
use crate::decoders::DecoderKind;

pub const GENERIC_PLUGIN_NAME: &str = "Tile Decoder";
pub const GENERIC_DESCRIPTION: &str = "Native tile decoder.";

#[derive(Debug)]
pub struct TilePlugin {
    strategy: DecoderStrategy,
    logs: LogChannel,
    name: String,
    description: String,
    display_version: String,
    required_host_version: u32,
}

impl TilePlugin {
    pub fn new(strategy: DecoderStrategy) -> Self {
        let (name, description, display_version, required_host_version) =
            match strategy.as_configurable() {
                Some(decoder) => {
                    let info = decoder.info();
                    (
                        info.default_name,
                        info.description,
                        info.display_version,
                        info.required_host_version,
                    )
                }
                None => (
                    GENERIC_PLUGIN_NAME.to_string(),
                    GENERIC_DESCRIPTION.to_string(),
                    DEFAULT_DISPLAY_VERSION.to_string(),
                    DEFAULT_HOST_VERSION,
                ),
            };
        Self {
            strategy,
            logs: LogChannel::new(),
            name,
            description,
            display_version,
            required_host_version,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required_host_version(&self) -> u32 {
        self.required_host_version
    }

    pub fn supports_decode_all(&self) -> bool {
        self.strategy.supports_decode_all()
    }

    pub fn is_configurable(&self) -> bool {
        self.strategy.as_configurable().is_some()
    }

    /// Current document; strategies without options produce an empty option list.
    pub fn configuration(&self) -> PluginConfiguration {
        let options = self
            .strategy
            .as_configurable()
            .map(|decoder| decoder.options())
            .unwrap_or_default();
        PluginConfiguration {
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.display_version.clone(),
            required_host_version: self.required_host_version,
            options,
        }
    }

    pub fn configuration_json(&self) -> Result<String, Error> {
        encode_configuration(&self.configuration())
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), Error> {
        if name.trim().is_empty() {
            return Err(Error::new(ErrorKind::Format).with_message("plugin name is blank"));
        }
        self.name = name.to_string();
        self.logs.push(format!("Plugin name set to '{name}'."));
        tracing::debug!(plugin = name, "plugin renamed");
        Ok(())
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.logs.push(message);
    }

    pub fn drain_logs(&mut self) -> Vec<String> {
        self.logs.drain()
    }

    /// Forwards options to a configurable strategy; plain strategies ignore them.
    pub fn apply_options(&mut self, options: &[PluginOption]) {
        if let Some(decoder) = self.strategy.as_configurable_mut() {
            decoder.apply_options(options, &mut self.logs);
        }
    }

    pub fn open(&mut self, source_name: &str) -> Result<(), Error> {
        let request = OpenRequest {
            plugin_name: &self.name,
            source_name,
        };
        self.strategy.open(&request)
    }

    pub fn close(&mut self) -> Result<(), Error> {
        let request = CloseRequest {
            plugin_name: &self.name,
        };
        self.strategy.close(&request)
    }

    pub fn decode_one(
        &mut self,
        data: &[u8],
        format: TileFormat,
        position: TilePosition,
        keep_index: bool,
    ) -> Result<Pixel, Error> {
        let request = DecodeOneRequest {
            plugin_name: &self.name,
            data,
            format,
            position,
            keep_index,
        };
        self.strategy.decode_one(&request)
    }

    pub fn decode_all(
        &mut self,
        data: &[u8],
        format: TileFormat,
        keep_index: bool,
        out: &mut [Pixel],
    ) -> Result<(), Error> {
        let request = DecodeAllRequest {
            plugin_name: &self.name,
            data,
            format,
            keep_index,
        };
        self.strategy.decode_all(&request, out)
    }

    /// Runs the pre hook; `configuration` receives the hook's edits even when it fails.
    pub fn preprocess(
        &mut self,
        raw: &[u8],
        configuration: &mut TileConfiguration,
    ) -> Result<(), Error> {
        let mut request = PipelineRequest {
            plugin_name: &self.name,
            raw,
            configuration: *configuration,
        };
        let result = self.strategy.preprocess(&mut request);
        *configuration = request.configuration;
        result
    }

    pub fn postprocess(
        &mut self,
        raw: &[u8],
        configuration: &mut TileConfiguration,
    ) -> Result<(), Error> {
        let mut request = PipelineRequest {
            plugin_name: &self.name,
            raw,
            configuration: *configuration,
        };
        let result = self.strategy.postprocess(&mut request);
        *configuration = request.configuration;
        result
    }
}

impl Default for TilePlugin {
    fn default() -> Self {
        Self::new(DecoderKind::default().strategy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::decoder::TileDecoder;

    #[derive(Default)]
    struct Doubler {
        opened: bool,
    }

    impl TileDecoder for Doubler {
        fn supports_decode_all(&self) -> bool {
            false
        }

        fn open(&mut self, _request: &OpenRequest<'_>) -> Result<(), Error> {
            self.opened = true;
            Ok(())
        }

        fn close(&mut self, _request: &CloseRequest<'_>) -> Result<(), Error> {
            self.opened = false;
            Ok(())
        }

        fn decode_one(&mut self, request: &DecodeOneRequest<'_>) -> Result<Pixel, Error> {
            if !self.opened {
                return Err(Error::new(ErrorKind::Open));
            }
            let range = request.format.pixel_range(request.position, request.data.len())?;
            let value = request.data[range.start].wrapping_mul(2);
            Ok(Pixel::new(value, value, value, 0xFF))
        }

        fn decode_all(
            &mut self,
            _request: &DecodeAllRequest<'_>,
            _out: &mut [Pixel],
        ) -> Result<(), Error> {
            Err(Error::new(ErrorKind::Internal).with_message("unsupported"))
        }

        fn preprocess(&mut self, request: &mut PipelineRequest<'_>) -> Result<(), Error> {
            request.configuration.rows = 7;
            Err(Error::new(ErrorKind::Callback).with_message("pre hook refused"))
        }
    }

    #[test]
    fn plain_strategy_yields_generic_document() {
        let plugin = TilePlugin::new(DecoderStrategy::plain(Doubler::default()));
        assert!(!plugin.is_configurable());
        assert!(!plugin.supports_decode_all());
        let configuration = plugin.configuration();
        assert_eq!(configuration.name, GENERIC_PLUGIN_NAME);
        assert_eq!(configuration.description, GENERIC_DESCRIPTION);
        assert_eq!(configuration.version, DEFAULT_DISPLAY_VERSION);
        assert_eq!(configuration.required_host_version, DEFAULT_HOST_VERSION);
        assert!(configuration.options.is_empty());
    }

    #[test]
    fn set_name_rejects_blank_and_logs_change() {
        let mut plugin = TilePlugin::new(DecoderStrategy::plain(Doubler::default()));
        let err = plugin.set_name("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(plugin.drain_logs().is_empty());
        assert_eq!(plugin.name(), GENERIC_PLUGIN_NAME);

        plugin.set_name("Sheet A").unwrap();
        assert_eq!(plugin.name(), "Sheet A");
        assert_eq!(plugin.configuration().name, "Sheet A");
        assert_eq!(plugin.drain_logs(), vec!["Plugin name set to 'Sheet A'.".to_string()]);
    }

    #[test]
    fn decode_one_forwards_to_strategy() {
        let mut plugin = TilePlugin::new(DecoderStrategy::plain(Doubler::default()));
        let format = TileFormat::new(2, 2, 8, 0);
        let closed = plugin
            .decode_one(&[1, 2, 3, 4], format, TilePosition::new(0, 1, 1), false)
            .unwrap_err();
        assert_eq!(closed.kind(), ErrorKind::Open);

        plugin.open("sheet.bin").unwrap();
        let pixel = plugin
            .decode_one(&[1, 2, 3, 4], format, TilePosition::new(0, 1, 1), false)
            .unwrap();
        assert_eq!(pixel, Pixel::new(8, 8, 8, 0xFF));
    }

    #[test]
    fn pipeline_edits_survive_hook_failure() {
        let mut plugin = TilePlugin::new(DecoderStrategy::plain(Doubler::default()));
        let mut configuration = TileConfiguration {
            start: 0,
            size: 16,
            rows: 1,
            format: TileFormat::new(2, 2, 8, 0),
        };
        let err = plugin.preprocess(&[], &mut configuration).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Callback);
        assert_eq!(configuration.rows, 7);

        plugin.postprocess(&[], &mut configuration).unwrap();
        assert_eq!(configuration.rows, 7);
    }

    #[test]
    fn default_plugin_is_configurable_and_supports_decode_all() {
        let plugin = TilePlugin::default();
        assert!(plugin.is_configurable());
        assert!(plugin.supports_decode_all());
        assert!(!plugin.configuration().options.is_empty());
        let json = plugin.configuration_json().unwrap();
        assert!(json.contains("\"plugincfg\""));
    }
}
