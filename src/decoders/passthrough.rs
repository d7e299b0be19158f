// Byte-aligned formats copied straight into RGBA; missing channels are filled opaque.
use crate::api::decoder::{
    CloseRequest, ConfigurableDecoder, DecodeAllRequest, DecodeOneRequest, DecoderInfo,
    OpenRequest, TileDecoder,
};
use crate::core::config::{DEFAULT_DISPLAY_VERSION, DEFAULT_HOST_VERSION, PluginOption};
use crate::core::error::{Error, ErrorKind};
use crate::core::geometry::Pixel;
use crate::core::log::LogChannel;

#[derive(Debug, Default)]
pub struct PassthroughDecoder {
    opened: bool,
}

impl PassthroughDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

fn expand(bytes: &[u8]) -> Pixel {
    match *bytes {
        [r, g, b, a, ..] => Pixel::new(r, g, b, a),
        [r, g, b] => Pixel::new(r, g, b, 0xFF),
        [r, g] => Pixel::new(r, g, 0xFF, 0xFF),
        [v] => Pixel::new(v, v, v, 0xFF),
        [] => Pixel::default(),
    }
}

impl TileDecoder for PassthroughDecoder {
    fn supports_decode_all(&self) -> bool {
        true
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
            return Err(Error::new(ErrorKind::Open).with_message("decoder is not open"));
        }
        if request.data.is_empty() {
            return Err(Error::new(ErrorKind::Format).with_message("tile data is empty"));
        }
        let range = request
            .format
            .pixel_range(request.position, request.data.len())?;
        Ok(expand(&request.data[range]))
    }

    fn decode_all(&mut self, request: &DecodeAllRequest<'_>, out: &mut [Pixel]) -> Result<(), Error> {
        if !self.opened {
            return Err(Error::new(ErrorKind::Open).with_message("decoder is not open"));
        }
        let stride = request.format.bytes_per_pixel();
        let total = request.data.len() / stride;
        if out.len() < total {
            return Err(Error::new(ErrorKind::Range)
                .with_message(format!("{} pixels cannot hold {total} decoded pixels", out.len())));
        }
        for (pixel, chunk) in out.iter_mut().zip(request.data.chunks_exact(stride)) {
            *pixel = expand(chunk);
        }
        Ok(())
    }
}

impl ConfigurableDecoder for PassthroughDecoder {
    fn info(&self) -> DecoderInfo {
        DecoderInfo {
            default_name: "Passthrough RGBA Decoder".to_string(),
            description: "Copies byte-aligned tile pixels into RGBA.".to_string(),
            display_version: DEFAULT_DISPLAY_VERSION.to_string(),
            required_host_version: DEFAULT_HOST_VERSION,
        }
    }

    fn options(&self) -> Vec<PluginOption> {
        Vec::new()
    }

    fn apply_options(&mut self, _options: &[PluginOption], _log: &mut LogChannel) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{TileFormat, TilePosition};

    fn opened() -> PassthroughDecoder {
        let mut decoder = PassthroughDecoder::new();
        decoder
            .open(&OpenRequest {
                plugin_name: "test",
                source_name: "test",
            })
            .unwrap();
        decoder
    }

    #[test]
    fn channel_counts_expand_to_rgba() {
        assert_eq!(expand(&[1, 2, 3, 4]), Pixel::new(1, 2, 3, 4));
        assert_eq!(expand(&[1, 2, 3]), Pixel::new(1, 2, 3, 0xFF));
        assert_eq!(expand(&[1, 2]), Pixel::new(1, 2, 0xFF, 0xFF));
        assert_eq!(expand(&[9]), Pixel::new(9, 9, 9, 0xFF));
    }

    #[test]
    fn decode_one_reads_addressed_pixel() {
        let mut decoder = opened();
        let data: Vec<u8> = (0..16).collect();
        let request = DecodeOneRequest {
            plugin_name: "test",
            data: &data,
            format: TileFormat::new(2, 2, 32, 0),
            position: TilePosition::new(0, 1, 1),
            keep_index: false,
        };
        assert_eq!(decoder.decode_one(&request).unwrap(), Pixel::new(12, 13, 14, 15));
    }

    #[test]
    fn decode_all_drops_trailing_partial_pixel() {
        let mut decoder = opened();
        let data = [10u8, 20, 30, 40, 50, 60, 70];
        let request = DecodeAllRequest {
            plugin_name: "test",
            data: &data,
            format: TileFormat::new(2, 1, 24, 0),
            keep_index: false,
        };
        let mut out = vec![Pixel::default(); 2];
        decoder.decode_all(&request, &mut out).unwrap();
        assert_eq!(out, [Pixel::new(10, 20, 30, 0xFF), Pixel::new(40, 50, 60, 0xFF)]);

        let mut short = vec![Pixel::default(); 1];
        assert_eq!(
            decoder.decode_all(&request, &mut short).unwrap_err().kind(),
            ErrorKind::Range
        );
    }

    #[test]
    fn closed_decoder_refuses_work() {
        let mut decoder = PassthroughDecoder::new();
        let request = DecodeAllRequest {
            plugin_name: "test",
            data: &[1, 2, 3, 4],
            format: TileFormat::new(1, 1, 32, 0),
            keep_index: false,
        };
        let mut out = vec![Pixel::default(); 1];
        assert_eq!(
            decoder.decode_all(&request, &mut out).unwrap_err().kind(),
            ErrorKind::Open
        );
    }
}
