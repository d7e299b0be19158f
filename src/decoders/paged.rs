// Packed 2-bit "page" decoder: each byte carries four 2-bit coverage indices.
use crate::api::decoder::{
    CloseRequest, ConfigurableDecoder, DecodeAllRequest, DecodeOneRequest, DecoderInfo,
    OpenRequest, TileDecoder,
};
use crate::core::config::{
    DEFAULT_DISPLAY_VERSION, DEFAULT_HOST_VERSION, OptionKind, PluginOption, normalize_value,
};
use crate::core::error::{Error, ErrorKind};
use crate::core::geometry::Pixel;
use crate::core::log::LogChannel;

const PAGE_COUNT: u8 = 4;
const ALPHA_RAMP: [u8; 4] = [0x00, 0xFF, 0xFF, 0xFF];

#[derive(Debug, Default)]
pub struct PagedDecoder {
    opened: bool,
    page: u8,
}

impl PagedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self) -> u8 {
        self.page
    }

    fn decode_packed(&self, packed: u8) -> Pixel {
        let shift = (PAGE_COUNT - self.page - 1) * 2;
        let index = (packed >> shift) & 0x03;
        Pixel::new(0xFF, 0xFF, 0xFF, ALPHA_RAMP[usize::from(index)])
    }

    fn apply_page(&mut self, option: &PluginOption, log: &mut LogChannel) {
        let raw = normalize_value(&option.value);
        match raw.trim().parse::<u8>() {
            Ok(page) if page < PAGE_COUNT => {
                if page != self.page {
                    self.page = page;
                    log.push(format!("Active decode page switched to '{page}'."));
                }
            }
            _ => log.push(format!("Ignoring invalid page value '{raw}'.")),
        }
    }
}

impl TileDecoder for PagedDecoder {
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
        let offset = request
            .format
            .pixel_offset(request.position, request.data.len())?;
        Ok(self.decode_packed(request.data[offset]))
    }

    fn decode_all(&mut self, request: &DecodeAllRequest<'_>, out: &mut [Pixel]) -> Result<(), Error> {
        if !self.opened {
            return Err(Error::new(ErrorKind::Open).with_message("decoder is not open"));
        }
        if out.len() < request.data.len() {
            return Err(Error::new(ErrorKind::Range).with_message(format!(
                "{} pixels cannot hold {} source bytes",
                out.len(),
                request.data.len()
            )));
        }
        for (pixel, packed) in out.iter_mut().zip(request.data) {
            *pixel = self.decode_packed(*packed);
        }
        Ok(())
    }
}

impl ConfigurableDecoder for PagedDecoder {
    fn info(&self) -> DecoderInfo {
        DecoderInfo {
            default_name: "Paged 2-Bit Decoder".to_string(),
            description: "Expands packed 2-bit pages into white pixels with coverage alpha."
                .to_string(),
            display_version: DEFAULT_DISPLAY_VERSION.to_string(),
            required_host_version: DEFAULT_HOST_VERSION,
        }
    }

    fn options(&self) -> Vec<PluginOption> {
        vec![
            PluginOption::new(
                "RemainIndex",
                OptionKind::Bool,
                "Preserve the original tile ordering when decoding.",
                true,
            ),
            PluginOption::new(
                "Page",
                OptionKind::Enum,
                "Select which 2-bit page should be expanded when decoding.",
                self.page,
            )
            .with_choices((0..PAGE_COUNT).map(|page| page.to_string())),
        ]
    }

    fn apply_options(&mut self, options: &[PluginOption], log: &mut LogChannel) {
        for option in options {
            if option.name.eq_ignore_ascii_case("page") {
                self.apply_page(option, log);
            }
        }
    }
}
