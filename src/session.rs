//! Purpose: Per-handle session state owned by the native boundary.
//! Exports: `Session`, `PixelScratch`.
//! Role: Couples one plugin facade with the buffers the host borrows between calls.
//! Invariants: The pixel buffer only grows; pointers handed out stay valid until the next
//!             decode_all or close on the same session.
//! Invariants: Configuration text is rebuilt lazily; a stale buffer is only replaced by the
//!             next send_ui, so the last reported pointer survives a recv_ui.
use crate::api::plugin::TilePlugin;
use crate::core::config::{OptionSnapshot, parse_update};
use crate::core::error::{Error, ErrorKind};
use crate::core::geometry::{Pixel, TileFormat, expected_pixel_count};
use crate::decoders::DecoderKind;

#[derive(Debug, Default)]
pub struct PixelScratch {
    buffer: Vec<Pixel>,
    reallocations: usize,
}

impl PixelScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed slice of exactly `count` pixels; reallocates only past the current capacity.
    pub fn prepare(&mut self, count: usize) -> Result<&mut [Pixel], Error> {
        self.buffer.clear();
        if count > self.buffer.capacity() {
            let mut grown = Vec::new();
            grown.try_reserve_exact(count).map_err(|err| {
                Error::new(ErrorKind::Range)
                    .with_message(format!("cannot allocate {count} pixels"))
                    .with_source(err)
            })?;
            self.buffer = grown;
            self.reallocations += 1;
        }
        self.buffer.resize(count, Pixel::default());
        Ok(&mut self.buffer)
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn reallocations(&self) -> usize {
        self.reallocations
    }
}

#[derive(Debug)]
pub struct Session {
    plugin: TilePlugin,
    pixels: PixelScratch,
    configuration_text: Vec<u8>,
    configuration_stale: bool,
    snapshot: OptionSnapshot,
    last_name: Option<String>,
}

impl Session {
    pub fn create(kind: DecoderKind, name: &str) -> Self {
        let mut plugin = kind.plugin();
        let last_name = if name.trim().is_empty() {
            None
        } else {
            plugin.set_name(name).ok().map(|()| name.to_string())
        };
        Self {
            plugin,
            pixels: PixelScratch::new(),
            configuration_text: Vec::new(),
            configuration_stale: true,
            snapshot: OptionSnapshot::new(),
            last_name,
        }
    }

    pub fn plugin(&self) -> &TilePlugin {
        &self.plugin
    }

    pub fn plugin_mut(&mut self) -> &mut TilePlugin {
        &mut self.plugin
    }

    pub fn pixels(&self) -> &PixelScratch {
        &self.pixels
    }

    pub fn drain_logs(&mut self) -> Vec<String> {
        self.plugin.drain_logs()
    }

    /// Decodes `data` into the session's scratch buffer and returns the filled pixels.
    pub fn decode_all(
        &mut self,
        data: &[u8],
        format: TileFormat,
        keep_index: bool,
    ) -> Result<&[Pixel], Error> {
        let count = expected_pixel_count(data.len(), &format)?;
        let out = self.pixels.prepare(count)?;
        self.plugin.decode_all(data, format, keep_index, out)?;
        Ok(out)
    }

    /// UTF-8 configuration document followed by one NUL byte.
    pub fn configuration_text(&mut self) -> Result<&[u8], Error> {
        if self.configuration_stale {
            let json = self.plugin.configuration_json()?;
            self.configuration_text.clear();
            self.configuration_text.extend_from_slice(json.as_bytes());
            self.configuration_text.push(0);
            self.configuration_stale = false;
        }
        Ok(&self.configuration_text)
    }

    pub fn invalidate_configuration(&mut self) {
        self.configuration_stale = true;
    }

    /// Applies a host document. Malformed input is logged and otherwise ignored.
    pub fn accept_configuration(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let update = match parse_update(bytes) {
            Ok(Some(update)) => update,
            Ok(None) => return,
            Err(err) => {
                let detail = err.message().unwrap_or("invalid document").to_string();
                tracing::debug!(error = %err, "rejected plugin configuration");
                self.plugin
                    .log(format!("Ignoring malformed plugin configuration: {detail}"));
                return;
            }
        };

        if let Some(name) = update.name
            && !name.trim().is_empty()
            && self.last_name.as_deref() != Some(name.as_str())
            && self.plugin.set_name(&name).is_ok()
        {
            self.last_name = Some(name);
        }

        match update.options {
            Some(options) if !options.is_empty() => {
                for line in self.snapshot.apply(&options) {
                    self.plugin.log(line);
                }
                self.plugin.apply_options(&options);
            }
            _ => {
                for line in self.snapshot.clear() {
                    self.plugin.log(line);
                }
            }
        }
        self.invalidate_configuration();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn opened(name: &str) -> Session {
        let mut session = Session::create(DecoderKind::Paged, name);
        session.plugin_mut().open(name).unwrap();
        session.drain_logs();
        session
    }

    fn document(session: &mut Session) -> Value {
        let text = session.configuration_text().unwrap();
        assert_eq!(text.last(), Some(&0));
        serde_json::from_slice(&text[..text.len() - 1]).unwrap()
    }

    #[test]
    fn create_applies_non_blank_name() {
        let mut session = Session::create(DecoderKind::Paged, "Sheet A");
        assert_eq!(session.plugin().name(), "Sheet A");
        assert_eq!(
            session.drain_logs(),
            vec!["Plugin name set to 'Sheet A'.".to_string()]
        );

        let mut unnamed = Session::create(DecoderKind::Paged, "  ");
        assert_eq!(unnamed.plugin().name(), "Paged 2-Bit Decoder");
        assert!(unnamed.drain_logs().is_empty());
    }

    #[test]
    fn scratch_grows_only_past_capacity() {
        let mut scratch = PixelScratch::new();
        assert_eq!(scratch.prepare(64).unwrap().len(), 64);
        assert_eq!(scratch.reallocations(), 1);
        let capacity = scratch.capacity();

        assert_eq!(scratch.prepare(16).unwrap().len(), 16);
        assert_eq!(scratch.prepare(64).unwrap().len(), 64);
        assert_eq!(scratch.reallocations(), 1);
        assert_eq!(scratch.capacity(), capacity);

        assert_eq!(scratch.prepare(65).unwrap().len(), 65);
        assert_eq!(scratch.reallocations(), 2);
    }

    #[test]
    fn scratch_is_zeroed_between_calls() {
        let mut scratch = PixelScratch::new();
        scratch.prepare(4).unwrap().fill(Pixel::new(1, 2, 3, 4));
        assert!(scratch.prepare(4).unwrap().iter().all(|p| *p == Pixel::default()));
    }

    #[test]
    fn decode_all_sizes_output_from_bpp() {
        let mut session = opened("sheet");
        let pixels = session
            .decode_all(&[0xFF, 0x00], TileFormat::new(4, 2, 2, 0), false)
            .unwrap();
        assert_eq!(pixels.len(), 8);
        assert_eq!(pixels[0].a, 0xFF);
        assert_eq!(pixels[1].a, 0x00);
        assert!(session.pixels().capacity() >= 8);
        assert_eq!(session.pixels().reallocations(), 1);

        let err = session
            .decode_all(&[0xFF], TileFormat::new(4, 2, 0, 2), false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn name_updates_log_once() {
        let mut session = opened("sheet");
        session.accept_configuration(br#"{"name":"sheet"}"#);
        assert!(session.drain_logs().is_empty());

        session.accept_configuration(br#"{"name":"Renamed"}"#);
        session.accept_configuration(br#"{"name":"Renamed"}"#);
        assert_eq!(
            session.drain_logs(),
            vec!["Plugin name set to 'Renamed'.".to_string()]
        );
        assert_eq!(document(&mut session)["name"], "Renamed");
    }

    #[test]
    fn option_updates_are_diffed_and_applied() {
        let mut session = opened("sheet");
        session.accept_configuration(
            br#"{"name":"sheet","plugincfg":[{"name":"Page","value":"2"},{"name":"RemainIndex","value":true}]}"#,
        );
        assert_eq!(
            session.drain_logs(),
            vec![
                "Plugin option 'Page' set to '2'.".to_string(),
                "Plugin option 'RemainIndex' set to 'true'.".to_string(),
                "Active decode page switched to '2'.".to_string(),
            ]
        );
        assert_eq!(document(&mut session)["plugincfg"][1]["value"], 2);

        session.accept_configuration(br#"{"name":"sheet","plugincfg":[{"name":"Page","value":"2"}]}"#);
        assert_eq!(
            session.drain_logs(),
            vec!["Plugin option 'RemainIndex' cleared.".to_string()]
        );

        session.accept_configuration(br#"{"name":"sheet"}"#);
        assert_eq!(
            session.drain_logs(),
            vec!["Plugin option 'Page' cleared.".to_string()]
        );
    }

    #[test]
    fn malformed_documents_are_logged_and_ignored() {
        let mut session = opened("sheet");
        session.accept_configuration(br#"{"name":"#);
        let logs = session.drain_logs();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].starts_with("Ignoring malformed plugin configuration: "));
        assert_eq!(session.plugin().name(), "sheet");

        session.accept_configuration(b"");
        session.accept_configuration(b"null");
        session.accept_configuration(b"{}");
        assert!(session.drain_logs().is_empty());
    }

    #[test]
    fn stale_text_survives_until_next_request() {
        let mut session = opened("sheet");
        let before = session.configuration_text().unwrap().to_vec();
        session.accept_configuration(br#"{"name":"Other"}"#);
        assert_eq!(session.configuration_text, before);
        let after = document(&mut session);
        assert_eq!(after["name"], "Other");
    }
}
