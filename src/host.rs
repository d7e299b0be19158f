//! Purpose: Drive the plugin exactly as a native host does, through `get_decoder`.
//! Exports: `DecoderHost`, `PluginMessage`.
//! Role: Safe wrapper the CLI uses; owns at most one open context at a time.
//! Invariants: The diagnostic slot is read after every call, before the next one.
//! Invariants: Borrowed plugin buffers are copied out before the next call.
use std::ffi::{CString, c_void};
use std::ptr::{self, NonNull};

use tileplug::abi::{self, get_decoder, pixel_t, tile_decoder_t, tilecfg_t, tilefmt_t, tilepos_t};
use tileplug::api::{
    Error, ErrorKind, Pixel, PluginStatus, TileConfiguration, TileFormat, TilePosition,
    kind_for_status,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PluginMessage {
    pub(crate) entry: &'static str,
    pub(crate) text: String,
}

pub(crate) struct DecoderHost {
    table: NonNull<tile_decoder_t>,
    context: *mut c_void,
    messages: Vec<PluginMessage>,
}

fn missing(entry: &str) -> Error {
    Error::new(ErrorKind::Internal).with_message(format!("decoder table has no {entry} entry"))
}

fn status_result(entry: &str, status: PluginStatus) -> Result<(), Error> {
    match kind_for_status(status) {
        None => Ok(()),
        Some(kind) => Err(Error::new(kind).with_message(format!("{entry} returned {}", status.label()))),
    }
}

impl DecoderHost {
    pub(crate) fn load() -> Result<Self, Error> {
        let table = NonNull::new(get_decoder())
            .ok_or_else(|| Error::new(ErrorKind::Internal).with_message("get_decoder returned null"))?;
        Ok(Self {
            table,
            context: ptr::null_mut(),
            messages: Vec::new(),
        })
    }

    fn raw(&self) -> *mut tile_decoder_t {
        self.table.as_ptr()
    }

    pub(crate) fn version(&self) -> u32 {
        unsafe { (*self.raw()).version }
    }

    pub(crate) fn supports_decode_all(&self) -> bool {
        unsafe { (*self.raw()).decodeall }.is_some()
    }

    pub(crate) fn take_messages(&mut self) -> Vec<PluginMessage> {
        std::mem::take(&mut self.messages)
    }

    fn finish(&mut self, entry: &'static str, status: PluginStatus) -> Result<(), Error> {
        if let Some(text) = unsafe { abi::message(self.raw()) } {
            self.messages.push(PluginMessage { entry, text });
        }
        status_result(entry, status)
    }

    fn send_ui(&mut self, context: *mut c_void) -> Result<String, Error> {
        let send = unsafe { (*self.raw()).sendui }.ok_or_else(|| missing("sendui"))?;
        let mut buffer: *const u8 = ptr::null();
        let mut len = 0usize;
        let status = unsafe { send(context, &mut buffer, &mut len) };
        self.finish("sendui", status)?;
        if buffer.is_null() {
            return Ok(String::new());
        }
        let bytes = unsafe { std::slice::from_raw_parts(buffer, len) };
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Process-wide default document; no session is required.
    pub(crate) fn default_configuration(&mut self) -> Result<String, Error> {
        self.send_ui(ptr::null_mut())
    }

    pub(crate) fn open(&mut self, name: &str) -> Result<(), Error> {
        if !self.context.is_null() {
            return Err(Error::new(ErrorKind::Internal).with_message("a session is already open"));
        }
        let name = CString::new(name).map_err(|err| {
            Error::new(ErrorKind::Format)
                .with_message("plugin name contains a NUL byte")
                .with_source(err)
        })?;
        let open = unsafe { (*self.raw()).open }.ok_or_else(|| missing("open"))?;
        let mut context: *mut c_void = ptr::null_mut();
        let status = unsafe { open(name.as_ptr(), &mut context) };
        self.finish("open", status)?;
        self.context = context;
        Ok(())
    }

    pub(crate) fn configuration(&mut self) -> Result<String, Error> {
        self.send_ui(self.context)
    }

    pub(crate) fn apply_configuration(&mut self, document: &str) -> Result<(), Error> {
        let recv = unsafe { (*self.raw()).recvui }.ok_or_else(|| missing("recvui"))?;
        let status = unsafe { recv(self.context, document.as_ptr(), document.len()) };
        self.finish("recvui", status)
    }

    fn pipeline(
        &mut self,
        entry: &'static str,
        raw: &[u8],
        configuration: TileConfiguration,
    ) -> Result<TileConfiguration, Error> {
        let hook = match entry {
            "pre" => unsafe { (*self.raw()).pre },
            _ => unsafe { (*self.raw()).post },
        }
        .ok_or_else(|| missing(entry))?;
        let mut native = tilecfg_t::from(configuration);
        let status = unsafe { hook(self.context, raw.as_ptr(), raw.len(), &mut native) };
        self.finish(entry, status)?;
        Ok(native.into())
    }

    pub(crate) fn preprocess(
        &mut self,
        raw: &[u8],
        configuration: TileConfiguration,
    ) -> Result<TileConfiguration, Error> {
        self.pipeline("pre", raw, configuration)
    }

    pub(crate) fn postprocess(
        &mut self,
        raw: &[u8],
        configuration: TileConfiguration,
    ) -> Result<TileConfiguration, Error> {
        self.pipeline("post", raw, configuration)
    }

    pub(crate) fn decode_one(
        &mut self,
        data: &[u8],
        format: TileFormat,
        position: TilePosition,
        keep_index: bool,
    ) -> Result<Pixel, Error> {
        let decode = unsafe { (*self.raw()).decodeone }.ok_or_else(|| missing("decodeone"))?;
        let native_format = tilefmt_t::from(format);
        let native_position = tilepos_t::from(position);
        let mut pixel = pixel_t::default();
        let status = unsafe {
            decode(
                self.context,
                data.as_ptr(),
                data.len(),
                &native_position,
                &native_format,
                &mut pixel,
                u8::from(keep_index),
            )
        };
        self.finish("decodeone", status)?;
        Ok(pixel)
    }

    /// Whole-buffer decode; falls back to per-pixel calls when `decodeall` is absent.
    pub(crate) fn decode_sheet(
        &mut self,
        data: &[u8],
        format: TileFormat,
        keep_index: bool,
    ) -> Result<Vec<Pixel>, Error> {
        let Some(decode) = (unsafe { (*self.raw()).decodeall }) else {
            return self.decode_per_pixel(data, format, keep_index);
        };
        let native_format = tilefmt_t::from(format);
        let mut pixels: *mut pixel_t = ptr::null_mut();
        let mut count = 0usize;
        let status = unsafe {
            decode(
                self.context,
                data.as_ptr(),
                data.len(),
                &native_format,
                &mut pixels,
                &mut count,
                u8::from(keep_index),
            )
        };
        self.finish("decodeall", status)?;
        if pixels.is_null() || count == 0 {
            return Ok(Vec::new());
        }
        Ok(unsafe { std::slice::from_raw_parts(pixels, count) }.to_vec())
    }

    fn decode_per_pixel(
        &mut self,
        data: &[u8],
        format: TileFormat,
        keep_index: bool,
    ) -> Result<Vec<Pixel>, Error> {
        let tile_bytes = usize::try_from(format.bytes_per_tile()).unwrap_or(usize::MAX);
        if tile_bytes == 0 {
            return Ok(Vec::new());
        }
        let tiles = data.len() / tile_bytes;
        let per_tile = u64::from(format.width()) * u64::from(format.height());
        let capacity = usize::try_from(per_tile.saturating_mul(tiles as u64)).unwrap_or(0);
        let mut out = Vec::with_capacity(capacity);
        for tile in 0..tiles {
            let tile_index = i32::try_from(tile)
                .map_err(|_| Error::new(ErrorKind::Range).with_message("tile index overflows"))?;
            for y in 0..format.height() {
                for x in 0..format.width() {
                    let position = TilePosition::new(
                        tile_index,
                        i32::try_from(x).unwrap_or(i32::MAX),
                        i32::try_from(y).unwrap_or(i32::MAX),
                    );
                    out.push(self.decode_one(data, format, position, keep_index)?);
                }
            }
        }
        Ok(out)
    }

    pub(crate) fn close(&mut self) -> Result<(), Error> {
        let context = std::mem::replace(&mut self.context, ptr::null_mut());
        if context.is_null() {
            return Ok(());
        }
        let close = unsafe { (*self.raw()).close }.ok_or_else(|| missing("close"))?;
        let status = unsafe { close(context) };
        self.finish("close", status)
    }
}

impl Drop for DecoderHost {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::debug!(error = %err, "close during drop failed");
        }
    }
}
