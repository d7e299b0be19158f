//! Purpose: C ABI bridge exposing the decoder capability table to native hosts.
//! Exports: `get_decoder`, the `#[repr(C)]` geometry structs and `tile_decoder_t`.
//! Role: The only module that touches raw host pointers; everything below it is safe Rust.
//! Invariants: Field order and widths of every `#[repr(C)]` struct are part of the contract.
//! Invariants: Nothing unwinds past an entry point; every outcome is a `PluginStatus`.
//! Invariants: Process-wide state is initialized once and never torn down.
//! Notes: Entry points are reachable only through the table returned by `get_decoder`.
#![allow(non_camel_case_types)]

use std::any::Any;
use std::ffi::{CStr, c_char, c_void};
use std::ops::{Deref, DerefMut};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::{self, NonNull};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::api::plugin::TilePlugin;
use crate::core::error::{Error, ErrorKind, to_status};
use crate::core::geometry::{Pixel, TileConfiguration, TileFormat, TilePosition};
use crate::core::log::last_non_empty;
use crate::core::status::PluginStatus;
use crate::decoders::DecoderKind;
use crate::registry::{SessionHandle, SessionTable};
use crate::session::Session;

pub type pixel_t = Pixel;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct tilepos_t {
    pub i: i32,
    pub x: i32,
    pub y: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct tilefmt_t {
    pub w: u32,
    pub h: u32,
    pub bpp: u8,
    pub nbytes: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct tilecfg_t {
    pub start: u32,
    pub size: u32,
    pub nrow: u16,
    pub fmt: tilefmt_t,
}

impl From<tilepos_t> for TilePosition {
    fn from(native: tilepos_t) -> Self {
        TilePosition::new(native.i, native.x, native.y)
    }
}

impl From<TilePosition> for tilepos_t {
    fn from(position: TilePosition) -> Self {
        tilepos_t {
            i: position.tile_index,
            x: position.x,
            y: position.y,
        }
    }
}

impl From<tilefmt_t> for TileFormat {
    fn from(native: tilefmt_t) -> Self {
        TileFormat::new(native.w, native.h, native.bpp, native.nbytes)
    }
}

impl From<TileFormat> for tilefmt_t {
    fn from(format: TileFormat) -> Self {
        tilefmt_t {
            w: format.width(),
            h: format.height(),
            bpp: format.bits_per_pixel(),
            nbytes: format.bytes_per_tile(),
        }
    }
}

impl From<tilecfg_t> for TileConfiguration {
    fn from(native: tilecfg_t) -> Self {
        TileConfiguration {
            start: native.start,
            size: native.size,
            rows: native.nrow,
            format: native.fmt.into(),
        }
    }
}

impl From<TileConfiguration> for tilecfg_t {
    fn from(configuration: TileConfiguration) -> Self {
        tilecfg_t {
            start: configuration.start,
            size: configuration.size,
            nrow: configuration.rows,
            fmt: configuration.format.into(),
        }
    }
}

pub type OpenFn = unsafe extern "C" fn(*const c_char, *mut *mut c_void) -> PluginStatus;
pub type CloseFn = unsafe extern "C" fn(*mut c_void) -> PluginStatus;
pub type DecodeOneFn = unsafe extern "C" fn(
    *mut c_void,
    *const u8,
    usize,
    *const tilepos_t,
    *const tilefmt_t,
    *mut pixel_t,
    u8,
) -> PluginStatus;
pub type DecodeAllFn = unsafe extern "C" fn(
    *mut c_void,
    *const u8,
    usize,
    *const tilefmt_t,
    *mut *mut pixel_t,
    *mut usize,
    u8,
) -> PluginStatus;
pub type PipelineFn =
    unsafe extern "C" fn(*mut c_void, *const u8, usize, *mut tilecfg_t) -> PluginStatus;
pub type SendUiFn = unsafe extern "C" fn(*mut c_void, *mut *const u8, *mut usize) -> PluginStatus;
pub type RecvUiFn = unsafe extern "C" fn(*mut c_void, *const u8, usize) -> PluginStatus;

/// Capability table read by the host. `msg` is rewritten after every call.
#[repr(C)]
#[derive(Debug)]
pub struct tile_decoder_t {
    pub version: u32,
    pub size: u32,
    pub context: *mut c_void,
    pub msg: *const u8,
    pub open: Option<OpenFn>,
    pub close: Option<CloseFn>,
    pub decodeone: Option<DecodeOneFn>,
    pub decodeall: Option<DecodeAllFn>,
    pub pre: Option<PipelineFn>,
    pub post: Option<PipelineFn>,
    pub sendui: Option<SendUiFn>,
    pub recvui: Option<RecvUiFn>,
}

/// Reads the diagnostic slot of `table`.
///
/// # Safety
/// `table` must come from `get_decoder`, and no entry point may be running concurrently.
pub unsafe fn message(table: *const tile_decoder_t) -> Option<String> {
    let msg = unsafe { (*table).msg };
    if msg.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(msg.cast()) }.to_string_lossy().into_owned())
}

#[unsafe(no_mangle)]
pub extern "C" fn get_decoder() -> *mut tile_decoder_t {
    runtime().table.0.as_ptr()
}

struct TablePtr(NonNull<tile_decoder_t>);

// The table is leaked at init and only its `msg` field is written, under `Runtime::message`.
unsafe impl Send for TablePtr {}
unsafe impl Sync for TablePtr {}

#[derive(Default)]
struct MessageSlot {
    text: Vec<u8>,
}

struct Runtime {
    table: TablePtr,
    default_configuration: Box<[u8]>,
    decoder_kind: DecoderKind,
    message: Mutex<MessageSlot>,
    sessions: Mutex<SessionTable<Arc<Mutex<Session>>>>,
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(Runtime::new)
}

impl Runtime {
    fn new() -> Self {
        let decoder_kind = DecoderKind::from_env();
        let template = decoder_kind.plugin();
        let default_configuration = nul_terminated(default_document(&template));
        let table = Box::new(tile_decoder_t {
            version: template.required_host_version(),
            size: size_of::<tile_decoder_t>() as u32,
            context: ptr::null_mut(),
            msg: ptr::null(),
            open: Some(decode_open),
            close: Some(decode_close),
            decodeone: Some(decode_one),
            decodeall: template
                .supports_decode_all()
                .then_some(decode_all as DecodeAllFn),
            pre: Some(decode_pre),
            post: Some(decode_post),
            sendui: Some(send_ui),
            recvui: Some(recv_ui),
        });
        tracing::debug!(decoder = decoder_kind.name(), "native decoder table initialized");
        Self {
            table: TablePtr(NonNull::from(Box::leak(table))),
            default_configuration,
            decoder_kind,
            message: Mutex::new(MessageSlot::default()),
            sessions: Mutex::new(SessionTable::new()),
        }
    }

    fn publish(&self, message: Option<String>) {
        let mut slot = lock(&self.message);
        let msg = match message {
            Some(text) => {
                slot.text.clear();
                slot.text.extend_from_slice(text.as_bytes());
                slot.text.push(0);
                slot.text.as_ptr()
            }
            None => ptr::null(),
        };
        unsafe { (*self.table.0.as_ptr()).msg = msg };
    }

    fn clear_message(&self) {
        self.publish(None);
    }

    fn publish_logs(&self, session: &mut Session) {
        self.publish(last_non_empty(session.drain_logs()));
    }

    /// Allocation-free handle resolution.
    fn find(&self, context: *mut c_void) -> Option<Arc<Mutex<Session>>> {
        let handle = SessionHandle::from_ptr(context)?;
        lock(&self.sessions).get(handle).cloned()
    }

    fn lookup(&self, context: *mut c_void) -> Result<Arc<Mutex<Session>>, Error> {
        self.find(context)
            .ok_or_else(|| Error::new(ErrorKind::Open).with_message("unknown or closed context"))
    }
}

/// Locked session that publishes its queued log lines on drop, unwinding included.
struct SessionScope<'a> {
    runtime: &'a Runtime,
    session: MutexGuard<'a, Session>,
}

impl Deref for SessionScope<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionScope<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for SessionScope<'_> {
    fn drop(&mut self) {
        self.runtime.publish_logs(&mut self.session);
    }
}

fn default_document(template: &TilePlugin) -> String {
    template.configuration_json().unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to encode default plugin configuration");
        "{}".to_string()
    })
}

fn nul_terminated(text: String) -> Box<[u8]> {
    let mut bytes = text.into_bytes();
    bytes.push(0);
    bytes.into_boxed_slice()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn guard(entry: &'static str, body: impl FnOnce() -> PluginStatus) -> PluginStatus {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(status) => status,
        Err(payload) => {
            tracing::error!(entry, panic = panic_detail(&*payload), "decoder panicked");
            runtime().clear_message();
            PluginStatus::Fail
        }
    }
}

fn reject(entry: &'static str, err: Error) -> PluginStatus {
    runtime().clear_message();
    tracing::debug!(entry, error = %err, "rejected native call");
    to_status(err.kind())
}

fn settle(entry: &'static str, result: Result<(), Error>) -> PluginStatus {
    match result {
        Ok(()) => PluginStatus::Ok,
        Err(err) => {
            tracing::debug!(entry, error = %err, "decoder call failed");
            to_status(err.kind())
        }
    }
}

fn with_session(
    entry: &'static str,
    context: *mut c_void,
    body: impl FnOnce(&mut Session) -> Result<(), Error>,
) -> PluginStatus {
    let runtime = runtime();
    let session = match runtime.lookup(context) {
        Ok(session) => session,
        Err(err) => return reject(entry, err),
    };
    let mut scope = SessionScope {
        runtime,
        session: lock(&session),
    };
    let result = body(&mut *scope);
    drop(scope);
    settle(entry, result)
}

fn null_out(name: &str) -> Error {
    Error::new(ErrorKind::Internal).with_message(format!("{name} out-pointer is null"))
}

/// # Safety
/// When `len > 0`, `data` must be null or valid for `len` reads for the duration of the call.
unsafe fn borrow_bytes<'a>(data: *const u8, len: usize) -> Result<&'a [u8], Error> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(Error::new(ErrorKind::Format).with_message("data is null"));
    }
    if len > isize::MAX as usize {
        return Err(Error::new(ErrorKind::Range).with_message(format!("data length {len} overflows")));
    }
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

/// # Safety
/// `format` must be null or point at a readable `tilefmt_t`.
unsafe fn read_format(format: *const tilefmt_t) -> Result<TileFormat, Error> {
    unsafe { format.as_ref() }
        .map(|native| TileFormat::from(*native))
        .ok_or_else(|| Error::new(ErrorKind::Format).with_message("format is null"))
}

unsafe extern "C" fn decode_open(name: *const c_char, context: *mut *mut c_void) -> PluginStatus {
    guard("open", || {
        if context.is_null() {
            return reject("open", null_out("context"));
        }
        let name = if name.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
        };
        let runtime = runtime();
        let mut session = Session::create(runtime.decoder_kind, &name);
        let opened = session.plugin_mut().open(&name);
        runtime.publish_logs(&mut session);
        if let Err(err) = opened {
            return settle("open", Err(err));
        }

        let inserted = lock(&runtime.sessions).insert(Arc::new(Mutex::new(session)));
        match inserted {
            Ok(handle) => {
                unsafe { context.write(handle.into_ptr()) };
                tracing::debug!(source = %name, "decoder session opened");
                PluginStatus::Ok
            }
            Err(rejected) => {
                let mut session = lock(&rejected);
                if let Err(err) = session.plugin_mut().close() {
                    tracing::debug!(error = %err, "close after full session table failed");
                }
                reject(
                    "open",
                    Error::new(ErrorKind::Internal).with_message("session table is full"),
                )
            }
        }
    })
}

unsafe extern "C" fn decode_close(context: *mut c_void) -> PluginStatus {
    guard("close", || {
        let runtime = runtime();
        let removed = SessionHandle::from_ptr(context)
            .and_then(|handle| lock(&runtime.sessions).remove(handle));
        let Some(session) = removed else {
            return reject(
                "close",
                Error::new(ErrorKind::Open).with_message("unknown or closed context"),
            );
        };
        let mut session = lock(&session);
        let result = session.plugin_mut().close();
        runtime.publish_logs(&mut session);
        settle("close", result)
    })
}

unsafe extern "C" fn decode_one(
    context: *mut c_void,
    data: *const u8,
    len: usize,
    position: *const tilepos_t,
    format: *const tilefmt_t,
    pixel: *mut pixel_t,
    keep_index: u8,
) -> PluginStatus {
    guard("decodeone", || {
        if pixel.is_null() {
            return reject("decodeone", null_out("pixel"));
        }
        with_session("decodeone", context, |session| {
            let data = unsafe { borrow_bytes(data, len) }?;
            let format = unsafe { read_format(format) }?;
            let position = unsafe { position.as_ref() }
                .map(|native| TilePosition::from(*native))
                .ok_or_else(|| Error::new(ErrorKind::Format).with_message("position is null"))?;
            let decoded = session
                .plugin_mut()
                .decode_one(data, format, position, keep_index != 0)?;
            unsafe { pixel.write(decoded) };
            Ok(())
        })
    })
}

unsafe extern "C" fn decode_all(
    context: *mut c_void,
    data: *const u8,
    len: usize,
    format: *const tilefmt_t,
    pixels: *mut *mut pixel_t,
    count: *mut usize,
    keep_index: u8,
) -> PluginStatus {
    guard("decodeall", || {
        if pixels.is_null() || count.is_null() {
            return reject("decodeall", null_out("pixel buffer"));
        }
        with_session("decodeall", context, |session| {
            let data = unsafe { borrow_bytes(data, len) }?;
            let format = unsafe { read_format(format) }?;
            let decoded = session.decode_all(data, format, keep_index != 0)?;
            let first = if decoded.is_empty() {
                ptr::null_mut()
            } else {
                decoded.as_ptr().cast_mut()
            };
            unsafe {
                pixels.write(first);
                count.write(decoded.len());
            }
            Ok(())
        })
    })
}

type Hook = fn(&mut TilePlugin, &[u8], &mut TileConfiguration) -> Result<(), Error>;

/// # Safety
/// Pointer arguments follow the `pre`/`post` contract of the capability table.
unsafe fn run_pipeline(
    entry: &'static str,
    context: *mut c_void,
    raw: *const u8,
    len: usize,
    configuration: *mut tilecfg_t,
    hook: Hook,
) -> PluginStatus {
    with_session(entry, context, |session| {
        let raw = unsafe { borrow_bytes(raw, len) }?;
        let native = unsafe { configuration.as_mut() }
            .ok_or_else(|| Error::new(ErrorKind::Format).with_message("configuration is null"))?;
        let mut current = TileConfiguration::from(*native);
        let result = hook(session.plugin_mut(), raw, &mut current);
        *native = tilecfg_t::from(current);
        result
    })
}

unsafe extern "C" fn decode_pre(
    context: *mut c_void,
    raw: *const u8,
    len: usize,
    configuration: *mut tilecfg_t,
) -> PluginStatus {
    guard("pre", || unsafe {
        run_pipeline("pre", context, raw, len, configuration, TilePlugin::preprocess)
    })
}

unsafe extern "C" fn decode_post(
    context: *mut c_void,
    raw: *const u8,
    len: usize,
    configuration: *mut tilecfg_t,
) -> PluginStatus {
    guard("post", || unsafe {
        run_pipeline("post", context, raw, len, configuration, TilePlugin::postprocess)
    })
}

unsafe extern "C" fn send_ui(
    context: *mut c_void,
    buffer: *mut *const u8,
    len: *mut usize,
) -> PluginStatus {
    guard("sendui", || {
        if buffer.is_null() || len.is_null() {
            return reject("sendui", null_out("configuration buffer"));
        }
        let runtime = runtime();
        let Some(session) = runtime.find(context) else {
            let text = &runtime.default_configuration;
            unsafe {
                buffer.write(text.as_ptr());
                len.write(text.len().saturating_sub(1));
            }
            runtime.clear_message();
            return PluginStatus::Ok;
        };

        let mut scope = SessionScope {
            runtime,
            session: lock(&session),
        };
        let text = scope
            .configuration_text()
            .map(|text| (text.as_ptr(), text.len().saturating_sub(1)));
        drop(scope);
        let result = text.map(|(first, text_len)| unsafe {
            buffer.write(first);
            len.write(text_len);
        });
        settle("sendui", result)
    })
}

unsafe extern "C" fn recv_ui(context: *mut c_void, buffer: *const u8, len: usize) -> PluginStatus {
    guard("recvui", || {
        with_session("recvui", context, |session| {
            if buffer.is_null() || len == 0 {
                return Ok(());
            }
            let bytes = unsafe { borrow_bytes(buffer, len) }?;
            session.accept_configuration(bytes);
            Ok(())
        })
    })
}
