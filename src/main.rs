//! Purpose: `tileplug` CLI entry point; a native-style host for the decoder plugin.
//! Role: Binary crate root; parses args, drives the capability table, emits JSON on stdout.
//! Invariants: Every plugin call goes through the table returned by `get_decoder`.
//! Invariants: Plugin diagnostics are emitted as JSON notices on stderr, never on stdout.
//! Invariants: Process exit code is the numeric plugin status of the failing call.
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use memmap2::Mmap;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod host;

use host::DecoderHost;
use tileplug::api::{Error, ErrorKind, Pixel, TileConfiguration, TileFormat, TilePosition, to_status};
use tileplug::notice::{Notice, notice_json};

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_status(err.kind()).code() as i32
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(0);
            }
            _ => err.exit(),
        },
    };

    let mut host = DecoderHost::load()?;
    match cli.command {
        Command::Config => {
            let result = host.default_configuration();
            emit_messages(&mut host, "config", "");
            println!("{}", result?);
        }
        Command::Decode(args) => {
            let summary = decode(&mut host, &args);
            emit_messages(&mut host, "decode", &source_label(&args.file));
            println!("{}", summary?);
        }
        Command::Pixel(args) => {
            let pixel = pixel(&mut host, &args);
            emit_messages(&mut host, "pixel", &source_label(&args.file));
            println!("{}", pixel?);
        }
    }
    Ok(0)
}

#[derive(Parser)]
#[command(
    name = "tileplug",
    version,
    about = "Drive the tile decoder plugin the way a native tile viewer does",
    long_about = None,
    after_help = r#"EXAMPLES
  $ tileplug config
  $ tileplug decode sheet.bin --width 8 --height 8 --bpp 2 --output sheet.rgba
  $ tileplug decode sheet.bin --width 8 --height 8 --bpp 2 --options '{"name":"sheet","plugincfg":[{"name":"Page","value":"1"}]}'
  $ tileplug pixel sheet.bin --tile 3 --x 1 --y 2 --width 8 --height 8 --bpp 2

ENVIRONMENT
  TILEPLUG_DECODER  decoder strategy: paged (default) | passthrough
  RUST_LOG          internal diagnostics filter (default: warn)"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Print the default plugin configuration document")]
    Config,
    #[command(about = "Decode a whole tile sheet: open, recv_ui, pre, decode, post, close")]
    Decode(DecodeArgs),
    #[command(about = "Decode a single pixel with decode_one")]
    Pixel(PixelArgs),
}

#[derive(Args)]
struct FormatArgs {
    #[arg(long, help = "Tile width in pixels")]
    width: u32,
    #[arg(long, help = "Tile height in pixels")]
    height: u32,
    #[arg(long, help = "Bits per pixel")]
    bpp: u8,
    #[arg(
        long,
        default_value_t = 0,
        help = "Bytes per tile (0 derives ceil(width*height*bpp/8))"
    )]
    bytes_per_tile: u32,
}

impl FormatArgs {
    fn format(&self) -> TileFormat {
        TileFormat::new(self.width, self.height, self.bpp, self.bytes_per_tile)
    }
}

#[derive(Args)]
struct DecodeArgs {
    #[arg(help = "Tile sheet file", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    #[command(flatten)]
    format: FormatArgs,
    #[arg(long, help = "Session name passed to open (default: file name)")]
    name: Option<String>,
    #[arg(long, help = "Configuration document sent with recv_ui before decoding")]
    options: Option<String>,
    #[arg(long, default_value_t = 1, help = "Tiles per row reported to the pre/post hooks")]
    rows: u16,
    #[arg(long, help = "Ask the decoder to keep the original tile ordering")]
    keep_index: bool,
    #[arg(long, help = "Write decoded RGBA bytes to this file", value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct PixelArgs {
    #[arg(help = "Tile sheet file", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    #[command(flatten)]
    format: FormatArgs,
    #[arg(long, default_value_t = 0, help = "Tile index")]
    tile: i32,
    #[arg(long, default_value_t = 0)]
    x: i32,
    #[arg(long, default_value_t = 0)]
    y: i32,
    #[arg(long, help = "Ask the decoder to keep the original tile ordering")]
    keep_index: bool,
}

enum Input {
    Mapped(Mmap),
    Empty,
}

impl Input {
    fn bytes(&self) -> &[u8] {
        match self {
            Input::Mapped(map) => map,
            Input::Empty => &[],
        }
    }
}

fn map_input(path: &Path) -> Result<Input, Error> {
    let open_error = |err: io::Error| {
        Error::new(ErrorKind::Open)
            .with_message(format!("failed to read {}", path.display()))
            .with_source(err)
    };
    let file = File::open(path).map_err(open_error)?;
    let len = file.metadata().map_err(open_error)?.len();
    if len == 0 {
        return Ok(Input::Empty);
    }
    let map = unsafe { Mmap::map(&file) }.map_err(open_error)?;
    Ok(Input::Mapped(map))
}

fn source_label(path: &Path) -> String {
    path.display().to_string()
}

fn default_session_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn decode(host: &mut DecoderHost, args: &DecodeArgs) -> Result<Value, Error> {
    let input = map_input(&args.file)?;
    let data = input.bytes();
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| default_session_name(&args.file));

    host.open(&name)?;
    if let Some(document) = &args.options {
        host.apply_configuration(document)?;
    }
    let configuration = TileConfiguration {
        start: 0,
        size: u32::try_from(data.len()).unwrap_or(u32::MAX),
        rows: args.rows,
        format: args.format.format(),
    };
    let configuration = host.preprocess(data, configuration)?;
    let pixels = host.decode_sheet(data, configuration.format, args.keep_index)?;
    let configuration = host.postprocess(data, configuration)?;
    let document = host.configuration()?;
    host.close()?;

    if let Some(path) = &args.output {
        write_rgba(path, &pixels)?;
    }

    let format = configuration.format;
    let tiles = match format.bytes_per_tile() {
        0 => 0,
        bytes => data.len() / bytes as usize,
    };
    let plugin: Value = serde_json::from_str(&document).unwrap_or(Value::Null);
    Ok(json!({
        "source": source_label(&args.file),
        "bytes": data.len(),
        "tiles": tiles,
        "pixels": pixels.len(),
        "decode_all": host.supports_decode_all(),
        "host_version": host.version(),
        "format": format_json(&format),
        "plugin": {
            "name": plugin.get("name").cloned().unwrap_or(Value::Null),
            "options": plugin.get("plugincfg").cloned().unwrap_or(Value::Null),
        },
        "output": args.output.as_ref().map(|path| path.display().to_string()),
    }))
}

fn pixel(host: &mut DecoderHost, args: &PixelArgs) -> Result<Value, Error> {
    let input = map_input(&args.file)?;
    let format = args.format.format();
    let position = TilePosition::new(args.tile, args.x, args.y);

    host.open(&default_session_name(&args.file))?;
    let pixel = host.decode_one(input.bytes(), format, position, args.keep_index)?;
    host.close()?;

    Ok(json!({
        "tile": position.tile_index,
        "x": position.x,
        "y": position.y,
        "format": format_json(&format),
        "pixel": pixel_json(pixel),
    }))
}

fn format_json(format: &TileFormat) -> Value {
    json!({
        "width": format.width(),
        "height": format.height(),
        "bpp": format.bits_per_pixel(),
        "bytes_per_tile": format.bytes_per_tile(),
    })
}

fn pixel_json(pixel: Pixel) -> Value {
    json!({
        "r": pixel.r,
        "g": pixel.g,
        "b": pixel.b,
        "a": pixel.a,
        "hex": format!("#{:02x}{:02x}{:02x}{:02x}", pixel.r, pixel.g, pixel.b, pixel.a),
    })
}

fn write_rgba(path: &Path, pixels: &[Pixel]) -> Result<(), Error> {
    let bytes: Vec<u8> = pixels
        .iter()
        .flat_map(|pixel| [pixel.r, pixel.g, pixel.b, pixel.a])
        .collect();
    std::fs::write(path, bytes).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message(format!("failed to write {}", path.display()))
            .with_source(err)
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_messages(host: &mut DecoderHost, cmd: &str, source: &str) {
    for message in host.take_messages() {
        let notice = Notice::plugin_log(cmd, source, message.entry, message.text);
        let json = serde_json::to_string(&notice_json(&notice)).unwrap_or_else(|_| {
            "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
        });
        eprintln!("{json}");
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    use std::error::Error as _;

    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let status = to_status(err.kind());
    let mut inner = Map::new();
    inner.insert("status".to_string(), json!(status.label()));
    inner.insert("code".to_string(), json!(status.code()));
    inner.insert(
        "message".to_string(),
        json!(err.message().unwrap_or(status.label())),
    );
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn emit_error(err: &Error) {
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"status\":\"fail\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}
