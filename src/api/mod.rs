//! Purpose: Define the public Rust API for tile decoder strategies and the plugin facade.
//! Exports: Decoder contract, facade, and the core types they exchange.
//! Role: Safe surface shared by the native bridge, the CLI and custom strategies.
//! Invariants: Nothing in this module dereferences host pointers.

pub mod decoder;
pub mod plugin;

pub use crate::core::config::{OptionKind, PluginConfiguration, PluginOption};
pub use crate::core::error::{Error, ErrorKind, kind_for_status, to_status};
pub use crate::core::geometry::{Pixel, TileConfiguration, TileFormat, TilePosition};
pub use crate::core::status::PluginStatus;
pub use decoder::{ConfigurableDecoder, DecoderInfo, DecoderStrategy, TileDecoder};
pub use plugin::TilePlugin;
