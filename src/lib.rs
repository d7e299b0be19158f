//! Purpose: Native tile-decoder plugin library and the safe Rust API behind it.
//! Exports: `abi` (C capability table), `api` (decoder contract + plugin facade),
//!          `core` (geometry, status, errors, configuration codec), `decoders`.
//! Role: Loaded by native hosts through `get_decoder`; also linked by the `tileplug` CLI.
//! Invariants: Only `abi` handles raw pointers; every other module is safe Rust.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod abi;
pub mod api;
pub mod core;
pub mod decoders;
mod json;
pub mod notice;
pub mod registry;
pub mod session;
