// Core value types, codecs, and error modeling; no process-wide state lives here.
pub mod config;
pub mod error;
pub mod geometry;
pub mod log;
pub mod status;
