//! Purpose: Built-in decoder strategies and process-level decoder selection.
//! Exports: `DecoderKind`, `DECODER_ENV`, `PagedDecoder`, `PassthroughDecoder`.
//! Role: Supplies the strategy behind the default configuration document and every session.
//! Invariants: Selection is read once per process; unknown names fall back to the default.

mod paged;
mod passthrough;

pub use paged::PagedDecoder;
pub use passthrough::PassthroughDecoder;

use crate::api::decoder::DecoderStrategy;
use crate::api::plugin::TilePlugin;

/// Environment variable naming the decoder used by the native entry points.
pub const DECODER_ENV: &str = "TILEPLUG_DECODER";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DecoderKind {
    #[default]
    Paged,
    Passthrough,
}

impl DecoderKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "paged" => Some(DecoderKind::Paged),
            "passthrough" => Some(DecoderKind::Passthrough),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DecoderKind::Paged => "paged",
            DecoderKind::Passthrough => "passthrough",
        }
    }

    pub fn from_env() -> Self {
        let Some(raw) = std::env::var_os(DECODER_ENV) else {
            return DecoderKind::default();
        };
        let raw = raw.to_string_lossy();
        if raw.trim().is_empty() {
            return DecoderKind::default();
        }
        DecoderKind::from_name(&raw).unwrap_or_else(|| {
            tracing::warn!(
                value = %raw,
                fallback = DecoderKind::default().name(),
                "unknown {DECODER_ENV} value"
            );
            DecoderKind::default()
        })
    }

    pub fn strategy(self) -> DecoderStrategy {
        match self {
            DecoderKind::Paged => DecoderStrategy::configurable(PagedDecoder::new()),
            DecoderKind::Passthrough => DecoderStrategy::configurable(PassthroughDecoder::new()),
        }
    }

    pub fn plugin(self) -> TilePlugin {
        TilePlugin::new(self.strategy())
    }
}

#[cfg(test)]
mod tests {
    use super::DecoderKind;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(DecoderKind::from_name("paged"), Some(DecoderKind::Paged));
        assert_eq!(
            DecoderKind::from_name(" Passthrough "),
            Some(DecoderKind::Passthrough)
        );
        assert_eq!(DecoderKind::from_name("bitplane"), None);
        for kind in [DecoderKind::Paged, DecoderKind::Passthrough] {
            assert_eq!(DecoderKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn plugins_carry_their_decoder_metadata() {
        assert_eq!(DecoderKind::Paged.plugin().name(), "Paged 2-Bit Decoder");
        assert_eq!(
            DecoderKind::Passthrough.plugin().name(),
            "Passthrough RGBA Decoder"
        );
    }
}
