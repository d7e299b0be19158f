//! Purpose: Fixed status codes returned by every native entry point.
//! Exports: `PluginStatus`.
//! Role: Part of the versioned binary contract shared with the host header.
//! Invariants: Numeric values never change; new codes are appended only.

#[repr(u32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PluginStatus {
    Ok = 0,
    Fail = 1,
    OpenError = 2,
    ScriptError = 3,
    CallbackError = 4,
    FormatError = 5,
    RangeError = 6,
    Unknown = 7,
}

impl PluginStatus {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn is_ok(self) -> bool {
        self == PluginStatus::Ok
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(PluginStatus::Ok),
            1 => Some(PluginStatus::Fail),
            2 => Some(PluginStatus::OpenError),
            3 => Some(PluginStatus::ScriptError),
            4 => Some(PluginStatus::CallbackError),
            5 => Some(PluginStatus::FormatError),
            6 => Some(PluginStatus::RangeError),
            7 => Some(PluginStatus::Unknown),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PluginStatus::Ok => "ok",
            PluginStatus::Fail => "fail",
            PluginStatus::OpenError => "open-error",
            PluginStatus::ScriptError => "script-error",
            PluginStatus::CallbackError => "callback-error",
            PluginStatus::FormatError => "format-error",
            PluginStatus::RangeError => "range-error",
            PluginStatus::Unknown => "unknown",
        }
    }
}
