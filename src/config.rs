//! Engine configuration.
//!
//! All settings are engine-scoped; nothing here is process-global. The record
//! derives `Deserialize` with `#[serde(default)]`, so any serde format can
//! supply a partial document and the rest falls back to the defaults.

use serde::{Deserialize, Serialize};

use crate::pool::DEFAULT_POOL_SIZE;

/// Default listen address: port 8000 on every interface.
pub const DEFAULT_ADDR: &str = ":8000";

/// Default request body cap: 4 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Runtime mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Panic messages and backtraces are included in 500 bodies.
    #[default]
    Dev,
    /// 500 bodies carry the reason phrase only.
    Prod,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,

    /// Struct-action instances allocated per pool slab.
    pub pool_size: usize,

    /// Address `Engine::run` binds when none is given. `":port"` binds all
    /// interfaces.
    pub addr: String,

    /// Largest request body the server collects, in bytes. Bigger bodies are
    /// answered with `413` before the engine sees them.
    pub max_body_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Dev,
            pool_size: DEFAULT_POOL_SIZE,
            addr: DEFAULT_ADDR.to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl Config {
    pub fn is_dev(&self) -> bool {
        self.mode == Mode::Dev
    }
}

/// Expands the `":port"` shorthand into a bindable `host:port`.
pub(crate) fn socket_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_owned(),
    }
}
