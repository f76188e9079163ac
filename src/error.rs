//! Error taxonomy (§7). The connectivity parser is the one recoverable
//! path; every other core operation treats failure as unrecoverable since
//! it indicates a logic bug that would silently corrupt the forest.

use thiserror::Error;

/// Errors returned by [`crate::connectivity::Connectivity::from_reader`].
/// All other components abort via `assert!`/panic rather than return a
/// `Result` (§7).
#[derive(Debug, Error)]
pub enum ForestError {
    #[error("io error reading connectivity: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected end of input while expecting {0}")]
    UnexpectedEof(String),
    #[error("corrupt connectivity: {0}")]
    Corrupt(String),
}

/// Installs a panic hook that logs the panic via `log::error!`, flushes
/// stdout/stderr, and aborts the process. This is the Rust expression of
/// §7's "on abort, flush both streams ... call the runtime abort": Rust has
/// no recoverable-vs-fatal distinction at the panic boundary the way the
/// source system's custom abort handler does, so a hook plus
/// `process::abort` is the closest match, and is installed once per
/// process by `Forest::install_abort_hook`.
pub fn install_abort_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("fatal: {info}");
        default_hook(info);
        use std::io::Write;
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        std::process::abort();
    }));
}
