//! Foreign-function transport for callers in another runtime.
//!
//! In-process callers should use `PipService::classify` and keep the owned
//! result. This module packs labels into one delimiter-separated buffer that
//! the caller must hand back through `regionjoin_release`.

mod exports;
mod guard;
mod pack;

pub use exports::{regionjoin_classify, regionjoin_last_error, regionjoin_release, RawPoint};
pub use guard::PackedLabels;
pub use pack::{pack_labels, unpack_labels, TransportError, LABEL_DELIMITER};
