//! System-message codec
//!
//! Non-chat messages carry a `*`-delimited payload in `messageContent`. This
//! module is the only place that payload is built or taken apart.

mod system_event;

pub use system_event::{render_text, Narration, SystemEvent, SystemEventKind, FALLBACK_TEXT};
