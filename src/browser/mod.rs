//! Headless Chromium control over the DevTools protocol.
//!
//! No driver binary and no vendored browser: the actor spawns whatever
//! Chromium it finds on PATH with `--remote-debugging-port=0`, reads the
//! WebSocket endpoint from the profile's `DevToolsActivePort` file, and
//! speaks the DevTools protocol directly over tokio-tungstenite.
//!
//! Layers:
//! - [`launcher`]: find and spawn the browser binary, discover the endpoint.
//! - [`cdp`]: the wire client (id-matched calls, broadcast events).
//! - [`page`]: a typed facade (navigate, evaluate, click, fill, download).

pub mod cdp;
pub mod launcher;
pub mod page;

pub use cdp::{CdpClient, CdpError, CdpEvent};
pub use launcher::{detect_browser, BrowserProcess, LaunchOptions};
pub use page::{Browser, Cookie, Page, Selector};
