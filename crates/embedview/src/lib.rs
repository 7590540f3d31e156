//! Embed a web view in an existing native window.
//!
//! On Windows the view is Microsoft Edge WebView2. The crate creates the
//! browser environment and controller for a window, applies settings, keeps
//! the view positioned, and installs a navigation guard that cancels any
//! navigation whose URI does not start with `https`.
//!
//! ## Features
//!
//! - `winit` (default): `EmbedApp`, a winit window hosting the view
//!
//! ## Example
//!
//! ```rust,ignore
//! use embedview::{WebView2Platform, WebViewSettings, WebviewHandle, WebviewRect};
//!
//! fn embed(window: &winit::window::Window) -> embedview::Result<()> {
//!     let settings = WebViewSettings::new().with_url("https://example.com");
//!     let webview = WebviewHandle::new(WebView2Platform::new()?, settings);
//!     webview.initialize(window, WebviewRect::new(0, 0, 1280, 720))?;
//!     webview.navigate("https://www.rust-lang.org")?;
//!     Ok(())
//! }
//! ```
//!
//! ## System Requirements
//!
//! The WebView2 runtime ships with Windows 11 and current Windows 10. Other
//! hosts can only use `HeadlessPlatform`, which records calls without
//! rendering anything.

pub mod error;
pub mod guard;
pub mod handle;
pub mod headless;
pub mod ipc;
pub mod pipeline;
pub mod platform;
pub mod rect;
pub mod settings;

#[cfg(windows)]
pub mod webview2;
#[cfg(feature = "winit")]
pub mod window;

pub use error::{Error, Result};
pub use guard::{AllowAll, GuardKind, HttpsPrefixGuard, NavigationDecision, NavigationPolicy};
pub use handle::{SurfaceStatus, WebviewHandle};
pub use headless::HeadlessPlatform;
pub use ipc::{HostMessage, MessageInbox, PageMessage};
pub use pipeline::{InitStage, Pipeline};
pub use platform::{Controller, EventToken, Platform, Surface};
pub use rect::{Bounds, WebviewRect};
pub use settings::WebViewSettings;

#[cfg(windows)]
pub use webview2::WebView2Platform;
#[cfg(feature = "winit")]
pub use window::{EmbedApp, EmbedEvent};
