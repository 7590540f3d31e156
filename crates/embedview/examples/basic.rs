//! Embed a web view in a window.
//!
//! Run with: `cargo run --example basic -- https://example.com`
//!
//! Settings are read from the JSON file named by `EMBEDVIEW_CONFIG` when set.
//! Without WebView2 (any non-Windows host) the headless backend stands in.

use std::time::Duration;

use embedview::{EmbedApp, EmbedEvent, HostMessage, WebViewSettings};

fn main() -> embedview::Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    let mut settings = match std::env::var_os("EMBEDVIEW_CONFIG") {
        Some(path) => WebViewSettings::from_json_file(path)?,
        None => WebViewSettings::default(),
    };
    let mut args = std::env::args().skip(1);
    if let Some(url) = args.next() {
        settings = settings.with_url(url);
    }
    let later = args.next();

    #[cfg(windows)]
    let platform = embedview::WebView2Platform::new()?;
    #[cfg(not(windows))]
    let platform = embedview::HeadlessPlatform::new();

    let app = EmbedApp::new(platform, settings).with_message_handler(|webview, message| {
        tracing::info!("Page says {}: {}", message.message_type, message.payload);
        // Echo back anything that asked for an answer.
        if let Some(reply) = HostMessage::reply(&message, message.payload.clone()) {
            if let Err(e) = webview.post_message(&reply) {
                tracing::warn!("Failed to reply to page: {}", e);
            }
        }
    });

    app.run_with_proxy(move |proxy| {
        // A second URL is requested from another thread after a few seconds.
        if let Some(url) = later {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_secs(3));
                if let Err(e) = proxy.send_event(EmbedEvent::Navigate(url)) {
                    tracing::warn!("Event loop closed before navigation: {}", e);
                }
            });
        }
    })
}
