//! The embedded web view: initialization, navigation, placement and teardown.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use raw_window_handle::{HasWindowHandle, RawWindowHandle};

use crate::guard::{NavigationPolicy, NavigationDecision};
use crate::ipc::{HostMessage, MessageInbox, PageMessage};
use crate::pipeline::Pipeline;
use crate::platform::{Controller, EventToken, Platform, Surface};
use crate::rect::WebviewRect;
use crate::settings::WebViewSettings;
use crate::{Error, Result};

/// Availability of the controller and surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// Not created yet, or the last initialization failed.
    Pending,
    Ready,
    TornDown,
}

/// Handlers registered on a surface, removed again on teardown.
#[derive(Default)]
struct Registrations {
    guard: Option<EventToken>,
    messages: Option<EventToken>,
}

struct Attached<C, S> {
    controller: C,
    surface: S,
    registrations: Registrations,
}

enum Slot<C, S> {
    Pending,
    Ready(Attached<C, S>),
    TornDown,
}

impl<C, S> Slot<C, S> {
    fn status(&self) -> SurfaceStatus {
        match self {
            Self::Pending => SurfaceStatus::Pending,
            Self::Ready(_) => SurfaceStatus::Ready,
            Self::TornDown => SurfaceStatus::TornDown,
        }
    }
}

struct Shared<C, S> {
    slot: Mutex<Slot<C, S>>,
    ready: Condvar,
}

/// A web view embedded in a native window.
///
/// All operations take `&self`; the handle can be shared across threads when
/// the platform's objects allow it. `navigate` waits for initialization from
/// another thread to finish.
pub struct WebviewHandle<P: Platform> {
    platform: P,
    settings: WebViewSettings,
    policy: Arc<dyn NavigationPolicy>,
    shared: Arc<Shared<P::Controller, P::Surface>>,
    inbox: MessageInbox,
}

impl<P: Platform> WebviewHandle<P> {
    #[must_use]
    pub fn new(platform: P, settings: WebViewSettings) -> Self {
        let policy = settings.navigation_guard.policy();
        Self {
            platform,
            settings,
            policy,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Pending),
                ready: Condvar::new(),
            }),
            inbox: MessageInbox::new(),
        }
    }

    /// Replace the configured guard with a custom policy.
    #[must_use]
    pub fn with_navigation_policy(mut self, policy: impl NavigationPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    #[must_use]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[must_use]
    pub fn settings(&self) -> &WebViewSettings {
        &self.settings
    }

    #[must_use]
    pub fn status(&self) -> SurfaceStatus {
        self.lock().status()
    }

    /// Create the web view inside `window` and place it at `rect`.
    ///
    /// # Errors
    /// Returns an error if the window handle is unavailable or any step of
    /// initialization fails.
    pub fn initialize(&self, window: &impl HasWindowHandle, rect: WebviewRect) -> Result<()> {
        let raw = window
            .window_handle()
            .map_err(|_| Error::WindowHandle)?
            .as_raw();
        self.initialize_raw(raw, rect)
    }

    /// Create the web view inside the window behind `window`.
    ///
    /// Runs environment, controller and surface creation in order, then
    /// applies surface settings and bounds, starts the initial navigation and
    /// installs the navigation guard and web message receiver. Waiters in
    /// `navigate` are woken once the surface is ready. On failure the handle
    /// stays pending and can be initialized again.
    ///
    /// # Errors
    /// `AlreadyInitialized` or `TornDown` for a handle past pending, else the
    /// first failing platform step.
    pub fn initialize_raw(&self, window: RawWindowHandle, rect: WebviewRect) -> Result<()> {
        match self.status() {
            SurfaceStatus::Pending => {}
            SurfaceStatus::Ready => return Err(Error::AlreadyInitialized),
            SurfaceStatus::TornDown => return Err(Error::TornDown),
        }

        let (controller, surface) =
            Pipeline::new(&self.platform, self.settings.environment_options(), window)
                .run()
                .inspect_err(|e| tracing::error!("Web view initialization failed: {}", e))?;

        let attached = self.attach(controller, surface, rect)?;

        let mut slot = self.lock();
        if !matches!(*slot, Slot::Pending) {
            // close() or another initialize won while we were creating
            drop(slot);
            Self::detach(attached);
            return Err(Error::AlreadyInitialized);
        }
        *slot = Slot::Ready(attached);
        drop(slot);
        self.shared.ready.notify_all();

        tracing::info!("Web view ready");
        Ok(())
    }

    /// Configure a freshly created surface. On failure everything registered
    /// so far is removed and the controller is closed before returning.
    fn attach(
        &self,
        controller: P::Controller,
        surface: P::Surface,
        rect: WebviewRect,
    ) -> Result<Attached<P::Controller, P::Surface>> {
        let mut registrations = Registrations::default();
        match self.configure(&controller, &surface, rect, &mut registrations) {
            Ok(()) => Ok(Attached {
                controller,
                surface,
                registrations,
            }),
            Err(e) => {
                tracing::error!("Web view setup failed: {}", e);
                Self::detach(Attached {
                    controller,
                    surface,
                    registrations,
                });
                Err(e)
            }
        }
    }

    fn configure(
        &self,
        controller: &P::Controller,
        surface: &P::Surface,
        rect: WebviewRect,
        registrations: &mut Registrations,
    ) -> Result<()> {
        surface.apply_settings(&self.settings.surface_settings())?;
        controller.set_bounds(rect.to_bounds())?;

        let url = self.settings.initial_url();
        surface.navigate(url)?;
        tracing::debug!("Initial navigation to {}", url);

        let policy = Arc::clone(&self.policy);
        registrations.guard = Some(surface.add_navigation_starting(Arc::new(move |uri: &str| {
            let decision = policy.decide(uri);
            if decision == NavigationDecision::Cancel {
                tracing::warn!("Blocked navigation to {}", uri);
            }
            decision
        }))?);

        if self.settings.web_message_enabled {
            let inbox = self.inbox.clone();
            registrations.messages = Some(
                surface.add_web_message_received(Arc::new(move |json: &str| inbox.receive(json)))?,
            );
        }
        Ok(())
    }

    fn detach(attached: Attached<P::Controller, P::Surface>) {
        let Attached {
            controller,
            surface,
            registrations,
        } = attached;

        if let Some(token) = registrations.guard {
            if let Err(e) = surface.remove_navigation_starting(token) {
                tracing::warn!("Failed to remove navigation guard: {}", e);
            }
        }
        if let Some(token) = registrations.messages {
            if let Err(e) = surface.remove_web_message_received(token) {
                tracing::warn!("Failed to remove web message receiver: {}", e);
            }
        }
        if let Err(e) = controller.close() {
            tracing::warn!("Failed to close controller: {}", e);
        }
    }

    /// Navigate the surface to `url`.
    ///
    /// Waits up to the configured timeout for initialization to finish.
    /// Success means the request was issued, not that the page loaded.
    ///
    /// # Errors
    /// `InvalidUrl` for an empty URL, `NavigationTimeout` if the surface does
    /// not become ready in time, `TornDown` after `close`.
    pub fn navigate(&self, url: &str) -> Result<()> {
        if url.is_empty() {
            tracing::warn!("Empty url to play");
            return Err(Error::InvalidUrl("URL cannot be empty".to_string()));
        }

        let timeout = self.settings.navigate_timeout();
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Slot::Ready(attached) = &*slot {
                attached.surface.navigate(url)?;
                tracing::debug!("Navigating to {}", url);
                return Ok(());
            }
            if matches!(*slot, Slot::TornDown) {
                return Err(Error::TornDown);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!("Controller not ready after {:?}", timeout);
                return Err(Error::NavigationTimeout(timeout));
            }
            slot = self
                .shared
                .ready
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Move and resize the surface. Does nothing until the surface is ready.
    ///
    /// # Errors
    /// Returns an error if the platform rejects the bounds.
    pub fn reposition(&self, rect: WebviewRect) -> Result<()> {
        let bounds = rect.to_bounds();
        if let Slot::Ready(attached) = &*self.lock() {
            attached.controller.set_bounds(bounds)?;
            tracing::trace!(
                "Bounds set to {}x{} at ({}, {})",
                bounds.width(),
                bounds.height(),
                bounds.left,
                bounds.top
            );
        }
        Ok(())
    }

    /// Post a message to the page.
    ///
    /// # Errors
    /// `NotReady` before initialization, `TornDown` after `close`, or a
    /// serialization/platform error.
    pub fn post_message(&self, message: &HostMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        match &*self.lock() {
            Slot::Ready(attached) => attached.surface.post_web_message_json(&json),
            Slot::Pending => Err(Error::NotReady),
            Slot::TornDown => Err(Error::TornDown),
        }
    }

    /// Take the messages the page has posted since the last poll.
    #[must_use]
    pub fn poll_messages(&self) -> Vec<PageMessage> {
        self.inbox.drain()
    }

    /// Unregister handlers, close the controller and mark the handle torn
    /// down. Calling it again does nothing.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.lock(), Slot::TornDown);
        self.shared.ready.notify_all();

        match previous {
            Slot::Ready(attached) => {
                Self::detach(attached);
                tracing::info!("Web view closed");
            }
            Slot::Pending => tracing::debug!("Web view closed before it was ready"),
            Slot::TornDown => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<P::Controller, P::Surface>> {
        self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::guard::GuardKind;
    use crate::headless::{tests::test_window, HeadlessPlatform};
    use crate::pipeline::InitStage;
    use crate::rect::Bounds;
    use crate::settings::FALLBACK_URL;

    fn new_handle(settings: WebViewSettings) -> (HeadlessPlatform, WebviewHandle<HeadlessPlatform>) {
        let platform = HeadlessPlatform::new();
        (platform.clone(), WebviewHandle::new(platform, settings))
    }

    fn ready_handle() -> (HeadlessPlatform, WebviewHandle<HeadlessPlatform>) {
        let (platform, handle) = new_handle(WebViewSettings::new());
        handle
            .initialize_raw(test_window(), WebviewRect::new(0, 0, 800, 600))
            .unwrap();
        (platform, handle)
    }

    #[test]
    fn test_initialize_sequence() {
        let (platform, handle) = new_handle(WebViewSettings::new().with_url("https://example.com"));
        assert_eq!(handle.status(), SurfaceStatus::Pending);

        handle
            .initialize_raw(test_window(), WebviewRect::new(10, 20, 300, 200))
            .unwrap();
        assert_eq!(handle.status(), SurfaceStatus::Ready);

        let log = platform.snapshot();
        assert_eq!(
            log.environments[0].additional_browser_arguments,
            "--autoplay-policy=no-user-gesture-required"
        );
        let applied = log.surface_settings.unwrap();
        assert!(applied.script_enabled);
        assert!(applied.default_script_dialogs_enabled);
        assert!(applied.web_message_enabled);
        assert_eq!(
            log.bounds,
            vec![Bounds {
                left: 10,
                top: 20,
                right: 310,
                bottom: 220,
            }]
        );
        assert_eq!(log.requested, vec!["https://example.com"]);
    }

    #[test]
    fn test_initialize_uses_fallback_url() {
        let (platform, _handle) = ready_handle();
        assert_eq!(platform.snapshot().requested, vec![FALLBACK_URL]);
        platform.process_events();
        assert_eq!(platform.snapshot().committed, vec![FALLBACK_URL]);
    }

    #[test]
    fn test_initialize_normalizes_rect() {
        let (platform, handle) = new_handle(WebViewSettings::new());
        handle
            .initialize_raw(test_window(), WebviewRect::new(50, 60, 0, 0))
            .unwrap();
        assert_eq!(
            platform.snapshot().bounds,
            vec![Bounds {
                left: 0,
                top: 0,
                right: 1,
                bottom: 1,
            }]
        );
    }

    #[test]
    fn test_initialize_twice() {
        let (_platform, handle) = ready_handle();
        let result = handle.initialize_raw(test_window(), WebviewRect::new(0, 0, 1, 1));
        assert!(matches!(result, Err(Error::AlreadyInitialized)));
    }

    #[test]
    fn test_initialize_failure_stays_pending() {
        let platform = HeadlessPlatform::new().failing_at(InitStage::ControllerReady);
        let handle = WebviewHandle::new(platform, WebViewSettings::new());
        let result = handle.initialize_raw(test_window(), WebviewRect::new(0, 0, 10, 10));
        assert!(matches!(result, Err(Error::ControllerCreationFailed(_))));
        assert_eq!(handle.status(), SurfaceStatus::Pending);
    }

    #[test]
    fn test_failed_setup_releases_controller_and_guard() {
        let platform = HeadlessPlatform::new().refusing_web_messages();
        let handle = WebviewHandle::new(platform.clone(), WebViewSettings::new());

        let result = handle.initialize_raw(test_window(), WebviewRect::new(0, 0, 10, 10));
        assert!(matches!(result, Err(Error::Platform(_))));
        assert_eq!(handle.status(), SurfaceStatus::Pending);
        assert!(platform.snapshot().closed);

        // the guard registered before the failure is gone again
        platform.navigate_from_page("http://after-failure");
        platform.process_events();
        assert!(platform.snapshot().cancelled.is_empty());
    }

    #[test]
    fn test_setup_without_web_messages_succeeds() {
        let platform = HeadlessPlatform::new().refusing_web_messages();
        let mut settings = WebViewSettings::new();
        settings.web_message_enabled = false;
        let handle = WebviewHandle::new(platform.clone(), settings);

        handle
            .initialize_raw(test_window(), WebviewRect::new(0, 0, 10, 10))
            .unwrap();
        assert_eq!(handle.status(), SurfaceStatus::Ready);
        assert!(!platform.snapshot().closed);
    }

    #[test]
    fn test_guard_blocks_plain_http() {
        let (platform, _handle) = ready_handle();
        platform.navigate_from_page("http://x");
        platform.navigate_from_page("httpsx");
        platform.navigate_from_page("https://example.com");
        platform.process_events();

        let log = platform.snapshot();
        assert_eq!(log.cancelled, vec!["http://x"]);
        assert_eq!(log.committed, vec![FALLBACK_URL, "httpsx", "https://example.com"]);
    }

    #[test]
    fn test_guard_allow_all() {
        let (platform, handle) =
            new_handle(WebViewSettings::new().with_navigation_guard(GuardKind::AllowAll));
        handle
            .initialize_raw(test_window(), WebviewRect::new(0, 0, 10, 10))
            .unwrap();
        platform.navigate_from_page("http://x");
        platform.process_events();
        assert!(platform.snapshot().cancelled.is_empty());
    }

    #[test]
    fn test_custom_policy() {
        let platform = HeadlessPlatform::new();
        let handle = WebviewHandle::new(platform.clone(), WebViewSettings::new())
            .with_navigation_policy(|uri: &str| {
                if uri.ends_with(".exe") {
                    NavigationDecision::Cancel
                } else {
                    NavigationDecision::Allow
                }
            });
        handle
            .initialize_raw(test_window(), WebviewRect::new(0, 0, 10, 10))
            .unwrap();
        platform.navigate_from_page("https://host/setup.exe");
        platform.process_events();
        assert_eq!(platform.snapshot().cancelled, vec!["https://host/setup.exe"]);
    }

    #[test]
    fn test_navigate_empty_url() {
        let (platform, handle) = ready_handle();
        let result = handle.navigate("");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
        assert_eq!(platform.snapshot().requested, vec![FALLBACK_URL]);
    }

    #[test]
    fn test_navigate_when_ready() {
        let (platform, handle) = ready_handle();
        let started = Instant::now();
        handle.navigate("https://rust-lang.org").unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            platform.snapshot().requested,
            vec![FALLBACK_URL, "https://rust-lang.org"]
        );
    }

    #[test]
    fn test_navigate_times_out() {
        let (platform, handle) =
            new_handle(WebViewSettings::new().with_navigate_timeout(Duration::from_millis(50)));
        let started = Instant::now();
        let result = handle.navigate("https://example.com");
        assert!(matches!(result, Err(Error::NavigationTimeout(t)) if t == Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(platform.snapshot().requested.is_empty());
    }

    #[test]
    fn test_navigate_waits_for_initialization() {
        let (platform, handle) =
            new_handle(WebViewSettings::new().with_navigate_timeout(Duration::from_secs(5)));
        let handle = Arc::new(handle);

        let initializer = {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                handle
                    .initialize_raw(test_window(), WebviewRect::new(0, 0, 100, 100))
                    .unwrap();
            })
        };

        handle.navigate("https://example.com").unwrap();
        initializer.join().unwrap();

        let requested = platform.snapshot().requested;
        assert_eq!(requested.last().map(String::as_str), Some("https://example.com"));
    }

    #[test]
    fn test_navigate_after_close() {
        let (_platform, handle) = ready_handle();
        handle.close();
        assert!(matches!(handle.navigate("https://example.com"), Err(Error::TornDown)));
    }

    #[test]
    fn test_close_wakes_waiter() {
        let (_platform, handle) =
            new_handle(WebViewSettings::new().with_navigate_timeout(Duration::from_secs(30)));
        let handle = Arc::new(handle);

        let closer = {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                handle.close();
            })
        };

        let started = Instant::now();
        assert!(matches!(handle.navigate("https://example.com"), Err(Error::TornDown)));
        assert!(started.elapsed() < Duration::from_secs(30));
        closer.join().unwrap();
    }

    #[test]
    fn test_reposition_pending_is_noop() {
        let (platform, handle) = new_handle(WebViewSettings::new());
        handle.reposition(WebviewRect::new(0, 0, 640, 480)).unwrap();
        assert!(platform.snapshot().bounds.is_empty());
        assert_eq!(handle.status(), SurfaceStatus::Pending);
    }

    #[test]
    fn test_reposition_ready() {
        let (platform, handle) = ready_handle();
        handle.reposition(WebviewRect::new(5, 5, 0, 100)).unwrap();
        assert_eq!(
            platform.snapshot().bounds.last(),
            Some(&Bounds {
                left: 0,
                top: 5,
                right: 1,
                bottom: 105,
            })
        );
    }

    #[test]
    fn test_close_tears_down() {
        let (platform, handle) = ready_handle();
        handle.close();
        assert_eq!(handle.status(), SurfaceStatus::TornDown);
        assert!(platform.snapshot().closed);

        // guard removed: nothing is cancelled any more
        platform.navigate_from_page("http://x");
        platform.process_events();
        assert!(platform.snapshot().cancelled.is_empty());

        // idempotent, and the handle cannot come back
        handle.close();
        let result = handle.initialize_raw(test_window(), WebviewRect::new(0, 0, 1, 1));
        assert!(matches!(result, Err(Error::TornDown)));
        handle.reposition(WebviewRect::new(0, 0, 5, 5)).unwrap();
        assert_eq!(platform.snapshot().bounds.len(), 1);
    }

    #[test]
    fn test_post_message() {
        let (platform, handle) = ready_handle();
        handle
            .post_message(&HostMessage::new("theme", serde_json::json!("dark")))
            .unwrap();
        let posted = platform.snapshot().posted;
        assert_eq!(posted.len(), 1);
        assert!(posted[0].contains(r#""type":"theme""#));
    }

    #[test]
    fn test_post_message_before_ready() {
        let (_platform, handle) = new_handle(WebViewSettings::new());
        let result = handle.post_message(&HostMessage::new("x", serde_json::Value::Null));
        assert!(matches!(result, Err(Error::NotReady)));
    }

    #[test]
    fn test_poll_messages() {
        let (platform, handle) = ready_handle();
        platform.post_from_page(r#"{"type":"greet","payload":{"name":"page"},"id":"1"}"#);
        platform.post_from_page("garbage");
        assert!(handle.poll_messages().is_empty());

        platform.process_events();
        let messages = handle.poll_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type, "greet");
        assert_eq!(messages[0].payload["name"], "page");
        assert!(handle.poll_messages().is_empty());
    }

    #[test]
    fn test_web_messages_disabled() {
        let mut settings = WebViewSettings::new();
        settings.web_message_enabled = false;
        let (platform, handle) = new_handle(settings);
        handle
            .initialize_raw(test_window(), WebviewRect::new(0, 0, 10, 10))
            .unwrap();

        platform.post_from_page(r#"{"type":"ignored"}"#);
        platform.process_events();
        assert!(handle.poll_messages().is_empty());
    }
}
