//! A backend without a browser engine.
//!
//! `HeadlessPlatform` accepts every call a real control would, records it,
//! and delivers navigation-starting and web-message events from
//! `process_events`, the way a platform delivers them from its event loop.
//! Clones share the same recorded state.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use raw_window_handle::RawWindowHandle;

use crate::guard::NavigationDecision;
use crate::pipeline::InitStage;
use crate::platform::{
    Controller, EventToken, NavigationHandler, Platform, Surface, WebMessageHandler,
};
use crate::rect::Bounds;
use crate::settings::{EnvironmentOptions, SurfaceSettings};
use crate::{Error, Result};

/// Everything the headless backend has been asked to do.
#[derive(Debug, Clone, Default)]
pub struct HeadlessLog {
    pub environments: Vec<EnvironmentOptions>,
    pub controllers_created: usize,
    pub surface_settings: Option<SurfaceSettings>,
    pub bounds: Vec<Bounds>,
    /// Every URL passed to `navigate`, in order
    pub requested: Vec<String>,
    /// Navigations the guards let through
    pub committed: Vec<String>,
    /// Navigations a guard cancelled
    pub cancelled: Vec<String>,
    /// JSON posted to the page
    pub posted: Vec<String>,
    pub closed: bool,
}

enum PendingEvent {
    Navigation(String),
    Message(String),
}

#[derive(Default)]
struct HeadlessState {
    log: HeadlessLog,
    fail_at: Option<InitStage>,
    refuse_web_messages: bool,
    next_token: i64,
    navigation_handlers: BTreeMap<i64, NavigationHandler>,
    message_handlers: BTreeMap<i64, WebMessageHandler>,
    pending_navigations: VecDeque<String>,
    pending_messages: VecDeque<String>,
}

impl HeadlessState {
    fn token(&mut self) -> EventToken {
        self.next_token += 1;
        EventToken(self.next_token)
    }
}

#[derive(Clone, Default)]
pub struct HeadlessPlatform {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the transition into `stage` fail.
    #[must_use]
    pub fn failing_at(self, stage: InitStage) -> Self {
        self.lock().fail_at = Some(stage);
        self
    }

    /// Make registering a web message receiver fail.
    #[must_use]
    pub fn refusing_web_messages(self) -> Self {
        self.lock().refuse_web_messages = true;
        self
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> HeadlessLog {
        self.lock().log.clone()
    }

    /// Queue a web message as if the page had posted it.
    pub fn post_from_page(&self, json: impl Into<String>) {
        self.lock().pending_messages.push_back(json.into());
    }

    /// Queue a navigation the page started on its own, such as a link click.
    pub fn navigate_from_page(&self, uri: impl Into<String>) {
        self.lock().pending_navigations.push_back(uri.into());
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fails_at(&self, stage: InitStage) -> bool {
        self.lock().fail_at == Some(stage)
    }

    fn next_pending(&self) -> Option<PendingEvent> {
        let mut state = self.lock();
        if let Some(uri) = state.pending_navigations.pop_front() {
            return Some(PendingEvent::Navigation(uri));
        }
        state.pending_messages.pop_front().map(PendingEvent::Message)
    }

    fn deliver_navigation(&self, uri: &str) {
        let handlers: Vec<NavigationHandler> =
            self.lock().navigation_handlers.values().cloned().collect();

        // Handlers run without the lock held; they may call back in.
        let cancelled = handlers
            .iter()
            .any(|handler| handler(uri) == NavigationDecision::Cancel);

        let mut state = self.lock();
        if cancelled {
            tracing::debug!("Navigation cancelled: {}", uri);
            state.log.cancelled.push(uri.to_string());
        } else {
            state.log.committed.push(uri.to_string());
        }
    }

    fn deliver_message(&self, json: &str) {
        let handlers: Vec<WebMessageHandler> =
            self.lock().message_handlers.values().cloned().collect();
        for handler in handlers {
            handler(json);
        }
    }
}

impl Platform for HeadlessPlatform {
    type Environment = EnvironmentOptions;
    type Controller = HeadlessController;
    type Surface = HeadlessSurface;

    fn create_environment(&self, options: &EnvironmentOptions) -> Result<Self::Environment> {
        if self.fails_at(InitStage::EnvironmentReady) {
            return Err(Error::EnvironmentCreationFailed(
                "headless environment refused".to_string(),
            ));
        }
        self.lock().log.environments.push(options.clone());
        Ok(options.clone())
    }

    fn create_controller(
        &self,
        _environment: &Self::Environment,
        window: RawWindowHandle,
    ) -> Result<Self::Controller> {
        if self.fails_at(InitStage::ControllerReady) {
            return Err(Error::ControllerCreationFailed(
                "headless controller refused".to_string(),
            ));
        }
        tracing::debug!("Headless controller for {:?}", window);
        self.lock().log.controllers_created += 1;
        Ok(HeadlessController {
            platform: self.clone(),
        })
    }

    fn process_events(&self) {
        while let Some(event) = self.next_pending() {
            match event {
                PendingEvent::Navigation(uri) => self.deliver_navigation(&uri),
                PendingEvent::Message(json) => self.deliver_message(&json),
            }
        }
    }
}

pub struct HeadlessController {
    platform: HeadlessPlatform,
}

impl Controller for HeadlessController {
    type Surface = HeadlessSurface;

    fn surface(&self) -> Result<Self::Surface> {
        if self.platform.fails_at(InitStage::SurfaceReady) {
            return Err(Error::SurfaceUnavailable(
                "headless controller has no surface".to_string(),
            ));
        }
        Ok(HeadlessSurface {
            platform: self.platform.clone(),
        })
    }

    fn set_bounds(&self, bounds: Bounds) -> Result<()> {
        self.platform.lock().log.bounds.push(bounds);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.platform.lock().log.closed = true;
        Ok(())
    }
}

pub struct HeadlessSurface {
    platform: HeadlessPlatform,
}

impl Surface for HeadlessSurface {
    fn apply_settings(&self, settings: &SurfaceSettings) -> Result<()> {
        self.platform.lock().log.surface_settings = Some(*settings);
        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.platform.lock();
        state.log.requested.push(url.to_string());
        state.pending_navigations.push_back(url.to_string());
        Ok(())
    }

    fn add_navigation_starting(&self, handler: NavigationHandler) -> Result<EventToken> {
        let mut state = self.platform.lock();
        let token = state.token();
        state.navigation_handlers.insert(token.0, handler);
        Ok(token)
    }

    fn remove_navigation_starting(&self, token: EventToken) -> Result<()> {
        self.platform.lock().navigation_handlers.remove(&token.0);
        Ok(())
    }

    fn add_web_message_received(&self, handler: WebMessageHandler) -> Result<EventToken> {
        let mut state = self.platform.lock();
        if state.refuse_web_messages {
            return Err(Error::Platform("web message receiver refused".to_string()));
        }
        let token = state.token();
        state.message_handlers.insert(token.0, handler);
        Ok(token)
    }

    fn remove_web_message_received(&self, token: EventToken) -> Result<()> {
        self.platform.lock().message_handlers.remove(&token.0);
        Ok(())
    }

    fn post_web_message_json(&self, json: &str) -> Result<()> {
        self.platform.lock().log.posted.push(json.to_string());
        Ok(())
    }
}
