//! The seam between the web view logic and a browser-control backend.
//!
//! A backend hands out three externally owned objects: an environment, a
//! controller bound to a parent window, and the browsing surface reached
//! through the controller. Their lifetime follows the backend's own
//! reference counting; this crate only holds them.

use std::sync::Arc;

use raw_window_handle::RawWindowHandle;

use crate::guard::NavigationDecision;
use crate::rect::Bounds;
use crate::settings::{EnvironmentOptions, SurfaceSettings};
use crate::Result;

/// Called with the target URI before each navigation starts.
pub type NavigationHandler = Arc<dyn Fn(&str) -> NavigationDecision + Send + Sync>;

/// Called with the raw JSON of each web message the page posts.
pub type WebMessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Registration token returned when an event handler is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventToken(pub i64);

/// A browser-control backend.
pub trait Platform {
    type Environment;
    type Controller: Controller<Surface = Self::Surface>;
    type Surface: Surface;

    /// Create the browser environment.
    ///
    /// # Errors
    /// `Error::EnvironmentCreationFailed` when the runtime cannot be started.
    fn create_environment(&self, options: &EnvironmentOptions) -> Result<Self::Environment>;

    /// Create a controller hosted in `window`.
    ///
    /// # Errors
    /// `Error::ControllerCreationFailed` when the controller cannot be created.
    fn create_controller(
        &self,
        environment: &Self::Environment,
        window: RawWindowHandle,
    ) -> Result<Self::Controller>;

    /// Deliver platform events that are queued outside the window's own
    /// message loop. Backends driven by the window message loop do nothing.
    fn process_events(&self) {}
}

/// Position, size and lifetime of a surface.
pub trait Controller {
    type Surface;

    /// # Errors
    /// `Error::SurfaceUnavailable` when the controller has no surface.
    fn surface(&self) -> Result<Self::Surface>;

    /// # Errors
    /// Returns an error if the platform rejects the bounds.
    fn set_bounds(&self, bounds: Bounds) -> Result<()>;

    /// # Errors
    /// Returns an error if the platform fails to close the controller.
    fn close(&self) -> Result<()>;
}

/// The browsing surface itself.
#[allow(clippy::missing_errors_doc)]
pub trait Surface {
    fn apply_settings(&self, settings: &SurfaceSettings) -> Result<()>;

    fn navigate(&self, url: &str) -> Result<()>;

    fn add_navigation_starting(&self, handler: NavigationHandler) -> Result<EventToken>;

    fn remove_navigation_starting(&self, token: EventToken) -> Result<()>;

    fn add_web_message_received(&self, handler: WebMessageHandler) -> Result<EventToken>;

    fn remove_web_message_received(&self, token: EventToken) -> Result<()>;

    fn post_web_message_json(&self, json: &str) -> Result<()>;
}
