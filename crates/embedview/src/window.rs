//! Winit integration.
//!
//! `EmbedApp` owns a winit window, embeds a web view in it once the event
//! loop resumes, and keeps the view covering the client area. Messages the
//! page posts are drained once per loop iteration and handed to the handler
//! set with `with_message_handler`.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{Error, PageMessage, Platform, Result, WebViewSettings, WebviewHandle, WebviewRect};

/// Requests other threads can send into the event loop.
#[derive(Debug, Clone)]
pub enum EmbedEvent {
    /// Navigate the web view to a URL
    Navigate(String),
    /// Tear down the web view and leave the event loop
    Close,
}

fn client_rect(size: PhysicalSize<u32>) -> WebviewRect {
    let width = i32::try_from(size.width).unwrap_or(i32::MAX);
    let height = i32::try_from(size.height).unwrap_or(i32::MAX);
    WebviewRect::new(0, 0, width, height)
}

type MessageHandler<P> = Box<dyn FnMut(&WebviewHandle<P>, PageMessage)>;

/// A window whose client area is filled by a web view.
pub struct EmbedApp<P: Platform> {
    window: Option<Arc<Window>>,
    webview: WebviewHandle<P>,
    message_handler: Option<MessageHandler<P>>,
}

impl<P: Platform> EmbedApp<P> {
    #[must_use]
    pub fn new(platform: P, settings: WebViewSettings) -> Self {
        Self::with_handle(WebviewHandle::new(platform, settings))
    }

    /// Use a handle configured by the caller, e.g. with a custom guard.
    #[must_use]
    pub fn with_handle(webview: WebviewHandle<P>) -> Self {
        Self {
            window: None,
            webview,
            message_handler: None,
        }
    }

    /// Handle messages posted by the page. The handler runs on the event
    /// loop thread and may reply through the handle.
    #[must_use]
    pub fn with_message_handler(
        mut self,
        handler: impl FnMut(&WebviewHandle<P>, PageMessage) + 'static,
    ) -> Self {
        self.message_handler = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    #[must_use]
    pub fn webview(&self) -> &WebviewHandle<P> {
        &self.webview
    }

    /// Run the application.
    ///
    /// # Errors
    /// Returns an error if the event loop fails.
    pub fn run(self) -> Result<()> {
        self.run_with_proxy(|_| {})
    }

    /// Run the application, handing `on_start` a proxy for sending
    /// `EmbedEvent`s before the loop starts.
    ///
    /// # Errors
    /// Returns an error if the event loop fails.
    pub fn run_with_proxy(mut self, on_start: impl FnOnce(EventLoopProxy<EmbedEvent>)) -> Result<()> {
        let event_loop = EventLoop::<EmbedEvent>::with_user_event()
            .build()
            .map_err(|e| Error::EventLoop(e.to_string()))?;

        on_start(event_loop.create_proxy());

        event_loop
            .run_app(&mut self)
            .map_err(|e| Error::EventLoop(e.to_string()))
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = WindowAttributes::default()
            .with_title(self.webview.settings().window_title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .map_err(|e| Error::EventLoop(e.to_string()))?,
        );

        self.webview
            .initialize(window.as_ref(), client_rect(window.inner_size()))?;
        self.window = Some(window);
        Ok(())
    }

    /// Empty the inbox, passing each message to the handler. Without a
    /// handler the messages are dropped.
    fn dispatch_messages(&mut self) {
        for message in self.webview.poll_messages() {
            match self.message_handler.as_mut() {
                Some(handler) => handler(&self.webview, message),
                None => tracing::debug!("Dropped page message: {}", message.message_type),
            }
        }
    }

    fn pump(&mut self) {
        self.webview.platform().process_events();
        self.dispatch_messages();
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.webview.close();
        event_loop.exit();
    }
}

impl<P: Platform> ApplicationHandler<EmbedEvent> for EmbedApp<P> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window(event_loop) {
                tracing::error!("Failed to initialize window: {}", e);
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: EmbedEvent) {
        match event {
            EmbedEvent::Navigate(url) => match self.webview.navigate(&url) {
                Ok(()) => tracing::info!("Navigation requested: {}", url),
                Err(e) => tracing::error!("Navigation to {:?} failed: {}", url, e),
            },
            EmbedEvent::Close => self.shutdown(event_loop),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                if let Err(e) = self.webview.reposition(client_rect(size)) {
                    tracing::error!("Failed to reposition web view: {}", e);
                }
            }
            WindowEvent::RedrawRequested => self.pump(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.pump();
    }
}
