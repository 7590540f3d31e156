//! Microsoft Edge WebView2 backend.
//!
//! WebView2 objects live in a single-threaded COM apartment: create the
//! platform and call every handle operation on the window's UI thread.
//! Creation completes asynchronously; `wait_for_async_operation` pumps this
//! thread's message loop until the completion handler has fired.

use std::ffi::c_void;
use std::sync::mpsc;

use raw_window_handle::RawWindowHandle;
use webview2_com::Microsoft::Web::WebView2::Win32::{
    CreateCoreWebView2EnvironmentWithOptions, ICoreWebView2, ICoreWebView2Controller,
    ICoreWebView2Environment, ICoreWebView2EnvironmentOptions,
};
use webview2_com::{
    take_pwstr, CoreWebView2EnvironmentOptions, CreateCoreWebView2ControllerCompletedHandler,
    CreateCoreWebView2EnvironmentCompletedHandler, NavigationStartingEventHandler,
    WebMessageReceivedEventHandler,
};
use windows::core::{HSTRING, PCWSTR, PWSTR};
use windows::Win32::Foundation::{E_POINTER, HWND, RECT};
use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};

use crate::guard::NavigationDecision;
use crate::platform::{
    Controller, EventToken, NavigationHandler, Platform, Surface, WebMessageHandler,
};
use crate::rect::Bounds;
use crate::settings::{EnvironmentOptions, SurfaceSettings};
use crate::{Error, Result};

fn platform_error(e: &windows::core::Error) -> Error {
    Error::Platform(e.to_string())
}

/// Backend driving the installed (or a fixed-version) WebView2 runtime.
#[derive(Debug)]
pub struct WebView2Platform {
    _private: (),
}

impl WebView2Platform {
    /// Join the calling thread to a single-threaded COM apartment.
    ///
    /// # Errors
    /// Currently infallible; an apartment already initialized by the
    /// windowing library is accepted.
    #[allow(unsafe_code)]
    pub fn new() -> Result<Self> {
        // SAFETY: CoInitializeEx is safe to call repeatedly on the same thread.
        // A thread already in an apartment returns S_FALSE or RPC_E_CHANGED_MODE,
        // and either way WebView2 can be created on it.
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if let Err(e) = hr.ok() {
            tracing::debug!("COM apartment already initialized: {}", e);
        }
        Ok(Self { _private: () })
    }
}

fn hwnd(window: RawWindowHandle) -> Result<HWND> {
    match window {
        RawWindowHandle::Win32(handle) => Ok(HWND(handle.hwnd.get() as *mut c_void)),
        _ => Err(Error::WindowHandle),
    }
}

fn optional_path(path: Option<&std::path::Path>) -> HSTRING {
    path.map(|p| HSTRING::from(p.as_os_str()))
        .unwrap_or_default()
}

impl Platform for WebView2Platform {
    type Environment = ICoreWebView2Environment;
    type Controller = WebView2Controller;
    type Surface = WebView2Surface;

    #[allow(unsafe_code)]
    fn create_environment(&self, options: &EnvironmentOptions) -> Result<Self::Environment> {
        let environment_options = CoreWebView2EnvironmentOptions::default();
        // SAFETY: the options object is owned here and not yet shared with WebView2.
        unsafe {
            environment_options
                .set_additional_browser_arguments(options.additional_browser_arguments.clone());
        }
        let environment_options = ICoreWebView2EnvironmentOptions::from(environment_options);

        let browser_folder = optional_path(options.browser_executable_folder.as_deref());
        let data_folder = optional_path(options.user_data_folder.as_deref());

        let (tx, rx) = mpsc::channel();
        CreateCoreWebView2EnvironmentCompletedHandler::wait_for_async_operation(
            Box::new(move |handler| {
                let browser_folder = if browser_folder.is_empty() {
                    PCWSTR::null()
                } else {
                    PCWSTR(browser_folder.as_ptr())
                };
                let data_folder = if data_folder.is_empty() {
                    PCWSTR::null()
                } else {
                    PCWSTR(data_folder.as_ptr())
                };
                // SAFETY: the folder strings outlive this call, and the handler
                // is a live COM object owned by webview2-com.
                unsafe {
                    CreateCoreWebView2EnvironmentWithOptions(
                        browser_folder,
                        data_folder,
                        &environment_options,
                        &handler,
                    )
                    .map_err(webview2_com::Error::WindowsError)
                }
            }),
            Box::new(move |error_code, environment| {
                error_code?;
                let _ = tx.send(environment.ok_or_else(|| windows::core::Error::from(E_POINTER)));
                Ok(())
            }),
        )
        .map_err(|e| Error::EnvironmentCreationFailed(format!("{e:?}")))?;

        rx.recv()
            .map_err(|_| Error::EnvironmentCreationFailed("completion never delivered".to_string()))?
            .map_err(|e| Error::EnvironmentCreationFailed(e.to_string()))
    }

    #[allow(unsafe_code)]
    fn create_controller(
        &self,
        environment: &Self::Environment,
        window: RawWindowHandle,
    ) -> Result<Self::Controller> {
        let parent = hwnd(window)?;
        let environment = environment.clone();

        let (tx, rx) = mpsc::channel();
        CreateCoreWebView2ControllerCompletedHandler::wait_for_async_operation(
            Box::new(move |handler| {
                // SAFETY: `parent` is the live window the caller handed in.
                unsafe {
                    environment
                        .CreateCoreWebView2Controller(parent, &handler)
                        .map_err(webview2_com::Error::WindowsError)
                }
            }),
            Box::new(move |error_code, controller| {
                error_code?;
                let _ = tx.send(controller.ok_or_else(|| windows::core::Error::from(E_POINTER)));
                Ok(())
            }),
        )
        .map_err(|e| Error::ControllerCreationFailed(format!("{e:?}")))?;

        let controller = rx
            .recv()
            .map_err(|_| Error::ControllerCreationFailed("completion never delivered".to_string()))?
            .map_err(|e| Error::ControllerCreationFailed(e.to_string()))?;

        tracing::debug!("WebView2 controller created");
        Ok(WebView2Controller(controller))
    }
}

pub struct WebView2Controller(ICoreWebView2Controller);

impl Controller for WebView2Controller {
    type Surface = WebView2Surface;

    #[allow(unsafe_code)]
    fn surface(&self) -> Result<Self::Surface> {
        // SAFETY: self.0 is a valid controller for the lifetime of self.
        let webview = unsafe { self.0.CoreWebView2() }
            .map_err(|e| Error::SurfaceUnavailable(e.to_string()))?;
        Ok(WebView2Surface(webview))
    }

    #[allow(unsafe_code)]
    fn set_bounds(&self, bounds: Bounds) -> Result<()> {
        let rect = RECT {
            left: bounds.left,
            top: bounds.top,
            right: bounds.right,
            bottom: bounds.bottom,
        };
        // SAFETY: self.0 is a valid controller.
        unsafe { self.0.SetBounds(rect) }.map_err(|e| platform_error(&e))
    }

    #[allow(unsafe_code)]
    fn close(&self) -> Result<()> {
        // SAFETY: self.0 is a valid controller; Close is allowed once.
        unsafe { self.0.Close() }.map_err(|e| platform_error(&e))
    }
}

pub struct WebView2Surface(ICoreWebView2);

impl Surface for WebView2Surface {
    #[allow(unsafe_code)]
    fn apply_settings(&self, settings: &SurfaceSettings) -> Result<()> {
        // SAFETY: self.0 is a valid surface; the settings object it returns is
        // reference counted by the windows crate.
        unsafe {
            let core = self.0.Settings().map_err(|e| platform_error(&e))?;
            core.SetIsScriptEnabled(settings.script_enabled)
                .map_err(|e| platform_error(&e))?;
            core.SetAreDefaultScriptDialogsEnabled(settings.default_script_dialogs_enabled)
                .map_err(|e| platform_error(&e))?;
            core.SetIsWebMessageEnabled(settings.web_message_enabled)
                .map_err(|e| platform_error(&e))?;
        }
        Ok(())
    }

    #[allow(unsafe_code)]
    fn navigate(&self, url: &str) -> Result<()> {
        let url = HSTRING::from(url);
        // SAFETY: self.0 is a valid surface and `url` outlives the call.
        unsafe { self.0.Navigate(&url) }.map_err(|e| platform_error(&e))
    }

    #[allow(unsafe_code)]
    fn add_navigation_starting(&self, handler: NavigationHandler) -> Result<EventToken> {
        let event_handler = NavigationStartingEventHandler::create(Box::new(move |_, args| {
            let Some(args) = args else {
                return Ok(());
            };
            // SAFETY: args is valid for the duration of the callback; the URI
            // buffer is allocated by WebView2 and freed by take_pwstr.
            unsafe {
                let mut uri = PWSTR::null();
                args.Uri(&mut uri)?;
                let uri = take_pwstr(uri);
                if handler(&uri) == NavigationDecision::Cancel {
                    args.SetCancel(true)?;
                }
            }
            Ok(())
        }));

        let mut token = 0;
        // SAFETY: self.0 is a valid surface; token is a valid out pointer.
        unsafe { self.0.add_NavigationStarting(&event_handler, &mut token) }
            .map_err(|e| platform_error(&e))?;
        Ok(EventToken(token))
    }

    #[allow(unsafe_code)]
    fn remove_navigation_starting(&self, token: EventToken) -> Result<()> {
        // SAFETY: self.0 is a valid surface.
        unsafe { self.0.remove_NavigationStarting(token.0) }.map_err(|e| platform_error(&e))
    }

    #[allow(unsafe_code)]
    fn add_web_message_received(&self, handler: WebMessageHandler) -> Result<EventToken> {
        let event_handler = WebMessageReceivedEventHandler::create(Box::new(move |_, args| {
            let Some(args) = args else {
                return Ok(());
            };
            // SAFETY: args is valid for the duration of the callback; the
            // message buffer is freed by take_pwstr.
            unsafe {
                let mut message = PWSTR::null();
                args.WebMessageAsJson(&mut message)?;
                handler(&take_pwstr(message));
            }
            Ok(())
        }));

        let mut token = 0;
        // SAFETY: self.0 is a valid surface; token is a valid out pointer.
        unsafe { self.0.add_WebMessageReceived(&event_handler, &mut token) }
            .map_err(|e| platform_error(&e))?;
        Ok(EventToken(token))
    }

    #[allow(unsafe_code)]
    fn remove_web_message_received(&self, token: EventToken) -> Result<()> {
        // SAFETY: self.0 is a valid surface.
        unsafe { self.0.remove_WebMessageReceived(token.0) }.map_err(|e| platform_error(&e))
    }

    #[allow(unsafe_code)]
    fn post_web_message_json(&self, json: &str) -> Result<()> {
        let json = HSTRING::from(json);
        // SAFETY: self.0 is a valid surface and `json` outlives the call.
        unsafe { self.0.PostWebMessageAsJson(&json) }.map_err(|e| platform_error(&e))
    }
}
