//! Staged creation of environment, controller and surface.

use std::fmt;

use raw_window_handle::RawWindowHandle;

use crate::platform::{Controller, Platform};
use crate::settings::EnvironmentOptions;
use crate::Result;

/// How far initialization has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    NoEnvironment,
    EnvironmentReady,
    ControllerReady,
    SurfaceReady,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoEnvironment => "no environment",
            Self::EnvironmentReady => "environment ready",
            Self::ControllerReady => "controller ready",
            Self::SurfaceReady => "surface ready",
        };
        f.write_str(name)
    }
}

enum Stage<P: Platform> {
    NoEnvironment,
    EnvironmentReady(P::Environment),
    ControllerReady(P::Controller),
    SurfaceReady {
        controller: P::Controller,
        surface: P::Surface,
    },
}

/// Walks a platform from nothing to a usable surface, one step at a time.
pub struct Pipeline<'p, P: Platform> {
    platform: &'p P,
    options: EnvironmentOptions,
    window: RawWindowHandle,
    stage: Stage<P>,
}

impl<'p, P: Platform> Pipeline<'p, P> {
    #[must_use]
    pub fn new(platform: &'p P, options: EnvironmentOptions, window: RawWindowHandle) -> Self {
        Self {
            platform,
            options,
            window,
            stage: Stage::NoEnvironment,
        }
    }

    #[must_use]
    pub fn stage(&self) -> InitStage {
        match self.stage {
            Stage::NoEnvironment => InitStage::NoEnvironment,
            Stage::EnvironmentReady(_) => InitStage::EnvironmentReady,
            Stage::ControllerReady(_) => InitStage::ControllerReady,
            Stage::SurfaceReady { .. } => InitStage::SurfaceReady,
        }
    }

    /// Perform the next transition. A pipeline at `SurfaceReady` stays there.
    ///
    /// # Errors
    /// Returns the failure of the transition being attempted.
    pub fn advance(mut self) -> Result<Self> {
        self.stage = match self.stage {
            Stage::NoEnvironment => {
                let environment = self.platform.create_environment(&self.options)?;
                Stage::EnvironmentReady(environment)
            }
            Stage::EnvironmentReady(environment) => {
                let controller = self.platform.create_controller(&environment, self.window)?;
                Stage::ControllerReady(controller)
            }
            Stage::ControllerReady(controller) => match controller.surface() {
                Ok(surface) => Stage::SurfaceReady {
                    controller,
                    surface,
                },
                Err(e) => {
                    if let Err(close_err) = controller.close() {
                        tracing::warn!("Failed to close controller: {}", close_err);
                    }
                    return Err(e);
                }
            },
            ready @ Stage::SurfaceReady { .. } => ready,
        };
        tracing::debug!("Initialization reached: {}", self.stage());
        Ok(self)
    }

    /// Advance until the surface exists and hand out controller and surface.
    ///
    /// # Errors
    /// Returns the first failing transition.
    pub fn run(mut self) -> Result<(P::Controller, P::Surface)> {
        loop {
            if let Stage::SurfaceReady {
                controller,
                surface,
            } = self.stage
            {
                return Ok((controller, surface));
            }
            self = self.advance()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{tests::test_window, HeadlessPlatform};
    use crate::Error;

    #[test]
    fn test_stages_in_order() {
        let platform = HeadlessPlatform::new();
        let pipeline = Pipeline::new(&platform, EnvironmentOptions::default(), test_window());
        assert_eq!(pipeline.stage(), InitStage::NoEnvironment);

        let pipeline = pipeline.advance().unwrap();
        assert_eq!(pipeline.stage(), InitStage::EnvironmentReady);
        assert_eq!(platform.snapshot().environments.len(), 1);
        assert_eq!(platform.snapshot().controllers_created, 0);

        let pipeline = pipeline.advance().unwrap();
        assert_eq!(pipeline.stage(), InitStage::ControllerReady);
        assert_eq!(platform.snapshot().controllers_created, 1);

        let pipeline = pipeline.advance().unwrap();
        assert_eq!(pipeline.stage(), InitStage::SurfaceReady);

        let pipeline = pipeline.advance().unwrap();
        assert_eq!(pipeline.stage(), InitStage::SurfaceReady);
    }

    #[test]
    fn test_run_passes_options() {
        let platform = HeadlessPlatform::new();
        let options = EnvironmentOptions {
            additional_browser_arguments: "--mute-audio".to_string(),
            ..EnvironmentOptions::default()
        };
        Pipeline::new(&platform, options.clone(), test_window())
            .run()
            .unwrap();
        assert_eq!(platform.snapshot().environments, vec![options]);
    }

    #[test]
    fn test_environment_failure() {
        let platform = HeadlessPlatform::new().failing_at(InitStage::EnvironmentReady);
        let result = Pipeline::new(&platform, EnvironmentOptions::default(), test_window()).advance();
        assert!(matches!(result, Err(Error::EnvironmentCreationFailed(_))));
    }

    #[test]
    fn test_controller_failure() {
        let platform = HeadlessPlatform::new().failing_at(InitStage::ControllerReady);
        let pipeline = Pipeline::new(&platform, EnvironmentOptions::default(), test_window())
            .advance()
            .unwrap();
        assert!(matches!(
            pipeline.advance(),
            Err(Error::ControllerCreationFailed(_))
        ));
    }

    #[test]
    fn test_surface_failure() {
        let platform = HeadlessPlatform::new().failing_at(InitStage::SurfaceReady);
        let result = Pipeline::new(&platform, EnvironmentOptions::default(), test_window()).run();
        assert!(matches!(result, Err(Error::SurfaceUnavailable(_))));
        assert_eq!(platform.snapshot().controllers_created, 1);
        assert!(platform.snapshot().closed);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(InitStage::ControllerReady.to_string(), "controller ready");
    }
}
