use std::sync::Arc;

use crate::core::{Application, config::AppConfig};
use crate::lifecycle::{MainRef, ResourcesRef};
use crate::subscribers::Subscribe;

/// Builder for constructing an [`Application`] with optional collaborators.
pub struct ApplicationBuilder {
    cfg: AppConfig,
    main: Option<MainRef>,
    resources: Option<ResourcesRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ApplicationBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: AppConfig) -> Self {
        Self {
            cfg,
            main: None,
            resources: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the main function.
    ///
    /// Without one, [`Application::run`] fails with
    /// [`AppError::MainOmitted`](crate::AppError::MainOmitted).
    pub fn with_main(mut self, main: MainRef) -> Self {
        self.main = Some(main);
        self
    }

    /// Sets the resources collaborator (typically a [`ServiceKeeper`](crate::ServiceKeeper)).
    pub fn with_resources(mut self, resources: ResourcesRef) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (init, halt, shutdown, service failures)
    /// through dedicated workers while the application runs.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the application. Needs no runtime; workers start in [`Application::run`].
    pub fn build(self) -> Application {
        Application::new_internal(self.cfg, self.main, self.resources, self.subscribers)
    }
}
