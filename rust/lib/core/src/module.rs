use axum::Router;

/// A service module that contributes HTTP routes.
///
/// Each module implements this trait to register its API endpoints. The
/// binary entry point collects all modules and merges their routers into
/// the application router; a module nests its own path prefix so that
/// middleware layered inside it sees full request paths.
pub trait Module: Send + Sync {
    /// Module name, used for logging.
    fn name(&self) -> &str;

    /// Return the module's routes, mounted at the application root.
    fn routes(&self) -> Router;
}
