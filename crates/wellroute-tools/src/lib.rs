/// Backend access for the wellroute request router.
///
/// - **Proxy**: validated, cached, logged invocation of downstream compute backends
/// - **HTTP backend**: `BackendClient` over a function gateway, resolving logical
///   backend names to deployed function names from config
pub mod http_backend;
pub mod proxy;

pub use http_backend::HttpBackendClient;
pub use proxy::InvocationProxy;
