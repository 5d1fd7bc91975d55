/// Classification-and-dispatch engine for the wellroute request router.
///
/// - **Classifier** (`classifier`): scored pattern rules with priority boosts and fallbacks
/// - **ScopeGuard** (`scope`): active-collection gate producing approval prompts
/// - **Router** (`router`): override vs. classifier, scope gate, dispatch, envelope
/// - **Agents** (`agents`): handlers that reach backends through the invocation proxy
/// - **Collections** (`collections`): in-memory collection store
pub mod agents;
pub mod classifier;
pub mod collections;
pub mod router;
pub mod scope;

pub use classifier::Classifier;
pub use router::Router;
pub use scope::ScopeGuard;
