mod lifecycle;
mod registry;
mod state;

pub use lifecycle::SessionLifecycleManager;
pub use registry::{SessionId, SessionRegistry};
pub use state::ChatState;
