pub mod errors;
pub mod paths;
pub mod session;
pub mod session_store;

pub use errors::StoreError;
pub use paths::StoreLayout;
pub use session::SessionId;
pub use session_store::SessionStore;
