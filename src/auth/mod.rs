// Authentication module
// GitHub identity, credential storage and resolution, and the device flow

pub mod credentials;
pub mod device_flow;
pub mod github;
pub mod manager;
pub mod resolver;
pub mod types;

pub use credentials::CredentialStore;
pub use device_flow::{Clock, DeviceFlow, DeviceFlowState, TokioClock};
pub use github::GitHubClient;
pub use manager::AuthManager;
pub use resolver::{resolve, CredentialSource};
pub use types::{Credentials, DeviceAuthorization};
