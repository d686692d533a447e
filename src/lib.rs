pub mod api;
pub mod http;
pub mod navigation;
pub mod redact;
pub mod settings;
pub mod state;
pub mod types;

pub use http::{ApiClient, ApiError, ApiRequest, RefreshError};
pub use navigation::{NavigationBus, NavigationEvent, Navigator, NoopNavigator};
pub use settings::Settings;
pub use state::{SecretStore, TokenManager};
