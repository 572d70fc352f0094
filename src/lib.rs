pub mod config;
pub mod directory;
pub mod error;
pub mod map;
pub mod models;
pub mod render;
pub mod session;
pub mod store;

pub use config::Config;
pub use directory::ReviewDirectory;
pub use error::{DirectoryError, ValidationError};
pub use map::{FixedLocation, Geolocator, MapEvent, MapSurface, NoGeolocation};
pub use models::*;
pub use render::Projection;
pub use session::Session;
pub use store::{RemoteStore, SupabaseStore};
