pub mod credentials_loader;

pub use credentials_loader::{load_credentials, parse_credentials};
