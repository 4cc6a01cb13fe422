pub mod credentials;
pub mod generation;
pub mod loaders;
pub mod question;
pub mod session;

pub use credentials::{ProviderCredentialSet, ProviderId};
pub use generation::{GenerationAction, GenerationConfig, OutputShape, SourceDescriptor, SourceKind};
pub use loaders::{load_credentials, parse_credentials};
pub use question::{Difficulty, GeneratedQuestion, InvalidQuestion, DEFAULT_MARKS};
pub use session::{GenerationSession, Stage};
