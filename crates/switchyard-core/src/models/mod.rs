pub mod batch;
pub mod file;
pub mod provider;

pub use batch::{BatchFileError, BatchProgress, UploadBatchResult};
pub use file::{CanonicalFileRecord, FileCategory, UploadFile};
pub use provider::ProviderInfo;
