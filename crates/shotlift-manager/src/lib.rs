pub mod manager;

pub use manager::factory::{BackendFactory, DefaultBackendFactory};
pub use manager::history::HistoryStack;
pub use manager::orchestrator::{UploadManager, UploadTicket, IMAGE_EXTENSIONS};
pub use manager::sink::{LogSink, NotificationSink};
