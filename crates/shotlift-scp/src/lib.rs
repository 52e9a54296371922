pub mod scp;

pub use scp::backend::ScpBackend;
pub use scp::tool::{OpenSshTool, ScpTool};
