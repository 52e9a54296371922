pub mod sftp;

pub use sftp::backend::SftpBackend;
pub use sftp::remote::{RemoteFs, SftpConnector, Ssh2Connector};
