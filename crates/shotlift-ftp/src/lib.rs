pub mod ftp;

pub use ftp::backend::FtpBackend;
pub use ftp::client::FtpClient;
pub use ftp::session::{FtpConnector, FtpSession, TcpConnector};
