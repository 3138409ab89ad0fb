use engine::{FlowError, deeplink::DeepLinkError, voucher::ExportError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("client error: {0}")]
    Client(#[from] client::ClientError),
    #[error("{0}")]
    DeepLink(#[from] DeepLinkError),
    #[error("{0}")]
    Flow(#[from] FlowError),
    #[error("{0}")]
    Export(#[from] ExportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("input closed")]
    InputClosed,
}
