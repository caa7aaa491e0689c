use thiserror::Error;

/// 应用错误
#[derive(Error, Debug)]
pub enum AppError {
    /// 业务错误
    #[error("业务错误: {0}")]
    BizError(String),

    /// 数据库错误
    #[error("数据库错误: {0}")]
    DbError(String),

    /// 行情接口错误
    #[error("行情接口错误: {0}")]
    QuoteApiError(String),

    /// 文本生成接口错误
    #[error("AI接口错误: {0}")]
    AiApiError(String),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

/// 把任何错误转换为AppError类型
pub fn to_err<E: std::error::Error + Send + Sync + 'static>(err: E) -> AppError {
    AppError::Unknown(err.to_string())
}

impl From<rbatis::rbdc::Error> for AppError {
    fn from(err: rbatis::rbdc::Error) -> Self {
        AppError::DbError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::QuoteApiError(err.to_string())
    }
}
