use thiserror::Error;

/// Ошибки обращения к каталогам (Sentos, Shopify)
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Сеть, таймаут, обрыв соединения
    #[error("Transport error: {0}")]
    Transport(String),

    /// Неуспешный HTTP статус
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Структурированные ошибки в ответе API (GraphQL errors / userErrors)
    #[error("Remote API error: {0}")]
    RemoteApi(String),

    /// HTTP 429, ожидания по Retry-After исчерпаны
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// GraphQL ответил THROTTLED, запрос можно повторить
    #[error("Request throttled: {0}")]
    Throttled(String),

    /// Не хватает обязательных настроек или входных данных
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Ошибка, после которой прогон продолжать нельзя
    #[error("Critical run error: {0}")]
    Critical(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl CatalogError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CatalogError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Ошибка THROTTLED от Shopify GraphQL
    pub fn is_throttled(&self) -> bool {
        matches!(self, CatalogError::Throttled(_))
    }

    /// Поднять ошибку до уровня, прерывающего весь прогон
    pub fn into_critical(self, context: &str) -> CatalogError {
        match self {
            CatalogError::Critical(_) | CatalogError::Cancelled => self,
            other => CatalogError::Critical(format!("{}: {}", context, other)),
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CatalogError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            CatalogError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            CatalogError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Parse(err.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_critical_wraps_context() {
        let err = CatalogError::Transport("connection reset".into()).into_critical("Shopify cache");
        assert_eq!(
            err.to_string(),
            "Critical run error: Shopify cache: Transport error: connection reset"
        );
    }

    #[test]
    fn test_http_status() {
        let err = CatalogError::Http {
            status: 429,
            body: String::new(),
        };
        assert_eq!(err.http_status(), Some(429));
        assert_eq!(CatalogError::Cancelled.http_status(), None);
        assert!(CatalogError::Throttled("THROTTLED".into()).is_throttled());
        assert!(!CatalogError::RateLimit("HTTP 429 after 5 waits".into()).is_throttled());
    }
}
