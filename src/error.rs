use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // Remote store / auth provider errors
    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Store returned {status}: {message}")]
    Store { status: u16, message: String },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // Input errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    // Configuration errors
    #[error("Invalid config: {message}")]
    Config { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        AppError::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        AppError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Message shown in the error banner of the views.
    ///
    /// Validation and auth messages are already written for the user, the
    /// rest collapse into a generic notice so store internals never leak.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation { message } | AppError::Auth { message } => message.clone(),
            AppError::PermissionDenied { .. } => "この操作を行う権限がありません。".to_string(),
            AppError::NotFound { .. } => "対象のデータが見つかりませんでした。".to_string(),
            AppError::Transport { .. } | AppError::Store { .. } | AppError::Decode { .. } => {
                "サーバーとの通信に失敗しました。時間をおいて再度お試しください。".to_string()
            }
            AppError::Config { .. } | AppError::Internal { .. } => {
                "エラーが発生しました。管理者に連絡してください。".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if err.is_decode() {
            AppError::Decode {
                endpoint,
                message: err.to_string(),
            }
        } else {
            AppError::Transport {
                endpoint,
                message: err.to_string(),
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_shown_verbatim() {
        let err = AppError::validation("タイトルと場所を入力してください");
        assert_eq!(err.user_message(), "タイトルと場所を入力してください");
    }

    #[test]
    fn test_store_errors_are_not_leaked() {
        let err = AppError::Store {
            status: 500,
            message: "relation \"profiles\" does not exist".to_string(),
        };
        assert!(!err.user_message().contains("profiles"));
    }
}
