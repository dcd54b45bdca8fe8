use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub const UNEXPECTED: i32 = 1;
pub const STORE_UNAVAILABLE: i32 = 2;
pub const INVALID_STATE: i32 = 100;
pub const INVALID_ARGUMENT: i32 = 101;
pub const CONFLICT: i32 = 102;
pub const NOT_FOUND: i32 = 103;

// postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    pub fn is_invalid_state_error(&self) -> bool {
        self.code == INVALID_STATE
    }

    pub fn is_invalid_argument_error(&self) -> bool {
        self.code == INVALID_ARGUMENT
    }

    pub fn is_conflict_error(&self) -> bool {
        self.code == CONFLICT
    }

    pub fn is_not_found_error(&self) -> bool {
        self.code == NOT_FOUND
    }

    pub fn is_store_unavailable_error(&self) -> bool {
        self.code == STORE_UNAVAILABLE
    }

    fn status(&self) -> StatusCode {
        match self.code {
            STORE_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
            INVALID_ARGUMENT => StatusCode::BAD_REQUEST,
            NOT_FOUND => StatusCode::NOT_FOUND,
            INVALID_STATE | CONFLICT => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub fn unexpected_error(message: impl Into<String>) -> Error {
    Error {
        code: UNEXPECTED,
        message: message.into(),
    }
}

pub fn store_unavailable_error(message: impl Into<String>) -> Error {
    Error {
        code: STORE_UNAVAILABLE,
        message: message.into(),
    }
}

pub fn invalid_state_error(message: impl Into<String>) -> Error {
    Error {
        code: INVALID_STATE,
        message: message.into(),
    }
}

pub fn invalid_argument_error(message: impl Into<String>) -> Error {
    Error {
        code: INVALID_ARGUMENT,
        message: message.into(),
    }
}

pub fn conflict_error(message: impl Into<String>) -> Error {
    Error {
        code: CONFLICT,
        message: message.into(),
    }
}

pub fn not_found_error(message: impl Into<String>) -> Error {
    Error {
        code: NOT_FOUND,
        message: message.into(),
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    return conflict_error(db_err.message().to_string());
                }

                tracing::error!(error = %db_err, "database error");
                unexpected_error("database error")
            }
            sqlx::Error::RowNotFound => not_found_error("row not found"),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed => {
                tracing::error!(error = %err, "store unavailable");
                store_unavailable_error("store unavailable")
            }
            err => {
                tracing::error!(error = %err, "unexpected database error");
                unexpected_error("database error")
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.code {
            1..=99 => "Internal Server Error",
            _ => self.message.as_str(),
        };

        let body = Json(json!({
            "code": self.code,
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[test]
fn error_codes_map_to_http_status() {
    assert_eq!(
        not_found_error("missing").status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        invalid_argument_error("bad").status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        invalid_state_error("terminal").status(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        store_unavailable_error("down").status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        unexpected_error("boom").status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn row_not_found_is_not_found() {
    let err: Error = sqlx::Error::RowNotFound.into();
    assert!(err.is_not_found_error());

    let err: Error = sqlx::Error::PoolTimedOut.into();
    assert!(err.is_store_unavailable_error());
}
