use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use market_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("{0} is not a valid order status")]
    InvalidStatus(String),
    #[error("Webhook signature could not be verified. {0}")]
    InvalidSignature(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error(transparent)]
    OrderFlow(#[from] OrderFlowError),
}

impl ServerError {
    /// The machine-readable error code that accompanies every error response.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) => "ValidationError",
            Self::InvalidStatus(_) => "InvalidStatus",
            Self::InvalidSignature(_) => "InvalidSignature",
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => "Forbidden",
                _ => "NotAuthenticated",
            },
            Self::OrderFlow(e) => e.code(),
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) |
            Self::Unspecified(_) => "InternalError",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::NotAuthenticated => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::TokenCreation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::OrderFlow(e) => order_flow_status(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!("💻️ Request failed. {self}");
            "An internal error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message, "code": self.code() }).to_string())
    }
}

fn order_flow_status(e: &OrderFlowError) -> StatusCode {
    use OrderFlowError::*;
    match e {
        Forbidden(_) => StatusCode::FORBIDDEN,
        OrderNotFound(_) | ProductNotFound(_) | FaultNotFound(_) => StatusCode::NOT_FOUND,
        SellerMismatch { .. } | EmptyOrder | InvalidQuantity { .. } | MissingField(_) | AmountOverflow(_) => {
            StatusCode::BAD_REQUEST
        },
        OutOfStock { .. } | IllegalTransition(_) | NotPayable { .. } | Conflict(_) | PaymentAlreadyInitiated(_) => {
            StatusCode::CONFLICT
        },
        GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GatewayFailure(_) => StatusCode::BAD_GATEWAY,
        DatabaseError(_) | InconsistentTotals(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided. Supply one in the Authorization header.")]
    NotAuthenticated,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Access token has expired.")]
    TokenExpired,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Could not create an access token. {0}")]
    TokenCreation(String),
}
