use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize the payment gateway client: {0}")]
    Initialization(String),
    #[error("The payment gateway could not be reached: {0}")]
    Unavailable(String),
    #[error("The payment gateway rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("Could not deserialize the gateway response: {0}")]
    JsonError(String),
    #[error("Webhook signature verification failed: {0}")]
    InvalidSignature(String),
    #[error("Malformed payment event: {0}")]
    MalformedEvent(String),
}

impl GatewayError {
    /// `true` for failures where trying again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
