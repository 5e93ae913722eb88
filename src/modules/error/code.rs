// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use poem::http::StatusCode;
use poem_openapi::Enum;

#[derive(Copy, Clone, Debug, Enum, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCode {
    // Client-side errors (10000–10999)
    InvalidParameter = 10000,
    MissingConfiguration = 10010,
    MessageParseFailed = 10020,
    MethodNotAllowed = 10030,

    // Authentication and authorization errors (20000–20999)
    PermissionDenied = 20000,
    CredentialRejected = 20010,
    CredentialTampered = 20020,
    MissingRefreshToken = 20030,
    AccountDisabled = 20040,

    // Resource errors (30000–30999)
    ResourceNotFound = 30000,
    AlreadyExists = 30010,
    TooManyRequest = 30020,

    // Network connection errors (40000–40999)
    NetworkError = 40000,
    ConnectionTimeout = 40010,
    ConnectionPoolTimeout = 40020,
    ProviderUnavailable = 40030,

    // Mail provider errors (50000–50999)
    ImapCommandFailed = 50000,
    ImapAuthenticationFailed = 50010,
    ImapUnexpectedResult = 50020,
    GraphApiCallFailed = 50030,
    GraphUnexpectedPayload = 50040,

    // Internal system errors (70000–70999)
    InternalError = 70000,
    UnhandledPoemError = 70010,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidParameter
            | ErrorCode::MissingConfiguration
            | ErrorCode::MessageParseFailed
            | ErrorCode::CredentialRejected => StatusCode::BAD_REQUEST,
            ErrorCode::PermissionDenied => StatusCode::UNAUTHORIZED,
            ErrorCode::AccountDisabled => StatusCode::FORBIDDEN,
            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::TooManyRequest => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::CredentialTampered
            | ErrorCode::MissingRefreshToken
            | ErrorCode::NetworkError
            | ErrorCode::ConnectionTimeout
            | ErrorCode::ConnectionPoolTimeout
            | ErrorCode::ProviderUnavailable
            | ErrorCode::ImapCommandFailed
            | ErrorCode::ImapAuthenticationFailed
            | ErrorCode::ImapUnexpectedResult
            | ErrorCode::GraphApiCallFailed
            | ErrorCode::GraphUnexpectedPayload
            | ErrorCode::InternalError
            | ErrorCode::UnhandledPoemError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a job failing with this code should be retried by the queue.
    /// Credential problems need user intervention; retrying cannot fix them.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            ErrorCode::CredentialRejected
                | ErrorCode::CredentialTampered
                | ErrorCode::ImapAuthenticationFailed
                | ErrorCode::MissingRefreshToken
                | ErrorCode::AccountDisabled
                | ErrorCode::InvalidParameter
                | ErrorCode::MissingConfiguration
        )
    }
}
