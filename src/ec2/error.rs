//! EC2 error classification.
//!
//! Classification uses the service error code exposed through
//! `ProvideErrorMetadata` rather than matching on message text.

use std::error::Error as StdError;
use std::fmt::Debug;

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::provider::{ProviderError, ProviderErrorKind};

const CONFLICT_CODES: &[&str] = &[
    "InvalidKeyPair.Duplicate",
    "InvalidGroup.Duplicate",
    "InvalidPermission.Duplicate",
];

const NOT_FOUND_CODES: &[&str] = &[
    "InvalidKeyPair.NotFound",
    "InvalidGroup.NotFound",
    "InvalidInstanceID.NotFound",
    "InvalidAMIID.NotFound",
    "InvalidVpcID.NotFound",
];

const CAPACITY_CODES: &[&str] = &[
    "InsufficientInstanceCapacity",
    "InsufficientCapacity",
    "InstanceLimitExceeded",
    "VcpuLimitExceeded",
    "Unsupported",
];

const PERMISSION_CODES: &[&str] = &[
    "UnauthorizedOperation",
    "AuthFailure",
    "OptInRequired",
    "Blocked",
    "PendingVerification",
];

const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalError",
    "ServiceUnavailable",
    "Unavailable",
];

/// Maps an EC2 error code to a provider error kind.
pub(crate) fn kind_for_code(code: &str) -> ProviderErrorKind {
    if CONFLICT_CODES.contains(&code) {
        ProviderErrorKind::Conflict
    } else if NOT_FOUND_CODES.contains(&code) {
        ProviderErrorKind::NotFound
    } else if CAPACITY_CODES.contains(&code) {
        ProviderErrorKind::Capacity
    } else if PERMISSION_CODES.contains(&code) {
        ProviderErrorKind::Permission
    } else if TRANSIENT_CODES.contains(&code) {
        ProviderErrorKind::Transient
    } else {
        ProviderErrorKind::Other
    }
}

/// Converts an SDK failure into a classified [`ProviderError`].
pub(crate) fn classify<E, R>(operation: &'static str, err: &SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: Debug,
{
    let context = DisplayErrorContext(err).to_string();
    if matches!(err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) {
        return ProviderError::new(ProviderErrorKind::Transient, operation, context);
    }
    let message = err.message().map_or(context, str::to_owned);
    match err.code() {
        Some(code) => ProviderError::new(kind_for_code(code), operation, message).with_code(code),
        None => ProviderError::new(ProviderErrorKind::Other, operation, message),
    }
}
