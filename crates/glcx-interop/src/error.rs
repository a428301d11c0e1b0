use std::panic::Location;

use thiserror::Error;

use crate::driver::{ComputeStatus, DriverCall, RenderError};

pub type Result<T> = std::result::Result<T, InteropError>;

/// Unified error type for graphics/compute interop operations.
#[derive(Debug, Error)]
pub enum InteropError {
    /// A compute driver call returned a non-success status.
    ///
    /// `location` is the call site that issued the driver call.
    #[error("{call} failed at {}:{}: {status}", .location.file(), .location.line())]
    DriverCallFailed {
        call: DriverCall,
        status: ComputeStatus,
        location: &'static Location<'static>,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("resource is already mapped")]
    AlreadyMapped,

    #[error("resource is not mapped")]
    NotMapped,

    #[error("resource is not registered with the compute driver")]
    NotRegistered,

    #[error("resource has no rendering-side allocation")]
    NotAllocated,

    #[error("integer overflow while computing resource size")]
    SizeOverflow,
}

impl InteropError {
    /// Build a [`InteropError::DriverCallFailed`] for the caller's location and log it.
    #[track_caller]
    pub fn driver(call: DriverCall, status: ComputeStatus) -> Self {
        let location = Location::caller();
        tracing::error!(
            call = call.as_str(),
            code = status.code(),
            file = location.file(),
            line = location.line(),
            "compute driver call failed: {}",
            status.description()
        );
        Self::DriverCallFailed {
            call,
            status,
            location,
        }
    }

    /// Driver status carried by this error, if it came from a driver call.
    pub fn status(&self) -> Option<ComputeStatus> {
        match self {
            Self::DriverCallFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Converts raw driver results into [`InteropError`]s tagged with the call site.
pub trait CheckStatus<T> {
    fn check(self, call: DriverCall) -> Result<T>;
}

impl<T> CheckStatus<T> for std::result::Result<T, ComputeStatus> {
    #[track_caller]
    fn check(self, call: DriverCall) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(status) => Err(InteropError::driver(call, status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_captures_the_calling_line() {
        let expected_line = line!() + 1;
        let err = Err::<(), _>(ComputeStatus::NotMapped).check(DriverCall::Unmap).unwrap_err();
        match err {
            InteropError::DriverCallFailed {
                call,
                status,
                location,
            } => {
                assert_eq!(call, DriverCall::Unmap);
                assert_eq!(status, ComputeStatus::NotMapped);
                assert_eq!(location.file(), file!());
                assert_eq!(location.line(), expected_line);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn driver_error_message_names_call_and_status() {
        let err = InteropError::driver(DriverCall::Map, ComputeStatus::InvalidResourceHandle);
        let msg = err.to_string();
        assert!(msg.starts_with("map failed at "), "{msg}");
        assert!(msg.ends_with("invalid resource handle (code 400)"), "{msg}");
        assert_eq!(err.status(), Some(ComputeStatus::InvalidResourceHandle));
    }

    #[test]
    fn success_passes_through() {
        let value = Ok::<_, ComputeStatus>(5u32).check(DriverCall::Map).unwrap();
        assert_eq!(value, 5);
    }
}
