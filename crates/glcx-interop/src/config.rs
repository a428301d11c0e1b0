use crate::driver::Stream;

/// What to do when the compute driver refuses to register a resource.
///
/// Applies to buffers and images alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationPolicy {
    /// Return the driver error to the caller.
    #[default]
    Propagate,
    /// Log a warning and leave the resource unregistered. Compute-side use of the
    /// resource then fails with [`crate::InteropError::NotRegistered`].
    Report,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteropConfig {
    pub registration_policy: RegistrationPolicy,
    /// Stream that map/unmap calls are issued on.
    pub stream: Stream,
}

impl InteropConfig {
    pub fn with_registration_policy(mut self, policy: RegistrationPolicy) -> Self {
        self.registration_policy = policy;
        self
    }

    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }
}
