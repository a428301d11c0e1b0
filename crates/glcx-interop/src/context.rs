use std::rc::Rc;

use crate::config::{InteropConfig, RegistrationPolicy};
use crate::driver::{ComputeStatus, Driver, DriverCall, ResourceHandle};
use crate::error::{InteropError, Result};

/// A driver plus the configuration every resource created from it follows.
///
/// Resources keep an `Rc` to their context so they can release driver objects on drop.
#[derive(Debug)]
pub struct InteropContext<D: Driver> {
    driver: D,
    config: InteropConfig,
}

impl<D: Driver> InteropContext<D> {
    pub fn new(driver: D, config: InteropConfig) -> Rc<Self> {
        Rc::new(Self { driver, config })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &InteropConfig {
        &self.config
    }

    /// Apply the registration policy to a failed `register_*` call.
    #[track_caller]
    pub(crate) fn registration_failed(&self, call: DriverCall, status: ComputeStatus) -> Result<()> {
        match self.config.registration_policy {
            RegistrationPolicy::Propagate => Err(InteropError::driver(call, status)),
            RegistrationPolicy::Report => {
                tracing::warn!(
                    call = call.as_str(),
                    code = status.code(),
                    "{call} failed, resource stays unregistered: {}",
                    status.description()
                );
                Ok(())
            }
        }
    }

    /// Best-effort unregister. Failures are logged and otherwise ignored.
    pub(crate) fn release_registration(&self, handle: ResourceHandle) {
        match self.driver.unregister(handle) {
            Ok(()) => tracing::debug!(?handle, "unregistered compute resource"),
            Err(status) => tracing::warn!(
                ?handle,
                code = status.code(),
                "ignoring failed unregister: {}",
                status.description()
            ),
        }
    }
}
