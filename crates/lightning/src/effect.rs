use crate::driver::AnimationDriver;
use crate::error::SetupError;
use crate::gpu::GpuApi;
use crate::params::{LightningParams, SharedParams};
use crate::runtime::{Clock, Host};
use crate::types::{DriverState, LoopHandle, RebuildPolicy, ViewportSize};

/// The host-side owner of an [`AnimationDriver`].
///
/// Mounts a driver on a surface, routes frame and resize callbacks to it and
/// reacts to parameter changes according to its [`RebuildPolicy`].
pub struct LightningEffect<G: GpuApi, C: Clock + Clone> {
    policy: RebuildPolicy,
    params: SharedParams,
    clock: C,
    driver: Option<AnimationDriver<G, C>>,
    rebuilds: u64,
}

impl<G: GpuApi, C: Clock + Clone> LightningEffect<G, C> {
    pub fn new(params: LightningParams, clock: C, policy: RebuildPolicy) -> Self {
        Self {
            policy,
            params: SharedParams::new(params),
            clock,
            driver: None,
            rebuilds: 0,
        }
    }

    pub fn policy(&self) -> RebuildPolicy {
        self.policy
    }

    pub fn params(&self) -> LightningParams {
        self.params.get()
    }

    pub fn driver(&self) -> Option<&AnimationDriver<G, C>> {
        self.driver.as_ref()
    }

    /// State of the mounted driver, `None` when unmounted.
    pub fn state(&self) -> Option<DriverState> {
        self.driver.as_ref().map(AnimationDriver::state)
    }

    /// Number of times a parameter change rebuilt the pipeline.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Builds a fresh driver and starts its loop, disposing any previous one.
    pub fn mount<H>(&mut self, host: &mut H) -> Result<(), SetupError>
    where
        H: Host<Gpu = G>,
    {
        self.unmount(host);
        let driver = self
            .driver
            .insert(AnimationDriver::new(self.params.clone(), self.clock.clone()));
        driver.mount(host)
    }

    /// Applies new parameter values.
    ///
    /// Values bitwise identical to the current ones are ignored. Returns
    /// whether anything changed.
    pub fn set_params<H>(
        &mut self,
        host: &mut H,
        params: LightningParams,
    ) -> Result<bool, SetupError>
    where
        H: Host<Gpu = G>,
    {
        if params.same_as(&self.params.get()) {
            return Ok(false);
        }
        self.params.set(params);

        match self.policy {
            RebuildPolicy::InPlace => {
                tracing::trace!(?params, "parameters updated in place");
            }
            RebuildPolicy::Rebuild => {
                if self.driver.is_some() {
                    tracing::debug!(?params, "parameters changed; rebuilding pipeline");
                    self.rebuilds += 1;
                    self.mount(host)?;
                }
            }
        }
        Ok(true)
    }

    pub fn on_frame<H>(&mut self, host: &mut H, handle: LoopHandle) -> bool
    where
        H: Host<Gpu = G>,
    {
        match self.driver.as_mut() {
            Some(driver) => driver.on_frame(host, handle),
            None => false,
        }
    }

    pub fn on_resize<H>(&mut self, host: &mut H) -> Option<ViewportSize>
    where
        H: Host<Gpu = G>,
    {
        self.driver.as_mut()?.on_resize(host)
    }

    /// Disposes the mounted driver, if any.
    pub fn unmount<H>(&mut self, host: &mut H)
    where
        H: Host<Gpu = G>,
    {
        if let Some(mut driver) = self.driver.take() {
            driver.dispose(host);
        }
    }
}
