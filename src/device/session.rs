//! # Device Session
//!
//! Per-controller state and the attach/detach lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> Validated -> Active -> Closing -> Closed
//! ```
//!
//! A [`DeviceSession`] value only exists once the report layout has been
//! validated and the controller has acknowledged the zeroed report, so there
//! is no partially constructed session to guard against. The other states are
//! steps inside `attach` and `detach` and only show up in the log.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{ConnectMask, HidTransport, InputLayer};
use crate::error::{Result, TransportError, XiaomiFfError};
use crate::ff::{DispatchQueue, DispatchStats, EffectTranslator, RumbleEffect, RumbleHandler};
use crate::report::{validator, ReportDescriptor};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Validated,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Validated => "validated",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Tunables for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    /// Write a zeroed report after the dispatch worker is joined
    pub zero_on_detach: bool,
}

/// One attached controller
///
/// Owns the transport handle, the shared status report and the dispatch
/// worker. The report and transport are reference counted, so the worker's
/// in-flight run keeps them alive even if the session is dropped without
/// [`detach`](Self::detach).
pub struct DeviceSession<T: HidTransport, I: InputLayer> {
    transport: Arc<T>,
    report: Arc<ReportDescriptor>,
    translator: Arc<EffectTranslator>,
    dispatch: DispatchQueue,
    input: I,
    options: SessionOptions,
}

impl<T: HidTransport, I: InputLayer> fmt::Debug for DeviceSession<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("report", &self.report)
            .field("state", &SessionState::Active)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T: HidTransport, I: InputLayer> DeviceSession<T, I> {
    /// Attach to a controller
    ///
    /// Starts the transport without the generic force-feedback wiring,
    /// validates the status report, turns the motors off with a blocking
    /// write, registers the rumble callback and arms the dispatch worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `TransportStartFailure`: the transport refused to start
    /// - `NoFeatureReport` / `UnexpectedReportLayout`: incompatible device
    /// - `AllocationFailure`: the report buffer could not be reserved
    /// - `Transport`: report introspection or the zeroing write failed
    /// - `CapabilityRegistrationFailure`: the input layer refused the callback
    ///
    /// On any error after the transport started, it is stopped again and no
    /// session is returned.
    pub async fn attach(transport: T, mut input: I, options: SessionOptions) -> Result<Self> {
        let transport = Arc::new(transport);
        debug!("Attaching ({})", SessionState::Uninitialized);

        run_blocking(&transport, |t| t.start(ConnectMask::DEFAULT.difference(ConnectMask::FF)))
            .await
            .map_err(|e| {
                error!("hw start failed: {}", e);
                XiaomiFfError::TransportStartFailure(e)
            })?;

        match Self::activate(&transport, &mut input).await {
            Ok((report, translator, dispatch)) => {
                info!(
                    "Rumble enabled on status report 0x{:02x}",
                    report.report_id()
                );
                Ok(Self {
                    transport,
                    report,
                    translator,
                    dispatch,
                    input,
                    options,
                })
            }
            Err(e) => {
                let _ = run_blocking(&transport, |t| {
                    t.stop();
                    Ok(())
                })
                .await;
                Err(e)
            }
        }
    }

    async fn activate(
        transport: &Arc<T>,
        input: &mut I,
    ) -> Result<(Arc<ReportDescriptor>, Arc<EffectTranslator>, DispatchQueue)> {
        let reports = run_blocking(transport, |t| t.feature_reports()).await?;
        let report = Arc::new(validator::validate(&reports)?);
        debug!("Attaching ({})", SessionState::Validated);

        // Reset rumble before anything can play
        report.clear();
        let zeroed = Arc::clone(&report);
        run_blocking(transport, move |t| {
            t.set_report(zeroed.report_id(), &zeroed.current_bytes())?;
            t.wait();
            Ok(())
        })
        .await?;

        let mut dispatch = DispatchQueue::new();
        let translator = Arc::new(EffectTranslator::new(Arc::clone(&report), dispatch.handle()));

        let handler: Arc<dyn RumbleHandler> = translator.clone();
        input
            .register_rumble(handler)
            .map_err(XiaomiFfError::CapabilityRegistrationFailure)?;

        dispatch.arm(Arc::clone(transport), Arc::clone(&report));
        Ok((report, translator, dispatch))
    }

    /// Detach from the controller
    ///
    /// Unregisters from the input layer, then cancels the dispatch worker
    /// and waits for an executing write before releasing the transport.
    /// Never fails.
    pub async fn detach(mut self) {
        debug!("Detaching ({})", SessionState::Closing);

        self.input.unregister();
        self.dispatch.cancel_and_join().await;

        if self.options.zero_on_detach {
            self.report.clear();
            let report = Arc::clone(&self.report);
            if let Err(e) = run_blocking(&self.transport, move |t| {
                t.set_report(report.report_id(), &report.current_bytes())
            })
            .await
            {
                warn!("Failed to stop motors on detach: {}", e);
            }
        }

        let _ = run_blocking(&self.transport, |t| {
            t.close();
            t.stop();
            Ok(())
        })
        .await;

        let stats = self.dispatch.stats();
        info!(
            "Detached ({}: {} writes sent, {} failed)",
            SessionState::Closed,
            stats.completed,
            stats.failed
        );
    }

    /// Forward a rumble effect through this session's callback
    pub fn play(&self, effect: RumbleEffect) {
        self.translator.play(effect);
    }

    /// Live status report
    pub fn report(&self) -> &ReportDescriptor {
        &self.report
    }

    /// Always `Active`: a session is consumed by [`detach`](Self::detach)
    pub fn state(&self) -> SessionState {
        SessionState::Active
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatch.stats()
    }

    pub fn input(&self) -> &I {
        &self.input
    }
}

/// Run a blocking transport call on the blocking pool
async fn run_blocking<T, R, F>(transport: &Arc<T>, f: F) -> std::result::Result<R, TransportError>
where
    T: HidTransport,
    R: Send + 'static,
    F: FnOnce(&T) -> std::result::Result<R, TransportError> + Send + 'static,
{
    let transport = Arc::clone(transport);
    tokio::task::spawn_blocking(move || f(&transport))
        .await
        .map_err(|e| TransportError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}
