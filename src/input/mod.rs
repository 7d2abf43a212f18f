//! # Input Module
//!
//! In-process input layer used by the `xiaomi-ff` binary.
//!
//! The binary has no kernel input device to hang the rumble callback on, so
//! [`DirectInput`] simply keeps the installed handler and lets the caller
//! push effects through it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::device::InputLayer;
use crate::ff::{RumbleEffect, RumbleHandler};

/// Minimal input layer exposing a single rumble capability
pub struct DirectInput {
    name: String,
    handler: Option<Arc<dyn RumbleHandler>>,
}

impl fmt::Debug for DirectInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectInput")
            .field("name", &self.name)
            .field("rumble", &self.handler.is_some())
            .finish()
    }
}

impl DirectInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a rumble callback is installed
    pub fn has_rumble(&self) -> bool {
        self.handler.is_some()
    }

    /// Deliver a rumble effect
    ///
    /// Returns `false` if no callback is installed.
    pub fn rumble(&self, effect: RumbleEffect) -> bool {
        match &self.handler {
            Some(handler) => {
                handler.play(effect);
                true
            }
            None => false,
        }
    }
}

impl InputLayer for DirectInput {
    fn register_rumble(&mut self, handler: Arc<dyn RumbleHandler>) -> Result<(), String> {
        if self.handler.is_some() {
            return Err(format!("{}: rumble already registered", self.name));
        }
        info!("{}: rumble capability registered", self.name);
        self.handler = Some(handler);
        Ok(())
    }

    fn unregister(&mut self) {
        if self.handler.take().is_some() {
            debug!("{}: rumble capability removed", self.name);
        }
    }
}
