//! Account registration and the admin-password gate in front of the
//! management view.

use parking_lot::Mutex;
use tracing::warn;

use crate::client::{CatalogClient, Registration};
use crate::error::Result;
use crate::transport::Transport;

pub const MAX_ADMIN_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Granted,
    /// Wrong password; `remaining` attempts are left.
    Denied { remaining: u32 },
    /// No attempts left. No request was sent.
    Locked,
}

/// Counts admin-password attempts. An attempt is reserved before its request
/// is sent; wrong answers keep the reservation, failures hand it back.
pub struct AdminGate<'a, T> {
    client: &'a CatalogClient,
    transport: &'a T,
    remaining: Mutex<u32>,
}

impl<'a, T: Transport> AdminGate<'a, T> {
    pub fn new(client: &'a CatalogClient, transport: &'a T) -> Self {
        Self {
            client,
            transport,
            remaining: Mutex::new(MAX_ADMIN_ATTEMPTS),
        }
    }

    pub fn remaining(&self) -> u32 {
        *self.remaining.lock()
    }

    pub fn reset(&self) {
        *self.remaining.lock() = MAX_ADMIN_ATTEMPTS;
    }

    pub async fn validate(&self, password: &str) -> Result<GateOutcome> {
        let remaining = {
            let mut remaining = self.remaining.lock();
            if *remaining == 0 {
                return Ok(GateOutcome::Locked);
            }
            *remaining -= 1;
            *remaining
        };

        match self.check(password).await {
            Ok(true) => {
                self.reset();
                Ok(GateOutcome::Granted)
            }
            Ok(false) => {
                warn!(remaining, "admin password rejected");
                Ok(GateOutcome::Denied { remaining })
            }
            Err(e) => {
                self.refund();
                Err(e)
            }
        }
    }

    async fn check(&self, password: &str) -> Result<bool> {
        let request = self.client.build_validate_admin(password)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_validate_admin(response)
    }

    fn refund(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = (*remaining + 1).min(MAX_ADMIN_ATTEMPTS);
    }
}

pub async fn register<T: Transport>(
    client: &CatalogClient,
    transport: &T,
    registration: &Registration,
) -> Result<()> {
    let response = transport.execute(client.build_register(registration)?).await?;
    client.parse_register(response)
}
