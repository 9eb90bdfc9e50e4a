//! Wallet session boundary.

use crate::domain::Address;
use std::fmt;
use std::sync::RwLock;

/// Exposes the connected account, if any.
pub trait SessionProvider: Send + Sync + fmt::Debug {
    fn current_account(&self) -> Option<Address>;

    fn is_connected(&self) -> bool {
        self.current_account().is_some()
    }
}

/// Session backed by a configured account that can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticSession {
    account: RwLock<Option<Address>>,
}

impl StaticSession {
    pub fn new(account: Option<Address>) -> Self {
        Self {
            account: RwLock::new(account),
        }
    }

    pub fn connect(&self, account: Address) {
        if let Ok(mut guard) = self.account.write() {
            *guard = Some(account);
        }
    }

    pub fn disconnect(&self) {
        if let Ok(mut guard) = self.account.write() {
            *guard = None;
        }
    }
}

impl SessionProvider for StaticSession {
    fn current_account(&self) -> Option<Address> {
        self.account.read().ok().and_then(|guard| guard.clone())
    }
}
