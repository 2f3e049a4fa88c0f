//! Role resolution and the connection-bound capability store

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use otter_types::{Address, OtterResult, RoleCapabilities, RoleId, RoleSnapshot};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::client::ChainReader;

/// Stateless resolver: three `hasRole` reads for one address
pub struct RoleResolver {
    reader: Arc<dyn ChainReader>,
}

impl RoleResolver {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Capabilities of `account`; all false without reads when absent
    ///
    /// Each check that errors counts as not granted.
    pub async fn resolve(&self, account: Option<Address>) -> RoleCapabilities {
        let Some(account) = account else {
            return RoleCapabilities::NONE;
        };

        let (verifier, issuer, admin) = tokio::join!(
            self.reader.has_role(RoleId::VERIFIER, account),
            self.reader.has_role(RoleId::ISSUER, account),
            self.reader.has_role(RoleId::ADMIN, account),
        );

        RoleCapabilities {
            is_verifier: granted(verifier, "verifier", account),
            is_issuer: granted(issuer, "issuer", account),
            is_admin: granted(admin, "admin", account),
        }
    }
}

fn granted(result: OtterResult<bool>, role: &str, account: Address) -> bool {
    match result {
        Ok(flag) => flag,
        Err(e) => {
            debug!("{} role check for {} failed, treating as not granted: {}", role, account, e);
            false
        }
    }
}

/// Current connection and its resolved capabilities
///
/// Every connection change publishes an all-false snapshot before any
/// resolution starts. A resolution only publishes if no newer connection
/// change happened while it was in flight.
pub struct RoleSession {
    resolver: RoleResolver,
    generation: AtomicU64,
    sender: watch::Sender<RoleSnapshot>,
}

impl RoleSession {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        let (sender, _) = watch::channel(RoleSnapshot::disconnected());
        Self {
            resolver: RoleResolver::new(reader),
            generation: AtomicU64::new(0),
            sender,
        }
    }

    pub fn snapshot(&self) -> RoleSnapshot {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RoleSnapshot> {
        self.sender.subscribe()
    }

    /// Switch to `address` and resolve its roles
    pub async fn connect(&self, address: Address) -> RoleSnapshot {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.sender.send_replace(RoleSnapshot::connecting(address));
        info!("Connected {}, resolving roles", address);
        self.resolve_for(generation, address).await
    }

    /// Drop the connection; capabilities reset immediately
    pub fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.sender.send_replace(RoleSnapshot::disconnected());
        info!("Disconnected");
    }

    /// Re-resolve the current address, if any
    pub async fn refresh(&self) -> RoleSnapshot {
        let snapshot = self.snapshot();
        match snapshot.address {
            Some(address) => {
                let generation = self.generation.load(Ordering::SeqCst);
                self.resolve_for(generation, address).await
            }
            None => snapshot,
        }
    }

    async fn resolve_for(&self, generation: u64, address: Address) -> RoleSnapshot {
        let capabilities = self.resolver.resolve(Some(address)).await;

        let published = self.sender.send_if_modified(|snapshot| {
            let current = self.generation.load(Ordering::SeqCst) == generation;
            if !current || snapshot.address != Some(address) {
                return false;
            }
            snapshot.capabilities = capabilities;
            true
        });

        if published {
            debug!("Roles for {}: {:?}", address, capabilities.badge());
        } else {
            debug!("Discarding stale role resolution for {}", address);
        }
        self.snapshot()
    }
}
