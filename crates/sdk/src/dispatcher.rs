//! Transaction lifecycle for a single mutating call
//!
//! `Idle → Pending → Confirming → Success | Failed`. A wallet refusal goes
//! straight from `Pending` to `Failed`. Every failure raises an error notice;
//! nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use otter_types::{Address, OtterError, OtterResult, TxHash};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::client::{ChainWriter, Receipt};
use crate::intent::ContractCall;
use crate::network::Network;
use crate::notify::{Notice, Notifier};

/// Receipt polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            receipt_poll_interval: Duration::from_millis(1000),
            receipt_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxState {
    Idle,
    /// Waiting for the wallet to accept the call
    Pending,
    /// Submitted, waiting for inclusion
    Confirming { tx_hash: TxHash },
    Success { receipt: Receipt },
    Failed { tx_hash: Option<TxHash>, error: OtterError },
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Success { .. } | TxState::Failed { .. })
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            TxState::Confirming { tx_hash } => Some(*tx_hash),
            TxState::Success { receipt } => Some(receipt.tx_hash),
            TxState::Failed { tx_hash, .. } => *tx_hash,
            TxState::Idle | TxState::Pending => None,
        }
    }
}

/// Flag view of [`TxState`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxStatus {
    pub is_pending: bool,
    pub is_confirming: bool,
    pub is_success: bool,
    pub error: Option<OtterError>,
    pub tx_hash: Option<TxHash>,
}

impl From<&TxState> for TxStatus {
    fn from(state: &TxState) -> Self {
        let mut status = TxStatus {
            tx_hash: state.tx_hash(),
            ..TxStatus::default()
        };
        match state {
            TxState::Idle => {}
            TxState::Pending => status.is_pending = true,
            TxState::Confirming { .. } => status.is_confirming = true,
            TxState::Success { .. } => status.is_success = true,
            TxState::Failed { error, .. } => status.error = Some(error.clone()),
        }
        status
    }
}

pub struct TxDispatcher {
    writer: Arc<dyn ChainWriter>,
    notifier: Arc<dyn Notifier>,
    network: Network,
    config: DispatchConfig,
    state: watch::Sender<TxState>,
    transitions: broadcast::Sender<TxState>,
}

impl TxDispatcher {
    pub fn new(
        writer: Arc<dyn ChainWriter>,
        notifier: Arc<dyn Notifier>,
        network: Network,
        config: DispatchConfig,
    ) -> Self {
        let (state, _) = watch::channel(TxState::Idle);
        let (transitions, _) = broadcast::channel(16);
        Self {
            writer,
            notifier,
            network,
            config,
            state,
            transitions,
        }
    }

    pub fn state(&self) -> TxState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> TxStatus {
        TxStatus::from(&*self.state.borrow())
    }

    /// Latest state only
    pub fn subscribe(&self) -> watch::Receiver<TxState> {
        self.state.subscribe()
    }

    /// Every transition, in order
    pub fn transitions(&self) -> broadcast::Receiver<TxState> {
        self.transitions.subscribe()
    }

    /// Back to `Idle`
    pub fn reset(&self) {
        self.transition(TxState::Idle);
    }

    fn transition(&self, next: TxState) {
        self.state.send_replace(next.clone());
        // no subscribers is fine
        let _ = self.transitions.send(next);
    }

    /// Submit `call` from `from` and wait for its receipt
    ///
    /// `on_success` runs once, after the receipt is observed. The returned
    /// error is the same one stored in the `Failed` state.
    pub async fn dispatch<F>(&self, from: Address, call: &ContractCall, on_success: F) -> OtterResult<Receipt>
    where
        F: FnOnce(&Receipt) + Send,
    {
        self.transition(TxState::Pending);
        info!("Submitting {} from {}", call, from);

        let tx_hash = match self.writer.submit(from, call).await {
            Ok(hash) => hash,
            Err(error) => return Err(self.fail(call, None, error)),
        };

        self.transition(TxState::Confirming { tx_hash });
        info!("{} submitted as {}", call.label(), tx_hash);

        let receipt = match self.wait_for_receipt(tx_hash).await {
            Ok(receipt) => receipt,
            Err(error) => return Err(self.fail(call, Some(tx_hash), error)),
        };

        if !receipt.success {
            let error = OtterError::TransactionReverted { tx_hash: tx_hash.to_string() };
            return Err(self.fail(call, Some(tx_hash), error));
        }

        self.transition(TxState::Success { receipt });
        info!("{} confirmed in block {}", call.label(), receipt.block_number);
        self.notifier
            .notify(Notice::success(call.success_title()).with_link(self.network.tx_url(&tx_hash)));

        on_success(&receipt);
        Ok(receipt)
    }

    fn fail(&self, call: &ContractCall, tx_hash: Option<TxHash>, error: OtterError) -> OtterError {
        warn!("{} failed: {}", call.label(), error);
        self.notifier
            .notify(Notice::error(call.failure_title(), &error.to_string()));
        self.transition(TxState::Failed {
            tx_hash,
            error: error.clone(),
        });
        error
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> OtterResult<Receipt> {
        let poll = async {
            loop {
                match self.writer.receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => debug!("Receipt poll for {} failed: {}", tx_hash, e),
                }
                tokio::time::sleep(self.config.receipt_poll_interval).await;
            }
        };

        tokio::time::timeout(self.config.receipt_timeout, poll)
            .await
            .map_err(|_| OtterError::timeout("transaction receipt", self.config.receipt_timeout.as_millis() as u64))
    }
}
