//! Protocol event decoding and polling
//!
//! The watcher polls `eth_getLogs` from the last block it has seen, decodes
//! what it recognises, forwards each event on a channel and raises a notice.
//! Logs that do not decode are skipped.

use std::sync::Arc;
use std::time::Duration;

use otter_types::{format_units, Address, OtterError, OtterResult, TxHash, U256};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::abi::{address_word, encode_tokens, topics, uint_word, Decoder, Token};
use crate::client::{ChainReader, LogEntry, LogFilter};
use crate::notify::{Notice, Notifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    PoolProposed {
        pool_id: u64,
        issuer: Address,
        metadata_cid: String,
    },
    PoolActivated {
        pool_id: u64,
        senior_vault: Address,
        junior_vault: Address,
    },
    PoolRejected {
        pool_id: u64,
    },
    Distributed {
        pool_id: u64,
        epoch: u64,
        total: U256,
        senior_amount: U256,
        junior_amount: U256,
    },
    Deposit {
        vault: Address,
        caller: Address,
        owner: Address,
        assets: U256,
        shares: U256,
    },
    Withdraw {
        vault: Address,
        caller: Address,
        receiver: Address,
        owner: Address,
        assets: U256,
        shares: U256,
    },
    Harvest {
        vault: Address,
        user: Address,
        amount: U256,
    },
    RewardsAdded {
        vault: Address,
        amount: U256,
    },
}

fn topic_u64(topic: &[u8; 32], field: &'static str) -> OtterResult<u64> {
    let value = U256::from_be_bytes(*topic);
    if value > U256::new(u64::MAX as u128) {
        return Err(OtterError::decode(field, "value exceeds u64"));
    }
    Ok(value.into_words().1 as u64)
}

fn topic_address(topic: &[u8; 32]) -> OtterResult<Address> {
    Decoder::new(topic, "indexed address").address(0)
}

impl ProtocolEvent {
    /// Decode a raw log; errors for unknown signatures and malformed payloads
    pub fn decode(log: &LogEntry) -> OtterResult<Self> {
        let signature = log
            .topics
            .first()
            .ok_or_else(|| OtterError::decode("log", "anonymous log"))?;
        let indexed = |i: usize| {
            log.topics
                .get(i)
                .ok_or_else(|| OtterError::decode("log", &format!("missing topic {}", i)))
        };

        let event = match *signature {
            topics::POOL_PROPOSED => ProtocolEvent::PoolProposed {
                pool_id: topic_u64(indexed(1)?, "poolId")?,
                issuer: topic_address(indexed(2)?)?,
                metadata_cid: Decoder::new(&log.data, "PoolProposed").string(0)?,
            },
            topics::POOL_ACTIVATED => {
                let data = Decoder::new(&log.data, "PoolActivated");
                ProtocolEvent::PoolActivated {
                    pool_id: topic_u64(indexed(1)?, "poolId")?,
                    senior_vault: data.address(0)?,
                    junior_vault: data.address(1)?,
                }
            }
            topics::POOL_REJECTED => ProtocolEvent::PoolRejected {
                pool_id: topic_u64(indexed(1)?, "poolId")?,
            },
            topics::DISTRIBUTED => {
                let data = Decoder::new(&log.data, "Distributed");
                ProtocolEvent::Distributed {
                    pool_id: topic_u64(indexed(1)?, "poolId")?,
                    epoch: topic_u64(indexed(2)?, "epoch")?,
                    total: data.uint(0)?,
                    senior_amount: data.uint(1)?,
                    junior_amount: data.uint(2)?,
                }
            }
            topics::DEPOSIT => {
                let data = Decoder::new(&log.data, "Deposit");
                ProtocolEvent::Deposit {
                    vault: log.address,
                    caller: topic_address(indexed(1)?)?,
                    owner: topic_address(indexed(2)?)?,
                    assets: data.uint(0)?,
                    shares: data.uint(1)?,
                }
            }
            topics::WITHDRAW => {
                let data = Decoder::new(&log.data, "Withdraw");
                ProtocolEvent::Withdraw {
                    vault: log.address,
                    caller: topic_address(indexed(1)?)?,
                    receiver: topic_address(indexed(2)?)?,
                    owner: topic_address(indexed(3)?)?,
                    assets: data.uint(0)?,
                    shares: data.uint(1)?,
                }
            }
            topics::HARVEST => ProtocolEvent::Harvest {
                vault: log.address,
                user: topic_address(indexed(1)?)?,
                amount: Decoder::new(&log.data, "Harvest").uint(0)?,
            },
            topics::REWARDS_ADDED => ProtocolEvent::RewardsAdded {
                vault: log.address,
                amount: Decoder::new(&log.data, "RewardsAdded").uint(0)?,
            },
            _ => return Err(OtterError::decode("log", "unknown event signature")),
        };
        Ok(event)
    }

    /// Topics and data as the contract emits them
    pub fn encode(&self) -> (Vec<[u8; 32]>, Vec<u8>) {
        let id = |n: u64| uint_word(U256::from(n));
        match self {
            ProtocolEvent::PoolProposed { pool_id, issuer, metadata_cid } => (
                vec![topics::POOL_PROPOSED, id(*pool_id), address_word(*issuer)],
                encode_tokens(&[Token::String(metadata_cid.clone())]),
            ),
            ProtocolEvent::PoolActivated { pool_id, senior_vault, junior_vault } => (
                vec![topics::POOL_ACTIVATED, id(*pool_id)],
                encode_tokens(&[Token::Address(*senior_vault), Token::Address(*junior_vault)]),
            ),
            ProtocolEvent::PoolRejected { pool_id } => (vec![topics::POOL_REJECTED, id(*pool_id)], Vec::new()),
            ProtocolEvent::Distributed { pool_id, epoch, total, senior_amount, junior_amount } => (
                vec![topics::DISTRIBUTED, id(*pool_id), id(*epoch)],
                encode_tokens(&[Token::Uint(*total), Token::Uint(*senior_amount), Token::Uint(*junior_amount)]),
            ),
            ProtocolEvent::Deposit { caller, owner, assets, shares, .. } => (
                vec![topics::DEPOSIT, address_word(*caller), address_word(*owner)],
                encode_tokens(&[Token::Uint(*assets), Token::Uint(*shares)]),
            ),
            ProtocolEvent::Withdraw { caller, receiver, owner, assets, shares, .. } => (
                vec![
                    topics::WITHDRAW,
                    address_word(*caller),
                    address_word(*receiver),
                    address_word(*owner),
                ],
                encode_tokens(&[Token::Uint(*assets), Token::Uint(*shares)]),
            ),
            ProtocolEvent::Harvest { user, amount, .. } => (
                vec![topics::HARVEST, address_word(*user)],
                encode_tokens(&[Token::Uint(*amount)]),
            ),
            ProtocolEvent::RewardsAdded { amount, .. } => {
                (vec![topics::REWARDS_ADDED], encode_tokens(&[Token::Uint(*amount)]))
            }
        }
    }

    /// Full log as emitted by `emitter`
    pub fn to_log(&self, emitter: Address, block_number: u64, tx_hash: Option<TxHash>) -> LogEntry {
        let (topics, data) = self.encode();
        LogEntry {
            address: emitter,
            topics,
            data,
            block_number,
            tx_hash,
        }
    }

    /// Notice raised when the event is observed; `None` for silent events
    pub fn notice(&self) -> Option<Notice> {
        match self {
            ProtocolEvent::PoolActivated { pool_id, .. } => Some(
                Notice::success(format!("Pool #{} Activated!", pool_id))
                    .with_description("Deposits are now open for this pool."),
            ),
            ProtocolEvent::PoolRejected { pool_id } => Some(
                Notice::error(
                    format!("Pool #{} Rejected", pool_id),
                    "This pool did not meet verification requirements.",
                ),
            ),
            ProtocolEvent::Distributed { pool_id, epoch, total, .. } => Some(
                Notice::success("Distribution Complete!").with_description(format!(
                    "Pool #{} Epoch {}: ${} distributed",
                    pool_id,
                    epoch,
                    format_units(*total)
                )),
            ),
            ProtocolEvent::Harvest { amount, .. } => Some(
                Notice::success("Rewards Harvested!")
                    .with_description(format!("You claimed ${} in rewards", format_units(*amount))),
            ),
            ProtocolEvent::RewardsAdded { amount, .. } => Some(
                Notice::info("New Rewards Available!")
                    .with_description(format!("${} added to the vault", format_units(*amount))),
            ),
            ProtocolEvent::PoolProposed { .. } | ProtocolEvent::Deposit { .. } | ProtocolEvent::Withdraw { .. } => None,
        }
    }
}

/// Event with the block it was emitted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEvent {
    pub block_number: u64,
    pub tx_hash: Option<TxHash>,
    pub event: ProtocolEvent,
}

/// Polls logs for a fixed set of emitters
pub struct EventWatcher {
    reader: Arc<dyn ChainReader>,
    notifier: Arc<dyn Notifier>,
    addresses: RwLock<Vec<Address>>,
    next_block: RwLock<u64>,
    poll_interval: Duration,
}

impl EventWatcher {
    /// Watch `addresses` starting at `from_block`
    pub fn new(
        reader: Arc<dyn ChainReader>,
        notifier: Arc<dyn Notifier>,
        addresses: Vec<Address>,
        from_block: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            reader,
            notifier,
            addresses: RwLock::new(addresses),
            next_block: RwLock::new(from_block),
            poll_interval,
        }
    }

    /// Add a vault (or any emitter) to the watch set
    pub async fn watch(&self, address: Address) {
        let mut addresses = self.addresses.write().await;
        if !address.is_zero() && !addresses.contains(&address) {
            addresses.push(address);
        }
    }

    pub async fn next_block(&self) -> u64 {
        *self.next_block.read().await
    }

    /// One poll: every decodable event since the last poll, in log order
    pub async fn poll_once(&self) -> OtterResult<Vec<ObservedEvent>> {
        let head = self.reader.block_number().await?;
        let mut next_block = self.next_block.write().await;
        if head < *next_block {
            return Ok(Vec::new());
        }

        let filter = LogFilter {
            addresses: self.addresses.read().await.clone(),
            from_block: *next_block,
            to_block: head,
        };
        let logs = self.reader.logs(&filter).await?;
        *next_block = head + 1;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            match ProtocolEvent::decode(&log) {
                Ok(event) => {
                    if let Some(notice) = event.notice() {
                        self.notifier.notify(notice);
                    }
                    events.push(ObservedEvent {
                        block_number: log.block_number,
                        tx_hash: log.tx_hash,
                        event,
                    });
                }
                Err(e) => debug!("Skipping log from {} at block {}: {}", log.address, log.block_number, e),
            }
        }
        Ok(events)
    }

    /// Poll forever, forwarding events until the receiver is dropped
    pub async fn run(self: Arc<Self>, sender: mpsc::Sender<ObservedEvent>) {
        info!("Watching protocol events every {:?}", self.poll_interval);
        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(events) => {
                    for event in events {
                        if sender.send(event).await.is_err() {
                            debug!("Event receiver dropped, stopping watcher");
                            return;
                        }
                    }
                }
                Err(e) => warn!("Event poll failed: {}", e),
            }
        }
    }

    /// Spawn [`run`](Self::run) and hand back the receiving end
    pub fn spawn(self: Arc<Self>, buffer: usize) -> mpsc::Receiver<ObservedEvent> {
        let (sender, receiver) = mpsc::channel(buffer);
        tokio::spawn(self.run(sender));
        receiver
    }
}
