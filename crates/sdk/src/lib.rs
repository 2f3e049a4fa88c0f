/// Otter Flow SDK
///
/// Client-side building blocks for the Otter Flow tranche protocol:
/// - Chain ports with a JSON-RPC adapter and an in-memory chain
/// - Pool aggregation, role resolution and position reads
/// - Validated call intents and the transaction lifecycle
/// - Local transaction history, read cache and event watching

pub mod abi;
pub mod cache;
pub mod calculator;
pub mod client;
pub mod contracts;
pub mod dashboard;
pub mod dispatcher;
pub mod events;
pub mod history;
pub mod intent;
pub mod mock;
pub mod network;
pub mod notify;
pub mod pools;
pub mod positions;
pub mod roles;
pub mod rpc;

pub use cache::{CachedValue, QueryCache, QueryKey, Scope};
pub use calculator::{default_apy, project, Projection};
pub use client::{ChainReader, ChainWriter, LogEntry, LogFilter, Receipt};
pub use contracts::ContractAddresses;
pub use dashboard::{CallContext, Dashboard, PortfolioEntry};
pub use dispatcher::{DispatchConfig, TxDispatcher, TxState, TxStatus};
pub use events::{EventWatcher, ObservedEvent, ProtocolEvent};
pub use history::TransactionLog;
pub use intent::ContractCall;
pub use mock::MockChain;
pub use network::Network;
pub use notify::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use pools::PoolAggregator;
pub use positions::{EpochProgress, EpochStage, PositionReader};
pub use roles::{RoleResolver, RoleSession};
pub use rpc::RpcChainClient;

// Re-export shared types
pub use otter_types::*;
