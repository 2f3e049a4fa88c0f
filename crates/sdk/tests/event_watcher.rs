//! # Event Watcher Tests
//!
//! Log polling against the in-memory chain: decoding, notices, block
//! cursor and the spawned forwarding loop.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use otter_sdk::mock::vault_addresses;
    use otter_sdk::*;

    const ISSUER: Address = Address([0x15; 20]);
    const ALICE: Address = Address([0xa1; 20]);

    fn watcher(chain: &Arc<MockChain>, notifier: &Arc<RecordingNotifier>) -> EventWatcher {
        let contracts = chain.contracts();
        EventWatcher::new(
            chain.clone(),
            notifier.clone(),
            vec![contracts.asset_registry, contracts.yield_distributor],
            0,
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn test_poll_decodes_and_notifies() {
        let chain = Arc::new(MockChain::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(&chain, &notifier);
        let registry = chain.contracts().asset_registry;
        let (senior, junior) = vault_addresses(1);

        chain
            .emit(registry, ProtocolEvent::PoolProposed { pool_id: 1, issuer: ISSUER, metadata_cid: "ipfs://a".to_string() })
            .await;
        chain
            .emit(registry, ProtocolEvent::PoolActivated { pool_id: 1, senior_vault: senior, junior_vault: junior })
            .await;

        let events = watcher.poll_once().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].block_number, 1);
        assert!(matches!(events[1].event, ProtocolEvent::PoolActivated { pool_id: 1, .. }));

        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Pool #1 Activated!");

        assert!(watcher.poll_once().await.unwrap().is_empty());
        assert_eq!(watcher.next_block().await, 3);
    }

    #[tokio::test]
    async fn test_vault_events_need_watch() {
        let chain = Arc::new(MockChain::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(&chain, &notifier);
        let (senior, _) = vault_addresses(1);

        chain
            .emit(senior, ProtocolEvent::Harvest { vault: senior, user: ALICE, amount: U256::new(3_000_000) })
            .await;
        assert!(watcher.poll_once().await.unwrap().is_empty());

        watcher.watch(senior).await;
        watcher.watch(Address::ZERO).await;
        chain
            .emit(senior, ProtocolEvent::RewardsAdded { vault: senior, amount: U256::new(7_000_000) })
            .await;

        let events = watcher.poll_once().await.unwrap();
        assert_eq!(events.len(), 1);
        let notice = &notifier.notices()[0];
        assert_eq!(notice.level, NoticeLevel::Info);
        assert_eq!(notice.description.as_deref(), Some("$7 added to the vault"));
    }

    #[tokio::test]
    async fn test_unknown_logs_are_skipped() {
        let chain = Arc::new(MockChain::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(&chain, &notifier);
        let registry = chain.contracts().asset_registry;

        chain
            .push_log(LogEntry {
                address: registry,
                topics: vec![[0xee; 32]],
                data: Vec::new(),
                block_number: 0,
                tx_hash: None,
            })
            .await;
        chain.emit(registry, ProtocolEvent::PoolRejected { pool_id: 2 }).await;

        let events = watcher.poll_once().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(notifier.errors()[0].title, "Pool #2 Rejected");
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_cursor() {
        let chain = Arc::new(MockChain::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(&chain, &notifier);
        chain.emit(chain.contracts().asset_registry, ProtocolEvent::PoolRejected { pool_id: 1 }).await;

        chain.fail_all_reads(true).await;
        assert!(watcher.poll_once().await.is_err());
        assert_eq!(watcher.next_block().await, 0);

        chain.fail_all_reads(false).await;
        assert_eq!(watcher.poll_once().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_watcher_forwards_events() {
        let chain = Arc::new(MockChain::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = Arc::new(watcher(&chain, &notifier));
        let distributor = chain.contracts().yield_distributor;

        let mut events = watcher.spawn(8);
        chain
            .emit(
                distributor,
                ProtocolEvent::Distributed {
                    pool_id: 1,
                    epoch: 4,
                    total: U256::new(100_000_000),
                    senior_amount: U256::new(70_000_000),
                    junior_amount: U256::new(30_000_000),
                },
            )
            .await;

        let observed = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(observed.event, ProtocolEvent::Distributed { epoch: 4, .. }));
        assert_eq!(
            notifier.notices()[0].description.as_deref(),
            Some("Pool #1 Epoch 4: $100 distributed")
        );
    }
}
