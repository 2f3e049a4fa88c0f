//! # Transaction Flow Tests
//!
//! End-to-end writes through the dashboard against the in-memory chain:
//! lifecycle transitions, notices, history settlement, cache invalidation
//! and console gating.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use otter_sdk::mock::vault_addresses;
    use otter_sdk::*;
    use tokio::sync::broadcast;
    use tokio_test::{assert_err, assert_ok};

    const ALICE: Address = Address([0xa1; 20]);
    const VERIFIER: Address = Address([0xe1; 20]);
    const ISSUER: Address = Address([0x15; 20]);

    struct Harness {
        chain: Arc<MockChain>,
        notifier: Arc<RecordingNotifier>,
        dashboard: Dashboard,
    }

    fn fast_dispatch() -> DispatchConfig {
        DispatchConfig {
            receipt_poll_interval: Duration::from_millis(1),
            receipt_timeout: Duration::from_millis(500),
        }
    }

    fn harness_with(network: Network, config: DispatchConfig) -> Harness {
        let chain = Arc::new(MockChain::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let dashboard = Dashboard::new(
            chain.clone(),
            chain.clone(),
            notifier.clone(),
            TransactionLog::in_memory(),
            network,
            config,
        );
        Harness { chain, notifier, dashboard }
    }

    fn harness() -> Harness {
        harness_with(Network::anvil(), fast_dispatch())
    }

    fn drain(receiver: &mut broadcast::Receiver<TxState>) -> Vec<TxState> {
        let mut states = Vec::new();
        while let Ok(state) = receiver.try_recv() {
            states.push(state);
        }
        states
    }

    /// Funded, connected depositor with an active 70/30 pool
    async fn funded(h: &Harness) -> Address {
        let pool_id = h.chain.add_active_pool(ISSUER, 7000).await;
        h.chain.set_token_balance(ALICE, U256::new(5_000_000_000)).await;
        h.dashboard.connect(ALICE).await;
        vault_addresses(pool_id).0
    }

    #[tokio::test]
    async fn test_deposit_converts_to_base_units() {
        let h = harness();
        let vault = funded(&h).await;

        assert_ok!(h.dashboard.execute(ContractCall::approve(vault, "1000").unwrap(), None).await);
        assert_ok!(h.dashboard.execute(ContractCall::deposit(vault, "1000").unwrap(), None).await);

        let submissions = h.chain.submissions().await;
        assert_eq!(submissions.len(), 2);
        assert_eq!(
            submissions[1],
            (ALICE, ContractCall::Deposit { vault, amount: U256::new(1_000_000_000) })
        );
        let titles: Vec<String> = h.notifier.notices().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Approved!".to_string(), "Deposited 1000 mUSDC!".to_string()]);
    }

    #[tokio::test]
    async fn test_success_transitions_and_callback_runs_once() {
        let h = harness();
        h.dashboard.connect(ALICE).await;
        h.chain.set_receipt_delay(2).await;

        let dispatcher = h.dashboard.dispatcher();
        let mut transitions = dispatcher.transitions();
        let calls = AtomicUsize::new(0);

        let receipt = h
            .dashboard
            .execute_on(&dispatcher, ContractCall::mint(ALICE, "25").unwrap(), None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert!(receipt.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let states = drain(&mut transitions);
        assert_eq!(states.len(), 3);
        assert_eq!(states[0], TxState::Pending);
        assert_eq!(states[1], TxState::Confirming { tx_hash: receipt.tx_hash });
        assert_eq!(states[2], TxState::Success { receipt });

        let status = dispatcher.status();
        assert!(status.is_success && !status.is_pending && !status.is_confirming);
        assert_eq!(status.tx_hash, Some(receipt.tx_hash));

        dispatcher.reset();
        assert_eq!(dispatcher.state(), TxState::Idle);
    }

    #[tokio::test]
    async fn test_wallet_rejection_skips_confirming() {
        let h = harness();
        let vault = funded(&h).await;
        h.chain.reject_next_submission("User denied transaction signature").await;

        let dispatcher = h.dashboard.dispatcher();
        let mut transitions = dispatcher.transitions();
        let calls = AtomicUsize::new(0);

        let err = h
            .dashboard
            .execute_on(&dispatcher, ContractCall::deposit(vault, "10").unwrap(), None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap_err();

        assert!(matches!(err, OtterError::WalletRejected { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let states = drain(&mut transitions);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], TxState::Pending);
        assert_eq!(states[1], TxState::Failed { tx_hash: None, error: err.clone() });
        assert_eq!(dispatcher.status().error, Some(err));

        let errors = h.notifier.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "Deposit failed");
        assert!(errors[0].description.as_ref().unwrap().chars().count() <= MAX_NOTICE_DESCRIPTION_LEN);
        assert!(h.chain.submissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_revert_fails_after_confirming() {
        let h = harness();
        let vault = funded(&h).await;
        h.chain.revert_next_submission().await;

        let dispatcher = h.dashboard.dispatcher();
        let mut transitions = dispatcher.transitions();
        let err = h
            .dashboard
            .execute_on(&dispatcher, ContractCall::deposit(vault, "10").unwrap(), None, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, OtterError::TransactionReverted { .. }));
        let states = drain(&mut transitions);
        assert!(matches!(states[1], TxState::Confirming { .. }));
        assert!(matches!(states[2], TxState::Failed { tx_hash: Some(_), .. }));
        assert_eq!(h.notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_allowance_reverts() {
        let h = harness();
        let vault = funded(&h).await;

        let err = h
            .dashboard
            .execute(ContractCall::deposit(vault, "10").unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OtterError::TransactionReverted { .. }));
        assert!(h.dashboard.needs_approval(vault, "10").await.unwrap());
    }

    #[tokio::test]
    async fn test_receipt_timeout() {
        let h = harness_with(
            Network::anvil(),
            DispatchConfig {
                receipt_poll_interval: Duration::from_millis(1),
                receipt_timeout: Duration::from_millis(20),
            },
        );
        h.dashboard.connect(ALICE).await;
        h.chain.set_receipt_delay(u32::MAX).await;

        let err = h
            .dashboard
            .execute(ContractCall::mint(ALICE, "1").unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OtterError::Timeout { .. }));
        assert_eq!(h.notifier.errors()[0].title, "Mint failed");
    }

    #[tokio::test]
    async fn test_success_notice_links_explorer() {
        let h = harness_with(Network::lisk_sepolia(), fast_dispatch());
        h.dashboard.connect(ALICE).await;

        let receipt = h.dashboard.execute(ContractCall::mint(ALICE, "1").unwrap(), None).await.unwrap();
        let notice = &h.notifier.notices()[0];
        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(notice.title, "mUSDC minted!");
        assert_eq!(
            notice.link.as_deref(),
            Some(format!("https://sepolia-blockscout.lisk.com/tx/{}", receipt.tx_hash).as_str())
        );
    }

    #[test]
    fn test_invalid_input_never_builds_a_call() {
        let vault = Address([0x5e; 20]);
        for input in ["", "abc", "-5", "0", "0.0000001", "1.2.3"] {
            assert!(ContractCall::deposit(vault, input).is_err(), "{input}");
        }
        assert!(ContractCall::deposit(Address::ZERO, "1").is_err());
        assert!(ContractCall::activate_pool(0).is_err());
        assert!(ContractCall::propose_pool("ipfs://x", 86_400, 0, 10_001).is_err());
    }

    #[tokio::test]
    async fn test_history_is_settled_with_chain_hash() {
        let h = harness();
        let vault = funded(&h).await;
        let pool = h.dashboard.pool(1).await.unwrap();

        h.dashboard
            .execute(
                ContractCall::approve(vault, "50").unwrap(),
                Some(CallContext::tranche(&pool, Tranche::Senior)),
            )
            .await
            .unwrap();
        let receipt = h
            .dashboard
            .execute(
                ContractCall::deposit(vault, "50").unwrap(),
                Some(CallContext::tranche(&pool, Tranche::Senior)),
            )
            .await
            .unwrap();

        let records = h.dashboard.log().records().await;
        assert_eq!(records.len(), 2);
        let latest = &records[0];
        assert_eq!(latest.kind, TransactionKind::Deposit);
        assert_eq!(latest.status, RecordStatus::Confirmed);
        assert_eq!(latest.reference, TxReference::Chain(receipt.tx_hash));
        assert_eq!(latest.amount, "50");
        assert_eq!(latest.pool_id, Some(1));
        assert_eq!(latest.pool_name.as_deref(), Some("Otter Pool #1"));
        assert_eq!(latest.tranche, Some(Tranche::Senior));

        h.chain.reject_next_submission("denied").await;
        let _ = h.dashboard.execute(ContractCall::harvest(vault).unwrap(), None).await;
        let records = h.dashboard.log().records().await;
        assert_eq!(records[0].status, RecordStatus::Failed);
        assert!(matches!(records[0].reference, TxReference::Local(_)));
    }

    #[tokio::test]
    async fn test_deposit_invalidates_position() {
        let h = harness();
        let vault = funded(&h).await;

        assert_eq!(h.dashboard.position(Some(vault)).await, VaultPosition::zero());
        assert_eq!(h.dashboard.position(Some(vault)).await, VaultPosition::zero());
        assert_eq!(h.chain.read_count("balanceOf").await, 1);
        assert_eq!(h.dashboard.token_balance().await.unwrap().formatted, "5000");

        h.dashboard.execute(ContractCall::approve(vault, "1000").unwrap(), None).await.unwrap();
        h.dashboard.execute(ContractCall::deposit(vault, "1000").unwrap(), None).await.unwrap();

        let position = h.dashboard.position(Some(vault)).await;
        assert_eq!(position.shares.formatted, "1000");
        assert_eq!(position.total_assets.formatted, "1000");
        assert_eq!(h.chain.read_count("balanceOf").await, 2);
        assert_eq!(h.dashboard.token_balance().await.unwrap().formatted, "4000");

        let portfolio = h.dashboard.portfolio().await.unwrap();
        assert_eq!(portfolio.len(), 1);
        assert_eq!(portfolio[0].tranche, Tranche::Senior);
        assert_eq!(portfolio[0].vault, vault);
    }

    #[tokio::test]
    async fn test_unwritable_history_does_not_fail_confirmed_write() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let chain = Arc::new(MockChain::default());
        let dashboard = Dashboard::new(
            chain.clone(),
            chain.clone(),
            Arc::new(RecordingNotifier::new()),
            TransactionLog::open(&path).await.unwrap(),
            Network::anvil(),
            fast_dispatch(),
        );
        dashboard.connect(ALICE).await;
        assert_eq!(dashboard.token_balance().await.unwrap().formatted, "0");

        // the entry is written, then the file turns into a directory before settlement
        let settle_path = path.clone();
        let receipt = dashboard
            .execute_on(
                &dashboard.dispatcher(),
                ContractCall::mint(ALICE, "25").unwrap(),
                None,
                move |_| {
                    std::fs::remove_file(&settle_path).unwrap();
                    std::fs::create_dir(&settle_path).unwrap();
                },
            )
            .await;
        assert!(assert_ok!(receipt).success);
        assert_eq!(dashboard.token_balance().await.unwrap().formatted, "25");
        assert_eq!(dashboard.log().records().await[0].status, RecordStatus::Pending);

        // the entry cannot even be added now
        assert_ok!(dashboard.execute(ContractCall::mint(ALICE, "5").unwrap(), None).await);
        assert_eq!(dashboard.token_balance().await.unwrap().formatted, "30");
        assert_eq!(dashboard.log().len().await, 1);
        assert_eq!(chain.submissions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_account_switch_keeps_reads_per_account() {
        let h = harness();
        h.chain.set_token_balance(ALICE, U256::new(5_000_000_000)).await;
        h.chain.grant_role(RoleId::VERIFIER, VERIFIER).await;

        h.dashboard.connect(VERIFIER).await;
        assert!(h.dashboard.roles().is_verifier);
        assert_eq!(h.dashboard.token_balance().await.unwrap().formatted, "0");

        h.dashboard.connect(ALICE).await;
        assert_eq!(h.dashboard.roles(), RoleCapabilities::default());
        assert_eq!(h.dashboard.token_balance().await.unwrap().formatted, "5000");

        h.dashboard.disconnect();
        assert_eq!(h.dashboard.account(), None);
        assert_eq!(h.dashboard.roles(), RoleCapabilities::default());
        assert_eq!(h.dashboard.token_balance().await.unwrap().formatted, "0");

        h.dashboard.connect(VERIFIER).await;
        assert!(h.dashboard.roles().is_verifier);
        assert_eq!(h.dashboard.token_balance().await.unwrap().formatted, "0");
    }

    #[tokio::test]
    async fn test_console_gating() {
        let h = harness();
        h.chain.add_pool(PoolRecord {
            issuer: ISSUER,
            metadata_cid: "ipfs://pending".to_string(),
            epoch_seconds: U256::new(86_400),
            start_time: U256::ZERO,
            senior_split_bps: U256::new(8000),
            status: U256::ZERO,
            senior_vault: Address::ZERO,
            junior_vault: Address::ZERO,
        })
        .await;
        let activate = ContractCall::activate_pool(1).unwrap();

        let err = h.dashboard.execute(activate.clone(), None).await.unwrap_err();
        assert_eq!(err, OtterError::NotConnected);

        h.dashboard.connect(ALICE).await;
        let err = assert_err!(h.dashboard.execute(activate.clone(), None).await);
        assert!(matches!(err, OtterError::Unauthorized { .. }));
        assert!(h.chain.submissions().await.is_empty());
        assert!(h.dashboard.log().is_empty().await);

        h.chain.grant_role(RoleId::VERIFIER, VERIFIER).await;
        h.dashboard.connect(VERIFIER).await;
        assert_eq!(h.dashboard.pools().await.unwrap()[0].status, PoolStatus::Pending);
        assert_ok!(h.dashboard.execute(activate, None).await);

        let pool = &h.dashboard.pools().await.unwrap()[0];
        assert_eq!(pool.status, PoolStatus::Active);
        assert!(pool.vault(Tranche::Junior).is_some());
        assert!(h.dashboard.log().is_empty().await);
        assert!(h.dashboard.require(Console::Issuer).is_err());
    }

    #[tokio::test]
    async fn test_revenue_cycle_reaches_depositors() {
        let h = harness();
        let vault = funded(&h).await;
        h.dashboard.execute(ContractCall::approve(vault, "1000").unwrap(), None).await.unwrap();
        h.dashboard.execute(ContractCall::deposit(vault, "1000").unwrap(), None).await.unwrap();

        h.chain.grant_role(RoleId::ADMIN, VERIFIER).await;
        h.dashboard.connect(VERIFIER).await;
        let escrow = h.chain.contracts().revenue_escrow;
        for call in [
            ContractCall::post_revenue(1, 0, "100").unwrap(),
            ContractCall::mint(VERIFIER, "100").unwrap(),
            ContractCall::approve(escrow, "100").unwrap(),
            ContractCall::deposit_revenue(1, 0, "100").unwrap(),
        ] {
            h.dashboard.execute(call, None).await.unwrap();
        }
        assert_eq!(h.dashboard.epoch_progress(1, 0).await.unwrap().stage(), EpochStage::Escrowed);

        h.dashboard.execute(ContractCall::distribute(1, 0).unwrap(), None).await.unwrap();
        assert_eq!(h.dashboard.epoch_progress(1, 0).await.unwrap().stage(), EpochStage::Distributed);

        h.dashboard.connect(ALICE).await;
        let position = h.dashboard.position(Some(vault)).await;
        // senior tranche takes 70% and Alice holds every senior share
        assert_eq!(position.pending_rewards.formatted, "70");
        h.dashboard.execute(ContractCall::harvest(vault).unwrap(), None).await.unwrap();
        assert_eq!(h.dashboard.token_balance().await.unwrap().formatted, "4070");
    }
}
