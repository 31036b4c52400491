//! # Fork Flow
//!
//! Tests that fm-03-fork, fm-01-handshake, and fm-02-pipes work together: a
//! batch fork classifies children by handshake, retries the dead with their
//! original arguments, acknowledges the survivors, and hands the caller's
//! pipe down to each of them.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use fm_01_handshake::{HandshakeChannel, InMemoryBroker, MessageBroker};
    use fm_02_pipes::{PipeConfig, PipeStore, ReadOutcome, WriteOutcome};
    use fm_03_fork::test_utils::InMemoryRegistry;
    use fm_03_fork::{ForkConfig, ForkCoordinator, ProcessRegistry};
    use shared_store::{InMemoryStore, SharedStore};
    use shared_types::{GroupContext, GroupId, ProcessId, SpawnRequest};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Cluster {
        ctx: GroupContext,
        registry: Arc<InMemoryRegistry>,
        broker: Arc<InMemoryBroker>,
        store: Arc<InMemoryStore>,
        coordinator: ForkCoordinator,
    }

    /// A parent process with registry, broker, and store wired up.
    fn cluster(handshake_timeout: Duration) -> Cluster {
        let ctx = GroupContext::new(GroupId::from("g"), ProcessId::from("parent"));
        let broker = Arc::new(InMemoryBroker::new());
        let registry = Arc::new(InMemoryRegistry::with_broker(
            Arc::clone(&broker) as Arc<dyn MessageBroker>
        ));
        let store = Arc::new(InMemoryStore::new());
        let pipes = PipeStore::new(
            ctx.clone(),
            Arc::clone(&store) as Arc<dyn SharedStore>,
            quick_pipes(),
        );
        let coordinator = ForkCoordinator::new(
            ctx.clone(),
            Arc::clone(&registry) as Arc<dyn ProcessRegistry>,
            Arc::clone(&broker) as Arc<dyn MessageBroker>,
            pipes,
            ForkConfig {
                handshake_timeout,
                ..ForkConfig::default()
            },
        );
        Cluster {
            ctx,
            registry,
            broker,
            store,
            coordinator,
        }
    }

    /// A pipe store bound to another participant of the same cluster.
    fn pipes_as(cluster: &Cluster, pid: &ProcessId) -> PipeStore {
        let ctx = GroupContext::with_parent(
            cluster.ctx.gid.clone(),
            pid.clone(),
            cluster.ctx.pid.clone(),
        );
        PipeStore::new(
            ctx,
            Arc::clone(&cluster.store) as Arc<dyn SharedStore>,
            quick_pipes(),
        )
    }

    fn quick_pipes() -> PipeConfig {
        PipeConfig {
            poll_interval: Duration::from_millis(5),
            max_block: Some(Duration::from_millis(500)),
        }
    }

    fn requests(n: usize) -> Vec<SpawnRequest> {
        (0..n)
            .map(|i| SpawnRequest::new().with_arg("worker", i.to_string()))
            .collect()
    }

    // =============================================================================
    // INTEGRATION TESTS: FORK → HANDSHAKE → RETRY
    // =============================================================================

    /// One silent child out of three costs exactly one extra creation.
    #[tokio::test]
    async fn test_fork_retries_exactly_the_dead() {
        let cluster = cluster(Duration::from_millis(300));
        cluster.registry.silence_next_children(1);

        let alive = cluster.coordinator.fork(requests(3)).await.unwrap();

        assert_eq!(alive.len(), 3);
        // 3 first-pass creates plus 1 replacement for the silent child.
        assert_eq!(cluster.registry.created_count(), 4);
        assert_eq!(cluster.registry.deleted_count(), 1);
        assert_eq!(cluster.registry.live().len(), 3);
    }

    /// A replacement child is resubmitted with the caller's arguments, not the
    /// registry-assigned identity of its dead predecessor.
    #[tokio::test]
    async fn test_retried_child_keeps_original_args_only() {
        let cluster = cluster(Duration::from_millis(300));
        cluster.registry.silence_next_children(1);

        let alive = cluster
            .coordinator
            .fork(vec![SpawnRequest::new().with_arg("role", "indexer")])
            .await
            .unwrap();

        assert_eq!(alive.len(), 1);
        let replacement = &alive[0];
        assert_eq!(replacement.args.get("role").map(String::as_str), Some("indexer"));
        // Identity keys belong to the replacement, not the dead first attempt.
        assert_eq!(
            replacement.args.get("process_id").map(String::as_str),
            Some(replacement.pid.as_str())
        );
        assert_eq!(cluster.registry.deleted_count(), 1);
    }

    /// The survivor's boot handshake completes: its announcement was consumed
    /// and the parent's "start" acknowledgement is waiting in its mailbox.
    #[tokio::test]
    async fn test_survivor_receives_start_acknowledgement() {
        let cluster = cluster(Duration::from_secs(5));
        let alive = cluster.coordinator.fork(requests(1)).await.unwrap();
        let child = &alive[0];

        let ctx = GroupContext::with_parent(
            cluster.ctx.gid.clone(),
            child.pid.clone(),
            cluster.ctx.pid.clone(),
        );
        let mut channel =
            HandshakeChannel::open(ctx, Arc::clone(&cluster.broker) as Arc<dyn MessageBroker>)
            .await
            .unwrap();
        let message = channel
            .receive_one(Duration::from_secs(1))
            .await
            .unwrap()
            .expect("start acknowledgement");

        assert_eq!(message.pid.as_str(), "parent");
        assert_eq!(message.message.as_deref(), Some("start"));
    }

    // =============================================================================
    // INTEGRATION TESTS: FORK → PIPE INHERITANCE
    // =============================================================================

    /// A parent that opened a pipe before forking can stream to the child:
    /// the fork wires a reference record, the child's nameless open resolves
    /// it, and data written by the parent arrives.
    #[tokio::test]
    async fn test_fork_hands_pipe_down_to_child() {
        let cluster = cluster(Duration::from_secs(5));

        let parent_pipes = PipeStore::new(
            cluster.ctx.clone(),
            Arc::clone(&cluster.store) as Arc<dyn SharedStore>,
            quick_pipes(),
        );
        let mut parent_pipe = parent_pipes.open(None, None, None).await.unwrap();

        let alive = cluster.coordinator.fork(requests(1)).await.unwrap();
        let child = &alive[0];

        assert_eq!(
            parent_pipe.write(b"work item".to_vec()).await.unwrap(),
            WriteOutcome::Delivered
        );

        let mut child_pipe = pipes_as(&cluster, &child.pid)
            .open(None, None, Some(false))
            .await
            .unwrap();
        assert_eq!(child_pipe.name(), "parent");
        assert_eq!(
            child_pipe.read().await.unwrap(),
            ReadOutcome::Data(b"work item".to_vec())
        );
    }

    /// With no pipe on the parent's side, the fork still succeeds; the
    /// children simply inherit nothing.
    #[tokio::test]
    async fn test_fork_without_parent_pipe_shares_nothing() {
        let cluster = cluster(Duration::from_secs(5));
        let alive = cluster.coordinator.fork(requests(2)).await.unwrap();

        assert_eq!(alive.len(), 2);
        // No reference records were written for the children.
        for child in &alive {
            let refs = cluster
                .store
                .keys(&format!("pipe:*:{}", child.pid.as_str()))
                .await
                .unwrap();
            assert!(refs.is_empty());
        }
    }
}
