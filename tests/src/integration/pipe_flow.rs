//! # Pipe Flow
//!
//! Tests pipe streaming between separate participants of one group: the
//! fork-style hand-me-down pipe and the named rendezvous pipe, each driven
//! from both ends concurrently.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use fm_02_pipes::{PipeConfig, PipeStore, ReadOutcome, WriteOutcome};
    use shared_store::{InMemoryStore, SharedStore};
    use shared_types::{GroupContext, GroupId, ProcessId};

    fn pipes_for(store: &Arc<InMemoryStore>, pid: &str) -> PipeStore {
        let ctx = GroupContext::new(GroupId::from("g"), ProcessId::from(pid));
        PipeStore::new(
            ctx,
            Arc::clone(store) as Arc<dyn SharedStore>,
            quick_config(),
        )
    }

    fn quick_config() -> PipeConfig {
        PipeConfig {
            poll_interval: Duration::from_millis(5),
            max_block: Some(Duration::from_millis(500)),
        }
    }

    /// Parent streams several chunks to a shared child, closes its write end,
    /// and the child drains the queue down to a clean end-of-stream.
    #[tokio::test]
    async fn test_parent_streams_to_child_until_eof() {
        let store = Arc::new(InMemoryStore::new());
        let parent_pipes = pipes_for(&store, "parent");
        let child_pipes = pipes_for(&store, "child");

        let mut parent_pipe = parent_pipes.open(None, None, None).await.unwrap();
        parent_pipes
            .share(&ProcessId::from("parent"), &ProcessId::from("child"))
            .await
            .unwrap();
        // Child keeps only the read end.
        let mut child_pipe = child_pipes.open(None, None, Some(false)).await.unwrap();

        for chunk in [b"alpha".to_vec(), b"beta".to_vec()] {
            assert_eq!(
                parent_pipe.write(chunk).await.unwrap(),
                WriteOutcome::Delivered
            );
        }
        parent_pipe.close_writer().await.unwrap();

        assert_eq!(
            child_pipe.read().await.unwrap(),
            ReadOutcome::Data(b"alpha".to_vec())
        );
        assert_eq!(
            child_pipe.read().await.unwrap(),
            ReadOutcome::Data(b"beta".to_vec())
        );
        assert_eq!(child_pipe.read().await.unwrap(), ReadOutcome::Eof);

        // End-of-stream tore the pipe's keys down.
        assert!(store.keys("pipe:parent*").await.unwrap().is_empty());
    }

    /// A reader blocked on an empty queue is released by a concurrent writer.
    #[tokio::test]
    async fn test_blocked_reader_wakes_on_write() {
        let store = Arc::new(InMemoryStore::new());
        let parent_pipes = pipes_for(&store, "parent");
        let child_pipes = pipes_for(&store, "child");

        let mut parent_pipe = parent_pipes.open(None, None, None).await.unwrap();
        parent_pipes
            .share(&ProcessId::from("parent"), &ProcessId::from("child"))
            .await
            .unwrap();
        let mut child_pipe = child_pipes.open(None, None, Some(false)).await.unwrap();

        let reader = tokio::spawn(async move { child_pipe.read().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        parent_pipe.write(b"late".to_vec()).await.unwrap();

        let got = reader.await.unwrap().unwrap();
        assert_eq!(got, ReadOutcome::Data(b"late".to_vec()));
    }

    /// Two unrelated siblings meet on a named pipe and tear it down cleanly.
    #[tokio::test]
    async fn test_named_pipe_rendezvous_between_siblings() {
        let store = Arc::new(InMemoryStore::new());
        let producer_pipes = pipes_for(&store, "producer");
        let consumer_pipes = pipes_for(&store, "consumer");

        let mut producer = producer_pipes
            .open(Some("work"), Some(false), Some(true))
            .await
            .unwrap();
        let mut consumer = consumer_pipes
            .open(Some("work"), Some(true), Some(false))
            .await
            .unwrap();

        producer.write(b"job-1".to_vec()).await.unwrap();
        producer.close_writer().await.unwrap();

        assert_eq!(
            consumer.read().await.unwrap(),
            ReadOutcome::Data(b"job-1".to_vec())
        );
        assert_eq!(consumer.read().await.unwrap(), ReadOutcome::Eof);
        assert!(store.keys("fifo:work*").await.unwrap().is_empty());
    }

    /// Named and fork pipes with the same label never collide: they live in
    /// separate key namespaces.
    #[tokio::test]
    async fn test_named_and_fork_pipes_do_not_collide() {
        let store = Arc::new(InMemoryStore::new());
        let pipes = pipes_for(&store, "worker");

        let mut named = pipes.open(Some("worker"), None, None).await.unwrap();
        let mut unnamed = pipes.open(None, None, None).await.unwrap();
        assert_eq!(named.name(), unnamed.name());

        named.write(b"named".to_vec()).await.unwrap();
        unnamed.write(b"fork".to_vec()).await.unwrap();

        assert_eq!(
            named.read().await.unwrap(),
            ReadOutcome::Data(b"named".to_vec())
        );
        assert_eq!(
            unnamed.read().await.unwrap(),
            ReadOutcome::Data(b"fork".to_vec())
        );
    }
}
