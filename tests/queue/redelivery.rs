//! At-least-once delivery through put back

use crate::common::WAIT;
use jobqueue::queue::api::{publish, Broker, Consumer, Handler, HandlerResult, Message, Step};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fails until it has been called `succeed_on` times
struct EventuallyOk {
    succeed_on: usize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Handler for EventuallyOk {
    async fn handle(&self, _message: &Message) -> HandlerResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call < self.succeed_on {
            return Err("app not ready".into());
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_failing_work_is_retried_until_it_succeeds() {
    let broker = Arc::new(Broker::start("127.0.0.1:0").await.unwrap());
    let handler = Arc::new(EventuallyOk {
        succeed_on: 3,
        calls: AtomicUsize::new(0),
    });
    let mut consumer = Consumer::new(broker.clone());
    consumer.handle("start-app", handler.clone()).poll_timeout(WAIT);

    publish(&broker.addr().to_string(), [Message::new("start-app").arg("myapp")])
        .await
        .unwrap();

    let mut steps = Vec::new();
    while steps.len() < 3 {
        match consumer.poll_once().await.unwrap() {
            Step::ProducerGone => continue,
            step => steps.push(step),
        }
    }

    assert!(matches!(steps[0], Step::Retried(ref m) if m.visits == 0));
    assert!(matches!(steps[1], Step::Retried(ref m) if m.visits == 1));
    assert!(matches!(steps[2], Step::Handled(ref m) if m.visits == 2));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
}
