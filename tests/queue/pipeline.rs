//! Producers publishing deploy work to a consuming broker

use crate::common::{deploy_messages, WAIT};
use jobqueue::core::shutdown::ShutdownCoordinator;
use jobqueue::queue::api::{
    publish, Broker, Consumer, Handler, HandlerResult, Message, RecordingBroker,
    REGENERATE_APPRC, START_APP,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Collect(Mutex<Vec<Message>>);

#[async_trait::async_trait]
impl Handler for Collect {
    async fn handle(&self, message: &Message) -> HandlerResult {
        self.0.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_recording_broker_captures_deploy() {
    let recorder = RecordingBroker::start().await.unwrap();

    publish(&recorder.addr().to_string(), deploy_messages("myapp", 3))
        .await
        .unwrap();

    assert!(recorder.wait_for(4, WAIT).await);
    let messages = recorder.stop().await.unwrap();
    assert_eq!(messages, deploy_messages("myapp", 3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_consumer_routes_actions_to_handlers() {
    let broker = Arc::new(Broker::start("127.0.0.1:0").await.unwrap());
    let apprc = Arc::new(Collect::default());
    let starts = Arc::new(Collect::default());

    let mut consumer = Consumer::new(broker.clone());
    consumer
        .handle(REGENERATE_APPRC, apprc.clone())
        .handle(START_APP, starts.clone())
        .poll_timeout(Duration::from_millis(50));

    let addr = broker.addr().to_string();
    publish(&addr, deploy_messages("first", 2)).await.unwrap();
    publish(&addr, deploy_messages("second", 1)).await.unwrap();

    let shutdown = ShutdownCoordinator::new();
    let trigger = shutdown.clone();
    let (stats, _) = tokio::join!(consumer.run(shutdown.subscribe()), async {
        let deadline = tokio::time::Instant::now() + WAIT;
        while starts.0.lock().unwrap().len() < 3 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        trigger.trigger();
    });

    let stats = stats.unwrap();
    assert_eq!(stats.handled, 5);
    assert_eq!(apprc.0.lock().unwrap().len(), 2);
    assert_eq!(starts.0.lock().unwrap().len(), 3);

    broker.close().await.unwrap();
}
