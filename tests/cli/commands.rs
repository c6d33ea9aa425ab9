//! Subcommands run against a live broker

use crate::common::WAIT;
use jobqueue::app::cli::{PublishArgs, Settings};
use jobqueue::app::commands::publish;
use jobqueue::queue::api::RecordingBroker;

#[tokio::test]
async fn test_publish_command_sends_one_message() {
    let recorder = RecordingBroker::start().await.unwrap();
    let settings = Settings {
        queue_server: recorder.addr().to_string(),
        ..Settings::default()
    };
    let args = PublishArgs {
        server: None,
        retries: None,
        action: "start-app".to_string(),
        args: vec!["myapp".to_string(), "myapp/0".to_string()],
    };

    publish(&settings, &args).await.unwrap();

    assert!(recorder.wait_for(1, WAIT).await);
    let messages = recorder.stop().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].action, "start-app");
    assert_eq!(messages[0].args, vec!["myapp", "myapp/0"]);
    assert_eq!(messages[0].visits, 0);
}
