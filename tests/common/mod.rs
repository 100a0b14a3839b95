use std::sync::Arc;

use sendguard::bridge::ScriptedItem;
use sendguard::{register_handlers, AppState, Dispatcher, EventCompletion, ON_SEND_ID};

#[allow(dead_code)]
pub fn dispatcher() -> Dispatcher {
    register_handlers(&AppState::default()).unwrap()
}

/// Dispatch a send event for `body` and wait for its completion.
#[allow(dead_code)]
pub async fn send(dispatcher: &Dispatcher, body: &str) -> EventCompletion {
    let item = Arc::new(ScriptedItem::with_body(body));
    dispatcher
        .dispatch(ON_SEND_ID, item)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap()
        .expect("send events complete with a payload")
}
