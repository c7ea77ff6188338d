//! Property tests for the delivery threshold and the thread id
//! regeneration invariant.

use giga_analyzer::llm::MockChatCompletion;
use giga_analyzer::session::{Delivery, SessionManager, INLINE_REPLY_LIMIT};
use giga_analyzer::testing::completion_unreachable;
use mockall::predicate::always;
use proptest::prelude::*;
use std::sync::Arc;

fn completion_echoing(reply: String) -> MockChatCompletion {
    let mut mock = MockChatCompletion::new();
    mock.expect_complete()
        .with(always(), always(), always())
        .returning(move |_, _, _| Ok(reply.clone()));
    mock
}

proptest! {
    #[test]
    fn delivery_channel_matches_threshold(len in 0usize..8000) {
        let reply: String = "ж".repeat(len);
        let expected_chars = reply.chars().count();

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let mut mgr = SessionManager::new(
            Arc::new(completion_echoing(reply.clone())),
            "prompt".to_string(),
        );
        mgr.start();

        let delivery = rt
            .block_on(mgr.handle_message("q"))
            .expect("stub never fails");

        match delivery {
            Delivery::Inline(text) => {
                prop_assert!(expected_chars <= INLINE_REPLY_LIMIT);
                prop_assert_eq!(text, reply);
            }
            Delivery::Document { contents, .. } => {
                prop_assert!(expected_chars > INLINE_REPLY_LIMIT);
                prop_assert_eq!(contents, reply);
            }
        }
    }

    #[test]
    fn stop_always_rotates_the_thread_id(stops in 1usize..20) {
        let mut mgr = SessionManager::new(
            Arc::new(completion_unreachable()),
            "prompt".to_string(),
        );

        let mut seen = std::collections::HashSet::new();
        seen.insert(mgr.thread_id().to_string());

        for _ in 0..stops {
            mgr.stop();
            prop_assert!(seen.insert(mgr.thread_id().to_string()));
        }
    }
}
