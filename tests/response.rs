//! Response pipeline integration tests
//!
//! Remote tiers are scripted fakes; no network access is needed.

use std::sync::Arc;

use mitra_voice::respond::{
    BASE_RESPONSES, GREETING_RESPONSES, LocalResponder, emotion_responses, topic_responses,
};
use mitra_voice::{CONNECTION_TROUBLE, EmotionLabel, Personality, ResponsePipeline, Topic};

mod common;

use common::{FakeResponder, instant_retry, prefs};

fn pipeline(primary: &Arc<FakeResponder>, secondary: &Arc<FakeResponder>) -> ResponsePipeline {
    ResponsePipeline::new(prefs(), instant_retry())
        .with_primary(primary.clone())
        .with_secondary(secondary.clone())
        .with_local(LocalResponder::seeded(7))
}

#[tokio::test]
async fn test_primary_success_is_returned() {
    let primary = FakeResponder::answering("primary", &["I'm here with you."]);
    let secondary = FakeResponder::failing("secondary");
    let responder = pipeline(&primary, &secondary);

    let reply = responder.get_response("I had a long day").await;

    assert_eq!(reply, "I'm here with you.");
    assert_eq!(secondary.calls(), 0);
    assert_eq!(responder.attempts(), 0);
}

#[tokio::test]
async fn test_secondary_answers_after_primary_fails() {
    let primary = FakeResponder::failing("primary");
    let secondary = FakeResponder::answering("secondary", &["That sounds hard."]);
    let responder = pipeline(&primary, &secondary);

    let reply = responder.get_response("I had a long day").await;

    assert_eq!(reply, "That sounds hard.");
    assert_eq!(primary.calls(), 1);
    // Secondary success leaves the primary failure counted
    assert_eq!(responder.attempts(), 1);
}

#[tokio::test]
async fn test_anxious_interview_falls_back_to_local_pool() {
    let primary = FakeResponder::failing("primary");
    let secondary = FakeResponder::failing("secondary");
    let store = prefs();
    store.set_personality(Personality::Coach).unwrap();

    let responder = ResponsePipeline::new(store, instant_retry())
        .with_primary(primary.clone())
        .with_secondary(secondary.clone())
        .with_local(LocalResponder::seeded(1));

    let text = "I feel really anxious about my job interview tomorrow";
    let reply = responder.get_response(text).await;

    let pool = LocalResponder::candidates(text);
    assert!(pool.iter().any(|p| *p == reply), "unexpected reply: {reply}");
    for entry in BASE_RESPONSES {
        assert!(pool.contains(entry));
    }
    for entry in emotion_responses(EmotionLabel::Anxiety) {
        assert!(pool.contains(entry));
    }
    for entry in topic_responses(Topic::Work) {
        assert!(pool.contains(entry));
    }

    assert_eq!(responder.attempts(), 2);
    assert_eq!(*primary.personalities.lock().unwrap(), vec![Personality::Coach]);
    assert_eq!(*secondary.personalities.lock().unwrap(), vec![Personality::Coach]);
}

#[tokio::test]
async fn test_exhaustion_apologises_and_resets() {
    let primary = FakeResponder::failing("primary");
    let secondary = FakeResponder::failing("secondary");
    let responder = pipeline(&primary, &secondary);

    // Turn one: both tiers fail, local answers
    let first = responder.get_response("I feel lost").await;
    assert_ne!(first, CONNECTION_TROUBLE);
    assert_eq!(responder.attempts(), 2);

    // Turn two: primary failure reaches the limit
    let second = responder.get_response("I feel lost").await;
    assert_eq!(second, CONNECTION_TROUBLE);
    assert_eq!(responder.attempts(), 0);
    assert_eq!(primary.calls(), 2);
    assert_eq!(secondary.calls(), 1);

    // Turn three starts from a clean count
    let third = responder.get_response("I feel lost").await;
    assert_ne!(third, CONNECTION_TROUBLE);
    assert_eq!(responder.attempts(), 2);
}

#[tokio::test]
async fn test_primary_success_resets_count() {
    let primary = FakeResponder::failing("primary");
    let secondary = FakeResponder::failing("secondary");
    let responder = pipeline(&primary, &secondary);

    responder.get_response("hmm").await;
    assert_eq!(responder.attempts(), 2);

    primary.push_reply("Welcome back.");
    let reply = responder.get_response("hmm").await;

    assert_eq!(reply, "Welcome back.");
    assert_eq!(responder.attempts(), 0);
}

#[tokio::test]
async fn test_unconfigured_tiers_are_skipped_without_counting() {
    let primary = FakeResponder::unconfigured("primary");
    let secondary = FakeResponder::unconfigured("secondary");
    let responder = pipeline(&primary, &secondary);

    for _ in 0..5 {
        let reply = responder.get_response("the weather is fine").await;
        assert_ne!(reply, CONNECTION_TROUBLE);
    }

    assert_eq!(primary.calls(), 0);
    assert_eq!(secondary.calls(), 0);
    assert_eq!(responder.attempts(), 0);
}

#[tokio::test]
async fn test_set_credentials_resets_count_and_enables_tiers() {
    let primary = FakeResponder::failing("primary");
    let secondary = FakeResponder::failing("secondary");
    let responder = pipeline(&primary, &secondary);

    responder.get_response("hello there").await;
    assert_eq!(responder.attempts(), 2);

    responder.set_credentials(None, None);
    assert_eq!(responder.attempts(), 0);

    responder.get_response("hello there").await;
    assert_eq!(primary.calls(), 1);
    assert_eq!(responder.attempts(), 0);

    responder.set_credentials(Some("sk-new".to_string()), Some("sk-new".to_string()));
    responder.get_response("hello there").await;
    assert_eq!(primary.calls(), 2);
    assert_eq!(secondary.calls(), 2);
}

#[tokio::test]
async fn test_greeting_uses_greeting_pool_offline() {
    let responder = ResponsePipeline::new(prefs(), instant_retry())
        .with_local(LocalResponder::seeded(42));

    let reply = responder.get_response("Hi Mitra").await;

    assert!(GREETING_RESPONSES.iter().any(|g| *g == reply));
}

#[tokio::test]
async fn test_personality_is_read_per_turn() {
    let store = prefs();
    let primary = FakeResponder::answering("primary", &["one", "two"]);
    let responder =
        ResponsePipeline::new(store.clone(), instant_retry()).with_primary(primary.clone());

    responder.get_response("first").await;
    store.set_personality(Personality::MindReader).unwrap();
    responder.get_response("second").await;

    assert_eq!(
        *primary.personalities.lock().unwrap(),
        vec![Personality::Default, Personality::MindReader]
    );
}
