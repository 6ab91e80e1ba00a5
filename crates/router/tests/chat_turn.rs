//! End-to-end turn arbitration tests
//!
//! These drive the full pipeline offline: deterministic embedder,
//! in-memory vector indexes, structural contradiction checks only.

use mnemo_core::{Authority, Error, ObservationSource};
use mnemo_router::{ChatTurnRequest, MemoryRouter};

async fn seed_fact(router: &MemoryRouter, domain: &str, key: &str, value: &str, authority: Authority) {
    router
        .truth()
        .register_observation(domain, key, value, ObservationSource::IngestDoc, authority)
        .await
        .unwrap();
}

/// Durable fact beats an uncertain draft
#[tokio::test]
async fn test_uncertain_draft_overridden() {
    let router = MemoryRouter::offline();
    seed_fact(&router, "identity", "name", "Morten", Authority::LongTerm).await;

    let response = router
        .handle_chat_turn(ChatTurnRequest::new("What is my name?", "I don't know"))
        .await;

    assert!(response.was_overridden);
    assert!(response.final_reply.contains("Morten"));
    assert!(response.conflict_reason.is_some());
    assert!(response.memory.canonical_facts_retrieved > 0);
}

/// With no canonical memory the draft stands
#[tokio::test]
async fn test_no_memory_trusts_draft() {
    let router = MemoryRouter::offline();

    let response = router
        .handle_chat_turn(ChatTurnRequest::new("What is my name?", "I don't know"))
        .await;

    assert!(!response.was_overridden);
    assert_eq!(response.final_reply, "I don't know");
}

/// Numbered keys synthesize the full enumeration
#[tokio::test]
async fn test_children_list_synthesized() {
    let router = MemoryRouter::offline();
    seed_fact(&router, "family", "child_1", "Anna", Authority::LongTerm).await;
    seed_fact(&router, "family", "child_2", "Ben", Authority::LongTerm).await;
    seed_fact(&router, "family", "child_3", "Cleo", Authority::LongTerm).await;

    let response = router
        .handle_chat_turn(ChatTurnRequest::new(
            "Who are my children?",
            "Your child is Anna.",
        ))
        .await;

    assert!(response.was_overridden);
    assert!(response.final_reply.contains("Anna"));
    assert!(response.final_reply.contains("Ben"));
    assert!(response.final_reply.contains("Cleo"));
}

/// Small talk passes through untouched
#[tokio::test]
async fn test_small_talk_passes_through() {
    let router = MemoryRouter::offline();
    seed_fact(&router, "identity", "name", "Morten", Authority::LongTerm).await;

    let response = router
        .handle_chat_turn(ChatTurnRequest::new("Hello", "Hi, how can I help?"))
        .await;

    assert!(!response.was_overridden);
    assert_eq!(response.final_reply, "Hi, how can I help?");
}

/// CLI test observations never outvote the user's statements
#[tokio::test]
async fn test_cli_observations_do_not_poison_truth() {
    let router = MemoryRouter::offline();
    let truth = router.truth();

    for _ in 0..10 {
        truth
            .register_observation(
                "identity",
                "name",
                "Morpheus",
                ObservationSource::CliTest,
                Authority::Test,
            )
            .await
            .unwrap();
    }
    for _ in 0..3 {
        truth
            .register_observation(
                "identity",
                "name",
                "Morten",
                ObservationSource::ChatUser,
                Authority::ShortTerm,
            )
            .await
            .unwrap();
    }

    let response = router
        .handle_chat_turn(ChatTurnRequest::new(
            "What is my name?",
            "Your name is Morpheus.",
        ))
        .await;

    assert!(response.was_overridden);
    assert!(response.final_reply.contains("Morten"));
}

/// An unknown key becomes learnable after repeated valid usage
#[tokio::test]
async fn test_schema_learns_repeated_key() {
    let router = MemoryRouter::offline();
    let truth = router.truth();

    // Seed the domain so research_area is not its first key
    truth
        .register_observation(
            "identity",
            "name",
            "Morten",
            ObservationSource::ChatUser,
            Authority::ShortTerm,
        )
        .await
        .unwrap();

    let attempt = || {
        truth.register_observation(
            "identity",
            "research_area",
            "cosmology",
            ObservationSource::IngestDoc,
            Authority::MediumTerm,
        )
    };

    assert!(matches!(attempt().await, Err(Error::SchemaViolation(_))));
    assert!(matches!(attempt().await, Err(Error::SchemaViolation(_))));
    // Third sighting crosses the learning threshold
    assert!(attempt().await.is_ok());
    // Fourth call succeeds and the key is persisted
    assert!(attempt().await.is_ok());
    assert_eq!(
        truth
            .get_canonical_truth("identity", "research_area")
            .unwrap()
            .value,
        "cosmology"
    );
}

/// Writes from turn N are visible to turn N+1
#[tokio::test]
async fn test_cross_turn_visibility() {
    let router = MemoryRouter::offline();

    let response = router
        .handle_chat_turn(ChatTurnRequest::new(
            "Hi, my name is Morten",
            "Nice to meet you, Morten!",
        ))
        .await;
    assert!(!response.was_overridden);

    // The asserted name must ground the next turn
    let response = router
        .handle_chat_turn(ChatTurnRequest::new(
            "What is my name?",
            "Your name is Morpheus.",
        ))
        .await;

    assert!(response.was_overridden);
    assert!(response.final_reply.contains("Morten"));
}

/// Chunks stored in a turn are invisible to that turn's retrieval but
/// visible to later turns
#[tokio::test]
async fn test_same_turn_chunk_invisibility() {
    let router = MemoryRouter::offline();

    let response = router
        .handle_chat_turn(ChatTurnRequest::new(
            "I really enjoy hiking in the mountains",
            "Sounds wonderful!",
        ))
        .await;
    assert_eq!(response.memory.context_chunks_retrieved, 0);
    assert!(response.memory.stored.chunk_id.is_some());

    let response = router
        .handle_chat_turn(ChatTurnRequest::new(
            "What do I enjoy about the mountains and hiking?",
            "You enjoy hiking.",
        ))
        .await;
    assert!(response.memory.context_chunks_retrieved > 0);
}

/// The response is one self-contained JSON document
#[tokio::test]
async fn test_response_roundtrips_as_json() {
    let router = MemoryRouter::offline();
    seed_fact(&router, "identity", "name", "Morten", Authority::LongTerm).await;

    let response = router
        .handle_chat_turn(ChatTurnRequest::new("What is my name?", "I don't know"))
        .await;

    let json = serde_json::to_string(&response).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed["wasOverridden"], true);
    assert!(parsed["finalReply"].as_str().unwrap().contains("Morten"));
    assert!(parsed["metadata"]["sessionId"].is_string());
    assert!(parsed["routingLog"]["steps"].is_array());
}

/// Disabled storage leaves no chunk behind
#[tokio::test]
async fn test_storage_opt_out() {
    let router = MemoryRouter::offline();

    let response = router
        .handle_chat_turn(
            ChatTurnRequest::new("What is my name?", "I don't know").without_storage(),
        )
        .await;

    assert!(response.memory.stored.chunk_id.is_none());
    assert_eq!(router.mesh().chunk_count(), 0);
}

/// Session history accumulates across turns and feeds the summary
#[tokio::test]
async fn test_session_summary_populated() {
    let router = MemoryRouter::offline();

    router
        .handle_chat_turn(
            ChatTurnRequest::new("Hello", "Hi!").with_session("s1"),
        )
        .await;
    let response = router
        .handle_chat_turn(
            ChatTurnRequest::new("I like tea", "Noted.").with_session("s1"),
        )
        .await;

    assert!(response.memory_summary.contains("turns"));
    assert_eq!(router.mesh().get_session_history("s1", 10).len(), 4);
}

/// The optimization cycle runs end to end and resolves cleanly
#[tokio::test]
async fn test_manual_optimization_cycle() {
    let router = MemoryRouter::offline();

    // Drive override rate above its degradation threshold
    seed_fact(&router, "identity", "name", "Morten", Authority::LongTerm).await;
    for _ in 0..4 {
        router
            .handle_chat_turn(ChatTurnRequest::new("What is my name?", "I don't know"))
            .await;
    }

    router.run_optimization_cycle();

    let history = router.optimizer().history();
    assert!(history
        .iter()
        .any(|a| a.parameter == "ame_override_strength"));
    // The adjusted strictness propagated to the enforcer
    assert!(router.enforcer().strictness_for("preferences") < 0.6);
}
