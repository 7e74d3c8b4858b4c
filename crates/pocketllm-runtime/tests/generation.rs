//! End-to-end generation through the orchestrator.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{Harness, Script, eventually, fast_settings};
use pocketllm_core::{
    ChatMessage, EngineError, EngineErrorKind, FinishReason, GenerationRequest, ImportRequest,
    ImportSource, InferenceConfig, IntegrityError, OwnerId, Prompt, RuntimeState, Settings,
};
use pocketllm_runtime::RuntimeError;

/// Harness whose idle timeout never fires during a test.
async fn patient_harness() -> Harness {
    Harness::with_settings(Settings {
        idle_timeout_ms: Some(10_000),
        hard_timeout_ms: Some(10_000),
        ..fast_settings()
    })
    .await
}

fn options(max_tokens: u32) -> InferenceConfig {
    InferenceConfig {
        max_tokens: Some(max_tokens),
        ..InferenceConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_import_strips_directories_then_generates() {
    let h = Harness::new().await;
    let request = ImportRequest::new(
        ImportSource::Bytes {
            filename: "../../downloads/tiny-chat.gguf".to_string(),
            data: common::model_bytes(),
        },
        OwnerId::new("tester"),
    );
    let model = h.services.store.import(request).await.unwrap();

    assert_eq!(model.filename, "tiny-chat.gguf");
    let path = h.path_of(&model);
    assert_eq!(path.parent(), Some(h.services.store.models_dir()));
    assert!(path.exists());

    h.engine.set_script(Script::tokens(&["Hello", ", ", "world"]));
    let result = h
        .services
        .orchestrator
        .complete(&model.id, "Say hello", options(16))
        .await
        .unwrap();

    assert_eq!(result.text, "Hello, world");
    assert_eq!(result.token_count, 3);
    assert_eq!(result.finish_reason, FinishReason::Completed);
    assert!(!result.stopped_at_limit);
    assert_eq!(h.engine.loaded_path(), Some(path));
    assert_eq!(h.services.runtime.state(), RuntimeState::Ready);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_request_is_rejected_while_busy() {
    let h = patient_harness().await;
    let model = h.import("alpha.gguf").await;
    h.engine.set_script(Script {
        stall_after: Some(1),
        ..Script::tokens(&["first", "never"])
    });

    let orchestrator = Arc::clone(&h.services.orchestrator);
    let id = model.id.clone();
    let running = tokio::spawn(async move {
        orchestrator
            .chat_complete(&id, vec![ChatMessage::user("hi")], options(64))
            .await
    });
    eventually(|| h.services.runtime.state() == RuntimeState::Generating).await;

    let err = h
        .services
        .orchestrator
        .complete(&model.id, "too soon", options(8))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Busy {
            retry_after: Duration::from_millis(250)
        }
    );
    assert!(err.is_retryable());

    assert!(h.services.orchestrator.stop_generation().await);
    let result = running.await.unwrap().unwrap();
    assert_eq!(result.text, "first");
    assert!(!h.services.orchestrator.is_busy());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_truncated_model_fails_before_generation() {
    let h = Harness::new().await;
    let model = h.import("alpha.gguf").await;
    tokio::fs::write(h.path_of(&model), vec![0x47, 0x47, 0x55, 0x46, 0, 0])
        .await
        .unwrap();

    let err = h
        .services
        .orchestrator
        .complete(&model.id, "anything", options(8))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RuntimeError::Integrity(IntegrityError::Undersized { .. })
    ));
    assert_eq!(h.engine.loads(), 0);
    assert!(!h.services.runtime.is_loaded(&model.id).await);
    assert!(!h.services.orchestrator.is_busy());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_idle_stall_returns_partial_output() {
    let h = Harness::new().await;
    let model = h.import("alpha.gguf").await;
    let pieces: Vec<String> = (0..50).map(|i| format!("t{i} ")).collect();
    let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
    h.engine.set_script(Script {
        stall_after: Some(40),
        ..Script::tokens(&refs)
    });

    let result = h
        .services
        .orchestrator
        .complete(&model.id, "count", options(200))
        .await
        .unwrap();

    assert_eq!(result.token_count, 40);
    assert_eq!(result.text, pieces[..40].concat());
    assert!(result.stopped_at_limit);
    assert_eq!(result.finish_reason, FinishReason::IdleTimeout);
    assert_eq!(h.services.runtime.state(), RuntimeState::Ready);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_ignoring_cancel_still_settles() {
    let h = Harness::new().await;
    let model = h.import("alpha.gguf").await;
    h.engine.set_script(Script {
        stall_after: Some(2),
        ack_cancel: false,
        ..Script::tokens(&["a", "b", "c"])
    });

    let result = h
        .services
        .orchestrator
        .complete(&model.id, "go", options(32))
        .await
        .unwrap();

    assert_eq!(result.text, "ab");
    assert_eq!(result.finish_reason, FinishReason::IdleTimeout);
    assert!(!h.services.orchestrator.is_busy());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_tokens_hits_hard_timeout() {
    let h = Harness::new().await;
    let model = h.import("alpha.gguf").await;
    h.engine.set_script(Script {
        stall_after: Some(0),
        ..Script::tokens(&["late"])
    });

    let err = h
        .services
        .orchestrator
        .complete(&model.id, "hello?", options(8))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RuntimeError::Timeout {
            waited: Duration::from_millis(600)
        }
    );
    assert_eq!(h.services.runtime.state(), RuntimeState::Ready);
    assert!(!h.services.orchestrator.is_busy());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_hanging_load_hits_hard_timeout() {
    let h = Harness::new().await;
    let model = h.import("alpha.gguf").await;
    h.engine.set_script(Script {
        load_delay: Duration::from_secs(2),
        ..Script::tokens(&["never"])
    });

    let started = std::time::Instant::now();
    let err = h
        .services
        .orchestrator
        .complete(&model.id, "hello?", options(8))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RuntimeError::Timeout {
            waited: Duration::from_millis(600)
        }
    );
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert!(!h.services.orchestrator.is_busy());

    // The abandoned load still completes for the next request
    eventually(|| h.services.runtime.current().is_some()).await;
    let result = h
        .services
        .orchestrator
        .complete(&model.id, "again", options(8))
        .await
        .unwrap();
    assert_eq!(result.text, "never");
    assert_eq!(h.engine.loads(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_returns_partial_and_ready() {
    let h = patient_harness().await;
    let model = h.import("alpha.gguf").await;
    h.engine.set_script(Script {
        stall_after: Some(3),
        ..Script::tokens(&["one ", "two ", "three ", "four "])
    });

    let orchestrator = Arc::clone(&h.services.orchestrator);
    let id = model.id.clone();
    let running =
        tokio::spawn(async move { orchestrator.complete(&id, "count", options(64)).await });
    eventually(|| h.services.runtime.state() == RuntimeState::Generating).await;

    assert!(h.services.orchestrator.stop_generation().await);
    assert_eq!(h.services.runtime.state(), RuntimeState::Ready);

    let result = running.await.unwrap().unwrap();
    assert_eq!(result.finish_reason, FinishReason::Cancelled);
    assert!(result.stopped_at_limit);
    assert!(result.text.starts_with("one "));

    // Nothing left to stop
    assert!(!h.services.orchestrator.stop_generation().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_context_tears_down_and_next_request_reloads() {
    let h = Harness::new().await;
    let model = h.import("alpha.gguf").await;
    h.engine.set_script(Script {
        generate_error: Some(EngineError::new(
            EngineErrorKind::ContextInvalid,
            "kv cache corrupted",
        )),
        ..Script::tokens(&["ok"])
    });

    let err = h
        .services
        .orchestrator
        .complete(&model.id, "first", options(8))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Generation {
            context_invalidated: true,
            ..
        }
    ));
    assert_eq!(h.services.runtime.state(), RuntimeState::Error);
    assert!(h.services.runtime.current().is_none());
    assert_eq!(h.engine.live_contexts(), 0);

    let result = h
        .services
        .orchestrator
        .complete(&model.id, "second", options(8))
        .await
        .unwrap();
    assert_eq!(result.text, "ok");
    assert_eq!(h.engine.loads(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_other_generation_errors_keep_context() {
    let h = Harness::new().await;
    let model = h.import("alpha.gguf").await;
    h.engine.set_script(Script {
        generate_error: Some(EngineError::new(EngineErrorKind::OutOfMemory, "oom")),
        ..Script::tokens(&["ok"])
    });

    let err = h
        .services
        .orchestrator
        .complete(&model.id, "first", options(8))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Generation {
            context_invalidated: false,
            ..
        }
    ));
    assert_eq!(h.services.runtime.state(), RuntimeState::Ready);
    assert!(h.services.runtime.is_loaded(&model.id).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_generation_switches_models() {
    let h = Harness::new().await;
    let alpha = h.import("alpha.gguf").await;
    let beta = h.import("beta.gguf").await;
    h.engine.set_script(Script::tokens(&["x"]));

    h.services
        .orchestrator
        .complete(&alpha.id, "a", options(4))
        .await
        .unwrap();
    h.services
        .orchestrator
        .complete(&beta.id, "b", options(4))
        .await
        .unwrap();

    assert_eq!(h.engine.loads(), 2);
    assert_eq!(h.engine.max_live_contexts(), 1);
    assert!(h.services.runtime.is_loaded(&beta.id).await);
    assert!(!h.services.runtime.is_loaded(&alpha.id).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_progress_is_monotonic_and_complete() {
    let h = Harness::new().await;
    let model = h.import("alpha.gguf").await;
    h.engine.set_script(Script {
        load_delay: Duration::from_millis(20),
        ..Script::tokens(&["a", "b", "c", "d"])
    });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let request = GenerationRequest::new(
        model.id.clone(),
        Prompt::Text("go".to_string()),
        options(4),
    )
    .with_topic("chat-1")
    .with_progress(Arc::new(move |p: u8| sink_seen.lock().unwrap().push(p)));

    let mut bus = h.services.events.subscribe();
    h.services.orchestrator.generate(request).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
    assert!(seen.contains(&85));
    assert!(seen.contains(&90));
    assert!(seen.iter().filter(|p| (90..100).contains(*p)).count() >= 2);

    let mut topics = Vec::new();
    while let Ok(event) = bus.try_recv() {
        if let pocketllm_core::AppEvent::GenerationProgress { topic, percent } = event {
            topics.push((topic, percent));
        }
    }
    assert!(topics.iter().all(|(t, _)| t == "chat-1"));
    assert_eq!(topics.last().map(|(_, p)| *p), Some(100));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reasoning_is_extracted_and_stored() {
    let h = Harness::new().await;
    let model = h.import("alpha.gguf").await;
    h.engine
        .set_script(Script::tokens(&["<think>", "add them", "</think>", "4"]));

    let result = h
        .services
        .orchestrator
        .complete(&model.id, "2+2?", options(16))
        .await
        .unwrap();

    assert_eq!(result.text, "<think>add them</think>4");
    assert_eq!(result.visible_text, "4");
    assert_eq!(result.segments.len(), 1);
    assert_eq!(result.segments[0].segment.content, "add them");
    assert_eq!(h.segments.len(), 1);

    let stored = h
        .services
        .recorder
        .get(&result.segments[0].hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.content, "add them");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_model_is_not_found() {
    let h = Harness::new().await;
    let err = h
        .services
        .orchestrator
        .complete(
            &pocketllm_core::ArtifactId::for_name("ghost"),
            "boo",
            options(4),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ModelNotFound(_)));
    assert!(!h.services.orchestrator.is_busy());
}
