// Registry status bookkeeping, without any real model weights. Slots
// whose files are missing or whose dependencies are unmet must fail in
// isolation before any native load is attempted.

use dogcare_core::{Descriptor, LoadMode, LoadState, ModelRegistry};

fn text_descriptor(file_name: &str) -> Descriptor {
    Descriptor {
        file_name: file_name.into(),
        display_name: file_name.into(),
        load_mode: LoadMode::TextModel,
    }
}

fn projector_descriptor(file_name: &str, base: &str) -> Descriptor {
    Descriptor {
        file_name: file_name.into(),
        display_name: file_name.into(),
        load_mode: LoadMode::Projector {
            base_model: base.into(),
        },
    }
}

#[test]
fn missing_file_fails_the_slot_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ModelRegistry::new(
        vec![text_descriptor("nonexistent.gguf")],
        vec![dir.path().to_path_buf()],
    );

    registry.ensure_models_loaded();

    let status = &registry.statuses()[0];
    assert_eq!(status.state, LoadState::Failed("model file not found".into()));
    assert!(status.location.is_none());
    assert!(!registry.is_vision_pipeline_ready());
}

#[test]
fn projector_without_loaded_base_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mmproj = dir.path().join("mmproj-test.gguf");
    std::fs::write(&mmproj, b"not a real projector").unwrap();

    let mut registry = ModelRegistry::new(
        vec![projector_descriptor("mmproj-test.gguf", "base.gguf")],
        vec![dir.path().to_path_buf()],
    );

    registry.ensure_models_loaded();

    let status = &registry.statuses()[0];
    match &status.state {
        LoadState::Failed(reason) => {
            assert!(reason.contains("the text model must be loaded first"), "{reason}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    // The file itself resolved; only the dependency was unmet.
    assert_eq!(status.location.as_deref(), Some(mmproj.as_path()));
}

#[test]
fn ensure_models_loaded_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ModelRegistry::new(
        vec![text_descriptor("nonexistent.gguf")],
        vec![dir.path().to_path_buf()],
    );

    registry.ensure_models_loaded();
    let first = registry.statuses()[0].state.clone();
    registry.ensure_models_loaded();
    assert_eq!(registry.statuses()[0].state, first);
}

#[test]
fn slots_fail_independently() {
    let dir = tempfile::tempdir().unwrap();
    let mmproj = dir.path().join("mmproj-b.gguf");
    std::fs::write(&mmproj, b"stub").unwrap();

    let mut registry = ModelRegistry::new(
        vec![
            text_descriptor("missing-a.gguf"),
            projector_descriptor("mmproj-b.gguf", "missing-a.gguf"),
        ],
        vec![dir.path().to_path_buf()],
    );

    registry.ensure_models_loaded();

    // Both fail, each for its own reason.
    assert!(matches!(registry.statuses()[0].state, LoadState::Failed(_)));
    assert!(matches!(registry.statuses()[1].state, LoadState::Failed(_)));
    assert!(registry.vision_resources().is_none());
}

#[test]
fn status_text_maps_every_state() {
    assert_eq!(LoadState::Pending.status_text(), "waiting");
    assert_eq!(LoadState::Loading.status_text(), "loading…");
    assert_eq!(LoadState::Loaded.status_text(), "loaded");
    assert_eq!(LoadState::Failed("x".into()).status_text(), "failed");
}

#[test]
fn models_subdirectory_is_searched() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("models");
    std::fs::create_dir(&nested).unwrap();
    let mmproj = nested.join("mmproj-nested.gguf");
    std::fs::write(&mmproj, b"stub").unwrap();

    let mut registry = ModelRegistry::new(
        vec![projector_descriptor("mmproj-nested.gguf", "absent.gguf")],
        vec![dir.path().to_path_buf()],
    );
    registry.ensure_models_loaded();

    // Resolution succeeded via models/; the failure is the unmet base
    // dependency, not a missing file.
    let status = &registry.statuses()[0];
    assert_eq!(status.location.as_deref(), Some(mmproj.as_path()));
    assert_ne!(status.state, LoadState::Failed("model file not found".into()));
}
