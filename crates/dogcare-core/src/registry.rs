//! Model registry: resolves GGUF files on disk, loads the session and
//! projector in dependency order, and reports per-slot status for the UI
//! layer. Constructed once at startup and passed down by reference;
//! there is no process-wide instance.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use llama_rs::LlamaModel;

use crate::error::LlamaError;
use crate::projector::MultimodalProjector;
use crate::session::InferenceSession;

/// How a model file is consumed once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadMode {
    /// Base language model: becomes an [`InferenceSession`].
    TextModel,
    /// mmproj file: becomes a [`MultimodalProjector`] against the named
    /// base model, which must already be loaded.
    Projector { base_model: String },
}

/// One model artifact the registry is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub file_name: String,
    pub display_name: String,
    pub load_mode: LoadMode,
}

/// Aggregate load status per logical model slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Pending,
    Loading,
    Loaded,
    Failed(String),
}

impl LoadState {
    pub fn status_text(&self) -> &'static str {
        match self {
            LoadState::Pending => "waiting",
            LoadState::Loading => "loading…",
            LoadState::Loaded => "loaded",
            LoadState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub descriptor: Descriptor,
    pub state: LoadState,
    pub location: Option<PathBuf>,
}

enum LoadedResource {
    Session(InferenceSession),
    Projector(MultimodalProjector),
}

pub struct ModelRegistry {
    search_dirs: Vec<PathBuf>,
    statuses: Vec<Status>,
    resources: Vec<Option<LoadedResource>>,
    started: bool,
}

impl ModelRegistry {
    pub fn new(descriptors: Vec<Descriptor>, search_dirs: Vec<PathBuf>) -> Self {
        let statuses: Vec<Status> = descriptors
            .into_iter()
            .map(|descriptor| Status {
                descriptor,
                state: LoadState::Pending,
                location: None,
            })
            .collect();
        let resources = statuses.iter().map(|_| None).collect();
        Self {
            search_dirs,
            statuses,
            resources,
            started: false,
        }
    }

    /// Default slot pair: the quantized vision-language model and its
    /// matching projector.
    pub fn with_default_models(search_dirs: Vec<PathBuf>) -> Self {
        Self::new(
            vec![
                Descriptor {
                    file_name: "Qwen3-VL-2B-Instruct-UD-IQ3_XXS.gguf".into(),
                    display_name: "Qwen3-VL-2B-Instruct".into(),
                    load_mode: LoadMode::TextModel,
                },
                Descriptor {
                    file_name: "mmproj-Qwen3VL-2B-Instruct-Q8_0.gguf".into(),
                    display_name: "Qwen3-VL projector".into(),
                    load_mode: LoadMode::Projector {
                        base_model: "Qwen3-VL-2B-Instruct-UD-IQ3_XXS.gguf".into(),
                    },
                },
            ],
            search_dirs,
        )
    }

    pub fn statuses(&self) -> &[Status] {
        &self.statuses
    }

    /// Load every slot, in declaration order. Idempotent; a failed slot
    /// does not stop the ones after it.
    pub fn ensure_models_loaded(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for index in 0..self.statuses.len() {
            self.load_slot(index);
        }
    }

    fn load_slot(&mut self, index: usize) {
        self.statuses[index].state = LoadState::Loading;

        let descriptor = self.statuses[index].descriptor.clone();
        let Some(path) = self.resolve_model_path(&descriptor.file_name) else {
            self.statuses[index].state = LoadState::Failed("model file not found".into());
            return;
        };
        self.statuses[index].location = Some(path.clone());

        let result = match &descriptor.load_mode {
            LoadMode::TextModel => InferenceSession::create(&path).map(LoadedResource::Session),
            LoadMode::Projector { base_model } => self
                .loaded_model(base_model)
                .ok_or_else(|| {
                    LlamaError::CouldNotInitializeProjector(
                        "the text model must be loaded first".into(),
                    )
                })
                .and_then(|model| {
                    let path_str = path.to_str().ok_or_else(|| {
                        LlamaError::CouldNotInitializeProjector(
                            "projector path is not valid UTF-8".into(),
                        )
                    })?;
                    MultimodalProjector::create(path_str, model)
                })
                .map(LoadedResource::Projector),
        };

        match result {
            Ok(resource) => {
                self.resources[index] = Some(resource);
                self.statuses[index].state = LoadState::Loaded;
                println!("✅ [registry] loaded {}", descriptor.display_name);
            }
            Err(err) => {
                eprintln!("❌ [registry] {} failed: {err}", descriptor.display_name);
                self.statuses[index].state = LoadState::Failed(err.to_string());
            }
        }
    }

    /// Shared weights handle of the loaded session for `file_name`.
    fn loaded_model(&self, file_name: &str) -> Option<Arc<LlamaModel>> {
        self.statuses
            .iter()
            .zip(&self.resources)
            .find_map(|(status, resource)| {
                if status.descriptor.file_name != file_name {
                    return None;
                }
                match resource {
                    Some(LoadedResource::Session(session)) => Some(session.model().clone()),
                    _ => None,
                }
            })
    }

    fn resolve_model_path(&self, file_name: &str) -> Option<PathBuf> {
        for dir in &self.search_dirs {
            let direct = dir.join(file_name);
            if direct.is_file() {
                return Some(direct);
            }
            let nested = dir.join("models").join(file_name);
            if nested.is_file() {
                return Some(nested);
            }
        }
        // Per-user fallback, the moral equivalent of the app's documents
        // directory.
        if let Some(data_dir) = dirs::data_dir() {
            let fallback = data_dir.join("dogcare").join("models").join(file_name);
            if fallback.is_file() {
                return Some(fallback);
            }
        }
        None
    }

    pub fn is_vision_pipeline_ready(&self) -> bool {
        let mut session = false;
        let mut projector = false;
        for resource in self.resources.iter().flatten() {
            match resource {
                LoadedResource::Session(_) => session = true,
                LoadedResource::Projector(_) => projector = true,
            }
        }
        session && projector
    }

    /// The loaded session/projector pair, once both slots are ready. The
    /// mutable session borrow is what serializes generation requests.
    pub fn vision_resources(
        &mut self,
    ) -> Option<(&mut InferenceSession, &MultimodalProjector)> {
        let mut session = None;
        let mut projector = None;
        for resource in self.resources.iter_mut().flatten() {
            match resource {
                LoadedResource::Session(s) => {
                    if session.is_none() {
                        session = Some(s);
                    }
                }
                LoadedResource::Projector(p) => {
                    if projector.is_none() {
                        projector = Some(&*p);
                    }
                }
            }
        }
        Some((session?, projector?))
    }
}
