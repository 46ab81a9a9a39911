//! Process-lifetime artifact context and readiness state machine
//!
//! All shared mutable state lives here: the model handle and the load-error
//! flag. States move `NotLoaded → Loaded` (terminal for the process
//! lifetime) or `NotLoaded → LoadFailed`. After a failed load, each
//! inference request retries the load exactly once before reporting
//! unavailability; the attempt-and-check is a single write-locked section,
//! so concurrent requests racing on a failed load cannot corrupt the state
//! or storm the filesystem.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::align::FeatureMode;
use crate::error::{PreverError, Result};
use crate::model::{LinearModel, Regressor};
use crate::schema::{FeatureSchema, SchemaMetadata};

/// Locations of the trainer-emitted artifacts
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    /// Serialized regressor
    pub model: PathBuf,
    /// Ordered feature-column list
    pub columns: PathBuf,
    /// Optional training metadata
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    /// Conventional artifact names inside a directory
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join("modelo_imoveis.json"),
            columns: dir.join("modelo_columns.json"),
            metadata: dir.join("modelo_metadata.json"),
        }
    }
}

/// Startup override for the alignment policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModePolicy {
    /// Detect the policy from the schema shape
    #[default]
    Auto,
    /// Ignore the schema artifact and serve the fixed `[area, quartos]` contract
    ForceLegacy,
    /// Treat every schema column as a literal required field
    ForceStrict,
}

/// Everything a request handler needs, loaded as one immutable unit
#[derive(Debug)]
pub struct LoadedArtifacts {
    /// The trained regressor
    pub model: LinearModel,
    /// Alignment policy, fixed at load time
    pub mode: FeatureMode,
    /// Training metadata, logging/ops only
    pub metadata: Option<SchemaMetadata>,
}

#[derive(Debug)]
enum ReadyState {
    NotLoaded,
    Loaded(Arc<LoadedArtifacts>),
    LoadFailed(String),
}

/// Shared model/schema context, passed explicitly to handlers
///
/// Never ambient: handlers receive this through application state, and the
/// aligner and post-processor stay pure functions of their inputs.
#[derive(Debug)]
pub struct ModelContext {
    paths: ArtifactPaths,
    policy: ModePolicy,
    state: RwLock<ReadyState>,
}

impl ModelContext {
    /// Create a context in the `NotLoaded` state
    #[must_use]
    pub fn new(paths: ArtifactPaths, policy: ModePolicy) -> Self {
        Self {
            paths,
            policy,
            state: RwLock::new(ReadyState::NotLoaded),
        }
    }

    /// True once a model has been loaded successfully
    pub fn is_loaded(&self) -> bool {
        matches!(
            self.state.read().as_deref(),
            Ok(ReadyState::Loaded(_))
        )
    }

    /// Get the loaded artifacts, attempting the load at most once per call
    ///
    /// Fast path is a read lock on the terminal `Loaded` state. Otherwise a
    /// write lock re-checks (another request may have just won the load) and
    /// attempts the load once; failure is recorded so `is_loaded` and health
    /// reporting stay accurate.
    pub fn acquire(&self) -> Result<Arc<LoadedArtifacts>> {
        {
            let state = self
                .state
                .read()
                .map_err(|_| PreverError::Internal("context lock poisoned".to_string()))?;
            if let ReadyState::Loaded(artifacts) = &*state {
                return Ok(Arc::clone(artifacts));
            }
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| PreverError::Internal("context lock poisoned".to_string()))?;
        match &*state {
            ReadyState::Loaded(artifacts) => return Ok(Arc::clone(artifacts)),
            ReadyState::LoadFailed(last) => {
                log::debug!("retrying artifact load after earlier failure: {last}");
            },
            ReadyState::NotLoaded => {},
        }

        match self.load_artifacts() {
            Ok(artifacts) => {
                let artifacts = Arc::new(artifacts);
                *state = ReadyState::Loaded(Arc::clone(&artifacts));
                Ok(artifacts)
            },
            Err(err) => {
                *state = ReadyState::LoadFailed(err.to_string());
                Err(err)
            },
        }
    }

    /// Explicit load attempt, single-writer guarded
    ///
    /// Useful to warm the context at startup or recover from `LoadFailed`
    /// without waiting for request traffic. Refuses once a model is loaded:
    /// the success state is terminal and there is no hot-reload while
    /// serving.
    pub fn reload(&self) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| PreverError::Internal("context lock poisoned".to_string()))?;
        if matches!(&*state, ReadyState::Loaded(_)) {
            return Err(PreverError::Internal(
                "model already loaded; hot-reload is not supported".to_string(),
            ));
        }

        match self.load_artifacts() {
            Ok(artifacts) => {
                *state = ReadyState::Loaded(Arc::new(artifacts));
                Ok(())
            },
            Err(err) => {
                *state = ReadyState::LoadFailed(err.to_string());
                Err(err)
            },
        }
    }

    /// Load and cross-check all artifacts as one unit
    ///
    /// The schema artifact is optional: missing or corrupt falls back to the
    /// legacy two-feature mode with a warning. The model artifact is
    /// mandatory. A feature-count disagreement between the two makes the
    /// deployment unusable and is reported as `ModelUnavailable` rather than
    /// surfacing later as per-request internal errors.
    fn load_artifacts(&self) -> Result<LoadedArtifacts> {
        let model = LinearModel::load(&self.paths.model)?;

        let mode = match self.policy {
            ModePolicy::ForceLegacy => {
                log::info!("legacy mode forced; schema artifact ignored");
                FeatureMode::Legacy
            },
            ModePolicy::ForceStrict => match FeatureSchema::load(&self.paths.columns) {
                Ok(schema) => FeatureMode::Strict(schema),
                Err(err) => {
                    log::warn!("{err}; falling back to legacy mode");
                    FeatureMode::Legacy
                },
            },
            ModePolicy::Auto => match FeatureSchema::load(&self.paths.columns) {
                Ok(schema) => FeatureMode::from_schema(schema),
                Err(err) => {
                    log::warn!("{err}; falling back to legacy mode");
                    FeatureMode::Legacy
                },
            },
        };

        if mode.n_features() != model.n_features() {
            return Err(PreverError::ModelUnavailable {
                reason: format!(
                    "artifact mismatch: model expects {} features, {} mode provides {}",
                    model.n_features(),
                    mode.label(),
                    mode.n_features()
                ),
            });
        }

        let metadata = SchemaMetadata::load(&self.paths.metadata).ok();
        if let Some(meta) = &metadata {
            log::info!(
                "model {} loaded: {} features, mode={}, r2={:?}, price range={:?}",
                meta.version,
                meta.n_features,
                mode.label(),
                meta.r2,
                meta.price_range
            );
        } else {
            log::info!(
                "model loaded: {} features, mode={}",
                model.n_features(),
                mode.label()
            );
        }

        Ok(LoadedArtifacts {
            model,
            mode,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_model(dir: &Path, coefficients: &[f64]) {
        let model = LinearModel::new(100.0, coefficients.to_vec());
        model
            .save(&dir.join("modelo_imoveis.json"))
            .expect("save model");
    }

    fn write_columns(dir: &Path, columns: &[&str]) {
        let json = serde_json::to_string(columns).expect("serialize");
        fs::write(dir.join("modelo_columns.json"), json).expect("write columns");
    }

    #[test]
    fn test_acquire_loads_once_and_is_terminal() {
        let dir = TempDir::new().expect("tempdir");
        write_model(dir.path(), &[2.0, 3.0]);
        write_columns(dir.path(), &["listing.usableAreas", "listing.bedrooms"]);

        let context = ModelContext::new(ArtifactPaths::in_dir(dir.path()), ModePolicy::Auto);
        assert!(!context.is_loaded());

        let first = context.acquire().expect("acquire");
        let second = context.acquire().expect("acquire");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(context.is_loaded());
        assert!(matches!(first.mode, FeatureMode::Aliased(_)));
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let dir = TempDir::new().expect("tempdir");
        let context = ModelContext::new(ArtifactPaths::in_dir(dir.path()), ModePolicy::Auto);

        let err = context.acquire().expect_err("must fail");
        assert!(matches!(err, PreverError::ModelUnavailable { .. }));
        assert!(!context.is_loaded());
    }

    #[test]
    fn test_failed_load_self_heals_on_next_request() {
        let dir = TempDir::new().expect("tempdir");
        let context = ModelContext::new(ArtifactPaths::in_dir(dir.path()), ModePolicy::Auto);

        // First request: nothing on disk yet.
        context.acquire().expect_err("must fail");

        // Artifacts appear; the next request retries the load once.
        write_model(dir.path(), &[2.0, 3.0]);
        write_columns(dir.path(), &["listing.usableAreas", "listing.bedrooms"]);
        let artifacts = context.acquire().expect("self-heal");
        assert_eq!(artifacts.model.n_features(), 2);
    }

    #[test]
    fn test_missing_schema_falls_back_to_legacy() {
        let dir = TempDir::new().expect("tempdir");
        write_model(dir.path(), &[2.0, 3.0]);

        let context = ModelContext::new(ArtifactPaths::in_dir(dir.path()), ModePolicy::Auto);
        let artifacts = context.acquire().expect("acquire");
        assert!(matches!(artifacts.mode, FeatureMode::Legacy));
    }

    #[test]
    fn test_artifact_feature_mismatch_is_unavailable() {
        let dir = TempDir::new().expect("tempdir");
        write_model(dir.path(), &[2.0, 3.0, 4.0]);
        write_columns(dir.path(), &["listing.usableAreas", "listing.bedrooms"]);

        let context = ModelContext::new(ArtifactPaths::in_dir(dir.path()), ModePolicy::Auto);
        let err = context.acquire().expect_err("must fail");
        assert!(matches!(err, PreverError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_force_legacy_ignores_schema() {
        let dir = TempDir::new().expect("tempdir");
        write_model(dir.path(), &[2.0, 3.0]);
        write_columns(dir.path(), &["a", "b", "c", "d"]);

        let context =
            ModelContext::new(ArtifactPaths::in_dir(dir.path()), ModePolicy::ForceLegacy);
        let artifacts = context.acquire().expect("acquire");
        assert!(matches!(artifacts.mode, FeatureMode::Legacy));
    }

    #[test]
    fn test_force_strict_uses_literal_columns() {
        let dir = TempDir::new().expect("tempdir");
        write_model(dir.path(), &[1.0, 2.0, 3.0, 4.0]);
        write_columns(dir.path(), &["area", "quartos", "banheiros", "vagas"]);

        let context =
            ModelContext::new(ArtifactPaths::in_dir(dir.path()), ModePolicy::ForceStrict);
        let artifacts = context.acquire().expect("acquire");
        assert!(matches!(artifacts.mode, FeatureMode::Strict(_)));
    }

    #[test]
    fn test_reload_recovers_then_refuses() {
        let dir = TempDir::new().expect("tempdir");
        let context = ModelContext::new(ArtifactPaths::in_dir(dir.path()), ModePolicy::Auto);

        context.reload().expect_err("nothing to load yet");

        write_model(dir.path(), &[2.0, 3.0]);
        write_columns(dir.path(), &["listing.usableAreas", "listing.bedrooms"]);
        context.reload().expect("reload after artifacts appear");
        assert!(context.is_loaded());

        let err = context.reload().expect_err("loaded state is terminal");
        assert!(matches!(err, PreverError::Internal(_)));
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let dir = TempDir::new().expect("tempdir");
        write_model(dir.path(), &[2.0, 3.0]);
        write_columns(dir.path(), &["listing.usableAreas", "listing.bedrooms"]);

        let context = Arc::new(ModelContext::new(
            ArtifactPaths::in_dir(dir.path()),
            ModePolicy::Auto,
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = Arc::clone(&context);
                std::thread::spawn(move || context.acquire().expect("acquire"))
            })
            .collect();

        let loaded: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();
        for artifacts in &loaded[1..] {
            assert!(Arc::ptr_eq(&loaded[0], artifacts));
        }
    }
}
