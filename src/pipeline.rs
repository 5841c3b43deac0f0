//! Build/bind pipeline
//!
//! A model moves through `Elaborated → Declared → Translated → Built →
//! Bound`. Each step either advances the stage or moves the pipeline to
//! [`Stage::Failed`]; a failed pipeline is never retried, later calls report
//! the recorded failure, and a failed build never loads a library.

use crate::codegen::{assemble, generate_unit, GeneratedUnit};
use crate::compiler::{compile_source, Artifact};
use crate::config::BuildConfig;
use crate::decls::emit_declarations;
use crate::error::{Error, Result};
use crate::model::ElaboratedModel;
use crate::sim::BoundSimulation;
use crate::types::TypeCache;

/// Step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Failure {
    Declaration,
    Translation,
    Build,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Elaborated,
    Declared,
    Translated,
    Built,
    Bound,
    Failed(Failure),
}

pub struct Pipeline {
    model: ElaboratedModel,
    config: BuildConfig,
    stage: Stage,
    unit: Option<GeneratedUnit>,
    artifact: Option<Artifact>,
    /// Message of the error that failed the pipeline
    failure: Option<String>,
}

impl Pipeline {
    pub fn new(model: ElaboratedModel, config: BuildConfig) -> Self {
        Self { model, config, stage: Stage::Elaborated, unit: None, artifact: None, failure: None }
    }

    /// Message of the error that moved the pipeline to [`Stage::Failed`]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn check_failed(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(Error::PipelineFailed(message.clone())),
            None => Ok(()),
        }
    }

    fn fail(&mut self, step: Failure, err: Error) -> Error {
        tracing::warn!("{}: {:?} failed: {}", self.model.name, step, err);
        self.stage = Stage::Failed(step);
        self.failure = Some(err.to_string());
        err
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn model(&self) -> &ElaboratedModel {
        &self.model
    }

    pub fn unit(&self) -> Option<&GeneratedUnit> {
        self.unit.as_ref()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Classify every net, then translate every block
    pub fn generate(&mut self) -> Result<&GeneratedUnit> {
        self.check_failed()?;
        let unit = match self.unit.take() {
            Some(unit) => unit,
            None => {
                let decls = match emit_declarations(&self.model, &mut TypeCache::new()) {
                    Ok(decls) => decls,
                    Err(err) => return Err(self.fail(Failure::Declaration, err)),
                };
                self.stage = Stage::Declared;
                tracing::debug!("{}: {} nets declared", self.model.name, decls.layout.nets.len());

                let unit = match assemble(&self.model, decls, self.config.trace) {
                    Ok(unit) => unit,
                    Err(err) => return Err(self.fail(Failure::Translation, err)),
                };
                self.stage = Stage::Translated;
                tracing::debug!("{}: {} blocks translated", self.model.name, self.model.blocks.len());
                unit
            }
        };
        Ok(&*self.unit.insert(unit))
    }

    pub fn build(&mut self) -> Result<&Artifact> {
        self.check_failed()?;
        let artifact = match self.artifact.take() {
            Some(artifact) => artifact,
            None => {
                let unit = self.generate()?.clone();
                let artifact = match compile_source(&unit.source, &unit.class_identity, &self.config) {
                    Ok(artifact) => artifact,
                    Err(err) => return Err(self.fail(Failure::Build, err)),
                };
                self.stage = Stage::Built;
                tracing::info!(
                    "{}: built {}{}",
                    self.model.name,
                    artifact.library.display(),
                    if artifact.cached { " (cached)" } else { "" }
                );
                artifact
            }
        };
        Ok(&*self.artifact.insert(artifact))
    }

    /// Build if needed, then load and verify the library
    pub fn bind(mut self) -> Result<BoundSimulation> {
        let library = self.build()?.library.clone();
        let layout = self.unit.take().map(|u| u.layout).unwrap_or_default();
        let sim = BoundSimulation::bind(&self.model.name, &library, layout)?;
        self.stage = Stage::Bound;
        tracing::info!("{}: bound {} nets", self.model.name, self.model.nets.len());
        Ok(sim)
    }
}

/// Generate the unit for `model` without building it
pub fn generate_source(model: &ElaboratedModel, config: &BuildConfig) -> Result<String> {
    Ok(generate_unit(model, config.trace)?.source)
}

/// Translate, build and bind `model` in one step
pub fn translate(model: ElaboratedModel, config: &BuildConfig) -> Result<BoundSimulation> {
    Pipeline::new(model, config.clone()).bind()
}
