/// Syllable synthesis: motor gestures in, synthetic syllable out.
///
/// Signal flow: reference pitch track -> alpha(t), beta(t) -> RK4 over the
/// coupled syrinx model -> synthetic waveform -> same feature extraction as
/// the reference.
///
/// The reference is only read. Everything a run produces (curves, trajectory,
/// tract pressures, later the score report) is owned by the returned
/// `SyntheticSyllable`.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::SimulationConfig;
use crate::constants::PhysicalConstants;
use crate::curve::{ControlCurve, ControlParameters};
use crate::error::{Result, SyrinxError};
use crate::features::FeatureExtractor;
use crate::integrator::{Integration, SyrinxModel};
use crate::score::{DissimilarityScorer, ScoreReport};
use crate::syllable::{Syllable, SyllableId};

#[derive(Debug, Clone)]
pub struct SyntheticSyllable {
    syllable: Syllable,
    params: ControlParameters,
    constants: PhysicalConstants,
    curve: ControlCurve,
    integration: Integration,
    scores: Option<ScoreReport>,
}

impl SyntheticSyllable {
    pub fn syllable(&self) -> &Syllable {
        &self.syllable
    }

    pub fn params(&self) -> &ControlParameters {
        &self.params
    }

    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }

    /// alpha(t), beta(t) the run consumed.
    pub fn curve(&self) -> &ControlCurve {
        &self.curve
    }

    /// Raw integration output: unnormalized waveform, trajectory, tract buffers.
    pub fn integration(&self) -> &Integration {
        &self.integration
    }

    pub fn diverged(&self) -> bool {
        self.integration.diverged()
    }

    pub fn scores(&self) -> Option<&ScoreReport> {
        self.scores.as_ref()
    }

    /// Attach the comparison against the reference. Replaces any earlier report.
    pub fn attach_scores(&mut self, report: ScoreReport) {
        self.scores = Some(report);
    }

    pub fn into_syllable(self) -> Syllable {
        self.syllable
    }
}

pub struct SyllableSynthesizer<E> {
    extractor: E,
    config: SimulationConfig,
}

impl<E: FeatureExtractor> SyllableSynthesizer<E> {
    /// `extractor` must be configured like the one that built the references.
    pub fn new(extractor: E, config: SimulationConfig) -> Self {
        Self { extractor, config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Synthesize the model's version of `reference` under `params`.
    pub fn synthesize(
        &self,
        reference: &Syllable,
        params: ControlParameters,
        constants: &PhysicalConstants,
    ) -> Result<SyntheticSyllable> {
        let features = reference.features();
        let curve = ControlCurve::derive(
            &params,
            reference.kind(),
            &features.ff_time,
            &features.ff,
            reference.len(),
            reference.sample_rate(),
        )?;
        self.synthesize_from(reference, curve, &features.envelope, params, constants)
    }

    /// Synthesize with explicit curves and source envelope, both one value
    /// per reference sample.
    pub fn synthesize_from(
        &self,
        reference: &Syllable,
        curve: ControlCurve,
        envelope: &[f64],
        params: ControlParameters,
        constants: &PhysicalConstants,
    ) -> Result<SyntheticSyllable> {
        if reference.analysis() != self.extractor.config() {
            return Err(SyrinxError::InvalidConfig(format!(
                "{} was analysed with different settings than this synthesizer uses",
                reference.id()
            )));
        }
        if curve.len() != reference.len() {
            return Err(SyrinxError::LengthMismatch {
                what: "control curve",
                expected: reference.len(),
                actual: curve.len(),
            });
        }

        let model = SyrinxModel::new(params.gamma, constants);
        let integration = model.integrate(&curve, envelope, reference.sample_rate(), &self.config)?;
        if let Some(step) = integration.diverged_at {
            warn!(syllable = %reference.id(), step, "synthesis diverged");
        }

        let id = SyllableId {
            tag: reference.id().tag.synthetic(),
            ..reference.id()
        };
        let syllable = Syllable::new(
            &integration.waveform,
            reference.sample_rate(),
            reference.t0(),
            id,
            &self.extractor,
        )?;
        debug!(syllable = %id, samples = syllable.len(), steps = integration.steps, "synthesized");

        Ok(SyntheticSyllable {
            syllable,
            params,
            constants: *constants,
            curve,
            integration,
            scores: None,
        })
    }

    /// Synthesize, score against the reference, and attach the report.
    pub fn solve(
        &self,
        reference: &Syllable,
        params: ControlParameters,
        constants: &PhysicalConstants,
        scorer: &DissimilarityScorer,
    ) -> Result<SyntheticSyllable> {
        let mut synth = self.synthesize(reference, params, constants)?;
        let report = scorer.score(reference, synth.syllable())?;
        synth.attach_scores(report);
        Ok(synth)
    }

    /// Independent syntheses in parallel. Each run allocates its own state;
    /// only the constants are shared.
    pub fn solve_batch(
        &self,
        jobs: &[(&Syllable, ControlParameters)],
        constants: &PhysicalConstants,
        scorer: &DissimilarityScorer,
    ) -> Vec<Result<SyntheticSyllable>> {
        jobs.par_iter()
            .map(|(reference, params)| self.solve(reference, *params, constants, scorer))
            .collect()
    }
}
