//! Animation pipeline
//!
//! A strictly linear chain of stages turning a time sample into one value per
//! fixture: `Generator -> Contrast -> Range* -> Spotlight`. The evaluation
//! order is fixed when the chain is built; every tick walks it front to back,
//! each stage writing into its own preallocated buffer, and the final buffer
//! is published to a [`SharedOutput`] for the dispatch workers.

pub mod curve;
pub mod noise;
pub mod output;
pub mod stages;

pub use curve::Curve;
pub use noise::Perlin2;
pub use output::SharedOutput;
pub use stages::{Contrast, Generator, Range, RangeHandle, Spotlight, SpotlightHandle};

use crate::config::SimulationConfig;
use crate::error::{CoreError, Result};
use crate::grouping::ClusterAssignment;
use std::collections::HashSet;

/// Name of the noise generator stage
pub const PERLIN: &str = "PERLIN";
/// Name of the contrast stage
pub const STRETCHED: &str = "STRETCHED";
/// Name of the spotlight stage
pub const SPOTLIT: &str = "SPOTLIT";

/// Name of the Range stage for the cluster at `idx`
pub fn shifted(idx: usize) -> String {
    format!("SHIFTED_{}", idx)
}

/// The closed set of stage kinds
#[derive(Debug, Clone)]
pub enum Stage {
    Generator(Generator),
    Contrast(Contrast),
    Range(Range),
    Spotlight(Spotlight),
}

impl Stage {
    fn is_root(&self) -> bool {
        matches!(self, Stage::Generator(_))
    }

    /// Short kind label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Stage::Generator(_) => "generator",
            Stage::Contrast(_) => "contrast",
            Stage::Range(_) => "range",
            Stage::Spotlight(_) => "spotlight",
        }
    }

    /// Compute this stage's full output for time `t`.
    ///
    /// `upstream` is `None` only for the root generator.
    pub fn compute(&self, t: f64, upstream: Option<&[f32]>, out: &mut [f32]) {
        match (self, upstream) {
            (Stage::Generator(stage), _) => stage.compute(t, out),
            (Stage::Contrast(stage), Some(up)) => stage.compute(up, out),
            (Stage::Range(stage), Some(up)) => stage.compute(up, out),
            (Stage::Spotlight(stage), Some(up)) => stage.compute(up, out),
            // Rejected by the builder.
            (_, None) => out.fill(0.0),
        }
    }
}

/// Runtime handles to the operator-adjustable stages of a built chain
#[derive(Debug, Clone)]
pub struct PipelineHandles {
    /// One Range handle per cluster, in cluster order
    pub ranges: Vec<RangeHandle>,
    /// The final Spotlight stage
    pub spotlight: SpotlightHandle,
}

/// A built, linear stage chain with its buffers
#[derive(Debug)]
pub struct Pipeline {
    names: Vec<String>,
    stages: Vec<Stage>,
    buffers: Vec<Vec<f32>>,
    output: SharedOutput,
}

impl Pipeline {
    /// Start a chain for `lights` fixtures
    pub fn builder(lights: usize) -> PipelineBuilder {
        PipelineBuilder {
            lights,
            stages: Vec::new(),
        }
    }

    /// Build the standard chain from configuration:
    /// `PERLIN -> STRETCHED -> SHIFTED_0..n -> SPOTLIT`, one Range per cluster.
    pub fn from_config(
        sim: &SimulationConfig,
        clusters: &[ClusterAssignment],
        lights: usize,
    ) -> Result<(Self, PipelineHandles)> {
        let perlin = &sim.nodes.perlin;
        let contrast = &sim.nodes.contrast;
        let curve: Curve = contrast.function.parse()?;
        let (initial_min, initial_max) = sim
            .controls
            .intensity
            .values
            .first()
            .map(|v| (v[0], v[1]))
            .unwrap_or((0.0, 1.0));

        let mut builder = Self::builder(lights)
            .stage(
                PERLIN,
                Stage::Generator(Generator::new(perlin.seed, perlin.speed[0], perlin.speed[1])),
            )
            .stage(STRETCHED, Stage::Contrast(Contrast::new(curve, contrast.iterations)));

        let mut ranges = Vec::with_capacity(clusters.len());
        for (idx, cluster) in clusters.iter().enumerate() {
            let range = Range::new(cluster.group.mask().to_vec(), initial_min, initial_max);
            ranges.push(range.handle());
            builder = builder.stage(shifted(idx), Stage::Range(range));
        }

        let spotlight = Spotlight::new(sim.nodes.spotlight.unselected);
        let spotlight_handle = spotlight.handle();
        let pipeline = builder.stage(SPOTLIT, Stage::Spotlight(spotlight)).build()?;

        Ok((
            pipeline,
            PipelineHandles {
                ranges,
                spotlight: spotlight_handle,
            },
        ))
    }

    /// Fixture count (length of every stage buffer)
    pub fn len(&self) -> usize {
        self.output.len()
    }

    /// Whether the pipeline covers no fixtures
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Stage names in evaluation order
    pub fn stage_names(&self) -> &[String] {
        &self.names
    }

    /// Handle readers use to see the final output
    pub fn output(&self) -> SharedOutput {
        self.output.clone()
    }

    /// Re-evaluate the whole chain for time `t` and publish the result.
    pub fn compute(&mut self, t: f64) -> &[f32] {
        for i in 0..self.stages.len() {
            let (done, rest) = self.buffers.split_at_mut(i);
            let upstream = done.last().map(Vec::as_slice);
            self.stages[i].compute(t, upstream, &mut rest[0]);
        }

        let last = self.buffers.last().map(Vec::as_slice).unwrap_or(&[]);
        self.output.publish(last);
        last
    }

    /// Last computed buffer of the named stage
    pub fn stage_output(&self, name: &str) -> Option<&[f32]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.buffers[i].as_slice())
    }
}

/// Assembles a [`Pipeline`], validating the chain shape
#[derive(Debug)]
pub struct PipelineBuilder {
    lights: usize,
    stages: Vec<(String, Stage)>,
}

impl PipelineBuilder {
    /// Append a stage; it reads the output of the stage added before it.
    pub fn stage(mut self, name: impl Into<String>, stage: Stage) -> Self {
        self.stages.push((name.into(), stage));
        self
    }

    /// Validate and allocate buffers
    pub fn build(self) -> Result<Pipeline> {
        if self.lights == 0 {
            return Err(CoreError::config("Pipeline needs at least one light"));
        }
        match self.stages.first() {
            None => return Err(CoreError::config("Pipeline has no stages")),
            Some((name, stage)) if !stage.is_root() => {
                return Err(CoreError::config(format!(
                    "First stage '{}' must be a generator, got {}",
                    name,
                    stage.kind()
                )))
            }
            _ => {}
        }

        let mut seen = HashSet::new();
        for (position, (name, stage)) in self.stages.iter().enumerate() {
            if !seen.insert(name.as_str()) {
                return Err(CoreError::config(format!("Duplicate stage name '{}'", name)));
            }
            if position > 0 && stage.is_root() {
                return Err(CoreError::config(format!(
                    "Generator '{}' must be the first stage",
                    name
                )));
            }
            if let Stage::Range(range) = stage {
                if range.mask().len() != self.lights {
                    return Err(CoreError::config(format!(
                        "Range '{}' mask covers {} lights, pipeline has {}",
                        name,
                        range.mask().len(),
                        self.lights
                    )));
                }
            }
        }

        let (names, stages): (Vec<_>, Vec<_>) = self.stages.into_iter().unzip();
        let buffers = vec![vec![0.0; self.lights]; stages.len()];

        Ok(Pipeline {
            names,
            stages,
            buffers,
            output: SharedOutput::new(self.lights),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(lights: usize, iterations: u32) -> Pipeline {
        Pipeline::builder(lights)
            .stage(PERLIN, Stage::Generator(Generator::new(5, 0.2, 0.3)))
            .stage(STRETCHED, Stage::Contrast(Contrast::new(Curve::Cubic, iterations)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_compute_publishes_final_stage() {
        let mut pipeline = chain(8, 2);
        let out = pipeline.compute(1.5).to_vec();
        assert_eq!(out.len(), 8);
        assert_eq!(pipeline.output().snapshot(), out);
        assert_eq!(pipeline.stage_output(STRETCHED).unwrap(), out.as_slice());
    }

    #[test]
    fn test_zero_iteration_contrast_is_identity() {
        let mut pipeline = chain(8, 0);
        pipeline.compute(3.25);
        assert_eq!(
            pipeline.stage_output(PERLIN).unwrap(),
            pipeline.stage_output(STRETCHED).unwrap()
        );
    }

    #[test]
    fn test_first_stage_must_be_generator() {
        let err = Pipeline::builder(4)
            .stage(STRETCHED, Stage::Contrast(Contrast::new(Curve::Linear, 1)))
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn test_second_generator_rejected() {
        let result = Pipeline::builder(4)
            .stage("A", Stage::Generator(Generator::new(1, 1.0, 1.0)))
            .stage("B", Stage::Generator(Generator::new(2, 1.0, 1.0)))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_range_mask_length_checked() {
        let result = Pipeline::builder(4)
            .stage(PERLIN, Stage::Generator(Generator::new(1, 1.0, 1.0)))
            .stage("SHIFTED_0", Stage::Range(Range::new(vec![true; 3], 0.0, 1.0)))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Pipeline::builder(4)
            .stage(PERLIN, Stage::Generator(Generator::new(1, 1.0, 1.0)))
            .stage(PERLIN, Stage::Spotlight(Spotlight::new(0.0)))
            .build();
        assert!(result.is_err());
    }
}
