use hueflow_core::config::HueflowConfig;
use hueflow_core::grouping::{assign_clusters, FixtureId};
use hueflow_core::pipeline::{self, Contrast, Curve, Generator, Pipeline, Range, Spotlight, Stage};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn two_bridge_config(lights_a: u32, lights_b: u32) -> HueflowConfig {
    let mut config = HueflowConfig::default();
    for (name, count, offset) in [("A", lights_a, 0), ("B", lights_b, 100)] {
        config.bridges.insert(
            name.to_string(),
            toml::from_str(&format!("ip = \"10.0.0.{}\"\nusername = \"u\"", offset + 1)).unwrap(),
        );
        for i in 0..count {
            config.main_lights.push((name.to_string(), FixtureId(offset + i + 1)));
        }
    }
    config
}

#[test]
fn test_standard_chain_layout() {
    let config = two_bridge_config(3, 2);
    let clusters = config.validate().unwrap();
    let (pipeline, handles) =
        Pipeline::from_config(&config.simulation, &clusters, config.light_count()).unwrap();

    assert_eq!(
        pipeline.stage_names(),
        &["PERLIN", "STRETCHED", "SHIFTED_0", "SHIFTED_1", "SPOTLIT"]
    );
    assert_eq!(handles.ranges.len(), 2);
    assert_eq!(pipeline.len(), 5);
}

#[test]
fn test_range_only_touches_its_cluster() {
    let config = two_bridge_config(3, 2);
    let clusters = config.validate().unwrap();
    let (mut pipeline, handles) =
        Pipeline::from_config(&config.simulation, &clusters, config.light_count()).unwrap();

    handles.ranges[1].set_range(0.9, 1.0);
    pipeline.compute(2.0);

    let before = pipeline.stage_output("SHIFTED_0").unwrap().to_vec();
    let after = pipeline.stage_output("SHIFTED_1").unwrap().to_vec();
    let mask = clusters[1].group.mask();
    for i in 0..before.len() {
        if mask[i] {
            assert!(after[i] >= 0.9 - 1e-6 && after[i] <= 1.0 + 1e-6);
        } else {
            assert_eq!(after[i], before[i]);
        }
    }
}

#[test]
fn test_spotlight_on_full_chain() {
    let config = two_bridge_config(2, 2);
    let clusters = config.validate().unwrap();
    let (mut pipeline, handles) =
        Pipeline::from_config(&config.simulation, &clusters, config.light_count()).unwrap();

    handles.spotlight.spotlight(2);
    pipeline.compute(4.5);
    let upstream = pipeline.stage_output("SHIFTED_1").unwrap().to_vec();
    let out = pipeline.output().snapshot();
    assert_eq!(out[2], upstream[2]);
    for (i, v) in out.iter().enumerate() {
        if i != 2 {
            assert_eq!(*v, 0.0);
        }
    }

    handles.spotlight.clear();
    pipeline.compute(4.5);
    assert_eq!(pipeline.output().snapshot(), upstream);
}

proptest! {
    #[test]
    fn every_stage_has_fixture_count_length(lights in 1usize..64, t in -1000.0f64..1000.0) {
        let mut pipeline = Pipeline::builder(lights)
            .stage(pipeline::PERLIN, Stage::Generator(Generator::new(11, 0.3, 0.7)))
            .stage(pipeline::STRETCHED, Stage::Contrast(Contrast::new(Curve::Cubic, 2)))
            .stage("SHIFTED_0", Stage::Range(Range::new(vec![true; lights], 0.1, 0.4)))
            .stage(pipeline::SPOTLIT, Stage::Spotlight(Spotlight::new(0.0)))
            .build()
            .unwrap();

        let out = pipeline.compute(t).to_vec();
        prop_assert_eq!(out.len(), lights);
        for name in pipeline.stage_names().to_vec() {
            prop_assert_eq!(pipeline.stage_output(&name).unwrap().len(), lights);
        }
        prop_assert_eq!(pipeline.output().len(), lights);
    }

    #[test]
    fn zero_iteration_contrast_is_identity(t in 0.0f64..10_000.0, seed in 0u64..1000) {
        let mut pipeline = Pipeline::builder(12)
            .stage(pipeline::PERLIN, Stage::Generator(Generator::new(seed, 0.15, 0.05)))
            .stage(pipeline::STRETCHED, Stage::Contrast(Contrast::new(Curve::Quintic, 0)))
            .build()
            .unwrap();
        pipeline.compute(t);
        prop_assert_eq!(
            pipeline.stage_output(pipeline::PERLIN).unwrap(),
            pipeline.stage_output(pipeline::STRETCHED).unwrap()
        );
    }

    #[test]
    fn range_respects_mask(
        mask in proptest::collection::vec(any::<bool>(), 1..40),
        min in 0.0f32..0.5,
        width in 0.0f32..0.5,
        t in 0.0f64..500.0,
    ) {
        let lights = mask.len();
        let max = min + width;
        let mut pipeline = Pipeline::builder(lights)
            .stage(pipeline::PERLIN, Stage::Generator(Generator::new(3, 0.2, 0.2)))
            .stage("SHIFTED_0", Stage::Range(Range::new(mask.clone(), min, max)))
            .build()
            .unwrap();
        pipeline.compute(t);
        let upstream = pipeline.stage_output(pipeline::PERLIN).unwrap().to_vec();
        let out = pipeline.stage_output("SHIFTED_0").unwrap().to_vec();
        for i in 0..lights {
            if mask[i] {
                prop_assert!(out[i] >= min - 1e-6 && out[i] <= max + 1e-6);
            } else {
                prop_assert_eq!(out[i], upstream[i]);
            }
        }
    }
}

#[test]
fn test_assign_then_build_masks_partition_fixtures() {
    let main_lights: Vec<(String, FixtureId)> = (0..10)
        .map(|i| (if i % 3 == 0 { "A" } else { "B" }.to_string(), FixtureId(i)))
        .collect();
    let mut workers = BTreeMap::new();
    workers.insert("A".to_string(), 2);
    workers.insert("B".to_string(), 3);
    let clusters = assign_clusters(&main_lights, &workers).unwrap();

    let mut covered = vec![0; 10];
    for cluster in &clusters {
        for index in cluster.group.indices() {
            covered[*index] += 1;
        }
    }
    assert!(covered.iter().all(|c| *c == 1));
}
