#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
mod gpu {
    use std::time::Duration;

    use oor3d::{
        Backdrop, BackdropConfig, HeroModel,
        experience::Experience,
        particles::{ParticleConfig, ParticleSystem, drift_step, readback_layout, seed_positions},
        render::Render,
        resources::{AssetRoot, ResourceLoader},
    };
    use rand::{SeedableRng, rngs::StdRng};

    use crate::common::test_utils::headless_context;

    fn config() -> ParticleConfig {
        ParticleConfig {
            size: 16,
            radius: 2.0,
            seed: Some(99),
            ..Default::default()
        }
    }

    fn step(particles: &mut ParticleSystem, device: &wgpu::Device, queue: &wgpu::Queue, dt: Duration) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("test step"),
        });
        particles.simulate(&mut encoder, queue, dt);
        queue.submit(std::iter::once(encoder.finish()));
    }

    fn assert_close(actual: &[[f32; 4]], expected: &[[f32; 4]]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            for c in 0..4 {
                assert!((a[c] - e[c]).abs() < 1e-3, "particle {i}: {a:?} != {e:?}");
            }
        }
    }

    #[tokio::test]
    async fn seeded_field_is_uploaded_unchanged() {
        let ctx = headless_context().await;

        let particles = ParticleSystem::new(&ctx, config()).unwrap();

        let positions = particles.read_positions(&ctx.device, &ctx.queue).await.unwrap();
        let expected = seed_positions(16, 2.0, &mut StdRng::seed_from_u64(99));
        assert_eq!(positions, expected);
        assert_eq!(particles.count(), 256);
        assert_eq!(particles.steps(), 0);
    }

    #[tokio::test]
    async fn every_step_applies_the_drift() {
        let ctx = headless_context().await;
        let config = config();
        let mut particles = ParticleSystem::new(&ctx, config.clone()).unwrap();
        let mut expected = seed_positions(16, 2.0, &mut StdRng::seed_from_u64(99));
        let dt = Duration::from_millis(16);

        for n in 1..=3 {
            step(&mut particles, &ctx.device, &ctx.queue, dt);
            let time = n as f32 * dt.as_secs_f32();
            expected = expected
                .into_iter()
                .map(|p| drift_step(p, time, dt.as_secs_f32(), config.amplitude, config.frequency))
                .collect();

            let positions = particles.read_positions(&ctx.device, &ctx.queue).await.unwrap();
            assert_close(&positions, &expected);
        }
        assert_eq!(particles.steps(), 3);
        assert!((particles.time() - 0.048).abs() < 1e-6);
    }

    #[tokio::test]
    async fn reset_reseeds_and_restarts_the_clock() {
        let ctx = headless_context().await;
        let mut particles = ParticleSystem::new(&ctx, config()).unwrap();
        let first = particles.read_positions(&ctx.device, &ctx.queue).await.unwrap();
        step(&mut particles, &ctx.device, &ctx.queue, Duration::from_millis(16));

        particles.reset(&ctx.queue);

        assert_eq!(particles.steps(), 0);
        assert_eq!(particles.time(), 0.0);
        let reseeded = particles.read_positions(&ctx.device, &ctx.queue).await.unwrap();
        // the rng keeps going, so the new field differs from the first
        assert_ne!(reseeded, first);
        assert!(reseeded.iter().all(|p| p[3] == 1.0));
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_stops_rendering() {
        let ctx = headless_context().await;
        let mut particles = ParticleSystem::new(&ctx, config()).unwrap();
        assert!(matches!(particles.render(), Render::Points(_)));

        particles.dispose();
        particles.dispose();
        step(&mut particles, &ctx.device, &ctx.queue, Duration::from_millis(16));

        assert!(particles.is_disposed());
        assert!(matches!(particles.render(), Render::None));
        assert_eq!(particles.steps(), 0);
        assert!(particles.read_positions(&ctx.device, &ctx.queue).await.is_err());
    }

    #[tokio::test]
    async fn oversized_field_is_rejected() {
        let ctx = headless_context().await;
        let max = ctx.device.limits().max_texture_dimension_2d;

        let err = ParticleSystem::new(
            &ctx,
            ParticleConfig {
                size: max + 1,
                ..config()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds"));

        let zero = ParticleSystem::new(&ctx, ParticleConfig { size: 0, ..config() });
        assert!(zero.is_err());
    }

    #[tokio::test]
    async fn field_larger_than_the_buffer_limit_is_rejected() {
        let ctx = headless_context().await;
        let limits = ctx.device.limits();
        let side = (1..=limits.max_texture_dimension_2d)
            .rev()
            .find(|side| readback_layout(*side).1 <= limits.max_buffer_size)
            .unwrap();
        if side == limits.max_texture_dimension_2d {
            // every texture this device allows fits into a buffer
            return;
        }

        let err = ParticleSystem::new(
            &ctx,
            ParticleConfig {
                size: side + 1,
                ..config()
            },
        )
        .unwrap_err();

        assert!(err.to_string().contains("buffer limit"), "{err}");
    }

    const TRIANGLE_OBJ: &str = "o tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1\n";

    #[tokio::test]
    async fn obj_without_material_library_loads_with_a_default_material() {
        let ctx = headless_context().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tri.obj"), TRIANGLE_OBJ).unwrap();

        let assets = ResourceLoader::new()
            .with_root(AssetRoot::new(dir.path().to_string_lossy()))
            .obj("tri", "tri.obj")
            .load(&ctx.device, &ctx.queue)
            .await
            .unwrap();

        let model = assets.model("tri").unwrap();
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.meshes[0].num_elements, 3);
        assert_eq!(model.materials.len(), 1);
    }

    #[tokio::test]
    async fn backdrop_survives_a_missing_hero() {
        let ctx = headless_context().await;
        let dir = tempfile::tempdir().unwrap();

        let backdrop = Backdrop::new(
            ctx,
            BackdropConfig {
                particles: config(),
                hero: Some(HeroModel {
                    file: "missing.glb".to_string(),
                    scale: 1.0,
                    spin: 0.5,
                }),
                asset_root: AssetRoot::new(dir.path().to_string_lossy()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(!backdrop.has_hero());
        assert_eq!(backdrop.particles().count(), 256);
    }

    #[tokio::test]
    async fn backdrop_loads_an_obj_hero() {
        let ctx = headless_context().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hero.obj"), TRIANGLE_OBJ).unwrap();

        let backdrop = Backdrop::new(
            ctx,
            BackdropConfig {
                particles: config(),
                hero: Some(HeroModel {
                    file: "hero.obj".to_string(),
                    scale: 2.0,
                    spin: 0.0,
                }),
                asset_root: AssetRoot::new(dir.path().to_string_lossy()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(backdrop.has_hero());
        match Experience::<(), ()>::on_render(&backdrop) {
            Render::Composed(renders) => {
                assert_eq!(renders.len(), 2);
                assert!(matches!(&renders[0], Render::Mesh(instanced) if instanced.amount == 1));
                assert!(matches!(&renders[1], Render::Points(points) if points.count == 256));
            }
            _ => panic!("the backdrop should compose the hero and the particles"),
        }
    }
}
