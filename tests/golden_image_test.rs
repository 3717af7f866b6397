#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn should_render_clear_colour() {
    use oor3d::{
        context::{Context, InitContext},
        experience::ImageTestResult,
    };
    use wgpu::Color;

    use crate::common::test_utils::{Empty, Frame, FrameCounter, TestScene};

    golden_image_test!(async move |_ctx: InitContext| -> anyhow::Result<TestScene> {
        Ok(TestScene {
            inner: Box::new(Empty),
            setup: Box::new(|ctx: &mut Context| ctx.clear_colour = Color::WHITE),
            validate: Box::new(|_: &Context, frames: &FrameCounter, texture: &mut Frame| {
                if frames.frame() == 0 {
                    return Ok(ImageTestResult::Waiting);
                }
                let white = image::Rgba([255, 255, 255, 255]);
                for pixel in texture.pixels() {
                    assert_eq!(*pixel, white);
                }
                Ok(ImageTestResult::Passed)
            }),
        })
    });
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_draw_particles_over_the_background() {
    use oor3d::{
        Backdrop, BackdropConfig, ParticleConfig,
        context::{Context, InitContext},
        experience::ImageTestResult,
    };
    use wgpu::Color;

    use crate::common::test_utils::{Frame, FrameCounter, TestScene};

    golden_image_test!(async move |ctx: InitContext| -> anyhow::Result<TestScene> {
        let backdrop = Backdrop::new(
            ctx,
            BackdropConfig {
                particles: ParticleConfig {
                    size: 32,
                    point_size: 0.25,
                    seed: Some(5),
                    ..Default::default()
                },
                clear_colour: Color::BLACK,
                orbit_speed: 0.0,
                ..Default::default()
            },
        )
        .await?;
        Ok(TestScene {
            inner: Box::new(backdrop),
            setup: Box::new(|_: &mut Context| {}),
            validate: Box::new(|_: &Context, frames: &FrameCounter, texture: &mut Frame| {
                if frames.frame() < 2 {
                    return Ok(ImageTestResult::Waiting);
                }
                let lit = texture
                    .pixels()
                    .filter(|p| p.0[0] > 0 || p.0[1] > 0 || p.0[2] > 0)
                    .count();
                if lit == 0 {
                    return Ok(ImageTestResult::Failed);
                }
                Ok(ImageTestResult::Passed)
            }),
        })
    });
}

#[test]
#[cfg(feature = "integration-tests")]
fn attenuated_sprite_covers_its_world_size() {
    use oor3d::{
        Backdrop, BackdropConfig, ParticleConfig,
        context::{Context, InitContext},
        experience::ImageTestResult,
        particles::points::sprite_diameter,
    };
    use wgpu::Color;

    use crate::common::test_utils::{Frame, FrameCounter, TestScene};

    golden_image_test!(async move |ctx: InitContext| -> anyhow::Result<TestScene> {
        // one still particle in the centre, 6 units in front of the camera
        let backdrop = Backdrop::new(
            ctx,
            BackdropConfig {
                particles: ParticleConfig {
                    size: 1,
                    radius: 0.0,
                    amplitude: 0.0,
                    point_size: 1.0,
                    size_attenuation: true,
                    color: [1.0, 1.0, 1.0],
                    opacity: 1.0,
                    seed: Some(1),
                    ..Default::default()
                },
                clear_colour: Color::BLACK,
                camera_distance: 6.0,
                orbit_speed: 0.0,
                ..Default::default()
            },
        )
        .await?;
        Ok(TestScene {
            inner: Box::new(backdrop),
            setup: Box::new(|_: &mut Context| {}),
            validate: Box::new(|ctx: &Context, frames: &FrameCounter, texture: &mut Frame| {
                if frames.frame() < 2 {
                    return Ok(ImageTestResult::Waiting);
                }
                let focal = ctx.projection.matrix()[1][1];
                let diameter = sprite_diameter(1.0, true, focal, ctx.config.height as f32, 6.0);
                // the frame is padded beyond the surface size
                let expected = diameter * texture.width() as f32 / ctx.config.width as f32;

                let row = texture.height() / 2;
                let lit = (0..texture.width())
                    .filter(|x| {
                        let p = texture.get_pixel(*x, row);
                        p.0[0] > 0 || p.0[1] > 0 || p.0[2] > 0
                    })
                    .count() as f32;

                assert!(
                    lit >= 0.85 * expected && lit <= 1.05 * expected + 2.0,
                    "sprite is {lit} px wide, expected about {expected} px"
                );
                Ok(ImageTestResult::Passed)
            }),
        })
    });
}
