use anyhow::Context as _;
use oor3d::{Backdrop, BackdropConfig, HeroModel, ParticleConfig};

/// Hero model file under `./assets`, e.g. `hero.glb`.
const ENV_HERO: &str = "OOR3D_HERO";
/// Side of the particle texture; the field holds its square.
const ENV_PARTICLE_SIZE: &str = "OOR3D_PARTICLE_SIZE";
const ENV_SEED: &str = "OOR3D_SEED";

fn config_from_env() -> anyhow::Result<BackdropConfig> {
    let mut particles = ParticleConfig::default();
    if let Ok(size) = std::env::var(ENV_PARTICLE_SIZE) {
        particles.size = size
            .parse()
            .with_context(|| format!("{ENV_PARTICLE_SIZE} must be a positive integer, got {size:?}"))?;
    }
    if let Ok(seed) = std::env::var(ENV_SEED) {
        particles.seed = Some(
            seed.parse()
                .with_context(|| format!("{ENV_SEED} must be an unsigned integer, got {seed:?}"))?,
        );
    }
    let hero = std::env::var(ENV_HERO).ok().map(|file| HeroModel {
        file,
        scale: 1.0,
        spin: 0.3,
    });
    Ok(BackdropConfig {
        particles,
        hero,
        ..Default::default()
    })
}

fn main() -> anyhow::Result<()> {
    let config = config_from_env()?;
    oor3d::run::<(), ()>(vec![Backdrop::constructor(config)])
}
