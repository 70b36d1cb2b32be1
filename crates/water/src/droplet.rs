//! Falling droplets and the timer that rains them in at random.
//!
//! Droplets are integrated on the CPU. When one reaches the surface it is
//! marked dead and splashes into a [`DropSink`] exactly once; dead droplets
//! are skipped from then on and pruned at the end of the update.

use serde::{Deserialize, Serialize};
use water_math::Vector3;

/// Something droplets can splash into.
pub trait DropSink {
    type Error;

    fn add_drop(&mut self, x: f32, z: f32, radius: f32, strength: f32) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropletConfig {
    pub spawn_height: f32,
    /// Downward speed at spawn.
    pub initial_speed: f32,
    pub radius: f32,
    pub gravity: f32,
    pub splash_radius: f32,
    pub splash_strength: f32,
}

impl Default for DropletConfig {
    fn default() -> Self {
        Self {
            spawn_height: 1.5,
            initial_speed: 1.5,
            radius: 0.03,
            gravity: 9.8 * 0.25,
            splash_radius: 0.03,
            splash_strength: 0.0025,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Droplet {
    pub position: Vector3,
    pub velocity: Vector3,
    pub radius: f32,
    alive: bool,
}

impl Droplet {
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

#[derive(Debug, Clone, Default)]
pub struct DropletSystem {
    config: DropletConfig,
    droplets: Vec<Droplet>,
}

impl DropletSystem {
    #[must_use]
    pub fn new(config: DropletConfig) -> Self {
        Self {
            config,
            droplets: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DropletConfig {
        &self.config
    }

    /// Releases a droplet above world `(x, z)`.
    pub fn spawn(&mut self, x: f32, z: f32) {
        self.droplets.push(Droplet {
            position: Vector3::new(x, self.config.spawn_height, z),
            velocity: Vector3::new(0.0, -self.config.initial_speed, 0.0),
            radius: self.config.radius,
            alive: true,
        });
    }

    /// Droplets still in the air.
    pub fn alive(&self) -> impl Iterator<Item = &Droplet> {
        self.droplets.iter().filter(|d| d.alive)
    }

    /// Number of tracked droplets, including any killed by an update that
    /// stopped early.
    #[must_use]
    pub fn len(&self) -> usize {
        self.droplets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.droplets.is_empty()
    }

    pub fn clear(&mut self) {
        self.droplets.clear();
    }

    /// Advances every live droplet by `dt` seconds and returns how many
    /// splashed.
    ///
    /// # Errors
    ///
    /// The first error from `sink`. The droplet that caused it is already
    /// dead and will not splash again.
    pub fn update<S: DropSink>(&mut self, dt: f32, sink: &mut S) -> Result<usize, S::Error> {
        let config = self.config;
        let mut splashes = 0;
        for droplet in self.droplets.iter_mut().filter(|d| d.alive) {
            droplet.velocity.y -= config.gravity * dt;
            droplet.position = droplet.position + droplet.velocity * dt;
            if droplet.position.y <= 0.0 {
                droplet.alive = false;
                tracing::debug!(x = droplet.position.x, z = droplet.position.z, "splash");
                sink.add_drop(
                    droplet.position.x,
                    droplet.position.z,
                    config.splash_radius,
                    config.splash_strength,
                )?;
                splashes += 1;
            }
        }
        self.droplets.retain(|d| d.alive);
        Ok(splashes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomDropConfig {
    pub enabled: bool,
    /// Seconds between drops.
    pub interval: f32,
    /// Drops land in `[-extent, extent]` on both axes.
    pub extent: f32,
}

impl Default for RandomDropConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 1.0,
            extent: 0.9,
        }
    }
}

/// Picks a random landing spot once per interval while enabled.
///
/// The timer runs even while disabled, so re-enabling fires straight away
/// once an interval has passed.
#[derive(Debug, Clone)]
pub struct RandomDrops {
    config: RandomDropConfig,
    timer: f32,
    rng: fastrand::Rng,
}

impl RandomDrops {
    #[must_use]
    pub fn new(config: RandomDropConfig, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        Self {
            config,
            timer: 0.0,
            rng,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn update(&mut self, dt: f32) -> Option<(f32, f32)> {
        self.timer += dt;
        if !self.config.enabled || self.timer < self.config.interval {
            return None;
        }
        self.timer = 0.0;
        let extent = self.config.extent;
        let x = self.rng.f32() * 2.0 * extent - extent;
        let z = self.rng.f32() * 2.0 * extent - extent;
        Some((x, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<(f32, f32, f32, f32)>);

    impl DropSink for Recorder {
        type Error = std::convert::Infallible;

        fn add_drop(&mut self, x: f32, z: f32, radius: f32, strength: f32) -> Result<(), Self::Error> {
            self.0.push((x, z, radius, strength));
            Ok(())
        }
    }

    struct Failing;

    impl DropSink for Failing {
        type Error = &'static str;

        fn add_drop(&mut self, _: f32, _: f32, _: f32, _: f32) -> Result<(), Self::Error> {
            Err("device lost")
        }
    }

    #[test]
    fn spawn_uses_config() {
        let mut system = DropletSystem::default();
        system.spawn(0.25, -0.5);
        let droplet = system.alive().next().unwrap();
        assert_eq!(droplet.position, Vector3::new(0.25, 1.5, -0.5));
        assert_eq!(droplet.velocity, Vector3::new(0.0, -1.5, 0.0));
        assert!((droplet.radius - 0.03).abs() < f32::EPSILON);
    }

    #[test]
    fn gravity_accelerates_before_moving() {
        let mut system = DropletSystem::default();
        system.spawn(0.0, 0.0);
        system.update(0.1, &mut Recorder::default()).unwrap();
        let droplet = system.alive().next().unwrap();
        let vy = -1.5 - 9.8 * 0.25 * 0.1;
        assert!((droplet.velocity.y - vy).abs() < 1e-6);
        assert!((droplet.position.y - (1.5 + vy * 0.1)).abs() < 1e-6);
    }

    #[test]
    fn crossing_droplet_splashes_exactly_once() {
        let mut system = DropletSystem::default();
        system.spawn(0.3, 0.4);
        let mut sink = Recorder::default();

        let mut total = 0;
        for _ in 0..200 {
            total += system.update(1.0 / 60.0, &mut sink).unwrap();
        }

        assert_eq!(total, 1);
        assert_eq!(sink.0.len(), 1);
        let (x, z, radius, strength) = sink.0[0];
        assert!((x - 0.3).abs() < 1e-6 && (z - 0.4).abs() < 1e-6);
        assert!((radius - 0.03).abs() < 1e-6 && (strength - 0.0025).abs() < 1e-6);
        assert!(system.is_empty());
    }

    #[test]
    fn failed_splash_does_not_repeat() {
        let mut system = DropletSystem::default();
        system.spawn(0.0, 0.0);
        assert!(system.update(2.0, &mut Failing).is_err());
        assert_eq!(system.alive().count(), 0);

        let mut sink = Recorder::default();
        assert_eq!(system.update(0.1, &mut sink).unwrap(), 0);
        assert!(sink.0.is_empty());
        assert!(system.is_empty());
    }

    #[test]
    fn random_drops_fire_once_per_interval() {
        let mut drops = RandomDrops::new(RandomDropConfig::default(), Some(7));
        let fired: Vec<_> = (0..40).filter_map(|_| drops.update(0.25)).collect();
        assert_eq!(fired.len(), 10);
        assert!(fired.iter().all(|(x, z)| x.abs() <= 0.9 && z.abs() <= 0.9));
    }

    #[test]
    fn random_drops_are_reproducible_with_a_seed() {
        let mut a = RandomDrops::new(RandomDropConfig::default(), Some(42));
        let mut b = RandomDrops::new(RandomDropConfig::default(), Some(42));
        assert_eq!(a.update(1.0), b.update(1.0));
    }

    #[test]
    fn disabled_timer_keeps_running() {
        let mut drops = RandomDrops::new(RandomDropConfig::default(), Some(1));
        drops.set_enabled(false);
        assert!(drops.update(1.5).is_none());
        drops.set_enabled(true);
        assert!(drops.update(0.0).is_some());
    }
}
