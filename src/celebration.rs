use rand::seq::SliceRandom;
use rand::Rng;
use std::time::{Duration, Instant};

const GRAVITY: f64 = 12.0;
const SYMBOLS: [char; 5] = ['✦', '★', '✓', '•', '+'];
const WORDS: [&str; 4] = ["PROFICIENT!", "NAILED IT!", "CLEAN RUN!", "ON TARGET!"];

#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    vel_x: f64,
    vel_y: f64,
    pub symbol: char,
    pub color_index: usize,
    age: f64,
    max_age: f64,
    /// Letters of the banner hold still instead of falling
    pub pinned: bool,
}

impl Particle {
    fn spark<R: Rng>(x: f64, y: f64, rng: &mut R) -> Self {
        Self {
            x,
            y,
            vel_x: rng.gen_range(-3.0..3.0),
            vel_y: rng.gen_range(-4.0..-1.0),
            symbol: *SYMBOLS.choose(rng).unwrap_or(&'*'),
            color_index: rng.gen_range(0..6),
            age: 0.0,
            max_age: rng.gen_range(1.5..3.0),
            pinned: false,
        }
    }

    fn letter(x: f64, y: f64, symbol: char, color_index: usize) -> Self {
        Self {
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            symbol,
            color_index,
            age: 0.0,
            max_age: 3.0,
            pinned: true,
        }
    }

    fn update(&mut self, dt: f64) -> bool {
        if !self.pinned {
            self.x += self.vel_x * dt;
            self.y += self.vel_y * dt;
            self.vel_y += GRAVITY * dt;
        }
        self.age += dt;
        self.age < self.max_age
    }

    /// 1.0 when fresh, falling to 0.0 at end of life
    pub fn life(&self) -> f64 {
        (1.0 - self.age / self.max_age).clamp(0.0, 1.0)
    }
}

/// Short burst shown when an attempt comes back proficient
#[derive(Debug)]
pub struct Celebration {
    pub particles: Vec<Particle>,
    started: Option<Instant>,
    last_update: Option<Instant>,
    duration: Duration,
}

impl Default for Celebration {
    fn default() -> Self {
        Self::new()
    }
}

impl Celebration {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            started: None,
            last_update: None,
            duration: Duration::from_secs(3),
        }
    }

    pub fn is_active(&self) -> bool {
        self.started.is_some()
    }

    pub fn start(&mut self, width: u16, height: u16) {
        let mut rng = rand::thread_rng();
        let cx = width as f64 / 2.0;
        let cy = height as f64 / 2.0;

        self.particles.clear();
        let word = WORDS.choose(&mut rng).unwrap_or(&WORDS[0]);
        let left = cx - word.chars().count() as f64 / 2.0;
        for (i, ch) in word.chars().enumerate().filter(|(_, c)| *c != ' ') {
            self.particles
                .push(Particle::letter(left + i as f64, cy - 2.0, ch, i % 6));
        }
        for _ in 0..20 {
            let x = cx + rng.gen_range(-15.0..15.0);
            let y = cy + rng.gen_range(-6.0..6.0);
            self.particles.push(Particle::spark(x, y, &mut rng));
        }

        let now = Instant::now();
        self.started = Some(now);
        self.last_update = Some(now);
    }

    pub fn stop(&mut self) {
        self.started = None;
        self.last_update = None;
        self.particles.clear();
    }

    pub fn update(&mut self) {
        let (Some(started), Some(last)) = (self.started, self.last_update) else {
            return;
        };
        let now = Instant::now();
        if now.duration_since(started) >= self.duration {
            self.stop();
            return;
        }
        let dt = now.duration_since(last).as_secs_f64();
        self.last_update = Some(now);
        self.particles.retain_mut(|p| p.update(dt));
    }
}
