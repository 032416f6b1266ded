//! Training loggers for constrained PPO.
//!
//! Provides different logging backends for per-iteration metrics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::runners::IterationStats;

/// Training snapshot for logging.
#[derive(Debug, Clone, Default)]
pub struct TrainingSnapshot {
    pub iteration: usize,
    /// Total environment steps.
    pub env_steps: usize,
    /// Average return of completed episodes.
    pub avg_reward: f32,
    /// Average cost of completed episodes.
    pub avg_cost: f32,
    /// Average cost minus the cost limit.
    pub avg_violation: f32,
    /// Current Lagrange multiplier.
    pub lagrangian: f32,
    pub loss_pi: f32,
    pub loss_r_critic: f32,
    pub loss_c_critic: f32,
    pub entropy: f32,
    pub learning_rate: f64,
}

impl TrainingSnapshot {
    pub fn new(iteration: usize, env_steps: usize) -> Self {
        Self {
            iteration,
            env_steps,
            ..Self::default()
        }
    }

    /// Fill losses, λ and learning rate from a learner iteration.
    pub fn from_stats(stats: &IterationStats, env_steps: usize) -> Self {
        let get = |key| stats.mean(key).unwrap_or(0.0);
        Self {
            iteration: stats.iteration,
            env_steps,
            lagrangian: stats.lagrangian,
            loss_pi: get("loss_pi"),
            loss_r_critic: get("loss_r_critic"),
            loss_c_critic: get("loss_c_critic"),
            entropy: get("entropy"),
            learning_rate: stats.lr,
            ..Self::default()
        }
    }

    /// Set episode statistics.
    pub fn with_episodes(mut self, avg_reward: f32, avg_cost: f32, avg_violation: f32) -> Self {
        self.avg_reward = avg_reward;
        self.avg_cost = avg_cost;
        self.avg_violation = avg_violation;
        self
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    fn log(&mut self, snapshot: &TrainingSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Console logger printing one row every `log_interval` iterations.
pub struct ConsoleLogger {
    log_interval: usize,
    next_log: usize,
    start_time: Instant,
    show_header: bool,
}

impl ConsoleLogger {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
            next_log: 0,
            start_time: Instant::now(),
            show_header: true,
        }
    }

    /// Whether a snapshot at `iteration` would be printed.
    pub fn is_due(&self, iteration: usize) -> bool {
        iteration >= self.next_log
    }

    fn print_header(&self) {
        println!(
            "{:>6} {:>10} {:>9} {:>8} {:>9} {:>8} {:>9} {:>9} {:>9} {:>8} {:>8}",
            "Iter", "EnvSteps", "Reward", "Cost", "Violation", "Lambda", "Policy", "RCritic",
            "CCritic", "Entropy", "FPS"
        );
        println!("{}", "-".repeat(104));
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        if !self.is_due(snapshot.iteration) {
            return;
        }
        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        let elapsed = self.start_time.elapsed().as_secs_f32();
        let fps = if elapsed > 0.0 {
            snapshot.env_steps as f32 / elapsed
        } else {
            0.0
        };

        println!(
            "{:>6} {:>10} {:>9.2} {:>8.2} {:>9.3} {:>8.4} {:>9.4} {:>9.4} {:>9.4} {:>8.4} {:>8.0}",
            snapshot.iteration,
            snapshot.env_steps,
            snapshot.avg_reward,
            snapshot.avg_cost,
            snapshot.avg_violation,
            snapshot.lagrangian,
            snapshot.loss_pi,
            snapshot.loss_r_critic,
            snapshot.loss_c_critic,
            snapshot.entropy,
            fps
        );

        self.next_log = snapshot.iteration + self.log_interval;
    }

    fn flush(&mut self) {}
}

const CSV_HEADER: &str = "iteration,env_steps,avg_reward,avg_cost,avg_violation,lagrangian,\
loss_pi,loss_r_critic,loss_c_critic,entropy,learning_rate,elapsed_secs";

/// CSV logger, one row per snapshot.
pub struct CSVLogger<W: Write + Send = BufWriter<File>> {
    writer: W,
    start_time: Instant,
}

impl CSVLogger {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::from_writer(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write + Send> CSVLogger<W> {
    /// Log into any writer; the header is written immediately.
    pub fn from_writer(mut writer: W) -> std::io::Result<Self> {
        writeln!(writer, "{}", CSV_HEADER)?;
        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }

    pub fn into_inner(mut self) -> W {
        let _ = self.writer.flush();
        self.writer
    }
}

impl<W: Write + Send> MetricsLogger for CSVLogger<W> {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        if let Err(e) = writeln!(
            self.writer,
            "{},{},{:.4},{:.4},{:.4},{:.6},{:.6},{:.6},{:.6},{:.6},{:.8},{:.2}",
            snapshot.iteration,
            snapshot.env_steps,
            snapshot.avg_reward,
            snapshot.avg_cost,
            snapshot.avg_violation,
            snapshot.lagrangian,
            snapshot.loss_pi,
            snapshot.loss_r_critic,
            snapshot.loss_c_critic,
            snapshot.entropy,
            snapshot.learning_rate,
            elapsed,
        ) {
            log::warn!("failed to write metrics row: {}", e);
        }
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Multi-logger that writes to multiple backends.
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
