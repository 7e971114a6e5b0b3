//! Fans incomplete landmarks out over a pool of worker threads.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use tracing::{error, info};

use crate::distance::{analyze_landmark, Analysis, MapSnapshot};
use crate::error::{Error, Result};
use crate::models::Landmark;

pub struct Scheduler {
    workers: usize,
    progress_interval: Duration,
    show_progress_bar: bool,
}

/// What came back from the workers.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    /// Every dispatched landmark, in completion order
    pub landmarks: Vec<Landmark>,
    /// (landmark, country) pairs that stayed unknown
    pub skipped_pairs: usize,
}

impl Scheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress_interval: Duration::from_secs(10),
            show_progress_bar: true,
        }
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn show_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    /// Analyse every landmark in `incomplete`. The snapshot is handed to the
    /// pool once; each job is one landmark and results are collected in
    /// whatever order they finish.
    pub fn run(&self, snapshot: Arc<MapSnapshot>, incomplete: Vec<Landmark>) -> Result<ScheduleOutcome> {
        let total = incomplete.len();
        if total == 0 {
            return Ok(ScheduleOutcome::default());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("distance-{}", i))
            .panic_handler(|_| error!("distance worker panicked; its landmark is lost"))
            .build()?;
        info!("Analyzing {} landmarks with {} workers...", total, self.workers);

        let (tx, rx) = mpsc::channel::<Analysis>();
        for landmark in incomplete {
            let tx = tx.clone();
            let snapshot = Arc::clone(&snapshot);
            pool.spawn(move || {
                let analysis = analyze_landmark(landmark, &snapshot);
                // The receiver only goes away if the coordinator is gone.
                let _ = tx.send(analysis);
            });
        }
        drop(tx);

        let mut progress = Progress::new(total, self.progress_interval, self.show_progress_bar);
        let mut outcome = ScheduleOutcome {
            landmarks: Vec::with_capacity(total),
            skipped_pairs: 0,
        };
        for analysis in rx {
            outcome.skipped_pairs += analysis.skipped.len();
            outcome.landmarks.push(analysis.landmark);
            progress.tick();
        }
        progress.finish();

        if outcome.landmarks.len() != total {
            return Err(Error::Internal(format!(
                "dispatched {} landmarks but {} came back",
                total,
                outcome.landmarks.len()
            )));
        }
        Ok(outcome)
    }
}

/// Progress bar plus a log line at most once per interval, and always on
/// the last item.
struct Progress {
    bar: ProgressBar,
    total: usize,
    done: usize,
    interval: Duration,
    last_report: Instant,
}

impl Progress {
    fn new(total: usize, interval: Duration, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, eta {eta})",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            total,
            done: 0,
            interval,
            last_report: Instant::now(),
        }
    }

    fn tick(&mut self) {
        self.done += 1;
        self.bar.inc(1);
        let now = Instant::now();
        if self.done == self.total || now.duration_since(self.last_report) > self.interval {
            self.bar.suspend(|| info!("{}/{}", self.done, self.total));
            self.last_report = now;
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::SourceCrs;
    use geo::{polygon, MultiPolygon};
    use std::collections::{BTreeMap, HashSet};

    fn snapshot() -> Arc<MapSnapshot> {
        let mut countries = BTreeMap::new();
        countries.insert(
            "AAA".to_string(),
            MultiPolygon::new(vec![polygon![
                (x: -1.0, y: -1.0),
                (x: 1.0, y: -1.0),
                (x: 1.0, y: 1.0),
                (x: -1.0, y: 1.0),
                (x: -1.0, y: -1.0),
            ]]),
        );
        Arc::new(MapSnapshot {
            crs: SourceCrs::wgs84(),
            countries,
            resolution: 100.0,
        })
    }

    fn landmarks(n: usize) -> Vec<Landmark> {
        (0..n)
            .map(|i| {
                let addr = format!("10.0.0.{}", i).parse().unwrap();
                let mut lm = Landmark::new(addr, i as f64 * 0.5, 0.0);
                lm.distances.insert("AAA".into(), None);
                lm
            })
            .collect()
    }

    #[test]
    fn test_every_landmark_comes_back() {
        let input = landmarks(12);
        let expected: HashSet<_> = input.iter().map(|lm| lm.addr).collect();

        let outcome = Scheduler::new(3)
            .show_progress_bar(false)
            .run(snapshot(), input)
            .unwrap();

        assert_eq!(outcome.landmarks.len(), 12);
        assert_eq!(outcome.skipped_pairs, 0);
        let got: HashSet<_> = outcome.landmarks.iter().map(|lm| lm.addr).collect();
        assert_eq!(got, expected);
        assert!(outcome.landmarks.iter().all(Landmark::is_complete));
    }

    #[test]
    fn test_results_do_not_depend_on_worker_count() {
        let one = Scheduler::new(1)
            .show_progress_bar(false)
            .run(snapshot(), landmarks(6))
            .unwrap();
        let four = Scheduler::new(4)
            .show_progress_bar(false)
            .run(snapshot(), landmarks(6))
            .unwrap();

        let by_addr = |v: Vec<Landmark>| -> BTreeMap<_, _> {
            v.into_iter().map(|lm| (lm.addr, lm.distances)).collect()
        };
        assert_eq!(by_addr(one.landmarks), by_addr(four.landmarks));
    }

    #[test]
    fn test_nothing_to_do() {
        let outcome = Scheduler::new(2).run(snapshot(), Vec::new()).unwrap();
        assert!(outcome.landmarks.is_empty());
    }
}
