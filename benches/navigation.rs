use histnav::{HistoryOptions, MemoryStorage, NavigationHistory};
use serde_json::json;
use std::time::Instant;

const CAPACITIES: &[usize] = &[10, 100, 1000];
const OPERATIONS: usize = 20_000;
const SAMPLES: usize = 5;
/// Budget per operation, in microseconds.
const BUDGET_US: f64 = 50.0;

fn location(n: usize) -> String {
    format!("/post/{}", n % 1500)
}

fn run_ephemeral(capacity: usize) -> f64 {
    let mut history =
        NavigationHistory::new(HistoryOptions::default().capacity(capacity)).expect("valid options");
    let start = Instant::now();
    for n in 0..OPERATIONS {
        match n % 10 {
            7 => history.back(2),
            8 => history.forward(1),
            9 => history.go(-1),
            _ => {
                history.set(location(n * 7));
            }
        }
    }
    start.elapsed().as_secs_f64() * 1e6 / OPERATIONS as f64
}

fn run_persisted(capacity: usize) -> f64 {
    let mut history = NavigationHistory::persisted_json(
        HistoryOptions::default()
            .capacity(capacity)
            .persistence_key("bench"),
        Box::new(MemoryStorage::new()),
    )
    .expect("valid options");
    let start = Instant::now();
    for n in 0..OPERATIONS {
        match n % 10 {
            8 => history.back(1),
            9 => {
                history.save_history();
            }
            _ => {
                history.set(location(n * 7));
            }
        }
    }
    start.elapsed().as_secs_f64() * 1e6 / OPERATIONS as f64
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    values[values.len() / 2]
}

fn main() {
    let mut all_passed = true;
    let mut results = Vec::new();

    for &capacity in CAPACITIES {
        let mut ephemeral = Vec::with_capacity(SAMPLES);
        let mut persisted = Vec::with_capacity(SAMPLES);

        for _ in 0..SAMPLES {
            ephemeral.push(run_ephemeral(capacity));
            persisted.push(run_persisted(capacity));
        }

        let ephemeral_us = median(&mut ephemeral);
        let persisted_us = median(&mut persisted);
        let passed = ephemeral_us <= BUDGET_US;
        if !passed {
            all_passed = false;
        }

        results.push(json!({
            "capacity": capacity,
            "ephemeral_us_per_op": (ephemeral_us * 1000.0).round() / 1000.0,
            "persisted_us_per_op": (persisted_us * 1000.0).round() / 1000.0,
            "passed": passed,
        }));
    }

    let output = json!({
        "benchmark": "navigation",
        "operations": OPERATIONS,
        "samples": SAMPLES,
        "budget_us_per_op": BUDGET_US,
        "results": results,
        "passed": all_passed,
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap());

    if !all_passed {
        std::process::exit(1);
    }
}
