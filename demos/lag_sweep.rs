//! Measure how far the rendered eye position trails the tracked one for each lag setting.
//!
//! Usage: cargo run --example lag_sweep

use riftlag::mock::{MockHmd, RecordingGpu, RecordingScene};
use riftlag::{Eye, LabConfig, RiftApp};

const FRAMES: u64 = 40;
const MAX_LAG: u32 = 12;

fn main() {
    env_logger::init();

    println!("lag  mean error (mm)  final error (mm)");
    for lag in 0..=MAX_LAG {
        let config = LabConfig {
            initial_lag: lag,
            ..Default::default()
        };
        let scene = RecordingScene::new();
        let mut app = match RiftApp::new(
            || Ok(MockHmd::new()),
            RecordingGpu::new(),
            &config,
            Box::new(scene.clone()),
        ) {
            Ok(app) => app,
            Err(e) => {
                eprintln!("Failed to start: {}", e);
                std::process::exit(1);
            }
        };

        let mut errors = Vec::new();
        for frame in 0..FRAMES {
            if let Err(e) = app.run_frame() {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            let calls = scene.calls();
            let Some(left) = calls.iter().rev().find(|c| c.eye == Eye::Left) else {
                continue;
            };
            let rendered = left.head_pose.w_axis.truncate();
            let tracked = MockHmd::eye_pose(frame, Eye::Left, MockHmd::EYE_OFFSET).position;
            errors.push((rendered - tracked).length() * 1000.0);
        }

        let mean = errors.iter().sum::<f32>() / errors.len().max(1) as f32;
        let last = errors.last().copied().unwrap_or_default();
        println!("{:<4} {:<18.2} {:.2}", lag, mean, last);
    }
}
