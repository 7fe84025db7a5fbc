//! Drive the compositor against the simulated HMD, adjusting it from a keyboard script.
//!
//! Usage: cargo run --example simulate [keys]
//! Keys use the default bindings, one per frame, e.g. `...==e`.
//! Set RUST_LOG=debug to see each adjustment.

use riftlag::mock::{MockHmd, RecordingGpu, RecordingScene};
use riftlag::{Command, LabConfig, RiftApp};

const FRAMES: usize = 24;

fn main() {
    env_logger::init();

    let config = match LabConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let script: Vec<char> = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "..==e]r".to_string())
        .chars()
        .collect();

    let mut app = match RiftApp::new(
        || Ok(MockHmd::new()),
        RecordingGpu::new().close_after(FRAMES),
        &config,
        Box::new(RecordingScene::new()),
    ) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    let desc = app.session().hmd_desc();
    println!("HMD:      {}", desc.product_name);
    println!("Refresh:  {} Hz", desc.display_refresh_rate);
    let layout = app.compositor().setup().layout();
    println!("Target:   {}x{}", layout.size.x, layout.size.y);
    println!();

    let Some(sender) = app.take_command_sender() else {
        eprintln!("Command sender already taken");
        std::process::exit(1);
    };
    let input = std::thread::spawn(move || {
        for key in script {
            match Command::for_key(key) {
                Some(command) => {
                    if let Err(e) = sender.send(command) {
                        eprintln!("Input thread stopping: {}", e);
                        break;
                    }
                }
                None => eprintln!("No binding for '{}'", key),
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
    });

    for _ in 0..FRAMES {
        match app.run_frame() {
            Ok(report) => println!(
                "frame={:<3} lag={} delay={} rendered={:<5} eyes={:?} submitted={}",
                report.frame_index,
                report.lag,
                report.delay,
                report.rendered,
                report
                    .drawn
                    .iter()
                    .map(|d| (d.viewport, d.source))
                    .collect::<Vec<_>>(),
                report.submitted,
            ),
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }

    if input.join().is_err() {
        eprintln!("Input thread panicked");
    }

    let hmd = match app.session().device() {
        Ok(hmd) => hmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    println!(
        "\nTotal: {} frames submitted, {} recenters",
        hmd.submitted().len(),
        hmd.recenter_count()
    );
}
