use std::{env, time::Duration};

use blinkrise_core::{CameraAction, DashboardBackend, StreamEpoch};
use blinkrise_http::{HttpBackendConfig, HttpDashboardBackend};

#[tokio::main]
async fn main() {
    let base_url =
        env::var("BLINKRISE_API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_owned());
    let config = HttpBackendConfig::new(base_url.clone(), Duration::from_secs(5));

    let backend = match HttpDashboardBackend::new(config) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("Failed to configure backend client: {err}");
            std::process::exit(1);
        }
    };

    println!("Backend: {base_url}");
    let start = backend.camera_control(CameraAction::Start).await;
    println!("start  -> {}", start.message());
    if !start.is_success() {
        eprintln!("Camera did not start ({start:?}); is the detection backend running?");
        std::process::exit(1);
    }

    println!("feed   -> {}", backend.video_feed_url(StreamEpoch::new(1)));
    let status = backend.fetch_status().await;
    match &status {
        Ok(snapshot) => println!("status -> {snapshot:?}"),
        Err(err) => eprintln!("status -> {err}"),
    }

    let stop = backend.camera_control(CameraAction::Stop).await;
    println!(
        "stop   -> {} ({})",
        stop.message(),
        if stop.is_success() { "ok" } else { "rejected" }
    );
    if status.is_err() {
        std::process::exit(1);
    }
}
