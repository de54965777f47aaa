//! Plain-text rendering of [`DashboardView`].

use std::fmt::Write;

use crate::state::{DashboardView, StatusTone};

const ALARM_STYLE: &str = "\x1b[1;31m";
const RESET_STYLE: &str = "\x1b[0m";

/// Render one dashboard frame. `color` toggles ANSI styling.
pub fn render(view: &DashboardView, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== BlinkRise ==");
    if let Some(banner) = &view.error_banner {
        let _ = writeln!(out, "{banner}");
    }
    let spinner = if view.show_spinner { " [loading]" } else { "" };
    let _ = writeln!(out, "{}{spinner}", view.stream_line);

    let metrics = &view.metrics;
    let _ = writeln!(out, "  EAR          {}", metrics.ear);
    let _ = writeln!(out, "  Blink Count  {}", metrics.blink_count);
    match (metrics.tone, color) {
        (StatusTone::Alarm, true) => {
            let _ = writeln!(out, "  Status       {ALARM_STYLE}{}{RESET_STYLE}", metrics.status);
        }
        _ => {
            let _ = writeln!(out, "  Status       {}", metrics.status);
        }
    }
    let _ = writeln!(out, "  Drowsy Prob. {}", metrics.drowsy_probability);
    let _ = write!(out, "[t] {}  [q] Quit", view.toggle_label);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MetricsView;

    fn view(tone: StatusTone, error_banner: Option<&str>) -> DashboardView {
        DashboardView {
            metrics: MetricsView {
                ear: "0.18".to_owned(),
                blink_count: "7".to_owned(),
                status: "Drowsy (ALARM)".to_owned(),
                drowsy_probability: "91.00%".to_owned(),
                tone,
            },
            error_banner: error_banner.map(str::to_owned),
            toggle_label: "Turn Off Video",
            show_spinner: false,
            stream_line: "Stream #1: live".to_owned(),
        }
    }

    #[test]
    fn renders_all_metric_rows() {
        let text = render(&view(StatusTone::Normal, None), false);
        assert!(text.contains("EAR          0.18"));
        assert!(text.contains("Blink Count  7"));
        assert!(text.contains("Drowsy Prob. 91.00%"));
        assert!(text.ends_with("[t] Turn Off Video  [q] Quit"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn alarm_status_is_highlighted_only_with_color() {
        let colored = render(&view(StatusTone::Alarm, Some("Error: boom")), true);
        assert!(colored.contains("\x1b[1;31mDrowsy (ALARM)\x1b[0m"));
        assert!(colored.contains("Error: boom"));

        let plain = render(&view(StatusTone::Alarm, None), false);
        assert!(plain.contains("Status       Drowsy (ALARM)"));
    }
}
