//! Prometheus text exposition format.
//!
//! Renders the latest run report as gauges labelled by `check`.

use beacon_core::{RunReport, Status};

/// Render a run report into Prometheus text format.
pub fn render_prometheus(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str("# HELP beacon_check_up Check status (1 operational, 0.5 degraded, 0 down).\n");
    out.push_str("# TYPE beacon_check_up gauge\n");
    for r in &report.results {
        out.push_str(&format!(
            "beacon_check_up{{check=\"{}\"}} {}\n",
            escape(&r.name),
            status_value(r.status)
        ));
    }

    out.push_str("# HELP beacon_check_latency_ms Check latency in milliseconds.\n");
    out.push_str("# TYPE beacon_check_latency_ms gauge\n");
    for r in &report.results {
        out.push_str(&format!(
            "beacon_check_latency_ms{{check=\"{}\"}} {}\n",
            escape(&r.name),
            r.latency_ms
        ));
    }

    out.push_str("# HELP beacon_check_timed_out Whether the check hit its timeout.\n");
    out.push_str("# TYPE beacon_check_timed_out gauge\n");
    for r in &report.results {
        out.push_str(&format!(
            "beacon_check_timed_out{{check=\"{}\"}} {}\n",
            escape(&r.name),
            u8::from(r.timed_out)
        ));
    }

    out.push_str("# HELP beacon_overall_status Overall status (1 operational, 0.5 degraded, 0 down).\n");
    out.push_str("# TYPE beacon_overall_status gauge\n");
    out.push_str(&format!(
        "beacon_overall_status {}\n",
        status_value(report.overall_status())
    ));

    out
}

fn status_value(status: Status) -> &'static str {
    match status {
        Status::Operational => "1",
        Status::Degraded => "0.5",
        Status::Down => "0",
    }
}

// Label values escape backslash, quote, and newline.
fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
