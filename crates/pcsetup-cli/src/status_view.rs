//! Display projection of a status report.
//!
//! Pure: the dashboard and the plain printer both render from a
//! [`StatusView`], never from the raw report.

use pcsetup_core::request::format_timestamp;
use pcsetup_core::{RequestStatus, SettingKey, StatusReport, TaskStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct ComputerProgress {
    pub name: String,
    /// 0 to 100, unrounded.
    pub progress: f64,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: String,
    pub computer: String,
    pub task: String,
    pub status: TaskStatus,
    pub message: String,
    pub duration: Option<String>,
    /// Populated for failed tasks only.
    pub resolution_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub request_id: String,
    pub status: Option<RequestStatus>,
    /// Overall progress, 0 to 100, unrounded. Bar widths use this.
    pub progress: f64,
    /// Rounded overall progress for the label.
    pub percent: u8,
    pub computers: Vec<ComputerProgress>,
    pub logs: Vec<LogLine>,
    pub elapsed: Option<String>,
}

impl StatusView {
    pub fn from_report(request_id: &str, report: &StatusReport) -> Self {
        let progress = clamp_progress(report.progress);
        Self {
            request_id: request_id.to_string(),
            status: report.status.clone(),
            progress,
            percent: percent(progress),
            computers: report
                .computer_progress
                .iter()
                .map(|(name, p)| {
                    let progress = clamp_progress(*p);
                    ComputerProgress {
                        name: name.clone(),
                        progress,
                        percent: percent(progress),
                    }
                })
                .collect(),
            logs: report
                .logs
                .iter()
                .map(|entry| LogLine {
                    timestamp: format_timestamp(&entry.timestamp),
                    computer: entry.computer_name.clone(),
                    task: task_label(&entry.task_name),
                    status: entry.status.clone(),
                    message: entry.message.clone(),
                    duration: entry.duration.map(format_duration),
                    resolution_steps: if entry.status.is_failure() {
                        entry.resolution_steps.clone()
                    } else {
                        Vec::new()
                    },
                })
                .collect(),
            elapsed: report.actual_time.map(format_duration),
        }
    }

    /// No further updates are expected for this request.
    pub fn is_terminal(&self) -> bool {
        self.status.as_ref().is_some_and(RequestStatus::is_terminal)
    }

    pub fn is_success(&self) -> bool {
        self.status.as_ref().is_some_and(RequestStatus::is_success)
    }

    pub fn status_label(&self) -> &str {
        self.status.as_ref().map_or("Unknown", RequestStatus::label)
    }

    /// Line-oriented rendering for `--plain` output.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{}  {}  {}%{}",
            self.request_id,
            self.status_label(),
            self.percent,
            self.elapsed
                .as_ref()
                .map(|e| format!("  ({e})"))
                .unwrap_or_default()
        )];
        for pc in &self.computers {
            lines.push(format!("  {:<20} {:>3}%", pc.name, pc.percent));
        }
        for log in &self.logs {
            let mut line = format!(
                "  [{}] {} {} {}: {}",
                log.timestamp, log.computer, log.task, log.status, log.message
            );
            if let Some(d) = &log.duration {
                line.push_str(&format!(" ({d})"));
            }
            lines.push(line);
            for step in &log.resolution_steps {
                lines.push(format!("      - {step}"));
            }
        }
        lines
    }
}

fn clamp_progress(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(progress: f64) -> u8 {
    progress.round() as u8
}

/// Task names that match a setting key are shown with its label.
fn task_label(task_name: &str) -> String {
    task_name
        .parse::<SettingKey>()
        .map_or_else(|_| task_name.to_string(), |key| key.label().to_string())
}

/// Seconds as `1h 02m 03s`, `2m 05s` or `4.2s`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "-".to_string();
    }
    if secs < 60.0 {
        return format!("{secs:.1}s");
    }
    let total = secs.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else {
        format!("{m}m {s:02}s")
    }
}
