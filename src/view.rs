//! Plain data objects handed to the render layer.

use serde::Serialize;

use crate::api::{AggregateStats, LiveEvent, StudentRecord};
use crate::feed::live::ConnectionState;
use crate::risk::{classify_aggregate_risk, classify_score, performance_comment, RiskTier};
use crate::storage::{Health, Snapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatCards {
    pub total_students: String,
    pub average_score: String,
    pub ai_predictions: String,
    pub risk_level: RiskTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRow {
    pub id: i64,
    pub name: String,
    pub class: String,
    pub tier: RiskTier,
    pub row_band: &'static str,
    pub score_badge: String,
    pub badge_class: &'static str,
    pub comment: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivePanel {
    pub last_update: String,
    pub active_sessions: u64,
    pub predictions_processed: u64,
    pub alerts: u64,
    pub system_health: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusLine {
    pub backend: &'static str,
    pub channel: &'static str,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub stats: Option<StatCards>,
    pub students: Option<Vec<StudentRow>>,
    pub roster_notice: Option<&'static str>,
    pub chart: Vec<ChartPoint>,
    pub live: Option<LivePanel>,
    pub status: StatusLine,
}

/// `85` → `"85%"`, `81.5` → `"81.5%"`.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{:.0}%", score)
    } else {
        format!("{}%", score)
    }
}

pub fn stat_cards(stats: &AggregateStats) -> StatCards {
    StatCards {
        total_students: stats.total_students.to_string(),
        average_score: format!("{:.1}%", stats.average_score),
        ai_predictions: stats.ai_predictions_made.to_string(),
        risk_level: classify_aggregate_risk(stats.at_risk_students),
    }
}

pub fn student_row(student: &StudentRecord) -> StudentRow {
    let tier = classify_score(student.score);
    StudentRow {
        id: student.id,
        name: student.name.clone(),
        class: student.class.clone(),
        tier,
        row_band: tier.row_band(),
        score_badge: format_score(student.score),
        badge_class: tier.badge_class(),
        comment: performance_comment(student.score),
    }
}

pub fn chart_series(students: &[StudentRecord]) -> Vec<ChartPoint> {
    students
        .iter()
        .map(|s| ChartPoint {
            label: s.name.clone(),
            value: s.score,
        })
        .collect()
}

pub fn live_panel(event: &LiveEvent) -> LivePanel {
    LivePanel {
        last_update: event.timestamp.format("%H:%M:%S").to_string(),
        active_sessions: event.active_sessions,
        predictions_processed: event.predictions_processed,
        alerts: event.alerts,
        system_health: event.system_health.clone(),
    }
}

pub fn backend_status(health: Health) -> &'static str {
    match health {
        Health::Unknown => "Loading dashboard data...",
        Health::Healthy => "Connected to AI Engine",
        Health::Degraded => "Using demo data - Backend not connected",
    }
}

pub fn channel_status(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connecting => "Connecting to real-time updates...",
        ConnectionState::Open => "Real-time connected",
        ConnectionState::Closed => "Reconnecting...",
        ConnectionState::Simulating => "Real-time updates unavailable",
    }
}

pub fn render(snapshot: &Snapshot) -> DashboardView {
    let students = snapshot.students.as_ref().map(|s| &s.value);
    DashboardView {
        stats: snapshot.stats.as_ref().map(|s| stat_cards(&s.value)),
        students: students.map(|list| list.iter().map(student_row).collect()),
        roster_notice: match students {
            Some(list) if list.is_empty() => Some("No students found"),
            _ => None,
        },
        chart: students.map(|list| chart_series(list)).unwrap_or_default(),
        live: snapshot.live.as_ref().map(live_panel),
        status: StatusLine {
            backend: backend_status(snapshot.connectivity.stats),
            channel: channel_status(snapshot.connectivity.channel),
            degraded: snapshot.connectivity.is_degraded(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{demo_roster, demo_stats, parse_timestamp};
    use crate::storage::{Origin, SnapshotStore};

    #[test]
    fn score_badges() {
        assert_eq!(format_score(85.0), "85%");
        assert_eq!(format_score(81.5), "81.5%");
        assert_eq!(format_score(0.0), "0%");
    }

    #[test]
    fn john_doe_row_is_low_risk() {
        let row = student_row(&StudentRecord {
            id: 1,
            name: "John Doe".to_string(),
            class: "Form 4".to_string(),
            score: 85.0,
        });
        assert_eq!(row.tier, RiskTier::Low);
        assert_eq!(row.row_band, "");
        assert_eq!(row.score_badge, "85%");
        assert_eq!(row.badge_class, "bg-success");
        assert_eq!(row.comment, "Good job!");
    }

    #[test]
    fn demo_stat_cards() {
        let cards = stat_cards(&demo_stats());
        assert_eq!(cards.total_students, "5");
        assert_eq!(cards.average_score, "81.6%");
        assert_eq!(cards.ai_predictions, "42");
        assert_eq!(cards.risk_level, RiskTier::Medium);
    }

    #[test]
    fn chart_follows_roster_order() {
        let chart = chart_series(&demo_roster());
        assert_eq!(chart.len(), 5);
        assert_eq!(chart[0].label, "John Doe");
        assert_eq!(chart[4].value, 88.0);
    }

    #[test]
    fn live_panel_shows_clock_time() {
        let panel = live_panel(&LiveEvent {
            timestamp: parse_timestamp("2024-05-01T09:05:07").unwrap(),
            active_sessions: 2,
            predictions_processed: 300,
            alerts: 0,
            system_health: "optimal".to_string(),
        });
        assert_eq!(panel.last_update, "09:05:07");
    }

    #[test]
    fn degraded_snapshot_renders_demo_status() {
        let store = SnapshotStore::new(8);
        store.replace_stats(demo_stats(), Origin::Demo);
        let view = render(&store.snapshot());
        assert!(view.status.degraded);
        assert_eq!(view.status.backend, "Using demo data - Backend not connected");
        assert_eq!(view.stats.unwrap().total_students, "5");
        assert!(view.students.is_none());
        assert!(view.chart.is_empty());
    }

    #[test]
    fn empty_roster_has_notice() {
        let store = SnapshotStore::new(8);
        store.replace_students(Vec::new(), Origin::Backend);
        let view = render(&store.snapshot());
        assert_eq!(view.roster_notice, Some("No students found"));
    }
}
