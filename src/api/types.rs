//! Wire shapes for the analytics backend and their fail-closed decoders.
//!
//! Every decoder rejects missing fields, wrong types and out-of-range values
//! so the poller falls back to demo data instead of passing a half-valid
//! payload to the render layer.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::FetchError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: i64,
    pub name: String,
    pub class: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_students: u64,
    pub average_score: f64,
    pub ai_predictions_made: u64,
    pub at_risk_students: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub active_sessions: u64,
    pub predictions_processed: u64,
    pub alerts: u64,
    pub system_health: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub high_risk: u64,
    pub medium_risk: u64,
    pub low_risk: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAnalysis {
    pub student_id: i64,
    pub name: String,
    pub class: String,
    pub score: f64,
    /// `risk_score` scaled to a percentage.
    pub risk_percent: f64,
    pub risk_level: String,
    pub recommendations: Vec<String>,
}

// Response envelopes

#[derive(Deserialize, Debug)]
struct StudentsResponse {
    students: Vec<StudentRecord>,
}

#[derive(Deserialize, Debug)]
struct BatchResponse {
    summary: BatchSummary,
}

#[derive(Deserialize, Debug)]
struct AnalysisResponse {
    student_info: StudentInfo,
    dropout_risk_analysis: DropoutRisk,
    performance_analysis: PerformanceAnalysis,
}

#[derive(Deserialize, Debug)]
struct StudentInfo {
    name: String,
    class: String,
    score: f64,
}

#[derive(Deserialize, Debug)]
struct DropoutRisk {
    risk_score: f64,
    risk_level: String,
}

#[derive(Deserialize, Debug)]
struct PerformanceAnalysis {
    recommendations: Vec<String>,
}

fn check_percent(field: &str, value: f64) -> Result<(), FetchError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(FetchError::Decode(format!("{} out of range: {}", field, value)))
    }
}

fn parse<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))
}

pub fn decode_stats(body: &str) -> Result<AggregateStats, FetchError> {
    let stats: AggregateStats = parse(body)?;
    check_percent("average_score", stats.average_score)?;
    Ok(stats)
}

pub fn decode_students(body: &str) -> Result<Vec<StudentRecord>, FetchError> {
    let resp: StudentsResponse = parse(body)?;
    for s in &resp.students {
        check_percent("score", s.score)?;
    }
    Ok(resp.students)
}

pub fn decode_batch(body: &str) -> Result<BatchSummary, FetchError> {
    let resp: BatchResponse = parse(body)?;
    Ok(resp.summary)
}

pub fn decode_analysis(student_id: i64, body: &str) -> Result<StudentAnalysis, FetchError> {
    let resp: AnalysisResponse = parse(body)?;
    check_percent("score", resp.student_info.score)?;
    let risk = resp.dropout_risk_analysis.risk_score;
    if !(0.0..=1.0).contains(&risk) {
        return Err(FetchError::Decode(format!("risk_score out of range: {}", risk)));
    }
    Ok(StudentAnalysis {
        student_id,
        name: resp.student_info.name,
        class: resp.student_info.class,
        score: resp.student_info.score,
        risk_percent: (risk * 1000.0).round() / 10.0,
        risk_level: resp.dropout_risk_analysis.risk_level,
        recommendations: resp.performance_analysis.recommendations,
    })
}

pub fn decode_live_event(body: &str) -> Result<LiveEvent, FetchError> {
    parse(body)
}

/// Accepts RFC3339 and offset-less ISO-8601 (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

// =============================================================================
// Demo payloads
// =============================================================================

pub fn demo_stats() -> AggregateStats {
    AggregateStats {
        total_students: 5,
        average_score: 81.6,
        ai_predictions_made: 42,
        at_risk_students: 2,
    }
}

pub fn demo_roster() -> Vec<StudentRecord> {
    [
        (1, "John Doe", "Form 4", 85.0),
        (2, "Jane Smith", "Form 4", 92.0),
        (3, "Mike Johnson", "Form 3", 78.0),
        (4, "Sarah Williams", "Form 3", 65.0),
        (5, "David Brown", "Form 2", 88.0),
    ]
    .into_iter()
    .map(|(id, name, class, score)| StudentRecord {
        id,
        name: name.to_string(),
        class: class.to_string(),
        score,
    })
    .collect()
}

pub fn demo_batch_summary() -> BatchSummary {
    BatchSummary {
        high_risk: 1,
        medium_risk: 2,
        low_risk: 2,
    }
}

pub fn demo_analysis(student_id: i64) -> StudentAnalysis {
    StudentAnalysis {
        student_id,
        name: format!("Student {}", student_id),
        class: String::new(),
        score: 75.0,
        risk_percent: 50.0,
        risk_level: "Medium".to_string(),
        recommendations: vec![
            "Focus on Mathematics".to_string(),
            "Attend extra classes".to_string(),
            "Complete all homework".to_string(),
        ],
    }
}
