//! The two-week demo narrative for "Alex".
//!
//! Generated deterministically from the end date so re-running the seeder
//! writes the same natural keys every time.

use attune_core::models::{ASRS_ANSWER_LABELS, AsrsAnswer, RadarDimension, Task};
use chrono::{Duration, NaiveDate};
use serde_json::json;

use super::DEMO_PROFILE_SUMMARY;

pub const DEMO_DAYS: i32 = 14;

// (mood 1-10, brain state, tasks completed, tasks total, journal note)
const DAYS: [(i32, &str, i32, i32, &str); DEMO_DAYS as usize] = [
    (5, "foggy", 2, 5, "Slow start, skipped breakfast."),
    (6, "scattered", 3, 5, "Too many tabs open all day."),
    (4, "foggy", 1, 5, "Could not start the report."),
    (7, "focused", 4, 5, "Body doubling call helped."),
    (8, "hyperfocused", 5, 5, "Lost four hours in the data model."),
    (5, "scattered", 2, 4, "Meetings broke every block."),
    (4, "low-energy", 1, 3, "Bad sleep."),
    (6, "focused", 3, 4, "Walk before work again."),
    (7, "focused", 4, 5, "Tried the 10-minute starter."),
    (6, "scattered", 3, 5, "Inbox spiral after lunch."),
    (8, "hyperfocused", 5, 5, "Shipped the prototype."),
    (5, "foggy", 2, 4, "Overslept, rushed morning."),
    (7, "focused", 4, 5, "Morning walk plus starter task."),
    (8, "focused", 5, 5, "Best day so far."),
];

const ASRS_PART_A: [(&str, i32); 6] = [
    (
        "How often do you have trouble wrapping up the final details of a project, once the challenging parts have been done?",
        3,
    ),
    (
        "How often do you have difficulty getting things in order when you have to do a task that requires organization?",
        3,
    ),
    (
        "How often do you have problems remembering appointments or obligations?",
        2,
    ),
    (
        "When you have a task that requires a lot of thought, how often do you avoid or delay getting started?",
        4,
    ),
    (
        "How often do you fidget or squirm with your hands or feet when you have to sit down for a long time?",
        2,
    ),
    (
        "How often do you feel overly active and compelled to do things, like you were driven by a motor?",
        3,
    ),
];

// Days on which Alex asked for help, and the task that was stuck.
const INTERVENTION_DAYS: [(i32, i32, Option<i32>); 4] =
    [(3, 0, Some(4)), (6, 1, Some(3)), (10, 2, Some(5)), (12, 0, None)];

#[derive(Debug, Clone)]
pub struct SeedProfile {
    pub dimensions: Vec<RadarDimension>,
    pub profile_tags: Vec<String>,
    pub summary: String,
    pub asrs_total_score: i32,
    pub is_positive_screen: bool,
}

#[derive(Debug, Clone)]
pub struct SeedCheckin {
    pub day_number: i32,
    pub date: NaiveDate,
    pub mood_score: i32,
    pub brain_state: String,
    pub tasks_completed: i32,
    pub tasks_total: i32,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct SeedPlan {
    pub day_number: i32,
    pub date: NaiveDate,
    pub brain_state: String,
    pub tasks: Vec<Task>,
    pub overall_rationale: String,
}

#[derive(Debug, Clone)]
pub struct SeedIntervention {
    pub day_number: i32,
    pub stuck_task_index: i32,
    pub user_message: String,
    pub acknowledgment: String,
    pub restructured_tasks: Vec<Task>,
    pub agent_reasoning: String,
    pub followup_hint: Option<String>,
    pub user_rating: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct SeedHypothesis {
    pub slug: String,
    pub pattern_detected: String,
    pub prediction: String,
    pub confidence: String,
    pub status: String,
    pub supporting_evidence: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct DemoDataset {
    pub profile: SeedProfile,
    pub answers: Vec<AsrsAnswer>,
    pub checkins: Vec<SeedCheckin>,
    pub plans: Vec<SeedPlan>,
    pub interventions: Vec<SeedIntervention>,
    pub hypotheses: Vec<SeedHypothesis>,
}

/// Build the dataset whose last day is `today`.
pub fn demo_dataset(today: NaiveDate) -> DemoDataset {
    let start = today - Duration::days(i64::from(DEMO_DAYS - 1));

    let checkins: Vec<SeedCheckin> = DAYS
        .iter()
        .zip(1..)
        .map(|(&(mood, state, done, total, note), day)| SeedCheckin {
            day_number: day,
            date: start + Duration::days(i64::from(day - 1)),
            mood_score: mood,
            brain_state: state.to_string(),
            tasks_completed: done,
            tasks_total: total,
            note: note.to_string(),
        })
        .collect();

    let plans = checkins
        .iter()
        .map(|c| SeedPlan {
            day_number: c.day_number,
            date: c.date,
            brain_state: c.brain_state.clone(),
            tasks: plan_tasks(&c.brain_state, c.tasks_total),
            overall_rationale: format!(
                "{} day: heavy work is placed where energy peaks, admin is batched late.",
                capitalize(&c.brain_state)
            ),
        })
        .collect::<Vec<_>>();

    let interventions = INTERVENTION_DAYS
        .iter()
        .map(|&(day, stuck, rating)| {
            let plan = &plans[(day - 1) as usize];
            let stuck_title = plan.tasks[stuck as usize].title.clone();
            SeedIntervention {
                day_number: day,
                stuck_task_index: stuck,
                user_message: format!("I can't get started on {}", stuck_title.to_lowercase()),
                acknowledgment: "Starting is the hardest part, and that's okay.".to_string(),
                restructured_tasks: split_first_step(&plan.tasks, stuck),
                agent_reasoning: format!(
                    "Task initiation dips on {} days; a 10-minute starter lowers the activation cost.",
                    plan.brain_state
                ),
                followup_hint: Some("Check in after the first 10 minutes.".to_string()),
                user_rating: rating,
            }
        })
        .collect();

    let answers: Vec<AsrsAnswer> = ASRS_PART_A
        .iter()
        .zip(0..)
        .map(|(&(text, score), index)| AsrsAnswer {
            question_index: index,
            question_text: text.to_string(),
            score,
        })
        .collect();
    let asrs_total_score = answers.iter().map(|a| a.score).sum();

    DemoDataset {
        profile: SeedProfile {
            dimensions: demo_dimensions(),
            profile_tags: vec![
                "Deep-Diver".to_string(),
                "Hyperfocus".to_string(),
                "Slow Starter".to_string(),
            ],
            summary: DEMO_PROFILE_SUMMARY.to_string(),
            asrs_total_score,
            is_positive_screen: asrs_total_score >= attune_core::models::ASRS_POSITIVE_THRESHOLD,
        },
        answers,
        checkins,
        plans,
        interventions,
        hypotheses: demo_hypotheses(),
    }
}

/// ASRS label for a 0-4 score.
pub fn answer_label(score: i32) -> &'static str {
    ASRS_ANSWER_LABELS
        .get(score.clamp(0, 4) as usize)
        .copied()
        .unwrap_or("Never")
}

fn demo_dimensions() -> Vec<RadarDimension> {
    [
        ("attention", "Attention Regulation", 72, "Locks on hard when interested, drifts otherwise."),
        ("initiation", "Task Initiation", 38, "Starting is the bottleneck, not finishing."),
        ("time", "Time Perception", 45, "Underestimates tasks longer than an hour."),
        ("emotional", "Emotional Regulation", 61, "Frustration spikes after interrupted focus."),
        ("working_memory", "Working Memory", 55, "Needs external lists for multi-step work."),
        ("energy", "Energy Pattern", 66, "Clear morning peak, post-lunch slump."),
    ]
    .into_iter()
    .map(|(key, label, value, insight)| RadarDimension {
        key: key.to_string(),
        label: label.to_string(),
        value,
        insight: insight.to_string(),
    })
    .collect()
}

fn demo_hypotheses() -> Vec<SeedHypothesis> {
    vec![
        SeedHypothesis {
            slug: "morning-walk-focus".to_string(),
            pattern_detected: "Focused days follow a morning walk".to_string(),
            prediction: "A walk before 9:00 raises completion rate by ~20%".to_string(),
            confidence: "medium".to_string(),
            status: "testing".to_string(),
            supporting_evidence: json!([{ "dayNumber": 8 }, { "dayNumber": 13 }]),
        },
        SeedHypothesis {
            slug: "meeting-fragmentation".to_string(),
            pattern_detected: "Meeting-heavy days end scattered".to_string(),
            prediction: "Protecting one 2-hour block keeps mood above 6".to_string(),
            confidence: "high".to_string(),
            status: "confirmed".to_string(),
            supporting_evidence: json!([{ "dayNumber": 2 }, { "dayNumber": 6 }, { "dayNumber": 10 }]),
        },
        SeedHypothesis {
            slug: "starter-task".to_string(),
            pattern_detected: "10-minute starters unblock stuck tasks".to_string(),
            prediction: "Stuck tasks with a starter step finish the same day".to_string(),
            confidence: "low".to_string(),
            status: "testing".to_string(),
            supporting_evidence: json!([{ "dayNumber": 9 }]),
        },
    ]
}

const TASK_POOL: [(&str, &str, i32, &str); 5] = [
    ("Write project report", "deep-work", 90, "high"),
    ("Review pull requests", "collaboration", 45, "medium"),
    ("Plan next sprint", "planning", 30, "medium"),
    ("Answer email", "admin", 20, "low"),
    ("Stretch and walk", "self-care", 15, "low"),
];

fn plan_tasks(brain_state: &str, total: i32) -> Vec<Task> {
    let slots = ["09:00", "10:45", "13:30", "15:00", "16:30"];
    TASK_POOL
        .iter()
        .take(total as usize)
        .zip(0..)
        .map(|(&(title, category, minutes, priority), index)| Task {
            index,
            title: title.to_string(),
            description: format!("{title} ({category})"),
            // shorter blocks when focus is shaky
            duration_minutes: match brain_state {
                "foggy" | "low-energy" => (minutes / 2).max(10),
                _ => minutes,
            },
            time_slot: slots[index as usize].to_string(),
            category: category.to_string(),
            rationale: format!("Fits a {brain_state} day at this hour."),
            priority: priority.to_string(),
            status: "pending".to_string(),
        })
        .collect()
}

fn split_first_step(tasks: &[Task], stuck: i32) -> Vec<Task> {
    let mut restructured = Vec::with_capacity(tasks.len() + 1);
    for task in tasks {
        if task.index == stuck {
            restructured.push(Task {
                title: format!("Starter: open {} for 10 minutes", task.title.to_lowercase()),
                duration_minutes: 10,
                rationale: "Tiny first step to get past initiation.".to_string(),
                priority: "high".to_string(),
                ..task.clone()
            });
        }
        restructured.push(task.clone());
    }
    for (index, task) in restructured.iter_mut().enumerate() {
        task.index = index as i32;
    }
    restructured
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
