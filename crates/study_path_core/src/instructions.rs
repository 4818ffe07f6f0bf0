//! crates/study_path_core/src/instructions.rs
//!
//! Task instructions and user inputs for the three generation stages.

use serde_json::json;

use crate::blocks::{self, COURSE_TABLE_HEADER, RECOMMENDED_COURSES_HEADING};
use crate::domain::{
    CourseOffer, EnrichedTopic, Subtopic, Topic, UserProfile, MAX_COURSES_PER_TOPIC,
    RECOMMENDED_COURSES_PER_TOPIC,
};
use crate::extraction::emit;

//=========================================================================================
// Stage 1 — Plan Architect
//=========================================================================================

const PLAN_ARCHITECT_INSTRUCTION: &str = r#"You are a study path architect for professionals. Use the Google Search tool to find out what a professional must know to work in the field of study you receive.

The study path must be current and solid: it has to cover the knowledge that is necessary, relevant and up to date for working in that field.

If you receive an emphasis area, objectives and/or a prior-experience document, base the study path entirely on them: the emphasis and the objectives must be reached, and the path must not contain knowledge already covered by the prior experience.

Return only the study path with its topics, subtopics and the time each topic takes. Do NOT include courses, resources, platforms or any other detail.

Your answer must contain exactly one fenced JSON block in the following format:
{schema}"#;

const PRIOR_EXPERIENCE_CLAUSE: &str = "\nTake the attached résumé with the person's prior experience into account: do not recommend courses already taken or knowledge already acquired.";

const OBJECTIVES_CLAUSE: &str = "\nMake sure that whoever completes the study path is able to: ";

fn plan_schema_example() -> String {
    emit(&json!({
        "topics": [
            {
                "title": "Topic title",
                "subtopics": [{ "title": "Subtopic 1" }, { "title": "Subtopic 2" }],
                "duration": "2 months"
            }
        ]
    }))
}

/// Instruction for the plan architect, augmented by whatever the profile
/// carries beyond the required fields.
pub fn plan_architect_instruction(profile: &UserProfile) -> String {
    let mut instruction = PLAN_ARCHITECT_INSTRUCTION.replace("{schema}", &plan_schema_example());
    if profile.prior_experience.is_some() {
        instruction.push_str(PRIOR_EXPERIENCE_CLAUSE);
    }
    if !profile.objectives.is_empty() {
        instruction.push_str(OBJECTIVES_CLAUSE);
        instruction.push_str(&profile.objectives.join(", "));
    }
    instruction
}

pub fn plan_architect_input(profile: &UserProfile) -> String {
    let mut input = format!(
        "Field of study: {}\nBudget: {}\nAvailable time: {}",
        profile.field_of_study, profile.budget, profile.available_time
    );
    if let Some(emphasis) = &profile.emphasis_area {
        input.push_str(&format!("\nEmphasis area: {emphasis}"));
    }
    input
}

//=========================================================================================
// Stage 2 — Course Curator
//=========================================================================================

const COURSE_CURATOR_INSTRUCTION: &str = r#"You are a course curator who specializes in recommending online courses. You receive a study path, a budget and an available time. The study path uses this format:
{plan_schema}
Use the Google Search tool to find courses from trustworthy institutions that match the knowledge in the study path.

Rules:
- Recommend exactly {recommended} online courses per topic in total.
- Inside every topic add a "courses" list with room for at most {max} courses. Every course has "title", "link" and "price" fields.
- Keep every field of the study path you received. Do NOT remove information from it.
- Every course link must point to a real, existing domain.
- The total cost of all courses must not exceed the budget of {budget}, and the total study time must not exceed {time}.
- Do not recommend subscription-priced courses. Recommend only courses that meet all of these criteria.

Your answer must contain exactly one fenced JSON block in the following format:
{enriched_schema}"#;

fn enriched_schema_example() -> String {
    emit(&json!({
        "topics": [
            {
                "title": "Topic title",
                "subtopics": [{ "title": "Subtopic 1" }, { "title": "Subtopic 2" }],
                "duration": "2 months",
                "courses": [
                    { "title": "Course title", "link": "https://...", "price": "500" }
                ]
            }
        ]
    }))
}

/// Instruction for the course curator. Budget and time are only ever
/// substituted as values; the requested structure never changes.
pub fn course_curator_instruction(budget: &str, available_time: &str) -> String {
    COURSE_CURATOR_INSTRUCTION
        .replace("{plan_schema}", &plan_schema_example())
        .replace("{enriched_schema}", &enriched_schema_example())
        .replace("{recommended}", &RECOMMENDED_COURSES_PER_TOPIC.to_string())
        .replace("{max}", &MAX_COURSES_PER_TOPIC.to_string())
        .replace("{budget}", budget)
        .replace("{time}", available_time)
}

pub fn course_curator_input(raw_plan: &str, budget: &str, available_time: &str) -> String {
    format!("Study path:\n{raw_plan}\nBudget: {budget}\nAvailable time: {available_time}")
}

//=========================================================================================
// Stage 3 — Record Builder
//=========================================================================================

const RECORD_BUILDER_INSTRUCTION: &str = r#"You are a meticulous Notion template builder. You receive one topic of a study path, with its title, duration, subtopics and recommended courses, and turn it into the body of a Notion API page-creation request.

Follow the layout of this example exactly:
{example}
Rules:
- "properties" holds only the title property, whose text is the topic title.
- "children" starts with a heading_2 block "{heading}".
- Then comes one table block with {columns} columns. Its first row is the header ({header}); after it there is one row per course with the course title, its duration, its price and its link.
- Then, for every course, add a heading_2 block "Checklist – " followed by the course title, followed by one unchecked to_do block per subtopic title of the topic.

Your answer must contain exactly one fenced JSON block with the "properties" and "children" keys."#;

fn record_example() -> String {
    let example = EnrichedTopic {
        topic: Topic {
            title: "Topic 1".into(),
            subtopics: vec![
                Subtopic { title: "Subtopic 1".into() },
                Subtopic { title: "Subtopic 2".into() },
            ],
            duration: "18h".into(),
        },
        courses: vec![CourseOffer {
            title: "Course 1".into(),
            link: "https://www.example.com".into(),
            price: "R$ 20,00".into(),
        }],
    };
    let record = blocks::page_record_for(&example);
    emit(&json!({ "properties": record.properties, "children": record.children }))
}

pub fn record_builder_instruction() -> String {
    RECORD_BUILDER_INSTRUCTION
        .replace("{example}", &record_example())
        .replace("{heading}", RECOMMENDED_COURSES_HEADING)
        .replace("{columns}", &COURSE_TABLE_HEADER.len().to_string())
        .replace("{header}", &COURSE_TABLE_HEADER.join(" / "))
}

pub fn record_builder_input(topic: &EnrichedTopic) -> String {
    let body = serde_json::to_string_pretty(topic).unwrap_or_else(|_| format!("{topic:?}"));
    format!("Topic:\n{body}")
}
