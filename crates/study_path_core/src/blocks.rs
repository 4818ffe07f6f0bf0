//! crates/study_path_core/src/blocks.rs
//!
//! Builders for the workspace (Notion) block shapes a topic page is made of.
//! The record-builder instruction shows the backend a page rendered with
//! these, so the requested schema and the code agree on one definition.

use serde_json::{json, Map, Value};

use crate::domain::{EnrichedTopic, PageRecord};

pub const RECOMMENDED_COURSES_HEADING: &str = "Recommended Courses";

/// Header row of the course table, in column order.
pub const COURSE_TABLE_HEADER: [&str; 4] = ["Course Name", "Duration", "Investment", "Course Page"];

pub fn checklist_heading(course_title: &str) -> String {
    format!("Checklist – {course_title}")
}

fn rich_text(content: &str) -> Value {
    json!({ "type": "text", "text": { "content": content } })
}

/// The `properties` object of a page titled `title`.
pub fn title_property(title: &str) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "title".to_string(),
        json!({ "id": "title", "type": "title", "title": [rich_text(title)] }),
    );
    properties
}

pub fn heading_2(content: &str) -> Value {
    json!({
        "object": "block",
        "type": "heading_2",
        "heading_2": { "rich_text": [rich_text(content)] }
    })
}

pub fn table_row(cells: &[&str]) -> Value {
    let cells: Vec<Value> = cells.iter().map(|c| json!([rich_text(c)])).collect();
    json!({ "type": "table_row", "table_row": { "cells": cells } })
}

pub fn table(rows: Vec<Value>) -> Value {
    json!({
        "object": "block",
        "type": "table",
        "table": {
            "table_width": COURSE_TABLE_HEADER.len(),
            "has_column_header": true,
            "has_row_header": false,
            "children": rows
        }
    })
}

/// An unchecked checklist item.
pub fn to_do(content: &str) -> Value {
    json!({
        "object": "block",
        "type": "to_do",
        "to_do": { "rich_text": [rich_text(content)], "checked": false, "color": "default" }
    })
}

/// Renders the page layout for `topic`: course heading, course table, then
/// one checklist of subtopics per course. Course rows show the topic
/// duration since offers carry no duration of their own.
pub fn page_record_for(topic: &EnrichedTopic) -> PageRecord {
    let mut rows = vec![table_row(&COURSE_TABLE_HEADER)];
    rows.extend(topic.courses.iter().map(|course| {
        table_row(&[
            course.title.as_str(),
            topic.topic.duration.as_str(),
            course.price.as_str(),
            course.link.as_str(),
        ])
    }));

    let mut children = vec![heading_2(RECOMMENDED_COURSES_HEADING), table(rows)];
    for course in &topic.courses {
        children.push(heading_2(&checklist_heading(&course.title)));
        children.extend(topic.topic.subtopics.iter().map(|s| to_do(&s.title)));
    }

    PageRecord {
        properties: title_property(&topic.topic.title),
        children,
    }
}
