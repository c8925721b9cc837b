//! Task inputs handed to the procedures and the rows they return.
//!
//! Rows arrive with snake_case keys and leave as camelCase JSON.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskCreate {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub priority: i32,
    pub id_category: Option<i64>,
    pub estimated_time: Option<i32>,
}

/// Full replacement of every editable task field
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub priority: i32,
    pub status: i32,
    pub id_category: Option<i64>,
    pub estimated_time: Option<i32>,
}

/// Optional, conjunctive list filters. The date range is inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Option<i32>,
    pub priority: Option<i32>,
    pub due_date_from: Option<NaiveDate>,
    pub due_date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct TaskCreated {
    pub id_task: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct TaskSummary {
    pub id_task: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub priority: i32,
    pub status: i32,
    pub id_category: Option<i64>,
    pub estimated_time: Option<i32>,
    pub subtask_count: i64,
    pub completed_subtask_count: i64,
    pub attachment_count: i64,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct TaskDetails {
    pub id_task: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub priority: i32,
    pub status: i32,
    pub id_category: Option<i64>,
    pub estimated_time: Option<i32>,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct Subtask {
    pub id_subtask: i64,
    pub title: String,
    pub completed: bool,
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct Attachment {
    pub id_attachment: i64,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub date_created: DateTime<Utc>,
}

/// A task with its related rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDetail {
    pub task: TaskDetails,
    pub subtasks: Vec<Subtask>,
    pub tags: Vec<Tag>,
    pub attachments: Vec<Attachment>,
}

/// `success` is 1 when the procedure applied the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: i32,
}
