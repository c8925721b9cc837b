//! Input contracts for the task endpoints and their typed forms.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::schema::{Field, Schema};
use crate::services::task::{TaskCreate, TaskFilter, TaskUpdate};

fn title() -> Field {
    Field::string().min_len(3).max_len(100)
}

fn description() -> Field {
    Field::string().max_len(1000).optional().nullable()
}

fn estimated_time() -> Field {
    Field::integer().range(5, 1440).optional().nullable()
}

pub static CREATE_BODY: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("title", title())
        .field("description", description())
        .field("dueDate", Field::date().optional().nullable())
        .field("dueTime", Field::time().optional().nullable())
        .field("priority", Field::integer().range(0, 2).optional().nullable())
        .field("idCategory", Field::integer().positive().optional().nullable())
        .field("estimatedTime", estimated_time())
});

pub static LIST_QUERY: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("status", Field::integer().range(0, 3).coerce().optional())
        .field("priority", Field::integer().range(0, 2).coerce().optional())
        .field("dueDateFrom", Field::date().optional())
        .field("dueDateTo", Field::date().optional())
});

pub static ID_PARAMS: Lazy<Schema> =
    Lazy::new(|| Schema::object().field("id", Field::integer().positive().coerce()));

pub static UPDATE_BODY: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("title", title())
        .field("description", description())
        .field("dueDate", Field::date().optional().nullable())
        .field("dueTime", Field::time().optional().nullable())
        .field("priority", Field::integer().range(0, 2))
        .field("status", Field::integer().range(0, 3))
        .field("idCategory", Field::integer().positive().optional().nullable())
        .field("estimatedTime", estimated_time())
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub priority: Option<i32>,
    pub id_category: Option<i64>,
    pub estimated_time: Option<i32>,
}

impl From<CreateTaskBody> for TaskCreate {
    fn from(body: CreateTaskBody) -> Self {
        Self {
            title: body.title,
            description: body.description.unwrap_or_default(),
            due_date: body.due_date,
            due_time: body.due_time,
            priority: body.priority.unwrap_or(1),
            id_category: body.id_category,
            estimated_time: body.estimated_time,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTaskQuery {
    pub status: Option<i32>,
    pub priority: Option<i32>,
    pub due_date_from: Option<NaiveDate>,
    pub due_date_to: Option<NaiveDate>,
}

impl From<ListTaskQuery> for TaskFilter {
    fn from(query: ListTaskQuery) -> Self {
        Self {
            status: query.status,
            priority: query.priority,
            due_date_from: query.due_date_from,
            due_date_to: query.due_date_to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskIdParams {
    pub id: i64,
}

/// Omitted optional fields clear the stored value.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskBody {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub priority: i32,
    pub status: i32,
    pub id_category: Option<i64>,
    pub estimated_time: Option<i32>,
}

impl From<UpdateTaskBody> for TaskUpdate {
    fn from(body: UpdateTaskBody) -> Self {
        Self {
            title: body.title,
            description: body.description.unwrap_or_default(),
            due_date: body.due_date,
            due_time: body.due_time,
            priority: body.priority,
            status: body.status,
            id_category: body.id_category,
            estimated_time: body.estimated_time,
        }
    }
}
