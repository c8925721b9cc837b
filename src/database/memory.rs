use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use super::manager::DatabaseError;
use super::procedure::{ExpectedReturn, ProcedureExecutor, ProcedureOutput, ProcedureParams, Row};

#[derive(Debug, Clone)]
struct TaskRecord {
    id_task: i64,
    id_account: i64,
    id_user: i64,
    title: String,
    description: String,
    due_date: Option<NaiveDate>,
    due_time: Option<NaiveTime>,
    priority: i32,
    status: i32,
    id_category: Option<i64>,
    estimated_time: Option<i32>,
    deleted: bool,
    date_created: DateTime<Utc>,
    date_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct SubtaskRecord {
    id_subtask: i64,
    id_task: i64,
    title: String,
    completed: bool,
    deleted: bool,
    date_created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct AttachmentRecord {
    id_attachment: i64,
    id_task: i64,
    file_name: String,
    file_type: String,
    file_size: i64,
    deleted: bool,
    date_created: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    categories: HashSet<(i64, i64)>,
    tasks: BTreeMap<i64, TaskRecord>,
    subtasks: Vec<SubtaskRecord>,
    tags: HashMap<i64, Vec<String>>,
    attachments: Vec<AttachmentRecord>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn check_category(&self, id_account: i64, id_category: Option<i64>) -> Result<(), DatabaseError> {
        match id_category {
            Some(id) if !self.categories.contains(&(id_account, id)) => {
                Err(DatabaseError::business_rule("Category not found"))
            }
            _ => Ok(()),
        }
    }

    /// Live task visible to the caller
    fn scoped_task(&self, id_account: i64, id_user: i64, id_task: i64) -> Option<&TaskRecord> {
        self.tasks.get(&id_task).filter(|t| {
            !t.deleted && t.id_account == id_account && t.id_user == id_user
        })
    }

    fn scoped_task_mut(
        &mut self,
        id_account: i64,
        id_user: i64,
        id_task: i64,
    ) -> Result<&mut TaskRecord, DatabaseError> {
        self.tasks
            .get_mut(&id_task)
            .filter(|t| !t.deleted && t.id_account == id_account && t.id_user == id_user)
            .ok_or_else(|| DatabaseError::business_rule("Task not found"))
    }
}

/// In-process store implementing the task procedures.
///
/// Mirrors `sql/functional.sql`: every call is scoped by account and user,
/// deleting a task soft-deletes its subtasks and attachments, and a category
/// must exist in the caller's account.
#[derive(Debug, Default)]
pub struct MemoryProcedureExecutor {
    state: RwLock<MemoryState>,
}

impl MemoryProcedureExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a category usable by tasks of `id_account`.
    pub fn with_category(mut self, id_account: i64, id_category: i64) -> Self {
        self.state
            .get_mut()
            .categories
            .insert((id_account, id_category));
        self
    }

    pub async fn add_subtask(
        &self,
        id_task: i64,
        title: &str,
        completed: bool,
    ) -> Result<i64, DatabaseError> {
        let mut state = self.state.write().await;
        Self::require_task(&state, id_task)?;
        let id_subtask = state.next_id();
        state.subtasks.push(SubtaskRecord {
            id_subtask,
            id_task,
            title: title.to_string(),
            completed,
            deleted: false,
            date_created: Utc::now(),
        });
        Ok(id_subtask)
    }

    pub async fn add_tag(&self, id_task: i64, tag: &str) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        Self::require_task(&state, id_task)?;
        state.tags.entry(id_task).or_default().push(tag.to_string());
        Ok(())
    }

    pub async fn add_attachment(
        &self,
        id_task: i64,
        file_name: &str,
        file_type: &str,
        file_size: i64,
    ) -> Result<i64, DatabaseError> {
        let mut state = self.state.write().await;
        Self::require_task(&state, id_task)?;
        let id_attachment = state.next_id();
        state.attachments.push(AttachmentRecord {
            id_attachment,
            id_task,
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
            file_size,
            deleted: false,
            date_created: Utc::now(),
        });
        Ok(id_attachment)
    }

    fn require_task(state: &MemoryState, id_task: i64) -> Result<(), DatabaseError> {
        match state.tasks.get(&id_task) {
            Some(t) if !t.deleted => Ok(()),
            _ => Err(DatabaseError::business_rule("Task not found")),
        }
    }

    async fn task_create(&self, params: &ProcedureParams) -> Result<ProcedureOutput, DatabaseError> {
        let id_account = required(params.get_bigint("p_id_account")?, "p_id_account")?;
        let id_user = required(params.get_bigint("p_id_user")?, "p_id_user")?;
        let title = required(params.get_text("p_title")?, "p_title")?;
        let id_category = params.get_bigint("p_id_category")?;

        let mut state = self.state.write().await;
        state.check_category(id_account, id_category)?;

        let now = Utc::now();
        let id_task = state.next_id();
        state.tasks.insert(
            id_task,
            TaskRecord {
                id_task,
                id_account,
                id_user,
                title,
                description: params.get_text("p_description")?.unwrap_or_default(),
                due_date: params.get_date("p_due_date")?,
                due_time: params.get_time("p_due_time")?,
                priority: params.get_int("p_priority")?.unwrap_or(1),
                status: 0,
                id_category,
                estimated_time: params.get_int("p_estimated_time")?,
                deleted: false,
                date_created: now,
                date_modified: now,
            },
        );

        Ok(ProcedureOutput::Single(object(json!({ "id_task": id_task }))))
    }

    async fn task_list(&self, params: &ProcedureParams) -> Result<ProcedureOutput, DatabaseError> {
        let id_account = required(params.get_bigint("p_id_account")?, "p_id_account")?;
        let id_user = required(params.get_bigint("p_id_user")?, "p_id_user")?;
        let status = params.get_int("p_status")?;
        let priority = params.get_int("p_priority")?;
        let from = params.get_date("p_due_date_from")?;
        let to = params.get_date("p_due_date_to")?;

        let state = self.state.read().await;
        let mut tasks: Vec<&TaskRecord> = state
            .tasks
            .values()
            .filter(|t| !t.deleted && t.id_account == id_account && t.id_user == id_user)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .filter(|t| priority.map_or(true, |p| t.priority == p))
            .filter(|t| {
                if from.is_none() && to.is_none() {
                    return true;
                }
                match t.due_date {
                    Some(due) => from.map_or(true, |f| due >= f) && to.map_or(true, |d| due <= d),
                    None => false,
                }
            })
            .collect();

        // Due date ascending with undated tasks last, then id
        tasks.sort_by_key(|t| (t.due_date.is_none(), t.due_date, t.id_task));

        let rows = tasks
            .into_iter()
            .map(|t| {
                let subtasks = state
                    .subtasks
                    .iter()
                    .filter(|s| s.id_task == t.id_task && !s.deleted);
                let subtask_count = subtasks.clone().count();
                let completed_subtask_count = subtasks.filter(|s| s.completed).count();
                let attachment_count = state
                    .attachments
                    .iter()
                    .filter(|a| a.id_task == t.id_task && !a.deleted)
                    .count();

                let mut row = task_row(t);
                row.insert("subtask_count".into(), json!(subtask_count));
                row.insert("completed_subtask_count".into(), json!(completed_subtask_count));
                row.insert("attachment_count".into(), json!(attachment_count));
                row
            })
            .collect();

        Ok(ProcedureOutput::Multi(rows))
    }

    async fn task_get(&self, params: &ProcedureParams) -> Result<ProcedureOutput, DatabaseError> {
        let id_account = required(params.get_bigint("p_id_account")?, "p_id_account")?;
        let id_user = required(params.get_bigint("p_id_user")?, "p_id_user")?;
        let id_task = required(params.get_bigint("p_id_task")?, "p_id_task")?;

        let state = self.state.read().await;
        let mut sets: HashMap<String, Vec<Row>> = HashMap::new();

        let Some(task) = state.scoped_task(id_account, id_user, id_task) else {
            for name in ["task", "subtasks", "tags", "attachments"] {
                sets.insert(name.to_string(), Vec::new());
            }
            return Ok(ProcedureOutput::Sets(sets));
        };

        sets.insert("task".into(), vec![task_row(task)]);
        sets.insert(
            "subtasks".into(),
            state
                .subtasks
                .iter()
                .filter(|s| s.id_task == id_task && !s.deleted)
                .map(|s| {
                    object(json!({
                        "id_subtask": s.id_subtask,
                        "title": s.title,
                        "completed": s.completed,
                        "date_created": s.date_created,
                    }))
                })
                .collect(),
        );
        sets.insert(
            "tags".into(),
            state
                .tags
                .get(&id_task)
                .map(|tags| tags.iter().map(|tag| object(json!({ "tag": tag }))).collect())
                .unwrap_or_default(),
        );
        sets.insert(
            "attachments".into(),
            state
                .attachments
                .iter()
                .filter(|a| a.id_task == id_task && !a.deleted)
                .map(|a| {
                    object(json!({
                        "id_attachment": a.id_attachment,
                        "file_name": a.file_name,
                        "file_type": a.file_type,
                        "file_size": a.file_size,
                        "date_created": a.date_created,
                    }))
                })
                .collect(),
        );

        Ok(ProcedureOutput::Sets(sets))
    }

    async fn task_update(&self, params: &ProcedureParams) -> Result<ProcedureOutput, DatabaseError> {
        let id_account = required(params.get_bigint("p_id_account")?, "p_id_account")?;
        let id_user = required(params.get_bigint("p_id_user")?, "p_id_user")?;
        let id_task = required(params.get_bigint("p_id_task")?, "p_id_task")?;
        let title = required(params.get_text("p_title")?, "p_title")?;
        let priority = required(params.get_int("p_priority")?, "p_priority")?;
        let status = required(params.get_int("p_status")?, "p_status")?;
        let id_category = params.get_bigint("p_id_category")?;

        let mut state = self.state.write().await;
        state.scoped_task_mut(id_account, id_user, id_task)?;
        state.check_category(id_account, id_category)?;

        let task = state.scoped_task_mut(id_account, id_user, id_task)?;
        task.title = title;
        task.description = params.get_text("p_description")?.unwrap_or_default();
        task.due_date = params.get_date("p_due_date")?;
        task.due_time = params.get_time("p_due_time")?;
        task.priority = priority;
        task.status = status;
        task.id_category = id_category;
        task.estimated_time = params.get_int("p_estimated_time")?;
        task.date_modified = Utc::now();

        Ok(ProcedureOutput::Single(object(json!({ "success": 1 }))))
    }

    async fn task_delete(&self, params: &ProcedureParams) -> Result<ProcedureOutput, DatabaseError> {
        let id_account = required(params.get_bigint("p_id_account")?, "p_id_account")?;
        let id_user = required(params.get_bigint("p_id_user")?, "p_id_user")?;
        let id_task = required(params.get_bigint("p_id_task")?, "p_id_task")?;

        let mut state = self.state.write().await;
        let task = state.scoped_task_mut(id_account, id_user, id_task)?;
        task.deleted = true;
        task.date_modified = Utc::now();

        for subtask in state.subtasks.iter_mut().filter(|s| s.id_task == id_task) {
            subtask.deleted = true;
        }
        for attachment in state.attachments.iter_mut().filter(|a| a.id_task == id_task) {
            attachment.deleted = true;
        }

        Ok(ProcedureOutput::Single(object(json!({ "success": 1 }))))
    }
}

#[async_trait]
impl ProcedureExecutor for MemoryProcedureExecutor {
    async fn execute(
        &self,
        procedure: &str,
        params: ProcedureParams,
        expected: ExpectedReturn,
    ) -> Result<ProcedureOutput, DatabaseError> {
        debug!("Executing in-memory procedure {} ({:?})", procedure, expected);

        let shape_ok = match procedure {
            "sp_task_create" | "sp_task_update" | "sp_task_delete" => {
                expected == ExpectedReturn::Single
            }
            "sp_task_list" => expected == ExpectedReturn::Multi,
            "sp_task_get" => matches!(expected, ExpectedReturn::Sets(_)),
            other => return Err(DatabaseError::UnknownProcedure(other.to_string())),
        };
        if !shape_ok {
            return Err(DatabaseError::UnexpectedShape {
                procedure: procedure.to_string(),
                detail: format!("called with {:?}", expected),
            });
        }

        match procedure {
            "sp_task_create" => self.task_create(&params).await,
            "sp_task_list" => self.task_list(&params).await,
            "sp_task_get" => self.task_get(&params).await,
            "sp_task_update" => self.task_update(&params).await,
            _ => self.task_delete(&params).await,
        }
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, DatabaseError> {
    value.ok_or_else(|| DatabaseError::MissingParameter(name.to_string()))
}

fn object(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn task_row(t: &TaskRecord) -> Row {
    object(json!({
        "id_task": t.id_task,
        "title": t.title,
        "description": t.description,
        "due_date": t.due_date,
        "due_time": t.due_time,
        "priority": t.priority,
        "status": t.status,
        "id_category": t.id_category,
        "estimated_time": t.estimated_time,
        "date_created": t.date_created,
        "date_modified": t.date_modified,
    }))
}
