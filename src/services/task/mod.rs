pub mod types;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::crud::Credential;
use crate::database::{DatabaseError, ExpectedReturn, ProcedureExecutor, ProcedureParams, Row};

pub use types::{
    Attachment, OperationResult, Subtask, Tag, TaskCreate, TaskCreated, TaskDetail, TaskDetails,
    TaskFilter, TaskSummary, TaskUpdate,
};

const SP_TASK_CREATE: &str = "sp_task_create";
const SP_TASK_LIST: &str = "sp_task_list";
const SP_TASK_GET: &str = "sp_task_get";
const SP_TASK_UPDATE: &str = "sp_task_update";
const SP_TASK_DELETE: &str = "sp_task_delete";

const TASK_GET_SETS: &[&str] = &["task", "subtasks", "tags", "attachments"];

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Rule violation reported by the data layer; the message is caller-facing.
    #[error("{0}")]
    BusinessRule(String),
    #[error(transparent)]
    Infrastructure(DatabaseError),
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::BusinessRule { message } => ServiceError::BusinessRule(message),
            other => ServiceError::Infrastructure(other),
        }
    }
}

/// Task operations over the `sp_task_*` procedures, scoped by credential.
#[derive(Clone)]
pub struct TaskService {
    executor: Arc<dyn ProcedureExecutor>,
}

impl TaskService {
    pub fn new(executor: Arc<dyn ProcedureExecutor>) -> Self {
        Self { executor }
    }

    pub async fn create(
        &self,
        credential: &Credential,
        input: TaskCreate,
    ) -> Result<TaskCreated, ServiceError> {
        let params = scoped(credential)
            .text("p_title", input.title)
            .text("p_description", input.description)
            .date("p_due_date", input.due_date)
            .time("p_due_time", input.due_time)
            .int("p_priority", input.priority)
            .bigint("p_id_category", input.id_category)
            .int("p_estimated_time", input.estimated_time);

        let row = self
            .executor
            .execute(SP_TASK_CREATE, params, ExpectedReturn::Single)
            .await?
            .into_single(SP_TASK_CREATE)?;
        let created: TaskCreated = decode(SP_TASK_CREATE, row)?;
        debug!("Created task {} for user {}", created.id_task, credential.id_user);
        Ok(created)
    }

    pub async fn list(
        &self,
        credential: &Credential,
        filter: TaskFilter,
    ) -> Result<Vec<TaskSummary>, ServiceError> {
        let params = scoped(credential)
            .int("p_status", filter.status)
            .int("p_priority", filter.priority)
            .date("p_due_date_from", filter.due_date_from)
            .date("p_due_date_to", filter.due_date_to);

        self.executor
            .execute(SP_TASK_LIST, params, ExpectedReturn::Multi)
            .await?
            .into_multi(SP_TASK_LIST)?
            .into_iter()
            .map(|row| decode(SP_TASK_LIST, row))
            .collect()
    }

    /// Missing, deleted and out-of-scope tasks all read as "Task not found".
    pub async fn get(&self, credential: &Credential, id_task: i64) -> Result<TaskDetail, ServiceError> {
        let params = scoped(credential).bigint("p_id_task", id_task);

        let mut sets = self
            .executor
            .execute(SP_TASK_GET, params, ExpectedReturn::Sets(TASK_GET_SETS))
            .await?
            .into_sets(SP_TASK_GET)?;

        let mut take = |name: &str| sets.remove(name).unwrap_or_default();
        let task = take("task")
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::BusinessRule("Task not found".to_string()))?;

        Ok(TaskDetail {
            task: decode(SP_TASK_GET, task)?,
            subtasks: decode_all(SP_TASK_GET, take("subtasks"))?,
            tags: decode_all(SP_TASK_GET, take("tags"))?,
            attachments: decode_all(SP_TASK_GET, take("attachments"))?,
        })
    }

    pub async fn update(
        &self,
        credential: &Credential,
        id_task: i64,
        input: TaskUpdate,
    ) -> Result<OperationResult, ServiceError> {
        let params = scoped(credential)
            .bigint("p_id_task", id_task)
            .text("p_title", input.title)
            .text("p_description", input.description)
            .date("p_due_date", input.due_date)
            .time("p_due_time", input.due_time)
            .int("p_priority", input.priority)
            .int("p_status", input.status)
            .bigint("p_id_category", input.id_category)
            .int("p_estimated_time", input.estimated_time);

        let row = self
            .executor
            .execute(SP_TASK_UPDATE, params, ExpectedReturn::Single)
            .await?
            .into_single(SP_TASK_UPDATE)?;
        decode(SP_TASK_UPDATE, row)
    }

    /// Soft delete
    pub async fn delete(&self, credential: &Credential, id_task: i64) -> Result<OperationResult, ServiceError> {
        let params = scoped(credential).bigint("p_id_task", id_task);

        let row = self
            .executor
            .execute(SP_TASK_DELETE, params, ExpectedReturn::Single)
            .await?
            .into_single(SP_TASK_DELETE)?;
        decode(SP_TASK_DELETE, row)
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(self.executor.health_check().await?)
    }
}

fn scoped(credential: &Credential) -> ProcedureParams {
    ProcedureParams::new()
        .bigint("p_id_account", credential.id_account)
        .bigint("p_id_user", credential.id_user)
}

fn decode<T: DeserializeOwned>(procedure: &str, row: Row) -> Result<T, ServiceError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| {
        ServiceError::Infrastructure(DatabaseError::UnexpectedShape {
            procedure: procedure.to_string(),
            detail: e.to_string(),
        })
    })
}

fn decode_all<T: DeserializeOwned>(procedure: &str, rows: Vec<Row>) -> Result<Vec<T>, ServiceError> {
    rows.into_iter().map(|row| decode(procedure, row)).collect()
}
