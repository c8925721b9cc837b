pub mod schema;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};

use crate::api::{ApiResponse, ApiResult};
use crate::app::AppState;
use crate::crud::{Action, CrudController, CrudRequest, PermissionRequirement};
use crate::services::task::{OperationResult, TaskCreated, TaskDetail, TaskSummary};

use self::schema::{
    CreateTaskBody, ListTaskQuery, TaskIdParams, UpdateTaskBody, CREATE_BODY, ID_PARAMS,
    LIST_QUERY, UPDATE_BODY,
};

const SECURABLE: &str = "TASK";

/// Task routes, nested by the caller under the API prefix
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/task", post(create).get(list))
        .route("/task/:id", get(get_by_id).put(update).delete(remove))
}

fn controller(state: &AppState, action: Action) -> CrudController {
    CrudController::new(
        state.crud.clone(),
        vec![PermissionRequirement::new(SECURABLE, action)],
    )
}

/// POST /task
pub async fn create(State(state): State<AppState>, request: CrudRequest) -> ApiResult<TaskCreated> {
    let validated = controller(&state, Action::Create)
        .create::<CreateTaskBody>(&request, &CREATE_BODY)
        .await?
        .into_result()?;

    let created = state
        .tasks
        .create(&validated.credential, validated.body.into())
        .await?;
    Ok(ApiResponse::created(created))
}

/// GET /task
pub async fn list(State(state): State<AppState>, request: CrudRequest) -> ApiResult<Vec<TaskSummary>> {
    let validated = controller(&state, Action::Read)
        .read::<ListTaskQuery>(&request, Some(&*LIST_QUERY))
        .await?
        .into_result()?;

    let tasks = state
        .tasks
        .list(&validated.credential, validated.params.into())
        .await?;
    Ok(ApiResponse::success(tasks))
}

/// GET /task/:id
pub async fn get_by_id(State(state): State<AppState>, request: CrudRequest) -> ApiResult<TaskDetail> {
    let validated = controller(&state, Action::Read)
        .read::<TaskIdParams>(&request, Some(&*ID_PARAMS))
        .await?
        .into_result()?;

    let task = state
        .tasks
        .get(&validated.credential, validated.params.id)
        .await?;
    Ok(ApiResponse::success(task))
}

/// PUT /task/:id
pub async fn update(State(state): State<AppState>, request: CrudRequest) -> ApiResult<OperationResult> {
    let validated = controller(&state, Action::Update)
        .update::<TaskIdParams, UpdateTaskBody>(&request, &ID_PARAMS, &UPDATE_BODY)
        .await?
        .into_result()?;

    let result = state
        .tasks
        .update(&validated.credential, validated.params.id, validated.body.into())
        .await?;
    Ok(ApiResponse::success(result))
}

/// DELETE /task/:id
pub async fn remove(State(state): State<AppState>, request: CrudRequest) -> ApiResult<OperationResult> {
    let validated = controller(&state, Action::Delete)
        .delete::<TaskIdParams>(&request, &ID_PARAMS)
        .await?
        .into_result()?;

    let result = state
        .tasks
        .delete(&validated.credential, validated.params.id)
        .await?;
    Ok(ApiResponse::success(result))
}
