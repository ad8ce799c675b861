use axum::{
    Json,
    extract::{Path, Query, State},
};
use mapperlab_api_types::{MessageResponse, RowsAffectedResponse, UserResponse};
use serde::Deserialize;

use crate::{
    application::{
        error::AppError,
        users::{UserMapper, statements},
    },
    mapping::RowBounds,
};

use super::state::HttpState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl PageQuery {
    fn bounds(&self) -> RowBounds {
        RowBounds {
            offset: self.offset.unwrap_or(0),
            limit: self.limit,
        }
    }
}

pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "ok".to_string(),
    })
}

pub async fn get_user(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .run(move |session| UserMapper::new(session).get(id))
        .await?;
    Ok(Json(user.into()))
}

pub async fn list_users(
    State(state): State<HttpState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let bounds = query.bounds();
    let users = state
        .run(move |session| UserMapper::new(session).find_page(bounds))
        .await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn update_all(
    State(state): State<HttpState>,
) -> Result<Json<RowsAffectedResponse>, AppError> {
    let rows_affected = state
        .run(|session| UserMapper::new(session).update_all())
        .await?;
    Ok(Json(rows_affected_response(statements::UPDATE_ALL, rows_affected)))
}

pub async fn update_one(
    State(state): State<HttpState>,
) -> Result<Json<RowsAffectedResponse>, AppError> {
    let rows_affected = state
        .run(|session| UserMapper::new(session).update_one())
        .await?;
    Ok(Json(rows_affected_response(statements::UPDATE_ONE, rows_affected)))
}

pub async fn delete_all(
    State(state): State<HttpState>,
) -> Result<Json<RowsAffectedResponse>, AppError> {
    let rows_affected = state
        .run(|session| UserMapper::new(session).delete_all())
        .await?;
    Ok(Json(rows_affected_response(statements::DELETE_ALL, rows_affected)))
}

/// Two lookups in one session; the second is answered by the session cache.
pub async fn session_cache_user(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .run(move |session| {
            let mut mapper = UserMapper::new(session);
            mapper.get(id)?;
            mapper.get(id)
        })
        .await?;
    Ok(Json(user.into()))
}

/// `findAll` twice in one session; the second read never reaches the backend.
pub async fn session_cache_users(
    State(state): State<HttpState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state
        .run(|session| {
            let mut mapper = UserMapper::new(session);
            mapper.find_all()?;
            mapper.find_all()
        })
        .await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// One lookup per request; repeats are answered by the namespace cache.
pub async fn namespace_cache_user(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .run(move |session| UserMapper::new(session).get(id))
        .await?;
    Ok(Json(user.into()))
}

/// A guarded write that also flushes the `UserMapper` namespace cache.
pub async fn evict(State(state): State<HttpState>) -> Result<Json<MessageResponse>, AppError> {
    let rows_affected = state
        .run(|session| UserMapper::new(session).update_one())
        .await?;
    Ok(Json(MessageResponse {
        message: format!(
            "Updated {rows_affected} row(s) and flushed the UserMapper namespace cache"
        ),
    }))
}

fn rows_affected_response(statement: &str, rows_affected: u64) -> RowsAffectedResponse {
    RowsAffectedResponse {
        statement: statement.to_string(),
        rows_affected,
    }
}
