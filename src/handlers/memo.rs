use actix_web::{web, HttpResponse};
use diesel::prelude::*;
use serde_derive::Deserialize;
use serde_json::json;
use std::time::SystemTime;

use super::Pool;
use crate::{
    errors::ServerError,
    models::memo::{expired, expiry_after, QueryMemo, ReqMemo},
    schema::memos::dsl::*,
    utils::is_valid_password,
};

const PASSWORD_TOO_SHORT: &str = "password must be at least 4 characters long";

#[derive(Deserialize)]
pub struct PasswordField {
    pub password: String,
}

#[derive(Deserialize)]
pub struct ReqMemoUpdate {
    pub content: String,
    pub duration: Option<i32>,
}

/// Key availability probe. An expired row no longer holds its key, so it is
/// swept here and the key reported free.
pub async fn check_password(
    input: web::Json<PasswordField>,
    pool: web::Data<Pool>,
) -> Result<HttpResponse, ServerError> {
    if !is_valid_password(&input.password) {
        return Ok(HttpResponse::Ok().json(json!({
            "valid": false,
            "message": PASSWORD_TOO_SHORT,
        })));
    }

    let mut connection = pool.get()?;

    match memos
        .select(expires_at)
        .find(input.password.as_str())
        .first::<SystemTime>(&mut connection)
    {
        Ok(expiry) => {
            if expired(expiry, SystemTime::now()) {
                diesel::delete(memos.filter(password.eq(input.password.as_str())))
                    .execute(&mut connection)?;
                Ok(HttpResponse::Ok().json(json!({ "valid": true })))
            } else {
                Ok(HttpResponse::Ok().json(json!({
                    "valid": false,
                    "message": "password is already in use",
                })))
            }
        }
        Err(diesel::result::Error::NotFound) => {
            Ok(HttpResponse::Ok().json(json!({ "valid": true })))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn new(
    input: web::Json<ReqMemo>,
    pool: web::Data<Pool>,
) -> Result<HttpResponse, ServerError> {
    if !is_valid_password(&input.password) {
        return Err(ServerError::UserError(PASSWORD_TOO_SHORT));
    }

    let memo = input.into_inner().into_insertable(SystemTime::now())?;
    let mut connection = pool.get()?;

    let expiry = diesel::insert_into(memos)
        .values(&memo)
        .returning(expires_at)
        .get_result::<SystemTime>(&mut connection)?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "expiresAt": expiry,
    })))
}

pub async fn get(
    memo_key: web::Path<String>,
    pool: web::Data<Pool>,
) -> Result<HttpResponse, ServerError> {
    let key = memo_key.into_inner();
    if !is_valid_password(&key) {
        return Err(ServerError::UserError(PASSWORD_TOO_SHORT));
    }

    let mut connection = pool.get()?;

    match memos.find(key.as_str()).first::<QueryMemo>(&mut connection) {
        Ok(memo) => {
            if memo.has_expired(SystemTime::now()) {
                diesel::delete(memos.filter(password.eq(key.as_str()))).execute(&mut connection)?;
                return Err(ServerError::NotFound);
            }

            Ok(HttpResponse::Ok().json(json!({
                "content": memo.content,
                "expiresAt": memo.expires_at,
                "durationMinutes": memo.duration_minutes,
            })))
        }
        Err(diesel::result::Error::NotFound) => Err(ServerError::NotFound),
        Err(err) => Err(err.into()),
    }
}

/// Content and `last_updated` always change; the expiry only moves when a
/// duration comes with the request.
pub async fn update(
    memo_key: web::Path<String>,
    input: web::Json<ReqMemoUpdate>,
    pool: web::Data<Pool>,
) -> Result<HttpResponse, ServerError> {
    let key = memo_key.into_inner();
    if !is_valid_password(&key) {
        return Err(ServerError::UserError(PASSWORD_TOO_SHORT));
    }

    let now = SystemTime::now();
    let mut connection = pool.get()?;

    let memo = match memos.find(key.as_str()).first::<QueryMemo>(&mut connection) {
        Ok(memo) => memo,
        Err(diesel::result::Error::NotFound) => return Err(ServerError::NotFound),
        Err(err) => return Err(err.into()),
    };

    if memo.has_expired(now) {
        diesel::delete(memos.filter(password.eq(key.as_str()))).execute(&mut connection)?;
        return Err(ServerError::NotFound);
    }

    let expiry = match input.duration {
        Some(minutes) => {
            let new_expiry = expiry_after(now, minutes)?;
            diesel::update(memos.filter(password.eq(key.as_str())))
                .set((
                    content.eq(&input.content),
                    last_updated.eq(now),
                    duration_minutes.eq(minutes),
                    expires_at.eq(new_expiry),
                ))
                .returning(expires_at)
                .get_result::<SystemTime>(&mut connection)?
        }
        None => diesel::update(memos.filter(password.eq(key.as_str())))
            .set((content.eq(&input.content), last_updated.eq(now)))
            .returning(expires_at)
            .get_result::<SystemTime>(&mut connection)?,
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "expiresAt": expiry,
    })))
}

/// Idempotent: deleting an absent key still reports success, and the key is
/// immediately reusable.
pub async fn del(
    memo_key: web::Path<String>,
    pool: web::Data<Pool>,
) -> Result<HttpResponse, ServerError> {
    let key = memo_key.into_inner();
    if !is_valid_password(&key) {
        return Err(ServerError::UserError(PASSWORD_TOO_SHORT));
    }

    let mut connection = pool.get()?;
    diesel::delete(memos.filter(password.eq(key.as_str()))).execute(&mut connection)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "memo deleted",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use diesel::{pg::PgConnection, r2d2::ConnectionManager};

    // Validation has to reject before the pool is ever used, so a pool with
    // no live connections behind it is enough for these.
    fn empty_pool() -> Pool {
        let manager = ConnectionManager::<PgConnection>::new("postgres://localhost/unused");
        r2d2::Pool::builder().build_unchecked(manager)
    }

    #[actix_web::test]
    async fn check_password_reports_short_passwords_invalid() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(empty_pool()))
                .route("/api/check-password", web::post().to(check_password)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/check-password")
            .set_json(json!({ "password": "abc" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["valid"], json!(false));
        assert!(body["message"].is_string());
    }

    #[actix_web::test]
    async fn new_rejects_short_passwords() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(empty_pool()))
                .route("/api/memo", web::post().to(new)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/memo")
            .set_json(json!({ "password": "abc", "content": "hello" }))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn new_rejects_non_positive_durations() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(empty_pool()))
                .route("/api/memo", web::post().to(new)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/memo")
            .set_json(json!({ "password": "abcd", "duration": 0 }))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn keyed_routes_reject_short_keys() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(empty_pool()))
                .route("/api/memo/{password}", web::get().to(get))
                .route("/api/memo/{password}", web::put().to(update))
                .route("/api/memo/{password}", web::delete().to(del)),
        )
        .await;

        let requests = vec![
            test::TestRequest::get().uri("/api/memo/abc").to_request(),
            test::TestRequest::put()
                .uri("/api/memo/abc")
                .set_json(json!({ "content": "hello" }))
                .to_request(),
            test::TestRequest::delete().uri("/api/memo/abc").to_request(),
        ];

        for req in requests {
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[actix_web::test]
    async fn validation_errors_carry_a_json_body() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(empty_pool()))
                .route("/api/memo/{password}", web::get().to(get)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/memo/abc").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert!(body["error"].is_string());
    }
}
