use actix_web::HttpResponse;
use derive_more::Display;
use serde_json::json;

#[derive(Debug, Display)]
pub enum ServerError {
    UserError(&'static str),
    NotFound,
    DieselError,
    R2D2Error,
}

impl From<r2d2::Error> for ServerError {
    fn from(err: r2d2::Error) -> ServerError {
        log::error!("connection pool error: {}", err);
        ServerError::R2D2Error
    }
}

impl From<diesel::result::Error> for ServerError {
    fn from(err: diesel::result::Error) -> ServerError {
        log::error!("database error: {}", err);
        ServerError::DieselError
    }
}

impl actix_web::error::ResponseError for ServerError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServerError::UserError(message) => {
                HttpResponse::BadRequest().json(json!({ "error": message }))
            }
            // never echo the key back, it doubles as the credential
            ServerError::NotFound => {
                HttpResponse::NotFound().json(json!({ "error": "memo was not found" }))
            }
            ServerError::DieselError | ServerError::R2D2Error => {
                HttpResponse::InternalServerError().json(json!({ "error": "internal server error" }))
            }
        }
    }
}
