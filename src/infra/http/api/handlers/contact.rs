use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use finwage_api_types::{ContactCreated, ContactRequest, ContactResponse};

use crate::application::enquiries::EnquiryError;
use crate::application::error::ErrorReport;
use crate::domain::enquiry::EnquiryForm;

use super::super::error::{ApiError, codes};
use super::super::state::ApiState;
use super::revalidate::parse_body;

pub async fn submit_contact(State(state): State<ApiState>, body: Bytes) -> Response {
    let request: ContactRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    let form = EnquiryForm {
        name: request.name,
        email: request.email,
        message: request.message,
        interest: request.interest,
        company: request.company,
        phone: request.phone,
    };

    match state.enquiries.submit(&form).await {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(ContactResponse {
                success: true,
                message: "Thank you for your enquiry. We'll be in touch soon.".to_string(),
                data: Some(ContactCreated { id: receipt.id }),
                errors: Default::default(),
            }),
        )
            .into_response(),
        Err(EnquiryError::Invalid(fields)) => {
            let mut response = (
                StatusCode::BAD_REQUEST,
                Json(ContactResponse {
                    success: false,
                    message: "Please correct the highlighted fields.".to_string(),
                    data: None,
                    errors: fields
                        .into_iter()
                        .map(|(field, messages)| (field.to_string(), messages))
                        .collect(),
                }),
            )
                .into_response();
            ErrorReport::from_message(
                "infra::http::api::contact",
                StatusCode::BAD_REQUEST,
                "enquiry failed validation",
            )
            .attach(&mut response);
            response
        }
        Err(EnquiryError::Backend(source)) if source.is_unavailable() => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::SOURCE_UNAVAILABLE,
            "Enquiries are temporarily unavailable",
            Some(source.to_string()),
        )
        .into_response(),
        Err(EnquiryError::Backend(source)) => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::UPSTREAM,
            "Enquiry could not be stored",
            Some(source.to_string()),
        )
        .into_response(),
    }
}
