//! Response mapping: query results and errors to [`HttpResponse`]s.

use serde_json::Value;

use crate::client::QuerySuccess;
use crate::error::{Error, Result};
use crate::problem::from_lib_error;
use crate::query::Operation;
use crate::response::HttpResponse;

pub const ID_NOT_FOUND: &str = "id not found";
pub const PAGE_NOT_FOUND: &str = "The page you requested could not be found";

/// 404 for an id-scoped operation whose document does not exist.
pub fn id_not_found() -> HttpResponse {
    HttpResponse::text(404, ID_NOT_FOUND)
}

/// 404 for requests no route matches.
pub fn page_not_found() -> HttpResponse {
    HttpResponse::text(404, PAGE_NOT_FOUND)
}

/// Map a successful query to the response for `operation`.
///
/// `id` is the decoded path parameter of id-scoped operations.
pub fn map_success(operation: Operation, id: Option<&str>, success: QuerySuccess) -> Result<HttpResponse> {
    let QuerySuccess {
        data, http_status, ..
    } = success;

    if operation.is_id_scoped() && data.is_null() {
        return Ok(id_not_found());
    }

    let id = id.unwrap_or_default();
    let response = match operation {
        Operation::Health => HttpResponse::json(200, &data)?,
        Operation::List => HttpResponse::json(http_status, page_items(&data))?,
        Operation::GetById => HttpResponse::json(http_status, &data)?,
        Operation::Create => HttpResponse::text(
            http_status,
            format!(
                "A new item has been added to the inventory: {}",
                serde_json::to_string(&data)?
            ),
        ),
        Operation::Update => HttpResponse::text(
            http_status,
            format!(
                "Updated item with ID {id} in the inventory: {}",
                serde_json::to_string(&data)?
            ),
        ),
        Operation::Delete => HttpResponse::text(
            http_status,
            format!("You have deleted the item with ID: {id} from the inventory"),
        ),
    };
    Ok(response)
}

/// The items of a result page; a bare array is already the item list.
fn page_items(data: &Value) -> &Value {
    match data {
        Value::Object(page) => page.get("data").unwrap_or(data),
        _ => data,
    }
}

/// Map an error to a response.
///
/// Database query errors keep their status and summary text verbatim; every
/// other error becomes a problem details response.
pub fn map_error(error: &Error, request_id: &str) -> HttpResponse {
    match error {
        Error::Query {
            status, summary, ..
        } => HttpResponse::text(*status, summary.clone()),
        other => from_lib_error(other, request_id).into_response(),
    }
}
