use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer/project record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    /// Unique.
    pub customer_id: String,
    /// Unique.
    pub customer_number: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub project_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /clients`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateClientRequest {
    pub customer_id: String,
    pub customer_number: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub project_name: Option<String>,
}

/// Body of `PUT /clients/{id}`. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateClientRequest {
    pub customer_id: Option<String>,
    pub customer_number: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Present but blank clears the field.
    pub phone: Option<String>,
    pub address: Option<String>,
    pub project_name: Option<String>,
}

/// `?search=` filter of `GET /clients`. Paging comes from [`geobuild_core::PageParams`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientFilter {
    #[serde(default)]
    pub search: Option<String>,
}

/// `GET /clients/search?q=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientSearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Trim; blank becomes `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
