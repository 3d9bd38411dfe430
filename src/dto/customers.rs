use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Customer;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
}

/// Phone is the natural (non-unique-enforced) key used at order time: the
/// first match within the establishment wins, otherwise a `New` customer is
/// created.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FindOrCreateCustomerRequest {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerList {
    pub items: Vec<Customer>,
}
