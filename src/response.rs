use serde::Serialize;
use utoipa::ToSchema;

/// Pagination block attached to list responses. `total_pages` is derived
/// here so clients never recompute it from `total_items`.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl PageMeta {
    /// `per_page` must already be normalized to >= 1.
    pub fn paged(page: i64, per_page: i64, total_items: i64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + per_page - 1) / per_page
        };
        Self {
            page,
            per_page,
            total_items,
            total_pages,
        }
    }
}

/// Uniform body for every endpoint: a short human-readable message, the
/// payload, and pagination only where it applies.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta: None,
        }
    }

    pub fn paged(message: impl Into<String>, data: T, meta: PageMeta) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta: Some(meta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_meta_derives_total_pages() {
        assert_eq!(PageMeta::paged(1, 20, 0).total_pages, 0);
        assert_eq!(PageMeta::paged(1, 20, 20).total_pages, 1);
        assert_eq!(PageMeta::paged(1, 20, 21).total_pages, 2);
        assert_eq!(PageMeta::paged(2, 10, 95).total_pages, 10);
    }

    #[test]
    fn meta_is_omitted_from_json_when_absent() {
        let json = serde_json::to_value(ApiResponse::new("ok", 1)).unwrap();
        assert!(json.get("meta").is_none());
        assert_eq!(json["data"], 1);
    }
}
