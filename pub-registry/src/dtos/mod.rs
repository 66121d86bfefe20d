pub mod pub_package;
pub mod pub_token;
pub mod user;

use serde::Deserialize;
use validator::Validate;

pub const DEFAULT_PAGE: i64 = 1;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE: i64 = 1_000_000;

/// `?page=&limit=&search=` for paginated listings.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(range(min = 1, max = 1_000_000, message = "Page must be between 1 and 1000000"))]
    pub page: Option<i64>,

    #[validate(
        required(message = "Limit is required"),
        range(min = 1, max = 100, message = "Limit must be between 1 and 100")
    )]
    pub limit: Option<i64>,

    pub search: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<i64>, limit: Option<i64>) -> ListQuery {
        ListQuery {
            page,
            limit,
            search: None,
        }
    }

    #[test]
    fn test_limit_is_required_and_bounded() {
        assert!(query(None, None).validate().is_err());
        assert!(query(None, Some(0)).validate().is_err());
        assert!(query(None, Some(101)).validate().is_err());
        assert!(query(None, Some(100)).validate().is_ok());
    }

    #[test]
    fn test_page_defaults_to_first() {
        let q = query(None, Some(10));
        assert!(q.validate().is_ok());
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), 10);

        assert!(query(Some(0), Some(10)).validate().is_err());
    }

    #[test]
    fn test_page_is_bounded() {
        assert!(query(Some(MAX_PAGE), Some(100)).validate().is_ok());
        assert!(query(Some(MAX_PAGE + 1), Some(100)).validate().is_err());
        assert!(query(Some(i64::MAX), Some(100)).validate().is_err());
        assert_eq!(query(Some(i64::MAX), Some(100)).page(), MAX_PAGE);
    }
}
