use serde::{Deserialize, Serialize};

/// Backend pagination envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    /// Zero-based page index.
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default = "default_last")]
    pub last: bool,
}

fn default_last() -> bool {
    true
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.last || self.number.saturating_add(1) >= self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_last_flag_assumes_single_page() {
        let page: Page<u32> = serde_json::from_str(r#"{"content":[1,2]}"#).unwrap();
        assert!(page.is_last());
        assert_eq!(page.content, vec![1, 2]);
    }

    #[test]
    fn test_last_derived_from_total_pages() {
        let page: Page<u32> =
            serde_json::from_str(r#"{"content":[],"number":1,"totalPages":2,"last":false}"#).unwrap();
        assert!(page.is_last());
    }

    #[test]
    fn test_max_page_number_does_not_overflow() {
        let page: Page<u32> = serde_json::from_value(serde_json::json!({
            "content": [],
            "number": u32::MAX,
            "totalPages": u32::MAX,
            "last": false
        }))
        .unwrap();
        assert!(page.is_last());
    }
}
