use crate::error::DataError;
use serde::Serialize;

/// An offset/limit slice of results; `count` is the number of records in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Split<T> {
    pub offset: u64,
    pub count: u64,
    pub result: Vec<T>,
}

/// A numbered page of results; `count` is the number of records on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paged<T> {
    /// 1-based page number actually served.
    pub page: u64,
    pub count: u64,
    pub result: Vec<T>,
}

/// Number of pages needed for `total` rows at `per_page` rows per page.
pub fn total_pages(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        0
    } else {
        total.div_ceil(per_page)
    }
}

/// Clamp a requested page to the first page and compute its row offset.
pub fn page_offset(page: u64, per_page: u64) -> Result<(u64, u64), DataError> {
    let page = page.max(1);
    let offset = (page - 1).checked_mul(per_page).ok_or_else(|| {
        DataError::Argument(format!("page {page} of {per_page} rows is out of range"))
    })?;
    Ok((page, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(0, 10).unwrap(), (1, 0));
        assert_eq!(page_offset(1, 10).unwrap(), (1, 0));
        assert_eq!(page_offset(3, 10).unwrap(), (3, 20));
    }

    #[test]
    fn test_page_offset_overflow() {
        assert!(matches!(
            page_offset(u64::MAX, 50),
            Err(DataError::Argument(_))
        ));
        assert_eq!(page_offset(u64::MAX, 1).unwrap(), (u64::MAX, u64::MAX - 1));
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(21, 10), 3);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(21, 0), 0);
    }
}
