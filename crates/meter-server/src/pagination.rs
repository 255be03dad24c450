//! Page-window slicing
//!
//! Pure functions over an ordered slice. Page numbers are 1-indexed and a
//! window past the end of the data is an empty page, never an error.
//!
//! # Examples
//!
//! ```rust
//! use meter_server::pagination::{paginate, PageParams};
//!
//! let data: Vec<u32> = (1..=25).collect();
//! let params = PageParams::new(3, 10).unwrap();
//! let page = paginate(&data, params);
//! assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
//! assert_eq!(page.pages, 3);
//! assert_eq!(page.has_more, Some(false));
//! ```

use meter_common::{types::PageEnvelope, MeterError, Result};

/// Validated page number and page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    page: u32,
    size: u32,
}

impl PageParams {
    /// Rejects `page == 0` and `size == 0` with `MeterError::InvalidRequest`
    pub fn new(page: u32, size: u32) -> Result<Self> {
        if page < 1 {
            return Err(MeterError::invalid_request("Page must be greater than 0"));
        }
        if size < 1 {
            return Err(MeterError::invalid_request("Size must be greater than 0"));
        }
        Ok(Self { page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Index of the first item of this page
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.size as usize
    }
}

/// Number of pages `len` items span at `size` items per page
pub fn page_count(len: usize, size: u32) -> u32 {
    if size == 0 {
        return 0;
    }
    len.div_ceil(size as usize) as u32
}

/// Return `dataset[(page-1)*size .. page*size]`, clamped to the data
pub fn slice<T>(dataset: &[T], page: u32, size: u32) -> Result<&[T]> {
    let params = PageParams::new(page, size)?;
    Ok(window(dataset, params))
}

fn window<T>(dataset: &[T], params: PageParams) -> &[T] {
    let start = params.offset().min(dataset.len());
    let end = start.saturating_add(params.size as usize).min(dataset.len());
    &dataset[start..end]
}

/// Slice one page and wrap it in the wire envelope
pub fn paginate<T: Clone>(dataset: &[T], params: PageParams) -> PageEnvelope<T> {
    let pages = page_count(dataset.len(), params.size);

    PageEnvelope {
        items: window(dataset, params).to_vec(),
        total: dataset.len() as u32,
        page: params.page,
        size: params.size,
        pages,
        has_more: Some(params.page < pages),
        backoff: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_slice_windows() {
        let data: Vec<u32> = (0..25).collect();
        assert_eq!(slice(&data, 1, 10).unwrap(), &data[0..10]);
        assert_eq!(slice(&data, 3, 10).unwrap(), &data[20..25]);
        assert!(slice(&data, 4, 10).unwrap().is_empty());
        assert!(slice(&data, 1000, 100).unwrap().is_empty());
    }

    #[test]
    fn test_slice_rejects_zero() {
        let data = [1, 2, 3];
        assert!(matches!(slice(&data, 0, 10), Err(MeterError::InvalidRequest(_))));
        assert!(matches!(slice(&data, 1, 0), Err(MeterError::InvalidRequest(_))));
    }

    #[test]
    fn test_slice_empty_dataset() {
        let data: [u8; 0] = [];
        assert!(slice(&data, 1, 10).unwrap().is_empty());
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(30, 10), 3);
        assert_eq!(page_count(137, 10), 14);
    }

    #[test]
    fn test_paginate_metadata() {
        let data: Vec<u32> = (0..137).collect();
        let params = PageParams::new(14, 10).unwrap();
        let page = paginate(&data, params);
        assert_eq!(page.items.len(), 7);
        assert_eq!(page.total, 137);
        assert_eq!(page.pages, 14);
        assert_eq!(page.has_more, Some(false));

        let first = paginate(&data, PageParams::new(1, 10).unwrap());
        assert_eq!(first.has_more, Some(true));
    }

    #[test]
    fn test_paginate_empty_dataset_is_last_page() {
        let data: Vec<u32> = Vec::new();
        let page = paginate(&data, PageParams::new(1, 10).unwrap());
        assert!(page.items.is_empty());
        assert_eq!(page.pages, 0);
        assert_eq!(page.has_more, Some(false));
    }

    proptest! {
        #[test]
        fn prop_pages_reconstruct_dataset(len in 0usize..400, size in 1u32..60) {
            let data: Vec<usize> = (0..len).collect();
            let mut rebuilt = Vec::with_capacity(len);
            for page in 1..=page_count(len, size) {
                rebuilt.extend_from_slice(slice(&data, page, size).unwrap());
            }
            prop_assert_eq!(rebuilt, data);
        }
    }
}
