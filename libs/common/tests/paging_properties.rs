//! Property tests for the pagination invariants

use common::paging::{MAX_PAGE_SIZE, PagedList, PagingParams, total_pages};
use proptest::prelude::*;

proptest! {
    #[test]
    fn oversized_pages_use_the_maximum(page_size in (MAX_PAGE_SIZE + 1)..10_000u32) {
        prop_assert_eq!(PagingParams::new(1, page_size).page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn page_metadata_matches_the_source(
        count in 0usize..400,
        page_number in 1u32..40,
        page_size in 1u32..=MAX_PAGE_SIZE,
    ) {
        let params = PagingParams::new(page_number, page_size);
        let page = PagedList::paginate(0..count, params);

        let expected_pages = (count as f64 / page_size as f64).ceil() as u32;
        prop_assert_eq!(page.total_pages, expected_pages);
        prop_assert_eq!(total_pages(count as u64, page_size), expected_pages);

        let skipped = (page_number as i64 - 1) * page_size as i64;
        let expected_len = (page_size as i64).min((count as i64 - skipped).max(0));
        prop_assert_eq!(page.items.len() as i64, expected_len);
        prop_assert!(page.items.len() <= page_size as usize);
    }

    #[test]
    fn pages_partition_the_source(count in 0usize..200, page_size in 1u32..=MAX_PAGE_SIZE) {
        let pages = total_pages(count as u64, page_size).max(1);
        let collected: Vec<usize> = (1..=pages)
            .flat_map(|n| PagedList::paginate(0..count, PagingParams::new(n, page_size)).items)
            .collect();

        prop_assert_eq!(collected, (0..count).collect::<Vec<_>>());
    }
}
