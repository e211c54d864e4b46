//! hibuddy.ca navigation profile

use std::collections::BTreeMap;

use crate::config::{PaginationSelector, SiteConfig, SiteSelectors};

/// Product classifications that have a filter control on the search page
const CATEGORY_FILTERS: [(&str, &str); 3] = [
    ("Flower", "input[value='Flower']"),
    ("Vape Cart", "input[value='Vapes']"),
    ("Pre-Rolls", "input[value='Pre-Rolls']"),
];

/// Build the hibuddy.ca profile
pub fn config() -> SiteConfig {
    let category_filters = CATEGORY_FILTERS
        .iter()
        .map(|(category, selector)| ((*category).to_string(), (*selector).to_string()))
        .collect::<BTreeMap<_, _>>();

    SiteConfig {
        name: "HiBuddy".to_string(),
        base_url: "https://hibuddy.ca/".to_string(),
        search_base_url: "https://hibuddy.ca/products/search?q=".to_string(),
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        selectors: SiteSelectors {
            // a label styled as a button
            age_gate: ".btn.btn-success".to_string(),
            result_item: ".infinite-scroll-component a".to_string(),
            pagination: PaginationSelector {
                control: ".rdt_Pagination select".to_string(),
                show_all_value: "100".to_string(),
            },
            category_filters,
            first_price: ".rdt_TableBody .rdt_TableRow:first-child .rdt_TableCell:nth-child(2) .flex div:first-child".to_string(),
            last_price: ".rdt_TableBody .rdt_TableRow:last-child .rdt_TableCell:nth-child(2) .flex div:first-child".to_string(),
            amount: ".tab-active".to_string(),
        },
    }
}
