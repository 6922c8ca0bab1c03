use serde::{Deserialize, Serialize};

const BW_PAGE_RATE: i64 = 5;
const COLOR_PAGE_RATE: i64 = 20;
const BYTES_PER_ESTIMATED_PAGE: u64 = 50 * 1024;
pub const MAX_ESTIMATED_PAGES: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PrintType {
    Bw,
    Color,
}

impl PrintType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bw" => Some(PrintType::Bw),
            "color" | "colour" => Some(PrintType::Color),
            _ => None,
        }
    }

    pub fn page_rate(&self) -> i64 {
        match self {
            PrintType::Bw => BW_PAGE_RATE,
            PrintType::Color => COLOR_PAGE_RATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrintQuote {
    pub total_pages: i64,
    pub page_rate: i64,
    pub total_cost: i64,
}

/// Price a job. Double-sided jobs bill per sheet, rounding an odd page up.
pub fn quote(print_type: PrintType, pages: i64, copies: i64, double_sided: bool) -> PrintQuote {
    let mut total_pages = pages * copies;
    if double_sided {
        total_pages = (total_pages + 1) / 2;
    }
    let page_rate = print_type.page_rate();

    PrintQuote {
        total_pages,
        page_rate,
        total_cost: total_pages * page_rate,
    }
}

/// Rough page count for a document when the requester leaves it blank.
pub fn estimate_pages(file_size: u64) -> i64 {
    let pages = file_size.div_ceil(BYTES_PER_ESTIMATED_PAGE).max(1);
    i64::try_from(pages)
        .unwrap_or(MAX_ESTIMATED_PAGES)
        .min(MAX_ESTIMATED_PAGES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sided_cost_is_pages_times_copies_times_rate() {
        let q = quote(PrintType::Bw, 10, 3, false);
        assert_eq!(q.total_pages, 30);
        assert_eq!(q.page_rate, 5);
        assert_eq!(q.total_cost, 150);

        let q = quote(PrintType::Color, 2, 1, false);
        assert_eq!(q.total_cost, 40);
    }

    #[test]
    fn double_sided_halves_rounding_up() {
        let q = quote(PrintType::Bw, 5, 1, true);
        assert_eq!(q.total_pages, 3);
        assert_eq!(q.total_cost, 15);

        let q = quote(PrintType::Color, 4, 2, true);
        assert_eq!(q.total_pages, 4);
        assert_eq!(q.total_cost, 80);
    }

    #[test]
    fn print_type_parsing() {
        assert_eq!(PrintType::parse("BW"), Some(PrintType::Bw));
        assert_eq!(PrintType::parse(" colour "), Some(PrintType::Color));
        assert_eq!(PrintType::parse("sepia"), None);
    }

    #[test]
    fn page_estimate_is_clamped() {
        assert_eq!(estimate_pages(0), 1);
        assert_eq!(estimate_pages(1), 1);
        assert_eq!(estimate_pages(50 * 1024), 1);
        assert_eq!(estimate_pages(50 * 1024 + 1), 2);
        assert_eq!(estimate_pages(16 * 1024 * 1024), MAX_ESTIMATED_PAGES);
    }
}
