//! Sort order detection and verification for smart-table columns

use std::cmp::Ordering;

/// Sort state of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// A to Z, smallest first
    Ascending,
    /// Z to A, largest first
    Descending,
    /// No sort applied
    Unsorted,
}

impl SortOrder {
    /// Parse the header link's class list (`"sort asc"`, `"sort desc"`, ...)
    pub fn from_class(class: &str) -> Self {
        let class = class.to_lowercase();
        let tokens: Vec<&str> = class.split_whitespace().collect();
        if tokens.iter().any(|t| *t == "desc" || t.ends_with("-desc") || *t == "descending") {
            SortOrder::Descending
        } else if tokens.iter().any(|t| *t == "asc" || t.ends_with("-asc") || *t == "ascending") {
            SortOrder::Ascending
        } else {
            SortOrder::Unsorted
        }
    }

    /// State after one more header click
    pub fn next(self) -> Self {
        match self {
            SortOrder::Unsorted => SortOrder::Ascending,
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Unsorted,
        }
    }

    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
            SortOrder::Unsorted => "none",
        }
    }
}

/// How a column's values compare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Case-insensitive text
    Text,
    /// Numbers, possibly with currency symbols or thousands separators
    Numeric,
}

/// Parse a numeric cell, ignoring currency symbols and thousands separators
pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned == "." {
        return None;
    }
    cleaned.parse().ok()
}

/// Compare two cells of a column.
///
/// Unparsable numeric values sort after every number.
pub fn compare(a: &str, b: &str, kind: ColumnKind) -> Ordering {
    match kind {
        ColumnKind::Text => a.trim().to_lowercase().cmp(&b.trim().to_lowercase()),
        ColumnKind::Numeric => match (parse_number(a), parse_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

/// Whether `values` are in `order`.
///
/// Any sequence counts as [`SortOrder::Unsorted`]. Ties are allowed.
pub fn is_sorted<S: AsRef<str>>(values: &[S], order: SortOrder, kind: ColumnKind) -> bool {
    values.windows(2).all(|pair| {
        let ordering = compare(pair[0].as_ref(), pair[1].as_ref(), kind);
        match order {
            SortOrder::Ascending => ordering != Ordering::Greater,
            SortOrder::Descending => ordering != Ordering::Less,
            SortOrder::Unsorted => true,
        }
    })
}

/// Whether `descending` is `ascending` read backwards.
///
/// Tied values may swap places; anything else must line up.
pub fn is_reverse_of<S: AsRef<str>>(descending: &[S], ascending: &[S], kind: ColumnKind) -> bool {
    descending.len() == ascending.len()
        && descending
            .iter()
            .zip(ascending.iter().rev())
            .all(|(d, a)| compare(d.as_ref(), a.as_ref(), kind) == Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_from_header_class() {
        assert_eq!(SortOrder::from_class("ng2-smart-sort-link sort asc"), SortOrder::Ascending);
        assert_eq!(SortOrder::from_class("ng2-smart-sort-link sort DESC"), SortOrder::Descending);
        assert_eq!(SortOrder::from_class("ng2-smart-sort-link sort"), SortOrder::Unsorted);
        // "ascii" or "description" must not read as a sort marker
        assert_eq!(SortOrder::from_class("description"), SortOrder::Unsorted);
    }

    #[test]
    fn test_click_cycle() {
        let order = SortOrder::Unsorted.next();
        assert_eq!(order, SortOrder::Ascending);
        assert_eq!(order.next(), SortOrder::Descending);
        assert_eq!(order.next().next(), SortOrder::Unsorted);
    }

    #[test]
    fn test_text_sort_is_case_insensitive() {
        let values = ["adidas", "Nike", "puma"];
        assert!(is_sorted(&values, SortOrder::Ascending, ColumnKind::Text));
        assert!(!is_sorted(&values, SortOrder::Descending, ColumnKind::Text));

        let reversed = ["puma", "Nike", "adidas"];
        assert!(is_sorted(&reversed, SortOrder::Descending, ColumnKind::Text));
    }

    #[test]
    fn test_numeric_sort_handles_formatting() {
        let values = ["$9.99", "$1,200.00", "15000"];
        assert!(is_sorted(&values, SortOrder::Ascending, ColumnKind::Numeric));
        // Text order would put "$1,200.00" first.
        assert!(!is_sorted(&values, SortOrder::Ascending, ColumnKind::Text));
    }

    #[test]
    fn test_unparsable_numbers_sort_last() {
        let values = ["1", "2", "n/a"];
        assert!(is_sorted(&values, SortOrder::Ascending, ColumnKind::Numeric));
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("-3.5"), Some(-3.5));
    }

    #[test]
    fn test_trivial_sequences_are_sorted() {
        let empty: [&str; 0] = [];
        assert!(is_sorted(&empty, SortOrder::Ascending, ColumnKind::Text));
        assert!(is_sorted(&["only"], SortOrder::Descending, ColumnKind::Text));
        assert!(is_sorted(&["b", "a"], SortOrder::Unsorted, ColumnKind::Text));
    }

    #[test]
    fn test_descending_must_mirror_ascending() {
        let ascending = ["Adidas", "nike", "Puma"];
        assert!(is_reverse_of(&["puma", "Nike", "adidas"], &ascending, ColumnKind::Text));
        // Monotone, but a row went missing.
        assert!(!is_reverse_of(&["Puma", "Adidas"], &ascending, ColumnKind::Text));
        // Monotone, but a different row took its place.
        assert!(!is_reverse_of(&["Puma", "Nike", "Asics"], &ascending, ColumnKind::Text));
    }

    #[test]
    fn test_reverse_allows_ties_to_swap() {
        let ascending = ["1", "2", "2", "3"];
        assert!(is_reverse_of(&["3", "2.0", "2", "1"], &ascending, ColumnKind::Numeric));
        assert!(is_reverse_of(&["b", "A", "a"], &["a", "a", "b"], ColumnKind::Text));
    }
}
