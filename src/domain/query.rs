use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::resource::ValidationErrorKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

impl FromStr for SortDir {
    type Err = ValidationErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ValidationErrorKind::UnknownVariant),
        }
    }
}

/// Pagination window, ordering and predicate of a list query.
#[derive(Debug, Clone, PartialEq)]
pub struct ListInput<F> {
    pub page: i64,
    pub per_page: i64,
    pub sort: String,
    pub sort_dir: SortDir,
    pub filter: F,
}

impl<F> ListInput<F> {
    pub const DEFAULT_PAGE: i64 = 1;
    pub const DEFAULT_PER_PAGE: i64 = 10;
    pub const DEFAULT_SORT: &'static str = "id";

    pub fn new(filter: F) -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            per_page: Self::DEFAULT_PER_PAGE,
            sort: Self::DEFAULT_SORT.into(),
            sort_dir: SortDir::Asc,
            filter,
        }
    }

    pub fn with_filter<G>(self, filter: G) -> ListInput<G> {
        ListInput {
            page: self.page,
            per_page: self.per_page,
            sort: self.sort,
            sort_dir: self.sort_dir,
            filter,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// A window with a non-positive page or page size never holds items.
    pub fn is_empty_window(&self) -> bool {
        self.page < 1 || self.per_page < 1
    }

    pub fn has_default_sort(&self) -> bool {
        self.sort == Self::DEFAULT_SORT
    }
}

impl<F: Default> Default for ListInput<F> {
    fn default() -> Self {
        Self::new(F::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListOutput<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub current_page: i64,
    pub per_page: i64,
    pub last_page: i64,
}

impl<T> ListOutput<T> {
    pub fn new<F>(items: Vec<T>, total: i64, input: &ListInput<F>) -> Self {
        Self {
            items,
            total,
            current_page: input.page,
            per_page: input.per_page,
            last_page: last_page(total, input.per_page),
        }
    }

    pub fn map<U, M>(self, f: M) -> ListOutput<U>
    where
        M: FnMut(T) -> U,
    {
        ListOutput {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            current_page: self.current_page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}

pub fn last_page(total: i64, per_page: i64) -> i64 {
    if total <= 0 || per_page <= 0 {
        return 0;
    }
    (total + per_page - 1) / per_page
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn last_page_is_ceil_of_total() {
        assert_eq!(last_page(0, 10), 0);
        assert_eq!(last_page(1, 10), 1);
        assert_eq!(last_page(10, 10), 1);
        assert_eq!(last_page(11, 10), 2);
        assert_eq!(last_page(95, 7), 14);
    }

    #[test]
    fn non_positive_page_size_has_no_pages() {
        assert_eq!(last_page(42, 0), 0);
        assert_eq!(last_page(42, -3), 0);

        let mut input = ListInput::new(());
        input.per_page = 0;
        assert!(input.is_empty_window());
        input.per_page = 10;
        input.page = 0;
        assert!(input.is_empty_window());
    }

    #[test]
    fn offset_follows_page() {
        let mut input = ListInput::new(());
        assert_eq!(input.offset(), 0);
        input.page = 3;
        input.per_page = 25;
        assert_eq!(input.offset(), 50);
    }

    #[test]
    fn parses_sort_direction_case_insensitive() {
        assert_eq!("DESC".parse::<SortDir>(), Ok(SortDir::Desc));
        assert_eq!("asc".parse::<SortDir>(), Ok(SortDir::Asc));
        assert_eq!(
            "sideways".parse::<SortDir>(),
            Err(ValidationErrorKind::UnknownVariant)
        );
    }
}
