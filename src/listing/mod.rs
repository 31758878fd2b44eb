use serde::{Deserialize, Serialize};

/// Query-string shape shared by every list endpoint:
/// `?search=&status=&page=&limit=&sort=col:dir,col2:dir2`
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

/// Build a substring-match pattern for LIKE/ILIKE predicates.
///
/// The literal term is trimmed, truncated, and stripped of the store's
/// wildcard meta-characters so user input can never widen the match. An empty
/// term yields the sentinel "%%" which matches every row, letting handlers
/// keep one SQL text for the searched and unsearched cases.
pub fn search_pattern(raw: &str, max_len: usize) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .take(max_len)
        .filter(|c| !matches!(c, '%' | '_' | '\\'))
        .collect();

    format!("%{}%", cleaned)
}

/// Parse the `sort` query parameter: comma-separated `column:direction` pairs.
/// Unknown direction tokens normalize to ASC.
pub fn parse_sort_param(raw: &str) -> Vec<SortKey> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                return None;
            }
            let mut it = trimmed.splitn(2, ':');
            let column = it.next()?.trim();
            if column.is_empty() {
                return None;
            }
            let direction = match it.next().map(str::trim) {
                Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                _ => SortDirection::Asc,
            };
            Some(SortKey { column: column.to_string(), direction })
        })
        .collect()
}

// Default clauses are written in SQL style ("created_at DESC, id ASC") and go
// through the same whitelist as client input.
fn parse_default_clause(s: &str) -> Vec<SortKey> {
    s.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                return None;
            }
            let mut it = trimmed.split_whitespace();
            let column = it.next()?;
            let direction = match it.next() {
                Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                _ => SortDirection::Asc,
            };
            Some(SortKey { column: column.to_string(), direction })
        })
        .collect()
}

/// Build an ORDER BY fragment from a requested sort, filtered against the
/// column whitelist.
///
/// Columns outside the whitelist are silently dropped rather than rejected,
/// tolerating stale sort state held by frontends. If nothing survives, the
/// default clause is parsed through the same path. The whitelist is the
/// injection defense here: identifiers cannot be bind-parameterized.
pub fn order_by(allowed: &[&str], requested: &[SortKey], default_clause: &str) -> String {
    let surviving: Vec<&SortKey> = requested
        .iter()
        .filter(|k| allowed.contains(&k.column.as_str()))
        .collect();

    let keys: Vec<SortKey> = if surviving.is_empty() {
        parse_default_clause(default_clause)
            .into_iter()
            .filter(|k| allowed.contains(&k.column.as_str()))
            .collect()
    } else {
        surviving.into_iter().cloned().collect()
    };

    if keys.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = keys
        .iter()
        .map(|k| format!("\"{}\" {}", k.column, k.direction.to_sql()))
        .collect();
    format!("ORDER BY {}", parts.join(", "))
}

/// Normalized pagination window. Invalid or missing parameters fall back to
/// defaults silently; pagination input is advisory, not validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn from_params(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p,
            _ => 1,
        };
        let limit = match limit {
            Some(l) if l >= 1 => l.min(max_limit),
            _ => default_limit,
        };
        // Advisory input: an absurdly large page saturates instead of
        // overflowing the offset computation.
        let offset = (page - 1).saturating_mul(limit);
        Self { page, limit, offset }
    }
}

/// Paginated list envelope returned by every list endpoint. `total` comes
/// from a count query over the same predicate as the row query.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub page: i64,
    #[serde(rename = "pageSize")]
    pub page_size: i64,
    pub total: i64,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(rows: Vec<T>, pagination: Pagination, total: i64) -> Self {
        let has_more = pagination.offset + (rows.len() as i64) < total;
        Self {
            rows,
            page: pagination.page,
            page_size: pagination.limit,
            total,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_search_yields_match_all_sentinel() {
        assert_eq!(search_pattern("", 100), "%%");
        assert_eq!(search_pattern("   ", 100), "%%");
    }

    #[test]
    fn search_strips_wildcard_metacharacters() {
        assert_eq!(search_pattern("50% off", 100), "%50 off%");
        assert_eq!(search_pattern("a_b\\c", 100), "%abc%");
    }

    #[test]
    fn search_truncates_long_terms() {
        let long = "x".repeat(500);
        assert_eq!(search_pattern(&long, 100).len(), 102);
    }

    #[test]
    fn sort_param_parses_columns_and_directions() {
        let keys = parse_sort_param("created_at:desc, name:asc,id");
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0].column, "created_at");
        assert_eq!(keys[0].direction, SortDirection::Desc);
        assert_eq!(keys[2].direction, SortDirection::Asc);
    }

    #[test]
    fn unknown_direction_defaults_to_asc() {
        let keys = parse_sort_param("name:sideways");
        assert_eq!(keys[0].direction, SortDirection::Asc);
    }

    #[test]
    fn order_by_drops_non_whitelisted_columns() {
        let requested = parse_sort_param("password_hash:desc");
        let clause = order_by(&["created_at", "id"], &requested, "created_at DESC");
        assert_eq!(clause, "ORDER BY \"created_at\" DESC");
    }

    #[test]
    fn order_by_keeps_surviving_columns() {
        let requested = parse_sort_param("secret:desc,id:desc");
        let clause = order_by(&["created_at", "id"], &requested, "created_at DESC");
        assert_eq!(clause, "ORDER BY \"id\" DESC");
    }

    #[test]
    fn order_by_default_clause_parses_multiple_keys() {
        let clause = order_by(&["created_at", "id"], &[], "created_at DESC, id ASC");
        assert_eq!(clause, "ORDER BY \"created_at\" DESC, \"id\" ASC");
    }

    #[test]
    fn pagination_math() {
        let p = Pagination::from_params(Some(3), Some(20), 20, 100);
        assert_eq!(p.offset, 40);
    }

    #[test]
    fn pagination_invalid_input_falls_back() {
        let p = Pagination::from_params(Some(0), Some(-5), 20, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 20);
        assert_eq!(p.offset, 0);

        let p = Pagination::from_params(None, Some(10_000), 20, 100);
        assert_eq!(p.limit, 100);
    }

    #[test]
    fn pagination_huge_page_saturates_offset() {
        let p = Pagination::from_params(Some(i64::MAX), Some(100), 20, 100);
        assert_eq!(p.page, i64::MAX);
        assert_eq!(p.offset, i64::MAX);

        let p = Pagination::from_params(Some(i64::MAX), None, 20, 100);
        assert_eq!(p.offset, i64::MAX);
    }

    #[test]
    fn page_has_more_accounts_for_offset() {
        let pagination = Pagination::from_params(Some(3), Some(20), 20, 100);
        let rows: Vec<i64> = (0..20).collect();
        let page = Page::new(rows, pagination, 61);
        assert!(page.has_more);

        let rows: Vec<i64> = (0..20).collect();
        let page = Page::new(rows, pagination, 60);
        assert!(!page.has_more);
    }
}
