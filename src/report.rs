//! Plain-text summary of search hits per term

use std::collections::BTreeMap;

/// Default bar width in characters
pub const DEFAULT_BAR_WIDTH: usize = 50;

/// Render a horizontal bar chart of hits per term
///
/// Terms are ordered by count, largest first, ties broken alphabetically.
/// The title line carries the total number of unique articles. The longest
/// bar is `width` characters; any term with at least one hit gets one `#`.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use pubmed_harvester::report::render_term_counts;
///
/// let counts = BTreeMap::from([("bullying".to_string(), 4), ("violence".to_string(), 2)]);
/// let chart = render_term_counts(&counts, 5, 4);
/// assert!(chart.starts_with("Number of unique articles: 5"));
/// assert!(chart.contains("bullying | #### 4"));
/// ```
pub fn render_term_counts(counts: &BTreeMap<String, u64>, unique_articles: u64, width: usize) -> String {
    let mut out = format!("Number of unique articles: {}\n", unique_articles);

    if counts.is_empty() {
        out.push_str("(no search hits recorded)\n");
        return out;
    }

    let mut rows: Vec<(&str, u64)> = counts.iter().map(|(t, c)| (t.as_str(), *c)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let max = rows.first().map(|(_, c)| *c).unwrap_or(0);
    let label_width = rows.iter().map(|(t, _)| t.chars().count()).max().unwrap_or(0);

    for (term, count) in rows {
        let bar = bar_length(count, max, width);
        out.push_str(&format!(
            "{:<label_width$} | {} {}\n",
            term,
            "#".repeat(bar),
            count,
            label_width = label_width
        ));
    }
    out
}

fn bar_length(count: u64, max: u64, width: usize) -> usize {
    if count == 0 || max == 0 {
        return 0;
    }
    let scaled = (count as u128 * width as u128 / max as u128) as usize;
    scaled.max(1)
}
