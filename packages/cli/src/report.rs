//! Plain-text rendering of a query summary.

use std::fmt::Write as _;

use drivetime_overlay::OverlaySummary;

/// Formats `summary` for the terminal.
#[must_use]
pub fn render(summary: &OverlaySummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", summary.address);
    let _ = writeln!(
        out,
        "  origin      {:.5}, {:.5}",
        summary.origin.latitude, summary.origin.longitude
    );
    let _ = writeln!(
        out,
        "  reach       {} min by {}",
        summary.duration_seconds / 60,
        summary.mode
    );
    let _ = writeln!(
        out,
        "  wards       {} ({} fragments)",
        summary.unit_codes.len(),
        summary.fragment_count
    );

    match &summary.demographics {
        Some(profile) => {
            let _ = writeln!(out, "  population  {}", profile.total_population);
            let _ = writeln!(out, "  mean age    {:.1}", profile.weighted_mean_age);
            let _ = write!(out, "  median age  {:.1}", profile.weighted_median_age);
            match profile.median_age_ratio {
                Some(ratio) => {
                    let _ = writeln!(
                        out,
                        " ({ratio:.2}x national {:.1})",
                        profile.national_median_age
                    );
                }
                None => out.push('\n'),
            }
        }
        None => {
            let _ = writeln!(out, "  demographics: no ward overlaps this area");
        }
    }

    match &summary.prices {
        Some(prices) => {
            let _ = writeln!(
                out,
                "  sales       {} via {} ({})",
                prices.count, summary.strategy, prices.method
            );
            let _ = writeln!(
                out,
                "  median      {:.0}{}",
                prices.median_price,
                pct(summary.comparison.and_then(|c| c.median_price_pct))
            );
            let _ = writeln!(
                out,
                "  mean        {:.0}{}",
                prices.mean_price,
                pct(summary.comparison.and_then(|c| c.mean_price_pct))
            );
            let _ = writeln!(out, "  total paid  {:.0}", prices.total_paid);
        }
        None => {
            let _ = writeln!(out, "  prices: no sales in this area");
        }
    }

    out
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| format!(" ({v:+.1}% vs national)"))
}
