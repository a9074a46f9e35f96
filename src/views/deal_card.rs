use crate::models::{Deal, DealStatus};
use crate::views::format;

const TITLE_WIDTH: usize = 40;

/// Leading marker standing in for the badge colour.
pub fn status_marker(status: &DealStatus) -> char {
    match status {
        DealStatus::New | DealStatus::Active => '*',
        DealStatus::Pending | DealStatus::InProgress => '~',
        DealStatus::Closed => '-',
        DealStatus::Other(_) => ' ',
    }
}

/// Badge with the status text exactly as the backend sent it.
pub fn status_badge(deal: &Deal) -> String {
    format!("{}[{}]", status_marker(&deal.status()), deal.deal_status)
}

pub fn title(deal: &Deal) -> &str {
    if deal.title.trim().is_empty() {
        "Unnamed Deal"
    } else {
        &deal.title
    }
}

/// One deal summary. `action` is what the user types to see its files.
pub fn render(deal: &Deal, action: &str) -> String {
    let mut lines = vec![
        format!(
            "{:<width$} {}",
            format::truncate(title(deal), TITLE_WIDTH),
            status_badge(deal),
            width = TITLE_WIDTH
        ),
        format!("  Asset Class: {}", format::or_na(&deal.asset_class)),
        format!("  Currency:    {}", format::or_na(&deal.currency)),
    ];
    if !deal.firm.trim().is_empty() {
        lines.push(format!("  Firm:        {}", deal.firm));
    }
    lines.push(format!("  Created:     {}", format::date(&deal.created_at)));
    lines.push(format!("  ID: {:<8} View Details: {} {}", deal.id, action, deal.id));

    format::block(&lines)
}
