use comfy_table::{presets::UTF8_FULL, Table};
use shoplens_core::{
    BreakdownRow, CategoryTotal, DailyPurchases, Metric, MonthlyTotal, ProductStats, Report,
    Summary,
};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

pub fn summary(summary: &Summary) -> String {
    let mut table = table(&["Metric", "Value"]);
    table
        .add_row(vec!["Total products".to_string(), summary.total_products.to_string()])
        .add_row(vec!["Total views".to_string(), summary.total_views.to_string()])
        .add_row(vec!["Total purchases".to_string(), summary.total_purchases.to_string()])
        .add_row(vec!["Total brands".to_string(), summary.total_brands.to_string()])
        .add_row(vec![
            "Total categories".to_string(),
            format!(
                "{} categories / {} subcategories",
                summary.total_categories, summary.total_subcategories
            ),
        ]);
    table.to_string()
}

pub fn monthly(rows: &[MonthlyTotal]) -> String {
    let mut table = table(&["Month", "Views", "Purchases"]);
    for row in rows {
        table.add_row(vec![
            row.year_month.clone(),
            row.views.to_string(),
            row.purchases.to_string(),
        ]);
    }
    table.to_string()
}

pub fn categories(rows: &[CategoryTotal], metric: Metric) -> String {
    let mut table = table(&["Category", metric.column()]);
    for row in rows {
        table.add_row(vec![row.category_code.clone(), row.value.to_string()]);
    }
    table.to_string()
}

pub fn products(rows: &[ProductStats]) -> String {
    let mut table = table(&["Product", "Views", "Purchases", "View/purchase ratio"]);
    for row in rows {
        table.add_row(vec![
            row.product_id.to_string(),
            row.total_views.to_string(),
            row.total_purchases.to_string(),
            format!("{:.2}", row.view_to_purchase_ratio),
        ]);
    }
    table.to_string()
}

pub fn daily(rows: &[DailyPurchases]) -> String {
    let mut table = table(&["Day", "Purchases"]);
    for row in rows {
        table.add_row(vec![row.day.to_string(), row.purchases.to_string()]);
    }
    table.to_string()
}

pub fn breakdown(rows: &[BreakdownRow], metric: Metric) -> String {
    let mut table = table(&["Category", "Brand", "Price", metric.column()]);
    for row in rows {
        table.add_row(vec![
            row.category_code.clone(),
            row.brand.clone(),
            format!("{:.2}", row.price),
            row.value.to_string(),
        ]);
    }
    table.to_string()
}

pub fn report(report: &Report) -> String {
    let mut sections = vec![format!("Summary\n{}", summary(&report.summary))];

    if let Some((first, last)) = report.time_bounds {
        sections.push(format!("Events from {first} to {last}"));
    }
    sections.push(format!("Monthly totals\n{}", monthly(&report.monthly_totals)));
    sections.push(format!(
        "Top categories by purchases\n{}",
        categories(&report.top_categories_by_purchase, Metric::Purchase)
    ));
    sections.push(format!(
        "Top categories by views\n{}",
        categories(&report.top_categories_by_view, Metric::View)
    ));
    sections.push(format!("Purchases per day\n{}", daily(&report.daily_purchases)));
    sections.push(format!(
        "Purchase frequency for user {}\n{}",
        report.frequency_user_id,
        daily(&report.user_purchase_frequency)
    ));
    sections.push(format!(
        "At-risk products (ratio > {})\n{}",
        report.at_risk_threshold,
        products(&report.at_risk_products)
    ));

    sections.join("\n\n")
}
