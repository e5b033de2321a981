//! Built-in demo dataset, shown when no workbook has been loaded.

use crate::types::RawRecord;

#[allow(clippy::too_many_arguments)]
fn booking(
    date: &str,
    status: &str,
    first_name: &str,
    last_name: &str,
    totals: &str,
    age: i64,
    region: &str,
    payment_type: &str,
    product_code: &str,
    corp_or_self: &str,
) -> RawRecord {
    RawRecord::new()
        .with("date", date)
        .with("status", status)
        .with("first_name", first_name)
        .with("last_name", last_name)
        .with("totals", totals)
        .with("Age", age)
        .with("Region", region)
        .with("Corporate Or Self Pay", payment_type)
        .with("product_code", product_code)
        .with("corp_or_self", corp_or_self)
}

/// Six bookings over three days covering every payment category.
pub fn sample_records() -> Vec<RawRecord> {
    vec![
        booking("13/01/2025", "Booked", "Valentin", "Elsip", "£543.38", 50, "Ilford", "Corporate", "Advanced", "Corporate"),
        booking("13/01/2025", "Booked", "Carlin", "Towson", "£543.38", 52, "Milton Keynes", "Corporate", "Select", "Corporate"),
        booking("13/01/2025", "Booked", "Woodie", "Kynsey", "£543.38", 44, "South East London", "Corporate", "Essential", "Self Pay"),
        booking("14/01/2025", "Completed", "Jane", "Doe", "£200.00", 35, "London", "Self Pay", "Advanced Plus", "Self Pay"),
        booking("14/01/2025", "Cancelled", "John", "Smith", "£0.00", 29, "London", "Self Pay", "GSK", "Corporate Flex"),
        booking("15/01/2025", "Booked", "Alice", "Jones", "£150.00", 40, "Ilford", "Corporate", "Advanced", "Corporate"),
    ]
}
