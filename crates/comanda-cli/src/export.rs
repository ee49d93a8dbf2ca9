//! CSV writers for order and expense exports.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use comanda_core::expense::{Expense, Supplier};
use comanda_core::order::Order;
use comanda_core::util::format_cents;

#[derive(Serialize)]
struct OrderRecord<'a> {
    order_id: String,
    created_at: String,
    status: &'static str,
    customer_id: String,
    items: String,
    subtotal: String,
    discount: String,
    total: String,
    points_earned: i64,
    points_spent: i64,
    notes: &'a str,
}

#[derive(Serialize)]
struct ExpenseRecord<'a> {
    expense_id: String,
    incurred_on: String,
    category: &'a str,
    supplier: &'a str,
    description: &'a str,
    amount: String,
}

/// One row per order; items are summarized as `2x Taco; 1x Soda`.
pub fn write_orders<W: Write>(writer: W, orders: &[Order]) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    for order in orders {
        let items = order
            .items
            .iter()
            .map(|item| {
                if item.redeemed {
                    format!("{}x {} (redeemed)", item.quantity, item.product_name)
                } else {
                    format!("{}x {}", item.quantity, item.product_name)
                }
            })
            .collect::<Vec<_>>()
            .join("; ");

        csv.serialize(OrderRecord {
            order_id: order.id.to_string(),
            created_at: order.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            status: order.status.as_str(),
            customer_id: order.customer_id.map(|id| id.to_string()).unwrap_or_default(),
            items,
            subtotal: format_cents(order.subtotal_cents),
            discount: format_cents(order.discount_cents),
            total: format_cents(order.total_cents),
            points_earned: order.points_earned,
            points_spent: order.redeemed_points(),
            notes: order.notes.as_deref().unwrap_or(""),
        })?;
    }
    csv.flush()?;
    Ok(orders.len())
}

/// One row per expense, with the supplier name resolved from `suppliers`.
pub fn write_expenses<W: Write>(
    writer: W,
    expenses: &[Expense],
    suppliers: &[Supplier],
) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    for expense in expenses {
        let supplier = expense
            .supplier_id
            .and_then(|id| suppliers.iter().find(|s| s.id == id))
            .map(|s| s.name.as_str())
            .unwrap_or("");

        csv.serialize(ExpenseRecord {
            expense_id: expense.id.to_string(),
            incurred_on: expense.incurred_on.to_string(),
            category: &expense.category,
            supplier,
            description: expense.description.as_deref().unwrap_or(""),
            amount: format_cents(expense.amount_cents),
        })?;
    }
    csv.flush()?;
    Ok(expenses.len())
}
