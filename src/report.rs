//! Text renderings of the lending state for presentation layers.

use std::collections::HashMap;

use crate::{
    book_status::BookStatus,
    catalog::{BookId, Catalog},
    engine::{LendingEngine, LendingTransition},
    membership::MemberId,
};

/// Report builders over an engine
#[derive(Debug)]
pub struct LendingReport;

impl LendingReport {
    /// Title of a book, or a placeholder for a missing record
    fn title(engine: &LendingEngine, book: BookId) -> String {
        engine
            .catalog()
            .find_book(book)
            .map_or_else(|| "(removed)".to_string(), |b| b.title.clone())
    }

    /// Name of a member, or a placeholder for a missing record
    fn name(engine: &LendingEngine, member: MemberId) -> String {
        engine
            .membership()
            .find_member(member)
            .map_or_else(|| format!("{member}"), |m| m.name.clone())
    }

    /// Markdown table of every active loan
    #[must_use]
    pub fn issued_table(engine: &LendingEngine) -> String {
        let loans = engine.active_loans(None).unwrap_or_default();
        if loans.is_empty() {
            return "No books issued.".to_string();
        }

        let mut table = String::from("| Book | Title | Member | Due |\n");
        table.push_str("|------|-------|--------|-----|\n");
        for loan in loans {
            table.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                loan.book,
                Self::title(engine, loan.book),
                Self::name(engine, loan.member),
                loan.due_date
            ));
        }
        table
    }

    /// Markdown table of loans past their due date with accrued fines
    #[must_use]
    pub fn overdue_table(engine: &LendingEngine) -> String {
        let overdue = engine.overdue_loans();
        if overdue.is_empty() {
            return "No overdue books.".to_string();
        }

        let mut table = String::from("| Book | Title | Member | Due | Days late | Fine |\n");
        table.push_str("|------|-------|--------|-----|-----------|------|\n");
        for entry in overdue {
            table.push_str(&format!(
                "| {} | {} | {} | {} | {} | {:.2} |\n",
                entry.loan.book,
                Self::title(engine, entry.loan.book),
                Self::name(engine, entry.loan.member),
                entry.loan.due_date,
                entry.days_overdue,
                entry.accrued_fine
            ));
        }
        table
    }

    /// Each reservation queue with members in order
    #[must_use]
    pub fn reservations_listing(engine: &LendingEngine) -> String {
        let mut listing = String::new();
        for (book, queue) in engine.all_reservations() {
            listing.push_str(&format!(
                "{} has {} reservation(s):\n",
                Self::title(engine, book),
                queue.len()
            ));
            for (i, member) in queue.iter().enumerate() {
                let name = Self::name(engine, *member);
                listing.push_str(&format!("  {}. {name}\n", i.saturating_add(1)));
            }
        }
        if listing.is_empty() {
            return "No reservations found.".to_string();
        }
        listing
    }

    /// Fine balance of every member
    #[must_use]
    pub fn fines_table(engine: &LendingEngine) -> String {
        let mut table = String::from("| Member | Name | Fine |\n");
        table.push_str("|--------|------|------|\n");
        for member in engine.membership().members() {
            table.push_str(&format!(
                "| {} | {} | {:.2} |\n",
                member.id(),
                member.name,
                member.fine_balance()
            ));
        }
        table
    }

    /// Book count per category
    #[must_use]
    pub fn category_report(catalog: &Catalog) -> String {
        let mut report = format!("Total books: {}\n", catalog.len());
        for (category, count) in catalog.category_counts() {
            report.push_str(&format!("{category}: {count} books\n"));
        }
        report
    }

    /// Markdown table of recorded transitions
    #[must_use]
    pub fn history_table(transitions: &[LendingTransition]) -> String {
        if transitions.is_empty() {
            return "No transitions recorded yet.".to_string();
        }

        let mut table = String::from("| # | Date | Book | From | Event | To |\n");
        table.push_str("|---|------|------|------|-------|----|\n");
        for (i, transition) in transitions.iter().enumerate() {
            table.push_str(&format!(
                "| {} | {} | {} | {} | {:?} | {} |\n",
                i.saturating_add(1),
                transition.on,
                transition.book,
                transition.from,
                transition.event,
                transition.to
            ));
        }
        table
    }

    /// DOT graph of the status machine, edges weighted by how often each
    /// transition appears in the recorded history
    #[must_use]
    pub fn generate_dot(engine: &LendingEngine) -> String {
        let statuses = [
            BookStatus::Available,
            BookStatus::Issued,
            BookStatus::Reserved,
        ];
        let mut counts: HashMap<(BookStatus, BookStatus), usize> = HashMap::new();
        for transition in engine.history() {
            let count = counts.entry((transition.from, transition.to)).or_default();
            *count = count.saturating_add(1);
        }

        let mut dot = String::from("digraph lending {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=circle, style=filled, fillcolor=lightblue];\n");
        for status in statuses {
            dot.push_str(&format!("  {status} [label=\"{status}\"];\n"));
        }
        for from in statuses {
            for to in statuses {
                if let Some(count) = counts.get(&(from, to)) {
                    dot.push_str(&format!("  {from} -> {to} [label=\"{count}\"];\n"));
                }
            }
        }
        dot.push_str("}\n");
        dot
    }
}
