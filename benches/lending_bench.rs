#![allow(clippy::unwrap_used, clippy::indexing_slicing, missing_docs)]

use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lending_engine::{BookDetails, LendingConfig, LendingEngine, ManualClock, MemberProfile};
use rand::Rng;

/// Engine with `books` titles and `members` members, no loan cap
fn populated(books: u32, members: u32) -> LendingEngine {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let config = LendingConfig {
        default_max_books: None,
        ..LendingConfig::default()
    };
    let mut engine = LendingEngine::new(Default::default(), Default::default(), config, clock);
    for n in 0..books {
        engine.add_book(BookDetails::new(&format!("Title {n}"), "Author", "Bench"));
    }
    for n in 0..members {
        let profile = MemberProfile::standard();
        engine.register_member(&format!("Member {n}"), profile).unwrap();
    }
    engine
}

fn bench_issue_return(c: &mut Criterion) {
    let mut group = c.benchmark_group("issue_return");

    for books in [10_u32, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("cycle", books), books, |b, &books| {
            let mut engine = populated(books, 50);
            let ids: Vec<_> = engine.catalog().books().map(|book| book.id()).collect();
            let members: Vec<_> = engine.membership().members().map(|m| m.id()).collect();
            let mut rng = rand::rng();
            b.iter(|| {
                let book = ids[rng.random_range(0..ids.len())];
                let member = members[rng.random_range(0..members.len())];
                engine.issue(book, member).unwrap();
                engine.return_book(book, member).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_reservation_handoff(c: &mut Criterion) {
    c.bench_function("reserve_then_handoff", |b| {
        let mut engine = populated(1, 20);
        let book = engine.catalog().books().next().unwrap().id();
        let members: Vec<_> = engine.membership().members().map(|m| m.id()).collect();
        b.iter(|| {
            engine.issue(book, members[0]).unwrap();
            for member in &members[1..] {
                engine.reserve(book, *member).unwrap();
            }
            let mut holder = members[0];
            for next in &members[1..] {
                engine.return_book(book, holder).unwrap();
                holder = *next;
            }
            engine.return_book(book, holder).unwrap();
        });
    });
}

criterion_group!(benches, bench_issue_return, bench_reservation_handoff);
criterion_main!(benches);
