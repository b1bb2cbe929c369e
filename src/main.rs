use std::{path::PathBuf, process::ExitCode, sync::Arc};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use lending_engine::{
    AfterReturn, BookDetails, BookId, Catalog, Clock, ConfigError, LendingConfig, LendingEngine,
    LendingError, LendingReport, ManualClock, MemberId, MemberProfile, Membership, SnapshotError,
    SystemClock,
    observers::{NotificationService, TransitionLogger},
};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the lending desk
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Snapshot file holding the library state
    #[arg(short, long, default_value = "library.json")]
    state: PathBuf,

    /// JSON file with lending policy overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Act as if today were this date (YYYY-MM-DD)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Operation to run
    #[command(subcommand)]
    command: Command,
}

/// Lending desk operations
#[derive(Subcommand, Debug)]
enum Command {
    /// Add a book to the catalog
    AddBook {
        /// Title
        #[arg(long)]
        title: String,
        /// Author
        #[arg(long)]
        author: String,
        /// Category
        #[arg(long, default_value = "General")]
        category: String,
    },
    /// Change a book's title, author and category
    EditBook {
        /// Book id
        #[arg(long)]
        id: u32,
        /// New title
        #[arg(long)]
        title: String,
        /// New author
        #[arg(long)]
        author: String,
        /// New category
        #[arg(long, default_value = "General")]
        category: String,
    },
    /// Delete a book along with its loan and reservations
    RemoveBook {
        /// Book id
        #[arg(long)]
        id: u32,
    },
    /// Register a member
    AddMember {
        /// Member name
        #[arg(long)]
        name: String,
        /// Premium membership: four-week loans
        #[arg(long)]
        premium: bool,
        /// Personal cap on simultaneous loans
        #[arg(long)]
        max_books: Option<usize>,
        /// Personal loan period in days
        #[arg(long)]
        loan_days: Option<u32>,
    },
    /// List books, optionally filtered by keyword
    Books {
        /// Keyword matched against title, author and category
        #[arg(long)]
        search: Option<String>,
    },
    /// Book counts per category
    Categories,
    /// Issue a book to a member
    Issue {
        /// Book id
        #[arg(long)]
        book: u32,
        /// Member id
        #[arg(long)]
        member: u32,
    },
    /// Return a borrowed book
    Return {
        /// Book id
        #[arg(long)]
        book: u32,
        /// Member id
        #[arg(long)]
        member: u32,
    },
    /// Extend a loan by one loan period
    Renew {
        /// Book id
        #[arg(long)]
        book: u32,
        /// Member id
        #[arg(long)]
        member: u32,
    },
    /// Join the waiting queue of an unavailable book
    Reserve {
        /// Book id
        #[arg(long)]
        book: u32,
        /// Member id
        #[arg(long)]
        member: u32,
    },
    /// Leave a waiting queue
    Cancel {
        /// Book id
        #[arg(long)]
        book: u32,
        /// Member id
        #[arg(long)]
        member: u32,
    },
    /// Active loans
    Loans {
        /// Only this member's loans
        #[arg(long)]
        member: Option<u32>,
    },
    /// Loans past their due date
    Overdue,
    /// Reservation queues
    Reservations {
        /// Only this member's reservations
        #[arg(long)]
        member: Option<u32>,
    },
    /// Fine owed if a loan were returned today
    Fine {
        /// Book id
        #[arg(long)]
        book: u32,
        /// Member id
        #[arg(long)]
        member: u32,
    },
    /// Member fine balances
    Fines,
    /// Recorded status transitions
    History {
        /// Print a DOT graph instead of a table
        #[arg(long)]
        dot: bool,
    },
}

impl Command {
    /// Whether the command changes state that must be saved
    fn mutates(&self) -> bool {
        matches!(
            self,
            Self::AddBook { .. }
                | Self::EditBook { .. }
                | Self::RemoveBook { .. }
                | Self::AddMember { .. }
                | Self::Issue { .. }
                | Self::Return { .. }
                | Self::Renew { .. }
                | Self::Reserve { .. }
                | Self::Cancel { .. }
        )
    }
}

/// Anything that stops a command from completing
#[derive(Debug, Error)]
enum CliError {
    /// Business rule violation
    #[error(transparent)]
    Lending(#[from] LendingError),
    /// State file could not be read or written
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// Policy file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Parse arguments, run one command, report failure through the exit code
fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Route `tracing` output to stderr, filtered by `RUST_LOG`
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    drop(
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
    );
}

/// Load state, apply the command, save when it changed anything
fn run(args: Args) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => LendingConfig::from_json_file(path)?,
        None => LendingConfig::default(),
    };
    let clock: Arc<dyn Clock> = match args.today {
        Some(date) => Arc::new(ManualClock::new(date)),
        None => Arc::new(SystemClock),
    };

    let mut engine = if args.state.exists() {
        LendingEngine::load_from_path(&args.state, config, clock)?
    } else {
        let mut engine = LendingEngine::new(Catalog::new(), Membership::new(), config, clock);
        engine.register_observer(Box::new(TransitionLogger));
        engine.register_observer(Box::new(NotificationService));
        engine
    };

    let mutates = args.command.mutates();
    execute(&mut engine, args.command)?;
    if mutates {
        engine.save_to_path(&args.state)?;
    }
    Ok(())
}

/// Apply one command and print its outcome
#[allow(clippy::too_many_lines)]
fn execute(engine: &mut LendingEngine, command: Command) -> Result<(), CliError> {
    match command {
        Command::AddBook {
            title,
            author,
            category,
        } => {
            let details = BookDetails {
                title,
                author,
                category,
            };
            let id = engine.add_book(details);
            println!("{} {id}", "Book added:".green());
        }
        Command::EditBook {
            id,
            title,
            author,
            category,
        } => {
            let details = BookDetails {
                title,
                author,
                category,
            };
            engine.edit_book(BookId(id), details)?;
            println!("{}", "Book updated.".green());
        }
        Command::RemoveBook { id } => {
            let book = engine.remove_book(BookId(id))?;
            println!("{} {book}", "Book deleted:".green());
        }
        Command::AddMember {
            name,
            premium,
            max_books,
            loan_days,
        } => {
            let mut profile = if premium {
                MemberProfile::premium()
            } else {
                MemberProfile::standard()
            };
            if let Some(max_books) = max_books {
                profile = profile.with_max_books(max_books);
            }
            if let Some(days) = loan_days {
                profile = profile.with_loan_period(days);
            }
            let id = engine.register_member(&name, profile)?;
            println!("{} {id}", "Member registered:".green());
        }
        Command::Books { search } => {
            let books = match &search {
                Some(keyword) => engine.catalog().search(keyword),
                None => engine.catalog().books().collect(),
            };
            if books.is_empty() {
                println!("No books found.");
            }
            for book in books {
                println!("{book}, Status: {}", book.status());
            }
        }
        Command::Categories => {
            let report = LendingReport::category_report(engine.catalog());
            println!("{}", report.trim_end());
        }
        Command::Issue { book, member } => {
            let loan = engine.issue(BookId(book), MemberId(member))?;
            println!("{} Due: {}", "Book issued.".green(), loan.due_date);
        }
        Command::Return { book, member } => {
            let receipt = engine.return_book(BookId(book), MemberId(member))?;
            if receipt.fine.is_zero() {
                println!("{}", "Book returned.".green());
            } else {
                println!(
                    "{} {} day(s) late, fine: {:.2}",
                    "Late return!".yellow().bold(),
                    receipt.days_overdue,
                    receipt.fine
                );
            }
            match receipt.next {
                AfterReturn::Shelved => {}
                AfterReturn::Reissued(loan) => {
                    let (member, due) = (loan.member, loan.due_date);
                    println!("Book issued to reserved member {member}, due {due}");
                }
                AfterReturn::Held(member) => {
                    println!("Book held for reserved member {member}");
                }
            }
        }
        Command::Renew { book, member } => {
            let loan = engine.renew(BookId(book), MemberId(member))?;
            let due = loan.due_date;
            println!("{} New due date: {due}", "Loan renewed.".green());
        }
        Command::Reserve { book, member } => {
            let position = engine.reserve(BookId(book), MemberId(member))?;
            println!("{} You're in position {position}", "Book reserved.".green());
        }
        Command::Cancel { book, member } => {
            engine.cancel_reservation(BookId(book), MemberId(member))?;
            println!("{}", "Reservation cancelled.".green());
        }
        Command::Loans { member } => match member {
            None => println!("{}", LendingReport::issued_table(engine).trim_end()),
            Some(member) => {
                for loan in engine.active_loans(Some(MemberId(member)))? {
                    println!("{} due {}", loan.book, loan.due_date);
                }
            }
        },
        Command::Overdue => {
            println!("{}", LendingReport::overdue_table(engine).trim_end());
        }
        Command::Reservations { member } => match member {
            None => {
                let listing = LendingReport::reservations_listing(engine);
                println!("{}", listing.trim_end());
            }
            Some(member) => {
                for entry in engine.reservations_for(MemberId(member))? {
                    println!("{} position {}", entry.book, entry.position);
                }
            }
        },
        Command::Fine { book, member } => {
            let fine = engine.accrued_fine(BookId(book), MemberId(member))?;
            println!("Fine if returned today: {fine:.2}");
        }
        Command::Fines => println!("{}", LendingReport::fines_table(engine).trim_end()),
        Command::History { dot } => {
            let rendered = if dot {
                LendingReport::generate_dot(engine)
            } else {
                let transitions: Vec<_> = engine.history().iter().cloned().collect();
                LendingReport::history_table(&transitions)
            };
            println!("{}", rendered.trim_end());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use clap::Parser;

    use super::{Args, Command};

    #[test]
    fn test_fine_command_is_read_only() {
        let argv = ["lending", "fine", "--book", "3", "--member", "2"];
        let args = Args::try_parse_from(argv).unwrap();
        let Command::Fine { book, member } = args.command else {
            panic!("expected fine command, got {:?}", args.command);
        };
        assert_eq!((book, member), (3, 2));
        assert!(!args.command.mutates());
    }
}
