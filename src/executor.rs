use std::fmt;

use bigdecimal::BigDecimal;
use diesel::pg::TransactionBuilder;
use diesel::{PgConnection, QueryResult};
use log::{debug, warn};

use crate::classify::{self, BackendSignal};
use crate::error::{Privilege, WriteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    ReadCommitted,
    Serializable,
}

impl Isolation {
    fn begin(self, conn: &mut PgConnection) -> TransactionBuilder<'_, PgConnection> {
        let builder = conn.build_transaction();
        match self {
            Isolation::ReadCommitted => builder.read_committed(),
            Isolation::Serializable => builder.serializable(),
        }
    }
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Isolation::ReadCommitted => f.write_str("READ COMMITTED"),
            Isolation::Serializable => f.write_str("SERIALIZABLE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    InsertStudio,
    InsertUser,
    InsertMovie,
    ShowMovie,
    ListMoviesForUser,
    UpdateMovie,
    DeleteMovie,
    DecreasePrice,
    RateMovie,
}

impl Operation {
    /// Fixed per operation; callers cannot override it.
    pub const fn isolation(self) -> Isolation {
        match self {
            Operation::DecreasePrice => Isolation::Serializable,
            _ => Isolation::ReadCommitted,
        }
    }

    pub const fn table(self) -> &'static str {
        match self {
            Operation::InsertStudio => "studios",
            Operation::InsertUser => "users",
            _ => "movies",
        }
    }

    /// Table grants the operation's statements need, in the order they are
    /// checked. Filtered or `RETURNING` writes also read the table.
    pub const fn required_grants(self) -> &'static [(&'static str, Privilege)] {
        match self {
            Operation::InsertStudio => &[("studios", Privilege::Insert)],
            Operation::InsertUser => &[("users", Privilege::Insert)],
            Operation::InsertMovie => &[("movies", Privilege::Insert)],
            Operation::ShowMovie => &[("movies", Privilege::Select)],
            Operation::ListMoviesForUser => {
                &[("movies", Privilege::Select), ("users", Privilege::Select)]
            }
            Operation::UpdateMovie | Operation::DecreasePrice | Operation::RateMovie => {
                &[("movies", Privilege::Update), ("movies", Privilege::Select)]
            }
            Operation::DeleteMovie => &[("movies", Privilege::Delete), ("movies", Privilege::Select)],
        }
    }

    /// First privilege the operation needs on `table`.
    pub fn privilege_on(self, table: &str) -> Privilege {
        let grants = self.required_grants();
        grants
            .iter()
            .find(|(granted, _)| *granted == table)
            .or_else(|| grants.first())
            .map_or(Privilege::Select, |&(_, privilege)| privilege)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::InsertStudio => "insert-studio",
            Operation::InsertUser => "insert-user",
            Operation::InsertMovie => "insert-movie",
            Operation::ShowMovie => "show-movie",
            Operation::ListMoviesForUser => "list-movies",
            Operation::UpdateMovie => "update-movie",
            Operation::DeleteMovie => "delete-movie",
            Operation::DecreasePrice => "decrease-price",
            Operation::RateMovie => "rate-movie",
        };
        f.write_str(name)
    }
}

/// What is being executed, with the context needed to classify a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub operation: Operation,
    /// Primary key of the target row, rendered for people (`studio 7`).
    pub key: String,
    /// Price the statement tries to store, if any.
    pub price: Option<BigDecimal>,
}

impl Command {
    pub fn new(operation: Operation, key: impl Into<String>) -> Self {
        Self {
            operation,
            key: key.into(),
            price: None,
        }
    }

    pub fn with_price(mut self, price: Option<BigDecimal>) -> Self {
        self.price = price;
        self
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.operation, self.key)
    }
}

pub fn execute<T, F>(conn: &mut PgConnection, command: &Command, body: F) -> Result<T, WriteError>
where
    F: FnOnce(&mut PgConnection) -> QueryResult<T>,
{
    let isolation = command.operation.isolation();
    let outcome = isolation.begin(conn).run(body);
    match outcome {
        Ok(value) => {
            debug!("{} committed under {}", command, isolation);
            Ok(value)
        }
        Err(e) => {
            let mut signal = BackendSignal::from(&e);
            if let Err(lookup) = classify::refine(conn, command, &mut signal) {
                debug!("could not refine failure of {}: {}", command, lookup);
            }
            let error = classify::classify(command, &signal);
            warn!("{} rolled back under {}: {}", command, isolation, error);
            Err(error)
        }
    }
}
