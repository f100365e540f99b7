use std::str::FromStr;

use bigdecimal::BigDecimal;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Bool, Integer, Nullable, Text};
use diesel::{sql_query, OptionalExtension, PgConnection, QueryResult, QueryableByName, RunQueryDsl};

use crate::error::{Privilege, Reference, WriteError};
use crate::executor::Command;
use crate::validate::Field;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlState {
    UndefinedTable,
    UniqueViolation,
    ForeignKeyViolation,
    NotNullViolation,
    CheckViolation,
    NumericValueOutOfRange,
    SerializationFailure,
    InsufficientPrivilege,
    Other(String),
}

impl SqlState {
    #[cfg(test)]
    fn from_code(code: &str) -> Self {
        match code {
            "42P01" => SqlState::UndefinedTable,
            "23505" => SqlState::UniqueViolation,
            "23503" => SqlState::ForeignKeyViolation,
            "23502" => SqlState::NotNullViolation,
            "23514" => SqlState::CheckViolation,
            "22003" => SqlState::NumericValueOutOfRange,
            "40001" => SqlState::SerializationFailure,
            "42501" => SqlState::InsufficientPrivilege,
            other => SqlState::Other(other.to_string()),
        }
    }

    #[cfg(test)]
    fn code(&self) -> &str {
        match self {
            SqlState::UndefinedTable => "42P01",
            SqlState::UniqueViolation => "23505",
            SqlState::ForeignKeyViolation => "23503",
            SqlState::NotNullViolation => "23502",
            SqlState::CheckViolation => "23514",
            SqlState::NumericValueOutOfRange => "22003",
            SqlState::SerializationFailure => "40001",
            SqlState::InsufficientPrivilege => "42501",
            SqlState::Other(code) => code,
        }
    }
}

/// Structured description of a failed statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendSignal {
    /// `None` when the driver could not tell which condition was raised.
    pub state: Option<SqlState>,
    pub relation: Option<String>,
    pub column: Option<String>,
    pub constraint: Option<String>,
    /// Grant found missing on `relation`, when the catalogue was asked.
    pub privilege: Option<Privilege>,
    pub message: String,
}

#[cfg(test)]
impl BackendSignal {
    fn new(state: SqlState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    fn on_relation(mut self, relation: &str) -> Self {
        self.relation = Some(relation.to_string());
        self
    }

    fn on_column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    fn on_constraint(mut self, constraint: &str) -> Self {
        self.constraint = Some(constraint.to_string());
        self
    }
}

impl From<&DieselError> for BackendSignal {
    fn from(err: &DieselError) -> Self {
        match err {
            DieselError::DatabaseError(kind, info) => Self {
                state: state_of(kind),
                relation: info.table_name().map(str::to_string),
                column: info.column_name().map(str::to_string),
                constraint: info.constraint_name().map(str::to_string),
                privilege: None,
                message: info.message().to_string(),
            },
            other => Self {
                state: None,
                message: other.to_string(),
                ..Default::default()
            },
        }
    }
}

fn state_of(kind: &DatabaseErrorKind) -> Option<SqlState> {
    match kind {
        DatabaseErrorKind::UniqueViolation => Some(SqlState::UniqueViolation),
        DatabaseErrorKind::ForeignKeyViolation => Some(SqlState::ForeignKeyViolation),
        DatabaseErrorKind::NotNullViolation => Some(SqlState::NotNullViolation),
        DatabaseErrorKind::CheckViolation => Some(SqlState::CheckViolation),
        DatabaseErrorKind::SerializationFailure => Some(SqlState::SerializationFailure),
        DatabaseErrorKind::ReadOnlyTransaction => Some(SqlState::Other("25006".to_string())),
        DatabaseErrorKind::ClosedConnection => Some(SqlState::Other("08006".to_string())),
        _ => None,
    }
}

pub fn classify(command: &Command, signal: &BackendSignal) -> WriteError {
    let operation = command.operation;
    let relation = signal.relation.as_deref().unwrap_or(operation.table());

    match &signal.state {
        Some(SqlState::UndefinedTable) => WriteError::UndefinedRelation {
            relation: relation.to_string(),
        },
        Some(SqlState::UniqueViolation) => WriteError::UniqueViolation {
            key: command.key.clone(),
        },
        Some(SqlState::ForeignKeyViolation) => WriteError::ForeignKeyViolation {
            reference: reference_of(signal.constraint.as_deref()),
        },
        Some(SqlState::NotNullViolation) => WriteError::NotNullViolation {
            field: field_name(relation, signal.column.as_deref()),
        },
        Some(SqlState::CheckViolation) => WriteError::CheckViolation {
            field: checked_field(signal.constraint.as_deref()),
        },
        Some(SqlState::NumericValueOutOfRange) => WriteError::NumericOutOfRange {
            field: field_name(relation, Some(signal.column.as_deref().unwrap_or("price"))),
        },
        Some(SqlState::SerializationFailure) => WriteError::SerializationConflict,
        Some(SqlState::InsufficientPrivilege) => WriteError::PermissionDenied {
            table: relation.to_string(),
            privilege: signal
                .privilege
                .unwrap_or_else(|| operation.privilege_on(relation)),
        },
        Some(SqlState::Other(code)) => WriteError::Unclassified {
            code: code.clone(),
            message: signal.message.clone(),
        },
        None => WriteError::Unclassified {
            code: "unknown".to_string(),
            message: signal.message.clone(),
        },
    }
}

fn reference_of(constraint: Option<&str>) -> Reference {
    match constraint {
        Some("movies_id_user_fkey") => Reference::Owner,
        Some("movies_id_studio_fkey") => Reference::Studio,
        _ => Reference::Unknown,
    }
}

fn checked_field(constraint: Option<&str>) -> String {
    match constraint {
        Some("movies_price_check") => Field::Price.name().to_string(),
        Some("movies_rating_check") => Field::Rating.name().to_string(),
        Some(other) => other.to_string(),
        None => "a bounded field".to_string(),
    }
}

fn field_name(relation: &str, column: Option<&str>) -> String {
    let Some(column) = column else {
        return "a required field".to_string();
    };
    let field = match (relation, column) {
        ("studios", "id_studio") => Field::StudioId,
        ("studios", "name") => Field::StudioName,
        ("studios", "origin_country") => Field::OriginCountry,
        ("users", "national_id") => Field::NationalId,
        ("users", "first_name") => Field::FirstName,
        ("users", "surname") => Field::Surname,
        ("users", "phone") => Field::Phone,
        ("movies", "id_movie") => Field::MovieId,
        ("movies", "id_user") => Field::Owner,
        ("movies", "id_studio") => Field::Studio,
        ("movies", "title") => Field::Title,
        ("movies", "price") => Field::Price,
        ("movies", "duration_minutes") => Field::Duration,
        ("movies", "release_date") => Field::ReleaseDate,
        ("movies", "genre") => Field::Genre,
        ("movies", "rating") => Field::Rating,
        _ => return column.to_string(),
    };
    field.name().to_string()
}

#[derive(QueryableByName)]
struct RelationAccess {
    #[diesel(sql_type = Bool)]
    present: bool,
    #[diesel(sql_type = Bool)]
    granted: bool,
}

#[derive(QueryableByName)]
struct NumericBounds {
    #[diesel(sql_type = Nullable<Integer>)]
    numeric_precision: Option<i32>,
    #[diesel(sql_type = Nullable<Integer>)]
    numeric_scale: Option<i32>,
}

impl NumericBounds {
    /// Largest magnitude a `numeric(p, s)` column accepts, with its scale.
    fn limit(&self) -> Option<(BigDecimal, i64)> {
        let precision = usize::try_from(self.numeric_precision?).ok()?;
        let scale = usize::try_from(self.numeric_scale.unwrap_or(0)).ok()?;
        let whole = precision.checked_sub(scale)?;
        let integral = if whole == 0 { "0".to_string() } else { "9".repeat(whole) };
        let text = if scale == 0 {
            integral
        } else {
            format!("{}.{}", integral, "9".repeat(scale))
        };
        let max = BigDecimal::from_str(&text).ok()?;
        Some((max, scale as i64))
    }
}

/// Fills in the condition for failures diesel reports without a kind.
///
/// Runs after the rollback and only reads the catalogue. Each grant the
/// operation needs is checked in order, and the first relation that is
/// missing or not granted is recorded. Otherwise the attempted price is
/// compared with the declared precision of `movies.price`.
pub fn refine(conn: &mut PgConnection, command: &Command, signal: &mut BackendSignal) -> QueryResult<()> {
    if signal.state.is_some() {
        return Ok(());
    }

    for &(table, privilege) in command.operation.required_grants() {
        let access: RelationAccess = sql_query(
            "SELECT to_regclass($1) IS NOT NULL AS present, \
             COALESCE(has_table_privilege(to_regclass($1)::oid, $2), false) AS granted",
        )
        .bind::<Text, _>(table)
        .bind::<Text, _>(privilege.as_str())
        .get_result(conn)?;

        if !access.present {
            signal.state = Some(SqlState::UndefinedTable);
            signal.relation = Some(table.to_string());
            return Ok(());
        }
        if !access.granted {
            signal.state = Some(SqlState::InsufficientPrivilege);
            signal.relation = Some(table.to_string());
            signal.privilege = Some(privilege);
            return Ok(());
        }
    }

    let Some(price) = &command.price else {
        return Ok(());
    };
    let bounds: Option<NumericBounds> = sql_query(
        "SELECT numeric_precision::int4 AS numeric_precision, numeric_scale::int4 AS numeric_scale \
         FROM information_schema.columns \
         WHERE table_name = 'movies' AND column_name = 'price'",
    )
    .get_result(conn)
    .optional()?;

    if let Some((max, scale)) = bounds.as_ref().and_then(NumericBounds::limit) {
        if price.abs().round(scale) > max {
            signal.state = Some(SqlState::NumericValueOutOfRange);
            signal.relation = Some("movies".to_string());
            signal.column = Some("price".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Operation;

    fn insert_movie() -> Command {
        Command::new(Operation::InsertMovie, "movie 9")
    }

    #[test]
    fn maps_every_known_sqlstate() {
        let cases = [
            ("42P01", SqlState::UndefinedTable),
            ("23505", SqlState::UniqueViolation),
            ("23503", SqlState::ForeignKeyViolation),
            ("23502", SqlState::NotNullViolation),
            ("23514", SqlState::CheckViolation),
            ("22003", SqlState::NumericValueOutOfRange),
            ("40001", SqlState::SerializationFailure),
            ("42501", SqlState::InsufficientPrivilege),
        ];
        for (code, state) in cases {
            assert_eq!(SqlState::from_code(code), state);
            assert_eq!(state.code(), code);
        }
        assert_eq!(SqlState::from_code("57014"), SqlState::Other("57014".to_string()));
    }

    #[test]
    fn unique_violation_reports_the_key() {
        let command = Command::new(Operation::InsertStudio, "studio 7");
        let signal = BackendSignal::new(SqlState::UniqueViolation).on_relation("studios");
        assert_eq!(
            classify(&command, &signal),
            WriteError::UniqueViolation {
                key: "studio 7".to_string()
            }
        );
    }

    #[test]
    fn foreign_key_violation_names_the_missing_reference() {
        let owner = BackendSignal::new(SqlState::ForeignKeyViolation).on_constraint("movies_id_user_fkey");
        let studio = BackendSignal::new(SqlState::ForeignKeyViolation).on_constraint("movies_id_studio_fkey");
        let unnamed = BackendSignal::new(SqlState::ForeignKeyViolation);

        assert_eq!(
            classify(&insert_movie(), &owner),
            WriteError::ForeignKeyViolation {
                reference: Reference::Owner
            }
        );
        assert_eq!(
            classify(&insert_movie(), &studio),
            WriteError::ForeignKeyViolation {
                reference: Reference::Studio
            }
        );
        assert_eq!(
            classify(&insert_movie(), &unnamed),
            WriteError::ForeignKeyViolation {
                reference: Reference::Unknown
            }
        );
    }

    #[test]
    fn not_null_violation_disambiguates_by_column() {
        let cases = [
            ("movies", "id_user", "owner"),
            ("movies", "id_studio", "studio"),
            ("movies", "price", "price"),
            ("studios", "id_studio", "studio id"),
            ("studios", "name", "studio name"),
            ("users", "surname", "surname"),
            ("users", "nickname", "nickname"),
        ];
        for (relation, column, field) in cases {
            let signal = BackendSignal::new(SqlState::NotNullViolation)
                .on_relation(relation)
                .on_column(column);
            assert_eq!(
                classify(&insert_movie(), &signal),
                WriteError::NotNullViolation {
                    field: field.to_string()
                },
                "{relation}.{column}"
            );
        }
    }

    #[test]
    fn not_null_violation_uses_operation_table_without_relation() {
        let signal = BackendSignal::new(SqlState::NotNullViolation).on_column("phone");
        let command = Command::new(Operation::InsertUser, "user 12345678Z");
        assert_eq!(
            classify(&command, &signal),
            WriteError::NotNullViolation {
                field: "phone".to_string()
            }
        );
    }

    #[test]
    fn check_and_range_violations_point_at_price() {
        let check = BackendSignal::new(SqlState::CheckViolation).on_constraint("movies_price_check");
        assert_eq!(
            classify(&insert_movie(), &check),
            WriteError::CheckViolation {
                field: "price".to_string()
            }
        );

        let range = BackendSignal::new(SqlState::NumericValueOutOfRange);
        assert_eq!(
            classify(&insert_movie(), &range),
            WriteError::NumericOutOfRange {
                field: "price".to_string()
            }
        );
    }

    #[test]
    fn permission_denied_carries_table_and_privilege() {
        let command = Command::new(Operation::DeleteMovie, "movie 4");
        let signal = BackendSignal::new(SqlState::InsufficientPrivilege);
        assert_eq!(
            classify(&command, &signal),
            WriteError::PermissionDenied {
                table: "movies".to_string(),
                privilege: Privilege::Delete
            }
        );
    }

    #[test]
    fn permission_denied_reports_the_grant_found_missing() {
        let command = Command::new(Operation::DecreasePrice, "movie 4");
        let mut signal = BackendSignal::new(SqlState::InsufficientPrivilege).on_relation("movies");
        signal.privilege = Some(Privilege::Select);
        assert_eq!(
            classify(&command, &signal),
            WriteError::PermissionDenied {
                table: "movies".to_string(),
                privilege: Privilege::Select
            }
        );

        let command = Command::new(Operation::ListMoviesForUser, "user 12345678Z");
        let signal = BackendSignal::new(SqlState::InsufficientPrivilege).on_relation("users");
        assert_eq!(
            classify(&command, &signal),
            WriteError::PermissionDenied {
                table: "users".to_string(),
                privilege: Privilege::Select
            }
        );
    }

    #[test]
    fn serialization_failure_is_a_conflict() {
        let command = Command::new(Operation::DecreasePrice, "movie 4");
        let signal = BackendSignal::new(SqlState::SerializationFailure);
        let error = classify(&command, &signal);
        assert_eq!(error, WriteError::SerializationConflict);
        assert!(error.is_retryable());
    }

    #[test]
    fn undefined_relation_falls_back_to_operation_table() {
        let command = Command::new(Operation::InsertUser, "user 00000000T");
        let signal = BackendSignal::new(SqlState::UndefinedTable);
        assert_eq!(
            classify(&command, &signal),
            WriteError::UndefinedRelation {
                relation: "users".to_string()
            }
        );
    }

    #[test]
    fn unknown_signals_stay_unclassified() {
        let mut signal = BackendSignal::new(SqlState::Other("57014".to_string()));
        signal.message = "canceling statement due to user request".to_string();
        assert_eq!(
            classify(&insert_movie(), &signal),
            WriteError::Unclassified {
                code: "57014".to_string(),
                message: "canceling statement due to user request".to_string()
            }
        );

        let signal = BackendSignal::from(&DieselError::NotFound);
        assert!(matches!(
            classify(&insert_movie(), &signal),
            WriteError::Unclassified { code, .. } if code == "unknown"
        ));
    }

    #[test]
    fn numeric_bounds_follow_precision_and_scale() {
        let bounds = NumericBounds {
            numeric_precision: Some(8),
            numeric_scale: Some(2),
        };
        assert_eq!(
            bounds.limit(),
            Some((BigDecimal::from_str("999999.99").unwrap(), 2))
        );

        let integral = NumericBounds {
            numeric_precision: Some(3),
            numeric_scale: Some(0),
        };
        assert_eq!(integral.limit(), Some((BigDecimal::from(999), 0)));

        let unbounded = NumericBounds {
            numeric_precision: None,
            numeric_scale: None,
        };
        assert_eq!(unbounded.limit(), None);
    }
}
