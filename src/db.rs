use bigdecimal::BigDecimal;
use diesel::dsl::{exists, select};
use diesel::{ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl, SelectableHelper};
use serde::Serialize;

use crate::error::Result;
use crate::executor::{execute, Command, Operation};
use crate::model::{
    Movie, MovieDetails, MovieSummary, MovieUpdate, NewMovie, NewStudio, NewUser, RatedMovie,
    Studio, User,
};
use crate::schema::{movies, studios, users};
use crate::validate;

/// Result of a write that targets one row by primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    Applied,
    NotFound,
    Unchanged,
}

impl RowOutcome {
    fn from_rows(rows: usize) -> Self {
        if rows == 0 {
            RowOutcome::NotFound
        } else {
            RowOutcome::Applied
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PriceChange {
    Decreased { price: BigDecimal },
    NotFound,
    Unchanged,
}

fn movie_key(id: i64) -> String {
    format!("movie {id}")
}

pub fn insert_studio(conn: &mut PgConnection, new_studio: NewStudio) -> Result<Studio> {
    let studio = new_studio.validate()?;
    let command = Command::new(
        Operation::InsertStudio,
        format!("studio {}", studio.id_studio),
    );

    execute(conn, &command, |conn| {
        diesel::insert_into(studios::table)
            .values(&studio)
            .execute(conn)
    })?;

    log::info!("studio {} added", studio.id_studio);
    Ok(studio)
}

pub fn insert_user(conn: &mut PgConnection, new_user: NewUser) -> Result<User> {
    let user = new_user.validate()?;
    let command = Command::new(Operation::InsertUser, format!("user {}", user.national_id));

    execute(conn, &command, |conn| {
        diesel::insert_into(users::table).values(&user).execute(conn)
    })?;

    log::info!("user {} added", user.national_id);
    Ok(user)
}

pub fn insert_movie(conn: &mut PgConnection, new_movie: NewMovie) -> Result<MovieDetails> {
    let movie = new_movie.validate()?;
    let command = Command::new(Operation::InsertMovie, movie_key(movie.id_movie))
        .with_price(Some(movie.price.clone()));

    execute(conn, &command, |conn| {
        diesel::insert_into(movies::table).values(&movie).execute(conn)
    })?;

    log::info!("movie {} added", movie.id_movie);
    Ok(movie.into())
}

/// Point read; `None` means there is no such movie.
pub fn show_movie(conn: &mut PgConnection, id: i64) -> Result<Option<MovieDetails>> {
    let command = Command::new(Operation::ShowMovie, movie_key(id));

    let movie = execute(conn, &command, |conn| {
        movies::table
            .find(id)
            .select(Movie::as_select())
            .first(conn)
            .optional()
    })?;

    Ok(movie.map(MovieDetails::from))
}

/// Title lookup for callers that show the movie before asking for a rating.
pub fn movie_title(conn: &mut PgConnection, id: i64) -> Result<Option<String>> {
    let command = Command::new(Operation::ShowMovie, movie_key(id));

    let title = execute(conn, &command, |conn| {
        movies::table
            .find(id)
            .select(movies::title)
            .first(conn)
            .optional()
    })?;

    Ok(title)
}

pub fn list_movies_for_user(
    conn: &mut PgConnection,
    national_id: &str,
) -> Result<Vec<MovieSummary>> {
    let national_id = validate::national_id(national_id)?;
    let command = Command::new(Operation::ListMoviesForUser, format!("user {national_id}"));

    let rows = execute(conn, &command, |conn| {
        movies::table
            .inner_join(users::table)
            .filter(users::national_id.eq(&national_id))
            .order(movies::id_movie)
            .select(MovieSummary::as_select())
            .load(conn)
    })?;

    Ok(rows)
}

/// Writes only the fields present in `update`; omitted fields keep their
/// stored value. Runs as a single statement.
pub fn update_movie(conn: &mut PgConnection, id: i64, update: MovieUpdate) -> Result<RowOutcome> {
    let changes = update.validate()?;
    let command =
        Command::new(Operation::UpdateMovie, movie_key(id)).with_price(changes.price.clone());

    let outcome = execute(conn, &command, |conn| {
        if changes.is_empty() {
            let found = select(exists(movies::table.find(id))).get_result::<bool>(conn)?;
            return Ok(if found {
                RowOutcome::Unchanged
            } else {
                RowOutcome::NotFound
            });
        }
        diesel::update(movies::table.find(id))
            .set(&changes)
            .execute(conn)
            .map(RowOutcome::from_rows)
    })?;

    log::info!("update of movie {id}: {outcome:?}");
    Ok(outcome)
}

/// Deleting a missing movie is reported as `NotFound`, not as an error.
pub fn delete_movie(conn: &mut PgConnection, id: i64) -> Result<RowOutcome> {
    let command = Command::new(Operation::DeleteMovie, movie_key(id));

    let outcome = execute(conn, &command, |conn| {
        diesel::delete(movies::table.find(id))
            .execute(conn)
            .map(RowOutcome::from_rows)
    })?;

    log::info!("delete of movie {id}: {outcome:?}");
    Ok(outcome)
}

/// Lowers the price by `percent` in one serializable statement.
///
/// A concurrent decrement of the same movie makes one of the two fail with
/// [`WriteError::SerializationConflict`](crate::error::WriteError); the
/// caller must re-read the movie and decide again before retrying. A missing
/// percentage is a no-op that never reaches storage.
pub fn decrease_price(
    conn: &mut PgConnection,
    id: i64,
    percent: Option<BigDecimal>,
) -> Result<PriceChange> {
    let Some(percent) = validate::percent(percent)? else {
        return Ok(PriceChange::Unchanged);
    };
    let command = Command::new(Operation::DecreasePrice, movie_key(id));

    let price = execute(conn, &command, |conn| {
        diesel::update(movies::table.find(id))
            .set(
                movies::price
                    .eq(movies::price - movies::price * percent / BigDecimal::from(100)),
            )
            .returning(movies::price)
            .get_result::<BigDecimal>(conn)
            .optional()
    })?;

    Ok(match price {
        Some(price) => {
            log::info!("price of movie {id} lowered to {price}");
            PriceChange::Decreased { price }
        }
        None => PriceChange::NotFound,
    })
}

/// Validates the rating, then stores it and reads back the title in the
/// same statement. `None` means there is no such movie.
pub fn rate_movie(conn: &mut PgConnection, id: i64, rating: i64) -> Result<Option<RatedMovie>> {
    let rating = validate::rating(rating)?;
    let command = Command::new(Operation::RateMovie, movie_key(id));

    let title = execute(conn, &command, |conn| {
        diesel::update(movies::table.find(id))
            .set(movies::rating.eq(rating))
            .returning(movies::title)
            .get_result::<String>(conn)
            .optional()
    })?;

    Ok(title.map(|title| RatedMovie {
        id_movie: id,
        title,
        rating,
    }))
}
