use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use diesel::PgConnection;
use env_logger::Env;
use serde::Serialize;

use movie_records::db::{self, PriceChange, RowOutcome};
use movie_records::error::ErrorReport;
use movie_records::model::{
    MovieDetails, MovieSummary, MovieUpdate, NewMovie, NewStudio, NewUser, RatedMovie, Studio,
    User,
};
use movie_records::validate::{parse_number, parse_release_date, Field};
use movie_records::{build_pool, Settings};

/// Maintain studios, users and movies.
#[derive(Parser)]
#[command(name = "movie-records")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a studio
    InsertStudio {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        country: String,
    },

    /// Add a user
    InsertUser {
        #[arg(long)]
        national_id: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        surname: String,
        #[arg(long)]
        phone: String,
    },

    /// Add a movie owned by an existing user and studio
    InsertMovie {
        #[arg(long)]
        id: String,
        /// National ID of the owning user
        #[arg(long)]
        owner: String,
        #[arg(long)]
        studio: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        price: String,
        /// Duration in minutes
        #[arg(long)]
        duration: String,
        /// dd-mm-yyyy
        #[arg(long)]
        release_date: String,
        #[arg(long)]
        genre: String,
    },

    /// Show one movie, including its rating
    ShowMovie { id: String },

    /// List the movies owned by a user
    ListMovies { national_id: String },

    /// Change title, release date or price; omitted fields are kept
    UpdateMovie {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        release_date: Option<String>,
        #[arg(long)]
        price: Option<String>,
    },

    /// Delete a movie
    DeleteMovie { id: String },

    /// Lower a movie's price by a percentage (0-100)
    DecreasePrice {
        id: String,
        #[arg(long)]
        percent: Option<String>,
    },

    /// Rate a movie from 1 to 5
    RateMovie {
        id: String,
        #[arg(long)]
        rating: String,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
enum Output {
    Studio(Studio),
    User(User),
    Movie(Option<MovieDetails>),
    Movies(Vec<MovieSummary>),
    Row(RowOutcome),
    Price(PriceChange),
    Rating(Option<RatedMovie>),
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let settings = Settings::load().context("Failed to load settings.")?;
    env_logger::init_from_env(Env::default().default_filter_or(settings.log_level.as_str()));

    let pool = build_pool(&settings).context("Failed to create pool.")?;
    let mut conn = pool.get().context("Couldn't get db connection from pool.")?;

    match run(&mut conn, cli.command) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&ErrorReport::from(&e))?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run(conn: &mut PgConnection, command: Commands) -> movie_records::Result<Output> {
    let output = match command {
        Commands::InsertStudio { id, name, country } => {
            let studio = NewStudio {
                id_studio: parse_number(Field::StudioId, &id)?,
                name,
                origin_country: country,
            };
            Output::Studio(db::insert_studio(conn, studio)?)
        }
        Commands::InsertUser {
            national_id,
            first_name,
            surname,
            phone,
        } => {
            let user = NewUser {
                national_id,
                first_name,
                surname,
                phone: parse_number(Field::Phone, &phone)?,
            };
            Output::User(db::insert_user(conn, user)?)
        }
        Commands::InsertMovie {
            id,
            owner,
            studio,
            title,
            price,
            duration,
            release_date,
            genre,
        } => {
            let movie = NewMovie {
                id_movie: parse_number(Field::MovieId, &id)?,
                owner,
                id_studio: parse_number(Field::Studio, &studio)?,
                title,
                price: parse_number(Field::Price, &price)?,
                duration_minutes: parse_number(Field::Duration, &duration)?,
                release_date: parse_release_date(&release_date)?,
                genre,
            };
            Output::Movie(Some(db::insert_movie(conn, movie)?))
        }
        Commands::ShowMovie { id } => {
            let id = parse_number(Field::MovieId, &id)?;
            let movie = db::show_movie(conn, id)?;
            if movie.is_none() {
                log::info!("movie {id} does not exist");
            }
            Output::Movie(movie)
        }
        Commands::ListMovies { national_id } => {
            Output::Movies(db::list_movies_for_user(conn, &national_id)?)
        }
        Commands::UpdateMovie {
            id,
            title,
            release_date,
            price,
        } => {
            let update = MovieUpdate {
                title,
                release_date: release_date.as_deref().map(parse_release_date).transpose()?,
                price: price
                    .as_deref()
                    .map(|price| parse_number(Field::Price, price))
                    .transpose()?,
            };
            Output::Row(db::update_movie(conn, parse_number(Field::MovieId, &id)?, update)?)
        }
        Commands::DeleteMovie { id } => {
            Output::Row(db::delete_movie(conn, parse_number(Field::MovieId, &id)?)?)
        }
        Commands::DecreasePrice { id, percent } => {
            let percent = percent
                .as_deref()
                .map(|percent| parse_number(Field::Percent, percent))
                .transpose()?;
            Output::Price(db::decrease_price(
                conn,
                parse_number(Field::MovieId, &id)?,
                percent,
            )?)
        }
        Commands::RateMovie { id, rating } => {
            let id = parse_number(Field::MovieId, &id)?;
            let rating = parse_number(Field::Rating, &rating)?;
            Output::Rating(db::rate_movie(conn, id, rating)?)
        }
    };
    Ok(output)
}
