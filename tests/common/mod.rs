#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::{Connection, ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use movie_records::db;
use movie_records::model::{NewMovie, NewStudio, NewUser};
use movie_records::schema::{movies, studios, users};
use movie_records::validate::check_letter;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static MIGRATE: Once = Once::new();
static NEXT: AtomicU32 = AtomicU32::new(0);

pub fn database_url() -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

/// Set to make a missing database fail the run instead of skipping it.
pub const REQUIRED_FLAG: &str = "TEST_DATABASE_REQUIRED";

pub fn configured_url(url: Option<String>, required: bool) -> Option<String> {
    if url.is_none() && required {
        panic!("{REQUIRED_FLAG} is set but TEST_DATABASE_URL is not");
    }
    url
}

/// `None` when no database is configured and none is required; callers
/// return early.
pub fn connect() -> Option<PgConnection> {
    let required = std::env::var_os(REQUIRED_FLAG).is_some();
    let Some(url) = configured_url(database_url(), required) else {
        eprintln!("TEST_DATABASE_URL is not set, skipping database test");
        return None;
    };
    let mut conn = PgConnection::establish(&url).expect("Couldn't connect to the test database.");
    MIGRATE.call_once(|| {
        conn.run_pending_migrations(MIGRATIONS)
            .expect("Failed to run migrations.");
    });
    Some(conn)
}

/// Number unlikely to collide with other tests or earlier runs.
pub fn unique_number() -> u32 {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let counter = NEXT.fetch_add(1, Ordering::Relaxed);
    (((seconds % 100_000) as u32) * 1_000 + std::process::id() % 1_000 + counter * 7_919)
        % 100_000_000
}

pub fn national_id(prefix: u32) -> String {
    format!("{prefix:08}{}", check_letter(prefix))
}

pub struct Fixture {
    pub studio: i64,
    pub owner: String,
    pub movies: Vec<i64>,
}

impl Fixture {
    pub fn seed(conn: &mut PgConnection) -> Self {
        let n = unique_number();
        let studio = i64::from(n);
        let owner = national_id(n);

        db::insert_studio(
            conn,
            NewStudio {
                id_studio: studio,
                name: "Ghibli".to_string(),
                origin_country: "Japan".to_string(),
            },
        )
        .expect("seed studio");
        db::insert_user(
            conn,
            NewUser {
                national_id: owner.clone(),
                first_name: "Ana".to_string(),
                surname: "García".to_string(),
                phone: 612_345_678,
            },
        )
        .expect("seed user");

        Self {
            studio,
            owner,
            movies: Vec::new(),
        }
    }

    pub fn new_movie(&mut self, price: &str) -> NewMovie {
        let id = i64::from(unique_number()) * 10 + self.movies.len() as i64;
        self.movies.push(id);
        NewMovie {
            id_movie: id,
            owner: self.owner.clone(),
            id_studio: self.studio,
            title: "Spirited Away".to_string(),
            price: price.parse().unwrap(),
            duration_minutes: 125,
            release_date: NaiveDate::from_ymd_opt(2001, 7, 20).unwrap(),
            genre: "Animation".to_string(),
        }
    }

    pub fn add_movie(&mut self, conn: &mut PgConnection, price: &str) -> i64 {
        let movie = self.new_movie(price);
        let id = movie.id_movie;
        db::insert_movie(conn, movie).expect("seed movie");
        id
    }

    pub fn cleanup(&self, conn: &mut PgConnection) {
        diesel::delete(movies::table.filter(movies::id_movie.eq_any(self.movies.clone())))
            .execute(conn)
            .expect("cleanup movies");
        diesel::delete(movies::table.filter(movies::id_user.eq(&self.owner)))
            .execute(conn)
            .expect("cleanup owned movies");
        diesel::delete(users::table.find(&self.owner))
            .execute(conn)
            .expect("cleanup user");
        diesel::delete(studios::table.find(self.studio))
            .execute(conn)
            .expect("cleanup studio");
    }
}

pub fn price_of(conn: &mut PgConnection, id: i64) -> BigDecimal {
    movies::table
        .find(id)
        .select(movies::price)
        .first(conn)
        .expect("movie price")
}

pub fn decimal(text: &str) -> BigDecimal {
    text.parse().unwrap()
}
