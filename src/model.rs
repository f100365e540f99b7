use std::fmt;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::{AsChangeset, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize, Serializer};

use crate::schema::*;
use crate::validate::{self, Field, Validated};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = studios)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Studio {
    pub id_studio: i64,
    pub name: String,
    pub origin_country: String,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub national_id: String,
    pub first_name: String,
    pub surname: String,
    pub phone: i32,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = movies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Movie {
    pub id_movie: i64,
    pub id_user: String,
    pub id_studio: i64,
    pub title: String,
    pub price: BigDecimal,
    pub duration_minutes: i32,
    pub release_date: NaiveDate,
    pub genre: String,
    pub rating: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = movies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MovieSummary {
    pub id_movie: i64,
    pub title: String,
    pub price: BigDecimal,
}

/// Only the `Some` fields are written; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = movies)]
pub struct MovieChanges {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub price: Option<BigDecimal>,
}

impl MovieChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.release_date.is_none() && self.price.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Unrated,
    Stars(i16),
}

impl From<Option<i16>> for Rating {
    fn from(value: Option<i16>) -> Self {
        value.map(Rating::Stars).unwrap_or(Rating::Unrated)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Unrated => f.write_str("unrated"),
            Rating::Stars(stars) => write!(f, "{stars}/5"),
        }
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rating::Unrated => serializer.serialize_str("unrated"),
            Rating::Stars(stars) => serializer.serialize_i16(*stars),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieDetails {
    pub id_movie: i64,
    pub owner: String,
    pub studio: i64,
    pub title: String,
    pub price: BigDecimal,
    pub duration_minutes: i32,
    pub release_date: NaiveDate,
    pub genre: String,
    pub rating: Rating,
}

impl From<Movie> for MovieDetails {
    fn from(movie: Movie) -> Self {
        Self {
            id_movie: movie.id_movie,
            owner: movie.id_user,
            studio: movie.id_studio,
            title: movie.title,
            price: movie.price,
            duration_minutes: movie.duration_minutes,
            release_date: movie.release_date,
            genre: movie.genre,
            rating: movie.rating.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedMovie {
    pub id_movie: i64,
    pub title: String,
    pub rating: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudio {
    pub id_studio: i64,
    pub name: String,
    pub origin_country: String,
}

impl NewStudio {
    pub fn validate(self) -> Validated<Studio> {
        Ok(Studio {
            id_studio: self.id_studio,
            name: validate::bounded_text(Field::StudioName, &self.name, validate::STUDIO_NAME_MAX)?,
            origin_country: validate::bounded_text(
                Field::OriginCountry,
                &self.origin_country,
                validate::ORIGIN_COUNTRY_MAX,
            )?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub national_id: String,
    pub first_name: String,
    pub surname: String,
    pub phone: i64,
}

impl NewUser {
    pub fn validate(self) -> Validated<User> {
        Ok(User {
            national_id: validate::national_id(&self.national_id)?,
            first_name: validate::bounded_text(
                Field::FirstName,
                &self.first_name,
                validate::FIRST_NAME_MAX,
            )?,
            surname: validate::bounded_text(Field::Surname, &self.surname, validate::SURNAME_MAX)?,
            phone: validate::phone(self.phone)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMovie {
    pub id_movie: i64,
    pub owner: String,
    pub id_studio: i64,
    pub title: String,
    pub price: BigDecimal,
    pub duration_minutes: i32,
    pub release_date: NaiveDate,
    pub genre: String,
}

impl NewMovie {
    pub fn validate(self) -> Validated<Movie> {
        Ok(Movie {
            id_movie: self.id_movie,
            id_user: validate::national_id(&self.owner)?,
            id_studio: self.id_studio,
            title: validate::bounded_text(Field::Title, &self.title, validate::TITLE_MAX)?,
            price: self.price,
            duration_minutes: self.duration_minutes,
            release_date: self.release_date,
            genre: validate::bounded_text(Field::Genre, &self.genre, validate::GENRE_MAX)?,
            rating: None,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub price: Option<BigDecimal>,
}

impl MovieUpdate {
    pub fn validate(self) -> Validated<MovieChanges> {
        let title = self
            .title
            .map(|title| validate::bounded_text(Field::Title, &title, validate::TITLE_MAX))
            .transpose()?;
        Ok(MovieChanges {
            title,
            release_date: self.release_date,
            price: self.price,
        })
    }
}
