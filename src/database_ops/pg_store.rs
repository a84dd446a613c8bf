use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, PgConnection, Postgres, QueryBuilder, Row};
use tracing::{debug, instrument};

use crate::database_ops::db::Db;
use crate::database_ops::store::{HolidayFilter, HolidayStore, PageRequest, ScopePlan, ScopePlanner};
use crate::error::StoreError;
use crate::model::{Country, Holiday, NewCountry};

const HOLIDAY_COLUMNS: &str = "h.holiday_id, h.holiday_date, h.holiday_local_name, h.holiday_name, \
     h.fixed, h.global, h.counties, h.holiday_launch_year, h.holiday_types, \
     c.country_id, c.country_code, c.country_name";

/// `HolidayStore` over the `country` / `country_holiday` tables.
#[derive(Clone)]
pub struct PgHolidayStore {
    db: Db,
}

impl PgHolidayStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn country_from_row(r: &PgRow) -> Result<Country, sqlx::Error> {
    Ok(Country {
        id: r.try_get("country_id")?,
        code: r.try_get("country_code")?,
        name: r.try_get("country_name")?,
    })
}

fn holiday_from_row(r: &PgRow) -> Result<Holiday, sqlx::Error> {
    Ok(Holiday {
        id: Some(r.try_get("holiday_id")?),
        date: r.try_get("holiday_date")?,
        local_name: r.try_get("holiday_local_name")?,
        name: r.try_get("holiday_name")?,
        country: country_from_row(r)?,
        fixed: r.try_get("fixed")?,
        global: r.try_get("global")?,
        counties: r.try_get("counties")?,
        launch_year: r.try_get("holiday_launch_year")?,
        types: r.try_get("holiday_types")?,
    })
}

async fn save_one(conn: &mut PgConnection, mut h: Holiday) -> Result<Holiday, StoreError> {
    match h.id {
        Some(id) => {
            let updated = sqlx::query(
                "UPDATE country_holiday SET holiday_date = $2, holiday_local_name = $3, \
                 holiday_name = $4, fixed = $5, global = $6, counties = $7, \
                 holiday_launch_year = $8, holiday_types = $9, updated_at = now() \
                 WHERE holiday_id = $1",
            )
            .bind(id)
            .bind(h.date)
            .bind(&h.local_name)
            .bind(&h.name)
            .bind(h.fixed)
            .bind(h.global)
            .bind(&h.counties)
            .bind(h.launch_year)
            .bind(&h.types)
            .execute(&mut *conn)
            .await?
            .rows_affected();
            if updated != 1 {
                return Err(StoreError::Conflict(format!("holiday {id} does not exist")));
            }
        }
        None => {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO country_holiday (holiday_date, holiday_local_name, holiday_name, \
                 country_id, fixed, global, counties, holiday_launch_year, holiday_types) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING holiday_id",
            )
            .bind(h.date)
            .bind(&h.local_name)
            .bind(&h.name)
            .bind(h.country.id)
            .bind(h.fixed)
            .bind(h.global)
            .bind(&h.counties)
            .bind(h.launch_year)
            .bind(&h.types)
            .fetch_one(&mut *conn)
            .await
            .map_err(unique_as_conflict)?;
            h.id = Some(id);
        }
    }
    Ok(h)
}

/// A concurrent insert of the same identity key surfaces as a conflict.
fn unique_as_conflict(e: sqlx::Error) -> StoreError {
    let clash = e
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .map(|db| db.message().to_string());
    match clash {
        Some(msg) => StoreError::Conflict(msg),
        None => StoreError::Db(e),
    }
}

async fn holidays_in_range(
    conn: &mut PgConnection,
    country_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Holiday>, StoreError> {
    let sql = format!(
        "SELECT {HOLIDAY_COLUMNS} FROM country_holiday h \
         JOIN country c ON c.country_id = h.country_id \
         WHERE h.country_id = $1 AND h.holiday_date BETWEEN $2 AND $3 \
         ORDER BY h.holiday_date, h.holiday_id"
    );
    let rows = sqlx::query(&sql)
        .bind(country_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(holiday_from_row).collect::<Result<_, _>>()?)
}

async fn apply_changes(
    conn: &mut PgConnection,
    delete_ids: &[i64],
    saves: Vec<Holiday>,
) -> Result<Vec<Holiday>, StoreError> {
    if !delete_ids.is_empty() {
        let deleted = sqlx::query("DELETE FROM country_holiday WHERE holiday_id = ANY($1)")
            .bind(delete_ids)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        if deleted != delete_ids.len() as u64 {
            return Err(StoreError::Conflict(format!(
                "deleted {deleted} of {} holidays",
                delete_ids.len()
            )));
        }
    }
    let mut saved = Vec::with_capacity(saves.len());
    for h in saves {
        saved.push(save_one(&mut *conn, h).await?);
    }
    Ok(saved)
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &HolidayFilter) {
    qb.push(" WHERE h.country_id = ")
        .push_bind(filter.country_id)
        .push(" AND h.holiday_date BETWEEN ")
        .push_bind(filter.start)
        .push(" AND ")
        .push_bind(filter.end);
    if !filter.types.is_empty() {
        let patterns: Vec<String> = filter
            .types
            .iter()
            .map(|t| format!("%{}%", t.as_str()))
            .collect();
        qb.push(" AND h.holiday_types ILIKE ANY(")
            .push_bind(patterns)
            .push(")");
    }
}

#[async_trait]
impl HolidayStore for PgHolidayStore {
    async fn list_countries(&self) -> Result<Vec<Country>, StoreError> {
        let rows = sqlx::query(
            "SELECT country_id, country_code, country_name FROM country ORDER BY country_code",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.iter().map(country_from_row).collect::<Result<_, _>>()?)
    }

    async fn find_country_by_code(&self, code: &str) -> Result<Option<Country>, StoreError> {
        let row = sqlx::query(
            "SELECT country_id, country_code, country_name FROM country WHERE country_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.as_ref().map(country_from_row).transpose()?)
    }

    async fn count_countries(&self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM country")
            .fetch_one(&self.db.pool)
            .await?)
    }

    #[instrument(skip_all, fields(count = countries.len()))]
    async fn replace_countries(&self, countries: &[NewCountry]) -> Result<usize, StoreError> {
        let mut tx = self.db.pool.begin().await?;
        if !countries.is_empty() {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO country (country_code, country_name) ");
            qb.push_values(countries, |mut b, c| {
                b.push_bind(&c.code).push_bind(&c.name);
            });
            qb.push(
                " ON CONFLICT (country_code) DO UPDATE SET country_name = EXCLUDED.country_name, \
                 updated_at = now() WHERE country.country_name IS DISTINCT FROM EXCLUDED.country_name",
            );
            qb.build().execute(&mut *tx).await?;
        }
        let codes: Vec<&str> = countries.iter().map(|c| c.code.as_str()).collect();
        // Fails on the RESTRICT foreign key while a dropped country owns holidays.
        let removed = sqlx::query("DELETE FROM country WHERE NOT (country_code = ANY($1))")
            .bind(&codes)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        debug!(removed, upserted = countries.len(), "country table replaced");
        Ok(countries.len())
    }

    async fn find_by_country_and_date_range(
        &self,
        country: &Country,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Holiday>, StoreError> {
        let mut conn = self.db.pool.acquire().await?;
        holidays_in_range(&mut *conn, country.id, start, end).await
    }

    async fn delete_by_country_and_date_range(
        &self,
        country: &Country,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u64, StoreError> {
        let res = sqlx::query(
            "DELETE FROM country_holiday WHERE country_id = $1 AND holiday_date BETWEEN $2 AND $3",
        )
        .bind(country.id)
        .bind(start)
        .bind(end)
        .execute(&self.db.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn save_all(&self, holidays: Vec<Holiday>) -> Result<Vec<Holiday>, StoreError> {
        self.apply_scope_changes(&[], holidays).await
    }

    #[instrument(skip_all, fields(deletes = delete_ids.len(), saves = saves.len()))]
    async fn apply_scope_changes(
        &self,
        delete_ids: &[i64],
        saves: Vec<Holiday>,
    ) -> Result<Vec<Holiday>, StoreError> {
        // Dropping `tx` on an early return rolls the whole scope back.
        let mut tx = self.db.pool.begin().await?;
        let saved = apply_changes(&mut *tx, delete_ids, saves).await?;
        tx.commit().await?;
        Ok(saved)
    }

    #[instrument(skip_all, fields(country = %country.code, %start))]
    async fn reconcile_scope(
        &self,
        country: &Country,
        start: NaiveDate,
        end: NaiveDate,
        plan: ScopePlanner,
    ) -> Result<ScopePlan, StoreError> {
        let mut tx = self.db.pool.begin().await?;
        // Row lock on the country serialises reconciles of its scopes until commit.
        let locked = sqlx::query("SELECT country_id FROM country WHERE country_id = $1 FOR UPDATE")
            .bind(country.id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(StoreError::Conflict(format!("country {} no longer exists", country.code)));
        }
        let old = holidays_in_range(&mut *tx, country.id, start, end).await?;
        let plan = plan(old);
        if !plan.is_noop() {
            apply_changes(&mut *tx, &plan.delete_ids, plan.saves()).await?;
        }
        tx.commit().await?;
        Ok(plan)
    }

    async fn count_all(&self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM country_holiday")
            .fetch_one(&self.db.pool)
            .await?)
    }

    async fn search_holidays(
        &self,
        filter: &HolidayFilter,
        page: PageRequest,
    ) -> Result<Vec<Holiday>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {HOLIDAY_COLUMNS} FROM country_holiday h JOIN country c ON c.country_id = h.country_id"
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY h.holiday_date ASC, h.holiday_id ASC LIMIT ")
            .push_bind(i64::from(page.size))
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(&self.db.pool).await?;
        Ok(rows.iter().map(holiday_from_row).collect::<Result<_, _>>()?)
    }

    async fn count_matching(&self, filter: &HolidayFilter) -> Result<i64, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM country_holiday h");
        push_filter(&mut qb, filter);
        let row = qb.build().fetch_one(&self.db.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}
