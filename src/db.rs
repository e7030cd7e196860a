use crate::badges::BadgeRecheck;
use crate::code::{self, CodeKind};
use crate::diesel::prelude::*;
use crate::error::Error;
use crate::models::{NewUser, NewUserStats, RankingEntry, TorneoId, User, UserId, UserStats};
use crate::schema::{torneos, user_stats, users};
use bcrypt;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PoolError, PooledConnection};
use futures_channel::mpsc;
use std::cmp::max;
use std::collections::HashSet;

impl User {
    pub fn check_password(&self, password: &str) -> bool {
        match self.password_hash.as_deref() {
            None => false,
            Some(hash) => match bcrypt::verify(password.as_bytes(), &hash) {
                Ok(true) => true,
                _ => false,
            },
        }
    }
}

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub fn init_db_pool(db_url: &str) -> Result<PgPool, PoolError> {
    let manage = ConnectionManager::<PgConnection>::new(db_url);
    Pool::builder().build(manage)
}

/// A database connection wrapper, which associates the database with functions to manipulate it.
///
/// Every multi-statement mutation runs inside `transaction`, so a failure
/// anywhere rolls back the whole logical operation. The wrapper also
/// carries the badge-recheck sender: stat-changing operations push the
/// affected user onto it and the badge worker re-evaluates eligibility
/// off the request path.
pub struct DBWrapper {
    pub(crate) db: PooledConnection<ConnectionManager<PgConnection>>,
    badge_recheck_tx: mpsc::UnboundedSender<BadgeRecheck>,
}

impl DBWrapper {
    /// Wrap a connection checked out of the pool
    pub fn from_pg_pool(
        pool: &PgPool,
        badge_recheck_tx: mpsc::UnboundedSender<BadgeRecheck>,
    ) -> Result<DBWrapper, Error> {
        Ok(DBWrapper {
            db: pool.get()?,
            badge_recheck_tx,
        })
    }

    /// Run `f` inside a database transaction; any Err rolls everything back
    pub(crate) fn transaction<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> Result<T, Error>,
    {
        self.db.transaction::<T, Error, F>(f)
    }

    /// Ask the badge worker to re-evaluate a user's badges. Fire and
    /// forget: a closed channel is logged, never surfaced to the caller.
    pub fn request_badge_recheck(&self, user_id: UserId) {
        self.badge_recheck_tx
            .unbounded_send(BadgeRecheck { user_id })
            .unwrap_or_else(|e| log::warn!("couldn't queue badge recheck: {}", e));
    }

    // ---- Users ----

    /// Lookup a user with the given id
    pub fn find_user(&self, id: UserId) -> Result<User, Error> {
        match users::dsl::users
            .find(id)
            .first::<User>(&self.db)
            .optional()?
        {
            Some(user) => Ok(user),
            None => Err(Error::NoSuchUser),
        }
    }

    fn find_user_by_email(&self, email: &str) -> Result<User, Error> {
        match users::dsl::users
            .filter(users::dsl::email.eq(email))
            .first::<User>(&self.db)
            .optional()?
        {
            Some(user) => Ok(user),
            None => Err(Error::NoSuchUser),
        }
    }

    /// Lookup a user by their shareable friend code
    pub fn find_user_by_friend_code(&self, friend_code: &str) -> Result<User, Error> {
        match users::dsl::users
            .filter(users::dsl::friend_code.eq(friend_code))
            .first::<User>(&self.db)
            .optional()?
        {
            Some(user) => Ok(user),
            None => Err(Error::NoSuchUser),
        }
    }

    /// Lookup user by email and password
    pub fn find_user_by_credentials(&self, email: &str, pass: &str) -> Result<User, Error> {
        let user = self.find_user_by_email(email)?;
        match user.check_password(pass) {
            true => Ok(user),
            false => Err(Error::IncorrectCredentials),
        }
    }

    /// Create a new user together with its zeroed stats row
    pub fn new_user(&self, name: &str, email: &str, pass: &str) -> Result<User, Error> {
        match self.find_user_by_email(email) {
            Ok(_) => Err(Error::EmailAlreadyTaken),
            Err(Error::NoSuchUser) => {
                let hashed_pass = bcrypt::hash(pass.as_bytes(), bcrypt::DEFAULT_COST)?;
                self.transaction(|| {
                    let friend_code = self.new_code(CodeKind::Amigo)?;
                    let user = diesel::insert_into(users::table)
                        .values(&NewUser {
                            name,
                            email: Some(email),
                            password_hash: Some(&*hashed_pass),
                            friend_code: &*friend_code,
                        })
                        .get_result::<User>(&self.db)?;
                    diesel::insert_into(user_stats::table)
                        .values(&NewUserStats::zeroed(user.id))
                        .execute(&self.db)?;
                    Ok(user)
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Load a user's stats row
    pub fn find_user_stats(&self, user_id: UserId) -> Result<UserStats, Error> {
        match user_stats::dsl::user_stats
            .filter(user_stats::dsl::user_id.eq(user_id))
            .first::<UserStats>(&self.db)
            .optional()?
        {
            Some(stats) => Ok(stats),
            None => Err(Error::NoSuchUser),
        }
    }

    // ---- Codes ----

    fn existing_codes(&self, kind: CodeKind) -> Result<HashSet<String>, Error> {
        let codes = match kind {
            CodeKind::Torneo => torneos::dsl::torneos
                .select(torneos::dsl::code_id)
                .load::<String>(&self.db)?,
            CodeKind::Amigo => users::dsl::users
                .select(users::dsl::friend_code)
                .load::<String>(&self.db)?,
        };
        Ok(codes.into_iter().collect())
    }

    /// Generate a code unique within its namespace (full-table collision scan)
    pub fn new_code(&self, kind: CodeKind) -> Result<String, Error> {
        Ok(code::unique_code(&self.existing_codes(kind)?))
    }

    // ---- Stats store deltas ----
    //
    // Counter adjustments are only ever made through these named
    // functions, so each delta contract lives in exactly one place and
    // call sites read as `add_puntos(user, 50)` rather than inline SQL.

    /// puntos += delta (delta may be negative)
    pub fn add_puntos(&self, user_id: UserId, delta: i32) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::puntos.eq(dsl::puntos + delta))
            .execute(&self.db)?;
        Ok(())
    }

    /// acciones += delta (delta may be negative)
    pub fn add_acciones(&self, user_id: UserId, delta: i32) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::acciones.eq(dsl::acciones + delta))
            .execute(&self.db)?;
        Ok(())
    }

    /// torneos_participados += 1, accrued at enroll time only
    pub fn add_torneo_participado(&self, user_id: UserId) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::torneos_participados.eq(dsl::torneos_participados + 1))
            .execute(&self.db)?;
        Ok(())
    }

    /// torneos_participados -= 1, floored at zero
    pub fn drop_torneo_participado(&self, user_id: UserId) -> Result<(), Error> {
        use user_stats::dsl;
        let stats = self.find_user_stats(user_id)?;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::torneos_participados.eq(max(0, stats.torneos_participados - 1)))
            .execute(&self.db)?;
        Ok(())
    }

    /// torneos_ganados += delta
    pub fn add_torneos_ganados(&self, user_id: UserId, delta: i32) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::torneos_ganados.eq(dsl::torneos_ganados + delta))
            .execute(&self.db)?;
        Ok(())
    }

    /// cantidad_amigos += delta (delta may be negative)
    pub fn add_cantidad_amigos(&self, user_id: UserId, delta: i32) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::cantidad_amigos.eq(dsl::cantidad_amigos + delta))
            .execute(&self.db)?;
        Ok(())
    }

    /// pending_amigo += delta (delta may be negative)
    pub fn add_pending_amigo(&self, user_id: UserId, delta: i32) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::pending_amigo.eq(dsl::pending_amigo + delta))
            .execute(&self.db)?;
        Ok(())
    }

    /// pending_medalla += delta
    pub fn add_pending_medalla(&self, user_id: UserId, delta: i32) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::pending_medalla.eq(dsl::pending_medalla + delta))
            .execute(&self.db)?;
        Ok(())
    }

    /// Point `torneo_id` at the tournament the user is currently in (or clear it)
    pub fn set_torneo_id(&self, user_id: UserId, torneo: Option<TorneoId>) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::torneo_id.eq(torneo))
            .execute(&self.db)?;
        Ok(())
    }

    /// Mark or clear the tournament-ownership flag
    pub fn set_es_dueno_torneo(&self, user_id: UserId, es_dueno: bool) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::es_dueno_torneo.eq(es_dueno))
            .execute(&self.db)?;
        Ok(())
    }

    /// Clear the unread-badge notification counter
    pub fn reset_pending_medallas(&self, user_id: UserId) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::pending_medalla.eq(0))
            .execute(&self.db)?;
        Ok(())
    }

    /// Clear the incoming-friend-request notification counter
    pub fn reset_pending_amigos(&self, user_id: UserId) -> Result<(), Error> {
        use user_stats::dsl;
        diesel::update(dsl::user_stats.filter(dsl::user_id.eq(user_id)))
            .set(dsl::pending_amigo.eq(0))
            .execute(&self.db)?;
        Ok(())
    }

    // ---- Ranking ----

    /// Global ranking, ordered by total points
    pub fn ranking(&self) -> Result<Vec<RankingEntry>, Error> {
        Ok(user_stats::table
            .inner_join(users::table.on(users::dsl::id.eq(user_stats::dsl::user_id)))
            .select((
                user_stats::dsl::user_id,
                users::dsl::name,
                user_stats::dsl::puntos,
                user_stats::dsl::acciones,
                user_stats::dsl::torneos_ganados,
                user_stats::dsl::cantidad_amigos,
            ))
            .order(user_stats::dsl::puntos.desc())
            .load::<RankingEntry>(&self.db)?)
    }
}
