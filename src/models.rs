use super::schema::{
    medallas, medallas_ganadas, torneo_estadisticas, torneos, user_actions, user_friends,
    user_stats, users,
};
use chrono::{DateTime, Utc};

pub type UserId = i32;
pub type TorneoId = i32;
pub type ParticipacionId = i32;
pub type MedallaId = i32;
pub type AccionId = i32;
pub type AmistadId = i32;

#[derive(Queryable, AsChangeset, Debug, Clone)]
#[table_name = "users"]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub friend_code: String,
}

#[derive(Insertable)]
#[table_name = "users"]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub friend_code: &'a str,
}

/// Denormalized per-user counters. Source of truth for badge thresholds
/// and tournament membership checks; every mutation goes through the
/// named delta methods on DBWrapper.
#[derive(Queryable, AsChangeset, Debug, Clone)]
#[table_name = "user_stats"]
pub struct UserStats {
    pub id: i32,
    pub user_id: UserId,
    pub puntos: i32,
    pub acciones: i32,
    pub torneos_participados: i32,
    pub torneos_ganados: i32,
    pub cantidad_amigos: i32,
    pub es_dueno_torneo: bool,
    pub pending_medalla: i32,
    pub pending_amigo: i32,
    pub torneo_id: Option<TorneoId>,
}

#[derive(Insertable)]
#[table_name = "user_stats"]
pub struct NewUserStats {
    pub user_id: UserId,
    pub puntos: i32,
    pub acciones: i32,
    pub torneos_participados: i32,
    pub torneos_ganados: i32,
    pub cantidad_amigos: i32,
    pub es_dueno_torneo: bool,
    pub pending_medalla: i32,
    pub pending_amigo: i32,
    pub torneo_id: Option<TorneoId>,
}

impl NewUserStats {
    pub fn zeroed(user_id: UserId) -> NewUserStats {
        NewUserStats {
            user_id,
            puntos: 0,
            acciones: 0,
            torneos_participados: 0,
            torneos_ganados: 0,
            cantidad_amigos: 0,
            es_dueno_torneo: false,
            pending_medalla: 0,
            pending_amigo: 0,
            torneo_id: None,
        }
    }
}

#[derive(Queryable, AsChangeset, Debug, Clone, PartialEq)]
#[table_name = "torneos"]
pub struct Torneo {
    pub id: TorneoId,
    pub creator_id: UserId,
    pub nombre: String,
    pub modalidad: String,
    pub ubicacion_a_latitud: f64,
    pub ubicacion_a_longitud: f64,
    pub nombre_ubicacion_a: String,
    pub ubicacion_b_latitud: Option<f64>,
    pub ubicacion_b_longitud: Option<f64>,
    pub nombre_ubicacion_b: Option<String>,
    pub fecha_inicio: DateTime<Utc>,
    pub fecha_fin: DateTime<Utc>,
    pub ubicacion_aproximada: bool,
    pub metros_aproximados: Option<i32>,
    pub code_id: String,
    pub finalizado: bool,
    pub ganador_versus: Option<bool>,
    pub ganador_individual: Option<UserId>,
}

#[derive(Insertable)]
#[table_name = "torneos"]
pub struct NewTorneo<'a> {
    pub creator_id: UserId,
    pub nombre: &'a str,
    pub modalidad: &'a str,
    pub ubicacion_a_latitud: f64,
    pub ubicacion_a_longitud: f64,
    pub nombre_ubicacion_a: &'a str,
    pub ubicacion_b_latitud: Option<f64>,
    pub ubicacion_b_longitud: Option<f64>,
    pub nombre_ubicacion_b: Option<&'a str>,
    pub fecha_inicio: DateTime<Utc>,
    pub fecha_fin: DateTime<Utc>,
    pub ubicacion_aproximada: bool,
    pub metros_aproximados: Option<i32>,
    pub code_id: &'a str,
    pub finalizado: bool,
    pub ganador_versus: Option<bool>,
    pub ganador_individual: Option<UserId>,
}

/// One row per (tournament, player). `habilitado` goes false when the
/// tournament is finalized, which freezes the row against further scoring.
#[derive(Queryable, AsChangeset, Debug, Clone, PartialEq)]
#[table_name = "torneo_estadisticas"]
pub struct TorneoEstadisticas {
    pub id: ParticipacionId,
    pub id_torneo: TorneoId,
    pub id_jugador: UserId,
    pub equipo: bool,
    pub puntos: i32,
    pub habilitado: bool,
}

#[derive(Insertable)]
#[table_name = "torneo_estadisticas"]
pub struct NewTorneoEstadisticas {
    pub id_torneo: TorneoId,
    pub id_jugador: UserId,
    pub equipo: bool,
    pub puntos: i32,
    pub habilitado: bool,
}

#[derive(Queryable, AsChangeset, Debug, Clone)]
#[table_name = "medallas"]
pub struct Medalla {
    pub id: MedallaId,
    pub nombre: String,
    pub descripcion: String,
    pub dificultad: i32,
    pub requiere_amistades: bool,
    pub requiere_puntos: bool,
    pub requiere_acciones: bool,
    pub requiere_torneos: bool,
    pub requiere_victoria_torneos: bool,
    pub numero_requerido: i32,
}

#[derive(Insertable)]
#[table_name = "medallas"]
pub struct NewMedalla<'a> {
    pub nombre: &'a str,
    pub descripcion: &'a str,
    pub dificultad: i32,
    pub requiere_amistades: bool,
    pub requiere_puntos: bool,
    pub requiere_acciones: bool,
    pub requiere_torneos: bool,
    pub requiere_victoria_torneos: bool,
    pub numero_requerido: i32,
}

#[derive(Queryable, Debug, Clone)]
pub struct MedallaGanada {
    pub id: i32,
    pub id_usuario: UserId,
    pub id_medalla: MedallaId,
    pub fecha_ganada: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "medallas_ganadas"]
pub struct NewMedallaGanada {
    pub id_usuario: UserId,
    pub id_medalla: MedallaId,
    pub fecha_ganada: DateTime<Utc>,
}

#[derive(Queryable, Debug, Clone)]
pub struct UserAction {
    pub id: AccionId,
    pub user_id: UserId,
    pub tipo_accion: String,
    pub foto: Option<String>,
    pub latitud: f64,
    pub longitud: f64,
    pub ciudad: Option<String>,
    pub lugar: Option<String>,
    pub en_colaboracion: bool,
    pub es_para_torneo: bool,
    pub id_torneo: Option<TorneoId>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable)]
#[table_name = "user_actions"]
pub struct NewUserAction<'a> {
    pub user_id: UserId,
    pub tipo_accion: &'a str,
    pub foto: Option<&'a str>,
    pub latitud: f64,
    pub longitud: f64,
    pub ciudad: Option<&'a str>,
    pub lugar: Option<&'a str>,
    pub en_colaboracion: bool,
    pub es_para_torneo: bool,
    pub id_torneo: Option<TorneoId>,
    pub created_at: DateTime<Utc>,
}

/// A friendship row. (user_id, friend_id) is always stored with the
/// smaller id first so a pair maps to exactly one row regardless of who
/// initiated. `pending_id` names the recipient while the request is
/// unanswered; NULL means confirmed.
#[derive(Queryable, Debug, Clone)]
pub struct UserFriend {
    pub id: AmistadId,
    pub user_id: UserId,
    pub friend_id: UserId,
    pub pending_id: Option<UserId>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable)]
#[table_name = "user_friends"]
pub struct NewUserFriend {
    pub user_id: UserId,
    pub friend_id: UserId,
    pub pending_id: Option<UserId>,
}

/// Global ranking entry (puntos from user_stats) or per-tournament
/// ranking entry (puntos from torneo_estadisticas).
#[derive(Queryable, Debug, Clone)]
pub struct RankingEntry {
    pub user_id: UserId,
    pub name: String,
    pub puntos: i32,
    pub acciones: i32,
    pub torneos_ganados: i32,
    pub cantidad_amigos: i32,
}
